//! NETCONF protocol pieces used by the session layer.
//!
//! Junos speaks NETCONF over SSH (RFC 6241, RFC 6242). This module builds the
//! handful of RPCs the transaction manager needs, parses replies and hellos,
//! and provides the framing codec. Replies are small and flat and are read
//! with plain tag extraction.

pub mod codec;
pub mod reply;

pub use codec::NetconfCodec;
pub use reply::{RpcError, RpcReply};

// ============================================================================
// NETCONF Constants
// ============================================================================

/// NETCONF 1.0 message delimiter (RFC 6242 section 4.3)
pub const EOM_DELIMITER: &str = "]]>]]>";

/// NETCONF SSH subsystem name
pub const NETCONF_SUBSYSTEM: &str = "netconf";

/// Default NETCONF port
pub const DEFAULT_NETCONF_PORT: u16 = 830;

/// NETCONF base namespace (RFC 6241)
pub const NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// Base 1.0 capability
pub const CAPABILITY_BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";

/// Base 1.1 capability, enables chunked framing
pub const CAPABILITY_BASE_1_1: &str = "urn:ietf:params:netconf:base:1.1";

/// Candidate datastore capability
pub const CAPABILITY_CANDIDATE: &str = "urn:ietf:params:netconf:capability:candidate:1.0";

/// What [`crate::session::Session::command`] returns when the device has no
/// configuration under the requested path.
pub const EMPTY_OUTPUT: &str = "<configuration-output/>";

/// Message framing on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// NETCONF 1.0, messages terminated by `]]>]]>`
    #[default]
    EndOfMessage,
    /// NETCONF 1.1 chunked framing
    Chunked,
}

// ============================================================================
// RPC Operations
// ============================================================================

/// The RPC operations issued by the transaction manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rpc<'a> {
    /// Lock the candidate datastore
    Lock,
    /// Unlock the candidate datastore
    Unlock,
    /// Load one `set`/`delete` line into the candidate
    LoadSet(&'a str),
    /// Commit the candidate, optionally only checking it
    Commit {
        /// Commit log message
        log: Option<&'a str>,
        /// Run `commit check` instead of activating
        check: bool,
    },
    /// Throw away candidate changes
    DiscardChanges,
    /// Run a CLI command and return its text output
    Command(&'a str),
    /// Fetch hardware model and OS information
    GetSystemInformation,
    /// End the session
    CloseSession,
}

impl Rpc<'_> {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Rpc::Lock => "lock",
            Rpc::Unlock => "unlock",
            Rpc::LoadSet(_) => "load-configuration",
            Rpc::Commit { check: true, .. } => "commit-check",
            Rpc::Commit { .. } => "commit-configuration",
            Rpc::DiscardChanges => "discard-changes",
            Rpc::Command(_) => "command",
            Rpc::GetSystemInformation => "get-system-information",
            Rpc::CloseSession => "close-session",
        }
    }

    /// The operation element placed inside `<rpc>`.
    fn operation(&self) -> String {
        match self {
            Rpc::Lock => "<lock><target><candidate/></target></lock>".to_string(),
            Rpc::Unlock => "<unlock><target><candidate/></target></unlock>".to_string(),
            Rpc::LoadSet(line) => format!(
                r#"<load-configuration action="set" format="text"><configuration-set>{}</configuration-set></load-configuration>"#,
                escape_xml(line)
            ),
            Rpc::Commit { log, check } => {
                let mut inner = String::new();
                if *check {
                    inner.push_str("<check/>");
                }
                if let Some(log) = log {
                    inner.push_str(&format!("<log>{}</log>", escape_xml(log)));
                }
                format!("<commit-configuration>{}</commit-configuration>", inner)
            }
            Rpc::DiscardChanges => "<discard-changes/>".to_string(),
            Rpc::Command(command) => {
                format!(r#"<command format="text">{}</command>"#, escape_xml(command))
            }
            Rpc::GetSystemInformation => "<get-system-information/>".to_string(),
            Rpc::CloseSession => "<close-session/>".to_string(),
        }
    }

    /// Wrap the operation into a complete `<rpc>` document.
    pub fn to_xml(&self, message_id: u64) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rpc xmlns="{}" message-id="{}">{}</rpc>"#,
            NETCONF_NS,
            message_id,
            self.operation()
        )
    }
}

// ============================================================================
// Hello Exchange
// ============================================================================

/// Build the client hello. Chunked framing is only offered when asked for.
pub fn client_hello(offer_base_1_1: bool) -> String {
    let mut capabilities = vec![CAPABILITY_BASE_1_0, CAPABILITY_CANDIDATE];
    if offer_base_1_1 {
        capabilities.push(CAPABILITY_BASE_1_1);
    }
    let capabilities: String = capabilities
        .iter()
        .map(|c| format!("<capability>{}</capability>", c))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<hello xmlns="{}"><capabilities>{}</capabilities></hello>"#,
        NETCONF_NS, capabilities
    )
}

/// Contents of the server hello.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerHello {
    /// Session ID assigned by the device
    pub session_id: Option<u32>,
    /// Capabilities advertised by the device
    pub capabilities: Vec<String>,
}

impl ServerHello {
    /// Parse a server `<hello>`.
    pub fn parse(message: &str) -> Option<Self> {
        if !message.contains("<hello") {
            return None;
        }

        let session_id = extract_element(message, "session-id").and_then(|s| s.parse().ok());
        let capabilities = extract_all(message, "capability");

        Some(Self {
            session_id,
            capabilities,
        })
    }

    /// Framing both sides agree on.
    pub fn negotiate(&self, offered_base_1_1: bool) -> Framing {
        if offered_base_1_1 && self.capabilities.iter().any(|c| c == CAPABILITY_BASE_1_1) {
            Framing::Chunked
        } else {
            Framing::EndOfMessage
        }
    }
}

// ============================================================================
// XML Helpers
// ============================================================================

/// Escape special XML characters in text content
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Reverse [`escape_xml`].
pub fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Find the opening tag `<element` followed by `>` or attributes.
fn find_open_tag(xml: &str, element: &str, from: usize) -> Option<(usize, usize)> {
    let needle = format!("<{}", element);
    let mut search = from;
    while let Some(rel) = xml[search..].find(&needle) {
        let start = search + rel;
        let after = start + needle.len();
        match xml[after..].chars().next() {
            Some('>') => return Some((start, after + 1)),
            Some(c) if c.is_whitespace() || c == '/' => {
                let close = xml[after..].find('>')? + after;
                return Some((start, close + 1));
            }
            _ => search = after,
        }
    }
    None
}

/// Extract the text content of the first `element`, trimmed. Self-closing
/// elements yield an empty string.
pub fn extract_element(xml: &str, element: &str) -> Option<String> {
    extract_raw(xml, element, 0).map(|(content, _)| content.trim().to_string())
}

/// Extract the untrimmed content of the first `element` at or after `from`,
/// together with the offset just past it.
pub(crate) fn extract_raw<'x>(xml: &'x str, element: &str, from: usize) -> Option<(&'x str, usize)> {
    let (start, content_start) = find_open_tag(xml, element, from)?;
    if xml[start..content_start].ends_with("/>") {
        return Some(("", content_start));
    }
    let end_tag = format!("</{}>", element);
    let end = xml[content_start..].find(&end_tag)? + content_start;
    Some((&xml[content_start..end], end + end_tag.len()))
}

/// Extract the trimmed text of every `element`, in document order.
pub fn extract_all(xml: &str, element: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut from = 0;
    while let Some((content, next)) = extract_raw(xml, element, from) {
        values.push(content.trim().to_string());
        from = next;
    }
    values
}

/// Read an attribute value from the first `element` tag.
pub fn extract_attribute(xml: &str, element: &str, attribute: &str) -> Option<String> {
    let (start, end) = find_open_tag(xml, element, 0)?;
    let tag = &xml[start..end];
    let needle = format!("{}=", attribute);
    let pos = tag.find(&needle)? + needle.len();
    let quote = tag[pos..].chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let value_start = pos + 1;
    let value_end = tag[value_start..].find(quote)? + value_start;
    Some(tag[value_start..value_end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_roundtrip_characters() {
        assert_eq!(escape_xml("<test>"), "&lt;test&gt;");
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(unescape_xml("&lt;a&gt; &amp;amp;"), "<a> &amp;");
    }

    #[test]
    fn test_load_set_rpc_escapes_statement() {
        let xml = Rpc::LoadSet("set foo description \"a<b\"").to_xml(7);
        assert!(xml.contains(r#"message-id="7""#));
        assert!(xml.contains("action=\"set\""));
        assert!(xml.contains("set foo description &quot;a&lt;b&quot;"));
    }

    #[test]
    fn test_commit_rpc_variants() {
        let commit = Rpc::Commit {
            log: Some("create resource junos_vlan v10"),
            check: false,
        }
        .to_xml(1);
        assert!(commit.contains("<log>create resource junos_vlan v10</log>"));
        assert!(!commit.contains("<check/>"));

        let check = Rpc::Commit {
            log: None,
            check: true,
        };
        assert_eq!(check.name(), "commit-check");
        assert!(check.to_xml(2).contains("<check/>"));
    }

    #[test]
    fn test_server_hello_parse_and_negotiate() {
        let hello = r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <capabilities>
    <capability>urn:ietf:params:netconf:base:1.0</capability>
    <capability>urn:ietf:params:netconf:base:1.1</capability>
    <capability>urn:ietf:params:netconf:capability:candidate:1.0</capability>
  </capabilities>
  <session-id>4211</session-id>
</hello>"#;

        let parsed = ServerHello::parse(hello).unwrap();
        assert_eq!(parsed.session_id, Some(4211));
        assert_eq!(parsed.capabilities.len(), 3);
        assert_eq!(parsed.negotiate(true), Framing::Chunked);
        assert_eq!(parsed.negotiate(false), Framing::EndOfMessage);
        assert!(ServerHello::parse("<rpc-reply/>").is_none());
    }

    #[test]
    fn test_client_hello_capabilities() {
        assert!(!client_hello(false).contains(CAPABILITY_BASE_1_1));
        assert!(client_hello(true).contains(CAPABILITY_BASE_1_1));
    }

    #[test]
    fn test_extract_helpers() {
        let xml = r#"<rpc-reply message-id="12" xmlns:junos="x"><ok/><a>one</a><a> two </a></rpc-reply>"#;
        assert_eq!(extract_attribute(xml, "rpc-reply", "message-id").as_deref(), Some("12"));
        assert_eq!(extract_element(xml, "ok").as_deref(), Some(""));
        assert_eq!(extract_all(xml, "a"), vec!["one", "two"]);
        assert!(extract_element(xml, "missing").is_none());
        // a prefix of another tag name must not match
        assert!(extract_element("<abc>x</abc>", "ab").is_none());
    }
}
