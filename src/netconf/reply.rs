//! Parsed `<rpc-reply>` documents.

use super::{extract_all, extract_attribute, extract_element, extract_raw, unescape_xml};

/// Parsed NETCONF RPC reply
#[derive(Debug, Clone, Default)]
pub struct RpcReply {
    /// Message ID echoed by the device
    pub message_id: Option<u64>,
    /// Whether the reply carried `<ok/>`
    pub ok: bool,
    /// Every `<rpc-error>`, warnings included
    pub errors: Vec<RpcError>,
    /// Content of the reply element
    pub body: String,
}

impl RpcReply {
    /// Parse a NETCONF RPC reply. Returns `None` if the message is not a reply.
    pub fn parse(message: &str) -> Option<Self> {
        let (body, _) = extract_raw(message, "rpc-reply", 0)?;
        let message_id =
            extract_attribute(message, "rpc-reply", "message-id").and_then(|id| id.parse().ok());

        let ok = extract_raw(body, "ok", 0).is_some();
        let errors = Self::parse_errors(body);

        Some(Self {
            message_id,
            ok,
            errors,
            body: body.to_string(),
        })
    }

    fn parse_errors(body: &str) -> Vec<RpcError> {
        let mut errors = Vec::new();
        let mut from = 0;
        while let Some((xml, next)) = extract_raw(body, "rpc-error", from) {
            errors.push(RpcError::parse(xml));
            from = next;
        }
        errors
    }

    /// Errors with severity `error`.
    pub fn failures(&self) -> impl Iterator<Item = &RpcError> {
        self.errors.iter().filter(|e| !e.is_warning())
    }

    /// Messages of errors with severity `warning`.
    pub fn warnings(&self) -> Vec<String> {
        self.errors
            .iter()
            .filter(|e| e.is_warning())
            .map(ToString::to_string)
            .collect()
    }

    /// Whether any error of severity `error` is present.
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// All failure messages joined for display.
    pub fn failure_message(&self) -> String {
        let messages: Vec<String> = self.failures().map(ToString::to_string).collect();
        if messages.is_empty() {
            "unknown error".to_string()
        } else {
            messages.join("; ")
        }
    }

    /// Text output of a `<command>` reply, unescaped.
    ///
    /// `show configuration` answers inside `<configuration-output>`, operational
    /// commands inside `<output>`; anything else is returned as-is.
    pub fn text_output(&self) -> String {
        let raw = extract_raw(&self.body, "configuration-output", 0)
            .or_else(|| extract_raw(&self.body, "output", 0))
            .map(|(content, _)| content)
            .unwrap_or(&self.body);
        unescape_xml(raw)
    }
}

/// NETCONF RPC error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    /// Error type (protocol, application, etc.)
    pub error_type: String,
    /// Error tag (e.g., lock-denied, operation-failed)
    pub error_tag: String,
    /// Error severity (error, warning)
    pub error_severity: String,
    /// Error message
    pub error_message: Option<String>,
    /// Error path (configuration element that caused the error)
    pub error_path: Option<String>,
    /// Offending element reported in `<error-info>`
    pub bad_element: Option<String>,
}

impl RpcError {
    /// Parse a single rpc-error element
    fn parse(xml: &str) -> Self {
        RpcError {
            error_type: extract_element(xml, "error-type").unwrap_or_default(),
            error_tag: extract_element(xml, "error-tag").unwrap_or_default(),
            error_severity: extract_element(xml, "error-severity")
                .unwrap_or_else(|| "error".to_string()),
            error_message: extract_element(xml, "error-message").map(|m| unescape_xml(&m)),
            error_path: extract_element(xml, "error-path"),
            bad_element: extract_all(xml, "bad-element").into_iter().next(),
        }
    }

    /// Whether this is only a warning.
    pub fn is_warning(&self) -> bool {
        self.error_severity.eq_ignore_ascii_case("warning")
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = self.error_message.as_deref().unwrap_or("Unknown error");
        if self.error_tag.is_empty() {
            write!(f, "{}", message)?;
        } else {
            write!(f, "[{}] {}", self.error_tag, message)?;
        }
        if let Some(ref bad) = self.bad_element {
            write!(f, " (bad element: {})", bad)?;
        }
        if let Some(ref path) = self.error_path {
            write!(f, " at {}", path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_reply() {
        let reply = RpcReply::parse(r#"<rpc-reply message-id="3"><ok/></rpc-reply>"#).unwrap();
        assert_eq!(reply.message_id, Some(3));
        assert!(reply.ok);
        assert!(!reply.has_failures());
    }

    #[test]
    fn test_parse_errors_and_warnings() {
        let xml = r#"<rpc-reply message-id="9">
<commit-results>
<rpc-error>
<error-type>application</error-type>
<error-tag>invalid-value</error-tag>
<error-severity>warning</error-severity>
<error-message>statement has no effect</error-message>
</rpc-error>
<rpc-error>
<error-severity>error</error-severity>
<error-message>commit failed: (missing mandatory statements)</error-message>
<error-info><bad-element>vlan-id</bad-element></error-info>
</rpc-error>
</commit-results>
</rpc-reply>"#;

        let reply = RpcReply::parse(xml).unwrap();
        assert_eq!(reply.errors.len(), 2);
        assert_eq!(reply.warnings(), vec!["[invalid-value] statement has no effect"]);
        assert!(reply.has_failures());
        let message = reply.failure_message();
        assert!(message.contains("missing mandatory statements"));
        assert!(message.contains("vlan-id"));
    }

    #[test]
    fn test_text_output_variants() {
        let config = RpcReply::parse(
            "<rpc-reply><configuration-information><configuration-output>\nset vlan-id 10\n</configuration-output></configuration-information></rpc-reply>",
        )
        .unwrap();
        assert_eq!(config.text_output().trim(), "set vlan-id 10");

        let op = RpcReply::parse("<rpc-reply><output>a &amp; b</output></rpc-reply>").unwrap();
        assert_eq!(op.text_output(), "a & b");
    }

    #[test]
    fn test_rpc_error_display() {
        let error = RpcError {
            error_type: "protocol".to_string(),
            error_tag: "lock-denied".to_string(),
            error_severity: "error".to_string(),
            error_message: Some("configuration database locked by: admin".to_string()),
            error_path: None,
            bad_element: None,
        };
        let display = error.to_string();
        assert!(display.contains("lock-denied"));
        assert!(display.contains("locked by: admin"));
    }

    #[test]
    fn test_non_reply_rejected() {
        assert!(RpcReply::parse("<hello/>").is_none());
    }
}
