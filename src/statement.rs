//! Configuration statements.
//!
//! A [`Statement`] is one `set`/`delete` directive as a structured value: an
//! operation, path segments and an optional leaf value. Serialization happens
//! in exactly one place (the `Display` impl).
//!
//! Statements parsed from CLI text keep that text and print it back unchanged,
//! so Junos escapes inside quoted strings (`"line1\nline2"`) reach the device
//! exactly as written. Built statements are quoted segment by segment.
//!
//! ```rust
//! use junos_txn::statement::Statement;
//!
//! let stmt = Statement::set(["vlans", "v10", "description"]).value("users floor 2");
//! assert_eq!(stmt.to_string(), r#"set vlans v10 description "users floor 2""#);
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Kind of configuration directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Add or change configuration
    Set,
    /// Remove configuration
    Delete,
}

impl Operation {
    /// Keyword as written on the CLI.
    pub fn keyword(&self) -> &'static str {
        match self {
            Operation::Set => "set",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One configuration directive.
///
/// Two statements are equal when they print the same directive text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    operation: Operation,
    path: Vec<String>,
    value: Option<String>,
    /// Line this statement was parsed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl Statement {
    /// `set <path>`.
    pub fn set<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operation: Operation::Set,
            path: path.into_iter().map(Into::into).collect(),
            value: None,
            source: None,
        }
    }

    /// `delete <path>`.
    pub fn delete<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operation: Operation::Delete,
            path: path.into_iter().map(Into::into).collect(),
            value: None,
            source: None,
        }
    }

    /// Attach a leaf value, quoted on output when needed.
    /// The statement is printed from its segments from then on.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self.source = None;
        self
    }

    /// The directive kind.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Path segments, without the leaf value.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Leaf value, if one was attached.
    pub fn leaf_value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The CLI text this statement was parsed from, if any.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Parse a block of statements, one per line. Blank lines and lines
    /// starting with `#` are skipped.
    pub fn parse_lines(text: &str) -> Result<Vec<Statement>> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::parse)
            .collect()
    }
}

/// Quote a segment if the CLI would otherwise split or misread it.
fn quote_segment(segment: &str) -> Cow<'_, str> {
    let needs_quotes = segment.is_empty()
        || segment
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | ';' | '{' | '}' | '\\'));

    if needs_quotes {
        Cow::Owned(format!(
            "\"{}\"",
            segment.replace('\\', "\\\\").replace('"', "\\\"")
        ))
    } else {
        Cow::Borrowed(segment)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref source) = self.source {
            return f.write_str(source);
        }

        f.write_str(self.operation.keyword())?;
        for segment in &self.path {
            write!(f, " {}", quote_segment(segment))?;
        }
        if let Some(ref value) = self.value {
            write!(f, " {}", quote_segment(value))?;
        }
        Ok(())
    }
}

impl FromStr for Statement {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let invalid = |reason: &str| Error::InvalidStatement {
            statement: line.to_string(),
            reason: reason.to_string(),
        };

        let (keyword, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| invalid("missing configuration path"))?;

        let operation = match keyword {
            "set" => Operation::Set,
            "delete" => Operation::Delete,
            _ => return Err(invalid("must start with 'set' or 'delete'")),
        };

        let path = shell_words::split(rest).map_err(|e| invalid(&e.to_string()))?;
        if path.is_empty() {
            return Err(invalid("missing configuration path"));
        }

        Ok(Self {
            operation,
            path,
            value: None,
            source: Some(line.to_string()),
        })
    }
}

impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for Statement {}

impl Hash for Statement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl TryFrom<&str> for Statement {
    type Error = Error;

    fn try_from(line: &str) -> Result<Self> {
        line.parse()
    }
}
