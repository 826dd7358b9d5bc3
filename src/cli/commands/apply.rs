//! Write commands: apply and check
//!
//! Both read `set`/`delete` statements from a file (or stdin for `-`), one per
//! line, skipping blank lines and `#` comments.

use anyhow::{Context, Result};
use clap::Parser;
use junos_txn::error::Error;
use junos_txn::transaction::ChangeSet;
use std::path::PathBuf;

use super::{read_input, CommandContext};

/// Arguments for the apply command
#[derive(Parser, Debug, Clone)]
pub struct ApplyArgs {
    /// Statement file, `-` for stdin
    #[arg(short = 'f', long)]
    pub file: PathBuf,

    /// Commit log message
    #[arg(short = 'm', long, default_value = "junos-txn apply")]
    pub comment: String,

    /// Fail if this path already exists, and verify it exists after commit
    #[arg(long, conflicts_with_all = ["verify", "verify_absent"])]
    pub create: Option<String>,

    /// Verify this path exists after commit
    #[arg(long, conflicts_with = "verify_absent")]
    pub verify: Option<String>,

    /// Verify this path is gone after commit
    #[arg(long)]
    pub verify_absent: Option<String>,
}

impl ApplyArgs {
    fn change_set(&self) -> Result<ChangeSet> {
        let text = read_input(&self.file)?;
        let mut change = ChangeSet::new(&self.comment)
            .lines(&text)
            .with_context(|| format!("Invalid statements in {}", self.file.display()))?;

        if let Some(ref object) = self.create {
            change = change.create(object);
        } else if let Some(ref object) = self.verify {
            change = change.verify_exists(object);
        } else if let Some(ref object) = self.verify_absent {
            change = change.verify_absent(object);
        }
        Ok(change)
    }

    /// Execute the apply command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let change = self.change_set()?;
        if change.is_empty() {
            ctx.output.warning("No statements to apply");
            return Ok(0);
        }

        ctx.output.info(&format!(
            "Applying {} statement(s) to {}",
            change.statements.len(),
            ctx.config.target()
        ));

        match ctx.manager()?.apply(&change).await {
            Ok(outcome) => {
                for warning in &outcome.warnings {
                    ctx.output.warning(warning);
                }
                if ctx.output.is_json() {
                    ctx.output.json(&outcome);
                } else {
                    ctx.output.success(&format!(
                        "committed {} statement(s) at {}",
                        outcome.staged,
                        outcome.committed_at.format("%Y-%m-%d %H:%M:%S UTC")
                    ));
                }
                Ok(0)
            }
            Err(e) => {
                for warning in e.warnings() {
                    ctx.output.warning(warning);
                }
                ctx.output.error(&e.to_string());
                Ok(exit_code(&e))
            }
        }
    }
}

/// Arguments for the check command
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    /// Statement file, `-` for stdin
    #[arg(short = 'f', long)]
    pub file: PathBuf,
}

impl CheckArgs {
    /// Execute the check command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let text = read_input(&self.file)?;
        let change = ChangeSet::new("commit check")
            .lines(&text)
            .with_context(|| format!("Invalid statements in {}", self.file.display()))?;

        match ctx.manager()?.validate(&change).await {
            Ok(warnings) => {
                for warning in &warnings {
                    ctx.output.warning(warning);
                }
                if ctx.output.is_json() {
                    ctx.output.json(&serde_json::json!({ "valid": true, "warnings": warnings }));
                } else {
                    ctx.output.success("configuration check succeeds");
                }
                Ok(0)
            }
            Err(e) => {
                for warning in e.warnings() {
                    ctx.output.warning(warning);
                }
                ctx.output.error(&e.to_string());
                Ok(exit_code(&e))
            }
        }
    }
}

/// Exit status per failure class; retryable failures get their own code so
/// wrappers can decide to try again.
fn exit_code(error: &Error) -> i32 {
    match error {
        Error::AlreadyExists { .. } => 3,
        Error::Drift { .. } => 4,
        e if e.is_retryable() => 75,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_change_set_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# vlan v10").unwrap();
        writeln!(file, "set vlans v10 vlan-id 10").unwrap();

        let args = ApplyArgs {
            file: file.path().to_path_buf(),
            comment: "add v10".to_string(),
            create: Some("vlans v10".to_string()),
            verify: None,
            verify_absent: None,
        };
        let change = args.change_set().unwrap();
        assert_eq!(change.statements.len(), 1);
        assert_eq!(change.description, "add v10");
        assert_eq!(change.create_guard.as_deref(), Some("vlans v10"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Error::AlreadyExists { object: "x".into() }), 3);
        assert_eq!(
            exit_code(&Error::Lock {
                target: "r1:830".into(),
                reason: "locked".into()
            }),
            75
        );
        assert_eq!(exit_code(&Error::Config("bad".into())), 1);
    }
}
