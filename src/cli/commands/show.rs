//! Read-only commands: facts, show, exists

use anyhow::Result;
use clap::Parser;
use junos_txn::netconf::EMPTY_OUTPUT;

use super::CommandContext;

/// A configuration path given as words, e.g. `vlans v10`
#[derive(Parser, Debug, Clone)]
pub struct PathArgs {
    /// Configuration path
    #[arg(required = true, num_args = 1..)]
    pub path: Vec<String>,
}

impl PathArgs {
    /// The path as one identifier
    pub fn identifier(&self) -> String {
        self.path.join(" ")
    }
}

/// Print system information
pub async fn facts(ctx: &CommandContext) -> Result<i32> {
    let info = ctx.manager()?.system_information().await?;

    if ctx.output.is_json() {
        ctx.output.json(&info);
        return Ok(0);
    }

    ctx.output.section(&ctx.config.target());
    ctx.output.field("model", &info.hardware_model);
    ctx.output.field("os", &format!("{} {}", info.os_name, info.os_version));
    ctx.output.field("host name", &info.host_name);
    ctx.output.field(
        "security",
        if info.is_security_platform() { "yes" } else { "no" },
    );
    Ok(0)
}

/// Print configuration under a path
pub async fn show(ctx: &CommandContext, args: &PathArgs) -> Result<i32> {
    let identifier = args.identifier();
    let output = ctx.manager()?.read_configuration(&identifier).await?;
    let exists = output != EMPTY_OUTPUT;

    if ctx.output.is_json() {
        let lines: Vec<&str> = if exists {
            output.lines().filter(|l| !l.trim().is_empty()).collect()
        } else {
            Vec::new()
        };
        ctx.output.json(&serde_json::json!({
            "path": identifier,
            "exists": exists,
            "statements": lines,
        }));
    } else if exists {
        ctx.output.text(output.trim());
    } else {
        ctx.output.info(&format!("No configuration under '{}'", identifier));
    }
    Ok(0)
}

/// Exit status tells whether configuration exists under a path
pub async fn exists(ctx: &CommandContext, args: &PathArgs) -> Result<i32> {
    let identifier = args.identifier();
    let exists = ctx.manager()?.exists(&identifier).await?;

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "path": identifier, "exists": exists }));
    } else {
        ctx.output.text(if exists { "true" } else { "false" });
    }
    Ok(if exists { 0 } else { 1 })
}
