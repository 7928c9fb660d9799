use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;

use super::{Param, Skill, SkillFunction, ToolArgs, ToolOutput, ToolSchema};
use crate::error::Result;

const COMMAND_TIMEOUT_SECS: u64 = 15;

/// A program invocation, built separately from running it so the platform
/// mapping can be tested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Run to completion with a timeout.  Returns a failure description on
/// spawn errors, non-zero exit, or timeout.
pub(super) async fn run(inv: &Invocation) -> std::result::Result<String, String> {
    debug!(program = %inv.program, args = ?inv.args, "running command");

    let result = tokio::time::timeout(
        Duration::from_secs(COMMAND_TIMEOUT_SECS),
        Command::new(&inv.program).args(&inv.args).output(),
    )
    .await;

    match result {
        Ok(Ok(output)) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(Ok(output)) => {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!("{} exited with code {code}: {}", inv.program, stderr.trim()))
        }
        Ok(Err(e)) => Err(format!("failed to execute {}: {e}", inv.program)),
        Err(_) => Err(format!(
            "{} timed out after {COMMAND_TIMEOUT_SECS}s",
            inv.program
        )),
    }
}

/// System volume and application launching.
pub struct SystemSkill;

impl Skill for SystemSkill {
    fn name(&self) -> &str {
        "system_skill"
    }

    fn functions(&self) -> Vec<Arc<dyn SkillFunction>> {
        vec![Arc::new(SetVolume), Arc::new(OpenApp)]
    }
}

fn volume_command(level: u8) -> Invocation {
    if cfg!(target_os = "macos") {
        Invocation::new(
            "osascript",
            &["-e", &format!("set volume output volume {level}")],
        )
    } else {
        Invocation::new(
            "pactl",
            &["set-sink-volume", "@DEFAULT_SINK@", &format!("{level}%")],
        )
    }
}

fn open_app_command(app_name: &str) -> Invocation {
    if cfg!(target_os = "macos") {
        Invocation::new("open", &["-a", app_name])
    } else {
        Invocation::new("gtk-launch", &[app_name])
    }
}

// -- SetVolume -----------------------------------------------------------

struct SetVolume;

#[async_trait]
impl SkillFunction for SetVolume {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("set_volume", "Set system volume (0-100)")
            .param(Param::integer("level").required())
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        let Some(level) = args.i64("level") else {
            return Ok(ToolOutput::error("level is required"));
        };
        let level = level.clamp(0, 100) as u8;

        match run(&volume_command(level)).await {
            Ok(_) => Ok(ToolOutput::json(json!({ "status": "success", "level": level }))),
            Err(e) => Ok(ToolOutput::error(e)),
        }
    }
}

// -- OpenApp -------------------------------------------------------------

struct OpenApp;

#[async_trait]
impl SkillFunction for OpenApp {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("open_app", "Open an application on the computer")
            .param(Param::string("app_name").required())
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        let app_name = args.str("app_name").unwrap_or_default().trim();
        if app_name.is_empty() {
            return Ok(ToolOutput::error("app_name is required"));
        }

        match run(&open_app_command(app_name)).await {
            Ok(_) => Ok(ToolOutput::json(json!({ "status": "success", "app": app_name }))),
            Err(e) => Ok(ToolOutput::error(e)),
        }
    }
}
