use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use serde_json::json;
use tracing::info;

use super::system::{Invocation, run};
use super::{Param, Skill, SkillFunction, ToolArgs, ToolOutput, ToolSchema};
use crate::error::Result;

/// Full-screen captures saved as PNG files.
pub struct ScreenshotSkill {
    dir: PathBuf,
}

impl ScreenshotSkill {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl Skill for ScreenshotSkill {
    fn name(&self) -> &str {
        "screenshot_skill"
    }

    fn functions(&self) -> Vec<Arc<dyn SkillFunction>> {
        vec![Arc::new(TakeScreenshot {
            dir: self.dir.clone(),
        })]
    }
}

struct TakeScreenshot {
    dir: PathBuf,
}

/// `<name>.png`, defaulting to a timestamped name.  Only the final path
/// component is kept so the file always lands in the screenshot directory.
fn screenshot_filename(requested: Option<&str>) -> String {
    let base = requested
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| Path::new(s).file_name())
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("screenshot_{}", Local::now().format("%Y%m%d_%H%M%S")));

    if base.ends_with(".png") {
        base
    } else {
        format!("{base}.png")
    }
}

fn capture_command(path: &Path) -> Invocation {
    let path = path.to_string_lossy();
    if cfg!(target_os = "macos") {
        Invocation::new("screencapture", &["-x", &path])
    } else {
        Invocation::new("gnome-screenshot", &["-f", &path])
    }
}

#[async_trait]
impl SkillFunction for TakeScreenshot {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "take_screenshot",
            "Take a screenshot of the entire screen and save it to a file. Returns the path to the saved screenshot.",
        )
        .param(Param::string("filename").describe(
            "Optional custom filename for the screenshot (without extension). If not provided, uses timestamp.",
        ))
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(screenshot_filename(args.str("filename")));

        if let Err(e) = run(&capture_command(&path)).await {
            return Ok(ToolOutput::error(format!("Failed to capture screenshot: {e}")));
        }
        if !path.exists() {
            return Ok(ToolOutput::error("Failed to capture screenshot"));
        }

        info!(path = %path.display(), "screenshot saved");
        Ok(ToolOutput::json(json!({
            "status": "success",
            "message": "Screenshot saved successfully",
            "path": path.display().to_string(),
        })))
    }
}
