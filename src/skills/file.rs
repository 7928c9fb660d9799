use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::sandbox::SandboxedFs;
use super::{Param, Skill, SkillFunction, ToolArgs, ToolOutput, ToolSchema};
use crate::error::Result;

/// Create, read, write and append files inside one directory (the desktop
/// by default).
pub struct FileSkill {
    sandbox: SandboxedFs,
}

impl FileSkill {
    pub fn new(dir: PathBuf) -> Result<Self> {
        Ok(Self {
            sandbox: SandboxedFs::new(dir)?,
        })
    }
}

impl Skill for FileSkill {
    fn name(&self) -> &str {
        "file_skill"
    }

    fn functions(&self) -> Vec<Arc<dyn SkillFunction>> {
        vec![Arc::new(ManageFile {
            sandbox: self.sandbox.clone(),
        })]
    }
}

struct ManageFile {
    sandbox: SandboxedFs,
}

#[async_trait]
impl SkillFunction for ManageFile {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "manage_file",
            "Create, read, write, or append to files on the Desktop.",
        )
        .param(Param::one_of("action", &["read", "write", "create", "append"]).required())
        .param(Param::string("filename").required())
        .param(Param::string("content"))
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        let action = args.str("action").unwrap_or_default();
        let filename = args.str("filename").unwrap_or_default().trim();
        let content = args.str("content").unwrap_or_default();

        if filename.is_empty() {
            return Ok(ToolOutput::error("filename is required"));
        }

        let rel = Path::new(filename);
        debug!(action, ?rel, "managing file");

        match action {
            "read" => {
                if !self.sandbox.exists(rel) {
                    return Ok(ToolOutput::error("File not found."));
                }
                match self.sandbox.read_to_string(rel).await {
                    Ok(data) => Ok(ToolOutput::json(json!({
                        "status": "success",
                        "content": data,
                    }))),
                    Err(e) => Ok(ToolOutput::error(format!("failed to read: {e}"))),
                }
            }
            "write" | "create" => match self.sandbox.write(rel, content.as_bytes()).await {
                Ok(()) => Ok(ToolOutput::json(json!({
                    "status": "success",
                    "message": format!("Created {filename}."),
                }))),
                Err(e) => Ok(ToolOutput::error(format!("failed to write: {e}"))),
            },
            "append" => {
                let line = format!("\n{content}");
                match self.sandbox.append(rel, line.as_bytes()).await {
                    Ok(()) => Ok(ToolOutput::json(json!({
                        "status": "success",
                        "message": format!("Updated {filename}."),
                    }))),
                    Err(e) => Ok(ToolOutput::error(format!("failed to append: {e}"))),
                }
            }
            other => Ok(ToolOutput::error(format!(
                "unknown action '{other}': expected read, write, create or append"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        let mut a = ToolArgs::new();
        for (k, v) in pairs {
            a.set(*k, *v);
        }
        a
    }

    fn manage(dir: &Path) -> Arc<dyn SkillFunction> {
        let skill = FileSkill::new(dir.to_path_buf()).unwrap();
        skill.function_map().remove("manage_file").unwrap()
    }

    #[tokio::test]
    async fn create_append_read() {
        let tmp = tempfile::tempdir().unwrap();
        let f = manage(tmp.path());

        let out = f
            .call(args(&[("action", "create"), ("filename", "list.txt"), ("content", "milk")]))
            .await
            .unwrap();
        assert!(out.success);
        assert!(out.output.contains("Created list.txt."));

        let out = f
            .call(args(&[("action", "append"), ("filename", "list.txt"), ("content", "eggs")]))
            .await
            .unwrap();
        assert!(out.output.contains("Updated list.txt."));

        let out = f
            .call(args(&[("action", "read"), ("filename", "list.txt")]))
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out.output).unwrap();
        assert_eq!(v["content"], "milk\neggs");
    }

    #[tokio::test]
    async fn read_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let f = manage(tmp.path());
        let out = f
            .call(args(&[("action", "read"), ("filename", "nope.txt")]))
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.output.contains("File not found"));
    }

    #[tokio::test]
    async fn traversal_is_reported_not_raised() {
        let tmp = tempfile::tempdir().unwrap();
        let f = manage(tmp.path());
        let out = f
            .call(args(&[("action", "write"), ("filename", "../escape.txt"), ("content", "x")]))
            .await
            .unwrap();
        assert!(!out.success);
        assert!(!tmp.path().parent().unwrap().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn unknown_action_and_missing_filename() {
        let tmp = tempfile::tempdir().unwrap();
        let f = manage(tmp.path());
        let out = f
            .call(args(&[("action", "delete"), ("filename", "a.txt")]))
            .await
            .unwrap();
        assert!(!out.success);
        let out = f.call(args(&[("action", "read")])).await.unwrap();
        assert!(out.output.contains("filename is required"));
    }
}
