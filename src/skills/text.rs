use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use super::{Param, Skill, SkillFunction, ToolArgs, ToolOutput, ToolSchema, expand_home};
use crate::error::Result;
use crate::llm::{ChatBackend, ChatRequest, Message, prompts};

/// Shorter content is returned verbatim instead of summarized.
const MIN_SUMMARY_CHARS: usize = 100;
/// Only this much of a file is sent to the model.
const SUMMARY_INPUT_CHARS: usize = 4000;

/// Reads text files and summarizes them through the chat backend.
pub struct TextSkill {
    reader: Arc<TextReader>,
    backend: Arc<dyn ChatBackend>,
    summary_max_tokens: u32,
}

impl TextSkill {
    /// Relative paths that don't exist are retried under `fallback_dir`.
    pub fn new(backend: Arc<dyn ChatBackend>, fallback_dir: PathBuf, summary_max_tokens: u32) -> Self {
        Self {
            reader: Arc::new(TextReader { fallback_dir }),
            backend,
            summary_max_tokens,
        }
    }
}

impl Skill for TextSkill {
    fn name(&self) -> &str {
        "text_skill"
    }

    fn functions(&self) -> Vec<Arc<dyn SkillFunction>> {
        vec![
            Arc::new(SummarizeFile {
                reader: self.reader.clone(),
                backend: self.backend.clone(),
                max_tokens: self.summary_max_tokens,
            }),
            Arc::new(ReadFileContent(self.reader.clone())),
        ]
    }
}

struct TextReader {
    fallback_dir: PathBuf,
}

impl TextReader {
    fn locate(&self, filepath: &str) -> PathBuf {
        let path = expand_home(filepath.trim());
        if path.exists() {
            return path;
        }
        let fallback = self.fallback_dir.join(&path);
        if fallback.exists() { fallback } else { path }
    }

    /// The resolved path and its contents, or a user-facing failure.
    async fn read(&self, filepath: &str) -> std::result::Result<(PathBuf, String), String> {
        let path = self.locate(filepath);
        if !path.exists() {
            return Err(format!("File not found: {}", path.display()));
        }
        if !path.is_file() {
            return Err(format!("Path is not a file: {}", path.display()));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Error reading file: {e}"))?;
        let content = String::from_utf8(bytes)
            .map_err(|_| "File is not a valid text file (binary or encoding issue)".to_string())?;

        debug!(path = %path.display(), len = content.len(), "text file read");
        Ok((path, content))
    }
}

fn filepath_param() -> Param {
    Param::string("filepath").required()
}

// -- ReadFileContent -----------------------------------------------------

struct ReadFileContent(Arc<TextReader>);

#[async_trait]
impl SkillFunction for ReadFileContent {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "read_file_content",
            "Read and return the raw content of a text file",
        )
        .param(filepath_param().describe("Absolute path to the file to read"))
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        let filepath = args.require_str("filepath")?;
        match self.0.read(filepath).await {
            Ok((path, content)) => Ok(ToolOutput::json(json!({
                "status": "success",
                "filepath": path.display().to_string(),
                "length": content.chars().count(),
                "content": content,
            }))),
            Err(message) => Ok(ToolOutput::error(message)),
        }
    }
}

// -- SummarizeFile -------------------------------------------------------

struct SummarizeFile {
    reader: Arc<TextReader>,
    backend: Arc<dyn ChatBackend>,
    max_tokens: u32,
}

#[async_trait]
impl SkillFunction for SummarizeFile {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "summarize_file",
            "Read a text file and provide a summary of its contents",
        )
        .param(filepath_param().describe("Absolute path to the file to summarize"))
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        let filepath = args.require_str("filepath")?;
        let (path, content) = match self.reader.read(filepath).await {
            Ok(found) => found,
            Err(message) => return Ok(ToolOutput::error(message)),
        };

        if content.chars().count() < MIN_SUMMARY_CHARS {
            return Ok(ToolOutput::json(json!({
                "status": "success",
                "summary": format!("File is too short to summarize. Content: {content}"),
            })));
        }

        let excerpt: String = content.chars().take(SUMMARY_INPUT_CHARS).collect();
        let messages = [
            Message::system(prompts::SUMMARY_INSTRUCTION),
            Message::user(format!("Please summarize the following text:\n\n{excerpt}")),
        ];

        match self.backend.complete(&ChatRequest::new(&messages, self.max_tokens)).await {
            Ok(reply) => Ok(ToolOutput::json(json!({
                "status": "success",
                "filepath": path.display().to_string(),
                "summary": reply.content.unwrap_or_default(),
            }))),
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "summary request failed");
                Ok(ToolOutput::error(format!("Error generating summary: {e}")))
            }
        }
    }
}
