use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::system::{Invocation, run};
use super::{Param, Skill, SkillFunction, ToolArgs, ToolOutput, ToolSchema};
use crate::error::Result;

/// Opens searches in the default browser.
pub struct WebSkill;

impl Skill for WebSkill {
    fn name(&self) -> &str {
        "web_skill"
    }

    fn functions(&self) -> Vec<Arc<dyn SkillFunction>> {
        vec![Arc::new(GoogleSearch)]
    }
}

struct GoogleSearch;

#[async_trait]
impl SkillFunction for GoogleSearch {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("google_search", "Search Google for a query")
            .param(Param::string("search_term").required())
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        let term = args.str("search_term").unwrap_or_default().trim();
        if term.is_empty() {
            return Ok(ToolOutput::error("search_term is required"));
        }

        match run(&browser_command(&search_url(term))).await {
            Ok(_) => Ok(ToolOutput::json(json!({
                "status": "opened browser",
                "term": term,
            }))),
            Err(e) => Ok(ToolOutput::error(e)),
        }
    }
}

fn search_url(term: &str) -> String {
    format!("https://www.google.com/search?q={}", urlencoding(term))
}

fn browser_command(url: &str) -> Invocation {
    if cfg!(target_os = "macos") {
        Invocation::new("open", &[url])
    } else if cfg!(target_os = "windows") {
        Invocation::new("cmd", &["/C", "start", "", url])
    } else {
        Invocation::new("xdg-open", &[url])
    }
}

pub fn urlencoding(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
