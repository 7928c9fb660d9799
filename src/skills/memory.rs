use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Param, Skill, SkillFunction, ToolArgs, ToolOutput, ToolSchema};
use crate::error::Result;

/// Persistent key/value facts stored in a JSON file.
pub struct MemorySkill {
    store: Arc<MemoryStore>,
}

impl MemorySkill {
    pub fn new(path: PathBuf) -> Self {
        Self {
            store: Arc::new(MemoryStore {
                path,
                lock: Mutex::new(()),
            }),
        }
    }
}

impl Skill for MemorySkill {
    fn name(&self) -> &str {
        "memory_skill"
    }

    fn functions(&self) -> Vec<Arc<dyn SkillFunction>> {
        vec![
            Arc::new(RememberFact(self.store.clone())),
            Arc::new(RetrieveMemory(self.store.clone())),
            Arc::new(ListAllMemories(self.store.clone())),
            Arc::new(ForgetFact(self.store.clone())),
        ]
    }
}

type Facts = Map<String, Value>;

/// The file is re-read on every call so external edits are picked up; the
/// mutex serializes read-modify-write cycles within the process.
struct MemoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl MemoryStore {
    /// A missing file is an empty store.  A file that exists but cannot be
    /// read as a JSON object is an error, so it is never overwritten.
    async fn load(&self) -> std::result::Result<Facts, String> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Facts::new()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "memory file unreadable");
                return Err(format!("Memory file could not be read: {e}"));
            }
        };
        if contents.trim().is_empty() {
            return Ok(Facts::new());
        }
        serde_json::from_str(&contents).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "memory file corrupt, leaving it untouched");
            format!("Memory file is corrupt and was left untouched: {e}")
        })
    }

    async fn save(&self, facts: &Facts) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(facts)?;
        tokio::fs::write(&self.path, contents).await?;
        debug!(path = %self.path.display(), entries = facts.len(), "memory saved");
        Ok(())
    }
}

// -- RememberFact --------------------------------------------------------

struct RememberFact(Arc<MemoryStore>);

#[async_trait]
impl SkillFunction for RememberFact {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "remember_fact",
            "Store a piece of information in persistent memory for later recall",
        )
        .param(
            Param::string("key")
                .describe("A short identifier for this memory (e.g., 'favorite_color', 'birthday')")
                .required(),
        )
        .param(Param::string("value").describe("The information to remember").required())
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        let key = args.require_str("key")?.trim().to_string();
        let value = args.require_str("value")?.to_string();

        let _guard = self.0.lock.lock().await;
        let mut facts = match self.0.load().await {
            Ok(facts) => facts,
            Err(message) => return Ok(ToolOutput::error(message)),
        };
        facts.insert(key.clone(), Value::String(value.clone()));
        if let Err(e) = self.0.save(&facts).await {
            return Ok(ToolOutput::error(format!("Failed to store memory: {e}")));
        }

        Ok(ToolOutput::json(json!({
            "status": "success",
            "message": format!("I will remember that {key} is {value}"),
            "key": key,
            "value": value,
        })))
    }
}

// -- RetrieveMemory ------------------------------------------------------

struct RetrieveMemory(Arc<MemoryStore>);

#[async_trait]
impl SkillFunction for RetrieveMemory {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "retrieve_memory",
            "Retrieve a previously stored piece of information from memory",
        )
        .param(
            Param::string("item_name")
                .describe("The name of the item to retrieve (e.g., 'user_name')")
                .required(),
        )
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        let item = args.require_str("item_name")?.trim();

        let _guard = self.0.lock.lock().await;
        let facts = match self.0.load().await {
            Ok(facts) => facts,
            Err(message) => return Ok(ToolOutput::error(message)),
        };

        match facts.get(item) {
            Some(value) => Ok(ToolOutput::json(json!({
                "status": "success",
                "item_name": item,
                "value": value,
            }))),
            None => Ok(ToolOutput::json(json!({
                "status": "not_found",
                "message": format!("I don't remember anything about '{item}'"),
            }))),
        }
    }
}

// -- ListAllMemories -----------------------------------------------------

struct ListAllMemories(Arc<MemoryStore>);

#[async_trait]
impl SkillFunction for ListAllMemories {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("list_all_memories", "List all stored memories and their keys")
    }

    async fn call(&self, _args: ToolArgs) -> Result<ToolOutput> {
        let _guard = self.0.lock.lock().await;
        let facts = match self.0.load().await {
            Ok(facts) => facts,
            Err(message) => return Ok(ToolOutput::error(message)),
        };

        if facts.is_empty() {
            return Ok(ToolOutput::json(json!({
                "status": "success",
                "message": "I don't have any memories stored yet",
                "memories": {},
            })));
        }

        Ok(ToolOutput::json(json!({
            "status": "success",
            "count": facts.len(),
            "memories": facts,
        })))
    }
}

// -- ForgetFact ----------------------------------------------------------

struct ForgetFact(Arc<MemoryStore>);

#[async_trait]
impl SkillFunction for ForgetFact {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("forget_fact", "Delete a specific memory from storage").param(
            Param::string("key")
                .describe("The identifier for the memory to delete")
                .required(),
        )
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        let key = args.require_str("key")?.trim();

        let _guard = self.0.lock.lock().await;
        let mut facts = match self.0.load().await {
            Ok(facts) => facts,
            Err(message) => return Ok(ToolOutput::error(message)),
        };

        if facts.remove(key).is_none() {
            return Ok(ToolOutput::json(json!({
                "status": "not_found",
                "message": format!("I don't have any memory about '{key}' to forget"),
            })));
        }

        if let Err(e) = self.0.save(&facts).await {
            return Ok(ToolOutput::error(format!("Failed to forget memory: {e}")));
        }

        Ok(ToolOutput::json(json!({
            "status": "success",
            "message": format!("I have forgotten about '{key}'"),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(dir: &tempfile::TempDir) -> MemorySkill {
        MemorySkill::new(dir.path().join("nested").join("memory.json"))
    }

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        let mut a = ToolArgs::new();
        for (k, v) in pairs {
            a.set(*k, *v);
        }
        a
    }

    async fn call(skill: &MemorySkill, tool: &str, a: ToolArgs) -> Value {
        let out = skill.function_map()[tool].call(a).await.unwrap();
        serde_json::from_str(&out.output).unwrap()
    }

    #[tokio::test]
    async fn remember_then_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        let s = skill(&dir);

        let v = call(&s, "remember_fact", args(&[("key", "favorite_color"), ("value", "blue")])).await;
        assert_eq!(v["status"], "success");
        assert_eq!(v["message"], "I will remember that favorite_color is blue");

        let v = call(&s, "retrieve_memory", args(&[("item_name", "favorite_color")])).await;
        assert_eq!(v["value"], "blue");
    }

    #[tokio::test]
    async fn retrieve_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let s = skill(&dir);
        let v = call(&s, "retrieve_memory", args(&[("item_name", "birthday")])).await;
        assert_eq!(v["status"], "not_found");
    }

    #[tokio::test]
    async fn list_and_forget() {
        let dir = tempfile::tempdir().unwrap();
        let s = skill(&dir);

        let v = call(&s, "list_all_memories", ToolArgs::new()).await;
        assert_eq!(v["memories"], json!({}));

        call(&s, "remember_fact", args(&[("key", "a"), ("value", "1")])).await;
        call(&s, "remember_fact", args(&[("key", "b"), ("value", "2")])).await;
        let v = call(&s, "list_all_memories", ToolArgs::new()).await;
        assert_eq!(v["count"], 2);

        let v = call(&s, "forget_fact", args(&[("key", "a")])).await;
        assert_eq!(v["status"], "success");
        let v = call(&s, "forget_fact", args(&[("key", "a")])).await;
        assert_eq!(v["status"], "not_found");

        let v = call(&s, "list_all_memories", ToolArgs::new()).await;
        assert_eq!(v["count"], 1);
        assert_eq!(v["memories"]["b"], "2");
    }

    #[tokio::test]
    async fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        call(&skill(&dir), "remember_fact", args(&[("key", "name"), ("value", "Tony")])).await;
        let v = call(&skill(&dir), "retrieve_memory", args(&[("item_name", "name")])).await;
        assert_eq!(v["value"], "Tony");
    }

    #[tokio::test]
    async fn keeps_non_string_values_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let s = skill(&dir);
        let path = dir.path().join("nested").join("memory.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"age": 30, "name": "Tony", "tags": ["a", "b"]}"#).unwrap();

        let v = call(&s, "remember_fact", args(&[("key", "color"), ("value", "red")])).await;
        assert_eq!(v["status"], "success");

        let stored: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, json!({"age": 30, "name": "Tony", "tags": ["a", "b"], "color": "red"}));

        let v = call(&s, "retrieve_memory", args(&[("item_name", "age")])).await;
        assert_eq!(v["value"], 30);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported_and_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let s = skill(&dir);
        let path = dir.path().join("nested").join("memory.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        for (tool, a) in [
            ("remember_fact", args(&[("key", "color"), ("value", "red")])),
            ("forget_fact", args(&[("key", "color")])),
            ("retrieve_memory", args(&[("item_name", "color")])),
            ("list_all_memories", ToolArgs::new()),
        ] {
            let out = s.function_map()[tool].call(a).await.unwrap();
            assert!(!out.success, "{tool}");
            assert!(out.output.contains("corrupt"), "{tool}: {}", out.output);
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[tokio::test]
    async fn missing_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = skill(&dir);
        let result = s.function_map()["remember_fact"]
            .call(args(&[("value", "x")]))
            .await;
        assert!(result.is_err());
    }
}
