use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Skill, SkillFunction, ToolSchema};

/// Registry of every loaded skill.
///
/// Holds the combined tool schemas in registration order (sent verbatim to
/// the model) and one flattened name -> function map.  Built once at startup,
/// then shared read-only behind an `Arc`.
#[derive(Default)]
pub struct SkillRegistry {
    skills: Vec<String>,
    schemas: Vec<ToolSchema>,
    functions: HashMap<String, Arc<dyn SkillFunction>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill.
    ///
    /// Schemas are appended, so registering the same skill twice lists its
    /// schemas twice.  On a function-name collision the later registration
    /// replaces the earlier function without error.
    pub fn register(&mut self, skill: &dyn Skill) {
        let schemas = skill.tool_schemas();
        let functions = skill.function_map();

        for schema in &schemas {
            if !functions.contains_key(&schema.name) {
                warn!(
                    skill = skill.name(),
                    tool = %schema.name,
                    "skill advertises a tool it has no function for"
                );
            }
        }

        for (name, function) in functions {
            if self.functions.insert(name.clone(), function).is_some() {
                debug!(skill = skill.name(), tool = %name, "tool function replaced by later registration");
            }
        }

        info!(skill = skill.name(), tools = schemas.len(), "skill registered");
        self.schemas.extend(schemas);
        self.skills.push(skill.name().to_string());
    }

    /// All tool schemas in registration order.
    pub fn tool_schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    /// Serialized tool-advertisement payload.
    pub fn tool_definitions(&self) -> Vec<Value> {
        self.schemas.iter().map(ToolSchema::to_definition).collect()
    }

    /// Look up a function by exact tool name.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn SkillFunction>> {
        self.functions.get(name).cloned()
    }

    /// Names of registered skills, in registration order.
    pub fn skill_names(&self) -> &[String] {
        &self.skills
    }

    /// Number of advertised tool schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
