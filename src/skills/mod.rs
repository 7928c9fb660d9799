pub mod datetime;
pub mod email;
pub mod file;
pub mod memory;
pub mod registry;
pub mod sandbox;
pub mod screenshot;
pub mod system;
pub mod text;
pub mod weather;
pub mod web;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::error::{JarvisError, Result};

pub use registry::SkillRegistry;

// -- Tool schemas -----------------------------------------------------------

/// Type of a single tool parameter.  Kept to the primitives that every
/// function-calling model handles reliably.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    /// A string restricted to the listed values.
    Enum(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub description: Option<String>,
    pub required: bool,
}

impl Param {
    fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Integer)
    }

    pub fn one_of(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(
            name,
            ParamKind::Enum(values.iter().map(|v| v.to_string()).collect()),
        )
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn to_property(&self) -> Value {
        let mut prop = match &self.kind {
            ParamKind::String => json!({ "type": "string" }),
            ParamKind::Integer => json!({ "type": "integer" }),
            ParamKind::Enum(values) => json!({ "type": "string", "enum": values }),
        };
        if let Some(ref desc) = self.description {
            prop["description"] = Value::String(desc.clone());
        }
        prop
    }
}

/// Declarative description of one callable, advertised to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub params: Vec<Param>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn required_params(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// OpenAI function-tool definition:
    /// `{"type": "function", "function": {name, description, parameters}}`.
    pub fn to_definition(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.to_property()))
            .collect();

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": self.required_params(),
                }
            }
        })
    }
}

// -- Arguments --------------------------------------------------------------

/// Named arguments for one function call.
///
/// JSON `null` is the absent-value marker: the accessors treat a `null`
/// entry exactly like a missing key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the model's JSON argument payload.  A missing or blank payload
    /// is an empty object; anything that is not a JSON object is rejected.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Ok(Self::new());
        }
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(JarvisError::InvalidArgument(format!(
                "expected a JSON object of arguments, got {other}"
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.str(key)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| JarvisError::InvalidArgument(format!("{key} is required")))
    }

    /// Integer argument; numeric strings are accepted since models often
    /// quote numbers.
    pub fn i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// True when the key is missing or `null`.
    pub fn is_absent(&self, key: &str) -> bool {
        self.get(key).is_none()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.0.iter_mut()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ToolArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// -- Output -----------------------------------------------------------------

/// Output from a skill function.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    /// Expected failure (bad input, missing key, file not found) reported
    /// back to the model rather than aborting the turn.
    pub fn error(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }

    /// Structured success envelope, e.g. `{"status": "success", ...}`.
    pub fn json(value: Value) -> Self {
        Self::ok(value.to_string())
    }
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            f.write_str(&self.output)
        } else {
            let envelope = json!({ "status": "error", "message": self.output });
            write!(f, "{envelope}")
        }
    }
}

// -- Capability contract ----------------------------------------------------

/// One callable exposed to the model.
#[async_trait]
pub trait SkillFunction: Send + Sync {
    /// Schema advertised to the model.  Its `name` is the dispatch key.
    fn schema(&self) -> ToolSchema;

    /// Run with sanitized arguments.  `Err` aborts the whole turn.
    async fn call(&self, args: ToolArgs) -> Result<ToolOutput>;
}

/// A unit of capability: a stable name plus the functions it contributes.
pub trait Skill: Send + Sync {
    fn name(&self) -> &str;

    fn functions(&self) -> Vec<Arc<dyn SkillFunction>>;

    /// Schemas in the order the skill lists its functions.
    fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.functions().iter().map(|f| f.schema()).collect()
    }

    /// Tool name -> callable.
    fn function_map(&self) -> HashMap<String, Arc<dyn SkillFunction>> {
        self.functions()
            .into_iter()
            .map(|f| (f.schema().name, f))
            .collect()
    }
}

/// Expand a leading `~` to the home directory.
pub(crate) fn expand_home(path: &str) -> std::path::PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    std::path::PathBuf::from(path)
}
