mod fallback;
mod sanitize;

pub use fallback::{ArgumentPolicy, LocationFallback, PolicyOutcome};
pub use sanitize::PlaceholderSet;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::JarvisError;
use crate::llm::{AssistantReply, ChatBackend, ChatRequest, Message, ToolCall, ToolChoice, prompts};
use crate::skills::{SkillRegistry, ToolArgs};

pub const BACKEND_APOLOGY: &str = "I am having trouble connecting to the brain, sir.";
pub const TOOL_UNAVAILABLE: &str = "I tried to use a tool, but it was unavailable.";
pub const EXECUTION_FAILED: &str = "I encountered an error while executing the request.";

// -- Turn model -------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Drafting,
    AwaitingModel,
    Direct,
    ToolExecuting,
    AwaitingFinalModel,
    Done,
    Errored,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Drafting => "drafting",
            Self::AwaitingModel => "awaiting_model",
            Self::Direct => "direct",
            Self::ToolExecuting => "tool_executing",
            Self::AwaitingFinalModel => "awaiting_final_model",
            Self::Done => "done",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}

fn enter(state: TurnState) {
    debug!(state = %state, "turn state");
}

/// Why a turn was abandoned.  Never shown to the user directly; see
/// [`TurnFault::user_message`].
#[derive(Debug, thiserror::Error)]
pub enum TurnFault {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[source] JarvisError),

    #[error("tool '{0}' is not registered")]
    ToolUnresolved(String),

    #[error("malformed arguments for '{tool}': {source}")]
    ArgumentMalformed {
        tool: String,
        #[source]
        source: JarvisError,
    },

    #[error("tool '{tool}' failed: {source}")]
    ToolExecutionFailed {
        tool: String,
        #[source]
        source: JarvisError,
    },
}

impl TurnFault {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BackendUnavailable(_) => BACKEND_APOLOGY,
            Self::ToolUnresolved(_) => TOOL_UNAVAILABLE,
            Self::ArgumentMalformed { .. } | Self::ToolExecutionFailed { .. } => EXECUTION_FAILED,
        }
    }
}

/// How a turn that did not fault ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model's final content; `None` if it returned none.
    Answer(Option<String>),
    /// A required input is missing; ask the user this.
    Clarify(String),
}

enum CallStep {
    Completed(Message),
    NeedsInput(String),
}

// -- Engine -----------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub system_prompt: String,
    pub tool_max_tokens: u32,
    pub final_max_tokens: u32,
    pub timeout: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        let secs = if config.llm.timeout_secs > 0 {
            config.llm.timeout_secs
        } else {
            300
        };
        Self {
            system_prompt: prompts::system_instruction(&config.agent_name),
            tool_max_tokens: config.llm.tool_max_tokens,
            final_max_tokens: config.llm.final_max_tokens,
            timeout: Duration::from_secs(secs),
        }
    }
}

/// Runs one utterance through the model, executing any tools it requests.
///
/// Holds no per-turn state, so a single engine can serve concurrent turns.
pub struct ConversationEngine {
    backend: Arc<dyn ChatBackend>,
    registry: Arc<SkillRegistry>,
    placeholders: PlaceholderSet,
    policies: Vec<Box<dyn ArgumentPolicy>>,
    settings: EngineSettings,
}

impl ConversationEngine {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        registry: Arc<SkillRegistry>,
        settings: EngineSettings,
    ) -> Self {
        info!(
            backend = backend.name(),
            tools = registry.len(),
            "conversation engine ready"
        );
        Self {
            backend,
            registry,
            placeholders: PlaceholderSet::default(),
            policies: Vec::new(),
            settings,
        }
    }

    pub fn with_policy(mut self, policy: impl ArgumentPolicy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    pub fn with_placeholders(mut self, placeholders: PlaceholderSet) -> Self {
        self.placeholders = placeholders;
        self
    }

    /// Process one utterance and return the text to present.  Faults are
    /// logged and mapped to fixed replies here and nowhere else.
    pub async fn run_conversation(&self, user_text: &str) -> Option<String> {
        match self.run_turn(user_text).await {
            Ok(TurnOutcome::Answer(content)) => content,
            Ok(TurnOutcome::Clarify(question)) => Some(question),
            Err(fault) => {
                enter(TurnState::Errored);
                match &fault {
                    TurnFault::BackendUnavailable(e) => error!(error = %e, "turn aborted"),
                    other => warn!(fault = %other, "turn aborted"),
                }
                Some(fault.user_message().to_string())
            }
        }
    }

    /// The turn state machine without the user-facing mapping.
    pub async fn run_turn(&self, user_text: &str) -> Result<TurnOutcome, TurnFault> {
        enter(TurnState::Drafting);
        let mut messages = vec![
            Message::system(self.settings.system_prompt.as_str()),
            Message::user(user_text),
        ];

        enter(TurnState::AwaitingModel);
        let mut request = ChatRequest::new(&messages, self.settings.tool_max_tokens);
        let schemas = self.registry.tool_schemas();
        if !schemas.is_empty() {
            request = request.with_tools(schemas, ToolChoice::Auto);
        }
        let reply = self.ask(&request).await?;

        if !reply.has_tool_calls() {
            enter(TurnState::Direct);
            enter(TurnState::Done);
            return Ok(TurnOutcome::Answer(reply.content));
        }

        enter(TurnState::ToolExecuting);
        info!(tool_calls = reply.tool_calls.len(), "model requested tools");
        let calls = reply.tool_calls.clone();
        messages.push(reply.into_message());

        for call in &calls {
            match self.execute(call).await? {
                CallStep::Completed(result) => messages.push(result),
                CallStep::NeedsInput(question) => {
                    enter(TurnState::Done);
                    return Ok(TurnOutcome::Clarify(question));
                }
            }
        }

        enter(TurnState::AwaitingFinalModel);
        let request = ChatRequest::new(&messages, self.settings.final_max_tokens);
        let reply = self.ask(&request).await?;

        enter(TurnState::Done);
        Ok(TurnOutcome::Answer(reply.content))
    }

    async fn ask(&self, request: &ChatRequest<'_>) -> Result<AssistantReply, TurnFault> {
        match tokio::time::timeout(self.settings.timeout, self.backend.complete(request)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(TurnFault::BackendUnavailable(e)),
            Err(_) => Err(TurnFault::BackendUnavailable(JarvisError::Llm(format!(
                "{} timed out after {:?}",
                self.backend.name(),
                self.settings.timeout
            )))),
        }
    }

    /// Resolve, sanitize, apply policies and invoke one tool call.
    async fn execute(&self, call: &ToolCall) -> Result<CallStep, TurnFault> {
        let name = call.name();
        let function = self
            .registry
            .resolve(name)
            .ok_or_else(|| TurnFault::ToolUnresolved(name.to_string()))?;

        let mut args =
            ToolArgs::parse(Some(call.arguments())).map_err(|source| TurnFault::ArgumentMalformed {
                tool: name.to_string(),
                source,
            })?;

        let cleared = self.placeholders.sanitize(&mut args);
        if !cleared.is_empty() {
            debug!(tool = %name, keys = ?cleared, "placeholder arguments cleared");
        }

        for policy in self.policies.iter().filter(|p| p.tool() == name) {
            if let PolicyOutcome::Clarify(question) = policy.apply(&mut args) {
                info!(tool = %name, "missing input, asking user");
                return Ok(CallStep::NeedsInput(question));
            }
        }

        debug!(tool = %name, id = %call.id, args = ?args.as_map(), "invoking tool");
        let output = function
            .call(args)
            .await
            .map_err(|source| TurnFault::ToolExecutionFailed {
                tool: name.to_string(),
                source,
            })?;
        info!(tool = %name, success = output.success, "tool finished");

        Ok(CallStep::Completed(Message::tool(
            call.id.as_str(),
            name,
            output.to_string(),
        )))
    }
}
