use thiserror::Error;

#[derive(Error, Debug)]
pub enum JarvisError {
    #[error("config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sandbox violation: {0}")]
    SandboxViolation(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("tool execution error: {0}")]
    ToolExecution(String),
}

pub type Result<T> = std::result::Result<T, JarvisError>;
