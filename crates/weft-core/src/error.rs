use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeftError {
    // Plan errors
    #[error("workflow plan contains a cycle involving node '{0}'")]
    PlanCycle(String),

    // Configuration errors
    #[error("no executor registered for node kind {0}")]
    UnknownNodeKind(String),

    #[error("{kind} node is missing required field `{field}`")]
    MissingConfig { kind: String, field: String },

    #[error("{kind} node configuration invalid: {message}")]
    InvalidConfig { kind: String, message: String },

    #[error("invalid variable name: {0}")]
    InvalidVariableName(String),

    // Agent errors
    #[error("agent node '{0}' has no chat model attached")]
    AgentMissingModel(String),

    #[error("agent node '{0}' has no usable API key")]
    AgentMissingKey(String),

    // Security / tenancy errors
    #[error("credential error: {0}")]
    Credential(String),

    #[error("tenancy violation: {0}")]
    Tenancy(String),

    // Template errors
    #[error("template error: {0}")]
    Template(String),

    // Storage errors
    #[error("database error: {0}")]
    Database(String),

    // External I/O errors
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("email send failed: {0}")]
    Email(String),

    // Channel errors
    #[error("status channel error: {0}")]
    Channel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WeftError {
    /// Whether the enclosing durable step may retry this failure.
    ///
    /// Configuration, plan, tenancy, and credential errors are permanent;
    /// only external I/O is worth a second attempt.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            WeftError::Http(_) | WeftError::Llm(_) | WeftError::Email(_) | WeftError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WeftError>;
