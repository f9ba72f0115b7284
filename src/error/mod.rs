//! Error types for turnwire.

use thiserror::Error;

/// Primary error type for all turnwire operations.
///
/// Tool faults normally never surface here: they are folded into
/// [`ToolOutcome`](crate::tools::ToolOutcome) at the dispatch boundary. The
/// `Tool*` variants exist for callers that want to lift an outcome back into
/// an error (see [`ToolOutcome::into_error`](crate::tools::ToolOutcome::into_error)).
#[derive(Error, Debug)]
pub enum TurnwireError {
    #[error("The API returned an empty response")]
    EmptyResponse,

    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Failed to parse tool arguments: {0}")]
    ToolParse(String),

    #[error("Tool runtime error: {0}")]
    ToolRuntime(String),

    #[error("Tool call rejected by the user")]
    ToolRejected,

    #[error("Tool timed out: {0}")]
    ToolTimeout(String),

    #[error("Unknown wire message type: {0}")]
    UnknownWireVariant(String),

    #[error("Invalid payload for wire message `{tag}`: {message}")]
    InvalidWirePayload { tag: String, message: String },

    #[error("Wire is shut down")]
    WireShutdown,

    #[error("Wire already has an active consumer")]
    WireBusy,

    #[error("Unknown approval request: {0}")]
    UnknownApprovalRequest(String),

    #[error("Approval request already resolved: {0}")]
    ApprovalAlreadyResolved(String),

    #[error("Approval request abandoned before resolution: {0}")]
    ApprovalAbandoned(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The generation itself failed (provider, empty response).
    Generation,
    /// The step was cancelled from outside.
    Cancellation,
    /// A single tool invocation failed.
    Tool,
    /// Decoding or encoding of a wire record failed.
    Codec,
    /// Wire channel or approval lifecycle failures.
    Wire,
    Configuration,
    Io,
    Unknown,
}

impl TurnwireError {
    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a payload validation error for a wire tag.
    pub fn invalid_payload(tag: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidWirePayload {
            tag: tag.into(),
            message: message.to_string(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyResponse | Self::Provider { .. } => ErrorCategory::Generation,
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::ToolNotFound(_)
            | Self::ToolParse(_)
            | Self::ToolRuntime(_)
            | Self::ToolRejected
            | Self::ToolTimeout(_) => ErrorCategory::Tool,
            Self::UnknownWireVariant(_)
            | Self::InvalidWirePayload { .. }
            | Self::Serialization(_) => ErrorCategory::Codec,
            Self::WireShutdown
            | Self::WireBusy
            | Self::UnknownApprovalRequest(_)
            | Self::ApprovalAlreadyResolved(_)
            | Self::ApprovalAbandoned(_) => ErrorCategory::Wire,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Io(_) => ErrorCategory::Io,
            Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this error aborts the step that observed it.
    ///
    /// Generation failures and cancellation always abort; tool faults are
    /// isolated per call and codec errors only fail the single decode.
    pub fn is_step_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Generation | ErrorCategory::Cancellation
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TurnwireError>;
