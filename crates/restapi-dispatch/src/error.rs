use restapi_common::{ErrorCode, TransportError};
use thiserror::Error;

/// Request-scoped failures. Each one becomes a response; none is fatal.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Page not found")]
    OutsideBase,

    #[error("Invalid endpoint {0}")]
    UnknownEndpoint(String),

    #[error("Method {method} not allowed")]
    MethodNotAllowed { method: String, allow: String },

    #[error("{0}")]
    Validation(String),

    #[error("invalid target {target}: {reason}")]
    Target { target: String, reason: String },

    #[error("Error: {message} ({status})")]
    Backend { status: i32, message: String },

    #[error("Error: {0}")]
    Transport(#[from] TransportError),

    #[error("Error decoding JSON from {0}")]
    InvalidJson(String),
}

impl From<&DispatchError> for ErrorCode {
    fn from(e: &DispatchError) -> Self {
        match e {
            DispatchError::OutsideBase | DispatchError::UnknownEndpoint(_) => Self::NotFound,
            DispatchError::MethodNotAllowed { .. } => Self::MethodNotAllowed,
            DispatchError::Validation(_) => Self::ValidationFailure,
            DispatchError::Target { .. } => Self::TargetResolutionFailure,
            DispatchError::Backend { .. } | DispatchError::Transport(_) => {
                Self::BackendExecutionFailure
            }
            DispatchError::InvalidJson(_) => Self::FormattingFailure,
        }
    }
}
