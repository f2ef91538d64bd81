//! The seam to the backend administrative system.
//!
//! The gateway never runs commands itself: it hands a fully validated
//! [`CommandRequest`] to a [`CommandTransport`] and relays the reply.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::target::Target;

/// Prefix of the catalog query every backend role answers.
pub const DESCRIBE_PREFIX: &str = "get_command_descriptions";

/// A command ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// Space-joined prefix words, e.g. `"osd pool set"`.
    pub prefix: String,
    pub target: Target,
    /// Validated arguments plus the derived `format`/`module`/`perm` fields.
    pub args: Map<String, Value>,
    /// Request body, passed through untouched.
    pub inbuf: Vec<u8>,
}

impl CommandRequest {
    /// Catalog query for one backend role.
    pub fn describe(target: Target) -> Self {
        Self {
            prefix: DESCRIBE_PREFIX.to_string(),
            target,
            args: Map::new(),
            inbuf: Vec::new(),
        }
    }
}

/// Raw reply from the backend: `(status, output, message)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandReply {
    pub status: i32,
    pub output: Vec<u8>,
    pub message: String,
}

impl CommandReply {
    pub fn ok(output: impl Into<Vec<u8>>, message: impl Into<String>) -> Self {
        Self {
            status: 0,
            output: output.into(),
            message: message.into(),
        }
    }

    pub fn failed(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            output: Vec::new(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("backend endpoints not configured")]
    NotConfigured,

    #[error("backend not reachable: {0}")]
    Unreachable(String),

    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("invalid backend reply: {0}")]
    Decode(String),
}

/// Executes commands against the backend.
///
/// Calls are blocking and bounded by `timeout`; callers on an async
/// runtime move them onto a blocking thread. Implementations must be
/// shareable across request tasks.
pub trait CommandTransport: Send + Sync {
    fn submit(
        &self,
        request: &CommandRequest,
        timeout: Duration,
    ) -> Result<CommandReply, TransportError>;
}

impl<T: CommandTransport + ?Sized> CommandTransport for std::sync::Arc<T> {
    fn submit(
        &self,
        request: &CommandRequest,
        timeout: Duration,
    ) -> Result<CommandReply, TransportError> {
        (**self).submit(request, timeout)
    }
}
