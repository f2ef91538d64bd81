/// Machine-readable codes for request-scoped failures.
/// Shared by the dispatcher and the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Unknown endpoint with no discovery matches.
    NotFound,
    /// Unknown endpoint, but the catalog has commands under the same prefix.
    InvalidEndpointHelp,
    /// Known endpoint requested with a method none of its entries allow.
    MethodNotAllowed,
    /// No candidate entry accepted the supplied parameters.
    ValidationFailure,
    /// Malformed tell target segment or pgid.
    TargetResolutionFailure,
    /// The backend returned a non-zero status, timed out, or was unreachable.
    BackendExecutionFailure,
    /// The requested envelope could not be built from the backend output.
    FormattingFailure,
}

impl ErrorCode {
    /// Suggested HTTP status code for this error.
    /// Transport-agnostic (returns u16, not an axum type).
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidEndpointHelp
            | Self::ValidationFailure
            | Self::TargetResolutionFailure
            | Self::BackendExecutionFailure => 400,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::FormattingFailure => 500,
        }
    }
}
