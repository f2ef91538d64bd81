//! Types shared by every crate of the command REST gateway.

pub mod error;
pub mod format;
pub mod target;
pub mod transport;

pub use error::ErrorCode;
pub use format::OutputFormat;
pub use target::{Role, Target};
pub use transport::{CommandReply, CommandRequest, CommandTransport, TransportError};
