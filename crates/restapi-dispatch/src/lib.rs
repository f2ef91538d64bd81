//! Request dispatch for the command REST gateway.
//!
//! [`Dispatcher`] matches a request against the frozen route table,
//! validates its parameters, runs the command through the backend
//! transport and formats the reply. [`http::routes`] exposes it over axum.

pub mod dispatch;
pub mod error;
pub mod format;
pub mod http;
pub mod params;

pub use dispatch::{ApiRequest, ApiResponse, Dispatcher};
pub use error::DispatchError;
pub use params::QueryParams;
