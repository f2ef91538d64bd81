use restapi_common::TransportError;
use thiserror::Error;

/// Failures while fetching or compiling the command catalog.
///
/// Every variant is fatal at startup: no partial catalog is served.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Can't get command descriptions from {role}: {message} ({status})")]
    Backend {
        role: String,
        status: i32,
        message: String,
    },

    #[error("Can't get command descriptions from {role}: {source}")]
    Transport {
        role: String,
        #[source]
        source: TransportError,
    },

    #[error("No REST commands offered by {0}")]
    Empty(String),

    #[error("Can't parse command descriptions: {0}")]
    Parse(String),

    #[error("Invalid catalog key: {0}")]
    InvalidKey(String),

    #[error("Unknown argument type {type_name} for {name}")]
    UnknownType { name: String, type_name: String },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Why a single raw value was rejected by an argument type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgError {
    #[error("{0}")]
    Format(String),

    #[error("{0}")]
    Range(String),

    #[error("{0}")]
    Choice(String),
}
