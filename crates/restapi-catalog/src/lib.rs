//! Command catalog for the REST gateway.
//!
//! Descriptors fetched from the backend roles are parsed into a signature
//! model, compiled into URL paths plus residual parameters, and grouped
//! into a frozen [`RouteTable`] that request handlers share read-only.

pub mod argtype;
pub mod catalog;
pub mod compile;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod method;
pub mod signature;
pub mod table;

pub use argtype::ArgType;
pub use catalog::Catalog;
pub use compile::{compile, BasePath, CompiledRoute, TARGET_PLACEHOLDER, TELL_PREFIX};
pub use descriptor::{CommandDescriptor, Flavor, Permission};
pub use error::{ArgError, CatalogError};
pub use loader::fetch_catalog;
pub use method::{HttpMethod, MethodSet};
pub use signature::{concise_sig, ArgDescriptor, ArgKind};
pub use table::{RouteEntry, RouteSlot, RouteTable};
