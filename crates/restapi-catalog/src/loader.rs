//! Startup catalog fetch from the backend roles.

use std::collections::BTreeMap;
use std::time::Duration;

use restapi_common::{CommandRequest, CommandTransport, Target};

use crate::catalog::Catalog;
use crate::descriptor::{parse_descriptions, CommandDescriptor, REST_CONSUMER};
use crate::error::{CatalogError, Result};

/// Role whose catalog is served as-is.
pub fn primary_role() -> Target {
    Target::mon()
}

/// osd.0 is the arbiter of valid osd commands.
pub fn secondary_role() -> Target {
    Target::osd(0)
}

/// Fetch and merge the catalogs of the primary and secondary roles.
///
/// Any failure is fatal to startup; nothing partial is returned.
pub fn fetch_catalog(transport: &dyn CommandTransport, timeout: Duration) -> Result<Catalog> {
    let primary = fetch_role(transport, primary_role(), timeout)?;
    let mut catalog = Catalog::from_primary(primary);
    if catalog.is_empty() {
        let err = CatalogError::Empty(primary_role().to_string());
        tracing::error!(error = %err, "Catalog fetch failed");
        return Err(err);
    }
    let secondary = fetch_role(transport, secondary_role(), timeout)?;
    catalog.merge_secondary(secondary);
    tracing::info!(commands = catalog.len(), "Command catalog loaded");
    Ok(catalog)
}

fn fetch_role(
    transport: &dyn CommandTransport,
    target: Target,
    timeout: Duration,
) -> Result<BTreeMap<u32, CommandDescriptor>> {
    let role = target.to_string();
    let reply = transport
        .submit(&CommandRequest::describe(target), timeout)
        .map_err(|source| CatalogError::Transport {
            role: role.clone(),
            source,
        })?;
    if !reply.is_success() {
        let err = CatalogError::Backend {
            role,
            status: reply.status,
            message: reply.message,
        };
        tracing::error!(error = %err, "Catalog fetch failed");
        return Err(err);
    }
    parse_descriptions(&reply.output, REST_CONSUMER).inspect_err(|e| {
        tracing::error!(error = %e, role = %role, "Catalog parse failed");
    })
}
