//! Command descriptors as fetched from a backend role.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{CatalogError, Result};
use crate::method::{HttpMethod, MethodSet};
use crate::signature::{concise_sig, parse_signature, ArgDescriptor};

/// Consumer name descriptors must list in `avail` to be served here.
pub const REST_CONSUMER: &str = "rest";

/// Prefix of catalog keys (`cmd000`, `cmd001`, ...).
const KEY_PREFIX: &str = "cmd";

/// How a command's target is resolved and its path compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// Runs on the monitor quorum.
    Standard,
    /// Placement-group command; the target comes from `pgid`.
    PgTarget,
    /// Daemon command reached through `tell/<target>/...`.
    TellTarget,
}

/// Permission marker string (`r`, `w`, `rw`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission(String);

impl Permission {
    pub fn new(perm: impl Into<String>) -> Self {
        Self(perm.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn reads(&self) -> bool {
        self.0.contains('r')
    }

    pub fn writes(&self) -> bool {
        self.0.contains('w')
    }

    /// `r` allows GET; `w` allows PUT and DELETE. Both may apply.
    pub fn methods(&self) -> MethodSet {
        let mut methods = MethodSet::default();
        if self.reads() {
            methods.insert(HttpMethod::Get);
        }
        if self.writes() {
            methods.insert(HttpMethod::Put);
            methods.insert(HttpMethod::Delete);
        }
        methods
    }
}

/// One backend command. Created once at startup, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDescriptor {
    pub key: u32,
    pub signature: Vec<ArgDescriptor>,
    pub help: String,
    pub module: String,
    pub permission: Permission,
    pub flavor: Flavor,
}

impl CommandDescriptor {
    pub fn concise(&self) -> String {
        concise_sig(&self.signature)
    }

    /// First word of the command is the literal `pg`.
    pub fn is_pg_command(&self) -> bool {
        self.signature.first().and_then(ArgDescriptor::literal) == Some("pg")
    }
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    sig: Vec<Value>,
    #[serde(default)]
    help: String,
    #[serde(default)]
    module: String,
    #[serde(default)]
    perm: String,
    #[serde(default)]
    avail: Option<String>,
}

/// Parse a `get_command_descriptions` reply into descriptors keyed by
/// their catalog number, keeping only those available to `consumer`.
///
/// Every descriptor starts out [`Flavor::Standard`]; the builder assigns
/// flavors per role.
pub fn parse_descriptions(blob: &[u8], consumer: &str) -> Result<BTreeMap<u32, CommandDescriptor>> {
    let raw: BTreeMap<String, RawDescriptor> =
        serde_json::from_slice(blob).map_err(|e| CatalogError::Parse(e.to_string()))?;

    let mut out = BTreeMap::new();
    for (key, desc) in raw {
        if let Some(avail) = &desc.avail {
            if !avail.split(',').any(|a| a.trim() == consumer) {
                continue;
            }
        }
        let num = parse_key(&key)?;
        out.insert(
            num,
            CommandDescriptor {
                key: num,
                signature: parse_signature(&desc.sig)?,
                help: desc.help,
                module: desc.module,
                permission: Permission::new(desc.perm),
                flavor: Flavor::Standard,
            },
        );
    }
    Ok(out)
}

fn parse_key(key: &str) -> Result<u32> {
    key.strip_prefix(KEY_PREFIX)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| CatalogError::InvalidKey(key.to_string()))
}
