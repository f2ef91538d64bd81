//! Route compiler: signature + flavor → (URL path, residual parameters).

use crate::argtype::ArgType;
use crate::descriptor::Flavor;
use crate::signature::{ArgDescriptor, ArgKind};

/// Path segment standing in for the tell target.
pub const TARGET_PLACEHOLDER: &str = "<target>";

/// Leading word of tell-flavored routes.
pub const TELL_PREFIX: &str = "tell";

/// Name of the synthetic target parameter.
const TARGET_NAME: &str = "target";

/// Normalized mount point of the API (`/api/v0.1`, or empty for root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePath(String);

impl BasePath {
    /// Leading `/` enforced, trailing `/` stripped; `/` alone becomes empty.
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Self(String::new());
        }
        if trimmed.starts_with('/') {
            Self(trimmed.to_string())
        } else {
            Self(format!("/{trimmed}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path relative to the base, without its leading `/`; `None` when
    /// `path` lies outside the base.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.0.as_str())?;
        if rest.is_empty() {
            Some("")
        } else {
            rest.strip_prefix('/')
        }
    }
}

/// Output of [`compile`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRoute {
    /// Absolute route key, base path included.
    pub path: String,
    /// Tokens not absorbed into the path, in signature order.
    pub params: Vec<ArgDescriptor>,
}

/// Compile a signature into its route key and residual parameters.
///
/// Deterministic: the same `(signature, flavor)` always yields the same
/// result, so catalogs from several roles merge into one table.
pub fn compile(base: &BasePath, signature: &[ArgDescriptor], flavor: Flavor) -> CompiledRoute {
    let tell = tell_preamble();
    let preamble: &[ArgDescriptor] = if flavor == Flavor::TellTarget {
        &tell
    } else {
        &[]
    };

    let mut path = String::from(base.as_str());
    let mut params = Vec::new();
    for desc in preamble.iter().chain(signature) {
        if desc.is_path_segment(!params.is_empty()) {
            if let Some(word) = desc.literal() {
                path.push('/');
                path.push_str(word);
            }
        } else if flavor == Flavor::TellTarget && is_tell_target(desc) {
            path.push('/');
            path.push_str(TARGET_PLACEHOLDER);
        } else {
            params.push(desc.clone());
        }
    }
    CompiledRoute { path, params }
}

/// `tell <target>` tokens prepended to tell-flavored signatures.
fn tell_preamble() -> [ArgDescriptor; 2] {
    [
        ArgDescriptor::prefix(TELL_PREFIX),
        ArgDescriptor::typed(TARGET_NAME, ArgType::OsdName),
    ]
}

fn is_tell_target(desc: &ArgDescriptor) -> bool {
    desc.name == TARGET_NAME && desc.kind == ArgKind::Typed(ArgType::OsdName)
}
