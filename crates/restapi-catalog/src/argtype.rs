//! Value types a typed signature parameter may declare.
//!
//! Each type knows how to check a raw query string and convert it to the
//! JSON value sent to the backend.

use std::net::{IpAddr, SocketAddr};

use serde_json::{Map, Value};

use crate::error::{ArgError, CatalogError};

/// Entity kinds accepted in `type.id` names.
const ENTITY_TYPES: [&str; 4] = ["osd", "mon", "client", "mds"];

#[derive(Debug, Clone, PartialEq)]
pub enum ArgType {
    Int { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    /// Free-form strings, including pool, object, path and fragment names.
    Str,
    /// `type.id`, or `*` for every entity.
    EntityName,
    /// `osd.N` or bare `N`.
    OsdName,
    /// `pool.seed`, seed in hex.
    PgId,
    IpAddr,
    /// `ip[:port][/nonce]`
    EntityAddr,
    Uuid,
    Bool,
}

impl ArgType {
    /// Resolve a descriptor's `type` field. `fields` is the descriptor object,
    /// consulted for the optional `range`.
    pub fn from_descriptor(
        name: &str,
        type_name: &str,
        fields: &Map<String, Value>,
    ) -> Result<Self, CatalogError> {
        let range = fields.get("range").and_then(Value::as_str);
        let ty = match type_name {
            "CephInt" => {
                let (min, max) = parse_range(name, range, |s| s.parse::<i64>().ok())?;
                Self::Int { min, max }
            }
            "CephFloat" => {
                let (min, max) = parse_range(name, range, |s| s.parse::<f64>().ok())?;
                Self::Float { min, max }
            }
            "CephString" | "CephPoolname" | "CephObjectname" | "CephFilepath"
            | "CephSocketpath" | "CephFragment" => Self::Str,
            "CephName" => Self::EntityName,
            "CephOsdName" => Self::OsdName,
            "CephPgid" => Self::PgId,
            "CephIPAddr" => Self::IpAddr,
            "CephEntityAddr" => Self::EntityAddr,
            "CephUUID" => Self::Uuid,
            "CephBool" => Self::Bool,
            other => {
                return Err(CatalogError::UnknownType {
                    name: name.to_string(),
                    type_name: other.to_string(),
                })
            }
        };
        Ok(ty)
    }

    /// Check `raw` and convert it to the value handed to the backend.
    pub fn validate(&self, raw: &str) -> Result<Value, ArgError> {
        match self {
            Self::Int { min, max } => {
                let v: i64 = raw
                    .parse()
                    .map_err(|_| ArgError::Format(format!("{raw} doesn't represent an int")))?;
                check_range(v, *min, *max)?;
                Ok(Value::from(v))
            }
            Self::Float { min, max } => {
                let v: f64 = raw
                    .parse()
                    .map_err(|_| ArgError::Format(format!("{raw} doesn't represent a float")))?;
                check_range(v, *min, *max)?;
                serde_json::Number::from_f64(v)
                    .map(Value::Number)
                    .ok_or_else(|| ArgError::Format(format!("{raw} is not a finite float")))
            }
            Self::Str => Ok(Value::String(raw.to_string())),
            Self::EntityName => {
                validate_entity_name(raw)?;
                Ok(Value::String(raw.to_string()))
            }
            Self::OsdName => parse_osd_name(raw).map(Value::from),
            Self::PgId => {
                validate_pgid(raw)?;
                Ok(Value::String(raw.to_string()))
            }
            Self::IpAddr => {
                validate_ip(raw)?;
                Ok(Value::String(raw.to_string()))
            }
            Self::EntityAddr => {
                let addr = match raw.rsplit_once('/') {
                    Some((addr, nonce)) => {
                        nonce.parse::<u64>().map_err(|_| {
                            ArgError::Format(format!("{raw}: nonce {nonce} not integer"))
                        })?;
                        addr
                    }
                    None => raw,
                };
                validate_ip(addr)?;
                Ok(Value::String(raw.to_string()))
            }
            Self::Uuid => uuid::Uuid::parse_str(raw)
                .map(|u| Value::String(u.to_string()))
                .map_err(|_| ArgError::Format(format!("{raw} is not a valid UUID"))),
            Self::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(ArgError::Format(format!("{raw} is not true or false"))),
            },
        }
    }
}

/// Parse an OSD name (`osd.N` or `N`) into its numeric id.
pub fn parse_osd_name(raw: &str) -> Result<u32, ArgError> {
    let id = match raw.split_once('.') {
        Some(("osd", id)) => id,
        Some((t, _)) => return Err(ArgError::Format(format!("unknown type {t}"))),
        None => raw,
    };
    let n: i64 = id
        .parse()
        .map_err(|_| ArgError::Format(format!("osd id {id} not integer")))?;
    u32::try_from(n).map_err(|_| ArgError::Range(format!("osd id {n} is less than 0")))
}

/// Check a placement group id of the form `pool.seed`.
pub fn validate_pgid(raw: &str) -> Result<(), ArgError> {
    let Some((pool, seed)) = raw.split_once('.') else {
        return Err(ArgError::Format(format!("pgid {raw} has no .")));
    };
    pool.parse::<u64>()
        .map_err(|_| ArgError::Format(format!("pool {pool} not integer")))?;
    if seed.is_empty() || u32::from_str_radix(seed, 16).is_err() {
        return Err(ArgError::Format(format!("pgid {raw} has bad seed {seed}")));
    }
    Ok(())
}

fn validate_entity_name(raw: &str) -> Result<(), ArgError> {
    if raw == "*" {
        return Ok(());
    }
    let Some((t, id)) = raw.split_once('.') else {
        return Err(ArgError::Format(format!("CephName: no . in {raw}")));
    };
    if !ENTITY_TYPES.contains(&t) {
        return Err(ArgError::Format(format!("unknown type {t}")));
    }
    if t == "osd" && id != "*" {
        id.parse::<u32>()
            .map_err(|_| ArgError::Format(format!("osd id {id} not integer")))?;
    }
    Ok(())
}

fn validate_ip(raw: &str) -> Result<(), ArgError> {
    if raw.parse::<IpAddr>().is_ok() || raw.parse::<SocketAddr>().is_ok() {
        Ok(())
    } else {
        Err(ArgError::Format(format!("{raw} not a valid IP address")))
    }
}

fn parse_range<T>(
    name: &str,
    range: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<(Option<T>, Option<T>), CatalogError> {
    let Some(range) = range else {
        return Ok((None, None));
    };
    let bad = || CatalogError::Parse(format!("bad range {range:?} for {name}"));
    let mut bounds = range.split('|');
    let min = bounds.next().map(&parse).ok_or_else(bad)?.ok_or_else(bad)?;
    let max = match bounds.next() {
        Some(s) => Some(parse(s).ok_or_else(bad)?),
        None => None,
    };
    Ok((Some(min), max))
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    v: T,
    min: Option<T>,
    max: Option<T>,
) -> Result<(), ArgError> {
    let below = min.as_ref().is_some_and(|m| v < *m);
    let above = max.as_ref().is_some_and(|m| v > *m);
    if below || above {
        let lo = min.map(|m| m.to_string()).unwrap_or_default();
        let hi = max.map(|m| m.to_string()).unwrap_or_default();
        return Err(ArgError::Range(format!("{v} not in range {lo}..{hi}")));
    }
    Ok(())
}
