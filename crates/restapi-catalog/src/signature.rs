//! Signature model: the ordered tokens describing one backend command.

use serde_json::{Map, Value};

use crate::argtype::ArgType;
use crate::error::{ArgError, CatalogError};

/// Flag-style choice literals (`--yes-i-really-mean-it`) never go in a path.
const FLAG_MARKER: &str = "--";

#[derive(Debug, Clone, PartialEq)]
pub enum ArgKind {
    /// Fixed word of the command name.
    Prefix(String),
    /// One of a finite set of literals.
    Choices(Vec<String>),
    Typed(ArgType),
}

/// One token of a command signature. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgDescriptor {
    pub name: String,
    pub kind: ArgKind,
    pub required: bool,
    /// Accepts several values (`n: "N"`).
    pub repeat: bool,
}

impl ArgDescriptor {
    pub fn prefix(word: &str) -> Self {
        Self {
            name: "prefix".to_string(),
            kind: ArgKind::Prefix(word.to_string()),
            required: true,
            repeat: false,
        }
    }

    pub fn choices(name: &str, strings: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: ArgKind::Choices(strings.iter().map(|s| s.to_string()).collect()),
            required: true,
            repeat: false,
        }
    }

    pub fn typed(name: &str, ty: ArgType) -> Self {
        Self {
            name: name.to_string(),
            kind: ArgKind::Typed(ty),
            required: true,
            repeat: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Parse one token of a raw descriptor signature: either a bare
    /// prefix word or an object with `name`/`type` and modifiers.
    pub fn from_json(token: &Value) -> Result<Self, CatalogError> {
        let obj = match token {
            Value::String(word) => return Ok(Self::prefix(word)),
            Value::Object(obj) => obj,
            other => {
                return Err(CatalogError::Parse(format!(
                    "signature token is neither string nor object: {other}"
                )))
            }
        };
        let name = str_field(obj, "name").unwrap_or("prefix").to_string();
        let type_name = str_field(obj, "type").ok_or_else(|| {
            CatalogError::Parse(format!("signature token {name} has no type"))
        })?;
        let kind = match type_name {
            "CephPrefix" => {
                let word = str_field(obj, "prefix").ok_or_else(|| {
                    CatalogError::Parse(format!("prefix token {name} has no prefix"))
                })?;
                ArgKind::Prefix(word.to_string())
            }
            "CephChoices" => {
                let strings = str_field(obj, "strings").ok_or_else(|| {
                    CatalogError::Parse(format!("choices token {name} has no strings"))
                })?;
                ArgKind::Choices(strings.split('|').map(str::to_string).collect())
            }
            other => ArgKind::Typed(ArgType::from_descriptor(&name, other, obj)?),
        };
        Ok(Self {
            name,
            kind,
            required: bool_field(obj, "req").unwrap_or(true),
            repeat: str_field(obj, "n") == Some("N"),
        })
    }

    /// Whether this token belongs in the URL path rather than the query.
    ///
    /// Prefix words always do. A required single-literal choice that is not
    /// a flag does too, but only until the first parameter has been
    /// collected: after that every choice is a parameter.
    pub fn is_path_segment(&self, params_started: bool) -> bool {
        match &self.kind {
            ArgKind::Prefix(_) => true,
            ArgKind::Choices(strings) => {
                strings.len() == 1
                    && self.required
                    && !strings[0].starts_with(FLAG_MARKER)
                    && !params_started
            }
            ArgKind::Typed(_) => false,
        }
    }

    /// Literal text this token contributes to a path, if it has one.
    pub fn literal(&self) -> Option<&str> {
        match &self.kind {
            ArgKind::Prefix(word) => Some(word),
            ArgKind::Choices(strings) if strings.len() == 1 => Some(&strings[0]),
            _ => None,
        }
    }

    /// Short usage form: `word`, `a|b`, `<name>`, with `[x...]` for
    /// repeatable and `{...}` for optional tokens.
    pub fn helpstr(&self) -> String {
        let chunk = match &self.kind {
            ArgKind::Prefix(word) => word.clone(),
            ArgKind::Choices(strings) => strings.join("|"),
            ArgKind::Typed(_) => format!("<{}>", self.name),
        };
        let mut s = chunk.clone();
        if self.repeat {
            s = format!("{chunk} [{chunk}...]");
        }
        if !self.required {
            s = format!("{{{s}}}");
        }
        s
    }

    /// Validate every raw value supplied for this token.
    pub fn validate(&self, raw: &[String]) -> Result<Value, ArgError> {
        if raw.len() > 1 && !self.repeat {
            return Err(ArgError::Format(format!(
                "{} accepts a single value, got {}",
                self.name,
                raw.len()
            )));
        }
        let mut values = raw
            .iter()
            .map(|r| self.validate_one(r))
            .collect::<Result<Vec<_>, _>>()?;
        if self.repeat {
            Ok(Value::Array(values))
        } else {
            Ok(values.pop().unwrap_or(Value::Null))
        }
    }

    fn validate_one(&self, raw: &str) -> Result<Value, ArgError> {
        match &self.kind {
            ArgKind::Prefix(word) if word == raw => Ok(Value::String(raw.to_string())),
            ArgKind::Prefix(word) => Err(ArgError::Choice(format!("{raw} != {word}"))),
            ArgKind::Choices(strings) if strings.iter().any(|s| s == raw) => {
                Ok(Value::String(raw.to_string()))
            }
            ArgKind::Choices(strings) => Err(ArgError::Choice(format!(
                "{raw} not in {}",
                strings.join("|")
            ))),
            ArgKind::Typed(ty) => ty.validate(raw),
        }
    }
}

/// Parse a whole raw signature array.
pub fn parse_signature(tokens: &[Value]) -> Result<Vec<ArgDescriptor>, CatalogError> {
    tokens.iter().map(ArgDescriptor::from_json).collect()
}

/// Space-joined usage of a signature, e.g. `osd pool set <pool> size|min_size`.
pub fn concise_sig(sig: &[ArgDescriptor]) -> String {
    sig.iter()
        .map(ArgDescriptor::helpstr)
        .collect::<Vec<_>>()
        .join(" ")
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(s != "false"),
        _ => None,
    }
}
