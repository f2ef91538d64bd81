use serde::{Deserialize, Serialize};

/// Backend component class a command executes against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mon,
    Osd,
    Pg,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mon => "mon",
            Self::Osd => "osd",
            Self::Pg => "pg",
        }
    }
}

/// Which backend component executes a command: `(role, id)`.
///
/// The id is opaque here; it is empty for the monitor quorum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub role: Role,
    pub id: String,
}

impl Target {
    pub fn mon() -> Self {
        Self {
            role: Role::Mon,
            id: String::new(),
        }
    }

    pub fn osd(id: u32) -> Self {
        Self {
            role: Role::Osd,
            id: id.to_string(),
        }
    }

    pub fn pg(pgid: impl Into<String>) -> Self {
        Self {
            role: Role::Pg,
            id: pgid.into(),
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::mon()
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() {
            f.write_str(self.role.as_str())
        } else {
            write!(f, "{}.{}", self.role.as_str(), self.id)
        }
    }
}
