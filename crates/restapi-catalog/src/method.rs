use std::collections::BTreeSet;
use std::fmt;

/// HTTP methods a compiled route can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Self::Get),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of methods, rendered as an `Allow` header value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSet(BTreeSet<HttpMethod>);

impl MethodSet {
    pub fn contains(&self, method: HttpMethod) -> bool {
        self.0.contains(&method)
    }

    pub fn insert(&mut self, method: HttpMethod) {
        self.0.insert(method);
    }

    pub fn union_with(&mut self, other: &MethodSet) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = HttpMethod> + '_ {
        self.0.iter().copied()
    }

    pub fn allow_header(&self) -> String {
        self.iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<HttpMethod> for MethodSet {
    fn from_iter<I: IntoIterator<Item = HttpMethod>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
