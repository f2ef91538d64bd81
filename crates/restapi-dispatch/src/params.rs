//! Query string handling.

/// Query keys that steer the dispatcher and are never bound to a command.
pub const RESERVED_KEYS: [&str; 2] = ["format", "help"];

/// Decoded query string: names in first-seen order, each with every value
/// supplied for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.push(name.into_owned(), value.into_owned());
        }
        params
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.pairs.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value.into()),
            None => self.pairs.push((name, vec![value.into()])),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// First value supplied for `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names a command signature may bind, in first-seen order.
    pub fn bindable(&self) -> impl Iterator<Item = &str> {
        self.pairs
            .iter()
            .map(|(n, _)| n.as_str())
            .filter(|n| !RESERVED_KEYS.contains(n))
    }

    pub fn has_bindable(&self) -> bool {
        self.bindable().next().is_some()
    }
}
