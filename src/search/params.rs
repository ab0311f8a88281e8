//! Search parameters as supplied by the request layer.

/// A parameter value: a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    List(Vec<String>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::List(values)
    }
}

impl ParamValue {
    /// The value as one string; lists are joined with commas.
    ///
    /// Returns `None` when the value is blank.
    fn present(&self) -> Option<String> {
        match self {
            ParamValue::Single(s) => {
                if s.trim().is_empty() {
                    None
                } else {
                    Some(s.clone())
                }
            }
            ParamValue::List(items) => {
                let items: Vec<&str> = items
                    .iter()
                    .map(String::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .collect();
                if items.is_empty() {
                    None
                } else {
                    Some(items.join(","))
                }
            }
        }
    }
}

/// Ordered mapping of parameter names to values.
///
/// Keys are unique; inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    entries: Vec<(String, ParamValue)>,
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any earlier value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Non-blank value for `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.raw(key).and_then(ParamValue::present)
    }

    /// The stored value, blank or not.
    pub fn raw(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether `key` was supplied at all, even with a blank value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    /// Whether `key` has a non-blank value.
    pub fn is_present(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Copy of these parameters without `key`.
    pub fn without(&self, key: &str) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| k != key)
                .cloned()
                .collect(),
        }
    }

    /// Comma-separated value for `key`, trimmed, capped at `limit` items.
    pub fn list(&self, key: &str, limit: usize) -> Option<Vec<String>> {
        let value = self.get(key)?;
        Some(
            value
                .split(',')
                .take(limit)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Whether `key` holds a truthy flag (`true`, `t`, `yes`, `y`, `on`, `1`).
    pub fn is_truthy(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| {
                matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "true" | "t" | "yes" | "y" | "on" | "1"
                )
            })
            .unwrap_or(false)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse `key=value` arguments. Arguments without `=` are skipped.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Self::new();
        for arg in args {
            if let Some((key, value)) = arg.as_ref().split_once('=') {
                params.insert(key.trim(), value);
            }
        }
        params
    }
}

impl<K, V> FromIterator<(K, V)> for SearchParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}
