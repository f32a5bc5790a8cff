use serde_json::Value;
use std::collections::HashMap;

/// Merged view of a nested base configuration plus zero or more flat
/// override maps.
///
/// Lookups are dual-mode: override keys are matched verbatim against the
/// full dotted path (`"footer.show_page_numbers"` is a single map key),
/// while the base tree is walked one segment at a time. This lets a caller
/// override a single deep setting without rebuilding the whole nested tree.
#[derive(Debug, Clone, Default)]
pub struct TemplateConfig {
    base: Value,
    overrides: Vec<HashMap<String, Value>>,
}

impl TemplateConfig {
    /// Create a config from a nested base tree (typically deserialized from
    /// a JSON or TOML config file).
    pub fn new(base: Value) -> Self {
        Self {
            base,
            overrides: Vec::new(),
        }
    }

    /// Return a new config with an additional override layer. Layers are
    /// applied in registration order; the latest layer wins on collision.
    pub fn with_overrides(mut self, overrides: HashMap<String, Value>) -> Self {
        self.overrides.push(overrides);
        self
    }

    /// Return a new config with a single override entry.
    pub fn with_override(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut layer = HashMap::new();
        layer.insert(key.into(), value.into());
        self.with_overrides(layer)
    }

    /// Look up a dotted path. Overrides are checked first (exact key match,
    /// newest layer first); a present override always wins, even when its
    /// value is falsy. Returns `None` when no segment chain resolves.
    pub fn get(&self, path: &str) -> Option<&Value> {
        for layer in self.overrides.iter().rev() {
            if let Some(value) = layer.get(path) {
                return Some(value);
            }
        }

        let mut current = &self.base;
        for segment in path.split('.') {
            match current {
                Value::Object(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Boolean lookup with a default. A non-boolean value at the path also
    /// yields the default.
    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        self.get(path).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Unsigned integer lookup with a default.
    pub fn get_u64(&self, path: &str, default: u64) -> u64 {
        self.get(path).and_then(Value::as_u64).unwrap_or(default)
    }

    /// String lookup. Absent paths and non-string values yield `None`.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// String lookup with a default.
    pub fn get_str_or(&self, path: &str, default: &str) -> String {
        self.get_str(path).unwrap_or(default).to_string()
    }
}
