use linked_hash_map::LinkedHashMap;

use crate::value::Value;

/// Key/value store shared between the caller, the script (through `set_variable` and
/// `get_variable`) and narrative templates.
///
/// The store is owned by the caller and is never cleared by a generation pass: running several
/// passes with the same store lets later passes see values set by earlier ones. Keys keep their
/// first insertion position; the last write wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextStore {
    values: LinkedHashMap<String, Value>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.values.get_mut(&key) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(key, value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the stored value, or `default` when the key is absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.values.get(key).cloned().unwrap_or(default)
    }

    pub fn extend<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in values {
            self.set(key, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// The whole store as a dict value, for `get_context()`.
    pub fn to_value(&self) -> Value {
        Value::Dict(self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins_and_order_is_stable() {
        let mut store = ContextStore::new();
        store.set("a", 1);
        store.set("b", 2);
        store.set("a", 3);
        let keys: Vec<_> = store.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn get_or_falls_back() {
        let store = ContextStore::new();
        assert_eq!(store.get_or("missing", Value::from("x")), Value::from("x"));
        assert!(store.is_empty());
    }
}
