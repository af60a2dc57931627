//! The execution context threaded through rendering and block execution.
//!
//! A context is a mapping of variable name to JSON value. It grows
//! monotonically within one run via successive merges and is never shared
//! across independent runs. Caller-supplied entries always take precedence
//! over computed defaults for the same key.

use serde_json::Value;
use std::collections::BTreeMap;

/// Variable mapping for one run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    vars: BTreeMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object; non-object values yield an
    /// empty context.
    pub fn from_value(value: Value) -> Self {
        let vars = match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    /// Merge bindings in, overwriting existing keys. Used for block
    /// outputs: later blocks must observe earlier blocks' bindings.
    pub fn merge(&mut self, bindings: impl IntoIterator<Item = (String, Value)>) {
        for (key, value) in bindings {
            self.vars.insert(key, value);
        }
    }

    /// Merge computed defaults in, keeping existing entries. Caller values
    /// never get overwritten by defaults.
    pub fn merge_defaults(&mut self, defaults: impl IntoIterator<Item = (String, Value)>) {
        for (key, value) in defaults {
            self.vars.entry(key).or_insert(value);
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    /// Snapshot the context as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.vars.clone().into_iter().collect())
    }

    /// Primitive-typed entries (string/number/boolean) rendered as text.
    ///
    /// Objects, arrays and nulls are never inlined into shell commands or
    /// subprocess environments.
    pub fn primitives(&self) -> BTreeMap<String, String> {
        self.vars
            .iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((key.clone(), text))
            })
            .collect()
    }
}
