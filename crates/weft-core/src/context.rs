use serde_json::{Map, Value};

use crate::error::{Result, WeftError};

/// The value context threaded through one run.
///
/// Keys are variable names; values are arbitrary JSON. Each successful
/// execution node writes its result under its configured variable name, and
/// the driver hands the grown context to the next node. Executors never
/// mutate a context in place; they return a new one whose contents are a
/// superset of the input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunContext {
    data: Map<String, Value>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object. Non-objects are rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(data) => Ok(Self { data }),
            Value::Null => Ok(Self::new()),
            other => Err(WeftError::InvalidConfig {
                kind: "RUN_CONTEXT".into(),
                message: format!("initial data must be a JSON object, got {}", kind_of(&other)),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Dotted-path lookup, e.g. `r.httpResponse.data.id`. Numeric segments
    /// index into arrays. Missing segments resolve to `None`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.data.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Return a new context with `key` bound to `value`. The original is
    /// untouched, preserving snapshot semantics for the caller.
    pub fn with(&self, key: impl Into<String>, value: Value) -> Self {
        let mut data = self.data.clone();
        data.insert(key.into(), value);
        Self { data }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// True when every key of `other` is present here with an equal value.
    pub fn is_superset_of(&self, other: &RunContext) -> bool {
        other
            .data
            .iter()
            .all(|(k, v)| self.data.get(k).is_some_and(|mine| mine == v))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
