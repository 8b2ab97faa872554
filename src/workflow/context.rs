//! Run Context
//!
//! The key/value state threaded through a workflow run, plus the two small
//! languages that read from it:
//!
//! - `${key}` placeholders in request templates
//! - dot-separated value paths used by bindings and gates
//!
//! # Path Syntax
//!
//! ```text
//! id                  -> value["id"]
//! versions.0.number   -> value["versions"][0]["number"]
//! versions.number     -> [v["number"] for v in value["versions"]]
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StepError;

/// Key/value state accumulated while a workflow runs.
///
/// Created fresh per run, passed read-only to step operations and written
/// only by the engine when it applies output bindings.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for seeding initial contexts.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the value bound to `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value bound to `key` or a `MissingContextKey` error.
    pub fn require(&self, key: &str) -> Result<&Value, StepError> {
        self.get(key).ok_or_else(|| StepError::MissingContextKey {
            key: key.to_string(),
        })
    }

    /// Returns true if `key` is bound.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Merges `other` into this context, replacing existing keys.
    pub fn extend(&mut self, other: Context) {
        self.values.extend(other.values);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Renders `${key}` placeholders inside a JSON value.
    ///
    /// A string that is exactly one placeholder is replaced by the bound value
    /// itself, so numbers stay numbers. Any other string gets the values
    /// interpolated as text. Objects and arrays are rendered recursively.
    pub fn render(&self, template: &Value) -> Result<Value, StepError> {
        match template {
            Value::String(s) => self.render_str_value(s),
            Value::Array(items) => items
                .iter()
                .map(|item| self.render(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut rendered = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    rendered.insert(key.clone(), self.render(value)?);
                }
                Ok(Value::Object(rendered))
            }
            other => Ok(other.clone()),
        }
    }

    /// Renders placeholders inside a string, always producing text.
    pub fn render_str(&self, template: &str) -> Result<String, StepError> {
        let mut out = String::with_capacity(template.len());
        for piece in tokenize(template) {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Key(key) => out.push_str(&value_to_text(self.require(key)?)),
            }
        }
        Ok(out)
    }

    fn render_str_value(&self, template: &str) -> Result<Value, StepError> {
        let pieces = tokenize(template);
        if let [Piece::Key(key)] = pieces.as_slice() {
            return self.require(key).cloned();
        }
        self.render_str(template).map(Value::String)
    }
}

/// Formats a JSON value as plain text for URLs and form bodies.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Text(&'a str),
    Key(&'a str),
}

/// Splits a template into literal text and `${key}` references.
///
/// `$$` is an escaped `$`. An unterminated `${` is kept as literal text.
fn tokenize(template: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        let after = &rest[pos + 1..];
        if after.starts_with('$') {
            if pos > 0 {
                pieces.push(Piece::Text(&rest[..pos]));
            }
            pieces.push(Piece::Text("$"));
            rest = &after[1..];
        } else if let Some(inner) = after.strip_prefix('{') {
            match inner.find('}') {
                Some(end) => {
                    if pos > 0 {
                        pieces.push(Piece::Text(&rest[..pos]));
                    }
                    pieces.push(Piece::Key(inner[..end].trim()));
                    rest = &inner[end + 1..];
                }
                None => break,
            }
        } else {
            pieces.push(Piece::Text(&rest[..pos + 1]));
            rest = after;
        }
    }

    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    pieces
}

/// Collects every context key a template value references.
pub fn referenced_keys(template: &Value) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    collect_keys(template, &mut keys);
    keys
}

fn collect_keys(template: &Value, keys: &mut BTreeSet<String>) {
    match template {
        Value::String(s) => {
            for piece in tokenize(s) {
                if let Piece::Key(key) = piece {
                    keys.insert(key.to_string());
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_keys(item, keys)),
        Value::Object(map) => map.values().for_each(|value| collect_keys(value, keys)),
        _ => {}
    }
}

/// Selects the value at a dot-separated path.
///
/// Returns `None` when a segment is missing. Named segments applied to an
/// array are mapped over its elements; elements lacking the field are
/// skipped, and an empty result counts as missing.
pub fn select(value: &Value, path: &str) -> Option<Value> {
    let path = path.trim();
    if path.is_empty() {
        return Some(value.clone());
    }

    let mut current = value.clone();
    for segment in path.split('.') {
        current = step_into(&current, segment)?;
    }
    Some(current)
}

fn step_into(value: &Value, segment: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(segment).cloned(),
        Value::Array(items) => {
            if let Ok(index) = segment.parse::<usize>() {
                return items.get(index).cloned();
            }
            let collected: Vec<Value> = items
                .iter()
                .filter_map(|item| step_into(item, segment))
                .collect();
            if collected.is_empty() {
                None
            } else {
                Some(Value::Array(collected))
            }
        }
        _ => None,
    }
}
