//! Structural compaction for JSON payload fragments

use crate::config::CompressionConfig;
use serde_json::{Map, Value};

/// Keys whose children are parameter descriptions
const PARAMETER_KEYS: &[&str] = &["parameters", "params", "args", "arguments"];
const DOC_KEYS: &[&str] = &["docstring", "doc", "description"];
const CODE_KEYS: &[&str] = &["code", "example", "source"];

/// Character limits for long string fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLimits {
    pub class_docstring: usize,
    pub example_code: usize,
    pub parameter_docstring: usize,
}

impl FieldLimits {
    pub fn from_config(config: &CompressionConfig) -> Self {
        Self {
            class_docstring: config.class_docstring_chars,
            example_code: config.example_code_chars,
            parameter_docstring: config.parameter_docstring_chars,
        }
    }

    fn limit_for(&self, key: &str, in_parameters: bool) -> Option<usize> {
        if DOC_KEYS.contains(&key) {
            Some(if in_parameters {
                self.parameter_docstring
            } else {
                self.class_docstring
            })
        } else if CODE_KEYS.contains(&key) {
            Some(self.example_code)
        } else {
            None
        }
    }
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self::from_config(&CompressionConfig::default())
    }
}

/// Recursively drop null fields and empty arrays/objects. A container that
/// becomes empty after its children are stripped is dropped too; the root
/// itself is always kept.
pub fn strip_empty(value: Value) -> Value {
    strip_value(value).unwrap_or_else(|| Value::Object(Map::new()))
}

fn strip_value(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => {
            let items: Vec<Value> = items.into_iter().filter_map(strip_value).collect();
            (!items.is_empty()).then_some(Value::Array(items))
        }
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| strip_value(v).map(|v| (k, v)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        other => Some(other),
    }
}

/// Truncate long documentation and code strings in place. Returns whether
/// anything was shortened.
pub fn truncate_fields(value: &mut Value, limits: &FieldLimits, marker: &str) -> bool {
    truncate_in(value, limits, marker, false)
}

fn truncate_in(value: &mut Value, limits: &FieldLimits, marker: &str, in_parameters: bool) -> bool {
    let mut changed = false;
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let key = key.to_lowercase();
                if let Value::String(text) = child {
                    if let Some(limit) = limits.limit_for(&key, in_parameters) {
                        if text.chars().count() > limit {
                            *text = format!("{}{}", truncate_chars(text, limit), marker);
                            changed = true;
                        }
                    }
                } else {
                    let nested = in_parameters || PARAMETER_KEYS.contains(&key.as_str());
                    changed |= truncate_in(child, limits, marker, nested);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                changed |= truncate_in(item, limits, marker, in_parameters);
            }
        }
        _ => {}
    }
    changed
}

/// Remove one element from the largest collection: the last element of the
/// longest array, or failing that the last field of the widest object with
/// more than one field. Returns false when nothing is left to remove.
pub fn prune_largest(value: &mut Value) -> bool {
    if let Some(array) = find_largest_array(value) {
        array.pop();
        return true;
    }
    if let Some(map) = find_widest_object(value) {
        let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
        entries.pop();
        *map = entries.into_iter().collect();
        return true;
    }
    false
}

fn find_largest_array(value: &mut Value) -> Option<&mut Vec<Value>> {
    let (_, path) = largest_path(value, &mut Vec::new(), &|v| match v {
        Value::Array(items) if !items.is_empty() => Some(items.len()),
        _ => None,
    })?;
    match walk_mut(value, &path)? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

fn find_widest_object(value: &mut Value) -> Option<&mut Map<String, Value>> {
    let (_, path) = largest_path(value, &mut Vec::new(), &|v| match v {
        Value::Object(map) if map.len() > 1 => Some(map.len()),
        _ => None,
    })?;
    match walk_mut(value, &path)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[derive(Debug, Clone)]
enum Step {
    Index(usize),
    Key(String),
}

/// Pre-order search for the node with the largest size; the first one
/// found wins ties
fn largest_path(
    value: &Value,
    prefix: &mut Vec<Step>,
    size_of: &dyn Fn(&Value) -> Option<usize>,
) -> Option<(usize, Vec<Step>)> {
    let mut best = size_of(value).map(|size| (size, prefix.clone()));

    let children: Vec<(Step, &Value)> = match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| (Step::Index(i), item))
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(key, child)| (Step::Key(key.clone()), child))
            .collect(),
        _ => Vec::new(),
    };

    for (step, child) in children {
        prefix.push(step);
        let found = largest_path(child, prefix, size_of);
        prefix.pop();
        if let Some((size, path)) = found {
            if best.as_ref().map_or(true, |(current, _)| size > *current) {
                best = Some((size, path));
            }
        }
    }

    best
}

fn walk_mut<'v>(value: &'v mut Value, path: &[Step]) -> Option<&'v mut Value> {
    let mut node = value;
    for step in path {
        node = match step {
            Step::Index(i) => node.as_array_mut()?.get_mut(*i)?,
            Step::Key(k) => node.as_object_mut()?.get_mut(k)?,
        };
    }
    Some(node)
}

/// First `limit` characters of `text`, on a char boundary
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_nulls_and_empty_containers() {
        let value = json!({
            "name": "app",
            "version": null,
            "tags": [],
            "nested": {"inner": {}, "list": [null, {}]},
            "keep": [1, null, 2],
            "empty_string": ""
        });
        let stripped = strip_empty(value);
        assert_eq!(
            stripped,
            json!({"name": "app", "keep": [1, 2], "empty_string": ""})
        );
    }

    #[test]
    fn test_strip_empty_root_is_empty_object() {
        assert_eq!(strip_empty(json!({"a": null})), json!({}));
        assert_eq!(strip_empty(Value::Null), json!({}));
    }

    #[test]
    fn test_truncate_fields_by_context() {
        let long = "x".repeat(600);
        let mut value = json!({
            "classes": [{
                "name": "Widget",
                "docstring": long,
                "methods": [{
                    "parameters": [{"name": "size", "docstring": long}]
                }]
            }],
            "examples": [{"code": long}],
            "title": long
        });
        let limits = FieldLimits::default();
        assert!(truncate_fields(&mut value, &limits, "..."));

        let class_doc = value["classes"][0]["docstring"].as_str().unwrap();
        assert_eq!(class_doc.len(), 500 + 3);
        let param_doc = value["classes"][0]["methods"][0]["parameters"][0]["docstring"]
            .as_str()
            .unwrap();
        assert_eq!(param_doc.len(), 200 + 3);
        let code = value["examples"][0]["code"].as_str().unwrap();
        assert_eq!(code.len(), 300 + 3);
        assert_eq!(value["title"].as_str().unwrap().len(), 600);
    }

    #[test]
    fn test_truncate_fields_short_values_untouched() {
        let mut value = json!({"docstring": "short"});
        assert!(!truncate_fields(&mut value, &FieldLimits::default(), "..."));
        assert_eq!(value, json!({"docstring": "short"}));
    }

    #[test]
    fn test_prune_largest_pops_longest_array() {
        let mut value = json!({"a": [1, 2], "b": [1, 2, 3]});
        assert!(prune_largest(&mut value));
        assert_eq!(value, json!({"a": [1, 2], "b": [1, 2]}));
        assert!(prune_largest(&mut value));
        // tie goes to the first array found
        assert_eq!(value, json!({"a": [1], "b": [1, 2]}));
    }

    #[test]
    fn test_prune_falls_back_to_object_fields() {
        let mut value = json!({"a": 1, "b": 2});
        assert!(prune_largest(&mut value));
        assert_eq!(value, json!({"a": 1}));
        assert!(!prune_largest(&mut value));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
