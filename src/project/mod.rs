//! Project model handed over by the source-tree walker
//!
//! The walker, the AST extraction and the dependency-file parsers live
//! outside this crate. These types are the contract they fill in; every
//! field except the collections is optional so partially extracted items
//! still flow through scoring.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured model of a whole project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub modules: Vec<ModuleInfo>,
    #[serde(default)]
    pub examples: Vec<UsageExample>,
    #[serde(default)]
    pub configuration: Vec<ConfigurationBlock>,
    /// Dependency name to version requirement
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl ProjectModel {
    /// Parse a model serialized by the walker
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of atomic content items the model contains
    pub fn item_count(&self) -> usize {
        let code: usize = self
            .modules
            .iter()
            .map(|m| {
                m.functions.len()
                    + m.classes.len()
                    + m.classes.iter().map(|c| c.methods.len()).sum::<usize>()
            })
            .sum();
        code + self.examples.len() + self.configuration.len()
    }
}

/// One source module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub docstring: Option<String>,
    /// Raw import statements, e.g. `from flask import Blueprint`
    #[serde(default)]
    pub imports: Vec<String>,
    /// The walker recognized this module as a program entry point
    #[serde(default)]
    pub is_entry_point: bool,
    #[serde(default)]
    pub classes: Vec<ClassInfo>,
    #[serde(default)]
    pub functions: Vec<FunctionInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub decorators: Vec<String>,
    /// Declaration line as written, e.g. `class Router(Blueprint):`
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub methods: Vec<FunctionInfo>,
}

impl ClassInfo {
    /// Declaration plus docstring
    pub fn identifying_text(&self) -> String {
        let header = match (&self.signature, &self.name) {
            (Some(sig), _) => sig.clone(),
            (None, Some(name)) if self.bases.is_empty() => format!("class {}:", name),
            (None, Some(name)) => format!("class {}({}):", name, self.bases.join(", ")),
            (None, None) => String::new(),
        };
        join_parts(&[Some(header.as_str()), self.docstring.as_deref()])
    }
}

/// A free function or a method
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub decorators: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterInfo>,
    /// Explicit property accessor (`@property` or equivalent)
    #[serde(default)]
    pub is_property: bool,
}

impl FunctionInfo {
    /// Signature (or bare name), docstring and body
    pub fn identifying_text(&self) -> String {
        let header = self
            .signature
            .clone()
            .or_else(|| self.name.as_ref().map(|n| format!("def {}()", n)))
            .unwrap_or_default();
        join_parts(&[
            Some(header.as_str()),
            self.docstring.as_deref(),
            self.body.as_deref(),
        ])
    }

    pub fn has_decorator(&self, needle: &str) -> bool {
        self.decorators.iter().any(|d| d.contains(needle))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub docstring: Option<String>,
}

/// A usage example found in docs, tests or an examples directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageExample {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub code: String,
}

impl UsageExample {
    pub fn identifying_text(&self) -> String {
        join_parts(&[
            self.title.as_deref(),
            self.description.as_deref(),
            Some(self.code.as_str()),
        ])
    }
}

/// A configuration object (settings file, manifest section, env schema)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationBlock {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl ConfigurationBlock {
    /// Compact JSON rendering of the block, keyed by its name when it has
    /// one. Always valid JSON so it can be compacted structurally.
    pub fn identifying_text(&self) -> String {
        match self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                let mut wrapper = serde_json::Map::new();
                wrapper.insert(name.to_string(), self.content.clone());
                serde_json::Value::Object(wrapper).to_string()
            }
            None => self.content.to_string(),
        }
    }
}

fn join_parts(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .filter(|p| !p.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}
