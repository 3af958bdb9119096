//! Third-party framework signature detection

use serde::{Deserialize, Serialize};

/// Marker substrings identifying one framework
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkSignature {
    pub name: String,
    pub markers: Vec<String>,
}

impl FrameworkSignature {
    pub fn new(name: &str, markers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            markers: markers.iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

/// Ordered framework dictionary. The first framework with a matching
/// marker wins, so declaration order decides ties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkDetector {
    signatures: Vec<FrameworkSignature>,
}

impl FrameworkDetector {
    pub fn new(signatures: Vec<FrameworkSignature>) -> Self {
        let signatures = signatures
            .into_iter()
            .map(|sig| FrameworkSignature {
                markers: sig.markers.iter().map(|m| m.to_lowercase()).collect(),
                name: sig.name,
            })
            .collect();
        Self { signatures }
    }

    /// Name of the first framework whose marker occurs in `text`
    pub fn detect(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.signatures
            .iter()
            .find(|sig| sig.markers.iter().any(|m| lowered.contains(m.as_str())))
            .map(|sig| sig.name.as_str())
    }

    pub fn signatures(&self) -> &[FrameworkSignature] {
        &self.signatures
    }
}

impl Default for FrameworkDetector {
    fn default() -> Self {
        Self::new(default_signatures())
    }
}

/// Web, ORM, validation, testing and CLI framework idioms
pub fn default_signatures() -> Vec<FrameworkSignature> {
    vec![
        FrameworkSignature::new(
            "django",
            &["from django", "import django", "models.model", "django.conf"],
        ),
        FrameworkSignature::new(
            "flask",
            &["from flask", "import flask", "flask(__name__)", "@app.route", "blueprint("],
        ),
        FrameworkSignature::new(
            "fastapi",
            &["from fastapi", "import fastapi", "fastapi()", "apirouter"],
        ),
        FrameworkSignature::new(
            "sqlalchemy",
            &["from sqlalchemy", "import sqlalchemy", "declarative_base", "sessionmaker"],
        ),
        FrameworkSignature::new("pydantic", &["from pydantic", "import pydantic", "basemodel"]),
        FrameworkSignature::new("pytest", &["import pytest", "@pytest.", "from pytest"]),
        FrameworkSignature::new("unittest", &["import unittest", "unittest.testcase"]),
        FrameworkSignature::new("click", &["import click", "@click.", "from click"]),
        FrameworkSignature::new("typer", &["import typer", "typer.typer", "from typer"]),
        FrameworkSignature::new("argparse", &["import argparse", "argumentparser("]),
        FrameworkSignature::new("axum", &["axum::", "use axum"]),
        FrameworkSignature::new("actix", &["actix_web", "use actix"]),
        FrameworkSignature::new("clap", &["clap::", "#[derive(parser)]", "use clap"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_flask_import() {
        let detector = FrameworkDetector::default();
        assert_eq!(detector.detect("from flask import Blueprint"), Some("flask"));
    }

    #[test]
    fn test_no_marker_no_framework() {
        let detector = FrameworkDetector::default();
        assert_eq!(detector.detect("def add(a, b):\n    return a + b"), None);
    }

    #[test]
    fn test_detection_is_case_insensitive() {
        let detector = FrameworkDetector::default();
        assert_eq!(detector.detect("FROM SQLAlchemy IMPORT Column"), Some("sqlalchemy"));
    }

    #[test]
    fn test_first_declared_framework_wins() {
        let detector = FrameworkDetector::new(vec![
            FrameworkSignature::new("first", &["shared"]),
            FrameworkSignature::new("second", &["shared"]),
        ]);
        assert_eq!(detector.detect("uses a shared marker"), Some("first"));
    }

    #[test]
    fn test_custom_markers_are_lowercased() {
        let detector = FrameworkDetector::new(vec![FrameworkSignature {
            name: "tokio".to_string(),
            markers: vec!["#[Tokio::Main]".to_string()],
        }]);
        assert_eq!(detector.detect("#[tokio::main]\nasync fn main() {}"), Some("tokio"));
    }
}
