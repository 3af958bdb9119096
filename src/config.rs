//! Layered configuration for the prioritization core
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, `.env`, then `DIGEST__SECTION__KEY` environment variables.

use crate::context::frameworks::FrameworkSignature;
use crate::context::scoring::RoleTag;
use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env file is the common case
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("DIGEST")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document, without consulting the environment
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.budget.validate()?;
        self.scoring.validate()?;
        self.tokenizer.validate()?;
        Ok(())
    }
}

/// Budget split across categories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Total budget used when the caller does not pass one
    #[serde(default = "default_total_tokens")]
    pub total_tokens: usize,

    #[serde(default = "default_structure_ratio")]
    pub structure_ratio: f64,

    #[serde(default = "default_api_docs_ratio")]
    pub api_docs_ratio: f64,

    #[serde(default = "default_examples_ratio")]
    pub examples_ratio: f64,

    /// Flat configuration allocation, clamped to what the ratios leave
    #[serde(default = "default_configuration_tokens")]
    pub configuration_tokens: usize,
}

fn default_total_tokens() -> usize {
    100_000
}

fn default_structure_ratio() -> f64 {
    0.20
}

fn default_api_docs_ratio() -> f64 {
    0.40
}

fn default_examples_ratio() -> f64 {
    0.10
}

fn default_configuration_tokens() -> usize {
    5_000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total_tokens: default_total_tokens(),
            structure_ratio: default_structure_ratio(),
            api_docs_ratio: default_api_docs_ratio(),
            examples_ratio: default_examples_ratio(),
            configuration_tokens: default_configuration_tokens(),
        }
    }
}

impl BudgetConfig {
    /// Validate that the ratios describe a partition of at most the whole
    pub fn validate(&self) -> Result<()> {
        let ratios = [self.structure_ratio, self.api_docs_ratio, self.examples_ratio];
        if ratios.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(ContextError::Configuration(format!(
                "budget ratios must be non-negative, got {:?}",
                ratios
            )));
        }
        let sum: f64 = ratios.iter().sum();
        if sum > 1.0 + f64::EPSILON {
            return Err(ContextError::Configuration(format!(
                "budget ratios sum to {:.3}, which exceeds 1.0",
                sum
            )));
        }
        Ok(())
    }
}

/// Scoring weights and table overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Non-whitespace characters a doc comment needs to count as documentation
    #[serde(default = "default_doc_threshold")]
    pub doc_threshold: usize,

    #[serde(default = "default_doc_bonus")]
    pub doc_bonus: f64,

    #[serde(default = "default_inheritance_bonus")]
    pub inheritance_bonus: f64,

    #[serde(default = "default_keyword_bonus")]
    pub keyword_bonus: f64,

    /// Fraction of the base added for program entry points
    #[serde(default = "default_entry_point_bonus")]
    pub entry_point_bonus: f64,

    #[serde(default = "default_framework_bonus")]
    pub framework_bonus: f64,

    #[serde(default = "default_private_penalty")]
    pub private_penalty: f64,

    #[serde(default = "default_dunder_penalty")]
    pub dunder_penalty: f64,

    /// Per-role base score overrides
    #[serde(default)]
    pub base_scores: HashMap<RoleTag, f64>,

    /// Replaces the keyword list when set
    #[serde(default)]
    pub keywords: Option<Vec<String>>,

    /// Replaces the framework dictionary when set; order matters
    #[serde(default)]
    pub frameworks: Option<Vec<FrameworkSignature>>,
}

fn default_doc_threshold() -> usize {
    20
}

fn default_doc_bonus() -> f64 {
    0.4
}

fn default_inheritance_bonus() -> f64 {
    0.3
}

fn default_keyword_bonus() -> f64 {
    0.3
}

fn default_entry_point_bonus() -> f64 {
    0.5
}

fn default_framework_bonus() -> f64 {
    0.2
}

fn default_private_penalty() -> f64 {
    0.5
}

fn default_dunder_penalty() -> f64 {
    0.6
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            doc_threshold: default_doc_threshold(),
            doc_bonus: default_doc_bonus(),
            inheritance_bonus: default_inheritance_bonus(),
            keyword_bonus: default_keyword_bonus(),
            entry_point_bonus: default_entry_point_bonus(),
            framework_bonus: default_framework_bonus(),
            private_penalty: default_private_penalty(),
            dunder_penalty: default_dunder_penalty(),
            base_scores: HashMap::new(),
            keywords: None,
            frameworks: None,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("doc_bonus", self.doc_bonus),
            ("inheritance_bonus", self.inheritance_bonus),
            ("keyword_bonus", self.keyword_bonus),
            ("entry_point_bonus", self.entry_point_bonus),
            ("framework_bonus", self.framework_bonus),
            ("private_penalty", self.private_penalty),
            ("dunder_penalty", self.dunder_penalty),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ContextError::Configuration(format!(
                    "scoring.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Greedy selection key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionOrder {
    /// Priority score, descending
    #[default]
    Priority,
    /// Priority per token, descending
    Efficiency,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub order: SelectionOrder,
}

/// Compressor limits and fallback policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default = "default_class_docstring_chars")]
    pub class_docstring_chars: usize,

    #[serde(default = "default_example_code_chars")]
    pub example_code_chars: usize,

    #[serde(default = "default_parameter_docstring_chars")]
    pub parameter_docstring_chars: usize,

    /// Appended after proportional code truncation
    #[serde(default = "default_truncation_marker")]
    pub truncation_marker: String,

    /// Appended when prose sentences were dropped
    #[serde(default = "default_ellipsis_marker")]
    pub ellipsis_marker: String,

    /// Compress skipped items into leftover category budget
    #[serde(default = "default_fallback_enabled")]
    pub fallback_enabled: bool,

    /// Skipped items below this priority are not worth compressing
    #[serde(default = "default_fallback_min_priority")]
    pub fallback_min_priority: f64,

    /// Leftover budget below this is not worth filling
    #[serde(default = "default_fallback_min_tokens")]
    pub fallback_min_tokens: usize,
}

fn default_class_docstring_chars() -> usize {
    500
}

fn default_example_code_chars() -> usize {
    300
}

fn default_parameter_docstring_chars() -> usize {
    200
}

fn default_truncation_marker() -> String {
    "# ... (truncated)".to_string()
}

fn default_ellipsis_marker() -> String {
    "...".to_string()
}

fn default_fallback_enabled() -> bool {
    true
}

fn default_fallback_min_priority() -> f64 {
    5.0
}

fn default_fallback_min_tokens() -> usize {
    16
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            class_docstring_chars: default_class_docstring_chars(),
            example_code_chars: default_example_code_chars(),
            parameter_docstring_chars: default_parameter_docstring_chars(),
            truncation_marker: default_truncation_marker(),
            ellipsis_marker: default_ellipsis_marker(),
            fallback_enabled: default_fallback_enabled(),
            fallback_min_priority: default_fallback_min_priority(),
            fallback_min_tokens: default_fallback_min_tokens(),
        }
    }
}

/// Which token oracle to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    #[default]
    Tiktoken,
    Word,
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub kind: TokenizerKind,

    /// Ratio used by the word-based estimator
    #[serde(default = "default_tokens_per_word")]
    pub tokens_per_word: f64,

    // Characters per token for the heuristic estimator
    #[serde(default = "default_code_chars_per_token")]
    pub code_chars_per_token: f64,

    #[serde(default = "default_prose_chars_per_token")]
    pub docstring_chars_per_token: f64,

    #[serde(default = "default_prose_chars_per_token")]
    pub text_chars_per_token: f64,

    #[serde(default = "default_json_chars_per_token")]
    pub json_chars_per_token: f64,
}

fn default_tokens_per_word() -> f64 {
    1.3
}

fn default_code_chars_per_token() -> f64 {
    3.0
}

fn default_prose_chars_per_token() -> f64 {
    4.0
}

fn default_json_chars_per_token() -> f64 {
    2.5
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            kind: TokenizerKind::default(),
            tokens_per_word: default_tokens_per_word(),
            code_chars_per_token: default_code_chars_per_token(),
            docstring_chars_per_token: default_prose_chars_per_token(),
            text_chars_per_token: default_prose_chars_per_token(),
            json_chars_per_token: default_json_chars_per_token(),
        }
    }
}

impl TokenizerConfig {
    /// Every ratio must be a positive number
    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("tokens_per_word", self.tokens_per_word),
            ("code_chars_per_token", self.code_chars_per_token),
            ("docstring_chars_per_token", self.docstring_chars_per_token),
            ("text_chars_per_token", self.text_chars_per_token),
            ("json_chars_per_token", self.json_chars_per_token),
        ];
        for (name, ratio) in ratios {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(ContextError::Configuration(format!(
                    "tokenizer {} must be positive, got {}",
                    name, ratio
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.budget.configuration_tokens, 5_000);
        assert_eq!(config.selection.order, SelectionOrder::Priority);
        assert_eq!(config.tokenizer.kind, TokenizerKind::Tiktoken);
    }

    #[test]
    fn test_ratios_exceeding_total_rejected() {
        let budget = BudgetConfig {
            structure_ratio: 0.5,
            api_docs_ratio: 0.5,
            examples_ratio: 0.2,
            ..Default::default()
        };
        assert!(budget.validate().is_err());
    }

    #[test]
    fn test_negative_penalty_rejected() {
        let scoring = ScoringConfig {
            private_penalty: -0.5,
            ..Default::default()
        };
        assert!(scoring.validate().is_err());
    }

    #[test]
    fn test_from_toml_str_partial_sections() {
        let config = Config::from_toml_str(
            r#"
            [budget]
            examples_ratio = 0.15

            [selection]
            order = "efficiency"

            [tokenizer]
            kind = "heuristic"
            "#,
        )
        .unwrap();
        assert_eq!(config.budget.examples_ratio, 0.15);
        assert_eq!(config.budget.structure_ratio, 0.20);
        assert_eq!(config.selection.order, SelectionOrder::Efficiency);
        assert_eq!(config.tokenizer.kind, TokenizerKind::Heuristic);
        assert_eq!(config.compression.example_code_chars, 300);
    }

    #[test]
    fn test_heuristic_ratios_from_toml() {
        let config = Config::from_toml_str(
            r#"
            [tokenizer]
            kind = "heuristic"
            code_chars_per_token = 3.5
            "#,
        )
        .unwrap();
        assert_eq!(config.tokenizer.code_chars_per_token, 3.5);
        assert_eq!(config.tokenizer.docstring_chars_per_token, 4.0);
        assert_eq!(config.tokenizer.text_chars_per_token, 4.0);
        assert_eq!(config.tokenizer.json_chars_per_token, 2.5);
    }

    #[test]
    fn test_non_positive_tokenizer_ratio_rejected() {
        let tokenizer = TokenizerConfig {
            json_chars_per_token: 0.0,
            ..Default::default()
        };
        assert!(tokenizer.validate().is_err());

        let tokenizer = TokenizerConfig {
            tokens_per_word: f64::NAN,
            ..Default::default()
        };
        assert!(tokenizer.validate().is_err());

        let result = Config::from_toml_str(
            r#"
            [tokenizer]
            text_chars_per_token = -1.0
            "#,
        );
        assert!(matches!(result, Err(ContextError::Configuration(_))));
    }

    #[test]
    fn test_from_toml_str_invalid_ratio() {
        let result = Config::from_toml_str(
            r#"
            [budget]
            structure_ratio = 0.9
            api_docs_ratio = 0.9
            "#,
        );
        assert!(matches!(result, Err(ContextError::Configuration(_))));
    }
}
