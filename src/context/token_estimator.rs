//! Token estimation (the token oracle)
//!
//! Every estimator must be monotonic in text length for a fixed content
//! type; proportional truncation in the compressor relies on it.

use super::models::ContentType;
use crate::config::{TokenizerConfig, TokenizerKind};
use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Raised when an estimator cannot price a string
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EstimationError {
    message: String,
}

impl EstimationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Token estimator trait for different tokenization strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str, content_type: ContentType) -> Result<usize, EstimationError>;

    /// Estimate tokens for multiple texts
    fn estimate_batch(
        &self,
        texts: &[&str],
        content_type: ContentType,
    ) -> Result<Vec<usize>, EstimationError> {
        texts.iter().map(|t| self.estimate(t, content_type)).collect()
    }
}

impl<T: TokenEstimator + ?Sized> TokenEstimator for Arc<T> {
    fn estimate(&self, text: &str, content_type: ContentType) -> Result<usize, EstimationError> {
        (**self).estimate(text, content_type)
    }
}

/// Tiktoken-based token estimator using cl100k_base (GPT-4, GPT-3.5-turbo)
pub struct TiktokenEstimator {
    bpe: Arc<CoreBPE>,
}

impl TiktokenEstimator {
    /// Create a new tiktoken estimator with cl100k_base encoding
    pub fn new() -> Result<Self, EstimationError> {
        let bpe = cl100k_base().map_err(|e| EstimationError::new(e.to_string()))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str, _content_type: ContentType) -> Result<usize, EstimationError> {
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}

/// Word-based token estimator (~1.3 tokens per word)
#[derive(Debug, Clone)]
pub struct WordBasedEstimator {
    tokens_per_word: f64,
}

impl WordBasedEstimator {
    pub fn new(tokens_per_word: f64) -> Self {
        Self { tokens_per_word }
    }
}

impl Default for WordBasedEstimator {
    fn default() -> Self {
        Self::new(1.3)
    }
}

impl TokenEstimator for WordBasedEstimator {
    fn estimate(&self, text: &str, _content_type: ContentType) -> Result<usize, EstimationError> {
        let word_count = text.split_whitespace().count();
        Ok((word_count as f64 * self.tokens_per_word).ceil() as usize)
    }
}

/// Character-ratio estimator with one chars-per-token figure per content type
#[derive(Debug, Clone)]
pub struct HeuristicEstimator {
    code: f64,
    docstring: f64,
    text: f64,
    json: f64,
}

impl HeuristicEstimator {
    pub fn new(code: f64, docstring: f64, text: f64, json: f64) -> Self {
        Self {
            code,
            docstring,
            text,
            json,
        }
    }

    fn chars_per_token(&self, content_type: ContentType) -> f64 {
        match content_type {
            ContentType::Code => self.code,
            ContentType::Docstring => self.docstring,
            ContentType::Text => self.text,
            ContentType::Json => self.json,
        }
    }
}

impl Default for HeuristicEstimator {
    fn default() -> Self {
        Self::new(3.0, 4.0, 4.0, 2.5)
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str, content_type: ContentType) -> Result<usize, EstimationError> {
        let ratio = self.chars_per_token(content_type);
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(EstimationError::new(format!(
                "invalid chars-per-token ratio {} for {}",
                ratio,
                content_type.as_str()
            )));
        }
        let chars = text.chars().count();
        Ok((chars as f64 / ratio).ceil() as usize)
    }
}

/// Build the estimator selected in configuration
pub fn estimator_from_config(
    config: &TokenizerConfig,
) -> Result<Arc<dyn TokenEstimator>, EstimationError> {
    let estimator: Arc<dyn TokenEstimator> = match config.kind {
        TokenizerKind::Tiktoken => Arc::new(TiktokenEstimator::new()?),
        TokenizerKind::Word => Arc::new(WordBasedEstimator::new(config.tokens_per_word)),
        TokenizerKind::Heuristic => Arc::new(HeuristicEstimator::new(
            config.code_chars_per_token,
            config.docstring_chars_per_token,
            config.text_chars_per_token,
            config.json_chars_per_token,
        )),
    };
    Ok(estimator)
}
