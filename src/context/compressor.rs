//! Content compression to a token target
//!
//! One strategy per content type:
//! - Code: keep structural lines, fill with the leading body lines that fit,
//!   fall back to proportional character truncation
//! - Docstring: whole leading paragraphs
//! - Text: whole leading sentences plus an ellipsis marker
//! - JSON: strip empty values, truncate long fields, then prune collections
//!
//! Output never exceeds the target except when a single paragraph,
//! sentence or JSON scalar is larger on its own; that unit is returned
//! as-is with `exceeds_budget` set.

use super::json_compact::{prune_largest, strip_empty, truncate_chars, truncate_fields, FieldLimits};
use super::models::{CompressedContent, CompressionRequest, ContentType};
use super::token_estimator::TokenEstimator;
use crate::config::CompressionConfig;
use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n(?:[ \t]*\r?\n)+").expect("valid paragraph regex"));

static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?]+["')\]]*(?:\s+|$)"#).expect("valid sentence regex"));

/// Line openers that define a class, function or type
const DEFINITION_PREFIXES: &[&str] = &[
    "class ",
    "def ",
    "async def ",
    "fn ",
    "pub fn ",
    "pub(crate) fn ",
    "async fn ",
    "pub async fn ",
    "struct ",
    "pub struct ",
    "enum ",
    "pub enum ",
    "trait ",
    "pub trait ",
    "impl ",
    "impl<",
    "function ",
    "export function ",
    "export class ",
    "export default class ",
    "interface ",
    "func ",
];

const DOC_DELIMITERS: &[&str] = &["\"\"\"", "'''", "///", "//!", "/**", "*/"];

const TOP_LEVEL_COMMENTS: &[&str] = &["#", "//"];

/// Shrinks content to a token target without breaking its structure
#[derive(Clone)]
pub struct Compressor {
    estimator: Arc<dyn TokenEstimator>,
    config: CompressionConfig,
    limits: FieldLimits,
}

impl Compressor {
    pub fn new(estimator: Arc<dyn TokenEstimator>, config: CompressionConfig) -> Self {
        let limits = FieldLimits::from_config(&config);
        Self {
            estimator,
            config,
            limits,
        }
    }

    /// Create with default markers and field limits
    pub fn with_estimator(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self::new(estimator, CompressionConfig::default())
    }

    pub fn compress_request(&self, request: &CompressionRequest) -> Result<CompressedContent> {
        self.compress(&request.raw_content, request.max_tokens, request.content_type)
    }

    /// Compress `raw` to at most `max_tokens`. Content that already fits is
    /// returned unchanged.
    pub fn compress(
        &self,
        raw: &str,
        max_tokens: usize,
        content_type: ContentType,
    ) -> Result<CompressedContent> {
        let current = self.count(raw, content_type)?;
        if current <= max_tokens {
            return Ok(CompressedContent::unchanged(raw.to_string(), current));
        }

        debug!(
            "Compressing {} content from {} to {} tokens",
            content_type.as_str(),
            current,
            max_tokens
        );

        let compressed = match content_type {
            ContentType::Code => self.compress_code(raw, max_tokens)?,
            ContentType::Docstring => self.compress_docstring(raw, max_tokens)?,
            ContentType::Text => self.compress_text(raw, max_tokens, ContentType::Text)?,
            ContentType::Json => self.compress_json(raw, max_tokens)?,
        };

        if compressed.exceeds_budget {
            warn!(
                "Indivisible {} unit of {} tokens exceeds target of {} tokens",
                content_type.as_str(),
                compressed.token_count,
                max_tokens
            );
        }

        Ok(compressed)
    }

    /// Strip null fields and empty containers, then truncate long fields.
    /// Invalid JSON is returned untouched.
    pub fn normalize_json(&self, raw: &str) -> String {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => {
                let mut value = strip_empty(value);
                truncate_fields(&mut value, &self.limits, &self.config.ellipsis_marker);
                value.to_string()
            }
            Err(_) => raw.to_string(),
        }
    }

    fn count(&self, text: &str, content_type: ContentType) -> Result<usize> {
        Ok(self.estimator.estimate(text, content_type)?)
    }

    fn compress_code(&self, raw: &str, max_tokens: usize) -> Result<CompressedContent> {
        let lines: Vec<&str> = raw.lines().collect();
        let structural: Vec<bool> = lines.iter().map(|l| is_structural_line(l)).collect();
        let optional = structural.iter().filter(|s| !**s).count();

        // Structural lines plus the first `k` other lines, in source order
        let assemble = |k: usize| -> String {
            let mut taken = 0;
            lines
                .iter()
                .zip(&structural)
                .filter(|(_, is_structural)| {
                    if **is_structural {
                        true
                    } else {
                        taken += 1;
                        taken <= k
                    }
                })
                .map(|(line, _)| *line)
                .collect::<Vec<_>>()
                .join("\n")
        };

        let skeleton = assemble(0);
        let skeleton_tokens = self.count(&skeleton, ContentType::Code)?;
        if skeleton_tokens > max_tokens {
            return self.truncate_proportionally(&skeleton, skeleton_tokens, max_tokens);
        }

        // Token cost is monotonic in k, so binary search the largest fit
        let (mut lo, mut hi) = (0usize, optional);
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if self.count(&assemble(mid), ContentType::Code)? <= max_tokens {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        let content = assemble(lo);
        let token_count = self.count(&content, ContentType::Code)?;
        Ok(CompressedContent {
            content,
            token_count,
            truncated: true,
            exceeds_budget: false,
        })
    }

    /// Cut `text` to `length × max/current` characters and append the
    /// truncation marker, shrinking further until the result fits
    fn truncate_proportionally(
        &self,
        text: &str,
        current_tokens: usize,
        max_tokens: usize,
    ) -> Result<CompressedContent> {
        let marker = &self.config.truncation_marker;
        let total_chars = text.chars().count();
        let mut keep = total_chars * max_tokens / current_tokens.max(1);

        loop {
            let head = truncate_chars(text, keep);
            let candidate = if head.is_empty() {
                marker.clone()
            } else {
                format!("{}\n{}", head, marker)
            };
            let tokens = self.count(&candidate, ContentType::Code)?;
            if tokens <= max_tokens {
                return Ok(CompressedContent {
                    content: candidate,
                    token_count: tokens,
                    truncated: true,
                    exceeds_budget: false,
                });
            }
            if keep == 0 {
                break;
            }
            keep = (keep * max_tokens / tokens).min(keep - 1);
        }

        // Not even the marker fits; drop it and keep what does
        let mut keep = total_chars * max_tokens / current_tokens.max(1);
        loop {
            let head = truncate_chars(text, keep);
            let tokens = self.count(head, ContentType::Code)?;
            if tokens <= max_tokens || keep == 0 {
                return Ok(CompressedContent {
                    content: head.to_string(),
                    token_count: tokens,
                    truncated: true,
                    exceeds_budget: tokens > max_tokens,
                });
            }
            keep = (keep * max_tokens / tokens).min(keep - 1);
        }
    }

    fn compress_docstring(&self, raw: &str, max_tokens: usize) -> Result<CompressedContent> {
        let ends = paragraph_ends(raw);
        let mut accepted: Option<(usize, usize)> = None;

        for &end in &ends {
            let tokens = self.count(&raw[..end], ContentType::Docstring)?;
            if tokens > max_tokens {
                break;
            }
            accepted = Some((end, tokens));
        }

        match accepted {
            Some((end, token_count)) => Ok(CompressedContent {
                content: raw[..end].to_string(),
                token_count,
                truncated: end < raw.trim_end().len(),
                exceeds_budget: false,
            }),
            None => {
                let first = ends.first().copied().unwrap_or(raw.len());
                let content = raw[..first].to_string();
                let token_count = self.count(&content, ContentType::Docstring)?;
                Ok(CompressedContent {
                    content,
                    token_count,
                    truncated: ends.len() > 1,
                    exceeds_budget: token_count > max_tokens,
                })
            }
        }
    }

    fn compress_text(
        &self,
        raw: &str,
        max_tokens: usize,
        content_type: ContentType,
    ) -> Result<CompressedContent> {
        let marker = &self.config.ellipsis_marker;
        let ends = sentence_ends(raw);

        // Every sentence but the last, followed by the marker
        let mut accepted: Option<(String, usize)> = None;
        for &end in ends.iter().take(ends.len().saturating_sub(1)) {
            let candidate = format!("{} {}", &raw[..end], marker);
            let tokens = self.count(&candidate, content_type)?;
            if tokens > max_tokens {
                break;
            }
            accepted = Some((candidate, tokens));
        }

        if let Some((content, token_count)) = accepted {
            return Ok(CompressedContent {
                content,
                token_count,
                truncated: true,
                exceeds_budget: false,
            });
        }

        // The first sentence goes out alone; the marker is dropped rather
        // than pushing it over the target
        let first = ends.first().copied().unwrap_or(raw.len());
        let content = raw[..first].to_string();
        let token_count = self.count(&content, content_type)?;
        Ok(CompressedContent {
            content,
            token_count,
            truncated: ends.len() > 1,
            exceeds_budget: token_count > max_tokens,
        })
    }

    fn compress_json(&self, raw: &str, max_tokens: usize) -> Result<CompressedContent> {
        let value = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => value,
            Err(_) => {
                debug!("Content is not valid JSON, compressing as text");
                return self.compress_text(raw, max_tokens, ContentType::Json);
            }
        };

        let mut value = strip_empty(value);
        truncate_fields(&mut value, &self.limits, &self.config.ellipsis_marker);

        let mut content = value.to_string();
        let mut token_count = self.count(&content, ContentType::Json)?;

        while token_count > max_tokens {
            if !prune_largest(&mut value) {
                break;
            }
            value = strip_empty(value);
            content = value.to_string();
            token_count = self.count(&content, ContentType::Json)?;
        }

        Ok(CompressedContent {
            content,
            token_count,
            truncated: true,
            exceeds_budget: token_count > max_tokens,
        })
    }
}

/// Definition openers, doc-comment delimiters and unindented comments
pub fn is_structural_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    DEFINITION_PREFIXES.iter().any(|p| trimmed.starts_with(p))
        || DOC_DELIMITERS
            .iter()
            .any(|d| trimmed.starts_with(d) || trimmed.trim_end().ends_with(d))
        || TOP_LEVEL_COMMENTS.iter().any(|c| line.starts_with(c))
}

/// Byte offsets where each non-blank paragraph ends
fn paragraph_ends(raw: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut start = 0;
    for m in PARAGRAPH_BREAK.find_iter(raw) {
        if !raw[start..m.start()].trim().is_empty() {
            ends.push(m.start());
        }
        start = m.end();
    }
    if !raw[start..].trim().is_empty() {
        ends.push(start + raw[start..].trim_end().len());
    }
    ends
}

/// Byte offsets just past each sentence's closing punctuation
fn sentence_ends(raw: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(raw) {
        let end = m.start() + m.as_str().trim_end().len();
        if !raw[start..end].trim().is_empty() {
            ends.push(end);
        }
        start = m.end();
    }
    if !raw[start..].trim().is_empty() {
        ends.push(start + raw[start..].trim_end().len());
    }
    ends
}
