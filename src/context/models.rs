//! Data models for content prioritization

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content type tag handed to the token oracle and the compressor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Code,
    Docstring,
    Text,
    Json,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Code => "code",
            ContentType::Docstring => "docstring",
            ContentType::Text => "text",
            ContentType::Json => "json",
        }
    }
}

/// Kind of atomic content item extracted from a project model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Class,
    Method,
    Function,
    Example,
    Configuration,
}

impl ItemCategory {
    /// Budget category this item competes in
    pub fn budget_category(self) -> BudgetCategory {
        match self {
            ItemCategory::Class => BudgetCategory::Structure,
            ItemCategory::Method | ItemCategory::Function => BudgetCategory::ApiDocumentation,
            ItemCategory::Example => BudgetCategory::Examples,
            ItemCategory::Configuration => BudgetCategory::Configuration,
        }
    }

    /// Content type used to price this item
    pub fn content_type(self) -> ContentType {
        match self {
            ItemCategory::Class
            | ItemCategory::Method
            | ItemCategory::Function
            | ItemCategory::Example => ContentType::Code,
            ItemCategory::Configuration => ContentType::Json,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Class => "class",
            ItemCategory::Method => "method",
            ItemCategory::Function => "function",
            ItemCategory::Example => "example",
            ItemCategory::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition of the total token budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCategory {
    Structure,
    ApiDocumentation,
    Examples,
    Configuration,
}

impl BudgetCategory {
    /// Every budget category, in payload order
    pub const ALL: [BudgetCategory; 4] = [
        BudgetCategory::Structure,
        BudgetCategory::ApiDocumentation,
        BudgetCategory::Examples,
        BudgetCategory::Configuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetCategory::Structure => "structure",
            BudgetCategory::ApiDocumentation => "api_documentation",
            BudgetCategory::Examples => "examples",
            BudgetCategory::Configuration => "configuration",
        }
    }
}

impl fmt::Display for BudgetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content item with its priority and token cost.
///
/// Fields are private so the derived efficiency can never drift from the
/// score and cost it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    id: String,
    category: ItemCategory,
    priority_score: f64,
    token_cost: usize,
    efficiency: f64,
    reasons: Vec<String>,
    #[serde(skip)]
    content: String,
}

impl ScoredItem {
    pub fn new(
        id: impl Into<String>,
        category: ItemCategory,
        priority_score: f64,
        token_cost: usize,
        reasons: Vec<String>,
        content: impl Into<String>,
    ) -> Self {
        let efficiency = priority_score / token_cost.max(1) as f64;
        Self {
            id: id.into(),
            category,
            priority_score,
            token_cost,
            efficiency,
            reasons,
            content: content.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> ItemCategory {
        self.category
    }

    pub fn budget_category(&self) -> BudgetCategory {
        self.category.budget_category()
    }

    pub fn priority_score(&self) -> f64 {
        self.priority_score
    }

    pub fn token_cost(&self) -> usize {
        self.token_cost
    }

    /// Priority per token
    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    /// Scoring tags in the order they were applied
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    /// Text the item was priced from
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Token limit for one budget category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBudget {
    pub category: BudgetCategory,
    pub token_limit: usize,
}

impl CategoryBudget {
    pub fn new(category: BudgetCategory, token_limit: usize) -> Self {
        Self {
            category,
            token_limit,
        }
    }
}

/// Outcome of greedy selection across all categories
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionResult {
    /// Accepted items, category by category, priority-descending within each
    pub selected_items: Vec<ScoredItem>,
    pub total_tokens_used: usize,
    pub by_category: IndexMap<BudgetCategory, Vec<ScoredItem>>,
    /// Items that did not fit, in the order they were considered
    pub skipped: Vec<ScoredItem>,
}

impl SelectionResult {
    /// Tokens consumed by accepted items of one category
    pub fn tokens_used_in(&self, category: BudgetCategory) -> usize {
        self.by_category
            .get(&category)
            .map(|items| items.iter().map(ScoredItem::token_cost).sum())
            .unwrap_or(0)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.selected_items.iter().any(|item| item.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.selected_items.is_empty()
    }

    pub fn selected_ids(&self) -> Vec<&str> {
        self.selected_items.iter().map(ScoredItem::id).collect()
    }
}

/// Request to shrink content to a token target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionRequest {
    pub raw_content: String,
    pub max_tokens: usize,
    pub content_type: ContentType,
}

impl CompressionRequest {
    pub fn new(raw_content: impl Into<String>, max_tokens: usize, content_type: ContentType) -> Self {
        Self {
            raw_content: raw_content.into(),
            max_tokens,
            content_type,
        }
    }
}

/// Result of a compression call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressedContent {
    pub content: String,
    pub token_count: usize,
    /// Something was removed from the input
    pub truncated: bool,
    /// A single indivisible unit alone is larger than the target and was
    /// returned as-is; the caller owns the overage
    pub exceeds_budget: bool,
}

impl CompressedContent {
    pub(crate) fn unchanged(content: String, token_count: usize) -> Self {
        Self {
            content,
            token_count,
            truncated: false,
            exceeds_budget: false,
        }
    }
}
