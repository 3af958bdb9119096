//! Content prioritization with token budget enforcement
//!
//! Scores project content, splits a token budget across categories,
//! selects what fits and compresses high-value leftovers.

pub mod compressor;
pub mod frameworks;
pub mod json_compact;
pub mod models;
pub mod prioritizer;
pub mod scoring;
pub mod selector;
pub mod token_budget;
pub mod token_estimator;

pub use compressor::Compressor;
pub use frameworks::{FrameworkDetector, FrameworkSignature};
pub use models::{
    BudgetCategory, CategoryBudget, CompressedContent, CompressionRequest, ContentType,
    ItemCategory, ScoredItem, SelectionResult,
};
pub use prioritizer::{CompressedItem, ContentPrioritizer, PrioritizedPayload};
pub use scoring::{ContentItem, RoleTag, ScoringContext, ScoringEngine, ScoringTables};
pub use selector::Selector;
pub use token_budget::BudgetAllocator;
pub use token_estimator::{
    estimator_from_config, EstimationError, HeuristicEstimator, TiktokenEstimator, TokenEstimator,
    WordBasedEstimator,
};
