//! Content prioritization and token budget fitting for project digests
//!
//! Takes a structured model of a source project and reduces it to a
//! deterministic, size-bounded payload for a model with a fixed context
//! window.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod project;

pub use config::Config;
pub use context::{
    BudgetAllocator, BudgetCategory, CategoryBudget, CompressedContent, CompressedItem, Compressor,
    ContentPrioritizer, ContentType, ItemCategory, PrioritizedPayload, ScoredItem, ScoringEngine,
    SelectionResult, Selector, TokenEstimator,
};
pub use error::{ContextError, Result};
pub use metrics::PrioritizationMetrics;
pub use project::ProjectModel;
