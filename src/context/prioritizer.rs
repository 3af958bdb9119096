//! End-to-end prioritization pass
//!
//! Score, allocate, select, then spend whatever each category has left on
//! compressed versions of the high-priority items that did not fit whole.

use super::compressor::Compressor;
use super::models::{BudgetCategory, CategoryBudget, CompressedContent, ItemCategory, ScoredItem, SelectionResult};
use super::scoring::{ScoringEngine, ScoringTables};
use super::selector::Selector;
use super::token_budget::{limit_for, BudgetAllocator};
use super::token_estimator::{estimator_from_config, TokenEstimator};
use crate::config::{CompressionConfig, Config};
use crate::error::Result;
use crate::metrics::PrioritizationMetrics;
use crate::project::ProjectModel;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A skipped item that was brought back in compressed form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressedItem {
    pub id: String,
    pub category: ItemCategory,
    pub priority_score: f64,
    /// Cost of the uncompressed item
    pub original_tokens: usize,
    pub compressed: CompressedContent,
}

/// Everything the document assembler needs from one pass
#[derive(Debug, Clone, Serialize)]
pub struct PrioritizedPayload {
    pub selection: SelectionResult,
    pub compressed: Vec<CompressedItem>,
    pub budgets: Vec<CategoryBudget>,
    /// Items that are in neither the selection nor the compressed set
    pub skipped: Vec<ScoredItem>,
}

impl PrioritizedPayload {
    /// Tokens used by whole and compressed items of one category
    pub fn tokens_used_in(&self, category: BudgetCategory) -> usize {
        self.selection.tokens_used_in(category)
            + self
                .compressed
                .iter()
                .filter(|c| c.category.budget_category() == category)
                .map(|c| c.compressed.token_count)
                .sum::<usize>()
    }

    /// Tokens used across the whole payload
    pub fn total_tokens(&self) -> usize {
        self.selection.total_tokens_used
            + self
                .compressed
                .iter()
                .map(|c| c.compressed.token_count)
                .sum::<usize>()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs scoring, allocation, selection and the compression fallback
pub struct ContentPrioritizer {
    engine: ScoringEngine,
    allocator: BudgetAllocator,
    selector: Selector,
    compressor: Compressor,
    compression: CompressionConfig,
    metrics: Option<Arc<PrioritizationMetrics>>,
}

impl ContentPrioritizer {
    pub fn new(
        engine: ScoringEngine,
        allocator: BudgetAllocator,
        selector: Selector,
        compressor: Compressor,
        compression: CompressionConfig,
    ) -> Self {
        Self {
            engine,
            allocator,
            selector,
            compressor,
            compression,
            metrics: None,
        }
    }

    /// Build every stage from configuration, including the token oracle
    pub fn from_config(config: &Config) -> Result<Self> {
        let estimator = estimator_from_config(&config.tokenizer)?;
        Self::with_estimator(config, estimator)
    }

    /// Build every stage from configuration around a given token oracle
    pub fn with_estimator(config: &Config, estimator: Arc<dyn TokenEstimator>) -> Result<Self> {
        config.validate()?;
        let tables = ScoringTables::from_config(&config.scoring)?;

        Ok(Self::new(
            ScoringEngine::new(tables, Arc::clone(&estimator)),
            BudgetAllocator::new(config.budget.clone())?,
            Selector::new(config.selection.order),
            Compressor::new(estimator, config.compression.clone()),
            config.compression.clone(),
        ))
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<PrioritizationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn allocator(&self) -> &BudgetAllocator {
        &self.allocator
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    /// Reduce a project model to a payload that fits `total_budget`
    pub fn prioritize(&self, project: &ProjectModel, total_budget: usize) -> Result<PrioritizedPayload> {
        let items = self.observe(self.engine.score_project(project))?;
        if let Some(metrics) = &self.metrics {
            metrics.record_scored(items.len());
        }
        self.prioritize_scored(&items, total_budget)
    }

    /// Same as [`prioritize`](Self::prioritize) for already scored items
    pub fn prioritize_scored(&self, items: &[ScoredItem], total_budget: usize) -> Result<PrioritizedPayload> {
        let budgets = self.allocator.allocate(total_budget);
        let selection = self.selector.select(items, &budgets);

        if let Some(metrics) = &self.metrics {
            metrics.record_selection(&selection);
        }

        let (compressed, rescued) = if self.compression.fallback_enabled {
            self.observe(self.compress_skipped(&selection, &budgets))?
        } else {
            (Vec::new(), vec![false; selection.skipped.len()])
        };

        let skipped: Vec<ScoredItem> = selection
            .skipped
            .iter()
            .zip(&rescued)
            .filter(|(_, rescued)| !**rescued)
            .map(|(item, _)| item.clone())
            .collect();

        let payload = PrioritizedPayload {
            selection,
            compressed,
            budgets,
            skipped,
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_tokens_used(payload.total_tokens());
        }

        info!(
            "Prioritized {} items into {} tokens (budget {}): {} whole, {} compressed, {} skipped",
            items.len(),
            payload.total_tokens(),
            total_budget,
            payload.selection.selected_items.len(),
            payload.compressed.len(),
            payload.skipped.len()
        );

        Ok(payload)
    }

    /// Compress skipped items into each category's leftover budget. Returns
    /// the compressed items and a mask over `selection.skipped` marking the
    /// ones they came from.
    fn compress_skipped(
        &self,
        selection: &SelectionResult,
        budgets: &[CategoryBudget],
    ) -> Result<(Vec<CompressedItem>, Vec<bool>)> {
        let mut compressed = Vec::new();
        let mut rescued = vec![false; selection.skipped.len()];

        for category in BudgetCategory::ALL {
            let mut leftover =
                limit_for(budgets, category).saturating_sub(selection.tokens_used_in(category));

            let mut candidates: Vec<(usize, &ScoredItem)> = selection
                .skipped
                .iter()
                .enumerate()
                .filter(|(_, item)| item.budget_category() == category)
                .filter(|(_, item)| item.priority_score() >= self.compression.fallback_min_priority)
                .collect();
            candidates.sort_by(|a, b| b.1.priority_score().total_cmp(&a.1.priority_score()));

            for (idx, item) in candidates {
                if leftover < self.compression.fallback_min_tokens {
                    break;
                }

                let result = self.compressor.compress(
                    item.content(),
                    leftover,
                    item.category().content_type(),
                )?;

                if result.exceeds_budget {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_overage();
                    }
                    warn!("Dropping {}: smallest unit does not fit {} tokens", item.id(), leftover);
                    continue;
                }
                if result.token_count == 0 || result.token_count > leftover {
                    continue;
                }

                debug!(
                    "Compressed {} from {} to {} tokens into {} leftover",
                    item.id(),
                    item.token_cost(),
                    result.token_count,
                    category
                );

                leftover -= result.token_count;
                if let Some(metrics) = &self.metrics {
                    metrics.record_compressed(category);
                }
                rescued[idx] = true;
                compressed.push(CompressedItem {
                    id: item.id().to_string(),
                    category: item.category(),
                    priority_score: item.priority_score(),
                    original_tokens: item.token_cost(),
                    compressed: result,
                });
            }
        }

        Ok((compressed, rescued))
    }

    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let (Err(err), Some(metrics)) = (&result, &self.metrics) {
            if err.is_estimation_failure() {
                metrics.record_estimation_failure();
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerKind;
    use crate::context::models::ContentType;
    use crate::context::token_estimator::{EstimationError, HeuristicEstimator, WordBasedEstimator};

    fn word_config() -> Config {
        let mut config = Config::default();
        config.tokenizer.kind = TokenizerKind::Word;
        config.tokenizer.tokens_per_word = 1.0;
        config
    }

    fn prioritizer(config: &Config) -> ContentPrioritizer {
        ContentPrioritizer::with_estimator(config, Arc::new(WordBasedEstimator::new(1.0))).unwrap()
    }

    fn function(id: &str, priority: f64, content: &str) -> ScoredItem {
        let cost = WordBasedEstimator::new(1.0)
            .estimate(content, ContentType::Code)
            .unwrap();
        ScoredItem::new(id, ItemCategory::Function, priority, cost, vec![], content)
    }

    fn long_function(name: &str, lines: usize) -> String {
        let mut text = format!("def {}():", name);
        for _ in 0..lines {
            text.push_str("\n    x = 1");
        }
        text
    }

    #[test]
    fn test_skipped_item_compressed_into_leftover() {
        let items = vec![
            function("small", 9.5, "def small(): pass"),
            function("big", 9.0, &long_function("big", 50)),
        ];
        // total 100 leaves 40 for API documentation
        let payload = prioritizer(&word_config()).prioritize_scored(&items, 100).unwrap();

        assert_eq!(payload.selection.selected_ids(), vec!["small"]);
        assert_eq!(payload.compressed.len(), 1);
        assert_eq!(payload.compressed[0].id, "big");
        assert!(payload.compressed[0].compressed.truncated);
        assert!(payload.skipped.is_empty());
        assert!(payload.tokens_used_in(BudgetCategory::ApiDocumentation) <= 40);
    }

    #[test]
    fn test_fallback_covers_class_and_example_items() {
        let estimator = WordBasedEstimator::new(1.0);
        let scored = |id: &str, category: ItemCategory, content: &str| {
            let cost = estimator.estimate(content, category.content_type()).unwrap();
            ScoredItem::new(id, category, 8.0, cost, vec![], content)
        };
        let items = vec![
            scored("Widget", ItemCategory::Class, &long_function("Widget", 60)),
            scored("example:usage", ItemCategory::Example, &long_function("usage", 60)),
        ];
        // total 400 leaves 80 for structure and 40 for examples
        let payload = prioritizer(&word_config()).prioritize_scored(&items, 400).unwrap();

        assert!(payload.selection.selected_items.is_empty());
        assert!(payload.skipped.is_empty());
        let ids: Vec<&str> = payload.compressed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["Widget", "example:usage"]);
        assert!(payload.tokens_used_in(BudgetCategory::Structure) <= 80);
        assert!(payload.tokens_used_in(BudgetCategory::Examples) <= 40);
        assert!(payload.compressed.iter().all(|c| c.compressed.truncated));
    }

    #[test]
    fn test_low_priority_items_not_compressed() {
        let items = vec![
            function("small", 9.5, "def small(): pass"),
            function("big", 2.0, &long_function("big", 50)),
        ];
        let payload = prioritizer(&word_config()).prioritize_scored(&items, 100).unwrap();
        assert!(payload.compressed.is_empty());
        assert_eq!(payload.skipped.len(), 1);
    }

    #[test]
    fn test_fallback_disabled() {
        let mut config = word_config();
        config.compression.fallback_enabled = false;
        let items = vec![function("big", 9.0, &long_function("big", 50))];
        let payload = prioritizer(&config).prioritize_scored(&items, 100).unwrap();
        assert!(payload.compressed.is_empty());
        assert_eq!(payload.skipped.len(), 1);
        assert_eq!(payload.total_tokens(), 0);
    }

    #[test]
    fn test_leftover_below_minimum_not_filled() {
        let mut config = word_config();
        config.compression.fallback_min_tokens = 50;
        let items = vec![function("big", 9.0, &long_function("big", 50))];
        let payload = prioritizer(&config).prioritize_scored(&items, 100).unwrap();
        assert!(payload.compressed.is_empty());
    }

    #[test]
    fn test_project_pass_respects_budgets() {
        let project = ProjectModel::from_json(
            r#"{
                "name": "shapes",
                "modules": [{
                    "name": "shapes.core",
                    "classes": [{
                        "name": "Shape",
                        "docstring": "Base class for every drawable shape in the library.",
                        "methods": [
                            {"name": "area", "signature": "def area(self) -> float"},
                            {"name": "_cache", "signature": "def _cache(self)"}
                        ]
                    }],
                    "functions": [{"name": "main", "signature": "def main()"}]
                }],
                "examples": [{"title": "basic", "code": "shape = Shape()\nprint(shape.area())"}],
                "configuration": [{"name": "defaults", "content": {"precision": 2}}]
            }"#,
        )
        .unwrap();

        let prioritizer = prioritizer(&word_config());
        let payload = prioritizer.prioritize(&project, 200).unwrap();
        for budget in &payload.budgets {
            assert!(payload.tokens_used_in(budget.category) <= budget.token_limit);
        }

        let again = prioritizer.prioritize(&project, 200).unwrap();
        assert_eq!(payload.to_json().unwrap(), again.to_json().unwrap());
    }

    #[test]
    fn test_oversized_configuration_compacted_into_its_budget() {
        let hosts: Vec<serde_json::Value> = (0..600)
            .map(|i| serde_json::Value::String(format!("node-{:03}.internal", i)))
            .collect();
        let project = ProjectModel {
            configuration: vec![crate::project::ConfigurationBlock {
                name: Some("cluster".to_string()),
                content: serde_json::json!({
                    "hosts": hosts,
                    "region": "eu-west-1",
                    "replicas": null
                }),
            }],
            ..Default::default()
        };

        let prioritizer =
            ContentPrioritizer::with_estimator(&Config::default(), Arc::new(HeuristicEstimator::default()))
                .unwrap();
        // 1000 total leaves 300 for configuration
        let payload = prioritizer.prioritize(&project, 1_000).unwrap();

        assert!(payload.selection.selected_items.is_empty());
        assert!(payload.skipped.is_empty());
        assert_eq!(payload.compressed.len(), 1);

        let item = &payload.compressed[0];
        assert_eq!(item.category, ItemCategory::Configuration);
        assert!(item.original_tokens > 300);
        assert!(item.compressed.token_count <= 300);
        assert!(item.compressed.truncated);

        let value: serde_json::Value = serde_json::from_str(&item.compressed.content).unwrap();
        let cluster = &value["cluster"];
        assert_eq!(cluster["region"], "eu-west-1");
        assert!(cluster.get("replicas").is_none());
        let kept = cluster["hosts"].as_array().unwrap();
        assert!(!kept.is_empty() && kept.len() < 600);
        assert_eq!(kept[0], "node-000.internal");
        assert!(payload.tokens_used_in(BudgetCategory::Configuration) <= 300);
    }

    struct FailingEstimator;

    impl TokenEstimator for FailingEstimator {
        fn estimate(&self, _text: &str, _content_type: ContentType) -> std::result::Result<usize, EstimationError> {
            Err(EstimationError::new("tokenizer offline"))
        }
    }

    #[test]
    fn test_estimation_failure_propagates_and_is_counted() {
        let metrics = Arc::new(PrioritizationMetrics::new().unwrap());
        let prioritizer = ContentPrioritizer::with_estimator(&Config::default(), Arc::new(FailingEstimator))
            .unwrap()
            .with_metrics(Arc::clone(&metrics));

        let project = ProjectModel::from_json(r#"{"modules": [{"name": "m", "functions": [{"name": "f"}]}]}"#)
            .unwrap();
        let err = prioritizer.prioritize(&project, 1_000).unwrap_err();
        assert!(err.is_estimation_failure());
        assert_eq!(metrics.estimation_failures.get(), 1.0);
    }

    #[test]
    fn test_metrics_recorded_for_pass() {
        let metrics = Arc::new(PrioritizationMetrics::new().unwrap());
        let prioritizer = prioritizer(&word_config()).with_metrics(Arc::clone(&metrics));
        let items = vec![
            function("small", 9.5, "def small(): pass"),
            function("big", 9.0, &long_function("big", 50)),
        ];
        prioritizer.prioritize_scored(&items, 100).unwrap();
        assert_eq!(
            metrics
                .items_compressed
                .with_label_values(&["api_documentation"])
                .get(),
            1.0
        );
        assert_eq!(metrics.tokens_used.get_sample_count(), 1);
    }
}
