//! Greedy per-category selection under token limits

use super::models::{BudgetCategory, CategoryBudget, ScoredItem, SelectionResult};
use super::token_budget::limit_for;
use crate::config::SelectionOrder;
use indexmap::IndexMap;
use std::cmp::Ordering;
use tracing::debug;

/// Chooses which scored items fit each category budget
#[derive(Debug, Clone, Copy, Default)]
pub struct Selector {
    order: SelectionOrder,
}

impl Selector {
    pub fn new(order: SelectionOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> SelectionOrder {
        self.order
    }

    /// Select items category by category.
    ///
    /// Items are visited in descending key order (stable, so equal keys keep
    /// discovery order). An item is accepted when it still fits the running
    /// total; otherwise it is skipped and the scan continues.
    pub fn select(&self, items: &[ScoredItem], budgets: &[CategoryBudget]) -> SelectionResult {
        let mut partitions: IndexMap<BudgetCategory, Vec<&ScoredItem>> = BudgetCategory::ALL
            .iter()
            .map(|c| (*c, Vec::new()))
            .collect();
        for item in items {
            partitions
                .entry(item.budget_category())
                .or_default()
                .push(item);
        }

        let mut result = SelectionResult::default();

        for (category, mut candidates) in partitions {
            candidates.sort_by(|a, b| self.compare(a, b));

            let limit = limit_for(budgets, category);
            let mut used = 0usize;
            let mut accepted = Vec::new();

            for item in candidates {
                let fits = used
                    .checked_add(item.token_cost())
                    .filter(|total| *total <= limit);
                if let Some(total) = fits {
                    used = total;
                    accepted.push(item.clone());
                } else {
                    result.skipped.push(item.clone());
                }
            }

            debug!(
                "Selected {} {} items using {}/{} tokens",
                accepted.len(),
                category,
                used,
                limit
            );

            result.total_tokens_used = result.total_tokens_used.saturating_add(used);
            result.selected_items.extend(accepted.iter().cloned());
            result.by_category.insert(category, accepted);
        }

        result
    }

    fn compare(&self, a: &ScoredItem, b: &ScoredItem) -> Ordering {
        match self.order {
            SelectionOrder::Priority => b.priority_score().total_cmp(&a.priority_score()),
            SelectionOrder::Efficiency => b.efficiency().total_cmp(&a.efficiency()),
        }
    }
}
