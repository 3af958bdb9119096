//! Token budget allocation across content categories
//!
//! Default policy:
//! - Structure: 20% of total
//! - API documentation: 40% of total
//! - Examples: 10% of total
//! - Configuration: flat 5,000 tokens, clamped to what the shares leave
//!
//! Every category limit is non-decreasing in the total.
//!
//! Unused budget is never moved between categories.

use super::models::{BudgetCategory, CategoryBudget};
use crate::config::BudgetConfig;
use crate::error::Result;
use tracing::debug;

const BASIS_POINTS: u128 = 10_000;

/// Partitions a total token budget into per-category limits
#[derive(Debug, Clone)]
pub struct BudgetAllocator {
    config: BudgetConfig,
    structure_bp: u128,
    api_docs_bp: u128,
    examples_bp: u128,
}

impl BudgetAllocator {
    /// Create a new allocator
    pub fn new(config: BudgetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            structure_bp: to_basis_points(config.structure_ratio),
            api_docs_bp: to_basis_points(config.api_docs_ratio),
            examples_bp: to_basis_points(config.examples_ratio),
            config,
        })
    }

    /// Allocate one budget per category, in payload order.
    ///
    /// Never fails: the configuration share is clamped to the remainder so
    /// the limits never sum past `total_budget`.
    pub fn allocate(&self, total_budget: usize) -> Vec<CategoryBudget> {
        let structure = share(total_budget, self.structure_bp);
        let api_docs = share(total_budget, self.api_docs_bp);
        let examples = share(total_budget, self.examples_bp);

        // Floor of the combined share, not the sum of floors, so the
        // remainder never shrinks as the total grows
        let proportional = share(
            total_budget,
            self.structure_bp + self.api_docs_bp + self.examples_bp,
        );
        let remaining = total_budget.saturating_sub(proportional);
        let configuration = self.config.configuration_tokens.min(remaining);

        debug!(
            "Budget allocation: total={}, structure={}, api_docs={}, examples={}, configuration={}",
            total_budget, structure, api_docs, examples, configuration
        );

        vec![
            CategoryBudget::new(BudgetCategory::Structure, structure),
            CategoryBudget::new(BudgetCategory::ApiDocumentation, api_docs),
            CategoryBudget::new(BudgetCategory::Examples, examples),
            CategoryBudget::new(BudgetCategory::Configuration, configuration),
        ]
    }

    /// Allocate the configured default total
    pub fn allocate_default(&self) -> Vec<CategoryBudget> {
        self.allocate(self.config.total_tokens)
    }

    /// Get the configuration
    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }
}

impl Default for BudgetAllocator {
    fn default() -> Self {
        let config = BudgetConfig::default();
        Self {
            structure_bp: to_basis_points(config.structure_ratio),
            api_docs_bp: to_basis_points(config.api_docs_ratio),
            examples_bp: to_basis_points(config.examples_ratio),
            config,
        }
    }
}

/// Limit for one category, zero when absent
pub fn limit_for(budgets: &[CategoryBudget], category: BudgetCategory) -> usize {
    budgets
        .iter()
        .find(|b| b.category == category)
        .map(|b| b.token_limit)
        .unwrap_or(0)
}

/// Sum of all category limits
pub fn total_allocated(budgets: &[CategoryBudget]) -> usize {
    budgets.iter().map(|b| b.token_limit).sum()
}

fn to_basis_points(ratio: f64) -> u128 {
    (ratio * BASIS_POINTS as f64).round().max(0.0) as u128
}

// Integer math keeps the split exact and monotonic in the total
fn share(total: usize, basis_points: u128) -> usize {
    ((total as u128 * basis_points) / BASIS_POINTS) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allocator_creation() {
        let allocator = BudgetAllocator::new(BudgetConfig::default());
        assert!(allocator.is_ok());
    }

    #[test]
    fn test_small_total_clamps_configuration() {
        let allocator = BudgetAllocator::default();
        let budgets = allocator.allocate(1_000);
        assert_eq!(limit_for(&budgets, BudgetCategory::Structure), 200);
        assert_eq!(limit_for(&budgets, BudgetCategory::ApiDocumentation), 400);
        assert_eq!(limit_for(&budgets, BudgetCategory::Examples), 100);
        assert_eq!(limit_for(&budgets, BudgetCategory::Configuration), 300);
        assert_eq!(total_allocated(&budgets), 1_000);
    }

    #[test]
    fn test_large_total_keeps_flat_configuration() {
        let allocator = BudgetAllocator::default();
        let budgets = allocator.allocate(100_000);
        assert_eq!(limit_for(&budgets, BudgetCategory::Structure), 20_000);
        assert_eq!(limit_for(&budgets, BudgetCategory::ApiDocumentation), 40_000);
        assert_eq!(limit_for(&budgets, BudgetCategory::Examples), 10_000);
        assert_eq!(limit_for(&budgets, BudgetCategory::Configuration), 5_000);
        assert!(total_allocated(&budgets) < 100_000);
    }

    #[test]
    fn test_zero_total() {
        let budgets = BudgetAllocator::default().allocate(0);
        assert_eq!(budgets.len(), 4);
        assert!(budgets.iter().all(|b| b.token_limit == 0));
    }

    #[test]
    fn test_budgets_in_payload_order() {
        let budgets = BudgetAllocator::default().allocate(10);
        let order: Vec<BudgetCategory> = budgets.iter().map(|b| b.category).collect();
        assert_eq!(order, BudgetCategory::ALL.to_vec());
    }

    #[test]
    fn test_invalid_ratios_rejected() {
        let config = BudgetConfig {
            structure_ratio: 0.6,
            api_docs_ratio: 0.6,
            ..Default::default()
        };
        assert!(BudgetAllocator::new(config).is_err());
    }

    #[test]
    fn test_configuration_limit_never_drops_as_total_grows() {
        let allocator = BudgetAllocator::default();
        // 9 -> 10 crosses a rounding edge on all three shares at once
        let nine = allocator.allocate(9);
        let ten = allocator.allocate(10);
        assert_eq!(limit_for(&nine, BudgetCategory::Configuration), 3);
        assert_eq!(limit_for(&ten, BudgetCategory::Configuration), 3);

        let mut previous = allocator.allocate(0);
        for total in 1..20_000 {
            let current = allocator.allocate(total);
            for (before, after) in previous.iter().zip(&current) {
                assert!(
                    before.token_limit <= after.token_limit,
                    "{} dropped at total {}",
                    after.category,
                    total
                );
            }
            previous = current;
        }
    }

    #[test]
    fn test_allocation_never_exceeds_total() {
        let allocator = BudgetAllocator::default();
        for total in [1, 7, 99, 4_999, 16_667, 123_457] {
            assert!(total_allocated(&allocator.allocate(total)) <= total);
        }
    }
}
