//! End-to-end behaviour of the prioritization core on small, hand-checked
//! inputs

use project_digest::{
    config::{Config, TokenizerKind},
    context::{
        token_budget::{limit_for, total_allocated},
        ContentItem, FrameworkDetector, ScoringContext, WordBasedEstimator,
    },
    project::{FunctionInfo, ClassInfo},
    BudgetAllocator, BudgetCategory, CategoryBudget, Compressor, ContentPrioritizer, ContentType,
    ItemCategory, ProjectModel, ScoredItem, ScoringEngine, Selector,
};
use std::sync::Arc;

fn word_engine() -> ScoringEngine {
    ScoringEngine::with_estimator(Arc::new(WordBasedEstimator::new(1.0)))
}

fn word_config() -> Config {
    let mut config = Config::default();
    config.tokenizer.kind = TokenizerKind::Word;
    config.tokenizer.tokens_per_word = 1.0;
    config
}

fn sample_project() -> ProjectModel {
    ProjectModel::from_json(
        r#"{
            "name": "inventory",
            "description": "Stock tracking service",
            "modules": [
                {
                    "name": "inventory.models",
                    "imports": ["from sqlalchemy import Column"],
                    "classes": [
                        {
                            "name": "Item",
                            "docstring": "A stocked item with a SKU and a quantity on hand.",
                            "bases": ["Base"],
                            "methods": [
                                {"name": "restock", "signature": "def restock(self, amount: int)"},
                                {"name": "_audit", "signature": "def _audit(self)"},
                                {"name": "__repr__", "signature": "def __repr__(self)"}
                            ]
                        },
                        {"name": "Perishable", "bases": ["Item"]}
                    ]
                },
                {
                    "name": "inventory.cli",
                    "is_entry_point": true,
                    "functions": [
                        {"name": "main", "signature": "def main()"},
                        {"name": "run", "signature": "def run(argv)"}
                    ]
                }
            ],
            "examples": [
                {"title": "restock", "code": "item = Item(sku='A1')\nitem.restock(5)"}
            ],
            "configuration": [
                {"name": "database", "content": {"url": "sqlite://", "pool": null, "echo": false}}
            ]
        }"#,
    )
    .unwrap()
}

#[test]
fn scenario_a_oversized_class_skipped_private_method_selected() {
    let engine = word_engine();
    let class = ClassInfo {
        name: Some("Shape".to_string()),
        ..Default::default()
    };
    let method = FunctionInfo {
        name: Some("_area".to_string()),
        ..Default::default()
    };
    let class_score = engine
        .score(ContentItem::Class(&class), &ScoringContext::default())
        .unwrap();
    let method_score = engine
        .score(
            ContentItem::Method(&method),
            &ScoringContext {
                class: Some("Shape"),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(class_score.priority_score(), 10.0);
    assert_eq!(method_score.priority_score(), 1.5);

    // Both compete for one category budget of 40 tokens
    let items = vec![
        ScoredItem::new(class_score.id(), ItemCategory::Class, class_score.priority_score(), 50, vec![], ""),
        ScoredItem::new(method_score.id(), ItemCategory::Class, method_score.priority_score(), 20, vec![], ""),
    ];
    let budgets = vec![CategoryBudget::new(BudgetCategory::Structure, 40)];
    let result = Selector::default().select(&items, &budgets);

    assert_eq!(result.selected_ids(), vec!["Shape._area"]);
    assert_eq!(result.total_tokens_used, 20);
}

#[test]
fn scenario_b_small_total_clamps_configuration() {
    let budgets = BudgetAllocator::default().allocate(1_000);
    assert_eq!(limit_for(&budgets, BudgetCategory::Structure), 200);
    assert_eq!(limit_for(&budgets, BudgetCategory::ApiDocumentation), 400);
    assert_eq!(limit_for(&budgets, BudgetCategory::Examples), 100);
    assert_eq!(limit_for(&budgets, BudgetCategory::Configuration), 300);
    assert_eq!(total_allocated(&budgets), 1_000);
}

#[test]
fn configuration_item_stays_selected_as_total_grows() {
    let items = vec![ScoredItem::new(
        "config:defaults",
        ItemCategory::Configuration,
        6.0,
        5,
        vec![],
        "{\"defaults\":{\"precision\":2}}",
    )];
    let allocator = BudgetAllocator::default();
    let selected_at = |total: usize| {
        !Selector::default()
            .select(&items, &allocator.allocate(total))
            .selected_items
            .is_empty()
    };

    assert_eq!(selected_at(9), selected_at(10));
    let first = (0..200).find(|t| selected_at(*t)).unwrap();
    assert_eq!(first, 14);
    assert!((first..200).all(|t| selected_at(t)));
}

#[test]
fn scenario_c_docstring_keeps_first_three_paragraphs() {
    let paragraphs: Vec<String> = (0..5)
        .map(|p| {
            (0..70)
                .map(|w| format!("p{}w{}", p, w))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    let raw = paragraphs.join("\n\n");
    assert!(raw.len() > 2_000);

    // word estimator at 1.0: three paragraphs of 70 words
    let compressor = Compressor::with_estimator(Arc::new(WordBasedEstimator::new(1.0)));
    let out = compressor.compress(&raw, 210, ContentType::Docstring).unwrap();

    assert_eq!(out.content, paragraphs[..3].join("\n\n"));
    assert_eq!(out.token_count, 210);
    assert!(out.truncated);
    assert!(!out.exceeds_budget);
}

#[test]
fn scenario_d_flask_import_earns_framework_bonus() {
    let detector = FrameworkDetector::default();
    assert_eq!(detector.detect("from flask import Blueprint"), Some("flask"));
    assert_eq!(detector.detect("import os"), None);

    let engine = word_engine();
    let view = FunctionInfo {
        name: Some("index".to_string()),
        ..Default::default()
    };

    let flask_imports = vec!["from flask import Blueprint".to_string()];
    let with_flask = engine
        .score(
            ContentItem::Function(&view),
            &ScoringContext {
                module: Some("views"),
                imports: &flask_imports,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(with_flask.reasons().contains(&"framework:flask".to_string()));

    let plain_imports = vec!["import os".to_string()];
    let without = engine
        .score(
            ContentItem::Function(&view),
            &ScoringContext {
                module: Some("views"),
                imports: &plain_imports,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(!without.reasons().iter().any(|r| r.starts_with("framework:")));
    assert!(with_flask.priority_score() > without.priority_score());
}

#[test]
fn project_pass_is_deterministic() {
    let prioritizer = ContentPrioritizer::from_config(&word_config()).unwrap();
    let project = sample_project();

    let first = prioritizer.prioritize(&project, 120).unwrap();
    let second = prioritizer.prioritize(&project, 120).unwrap();

    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(
        first.selection.selected_ids(),
        second.selection.selected_ids()
    );
}

#[test]
fn project_pass_respects_every_category_budget() {
    let prioritizer = ContentPrioritizer::from_config(&word_config()).unwrap();
    let project = sample_project();

    for total in [0, 10, 60, 120, 1_000, 100_000] {
        let payload = prioritizer.prioritize(&project, total).unwrap();
        for budget in &payload.budgets {
            assert!(
                payload.tokens_used_in(budget.category) <= budget.token_limit,
                "{} over budget at total {}",
                budget.category,
                total
            );
        }
        assert!(payload.total_tokens() <= total);
    }
}

#[test]
fn project_pass_discovery_order_and_roles() {
    let engine = word_engine();
    let items = engine.score_project(&sample_project()).unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i.id()).collect();
    assert_eq!(
        ids,
        vec![
            "inventory.models.Item",
            "inventory.models.Item.restock",
            "inventory.models.Item._audit",
            "inventory.models.Item.__repr__",
            "inventory.models.Perishable",
            "inventory.cli.main",
            "inventory.cli.run",
            "example:restock",
            "config:database",
        ]
    );

    let item_class = &items[0];
    assert!(item_class.reasons().contains(&"inheritance".to_string()));
    assert!(item_class.reasons().contains(&"framework:sqlalchemy".to_string()));

    let main = &items[5];
    assert!(main.reasons().contains(&"entry_point".to_string()));
}

#[test]
fn large_budget_selects_everything() {
    let prioritizer = ContentPrioritizer::from_config(&word_config()).unwrap();
    let project = sample_project();
    let payload = prioritizer.prioritize(&project, 100_000).unwrap();
    assert_eq!(payload.selection.selected_items.len(), project.item_count());
    assert!(payload.skipped.is_empty());
    assert!(payload.compressed.is_empty());
}

#[test]
fn empty_project_yields_empty_payload() {
    let prioritizer = ContentPrioritizer::from_config(&word_config()).unwrap();
    let payload = prioritizer
        .prioritize(&ProjectModel::from_json("{}").unwrap(), 1_000)
        .unwrap();
    assert!(payload.selection.is_empty());
    assert_eq!(payload.total_tokens(), 0);
    assert_eq!(payload.budgets.len(), 4);
}
