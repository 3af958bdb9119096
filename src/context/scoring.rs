//! Priority scoring for content items
//!
//! Scoring is a small rule engine:
//! - a role table assigns the base score from the first matching role
//! - an ordered list of `(predicate, effect)` rules then adjusts the base
//!   or the multiplier, each application recording a reason tag
//!
//! `priority = base × multiplier`, where bonuses add to the multiplier and
//! penalties scale it. All tables are injected through [`ScoringTables`].

use super::frameworks::FrameworkDetector;
use super::models::{ItemCategory, ScoredItem};
use super::token_estimator::TokenEstimator;
use crate::config::ScoringConfig;
use crate::error::{ContextError, Result};
use crate::project::{ClassInfo, ConfigurationBlock, FunctionInfo, ProjectModel, UsageExample};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Coarse role of an item, keying the base score table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTag {
    PublicClass,
    PublicFunction,
    MainEntryPoint,
    WellDocumented,
    HasUsageExample,
    FrameworkRelated,
    Configuration,
    PrivateMethod,
    TestCode,
    UtilityFunction,
    Property,
    MagicMethod,
    Deprecated,
}

impl RoleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTag::PublicClass => "public_class",
            RoleTag::PublicFunction => "public_function",
            RoleTag::MainEntryPoint => "main_entry_point",
            RoleTag::WellDocumented => "well_documented",
            RoleTag::HasUsageExample => "has_usage_example",
            RoleTag::FrameworkRelated => "framework_related",
            RoleTag::Configuration => "configuration",
            RoleTag::PrivateMethod => "private_method",
            RoleTag::TestCode => "test_code",
            RoleTag::UtilityFunction => "utility_function",
            RoleTag::Property => "property",
            RoleTag::MagicMethod => "magic_method",
            RoleTag::Deprecated => "deprecated",
        }
    }
}

/// Default base score for a role
pub fn default_base_score(role: RoleTag) -> f64 {
    match role {
        RoleTag::PublicClass => 10.0,
        RoleTag::PublicFunction => 9.0,
        RoleTag::MainEntryPoint => 8.0,
        RoleTag::UtilityFunction => 8.0,
        RoleTag::WellDocumented => 7.0,
        RoleTag::HasUsageExample => 6.0,
        RoleTag::FrameworkRelated => 6.0,
        RoleTag::Configuration => 6.0,
        RoleTag::Property => 4.0,
        RoleTag::PrivateMethod => 3.0,
        RoleTag::MagicMethod => 3.0,
        RoleTag::TestCode => 2.0,
        RoleTag::Deprecated => 1.0,
    }
}

const ALL_ROLES: [RoleTag; 13] = [
    RoleTag::PublicClass,
    RoleTag::PublicFunction,
    RoleTag::MainEntryPoint,
    RoleTag::WellDocumented,
    RoleTag::HasUsageExample,
    RoleTag::FrameworkRelated,
    RoleTag::Configuration,
    RoleTag::PrivateMethod,
    RoleTag::TestCode,
    RoleTag::UtilityFunction,
    RoleTag::Property,
    RoleTag::MagicMethod,
    RoleTag::Deprecated,
];

/// Operational verbs that mark high-value API surface
pub fn default_keywords() -> Vec<String> {
    [
        "run", "build", "parse", "create", "execute", "generate", "validate", "configure",
        "authenticate", "process", "handle", "load", "save", "connect", "render", "serialize",
        "transform", "analyze", "start", "deploy",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

/// How a rule changes the score
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// Adds `base × fraction` to the base score
    BoostBase(f64),
    /// Adds to the multiplier
    Bonus(f64),
    /// Scales the multiplier
    Penalty(f64),
}

/// Facts about an item that rules inspect
#[derive(Debug, Clone)]
pub struct ItemFacts {
    pub category: ItemCategory,
    pub name: Option<String>,
    pub documented: bool,
    pub inherits: bool,
    pub is_property: bool,
    pub is_entry_point: bool,
    pub is_private: bool,
    pub is_dunder: bool,
    pub is_test: bool,
    pub is_utility: bool,
    pub is_deprecated: bool,
    pub keyword: Option<String>,
    pub framework: Option<String>,
}

/// Returns the reason tag when the rule applies
pub type RulePredicate = fn(&ItemFacts) -> Option<String>;

/// One `(predicate, effect)` pair of the rule list
#[derive(Clone)]
pub struct ScoringRule {
    pub name: &'static str,
    pub predicate: RulePredicate,
    pub effect: Effect,
}

impl std::fmt::Debug for ScoringRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringRule")
            .field("name", &self.name)
            .field("effect", &self.effect)
            .finish()
    }
}

fn entry_point_rule(facts: &ItemFacts) -> Option<String> {
    (facts.category == ItemCategory::Function && facts.is_entry_point)
        .then(|| "entry_point".to_string())
}

fn documented_rule(facts: &ItemFacts) -> Option<String> {
    facts.documented.then(|| "documented".to_string())
}

fn inheritance_rule(facts: &ItemFacts) -> Option<String> {
    facts.inherits.then(|| "inheritance".to_string())
}

fn keyword_rule(facts: &ItemFacts) -> Option<String> {
    facts.keyword.as_ref().map(|k| format!("keyword:{}", k))
}

fn framework_rule(facts: &ItemFacts) -> Option<String> {
    facts.framework.as_ref().map(|f| format!("framework:{}", f))
}

fn private_rule(facts: &ItemFacts) -> Option<String> {
    (facts.is_private && !facts.is_property).then(|| "private".to_string())
}

fn dunder_rule(facts: &ItemFacts) -> Option<String> {
    (facts.is_dunder && !facts.is_property).then(|| "dunder".to_string())
}

/// Role resolution order; the first matching predicate wins
const ROLE_RULES: &[(RoleTag, fn(&ItemFacts) -> bool)] = &[
    (RoleTag::Deprecated, |f| f.is_deprecated),
    (RoleTag::TestCode, |f| f.is_test),
    (RoleTag::Property, |f| f.is_property),
    (RoleTag::MagicMethod, |f| {
        matches!(f.category, ItemCategory::Method | ItemCategory::Function) && f.is_dunder
    }),
    (RoleTag::PrivateMethod, |f| {
        f.category == ItemCategory::Method && f.is_private
    }),
    (RoleTag::MainEntryPoint, |f| {
        f.category == ItemCategory::Function && f.is_entry_point
    }),
    (RoleTag::UtilityFunction, |f| {
        f.category == ItemCategory::Function && f.is_utility
    }),
    (RoleTag::WellDocumented, |f| {
        matches!(f.category, ItemCategory::Class | ItemCategory::Function)
            && f.is_private
            && f.documented
    }),
    (RoleTag::PublicClass, |f| f.category == ItemCategory::Class),
    (RoleTag::PublicFunction, |f| {
        matches!(f.category, ItemCategory::Method | ItemCategory::Function)
    }),
    (RoleTag::FrameworkRelated, |f| {
        f.category == ItemCategory::Example && f.framework.is_some()
    }),
    (RoleTag::HasUsageExample, |f| f.category == ItemCategory::Example),
    (RoleTag::Configuration, |f| f.category == ItemCategory::Configuration),
];

/// Resolve the role of an item
pub fn resolve_role(facts: &ItemFacts) -> RoleTag {
    ROLE_RULES
        .iter()
        .find(|(_, applies)| applies(facts))
        .map(|(role, _)| *role)
        .unwrap_or(RoleTag::Configuration)
}

/// Injected scoring tables: base scores, keywords, frameworks and rules
#[derive(Debug, Clone)]
pub struct ScoringTables {
    base_scores: HashMap<RoleTag, f64>,
    keywords: Vec<String>,
    frameworks: FrameworkDetector,
    rules: Vec<ScoringRule>,
    doc_threshold: usize,
}

impl ScoringTables {
    pub fn new(
        base_scores: HashMap<RoleTag, f64>,
        keywords: Vec<String>,
        frameworks: FrameworkDetector,
        rules: Vec<ScoringRule>,
        doc_threshold: usize,
    ) -> Self {
        Self {
            base_scores,
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            frameworks,
            rules,
            doc_threshold,
        }
    }

    /// Build tables from configuration, applying any overrides
    pub fn from_config(config: &ScoringConfig) -> Result<Self> {
        let mut base_scores = default_base_scores();
        for (role, score) in &config.base_scores {
            if !score.is_finite() || *score < 0.0 {
                return Err(ContextError::Configuration(format!(
                    "base score for {} must be a non-negative number, got {}",
                    role.as_str(),
                    score
                )));
            }
            base_scores.insert(*role, *score);
        }

        let keywords = config.keywords.clone().unwrap_or_else(default_keywords);
        let frameworks = config
            .frameworks
            .clone()
            .map(FrameworkDetector::new)
            .unwrap_or_default();

        Ok(Self::new(
            base_scores,
            keywords,
            frameworks,
            default_rules(config),
            config.doc_threshold,
        ))
    }

    pub fn base_score(&self, role: RoleTag) -> f64 {
        self.base_scores
            .get(&role)
            .copied()
            .unwrap_or_else(|| default_base_score(role))
    }

    pub fn rules(&self) -> &[ScoringRule] {
        &self.rules
    }

    pub fn frameworks(&self) -> &FrameworkDetector {
        &self.frameworks
    }

    /// First keyword that prefixes a word of any candidate name
    pub fn match_keyword<'a>(&self, candidates: impl IntoIterator<Item = &'a str>) -> Option<&str> {
        let words: Vec<String> = candidates.into_iter().flat_map(name_words).collect();
        self.keywords
            .iter()
            .find(|kw| words.iter().any(|w| w.starts_with(kw.as_str())))
            .map(String::as_str)
    }

    pub fn is_documented(&self, doc: Option<&str>) -> bool {
        doc.map(|d| d.chars().filter(|c| !c.is_whitespace()).count() > self.doc_threshold)
            .unwrap_or(false)
    }
}

impl Default for ScoringTables {
    fn default() -> Self {
        let config = ScoringConfig::default();
        Self::new(
            default_base_scores(),
            default_keywords(),
            FrameworkDetector::default(),
            default_rules(&config),
            config.doc_threshold,
        )
    }
}

fn default_base_scores() -> HashMap<RoleTag, f64> {
    ALL_ROLES
        .iter()
        .map(|role| (*role, default_base_score(*role)))
        .collect()
}

/// The standard rule list: bonuses first, penalties last
pub fn default_rules(config: &ScoringConfig) -> Vec<ScoringRule> {
    vec![
        ScoringRule {
            name: "entry_point",
            predicate: entry_point_rule,
            effect: Effect::BoostBase(config.entry_point_bonus),
        },
        ScoringRule {
            name: "documented",
            predicate: documented_rule,
            effect: Effect::Bonus(config.doc_bonus),
        },
        ScoringRule {
            name: "inheritance",
            predicate: inheritance_rule,
            effect: Effect::Bonus(config.inheritance_bonus),
        },
        ScoringRule {
            name: "keyword",
            predicate: keyword_rule,
            effect: Effect::Bonus(config.keyword_bonus),
        },
        ScoringRule {
            name: "framework",
            predicate: framework_rule,
            effect: Effect::Bonus(config.framework_bonus),
        },
        ScoringRule {
            name: "private",
            predicate: private_rule,
            effect: Effect::Penalty(config.private_penalty),
        },
        ScoringRule {
            name: "dunder",
            predicate: dunder_rule,
            effect: Effect::Penalty(config.dunder_penalty),
        },
    ]
}

/// Outcome of running the rule list over a set of facts
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub role: RoleTag,
    pub base: f64,
    pub multiplier: f64,
    pub reasons: Vec<String>,
}

impl RuleOutcome {
    pub fn priority(&self) -> f64 {
        self.base * self.multiplier
    }
}

/// Evaluate the role table and rules in order. With `apply_bonuses` off
/// only the role is resolved.
pub fn evaluate(tables: &ScoringTables, facts: &ItemFacts, apply_bonuses: bool) -> RuleOutcome {
    let role = resolve_role(facts);
    let mut base = tables.base_score(role);
    let mut multiplier = 1.0;
    let mut reasons = vec![format!("role:{}", role.as_str())];

    if apply_bonuses {
        for rule in tables.rules() {
            let Some(tag) = (rule.predicate)(facts) else {
                continue;
            };
            match rule.effect {
                Effect::BoostBase(fraction) => base += base * fraction,
                Effect::Bonus(amount) => multiplier += amount,
                Effect::Penalty(factor) => multiplier *= factor,
            }
            reasons.push(tag);
        }
    }

    RuleOutcome {
        role,
        base,
        multiplier,
        reasons,
    }
}

/// Borrowed view of one content item
#[derive(Debug, Clone, Copy)]
pub enum ContentItem<'a> {
    Class(&'a ClassInfo),
    Method(&'a FunctionInfo),
    Function(&'a FunctionInfo),
    Example(&'a UsageExample),
    Configuration(&'a ConfigurationBlock),
}

impl<'a> ContentItem<'a> {
    pub fn category(&self) -> ItemCategory {
        match self {
            ContentItem::Class(_) => ItemCategory::Class,
            ContentItem::Method(_) => ItemCategory::Method,
            ContentItem::Function(_) => ItemCategory::Function,
            ContentItem::Example(_) => ItemCategory::Example,
            ContentItem::Configuration(_) => ItemCategory::Configuration,
        }
    }

    /// Declared name; blank names count as missing
    pub fn name(&self) -> Option<&'a str> {
        let name = match self {
            ContentItem::Class(c) => c.name.as_deref(),
            ContentItem::Method(f) | ContentItem::Function(f) => f.name.as_deref(),
            ContentItem::Example(e) => e.title.as_deref(),
            ContentItem::Configuration(c) => c.name.as_deref(),
        };
        name.map(str::trim).filter(|n| !n.is_empty())
    }

    pub fn doc(&self) -> Option<&'a str> {
        match self {
            ContentItem::Class(c) => c.docstring.as_deref(),
            ContentItem::Method(f) | ContentItem::Function(f) => f.docstring.as_deref(),
            ContentItem::Example(e) => e.description.as_deref(),
            ContentItem::Configuration(_) => None,
        }
    }

    pub fn identifying_text(&self) -> String {
        match self {
            ContentItem::Class(c) => c.identifying_text(),
            ContentItem::Method(f) | ContentItem::Function(f) => f.identifying_text(),
            ContentItem::Example(e) => e.identifying_text(),
            ContentItem::Configuration(c) => c.identifying_text(),
        }
    }

    fn decorators(&self) -> &'a [String] {
        match self {
            ContentItem::Class(c) => &c.decorators,
            ContentItem::Method(f) | ContentItem::Function(f) => &f.decorators,
            _ => &[],
        }
    }

    fn bases(&self) -> &'a [String] {
        match self {
            ContentItem::Class(c) => &c.bases,
            _ => &[],
        }
    }

    fn is_property(&self) -> bool {
        match self {
            ContentItem::Method(f) | ContentItem::Function(f) => {
                f.is_property || f.has_decorator("property")
            }
            _ => false,
        }
    }
}

/// Structural context of an item
#[derive(Debug, Clone, Default)]
pub struct ScoringContext<'a> {
    pub module: Option<&'a str>,
    pub class: Option<&'a str>,
    /// Recognized program entry point
    pub is_entry_point: bool,
    /// Some other class in the project derives from this one
    pub is_inherited: bool,
    /// Import statements of the containing module
    pub imports: &'a [String],
    /// Position in discovery order, used for placeholder identities
    pub discovery_index: usize,
}

/// Maps content items to scored items
#[derive(Clone)]
pub struct ScoringEngine {
    tables: Arc<ScoringTables>,
    estimator: Arc<dyn TokenEstimator>,
}

impl ScoringEngine {
    pub fn new(tables: ScoringTables, estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            tables: Arc::new(tables),
            estimator,
        }
    }

    /// Create with default tables
    pub fn with_estimator(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self::new(ScoringTables::default(), estimator)
    }

    pub fn tables(&self) -> &ScoringTables {
        &self.tables
    }

    /// Score a single item in its context
    pub fn score(&self, item: ContentItem<'_>, context: &ScoringContext<'_>) -> Result<ScoredItem> {
        let category = item.category();
        let text = item.identifying_text();
        let facts = self.facts(&item, context, &text);

        let (id, outcome) = match item.name() {
            Some(name) => (qualified_id(category, context, name), evaluate(&self.tables, &facts, true)),
            None => {
                let mut outcome = evaluate(&self.tables, &facts, false);
                outcome.reasons.insert(0, "placeholder_identity".to_string());
                (placeholder_id(category, context, &text), outcome)
            }
        };

        let token_cost = self.estimator.estimate(&text, category.content_type())?;
        let priority = outcome.priority();

        debug!(
            "Scored {} {}: priority={:.2} tokens={} reasons={:?}",
            category, id, priority, token_cost, outcome.reasons
        );

        Ok(ScoredItem::new(id, category, priority, token_cost, outcome.reasons, text))
    }

    fn facts(&self, item: &ContentItem<'_>, context: &ScoringContext<'_>, text: &str) -> ItemFacts {
        let name = item.name().map(str::to_string);
        let bare = name.as_deref().map(|n| n.rsplit('.').next().unwrap_or(n));
        let category = item.category();

        let is_dunder = bare.map(|n| n.len() > 4 && n.ends_with("__")).unwrap_or(false);
        let is_private = bare.map(|n| n.starts_with('_') && !is_dunder).unwrap_or(false);

        let doc = item.doc();
        let is_deprecated = item
            .decorators()
            .iter()
            .any(|d| d.to_lowercase().contains("deprecated"))
            || doc
                .map(|d| d.to_lowercase().contains("deprecated"))
                .unwrap_or(false);

        let module_words: Vec<String> = context.module.map(name_words).unwrap_or_default();
        let is_test = bare
            .map(|n| n.starts_with("test_") || n.starts_with("Test"))
            .unwrap_or(false)
            || module_words.iter().any(|w| w == "test" || w == "tests");
        let is_utility = module_words
            .iter()
            .any(|w| w.starts_with("util") || w.starts_with("helper"));

        let inherits = context.is_inherited
            || item
                .bases()
                .iter()
                .any(|b| !b.trim().is_empty() && b.trim() != "object");

        let keyword = self
            .tables
            .match_keyword(bare.into_iter().chain(context.class).chain(context.module))
            .map(str::to_string);

        let mut framework_text = String::from(text);
        for extra in item
            .decorators()
            .iter()
            .chain(item.bases())
            .chain(context.imports)
        {
            framework_text.push('\n');
            framework_text.push_str(extra);
        }
        let framework = self
            .tables
            .frameworks()
            .detect(&framework_text)
            .map(str::to_string);

        ItemFacts {
            category,
            name,
            documented: self.tables.is_documented(doc),
            inherits,
            is_property: item.is_property(),
            is_entry_point: context.is_entry_point,
            is_private,
            is_dunder,
            is_test,
            is_utility,
            is_deprecated,
            keyword,
            framework,
        }
    }

    /// Score every item of a project in discovery order: modules in order,
    /// each class followed by its methods, then free functions; then
    /// examples and configuration blocks.
    pub fn score_project(&self, project: &ProjectModel) -> Result<Vec<ScoredItem>> {
        let inherited: HashSet<&str> = project
            .modules
            .iter()
            .flat_map(|m| m.classes.iter())
            .flat_map(|c| c.bases.iter())
            .map(|b| b.rsplit('.').next().unwrap_or(b).trim())
            .collect();

        let mut items = Vec::with_capacity(project.item_count());

        for module in &project.modules {
            let module_name = Some(module.name.as_str()).filter(|n| !n.is_empty());

            for class in &module.classes {
                let class_ctx = ScoringContext {
                    module: module_name,
                    class: None,
                    is_entry_point: false,
                    is_inherited: class
                        .name
                        .as_deref()
                        .map(|n| inherited.contains(n))
                        .unwrap_or(false),
                    imports: &module.imports,
                    discovery_index: items.len(),
                };
                let scored_class = self.score(ContentItem::Class(class), &class_ctx)?;
                let class_id = scored_class.id().to_string();
                items.push(scored_class);

                for method in &class.methods {
                    let method_ctx = ScoringContext {
                        module: module_name,
                        class: Some(class_id.as_str()),
                        is_entry_point: false,
                        is_inherited: false,
                        imports: &module.imports,
                        discovery_index: items.len(),
                    };
                    items.push(self.score(ContentItem::Method(method), &method_ctx)?);
                }
            }

            for function in &module.functions {
                let ctx = ScoringContext {
                    module: module_name,
                    class: None,
                    is_entry_point: is_entry_point(function, module.is_entry_point),
                    is_inherited: false,
                    imports: &module.imports,
                    discovery_index: items.len(),
                };
                items.push(self.score(ContentItem::Function(function), &ctx)?);
            }
        }

        for example in &project.examples {
            let ctx = ScoringContext {
                discovery_index: items.len(),
                ..Default::default()
            };
            items.push(self.score(ContentItem::Example(example), &ctx)?);
        }

        for block in &project.configuration {
            let ctx = ScoringContext {
                discovery_index: items.len(),
                ..Default::default()
            };
            items.push(self.score(ContentItem::Configuration(block), &ctx)?);
        }

        info!("Scored {} content items for project '{}'", items.len(), project.name);
        Ok(items)
    }
}

const ENTRY_POINT_NAMES: &[&str] = &["cli", "run", "start", "app"];

fn is_entry_point(function: &FunctionInfo, module_is_entry: bool) -> bool {
    match function.name.as_deref().map(str::trim) {
        Some("main") => true,
        Some(name) => module_is_entry && ENTRY_POINT_NAMES.contains(&name),
        None => false,
    }
}

fn qualified_id(category: ItemCategory, context: &ScoringContext<'_>, name: &str) -> String {
    match category {
        ItemCategory::Example => format!("example:{}", name),
        ItemCategory::Configuration => format!("config:{}", name),
        _ => match (context.class, context.module) {
            (Some(class), _) => format!("{}.{}", class, name),
            (None, Some(module)) => format!("{}.{}", module, name),
            (None, None) => name.to_string(),
        },
    }
}

/// Deterministic identity for an item without a usable name
fn placeholder_id(category: ItemCategory, context: &ScoringContext<'_>, text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let label = format!(
        "<unnamed-{}-{}-{}>",
        category,
        context.discovery_index,
        hex::encode(&digest[..4])
    );
    match (context.class, context.module) {
        (Some(class), _) => format!("{}.{}", class, label),
        (None, Some(module)) => format!("{}.{}", module, label),
        (None, None) => label,
    }
}

/// Split an identifier into lowercase words on `_`, `.`, `/`, `-` and
/// camelCase boundaries
pub fn name_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '_' || ch == '.' || ch == '/' || ch == '-' || ch.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
