//! Cascading line suggestions for unclassified events.
//!
//! Layers run in a fixed order (user rules, counterparty memory, naive Bayes,
//! keyword fallback) and the first one that yields a line wins. Nothing here
//! writes to the store.

pub mod bayes;
pub mod keywords;
pub mod memory;

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::catalog::{self, Catalog};
use crate::classifications;
use crate::error::Result;
use crate::events::{DateRange, EventSource};
use crate::models::{Classification, RawEvent, Rule, RuleField, RuleOperator};
use crate::rules;

use self::bayes::NaiveBayes;
use self::memory::CounterpartyMemory;

/// Case-fold and collapse whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionLayer {
    Rule,
    Counterparty,
    Bayes,
    Keyword,
}

impl SuggestionLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionLayer::Rule => "rule",
            SuggestionLayer::Counterparty => "counterparty",
            SuggestionLayer::Bayes => "bayes",
            SuggestionLayer::Keyword => "keyword",
        }
    }
}

impl fmt::Display for SuggestionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub line_id: String,
    pub reason: String,
    pub layer: SuggestionLayer,
}

/// A confirmed decision joined with the text of its event.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    pub counterparty: String,
    pub purpose: String,
    pub eur_line_id: String,
    pub updated_at: DateTime<Utc>,
}

impl LabeledExample {
    pub fn text(&self) -> String {
        format!("{} {}", self.counterparty, self.purpose)
    }
}

/// Join classifications with their events, keeping non-excluded rows that
/// carry a line.
pub fn labeled_examples(classifications: &[Classification], events: &[RawEvent]) -> Vec<LabeledExample> {
    let by_key: HashMap<String, &RawEvent> = events.iter().map(|e| (e.map_key(), e)).collect();
    classifications
        .iter()
        .filter(|c| !c.excluded)
        .filter_map(|c| {
            let line_id = c.eur_line_id.as_ref()?;
            let event = by_key.get(&c.map_key())?;
            Some(LabeledExample {
                counterparty: event.counterparty.clone(),
                purpose: event.purpose.clone(),
                eur_line_id: line_id.clone(),
                updated_at: c.updated_at,
            })
        })
        .collect()
}

/// Everything the layers need, built once per batch.
#[derive(Debug, Clone)]
pub struct SuggestionContext {
    catalog: Catalog,
    rules: Vec<Rule>,
    memory: CounterpartyMemory,
    model: Option<NaiveBayes>,
}

impl SuggestionContext {
    /// Rules, memory entries and training examples whose target is not a
    /// bookable line of `catalog` are dropped.
    pub fn new(catalog: Catalog, rules: Vec<Rule>, history: &[LabeledExample]) -> Self {
        let mut rules: Vec<Rule> = rules
            .into_iter()
            .filter(|r| r.active && r.tax_year == catalog.tax_year())
            .filter(|r| catalog.is_bookable(&r.target_eur_line_id))
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        let history: Vec<LabeledExample> = history
            .iter()
            .filter(|e| catalog.is_bookable(&e.eur_line_id))
            .cloned()
            .collect();
        let memory = CounterpartyMemory::build(&history);
        let model = NaiveBayes::train(&history);

        debug!(
            tax_year = catalog.tax_year(),
            rules = rules.len(),
            memory = memory.len(),
            examples = history.len(),
            bayes = model.is_some(),
            "suggestion context built"
        );

        Self {
            catalog,
            rules,
            memory,
            model,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn memory(&self) -> &CounterpartyMemory {
        &self.memory
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }
}

/// Load rules, history and the catalog for `tax_year` and build a context.
pub fn build_context(conn: &Connection, source: &dyn EventSource, tax_year: i32) -> Result<SuggestionContext> {
    let catalog = catalog::load(tax_year)?;
    let rules = rules::list_active_rules(conn, tax_year)?;
    let decided = classifications::list_for_year(conn, tax_year)?;
    let events = source.events(&DateRange::calendar_year(tax_year)?)?;
    let history = labeled_examples(&decided, &events);
    Ok(SuggestionContext::new(catalog, rules, &history))
}

fn rule_matches(rule: &Rule, event: &RawEvent) -> bool {
    let needle = normalize(&rule.value);
    if needle.is_empty() {
        return false;
    }
    let candidates = match rule.field {
        RuleField::Counterparty => vec![normalize(&event.counterparty)],
        RuleField::Purpose => vec![normalize(&event.purpose)],
        RuleField::Any => vec![normalize(&event.counterparty), normalize(&event.purpose)],
    };
    candidates.iter().any(|text| match rule.operator {
        RuleOperator::Contains => text.contains(&needle),
        RuleOperator::Equals => *text == needle,
        RuleOperator::StartsWith => text.starts_with(&needle),
    })
}

/// Whether `line_id` is a bookable line that takes events of `event`'s flow.
fn fits(ctx: &SuggestionContext, line_id: &str, event: &RawEvent) -> bool {
    ctx.catalog
        .get(line_id)
        .is_some_and(|line| line.kind.accepts(event.flow_type))
}

fn rule_layer(ctx: &SuggestionContext, event: &RawEvent) -> Option<Suggestion> {
    let rule = ctx
        .rules
        .iter()
        .find(|r| rule_matches(r, event) && fits(ctx, &r.target_eur_line_id, event))?;
    Some(Suggestion {
        line_id: rule.target_eur_line_id.clone(),
        reason: format!(
            "Rule #{}: {} {} \"{}\"",
            rule.id, rule.field, rule.operator, rule.value
        ),
        layer: SuggestionLayer::Rule,
    })
}

fn counterparty_layer(ctx: &SuggestionContext, event: &RawEvent) -> Option<Suggestion> {
    let line_id = ctx
        .memory
        .lookup(&event.counterparty)
        .filter(|line| fits(ctx, line, event))?;
    Some(Suggestion {
        line_id: line_id.to_string(),
        reason: format!("Previously classified counterparty \"{}\"", event.counterparty.trim()),
        layer: SuggestionLayer::Counterparty,
    })
}

fn bayes_layer(ctx: &SuggestionContext, event: &RawEvent) -> Option<Suggestion> {
    let model = ctx.model.as_ref()?;
    let prediction = model
        .predict(&format!("{} {}", event.counterparty, event.purpose))
        .filter(|p| fits(ctx, &p.line_id, event))?;
    Some(Suggestion {
        line_id: prediction.line_id,
        reason: format!("Naive Bayes ({:.0}% confidence)", prediction.confidence * 100.0),
        layer: SuggestionLayer::Bayes,
    })
}

fn keyword_layer(ctx: &SuggestionContext, event: &RawEvent) -> Option<Suggestion> {
    keywords::suggest(&ctx.catalog, event)
}

pub type Layer = fn(&SuggestionContext, &RawEvent) -> Option<Suggestion>;

/// Evaluation order; the first `Some` wins. Every layer only proposes lines
/// whose kind matches the event's flow type.
pub const LAYERS: [Layer; 4] = [rule_layer, counterparty_layer, bayes_layer, keyword_layer];

pub fn suggest(ctx: &SuggestionContext, event: &RawEvent) -> Option<Suggestion> {
    LAYERS.iter().find_map(|layer| layer(ctx, event))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::events::parse_date;
    use crate::models::{FlowType, SourceType, VatMode};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    pub(crate) fn example(counterparty: &str, purpose: &str, line: &str) -> LabeledExample {
        LabeledExample {
            counterparty: counterparty.to_string(),
            purpose: purpose.to_string(),
            eur_line_id: line.to_string(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    pub(crate) fn event(counterparty: &str, purpose: &str, flow: FlowType) -> RawEvent {
        RawEvent {
            source_type: SourceType::Transaction,
            source_id: "1".to_string(),
            date: parse_date("2025-03-01").unwrap(),
            amount_gross: dec!(10),
            flow_type: flow,
            counterparty: counterparty.to_string(),
            purpose: purpose.to_string(),
            account_id: Some(1),
            linked_via_invoice: false,
        }
    }

    fn rule(id: i64, priority: i64, field: RuleField, operator: RuleOperator, value: &str, target: &str) -> Rule {
        Rule {
            id,
            tax_year: 2025,
            priority,
            field,
            operator,
            value: value.to_string(),
            target_eur_line_id: target.to_string(),
            active: true,
        }
    }

    fn context(rules: Vec<Rule>, history: &[LabeledExample]) -> SuggestionContext {
        SuggestionContext::new(catalog::load(2025).unwrap(), rules, history)
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Deutsche\tTelekom   AG "), "deutsche telekom ag");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_rule_beats_counterparty_memory() {
        let ctx = context(
            vec![rule(1, 10, RuleField::Counterparty, RuleOperator::Contains, "telekom", "2025-edv")],
            &[example("Telekom", "", "2025-telekommunikation")],
        );
        let s = suggest(&ctx, &event("Telekom", "Mobilfunk", FlowType::Expense)).unwrap();
        assert_eq!(s.layer, SuggestionLayer::Rule);
        assert_eq!(s.line_id, "2025-edv");
    }

    #[test]
    fn test_memory_used_when_no_rule_matches() {
        let ctx = context(
            vec![rule(1, 10, RuleField::Counterparty, RuleOperator::Equals, "vodafone", "2025-edv")],
            &[example("Telekom", "", "2025-werbung")],
        );
        let s = suggest(&ctx, &event("TELEKOM", "Mobilfunk", FlowType::Expense)).unwrap();
        assert_eq!(s.layer, SuggestionLayer::Counterparty);
        assert_eq!(s.line_id, "2025-werbung");
    }

    #[test]
    fn test_lowest_priority_value_wins() {
        let ctx = context(
            vec![
                rule(1, 50, RuleField::Any, RuleOperator::Contains, "hosting", "2025-werbung"),
                rule(2, 5, RuleField::Purpose, RuleOperator::StartsWith, "server", "2025-edv"),
            ],
            &[],
        );
        let s = suggest(&ctx, &event("Hetzner", "Server Hosting", FlowType::Expense)).unwrap();
        assert_eq!(s.line_id, "2025-edv");
        assert!(s.reason.contains("Rule #2"), "got: {}", s.reason);
    }

    #[test]
    fn test_rule_operators() {
        let ev = event("Google Ireland Ltd", "Ads Kampagne", FlowType::Expense);
        let equals = rule(1, 1, RuleField::Counterparty, RuleOperator::Equals, "google  ireland ltd", "x");
        let starts = rule(1, 1, RuleField::Counterparty, RuleOperator::StartsWith, "GOOGLE", "x");
        let starts_miss = rule(1, 1, RuleField::Counterparty, RuleOperator::StartsWith, "ireland", "x");
        let any = rule(1, 1, RuleField::Any, RuleOperator::Contains, "kampagne", "x");
        let purpose_miss = rule(1, 1, RuleField::Purpose, RuleOperator::Contains, "google", "x");
        let empty = rule(1, 1, RuleField::Any, RuleOperator::Contains, "   ", "x");
        assert!(rule_matches(&equals, &ev));
        assert!(rule_matches(&starts, &ev));
        assert!(!rule_matches(&starts_miss, &ev));
        assert!(rule_matches(&any, &ev));
        assert!(!rule_matches(&purpose_miss, &ev));
        assert!(!rule_matches(&empty, &ev));
    }

    #[test]
    fn test_rules_with_invalid_targets_are_skipped() {
        let ctx = context(
            vec![
                rule(1, 1, RuleField::Any, RuleOperator::Contains, "hetzner", "2025-summe-ausgaben"),
                rule(2, 2, RuleField::Any, RuleOperator::Contains, "hetzner", "2024-edv"),
                rule(3, 3, RuleField::Any, RuleOperator::Contains, "hetzner", "2025-edv"),
            ],
            &[],
        );
        assert_eq!(ctx.rules().len(), 1);
        let s = suggest(&ctx, &event("Hetzner", "", FlowType::Expense)).unwrap();
        assert_eq!(s.line_id, "2025-edv");
    }

    #[test]
    fn test_memory_of_other_flow_falls_through() {
        let ctx = context(vec![], &[example("Finanzamt Köln", "Umsatzsteuer 03/2025", "2025-ust-gezahlt")]);

        let payment = suggest(&ctx, &event("Finanzamt Köln", "Umsatzsteuer 04/2025", FlowType::Expense)).unwrap();
        assert_eq!(payment.layer, SuggestionLayer::Counterparty);
        assert_eq!(payment.line_id, "2025-ust-gezahlt");

        let refund = suggest(&ctx, &event("Finanzamt Köln", "Erstattung Umsatzsteuer", FlowType::Income)).unwrap();
        assert_eq!(refund.layer, SuggestionLayer::Keyword);
        assert_eq!(refund.line_id, "2025-ust-erstattet");
    }

    #[test]
    fn test_rule_for_other_flow_is_skipped() {
        let ctx = context(
            vec![
                rule(1, 1, RuleField::Counterparty, RuleOperator::Contains, "acme", "2025-edv"),
                rule(2, 2, RuleField::Counterparty, RuleOperator::Contains, "acme", "2025-steuerpflichtig"),
            ],
            &[],
        );
        let income = suggest(&ctx, &event("ACME AG", "Projekt 17", FlowType::Income)).unwrap();
        assert_eq!(income.line_id, "2025-steuerpflichtig");
        assert!(income.reason.contains("Rule #2"), "got: {}", income.reason);
        let expense = suggest(&ctx, &event("ACME AG", "Lizenz", FlowType::Expense)).unwrap();
        assert_eq!(expense.line_id, "2025-edv");
    }

    #[test]
    fn test_bayes_prediction_of_other_flow_is_dropped() {
        let history: Vec<_> = (0..20)
            .map(|i| example(&format!("Agentur {i}"), "Kampagne Plakat", "2025-werbung"))
            .collect();
        let ctx = context(vec![], &history);
        assert!(ctx.has_model());
        let s = suggest(&ctx, &event("Neue Agentur", "Plakat Kampagne", FlowType::Income)).unwrap();
        assert_eq!(s.layer, SuggestionLayer::Keyword);
        assert_eq!(s.line_id, "2025-steuerpflichtig");
    }

    #[test]
    fn test_bayes_inactive_below_twenty_examples() {
        let history: Vec<_> = (0..19).map(|_| example("Hetzner", "Server", "2025-edv")).collect();
        let ctx = context(vec![], &history);
        assert!(!ctx.has_model());
    }

    #[test]
    fn test_bayes_layer_between_memory_and_keywords() {
        let mut history: Vec<_> = (0..10)
            .map(|i| example(&format!("Agentur {i}"), "Kampagne Plakat", "2025-werbung"))
            .collect();
        history.extend((0..10).map(|i| example(&format!("Lieferant {i}"), "Material Holz", "2025-waren")));
        let ctx = context(vec![], &history);
        assert!(ctx.has_model());

        let s = suggest(&ctx, &event("Neue Agentur", "Plakat Kampagne", FlowType::Expense)).unwrap();
        assert_eq!(s.layer, SuggestionLayer::Bayes);
        assert_eq!(s.line_id, "2025-werbung");
    }

    #[test]
    fn test_keyword_fallback_always_answers() {
        let ctx = context(vec![], &[]);
        let s = suggest(&ctx, &event("Niemand", "", FlowType::Expense)).unwrap();
        assert_eq!(s.layer, SuggestionLayer::Keyword);
        assert_eq!(s.line_id, "2025-sonstige");
    }

    #[test]
    fn test_labeled_examples_join() {
        let ev = event("Hetzner", "Server", FlowType::Expense);
        let decided = |id: i64, line: Option<&str>, excluded: bool| Classification {
            id,
            source_type: SourceType::Transaction,
            source_id: "1".into(),
            tax_year: 2025,
            eur_line_id: line.map(str::to_string),
            excluded,
            vat_mode: VatMode::None,
            note: None,
            updated_at: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        };
        let mut orphan = decided(4, Some("2025-edv"), false);
        orphan.source_id = "404".into();
        let rows = vec![
            decided(1, Some("2025-edv"), false),
            decided(2, None, false),
            decided(3, None, true),
            orphan,
        ];
        let examples = labeled_examples(&rows, &[ev]);
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].counterparty, "Hetzner");
        assert_eq!(examples[0].eur_line_id, "2025-edv");
    }

    #[test]
    fn test_build_context_from_store() {
        use crate::classifications::upsert;
        use crate::db::tests::test_db;
        use crate::models::{ClassificationInput, RuleInput};

        let (_dir, conn) = test_db();
        rules::add_rule(
            &conn,
            &RuleInput {
                id: None,
                tax_year: 2025,
                priority: 1,
                field: RuleField::Purpose,
                operator: RuleOperator::Contains,
                value: "miete".into(),
                target_eur_line_id: "2025-miete".into(),
                active: true,
            },
        )
        .unwrap();
        let ev = event("Hetzner", "Server", FlowType::Expense);
        upsert(&conn, &ClassificationInput::line(&ev.key(2025), "2025-edv", VatMode::Default)).unwrap();

        let source = vec![ev];
        let ctx = build_context(&conn, &source, 2025).unwrap();
        assert_eq!(ctx.rules().len(), 1);
        assert_eq!(ctx.memory().lookup("hetzner"), Some("2025-edv"));
        assert!(!ctx.has_model());
    }
}
