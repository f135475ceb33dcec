//! Last-resort heuristics: fixed German keywords per flow type, then a
//! default line.

use crate::catalog::Catalog;
use crate::models::{FlowType, RawEvent};

use super::{normalize, Suggestion, SuggestionLayer};

// (kennziffer, groups): every group must contain at least one term found in the text
type KeywordRule = (&'static str, &'static [&'static [&'static str]]);

const EXPENSE_RULES: &[KeywordRule] = &[
    ("150", &[&["miete", "pacht", "coworking", "büroraum"]]),
    ("280", &[&["telekom", "vodafone", "telefónica", "mobilfunk", "telefon", "festnetz", "internetanschluss"]]),
    ("228", &[&["software", "saas", "lizenz", "github", "adobe", "microsoft", "google workspace", "hosting", "hetzner", "aws", "jetbrains", "atlassian"]]),
    ("194", &[&["steuerberat", "rechtsanwalt", "anwaltskanzlei", "notar", "buchhaltung", "buchführung", "datev", "wirtschaftsprüf"]]),
    ("224", &[&["werbung", "marketing", "anzeige", "google ads", "meta ads", "facebook ads", "linkedin", "flyer", "druckerei"]]),
    ("221", &[&["hotel", "übernachtung", "deutsche bahn", "db fernverkehr", "bahncard", "lufthansa", "flug", "reisekosten", "taxi"]]),
    ("147", &[&["tankstelle", "aral", "shell", "esso", "kraftstoff", "parkhaus", "parkgebühr", "kfz-werkstatt"]]),
    ("223", &[&["versicherung", "beitrag", "gebühr", "ihk", "handwerkskammer", "kontoführung", "rundfunkbeitrag"]]),
    ("234", &[&["zinsen", "sollzins", "überziehungszins", "darlehenszins"]]),
    ("186", &[&["finanzamt"], &["umsatzsteuer", "ust-vorauszahlung", "ust vorauszahlung", "voranmeldung"]]),
    ("185", &[&["vorsteuer"]]),
];

const INCOME_RULES: &[KeywordRule] = &[
    ("141", &[&["finanzamt", "umsatzsteuer", "ust-"], &["erstattung", "rückzahlung", "guthaben"]]),
    ("103", &[&["rückerstattung", "erstattung", "gutschrift", "refund"]]),
];

// Short brand names that must start a word: "aws" is not in "laws", "flug" is
// not in "ausflug". Every other term also matches inside German compounds.
const WORD_START_TERMS: &[&str] = &["aws", "aral", "esso", "shell", "flug", "taxi", "ihk", "saas", "datev", "notar"];

fn term_found(text: &str, term: &str) -> bool {
    if !WORD_START_TERMS.contains(&term) {
        return text.contains(term);
    }
    text.match_indices(term)
        .any(|(i, _)| text[..i].chars().next_back().map_or(true, |c| !c.is_alphanumeric()))
}

fn matched_term(text: &str, groups: &[&'static [&'static str]]) -> Option<&'static str> {
    let mut first = None;
    for group in groups {
        let hit = group.iter().copied().find(|term| term_found(text, term))?;
        first.get_or_insert(hit);
    }
    first
}

pub fn suggest(catalog: &Catalog, event: &RawEvent) -> Option<Suggestion> {
    let text = normalize(&format!("{} {}", event.counterparty, event.purpose));
    let rules = match event.flow_type {
        FlowType::Income => INCOME_RULES,
        FlowType::Expense => EXPENSE_RULES,
    };

    for (kennziffer, groups) in rules {
        let Some(term) = matched_term(&text, groups) else {
            continue;
        };
        if let Some(line) = catalog
            .by_kennziffer(kennziffer)
            .filter(|l| l.kind.accepts(event.flow_type))
        {
            return Some(Suggestion {
                line_id: line.id.clone(),
                reason: format!("Keyword \"{term}\" (Kz {kennziffer})"),
                layer: SuggestionLayer::Keyword,
            });
        }
    }

    catalog.default_line(event.flow_type).map(|line| Suggestion {
        line_id: line.id.clone(),
        reason: format!("Default {} line", event.flow_type),
        layer: SuggestionLayer::Keyword,
    })
}
