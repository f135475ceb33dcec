use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::classifications::{self, Snapshot};
use crate::error::Result;
use crate::events::{DateRange, EventSource};
use crate::models::{Classification, ClassificationInput, RawEvent, VatMode};
use crate::suggest::{self, SuggestionContext, SuggestionLayer};

/// An event with its stored decision and, when undecided, a proposal.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub event: RawEvent,
    pub classification: Option<Classification>,
    pub suggested_line_id: Option<String>,
    pub suggestion_reason: Option<String>,
    pub suggestion_layer: Option<SuggestionLayer>,
}

impl ReviewItem {
    pub fn needs_review(&self) -> bool {
        self.classification.as_ref().map_or(true, Classification::is_undecided)
    }
}

/// Pair events with decisions and run the pipeline on the undecided ones.
pub fn review_items(
    ctx: &SuggestionContext,
    decided: &HashMap<String, Classification>,
    events: Vec<RawEvent>,
) -> Vec<ReviewItem> {
    events
        .into_iter()
        .map(|event| {
            let classification = decided.get(&event.map_key()).cloned();
            let mut item = ReviewItem {
                event,
                classification,
                suggested_line_id: None,
                suggestion_reason: None,
                suggestion_layer: None,
            };
            if item.needs_review() {
                if let Some(s) = suggest::suggest(ctx, &item.event) {
                    item.suggested_line_id = Some(s.line_id);
                    item.suggestion_reason = Some(s.reason);
                    item.suggestion_layer = Some(s.layer);
                }
            }
            item
        })
        .collect()
}

pub fn list_review_items(
    conn: &Connection,
    source: &dyn EventSource,
    tax_year: i32,
    range: Option<DateRange>,
) -> Result<Vec<ReviewItem>> {
    let range = match range {
        Some(r) => r,
        None => DateRange::calendar_year(tax_year)?,
    };
    let ctx = suggest::build_context(conn, source, tax_year)?;
    let decided = classifications::list_for_year_as_map(conn, tax_year)?;
    let events = source.events(&range)?;
    Ok(review_items(&ctx, &decided, events))
}

/// Store the suggested line of every undecided item. Returns the state
/// before the write so the caller can undo with [`classifications::restore`].
pub fn accept_suggestions(conn: &Connection, tax_year: i32, items: &[ReviewItem]) -> Result<Vec<Snapshot>> {
    let accepted: Vec<(&ReviewItem, &str)> = items
        .iter()
        .filter(|i| i.needs_review())
        .filter_map(|i| i.suggested_line_id.as_deref().map(|l| (i, l)))
        .collect();

    let keys: Vec<_> = accepted.iter().map(|(i, _)| i.event.key(tax_year)).collect();
    let snapshots = classifications::snapshot(conn, &keys)?;
    let inputs: Vec<ClassificationInput> = accepted
        .iter()
        .zip(&keys)
        .map(|((_, line), key)| ClassificationInput::line(key, *line, VatMode::Default))
        .collect();
    classifications::upsert_many(conn, &inputs)?;
    Ok(snapshots)
}
