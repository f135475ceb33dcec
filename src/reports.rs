use std::collections::HashMap;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::{self, Catalog};
use crate::classifications;
use crate::error::{EuerError, Result};
use crate::events::{DateRange, EventSource};
use crate::fmt::round_cents;
use crate::models::{Classification, LineKind, RawEvent, VatMode};
use crate::settings::TaxConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub line_id: String,
    pub kennziffer: Option<String>,
    pub label: String,
    pub kind: LineKind,
    pub exportable: bool,
    pub sort_order: i32,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportSummary {
    pub income_total: Decimal,
    pub expense_total: Decimal,
    pub surplus: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub tax_year: i32,
    #[serde(skip)]
    pub range: DateRange,
    pub rows: Vec<ReportRow>,
    pub summary: ReportSummary,
    pub unclassified_count: usize,
    pub warnings: Vec<String>,
}

impl Report {
    pub fn row(&self, line_id: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.line_id == line_id)
    }
}

/// Net amount of a gross event amount, rounded to cents.
pub fn net_amount(gross: Decimal, vat_mode: VatMode, config: &TaxConfig) -> Result<Decimal> {
    if config.small_business_rule || vat_mode != VatMode::Default {
        return Ok(round_cents(gross));
    }
    config.validate()?;
    let divisor = Decimal::ONE + config.default_vat_rate / Decimal::ONE_HUNDRED;
    gross
        .checked_div(divisor)
        .map(round_cents)
        .ok_or_else(|| EuerError::InvalidValue {
            field: "VAT rate",
            value: config.default_vat_rate.to_string(),
        })
}

/// Memoized totals over the catalog's line table; index = position in
/// `Catalog::lines`.
struct Resolver<'a> {
    catalog: &'a Catalog,
    direct: Vec<Decimal>,
    cache: Vec<Option<Decimal>>,
}

impl<'a> Resolver<'a> {
    fn new(catalog: &'a Catalog, direct: Vec<Decimal>) -> Self {
        let cache = vec![None; direct.len()];
        Self {
            catalog,
            direct,
            cache,
        }
    }

    fn resolve(&mut self, idx: usize) -> Decimal {
        if let Some(total) = self.cache[idx] {
            return total;
        }
        let catalog = self.catalog;
        let line = &catalog.lines()[idx];
        let total = if line.is_computed() {
            line.computed_from_ids
                .iter()
                .filter_map(|child| catalog.index_of(child))
                .fold(Decimal::ZERO, |sum, child| round_cents(sum + self.resolve(child)))
        } else {
            self.direct[idx]
        };
        self.cache[idx] = Some(total);
        total
    }
}

/// Why an event could not be booked onto its classified line.
fn line_problem(catalog: &Catalog, event: &RawEvent, line_id: &str) -> std::result::Result<usize, String> {
    let key = event.map_key();
    let Some(idx) = catalog.index_of(line_id) else {
        return Err(format!("{key}: unknown line '{line_id}'"));
    };
    let line = &catalog.lines()[idx];
    if line.is_computed() {
        return Err(format!("{key}: line '{line_id}' is computed and cannot hold events"));
    }
    if !line.kind.accepts(event.flow_type) {
        return Err(format!(
            "{key}: {} event classified to {} line '{line_id}'",
            event.flow_type, line.kind
        ));
    }
    Ok(idx)
}

/// Aggregate events onto the catalog. Pure: no store access. Fails only on
/// an invalid `config`.
pub fn build_report(
    catalog: &Catalog,
    decided: &HashMap<String, Classification>,
    events: &[RawEvent],
    range: &DateRange,
    config: &TaxConfig,
) -> Result<Report> {
    config.validate()?;
    let mut direct = vec![Decimal::ZERO; catalog.lines().len()];
    let mut unclassified_count = 0usize;
    let mut warnings = Vec::new();

    for event in events.iter().filter(|e| range.contains(e.date)) {
        let classification = decided.get(&event.map_key());
        if classification.is_some_and(|c| c.excluded) {
            continue;
        }
        let Some((c, line_id)) = classification.and_then(|c| c.eur_line_id.as_deref().map(|l| (c, l))) else {
            unclassified_count += 1;
            continue;
        };
        match line_problem(catalog, event, line_id) {
            Ok(idx) => {
                let net = net_amount(event.amount_gross, c.vat_mode, config)?;
                direct[idx] = round_cents(direct[idx] + net);
            }
            Err(problem) => {
                warn!("{problem}");
                warnings.push(problem);
                unclassified_count += 1;
            }
        }
    }

    let mut resolver = Resolver::new(catalog, direct);
    let rows: Vec<ReportRow> = catalog
        .lines()
        .iter()
        .enumerate()
        .map(|(idx, line)| ReportRow {
            line_id: line.id.clone(),
            kennziffer: line.kennziffer.clone(),
            label: line.label.clone(),
            kind: line.kind,
            exportable: line.exportable,
            sort_order: line.sort_order,
            total: resolver.resolve(idx),
        })
        .collect();

    let sum_kind = |kind: LineKind| {
        rows.iter()
            .filter(|r| r.kind == kind)
            .fold(Decimal::ZERO, |sum, r| round_cents(sum + r.total))
    };
    let income_total = sum_kind(LineKind::Income);
    let expense_total = sum_kind(LineKind::Expense);
    let summary = ReportSummary {
        income_total,
        expense_total,
        surplus: round_cents(income_total - expense_total),
    };

    debug!(
        tax_year = catalog.tax_year(),
        income = %summary.income_total,
        expense = %summary.expense_total,
        unclassified = unclassified_count,
        warnings = warnings.len(),
        "report built"
    );

    Ok(Report {
        tax_year: catalog.tax_year(),
        range: *range,
        rows,
        summary,
        unclassified_count,
        warnings,
    })
}

/// Load catalog, classifications and events for `tax_year` and aggregate.
/// `range` defaults to the calendar year.
pub fn get_report(
    conn: &Connection,
    source: &dyn EventSource,
    tax_year: i32,
    range: Option<DateRange>,
    config: &TaxConfig,
) -> Result<Report> {
    let catalog = catalog::load(tax_year)?;
    let range = match range {
        Some(r) => r,
        None => DateRange::calendar_year(tax_year)?,
    };
    let decided = classifications::list_for_year_as_map(conn, tax_year)?;
    let events = source.events(&range)?;
    build_report(&catalog, &decided, &events, &range, config)
}
