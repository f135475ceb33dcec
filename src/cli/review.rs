use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use euer::error::Result;
use euer::events::SqliteEventSource;
use euer::fmt::euro;
use euer::models::FlowType;
use euer::reviewer::{accept_suggestions, list_review_items};

pub fn run(
    db: Option<&Path>,
    year: i32,
    from_date: Option<&str>,
    to_date: Option<&str>,
    accept: bool,
) -> Result<()> {
    let conn = super::open_db(db)?;
    let range = super::parse_range(year, from_date, to_date)?;
    let items = list_review_items(&conn, &SqliteEventSource::new(&conn), year, range)?;
    let open: Vec<_> = items.into_iter().filter(|i| i.needs_review()).collect();

    if open.is_empty() {
        println!("{}", "Nothing to review.".green());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Source", "Date", "Counterparty", "Purpose", "Amount", "Suggestion", "Reason"]);
    for item in &open {
        let amount = euro(item.event.amount_gross);
        table.add_row(vec![
            Cell::new(item.event.map_key()),
            Cell::new(item.event.date),
            Cell::new(&item.event.counterparty),
            Cell::new(&item.event.purpose),
            Cell::new(match item.event.flow_type {
                FlowType::Income => amount.green(),
                FlowType::Expense => amount.red(),
            }),
            Cell::new(item.suggested_line_id.as_deref().unwrap_or("-")),
            Cell::new(item.suggestion_reason.as_deref().unwrap_or("")),
        ]);
    }
    println!("Open events {year}\n{table}");

    if accept {
        let snapshots = accept_suggestions(&conn, year, &open)?;
        println!("Accepted {} suggestion(s).", snapshots.len());
    } else {
        println!("{} event(s) need a decision. Run with --accept to store the suggestions.", open.len());
    }
    Ok(())
}
