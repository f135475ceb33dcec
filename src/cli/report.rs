use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use euer::error::Result;
use euer::events::SqliteEventSource;
use euer::fmt::euro;
use euer::models::LineKind;
use euer::reports::get_report;
use euer::settings::load_settings;

pub fn run(db: Option<&Path>, year: i32, from_date: Option<&str>, to_date: Option<&str>) -> Result<()> {
    let conn = super::open_db(db)?;
    let range = super::parse_range(year, from_date, to_date)?;
    let config = load_settings()?.tax;
    let report = get_report(&conn, &SqliteEventSource::new(&conn), year, range, &config)?;

    let mut table = Table::new();
    table.set_header(vec!["Kz", "Line", "Amount"]);
    for row in &report.rows {
        let label = match row.kind {
            LineKind::Computed => Cell::new(row.label.as_str().bold()),
            _ => Cell::new(&row.label),
        };
        table.add_row(vec![
            Cell::new(row.kennziffer.as_deref().unwrap_or("")),
            label,
            Cell::new(euro(row.total)),
        ]);
    }

    println!("EÜR {year} ({} to {})\n{table}", report.range.from, report.range.to);
    println!("Income:    {}", euro(report.summary.income_total).green());
    println!("Expenses:  {}", euro(report.summary.expense_total).red());
    let surplus = euro(report.summary.surplus);
    if report.summary.surplus.is_sign_negative() {
        println!("Surplus:   {}", surplus.red().bold());
    } else {
        println!("Surplus:   {}", surplus.bold());
    }

    if report.unclassified_count > 0 {
        println!(
            "{}",
            format!("{} event(s) unclassified. Run `euer review --year {year}`.", report.unclassified_count).yellow()
        );
    }
    for warning in &report.warnings {
        println!("{} {warning}", "warning:".yellow());
    }
    Ok(())
}
