use std::path::Path;

use comfy_table::{Cell, Table};

use euer::catalog;
use euer::error::{EuerError, Result};
use euer::models::RuleInput;
use euer::rules;

pub fn add(
    db: Option<&Path>,
    year: i32,
    value: &str,
    line: &str,
    field: &str,
    operator: &str,
    priority: i64,
) -> Result<()> {
    let catalog = catalog::load(year)?;
    if !catalog.is_bookable(line) {
        return Err(EuerError::InvalidValue {
            field: "line",
            value: format!("{line} is not a bookable line of {year}"),
        });
    }
    let conn = super::open_db(db)?;
    let rule = rules::add_rule(
        &conn,
        &RuleInput {
            id: None,
            tax_year: year,
            priority,
            field: field.parse()?,
            operator: operator.parse()?,
            value: value.to_string(),
            target_eur_line_id: line.to_string(),
            active: true,
        },
    )?;
    println!("Added rule {}: {} {} '{}' \u{2192} {}", rule.id, rule.field, rule.operator, rule.value, rule.target_eur_line_id);
    Ok(())
}

pub fn list(db: Option<&Path>, year: i32) -> Result<()> {
    let conn = super::open_db(db)?;
    let rules = rules::list_rules(&conn, year)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Priority", "Field", "Operator", "Value", "Line", "Active"]);
    for rule in rules {
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(rule.priority),
            Cell::new(rule.field),
            Cell::new(rule.operator),
            Cell::new(rule.value),
            Cell::new(rule.target_eur_line_id),
            Cell::new(if rule.active { "yes" } else { "no" }),
        ]);
    }
    println!("Rules {year}\n{table}");
    Ok(())
}

pub fn delete(db: Option<&Path>, id: i64) -> Result<()> {
    let conn = super::open_db(db)?;
    let rule = rules::get_rule(&conn, id)?;
    rules::delete_rule(&conn, id)?;
    println!("Deleted rule {id}: '{}' \u{2192} {}", rule.value, rule.target_eur_line_id);
    Ok(())
}
