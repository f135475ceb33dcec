use colored::Colorize;
use comfy_table::{Cell, Table};

use euer::catalog;
use euer::Result;

pub fn run(year: i32) -> Result<()> {
    let catalog = catalog::load(year)?;

    let mut table = Table::new();
    table.set_header(vec!["Kz", "ID", "Label", "Kind", "Sums"]);
    for line in catalog.lines() {
        let label = if line.is_computed() {
            Cell::new(line.label.as_str().bold())
        } else {
            Cell::new(&line.label)
        };
        table.add_row(vec![
            Cell::new(line.kennziffer.as_deref().unwrap_or("")),
            Cell::new(&line.id),
            label,
            Cell::new(line.kind),
            Cell::new(line.computed_from_ids.join(", ")),
        ]);
    }
    println!("Anlage EÜR {year}\n{table}");
    Ok(())
}
