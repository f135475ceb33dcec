use std::path::Path;

use colored::Colorize;

use euer::catalog;
use euer::classifications;
use euer::error::{EuerError, Result};
use euer::models::{ClassificationInput, ClassificationKey, SourceType, VatMode};

pub struct ClassifyArgs<'a> {
    pub source_type: &'a str,
    pub source_id: &'a str,
    pub year: i32,
    pub line: Option<&'a str>,
    pub excluded: bool,
    pub vat: &'a str,
    pub note: Option<&'a str>,
}

pub fn run(db: Option<&Path>, args: ClassifyArgs<'_>) -> Result<()> {
    let source_type: SourceType = args.source_type.parse()?;
    let vat_mode: VatMode = args.vat.parse()?;
    if let Some(line) = args.line {
        let catalog = catalog::load(args.year)?;
        if !catalog.is_bookable(line) {
            return Err(EuerError::InvalidValue {
                field: "line",
                value: format!("{line} is not a bookable line of {}", args.year),
            });
        }
    }

    let key = ClassificationKey::new(source_type, args.source_id, args.year);
    let mut input = match (args.line, args.excluded) {
        (_, true) => ClassificationInput::excluded(&key),
        (Some(line), false) => ClassificationInput::line(&key, line, vat_mode),
        (None, false) => ClassificationInput::cleared(&key),
    };
    input.note = args.note.map(str::to_string);

    let conn = super::open_db(db)?;
    let stored = classifications::upsert(&conn, &input)?;
    let target = match (&stored.eur_line_id, stored.excluded) {
        (_, true) => "excluded".yellow().to_string(),
        (Some(line), false) => line.green().to_string(),
        (None, false) => "cleared".dimmed().to_string(),
    };
    println!("{} {} \u{2192} {target}", stored.source_type, stored.source_id);
    Ok(())
}
