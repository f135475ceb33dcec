use std::path::{Path, PathBuf};

use euer::error::Result;
use euer::events::SqliteEventSource;
use euer::export::export_csv;
use euer::reports::get_report;
use euer::settings::load_settings;

pub fn run(
    db: Option<&Path>,
    year: i32,
    from_date: Option<&str>,
    to_date: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let conn = super::open_db(db)?;
    let range = super::parse_range(year, from_date, to_date)?;
    let config = load_settings()?.tax;
    let report = get_report(&conn, &SqliteEventSource::new(&conn), year, range, &config)?;
    let csv = export_csv(&report)?;

    match output {
        Some(path) => {
            std::fs::write(&path, csv)?;
            eprintln!("Exported EÜR {year} to {}", path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}
