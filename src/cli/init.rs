use std::path::{Path, PathBuf};

use colored::Colorize;
use rust_decimal::Decimal;

use euer::settings::{load_settings, save_settings, settings_path};
use euer::Result;

/// Write the settings file (keeping values not overridden) and create the
/// database schema.
pub fn run(
    db: Option<&Path>,
    data_dir: Option<PathBuf>,
    small_business: Option<bool>,
    vat_rate: Option<Decimal>,
) -> Result<()> {
    let mut settings = load_settings()?;
    if let Some(dir) = data_dir {
        settings.data_dir = dir.to_string_lossy().to_string();
    }
    if let Some(flag) = small_business {
        settings.tax.small_business_rule = flag;
    }
    if let Some(rate) = vat_rate {
        settings.tax.default_vat_rate = rate;
    }
    save_settings(&settings)?;

    let db_path = db
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&settings.data_dir).join("euer.db"));
    super::open_db(Some(&db_path))?;

    println!("{} {}", "Initialized".green().bold(), db_path.display());
    println!("Settings:   {}", settings_path().display());
    if settings.tax.small_business_rule {
        println!("Small-business rule (§19 UStG): on");
    } else {
        println!("Default VAT rate: {}%", settings.tax.default_vat_rate);
    }
    Ok(())
}
