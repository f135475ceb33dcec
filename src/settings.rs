use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EuerError, Result};

pub const DEFAULT_VAT_RATE: Decimal = dec!(19);

/// Tax options the aggregator reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxConfig {
    /// §19 UStG: amounts are taken as-is, no VAT is extracted.
    #[serde(default)]
    pub small_business_rule: bool,
    /// Percentage applied to classifications with VAT mode `default`.
    #[serde(default = "default_vat_rate")]
    pub default_vat_rate: Decimal,
}

fn default_vat_rate() -> Decimal {
    DEFAULT_VAT_RATE
}

impl TaxConfig {
    /// A negative rate would make the VAT divisor zero or negative.
    pub fn validate(&self) -> Result<()> {
        if self.default_vat_rate < Decimal::ZERO {
            return Err(EuerError::InvalidValue {
                field: "VAT rate",
                value: self.default_vat_rate.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            small_business_rule: false,
            default_vat_rate: DEFAULT_VAT_RATE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub tax: TaxConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            tax: TaxConfig::default(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("euer")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("euer")
}

/// Defaults when `path` does not exist. A file that exists but does not
/// parse, or carries an invalid tax config, is an error: falling back would
/// silently change every net total.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)
        .map_err(|e| EuerError::Settings(format!("{}: {e}", path.display())))?;
    settings.tax.validate()?;
    Ok(settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    settings.tax.validate()?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| EuerError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path())
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&settings_path(), settings)
}

pub fn default_db_path() -> Result<PathBuf> {
    Ok(PathBuf::from(load_settings()?.data_dir).join("euer.db"))
}
