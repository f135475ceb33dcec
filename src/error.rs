use thiserror::Error;

/// Integrity problems in a line schedule. Always fatal at load time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate line id: {0}")]
    DuplicateId(String),

    #[error("Duplicate Kennziffer {kennziffer} in tax year {tax_year}")]
    DuplicateKennziffer { tax_year: i32, kennziffer: String },

    #[error("Computed line {line} references unknown line {child}")]
    UnknownChild { line: String, child: String },

    #[error("Computed line {line} references line {child} of another tax year")]
    CrossYearChild { line: String, child: String },

    #[error("Cycle in computed lines at {0}")]
    Cycle(String),

    #[error("No line schedule for tax year {0}")]
    UnsupportedYear(i32),
}

#[derive(Error, Debug)]
pub enum EuerError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, EuerError>;
