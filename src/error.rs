use itertools::Itertools;
use thiserror::Error;

/// Errors raised while loading, validating, analyzing or exporting qPCR tables.
///
/// The analysis itself only ever fails with [`DdctError::ControlBaselineMissing`];
/// the remaining variants belong to the loader, exporter and caller-side validation.
#[derive(Error, Debug)]
pub enum DdctError {
    #[error("control group has no valid samples for: {}", .genes.iter().join(", "))]
    ControlBaselineMissing { genes: Vec<String> },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Spreadsheet export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DdctError>;
