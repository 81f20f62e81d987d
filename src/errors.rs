use thiserror::Error;

/// Errors surfaced by the aggregation core and its file collaborators.
///
/// Per-row data problems never show up here; the loader and calculator count
/// them instead (see `LoadReport` and `KpiResult::excluded_undated`).
#[derive(Error, Debug)]
pub enum KpiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl KpiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        KpiError::InvalidRequest(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, KpiError>;
