use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinancialReportError {
    #[error("Ledger is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Ledger holds rows for more than one user: {}", .0.join(", "))]
    MultipleUsers(Vec<String>),

    #[error("Invalid analysis configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid month key '{0}': expected YYYY-MM")]
    InvalidMonth(String),

    #[error("Narrative generation failed during {stage}: {details}")]
    Narrative { stage: String, details: String },

    #[error("Worker thread for user(s) {0} panicked")]
    Worker(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FinancialReportError>;
