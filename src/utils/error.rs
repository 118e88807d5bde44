use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Row has {found} fields but schema '{schema}' expects {expected}")]
    SchemaMismatch {
        schema: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Field '{field}' value '{value}' does not match format '{format}': {source}")]
    FieldFormatError {
        field: &'static str,
        value: String,
        format: &'static str,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Identity keys diverge at row {row}: {keys:?}")]
    KeyMismatchError { row: usize, keys: Vec<String> },

    #[error("Invalid date '{value}', expected DD/MM/YYYY: {source}")]
    InvalidDateFormat {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Invalid schema '{schema}': {reason}")]
    InvalidSchema { schema: &'static str, reason: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MergeError {
    /// 單筆資料問題：記錄後略過該列，不中斷串流
    pub fn is_row_level(&self) -> bool {
        matches!(self, MergeError::FieldFormatError { .. })
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MergeError::FieldFormatError { .. } => ErrorSeverity::Low,
            MergeError::SchemaMismatch { .. } | MergeError::KeyMismatchError { .. } => {
                ErrorSeverity::Medium
            }
            MergeError::CsvError(_)
            | MergeError::SerializationError(_)
            | MergeError::InvalidDateFormat { .. }
            | MergeError::ConfigError { .. }
            | MergeError::ConfigValidationError { .. }
            | MergeError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            MergeError::IoError(_) | MergeError::InvalidSchema { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MergeError::IoError(e) => format!("Could not read or write a file: {}", e),
            MergeError::KeyMismatchError { row, .. } => format!(
                "Source files are out of alignment at row {}; output stops there",
                row
            ),
            MergeError::InvalidDateFormat { value, .. } => {
                format!("'{}' is not a valid DD/MM/YYYY date", value)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MergeError::IoError(_) => "Check that all four source files exist and are readable",
            MergeError::CsvError(_) => "Check that the source files are comma separated UTF-8",
            MergeError::SchemaMismatch { .. } => {
                "Check the column count of each source file against its schema"
            }
            MergeError::KeyMismatchError { .. } => {
                "Make sure the four files list the same keys in the same row order"
            }
            MergeError::InvalidDateFormat { .. } => "Use a date such as 01/06/2020",
            MergeError::FieldFormatError { .. } => "Fix or remove the malformed row",
            _ => "Review the configuration and try again",
        }
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;
