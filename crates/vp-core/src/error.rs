use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Referenced file does not exist.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },

    /// Record table header lacks a required column.
    #[error("Missing column '{column}' in record header")]
    MissingColumn {
        /// Name of the absent column.
        column: String,
    },

    /// A record row could not be parsed.
    #[error("Invalid record at line {line}: {reason}")]
    InvalidRecord {
        /// 1-based line number in the source table.
        line: usize,
        /// What was wrong with the row.
        reason: String,
    },

    /// A feature row does not match the matrix width.
    #[error("Ragged feature row: expected {expected} columns, got {got}")]
    RaggedRow {
        /// Width established by the first row.
        expected: usize,
        /// Width of the offending row.
        got: usize,
    },
}
