use std::io;
use thiserror::Error;

/// Errors raised while splitting a payload into rows and field slices.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Truncated row at end of input: {remaining} bytes cannot complete a row")]
    TruncatedRow { remaining: usize },
}

/// Errors raised while converting field slices into a typed array.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Conversion error to {type_name}: invalid value '{value}'")]
    Invalid { type_name: String, value: String },

    #[error("Conversion to {type_name} is not supported")]
    NotImplemented { type_name: String },
}

/// Errors surfaced by a table read.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("In column #{col_index}: {source}")]
    Column {
        col_index: usize,
        source: ConvertError,
    },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Invalid fixed-width data: {0}")]
    Invalid(String),
}

impl ReadError {
    /// Wraps a converter error with the index of the column it came from.
    pub(crate) fn in_column(col_index: usize, source: ConvertError) -> Self {
        ReadError::Column { col_index, source }
    }
}
