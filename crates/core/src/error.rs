//! Error types for canopy gap delineation
//!
//! Every variant belongs to one of the failure kinds reported to callers
//! (see [`ErrorKind`]). All of them abort the run; nothing is retried.

use thiserror::Error;

/// Failure category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed, dimensionally inconsistent or missing-band input
    Input,
    /// Invalid configuration value
    Config,
    /// Spatial operation across incompatible or absent reference systems
    CrsMismatch,
    /// Too few samples for the requested clustering, or nothing to classify
    InsufficientData,
    /// Filesystem failure in an I/O helper
    Io,
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Missing band {band}: raster has {available} band(s)")]
    MissingBand { band: usize, available: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("CRS is not set on {0}")]
    MissingCrs(&'static str),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

impl Error {
    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Input(_)
            | Error::InvalidDimensions { .. }
            | Error::IndexOutOfBounds { .. }
            | Error::SizeMismatch { .. }
            | Error::MissingBand { .. }
            | Error::UnsupportedDataType(_) => ErrorKind::Input,
            Error::Config(_) | Error::InvalidParameter { .. } => ErrorKind::Config,
            Error::CrsMismatch(..) | Error::MissingCrs(_) => ErrorKind::CrsMismatch,
            Error::InsufficientData(_) => ErrorKind::InsufficientData,
        }
    }
}

/// Result type alias for canopy gap operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::Input("x".into()).kind(), ErrorKind::Input);
        assert_eq!(
            Error::MissingBand { band: 4, available: 3 }.kind(),
            ErrorKind::Input
        );
        assert_eq!(
            Error::InvalidParameter {
                name: "size",
                value: "4".into(),
                reason: "must be odd".into(),
            }
            .kind(),
            ErrorKind::Config
        );
        assert_eq!(Error::MissingCrs("boundary").kind(), ErrorKind::CrsMismatch);
        assert_eq!(
            Error::InsufficientData("empty".into()).kind(),
            ErrorKind::InsufficientData
        );
    }

    #[test]
    fn test_display() {
        let e = Error::MissingCrs("boundary");
        assert_eq!(e.to_string(), "CRS is not set on boundary");
    }
}
