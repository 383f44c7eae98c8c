//! Error types for parsing filter values in wattboard-types.

use thiserror::Error;

/// Errors that can occur when parsing user- or backend-supplied filter values.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A date string did not match any supported format.
    #[error("Invalid date '{0}': expected YYYY-MM-DD, YYYY-MM or RFC3339")]
    InvalidDate(String),

    /// A time granularity string was not recognized.
    #[error("Unknown time granularity '{0}': expected 'daily' or 'monthly'")]
    UnknownGranularity(String),

    /// A resource kind string was not recognized.
    #[error("Unknown resource kind '{0}'")]
    UnknownResource(String),

    /// Any other invalid value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias using wattboard-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
