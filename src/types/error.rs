use thiserror::Error;

use super::SeriesKind;

/// hpitrack error types
#[derive(Error, Debug)]
pub enum HpiError {
    /// Requested years are not covered by a series
    #[error("range unavailable: {series} has no data for {missing:?} in {start}-{end}; narrow the year range")]
    RangeUnavailable {
        series: SeriesKind,
        start: i32,
        end: i32,
        missing: Vec<i32>,
    },

    /// External data source could not be reached (network, auth, timeout)
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A table cell's year has no value in a required economic series
    #[error("missing economic data: {series} has no value for {year}")]
    MissingEconomicData { series: SeriesKind, year: i32 },

    /// Rebasing a region whose first observed value is zero
    #[error("degenerate rebase: {0} has a zero first-year value")]
    DegenerateRebase(String),

    /// Caller supplied an unusable query
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Inconsistent or malformed data
    #[error("data error: {0}")]
    Data(String),

    /// Transaction store failure
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache operation failed
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for hpitrack
pub type Result<T> = std::result::Result<T, HpiError>;
