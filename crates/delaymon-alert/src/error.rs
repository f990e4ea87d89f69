use delaymon_common::timespan::TimeSpanError;

/// Configuration errors raised while building a delay rule.
///
/// These are the only errors that prevent an engine from being constructed;
/// everything else degrades to "no alert this round".
///
/// # Examples
///
/// ```
/// use delaymon_alert::error::AlertError;
///
/// let err = AlertError::InvalidMargin(120);
/// assert!(err.to_string().contains("120"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// Margin must be a percentage in `[0, 100)`.
    #[error("Alert: invalid margin {0}%, expected 0..100")]
    InvalidMargin(i64),

    /// A duration-valued setting is not a valid TimeSpan literal.
    #[error("Alert: invalid duration for {field}: {source}")]
    InvalidDuration {
        field: &'static str,
        #[source]
        source: TimeSpanError,
    },
}

/// Errors reported by age sources and entity catalogs.
///
/// The engine never propagates these: the affected entity is skipped for
/// the current round.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source: query timed out")]
    Timeout,

    #[error("Source: unavailable: {0}")]
    Unavailable(String),

    #[error("Source: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
