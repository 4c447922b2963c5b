use super::error::CollectorError;

/// Result alias used by every probe, plugin and registry operation.
pub type CollectorResult<T> = std::result::Result<T, CollectorError>;
