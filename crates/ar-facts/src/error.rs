//! Fact store errors

use thiserror::Error;

/// Errors raised by fact store operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FactsError {
    /// A `then` phase (or another rule) read a binding name that was never
    /// set in the current firing. This indicates a defect in the ruleset,
    /// not in the engine; the offending rule's firing is aborted.
    #[error("no binding named `{name}` in the current firing")]
    UnboundBinding { name: String },

    /// A committed write targeted an asset that is not in the snapshot.
    #[error("unknown asset `{asset_id}`")]
    UnknownAsset { asset_id: String },
}

/// Result type for fact store operations
pub type FactsResult<T> = Result<T, FactsError>;
