//! Outbound write sink

use thiserror::Error;

use ar_core::AttributeEvent;

/// Error returned by the external asset service for a rejected write
#[derive(Debug, Error)]
#[error("asset service rejected write: {message}")]
pub struct WriteError {
    pub message: String,
}

impl WriteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Persistence sink for committed mutations
///
/// The engine calls `write` once per committed mutation, in commit order.
/// The external asset service translates these into its own storage and
/// transport. A failed write is fatal to the cycle.
pub trait AssetWriter {
    fn write(&mut self, event: &AttributeEvent) -> Result<(), WriteError>;
}

/// Closures work as writers, mirroring a plain dispatch callback
impl<F> AssetWriter for F
where
    F: FnMut(&AttributeEvent) -> Result<(), WriteError>,
{
    fn write(&mut self, event: &AttributeEvent) -> Result<(), WriteError> {
        self(event)
    }
}
