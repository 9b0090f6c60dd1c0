//! Fact store for the asset rule engine
//!
//! This crate provides the [`FactStore`], which holds the current snapshot of
//! asset state, the event log for the evaluation cycle in progress, named
//! custom facts, rule-scoped bindings, and the pending-write buffer that the
//! engine commits at the end of each pass. Rules never touch the store
//! directly; they observe it through a [`FactsHandle`] scoped to one rule.

mod error;
mod handle;
mod store;

pub use error::{FactsError, FactsResult};
pub use handle::FactsHandle;
pub use store::FactStore;
