//! Batch allocation for a single sale line item.
//!
//! # Components
//!
//! - [`registry`] - ordered rows the user edits (batch + quantity per row)
//! - [`merger`] - folds every row's value stream into one canonical list
//! - [`validator`] - compares the canonical total with the requested quantity

pub mod merger;
pub mod registry;
pub mod validator;

pub use merger::AllocationMerger;
pub use registry::{AllocationRegistry, AllocationRow, RowKey, RowStream, RowValue};
pub use validator::{
    FieldErrorKind, FieldErrors, Reconciliation, ReconciliationValidator, reconcile,
};
