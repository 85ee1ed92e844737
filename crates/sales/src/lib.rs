//! Batchwise sale authoring engine.
//!
//! Builds sale line items whose requested quantity is fulfilled from
//! specific inventory batches, and keeps the batch allocations reconciled
//! with the requested quantity as the user edits.
//!
//! # Architecture
//!
//! - [`form::SaleForm`] owns the line items of one sale and applies the
//!   sale status's batch policy
//! - [`editor::LineItemEditor`] owns one line item and its allocation rows
//! - [`allocation`] holds the row registry, the stream merger and the
//!   reconciliation validator
//! - [`catalog`] fetches the batches of a product

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod allocation;
pub mod catalog;
pub mod config;
pub mod editor;
pub mod error;
pub mod form;
pub mod models;

pub use catalog::{BatchCatalog, CatalogError, HttpBatchCatalog};
pub use config::{CatalogConfig, ConfigError, SalesConfig};
pub use editor::{BatchListState, EditorConfig, LineItemEditor, LineItemEvent, Notice};
pub use error::{Result, SalesError};
pub use form::{SaleForm, SubmitError};
