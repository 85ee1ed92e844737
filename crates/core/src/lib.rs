//! Batchwise Core - Shared types library.
//!
//! This crate provides common types used across all Batchwise components:
//! - `sales` - Sale authoring engine (line items, batch allocations)
//! - `cli` - Command-line tools for operators
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, price tiers, and sale statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
