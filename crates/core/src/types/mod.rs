//! Core types for Batchwise.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod status;

pub use id::*;
pub use price::{PriceTier, PriceTierError};
pub use status::*;
