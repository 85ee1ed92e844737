//! Batch catalog port and its REST adapter.
//!
//! The sale engine never owns inventory data. It asks a [`BatchCatalog`] for
//! the batches of the currently selected product and treats the answer as a
//! read-only projection.
//!
//! # Architecture
//!
//! - [`BatchCatalog`] is the seam the line-item editor depends on
//! - [`HttpBatchCatalog`] implements it against the inventory REST API
//! - Tests substitute scripted catalogs

pub mod client;

pub use client::HttpBatchCatalog;

use std::future::Future;

use thiserror::Error;

use batchwise_core::ProductId;

use crate::models::Batch;

/// Errors that can occur when querying the batch catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the inventory service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unauthorized (missing or invalid API token).
    #[error("Unauthorized: invalid API token")]
    Unauthorized,

    /// The request did not complete within the configured timeout.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// The catalog could not serve the request for another reason.
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Source of production batches for a product.
///
/// Implementations must be cheap to share: the editor holds them behind an
/// `Arc` and issues at most one outstanding request per line item.
pub trait BatchCatalog: Send + Sync + 'static {
    /// Fetch the current batches of `product_id`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on transport or server failure.
    fn batches_for_product(
        &self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Vec<Batch>, CatalogError>> + Send;
}
