//! Integration tests for Batchwise.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p batchwise-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `line_item_editor` - Editor scenarios against scripted catalogs
//! - `sale_form` - Multi-line sales and submit gating
//! - `allocation_properties` - Property tests for rows and reconciliation
//!
//! This crate's library holds the catalogs the tests share.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use tokio::sync::oneshot;

use batchwise_core::{BatchId, PriceTier, ProductId};
use batchwise_sales::models::{Batch, Product};
use batchwise_sales::{BatchCatalog, CatalogError};

/// Build a batch with a generated batch number.
#[must_use]
pub fn batch(id: i32, remaining: Decimal) -> Batch {
    Batch {
        id: BatchId::new(id),
        batch_number: format!("LOT-{id:04}"),
        remaining_quantity: remaining,
        expiry_date: None,
    }
}

/// Build a product with the given prices.
#[must_use]
pub fn product(id: i32, wholesale: Decimal, retail: Decimal) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        wholesale_price: wholesale,
        retail_price: retail,
    }
}

/// Price a product would default to for `tier`.
#[must_use]
pub fn tier_price(products: &[Product], product_id: ProductId, tier: PriceTier) -> Option<Decimal> {
    products
        .iter()
        .find(|p| p.id == product_id)
        .map(|p| p.price_for(tier))
}

// =============================================================================
// Scripted catalog
// =============================================================================

/// Catalog answering immediately from a fixed table.
#[derive(Debug, Default)]
pub struct StubCatalog {
    batches: HashMap<ProductId, Vec<Batch>>,
    failing: HashSet<ProductId>,
    calls: Mutex<Vec<ProductId>>,
}

impl StubCatalog {
    /// Create a catalog with no products.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `product_id` with `batches`.
    #[must_use]
    pub fn with_batches(mut self, product_id: ProductId, batches: Vec<Batch>) -> Self {
        self.batches.insert(product_id, batches);
        self
    }

    /// Fail every fetch for `product_id`.
    #[must_use]
    pub fn failing(mut self, product_id: ProductId) -> Self {
        self.failing.insert(product_id);
        self
    }

    /// Products fetched so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProductId> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl BatchCatalog for StubCatalog {
    async fn batches_for_product(&self, product_id: ProductId) -> Result<Vec<Batch>, CatalogError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(product_id);
        }
        if self.failing.contains(&product_id) {
            return Err(CatalogError::Unavailable("scripted failure".to_owned()));
        }
        Ok(self.batches.get(&product_id).cloned().unwrap_or_default())
    }
}

// =============================================================================
// Gated catalog
// =============================================================================

type Reply = Result<Vec<Batch>, CatalogError>;

/// Catalog whose fetches wait until the test releases them.
///
/// Each fetch for a product takes that product's pending gate. A fetch with
/// no gate fails with [`CatalogError::NotFound`].
#[derive(Debug, Default)]
pub struct GatedCatalog {
    gates: Mutex<HashMap<ProductId, oneshot::Receiver<Reply>>>,
}

impl GatedCatalog {
    /// Create a catalog with no gates.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Install a gate for the next fetch of `product_id`.
    ///
    /// The returned sender releases it. Sending fails if the fetch was
    /// cancelled in the meantime.
    #[must_use]
    pub fn gate(&self, product_id: ProductId) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut gates) = self.gates.lock() {
            gates.insert(product_id, rx);
        }
        tx
    }
}

impl BatchCatalog for GatedCatalog {
    async fn batches_for_product(&self, product_id: ProductId) -> Result<Vec<Batch>, CatalogError> {
        let gate = self
            .gates
            .lock()
            .ok()
            .and_then(|mut gates| gates.remove(&product_id));
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(CatalogError::Unavailable("gate dropped".to_owned()))),
            None => Err(CatalogError::NotFound(product_id.to_string())),
        }
    }
}
