//! Batch lookup command.
//!
//! # Usage
//!
//! ```bash
//! bw-cli batches 42
//! ```
//!
//! # Environment Variables
//!
//! - `CATALOG_BASE_URL` - Base URL of the inventory REST API
//! - `CATALOG_API_TOKEN` - Optional bearer token

use batchwise_core::ProductId;
use batchwise_sales::models::Batch;
use batchwise_sales::{HttpBatchCatalog, SalesConfig, SalesError};
use chrono::NaiveDate;
use tracing::{info, warn};

/// List the batches of one product.
///
/// Batches past their expiry date are logged as warnings.
///
/// # Errors
///
/// Returns an error if the catalog client cannot be built or the request
/// fails.
pub async fn list(config: &SalesConfig, product_id: ProductId) -> Result<(), SalesError> {
    let catalog = HttpBatchCatalog::new(config.catalog())?;
    let batches = catalog.batches(product_id).await?;
    let today = chrono::Utc::now().date_naive();

    info!(%product_id, count = batches.len(), "Batches loaded");
    for batch in &batches {
        let line = describe(batch);
        if batch.is_expired_on(today) {
            warn!("  {line} [expired]");
        } else {
            info!("  {line}");
        }
    }

    let expired = expired_count(&batches, today);
    if expired > 0 {
        warn!(%product_id, expired, "Some batches are past their expiry date");
    }
    Ok(())
}

fn describe(batch: &Batch) -> String {
    let line = format!(
        "{} (#{}) remaining {}",
        batch.batch_number, batch.id, batch.remaining_quantity
    );
    match batch.expiry_date {
        Some(expiry) => format!("{line} expires {expiry}"),
        None => line,
    }
}

fn expired_count(batches: &[Batch], today: NaiveDate) -> usize {
    batches.iter().filter(|b| b.is_expired_on(today)).count()
}
