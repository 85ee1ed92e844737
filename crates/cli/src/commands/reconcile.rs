//! Sale reconciliation command.
//!
//! Loads a draft sale from YAML, replays every line through a line-item
//! editor backed by the live batch catalog, and reports per line whether the
//! batch allocations reconcile with the requested quantity.
//!
//! # Usage
//!
//! ```bash
//! bw-cli reconcile sale.yaml
//! ```
//!
//! # File format
//!
//! ```yaml
//! status: dispatched
//! lines:
//!   - productId: 42
//!     requestedQuantity: "10"
//!     allocations:
//!       - batchId: 7
//!         quantity: "6"
//!       - batchId: 9
//!         quantity: "4"
//! ```

use std::path::Path;
use std::sync::Arc;

use batchwise_core::{BatchId, ProductId};
use batchwise_sales::allocation::{FieldErrorKind, Reconciliation};
use batchwise_sales::models::{AllocationEntry, Product, SaleDraft};
use batchwise_sales::{
    BatchCatalog, EditorConfig, HttpBatchCatalog, Notice, SaleForm, SalesConfig, SalesError,
    SubmitError,
};
use tracing::{info, warn};

/// Outcome of replaying one sale line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineReport {
    pub index: usize,
    pub product_id: Option<ProductId>,
    pub reconciliation: Reconciliation,
    pub errors: Vec<FieldErrorKind>,
    pub unlisted: Vec<BatchId>,
    pub over_remaining: Vec<AllocationEntry>,
    pub notices: Vec<Notice>,
}

/// Reconcile the sale stored in `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the catalog is
/// unreachable, or the sale could not be submitted.
pub async fn run(config: &SalesConfig, file_path: &str) -> Result<(), SalesError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SalesError::InvalidInput(format!("File not found: {file_path}")));
    }

    info!(path = %file_path, "Loading sale draft");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SalesError::InvalidInput(format!("{file_path}: {e}")))?;
    let sale = parse_sale(&content)?;
    info!(status = %sale.status, lines = sale.lines.len(), "Parsed sale draft");

    let catalog = HttpBatchCatalog::new(config.catalog())?;
    let products: Arc<[Product]> = catalog.products().await?.into();
    let editor_config = EditorConfig::from(config.catalog());

    let (reports, outcome) = reconcile_sale(Arc::new(catalog), products, editor_config, sale).await;
    for report in &reports {
        log_report(report);
    }

    let sale = outcome?;
    info!(lines = sale.lines.len(), "Sale can be submitted");
    Ok(())
}

/// Parse a YAML sale draft.
///
/// # Errors
///
/// Returns [`SalesError::InvalidInput`] when the YAML does not describe a sale.
pub fn parse_sale(content: &str) -> Result<SaleDraft, SalesError> {
    serde_yaml::from_str(content).map_err(|e| SalesError::InvalidInput(e.to_string()))
}

/// Replay `sale` through a sale form and collect per-line reports.
pub async fn reconcile_sale<C: BatchCatalog>(
    catalog: Arc<C>,
    products: Arc<[Product]>,
    config: EditorConfig,
    sale: SaleDraft,
) -> (Vec<LineReport>, Result<SaleDraft, SubmitError>) {
    let mut form = SaleForm::edit(catalog, products, config, sale);
    form.settle().await;

    let mut reports = Vec::with_capacity(form.len());
    for index in 0..form.len() {
        let Some(line) = form.line_mut(index) else {
            continue;
        };
        reports.push(LineReport {
            index,
            product_id: line.product_id(),
            reconciliation: line.reconciliation(),
            errors: line.errors().iter().collect(),
            unlisted: line.unlisted_allocations(),
            over_remaining: line.over_remaining(),
            notices: line.take_notices(),
        });
    }

    (reports, form.submit())
}

fn log_report(report: &LineReport) {
    let product = report
        .product_id
        .map_or_else(|| "-".to_owned(), |id| id.to_string());

    match report.reconciliation {
        Reconciliation::NotApplicable => {
            info!(line = report.index, %product, "Batch detail not required");
        }
        Reconciliation::Exact { requested } => {
            info!(line = report.index, %product, %requested, "Allocations reconcile");
        }
        Reconciliation::UnderAllocated {
            requested,
            allocated,
        } => {
            warn!(line = report.index, %product, %requested, %allocated, "Under-allocated");
        }
        Reconciliation::OverAllocated {
            requested,
            allocated,
        } => {
            warn!(line = report.index, %product, %requested, %allocated, "Over-allocated");
        }
    }

    for error in &report.errors {
        warn!(line = report.index, %product, "{error}");
    }
    for batch_id in &report.unlisted {
        warn!(line = report.index, %batch_id, "Allocated batch is not in the catalog");
    }
    for entry in &report.over_remaining {
        warn!(
            line = report.index,
            batch_id = %entry.batch_id,
            quantity = %entry.quantity,
            "Allocation exceeds remaining batch quantity"
        );
    }
    for notice in &report.notices {
        warn!(line = report.index, "{notice}");
    }
}
