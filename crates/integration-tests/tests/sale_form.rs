//! Integration tests for sale forms.
//!
//! A sale is only submittable when it has lines, every line is complete, and
//! no line reports an allocation error under the sale status's batch policy.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use rust_decimal_macros::dec;

use batchwise_core::{BatchId, ProductId, SaleStatus};
use batchwise_integration_tests::{StubCatalog, batch, product};
use batchwise_sales::allocation::RowValue;
use batchwise_sales::models::{Product, SaleDraft};
use batchwise_sales::{EditorConfig, SaleForm, SubmitError};

fn form() -> SaleForm<StubCatalog> {
    let catalog = StubCatalog::new()
        .with_batches(ProductId::new(1), vec![batch(1, dec!(30)), batch(2, dec!(30))])
        .with_batches(ProductId::new(2), vec![batch(5, dec!(10))]);
    let products: Arc<[Product]> = Arc::from(vec![
        product(1, dec!(2), dec!(3)),
        product(2, dec!(6), dec!(8)),
    ]);
    SaleForm::new(Arc::new(catalog), products, EditorConfig::default())
}

fn add_line(form: &mut SaleForm<StubCatalog>, product_id: i32, quantity: i64) -> usize {
    let index = form.add_line();
    let line = form.line_mut(index).unwrap();
    line.select_product(Some(ProductId::new(product_id)));
    line.set_requested_quantity(Some(quantity.into()));
    form.sync();
    index
}

// =============================================================================
// Submit Gating Tests
// =============================================================================

#[tokio::test]
async fn test_draft_status_submits_without_batches() {
    let mut form = form();
    add_line(&mut form, 1, 5);
    add_line(&mut form, 2, 2);

    let sale = form.submit().unwrap();
    assert_eq!(sale.status, SaleStatus::Ordered);
    assert_eq!(sale.lines.len(), 2);
    assert_eq!(sale.lines[1].custom_price, Some(dec!(8)));
}

#[tokio::test]
async fn test_dispatch_requires_every_line_to_reconcile() {
    let mut form = form();
    let first = add_line(&mut form, 1, 5);
    let second = add_line(&mut form, 2, 2);
    form.set_status(SaleStatus::Dispatched);

    assert_eq!(form.submit(), Err(SubmitError::InvalidAllocation(first)));
    assert_eq!(form.invalid_lines(), vec![first, second]);

    let line = form.line_mut(first).unwrap();
    line.add_allocation_with(RowValue::filled(BatchId::new(1), dec!(3)));
    line.add_allocation_with(RowValue::filled(BatchId::new(2), dec!(2)));
    form.sync();
    assert_eq!(form.submit(), Err(SubmitError::InvalidAllocation(second)));

    form.line_mut(second)
        .unwrap()
        .add_allocation_with(RowValue::filled(BatchId::new(5), dec!(2)));
    form.sync();
    assert!(form.can_submit());

    form.set_status(SaleStatus::Cancelled);
    assert!(form.invalid_lines().is_empty());
}

#[tokio::test]
async fn test_incomplete_line_reported_by_index() {
    let mut form = form();
    add_line(&mut form, 1, 5);
    let blank = form.add_line();
    form.line_mut(blank)
        .unwrap()
        .select_product(Some(ProductId::new(2)));
    form.sync();

    assert_eq!(form.submit(), Err(SubmitError::IncompleteLine(blank)));
}

#[tokio::test]
async fn test_line_that_becomes_incomplete_blocks_submit() {
    let mut form = form();
    let index = add_line(&mut form, 1, 5);
    assert!(form.can_submit());

    form.line_mut(index).unwrap().set_requested_quantity(None);
    form.sync();
    assert_eq!(form.submit(), Err(SubmitError::IncompleteLine(index)));
}

// =============================================================================
// Line Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_line_removal_request_is_honoured() {
    let mut form = form();
    add_line(&mut form, 1, 5);
    let doomed = add_line(&mut form, 2, 1);

    form.line_mut(doomed).unwrap().request_removal();
    form.sync();

    assert_eq!(form.len(), 1);
    assert_eq!(form.submit().unwrap().lines[0].product_id, ProductId::new(1));
}

#[tokio::test]
async fn test_reset_discards_all_lines() {
    let mut form = form();
    add_line(&mut form, 1, 5);
    add_line(&mut form, 2, 1);
    form.reset();

    assert!(form.is_empty());
    assert_eq!(form.submit(), Err(SubmitError::NoLines));
}

#[tokio::test]
async fn test_edit_round_trips_submitted_sale() {
    let mut form = form();
    let index = add_line(&mut form, 1, 4);
    form.set_status(SaleStatus::Delivered);
    form.line_mut(index)
        .unwrap()
        .add_allocation_with(RowValue::filled(BatchId::new(2), dec!(4)));
    form.sync();
    let sale: SaleDraft = form.submit().unwrap();

    let catalog = StubCatalog::new().with_batches(ProductId::new(1), vec![batch(2, dec!(30))]);
    let mut reopened = SaleForm::edit(
        Arc::new(catalog),
        Arc::from(Vec::new()),
        EditorConfig::default(),
        sale.clone(),
    );
    reopened.settle().await;

    assert_eq!(reopened.status(), SaleStatus::Delivered);
    assert!(reopened.line(0).unwrap().batch_required());
    assert_eq!(reopened.submit().unwrap(), sale);
}
