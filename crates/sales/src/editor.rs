//! Line-item authoring unit.
//!
//! A [`LineItemEditor`] owns one sale line: the product selection, requested
//! quantity, price tier and price, and the batch allocation rows. Every edit
//! re-runs reconciliation and reports upward through [`LineItemEvent`]s.
//!
//! # Driving the editor
//!
//! Edits to allocation rows travel through the rows' own channels. Call
//! [`LineItemEditor::sync`] to apply whatever is already available, or await
//! [`LineItemEditor::next_event`] to wait for the next row edit or batch
//! fetch completion. Both must run inside a Tokio runtime.
//!
//! # Batch fetches
//!
//! Selecting a product starts a fetch and cancels the previous one. Results
//! are applied only if they belong to the latest request for the product
//! still selected.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use batchwise_core::{BatchId, PriceTier, ProductId};

use crate::allocation::{
    AllocationMerger, AllocationRegistry, AllocationRow, FieldErrorKind, FieldErrors,
    Reconciliation, ReconciliationValidator, RowValue,
};
use crate::catalog::{BatchCatalog, CatalogError};
use crate::config::CatalogConfig;
use crate::models::{AllocationEntry, Batch, Product, SaleLineItemDraft};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Editor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorConfig {
    /// Upper bound for one batch fetch.
    pub fetch_timeout: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl From<&CatalogConfig> for EditorConfig {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            fetch_timeout: config.timeout,
        }
    }
}

/// What a line item tells its parent form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItemEvent {
    /// The line holds a new valid draft.
    Changed(SaleLineItemDraft),
    /// The line asks to be removed from the form.
    Remove,
    /// Whether allocation reconciliation currently fails.
    ValidationError(bool),
}

/// Non-fatal, user-visible messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// An allocation row was requested before choosing a product.
    SelectProductFirst,
    /// Batches for the product could not be loaded.
    CatalogUnavailable {
        product_id: ProductId,
        reason: String,
    },
    /// More than one row selects this batch; only the first row's quantity
    /// is kept.
    DuplicateBatch { batch_id: BatchId },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelectProductFirst => {
                write!(f, "Select a product before adding batch allocations")
            }
            Self::CatalogUnavailable { product_id, reason } => {
                write!(f, "Batches for product {product_id} are unavailable: {reason}")
            }
            Self::DuplicateBatch { batch_id } => {
                write!(f, "Batch {batch_id} is selected on more than one row")
            }
        }
    }
}

/// Loading state of the batch list shown for the selected product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchListState {
    /// No product selected.
    Idle,
    /// A fetch is outstanding.
    Loading,
    /// The list reflects the catalog.
    Loaded,
    /// The last fetch failed; the list is empty.
    Failed,
}

struct PendingFetch {
    ticket: u64,
    product_id: ProductId,
    future: BoxFuture<'static, Result<Vec<Batch>, CatalogError>>,
}

enum Wake {
    Row,
    Fetch(Result<Vec<Batch>, CatalogError>),
}

/// Authoring state of one sale line item.
pub struct LineItemEditor<C> {
    catalog: Arc<C>,
    products: Arc<[Product]>,
    config: EditorConfig,
    events: mpsc::UnboundedSender<LineItemEvent>,

    product_id: Option<ProductId>,
    requested_quantity: Option<Decimal>,
    price_tier: PriceTier,
    price: Option<Decimal>,
    price_overridden: bool,

    registry: AllocationRegistry,
    merger: AllocationMerger,
    validator: ReconciliationValidator,
    errors: FieldErrors,
    reconciliation: Reconciliation,

    batches: Vec<Batch>,
    batch_state: BatchListState,
    fetch: Option<PendingFetch>,
    fetch_ticket: u64,

    notices: Vec<Notice>,
    noticed_duplicates: Vec<BatchId>,
    last_draft: Option<SaleLineItemDraft>,
    last_error_signal: Option<bool>,
    removed: bool,
}

impl<C: BatchCatalog> LineItemEditor<C> {
    /// Create an empty line item.
    pub fn new(
        catalog: Arc<C>,
        products: Arc<[Product]>,
        config: EditorConfig,
        events: mpsc::UnboundedSender<LineItemEvent>,
    ) -> Self {
        let mut editor = Self {
            catalog,
            products,
            config,
            events,
            product_id: None,
            requested_quantity: None,
            price_tier: PriceTier::default(),
            price: None,
            price_overridden: false,
            registry: AllocationRegistry::new(),
            merger: AllocationMerger::new(),
            validator: ReconciliationValidator::default(),
            errors: FieldErrors::new(),
            reconciliation: Reconciliation::NotApplicable,
            batches: Vec::new(),
            batch_state: BatchListState::Idle,
            fetch: None,
            fetch_ticket: 0,
            notices: Vec::new(),
            noticed_duplicates: Vec::new(),
            last_draft: None,
            last_error_signal: None,
            removed: false,
        };
        editor.refresh();
        editor
    }

    /// Open an existing draft for editing.
    ///
    /// Allocations become pre-filled rows and batches are fetched for the
    /// draft's product. A price on the draft is kept as a manual override.
    pub fn edit(
        catalog: Arc<C>,
        products: Arc<[Product]>,
        config: EditorConfig,
        events: mpsc::UnboundedSender<LineItemEvent>,
        draft: SaleLineItemDraft,
        batch_required: bool,
    ) -> Self {
        let mut editor = Self::new(catalog, products, config, events);
        editor.validator.set_batch_required(batch_required);
        editor.price_tier = draft.price_tier;
        editor.requested_quantity = Some(draft.requested_quantity);
        if let Some(price) = draft.custom_price {
            editor.price = Some(price);
            editor.price_overridden = true;
        }
        for entry in draft.allocations {
            editor.registry.add_row_with(RowValue::from(entry));
        }
        editor.merger.resubscribe(&editor.registry);
        editor.merger.drain_ready();
        editor.select_product(Some(draft.product_id));
        editor
    }

    // =========================================================================
    // Line fields
    // =========================================================================

    /// Change the selected product.
    ///
    /// Starts a batch fetch for the new product, cancelling any fetch still
    /// running for the previous one. Existing allocations are kept.
    pub fn select_product(&mut self, product_id: Option<ProductId>) {
        if self.product_id == product_id {
            return;
        }
        self.product_id = product_id;
        self.start_fetch();
        if !self.price_overridden {
            self.price = self.tier_price();
        }
        self.refresh();
    }

    /// Enter (or clear) the requested quantity.
    pub fn set_requested_quantity(&mut self, quantity: Option<Decimal>) {
        self.requested_quantity = quantity;
        self.refresh();
    }

    /// Change the price tier; an un-overridden price follows the tier.
    pub fn set_price_tier(&mut self, tier: PriceTier) {
        if self.price_tier == tier {
            return;
        }
        self.price_tier = tier;
        if !self.price_overridden {
            self.price = self.tier_price();
        }
        self.refresh();
    }

    /// Enter a manual price, or clear it to fall back to the tier price.
    pub fn set_price(&mut self, price: Option<Decimal>) {
        match price {
            Some(price) => {
                self.price = Some(price);
                self.price_overridden = true;
            }
            None => {
                self.price_overridden = false;
                self.price = self.tier_price();
            }
        }
        self.refresh();
    }

    /// Apply the parent sale's batch-required policy.
    pub fn set_batch_required(&mut self, batch_required: bool) {
        if self.validator.batch_required() == batch_required {
            return;
        }
        self.validator.set_batch_required(batch_required);
        self.refresh();
    }

    // =========================================================================
    // Allocation rows
    // =========================================================================

    /// Append an empty allocation row and return its index.
    ///
    /// Without a selected product no row is added and a
    /// [`Notice::SelectProductFirst`] is queued instead.
    pub fn add_allocation(&mut self) -> Option<usize> {
        self.add_allocation_with(RowValue::default())
    }

    /// Append a pre-filled allocation row and return its index.
    pub fn add_allocation_with(&mut self, value: RowValue) -> Option<usize> {
        if self.removed {
            return None;
        }
        if self.product_id.is_none() {
            self.notices.push(Notice::SelectProductFirst);
            return None;
        }
        let index = self.registry.add_row_with(value);
        self.resubscribe();
        Some(index)
    }

    /// Remove the allocation row at `index`.
    ///
    /// Later rows move down by one. Returns `false` for an out-of-range index.
    pub fn remove_allocation(&mut self, index: usize) -> bool {
        let Some(row) = self.registry.remove_row(index) else {
            return false;
        };
        self.merger.retract(row.key());
        self.resubscribe();
        true
    }

    /// Handle to the allocation row at `index` (detached when out of range).
    #[must_use]
    pub fn allocation(&self, index: usize) -> AllocationRow {
        self.registry.row(index)
    }

    /// Number of allocation rows.
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.registry.len()
    }

    fn resubscribe(&mut self) {
        self.merger.resubscribe(&self.registry);
        self.merger.drain_ready();
        self.refresh();
    }

    // =========================================================================
    // Event processing
    // =========================================================================

    /// Apply every row edit and fetch result that is already available.
    pub fn sync(&mut self) {
        self.poll_fetch();
        self.merger.drain_ready();
        self.refresh();
    }

    /// Wait for the next row edit or fetch completion and apply it.
    ///
    /// Returns `false` when there is nothing left to wait for.
    pub async fn next_event(&mut self) -> bool {
        let has_rows = self.merger.subscription_count() > 0;
        let has_fetch = self.fetch.is_some();

        let wake = {
            let merger = &mut self.merger;
            let fetch = &mut self.fetch;
            tokio::select! {
                _ = merger.next_change(), if has_rows => Wake::Row,
                result = async move {
                    match fetch.as_mut() {
                        Some(pending) => pending.future.as_mut().await,
                        None => std::future::pending().await,
                    }
                }, if has_fetch => Wake::Fetch(result),
                else => return false,
            }
        };

        match wake {
            Wake::Row => {
                self.merger.drain_ready();
            }
            Wake::Fetch(result) => {
                if let Some(pending) = self.fetch.take() {
                    self.finish_fetch(pending.ticket, pending.product_id, result);
                }
            }
        }
        self.refresh();
        true
    }

    /// Wait until no batch fetch is outstanding, then sync.
    pub async fn settle(&mut self) {
        while self.fetch.is_some() {
            if !self.next_event().await {
                break;
            }
        }
        self.sync();
    }

    /// Fetch batches for the selected product again.
    pub fn retry_batches(&mut self) {
        self.start_fetch();
        self.refresh();
    }

    /// Ask the parent to remove this line and tear down its allocations.
    pub fn request_removal(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        self.fetch = None;
        self.merger.clear();
        self.registry.clear();
        self.emit(LineItemEvent::Remove);
    }

    fn start_fetch(&mut self) {
        self.fetch_ticket += 1;
        if let Some(stale) = self.fetch.take() {
            tracing::debug!(
                product_id = %stale.product_id,
                ticket = stale.ticket,
                "Cancelling superseded batch fetch"
            );
        }
        self.batches.clear();

        let Some(product_id) = self.product_id else {
            self.batch_state = BatchListState::Idle;
            return;
        };

        self.batch_state = BatchListState::Loading;
        let catalog = Arc::clone(&self.catalog);
        let timeout = self.config.fetch_timeout;
        let future = async move {
            tokio::time::timeout(timeout, catalog.batches_for_product(product_id))
                .await
                .unwrap_or_else(|_| Err(CatalogError::Timeout(timeout.as_secs())))
        }
        .boxed();

        self.fetch = Some(PendingFetch {
            ticket: self.fetch_ticket,
            product_id,
            future,
        });
    }

    fn poll_fetch(&mut self) {
        let Some(pending) = self.fetch.as_mut() else {
            return;
        };
        let Some(result) = pending.future.as_mut().now_or_never() else {
            return;
        };
        let (ticket, product_id) = (pending.ticket, pending.product_id);
        self.fetch = None;
        self.finish_fetch(ticket, product_id, result);
    }

    fn finish_fetch(
        &mut self,
        ticket: u64,
        product_id: ProductId,
        result: Result<Vec<Batch>, CatalogError>,
    ) {
        if ticket != self.fetch_ticket || self.product_id != Some(product_id) {
            tracing::debug!(%product_id, ticket, "Discarding stale batch fetch");
            return;
        }

        match result {
            Ok(batches) => {
                tracing::debug!(%product_id, count = batches.len(), "Batches loaded");
                self.batches = batches;
                self.batch_state = BatchListState::Loaded;
            }
            Err(e) => {
                tracing::warn!(%product_id, error = %e, "Batch fetch failed");
                self.batches.clear();
                self.batch_state = BatchListState::Failed;
                self.notices.push(Notice::CatalogUnavailable {
                    product_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    // =========================================================================
    // Validation and emission
    // =========================================================================

    fn refresh(&mut self) {
        if self.removed {
            return;
        }

        let field_errors: &[FieldErrorKind] = match self.requested_quantity {
            None => &[FieldErrorKind::Required],
            Some(quantity) if quantity < Decimal::ONE => &[FieldErrorKind::Min],
            Some(_) => &[],
        };
        self.errors.merge(&FieldErrorKind::FIELD, field_errors);

        let allocations = self.merger.entries();
        let duplicates = self.merger.duplicate_batches();
        self.reconciliation = self.validator.validate(
            self.requested_quantity,
            &allocations,
            !duplicates.is_empty(),
            &mut self.errors,
        );
        self.notice_duplicates(duplicates);

        let has_error = self.errors.has_allocation_error();
        if self.last_error_signal != Some(has_error) {
            self.last_error_signal = Some(has_error);
            self.emit(LineItemEvent::ValidationError(has_error));
        }

        if let Some(draft) = self.draft()
            && self.last_draft.as_ref() != Some(&draft)
        {
            self.last_draft = Some(draft.clone());
            self.emit(LineItemEvent::Changed(draft));
        }
    }

    /// Queue a notice for each batch that newly became a duplicate.
    fn notice_duplicates(&mut self, duplicates: Vec<BatchId>) {
        for batch_id in &duplicates {
            if !self.noticed_duplicates.contains(batch_id) {
                tracing::debug!(%batch_id, "Batch selected on more than one row");
                self.notices.push(Notice::DuplicateBatch {
                    batch_id: *batch_id,
                });
            }
        }
        self.noticed_duplicates = duplicates;
    }

    fn emit(&self, event: LineItemEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Line item listener dropped; event discarded");
        }
    }

    fn tier_price(&self) -> Option<Decimal> {
        self.selected_product()
            .map(|product| product.price_for(self.price_tier))
    }
}

impl<C> LineItemEditor<C> {
    /// The draft this line currently represents.
    ///
    /// `None` until a product is selected and at least one unit requested.
    #[must_use]
    pub fn draft(&self) -> Option<SaleLineItemDraft> {
        let product_id = self.product_id?;
        let requested_quantity = self.requested_quantity.filter(|q| *q >= Decimal::ONE)?;
        Some(SaleLineItemDraft {
            product_id,
            requested_quantity,
            custom_price: self.price,
            price_tier: self.price_tier,
            allocations: self.merger.entries(),
        })
    }

    /// Whether the line is complete and reconciles.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.draft().is_some() && !self.errors.has_allocation_error()
    }

    /// Selected product ID.
    #[must_use]
    pub const fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    /// Selected product, if it is in the offered product list.
    #[must_use]
    pub fn selected_product(&self) -> Option<&Product> {
        let product_id = self.product_id?;
        self.products.iter().find(|p| p.id == product_id)
    }

    /// Products offered for selection.
    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Requested quantity field.
    #[must_use]
    pub const fn requested_quantity(&self) -> Option<Decimal> {
        self.requested_quantity
    }

    /// Price field.
    #[must_use]
    pub const fn price(&self) -> Option<Decimal> {
        self.price
    }

    /// Whether the price was entered manually.
    #[must_use]
    pub const fn price_overridden(&self) -> bool {
        self.price_overridden
    }

    /// Selected price tier.
    #[must_use]
    pub const fn price_tier(&self) -> PriceTier {
        self.price_tier
    }

    /// Whether batch detail is required for this line.
    #[must_use]
    pub const fn batch_required(&self) -> bool {
        self.validator.batch_required()
    }

    /// Errors on the requested-quantity field.
    #[must_use]
    pub const fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Latest reconciliation outcome.
    #[must_use]
    pub const fn reconciliation(&self) -> Reconciliation {
        self.reconciliation
    }

    /// Canonical allocation list.
    #[must_use]
    pub fn allocations(&self) -> Vec<AllocationEntry> {
        self.merger.entries()
    }

    /// Batches available for the selected product.
    #[must_use]
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Loading state of [`Self::batches`].
    #[must_use]
    pub const fn batch_state(&self) -> BatchListState {
        self.batch_state
    }

    /// Allocated batches missing from the loaded batch list.
    ///
    /// Empty unless the list is loaded; stale catalog data must not block
    /// editing.
    #[must_use]
    pub fn unlisted_allocations(&self) -> Vec<BatchId> {
        if self.batch_state != BatchListState::Loaded {
            return Vec::new();
        }
        self.merger
            .entries()
            .into_iter()
            .map(|entry| entry.batch_id)
            .filter(|batch_id| !self.batches.iter().any(|b| b.id == *batch_id))
            .collect()
    }

    /// Allocations that take more than their batch has remaining.
    #[must_use]
    pub fn over_remaining(&self) -> Vec<AllocationEntry> {
        self.merger
            .entries()
            .into_iter()
            .filter(|entry| {
                self.batches
                    .iter()
                    .any(|b| b.id == entry.batch_id && entry.quantity > b.remaining_quantity)
            })
            .collect()
    }

    /// Batches selected on more than one row.
    ///
    /// Reported whatever the batch policy; only the first row's quantity
    /// reaches the draft.
    #[must_use]
    pub fn duplicate_batches(&self) -> Vec<BatchId> {
        self.merger.duplicate_batches()
    }

    /// Drain queued user-visible notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Whether removal has been requested.
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.removed
    }
}

impl<C> std::fmt::Debug for LineItemEditor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineItemEditor")
            .field("product_id", &self.product_id)
            .field("requested_quantity", &self.requested_quantity)
            .field("price_tier", &self.price_tier)
            .field("price", &self.price)
            .field("rows", &self.registry.len())
            .field("batch_state", &self.batch_state)
            .field("reconciliation", &self.reconciliation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal_macros::dec;

    use super::*;

    struct FixedCatalog(HashMap<ProductId, Vec<Batch>>);

    impl BatchCatalog for FixedCatalog {
        async fn batches_for_product(
            &self,
            product_id: ProductId,
        ) -> Result<Vec<Batch>, CatalogError> {
            self.0
                .get(&product_id)
                .cloned()
                .ok_or_else(|| CatalogError::NotFound(product_id.to_string()))
        }
    }

    fn batch(id: i32, remaining: Decimal) -> Batch {
        Batch {
            id: BatchId::new(id),
            batch_number: format!("B-{id:03}"),
            remaining_quantity: remaining,
            expiry_date: None,
        }
    }

    fn products() -> Arc<[Product]> {
        Arc::from(vec![Product {
            id: ProductId::new(1),
            name: "Oat Crackers".to_string(),
            wholesale_price: dec!(1.80),
            retail_price: dec!(2.50),
        }])
    }

    fn editor() -> (
        LineItemEditor<FixedCatalog>,
        mpsc::UnboundedReceiver<LineItemEvent>,
    ) {
        let catalog = FixedCatalog(HashMap::from([(
            ProductId::new(1),
            vec![batch(1, dec!(20)), batch(2, dec!(3))],
        )]));
        let (tx, rx) = mpsc::unbounded_channel();
        let editor = LineItemEditor::new(Arc::new(catalog), products(), EditorConfig::default(), tx);
        (editor, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<LineItemEvent>) -> Vec<LineItemEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_initial_state_reports_no_allocation_error() {
        let (editor, mut rx) = editor();
        assert_eq!(drain(&mut rx), vec![LineItemEvent::ValidationError(false)]);
        assert!(editor.errors().contains(FieldErrorKind::Required));
        assert!(editor.draft().is_none());
    }

    #[tokio::test]
    async fn test_add_allocation_without_product_queues_notice() {
        let (mut editor, _rx) = editor();
        assert_eq!(editor.add_allocation(), None);
        assert_eq!(editor.take_notices(), vec![Notice::SelectProductFirst]);
        assert_eq!(editor.allocation_count(), 0);
    }

    #[tokio::test]
    async fn test_product_selection_fills_tier_price_and_loads_batches() {
        let (mut editor, _rx) = editor();
        editor.select_product(Some(ProductId::new(1)));
        assert_eq!(editor.price(), Some(dec!(2.50)));
        assert_eq!(editor.batch_state(), BatchListState::Loading);

        editor.sync();
        assert_eq!(editor.batch_state(), BatchListState::Loaded);
        assert_eq!(editor.batches().len(), 2);

        editor.set_price_tier(PriceTier::Wholesale);
        assert_eq!(editor.price(), Some(dec!(1.80)));
    }

    #[tokio::test]
    async fn test_manual_price_survives_tier_change() {
        let (mut editor, _rx) = editor();
        editor.select_product(Some(ProductId::new(1)));
        editor.set_price(Some(dec!(2.10)));
        editor.set_price_tier(PriceTier::Wholesale);
        assert_eq!(editor.price(), Some(dec!(2.10)));

        editor.set_price(None);
        assert_eq!(editor.price(), Some(dec!(1.80)));
        assert!(!editor.price_overridden());
    }

    #[tokio::test]
    async fn test_emits_draft_only_when_line_is_complete() {
        let (mut editor, mut rx) = editor();
        drain(&mut rx);
        editor.select_product(Some(ProductId::new(1)));
        assert!(drain(&mut rx).is_empty());

        editor.set_requested_quantity(Some(dec!(0.5)));
        assert!(editor.errors().contains(FieldErrorKind::Min));
        assert!(drain(&mut rx).is_empty());

        editor.set_requested_quantity(Some(dec!(4)));
        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [LineItemEvent::Changed(d)] if d.requested_quantity == dec!(4)
        ));
    }

    #[tokio::test]
    async fn test_allocation_errors_do_not_suppress_emission() {
        let (mut editor, mut rx) = editor();
        editor.set_batch_required(true);
        editor.select_product(Some(ProductId::new(1)));
        editor.set_requested_quantity(Some(dec!(5)));

        let events = drain(&mut rx);
        assert!(events.contains(&LineItemEvent::ValidationError(true)));
        assert!(events.iter().any(|e| matches!(
            e,
            LineItemEvent::Changed(d) if d.allocations.is_empty()
        )));

        let index = editor.add_allocation().unwrap();
        let row = editor.allocation(index);
        row.set_batch(Some(BatchId::new(1)));
        row.set_quantity(Some(dec!(2)));
        editor.sync();

        let events = drain(&mut rx);
        assert!(!events.contains(&LineItemEvent::ValidationError(false)));
        assert!(events.iter().any(|e| matches!(
            e,
            LineItemEvent::Changed(d) if d.allocations == vec![AllocationEntry::new(BatchId::new(1), dec!(2))]
        )));
        assert!(editor.errors().contains(FieldErrorKind::BatchAllocationMismatch));
        assert!(!editor.is_valid());
    }

    #[tokio::test]
    async fn test_over_remaining_and_unlisted_are_soft() {
        let (mut editor, _rx) = editor();
        editor.select_product(Some(ProductId::new(1)));
        editor.set_requested_quantity(Some(dec!(9)));
        editor.sync();
        editor.add_allocation_with(RowValue::filled(BatchId::new(2), dec!(4)));
        editor.add_allocation_with(RowValue::filled(BatchId::new(77), dec!(5)));

        assert_eq!(editor.unlisted_allocations(), vec![BatchId::new(77)]);
        assert_eq!(
            editor.over_remaining(),
            vec![AllocationEntry::new(BatchId::new(2), dec!(4))]
        );
        assert!(editor.is_valid());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_allocations() {
        let (mut editor, _rx) = editor();
        editor.select_product(Some(ProductId::new(1)));
        editor.sync();
        editor.add_allocation_with(RowValue::filled(BatchId::new(1), dec!(3)));

        editor.select_product(Some(ProductId::new(404)));
        editor.sync();
        assert_eq!(editor.batch_state(), BatchListState::Failed);
        assert!(editor.batches().is_empty());
        assert_eq!(editor.allocations().len(), 1);
        assert!(matches!(
            editor.take_notices().as_slice(),
            [Notice::CatalogUnavailable { product_id, .. }] if *product_id == ProductId::new(404)
        ));
        assert!(editor.unlisted_allocations().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_batch_is_noticed_without_batch_policy() {
        let (mut editor, mut rx) = editor();
        editor.select_product(Some(ProductId::new(1)));
        editor.set_requested_quantity(Some(dec!(7)));
        editor.add_allocation_with(RowValue::filled(BatchId::new(1), dec!(3)));
        editor.add_allocation_with(RowValue::filled(BatchId::new(1), dec!(4)));

        assert!(!drain(&mut rx).contains(&LineItemEvent::ValidationError(true)));
        assert!(!editor.errors().contains(FieldErrorKind::DuplicateBatch));
        assert_eq!(
            editor.allocations(),
            vec![AllocationEntry::new(BatchId::new(1), dec!(3))]
        );
        assert_eq!(editor.duplicate_batches(), vec![BatchId::new(1)]);
        assert_eq!(
            editor.take_notices(),
            vec![Notice::DuplicateBatch {
                batch_id: BatchId::new(1)
            }]
        );

        // Still a duplicate after an unrelated edit: no second notice.
        editor.set_requested_quantity(Some(dec!(8)));
        assert!(editor.take_notices().is_empty());

        editor.allocation(1).set_batch(Some(BatchId::new(2)));
        editor.sync();
        assert!(editor.duplicate_batches().is_empty());
        assert_eq!(editor.allocations().len(), 2);
    }

    #[tokio::test]
    async fn test_request_removal_emits_remove_and_tears_down() {
        let (mut editor, mut rx) = editor();
        editor.select_product(Some(ProductId::new(1)));
        editor.add_allocation_with(RowValue::filled(BatchId::new(1), dec!(3)));
        let row = editor.allocation(0);
        drain(&mut rx);

        editor.request_removal();
        row.set_quantity(Some(dec!(8)));
        editor.sync();

        assert_eq!(drain(&mut rx), vec![LineItemEvent::Remove]);
        assert_eq!(editor.allocation_count(), 0);
        assert!(editor.allocations().is_empty());
        assert_eq!(editor.add_allocation(), None);
    }

    #[tokio::test]
    async fn test_next_event_returns_false_when_idle() {
        let (mut editor, _rx) = editor();
        assert!(!editor.next_event().await);
    }
}
