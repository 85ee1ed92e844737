//! Parent sale form.
//!
//! Owns the line-item editors of one sale, pushes the sale status's batch
//! policy down to each of them, and collects their events into submittable
//! drafts.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use batchwise_core::{SaleId, SaleStatus};

use crate::catalog::BatchCatalog;
use crate::editor::{EditorConfig, LineItemEditor, LineItemEvent};
use crate::models::{Product, SaleDraft, SaleLineItemDraft};

/// Why a sale cannot be submitted. Line indices are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The sale has no line items.
    #[error("Sale has no line items")]
    NoLines,

    /// A line lacks a product or a valid requested quantity.
    #[error("Line {0} is incomplete")]
    IncompleteLine(usize),

    /// A line's batch allocations do not reconcile.
    #[error("Line {0} has invalid batch allocations")]
    InvalidAllocation(usize),
}

struct LineSlot<C> {
    editor: LineItemEditor<C>,
    events: mpsc::UnboundedReceiver<LineItemEvent>,
    draft: Option<SaleLineItemDraft>,
    has_allocation_error: bool,
    remove_requested: bool,
}

impl<C> LineSlot<C> {
    fn collect(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                LineItemEvent::Changed(draft) => self.draft = Some(draft),
                LineItemEvent::Remove => self.remove_requested = true,
                LineItemEvent::ValidationError(flag) => self.has_allocation_error = flag,
            }
        }
    }
}

/// A sale being authored.
pub struct SaleForm<C> {
    catalog: Arc<C>,
    products: Arc<[Product]>,
    config: EditorConfig,
    sale_id: Option<SaleId>,
    status: SaleStatus,
    lines: Vec<LineSlot<C>>,
}

impl<C: BatchCatalog> SaleForm<C> {
    /// Create an empty sale in the default status.
    pub fn new(catalog: Arc<C>, products: Arc<[Product]>, config: EditorConfig) -> Self {
        Self {
            catalog,
            products,
            config,
            sale_id: None,
            status: SaleStatus::default(),
            lines: Vec::new(),
        }
    }

    /// Open an existing sale for editing.
    pub fn edit(
        catalog: Arc<C>,
        products: Arc<[Product]>,
        config: EditorConfig,
        sale: SaleDraft,
    ) -> Self {
        let mut form = Self::new(catalog, products, config);
        form.sale_id = sale.id;
        form.status = sale.status;
        let batch_required = sale.status.requires_batch_detail();
        for draft in sale.lines {
            let (tx, rx) = mpsc::unbounded_channel();
            let editor = LineItemEditor::edit(
                Arc::clone(&form.catalog),
                Arc::clone(&form.products),
                form.config,
                tx,
                draft,
                batch_required,
            );
            form.push(editor, rx);
        }
        form.collect();
        form
    }

    /// ID of the sale being edited, if any.
    #[must_use]
    pub const fn sale_id(&self) -> Option<SaleId> {
        self.sale_id
    }

    /// Current sale status.
    #[must_use]
    pub const fn status(&self) -> SaleStatus {
        self.status
    }

    /// Change the sale status and apply its batch policy to every line.
    pub fn set_status(&mut self, status: SaleStatus) {
        self.status = status;
        let batch_required = status.requires_batch_detail();
        tracing::debug!(%status, batch_required, "Sale status changed");
        for slot in &mut self.lines {
            slot.editor.set_batch_required(batch_required);
        }
        self.collect();
    }

    /// Append an empty line and return its index.
    pub fn add_line(&mut self) -> usize {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut editor = LineItemEditor::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.products),
            self.config,
            tx,
        );
        editor.set_batch_required(self.status.requires_batch_detail());
        self.push(editor, rx);
        self.collect();
        self.lines.len() - 1
    }

    fn push(&mut self, editor: LineItemEditor<C>, events: mpsc::UnboundedReceiver<LineItemEvent>) {
        self.lines.push(LineSlot {
            editor,
            events,
            draft: None,
            has_allocation_error: false,
            remove_requested: false,
        });
    }

    /// Remove the line at `index`. Returns `false` when out of range.
    pub fn remove_line(&mut self, index: usize) -> bool {
        let Some(slot) = self.lines.get_mut(index) else {
            return false;
        };
        slot.editor.request_removal();
        self.collect();
        true
    }

    /// Drop every line.
    pub fn reset(&mut self) {
        self.lines.clear();
    }

    /// Sync every line and collect its events.
    pub fn sync(&mut self) {
        for slot in &mut self.lines {
            slot.editor.sync();
        }
        self.collect();
    }

    /// Wait until no line has a batch fetch outstanding.
    pub async fn settle(&mut self) {
        for slot in &mut self.lines {
            slot.editor.settle().await;
        }
        self.collect();
    }

    /// Whether [`Self::submit`] would succeed.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.submit().is_ok()
    }

    /// Assemble the sale draft from the lines' latest drafts.
    ///
    /// # Errors
    ///
    /// Returns the first blocking problem, checking lines in order.
    pub fn submit(&self) -> Result<SaleDraft, SubmitError> {
        if self.lines.is_empty() {
            return Err(SubmitError::NoLines);
        }

        let mut lines = Vec::with_capacity(self.lines.len());
        for (index, slot) in self.lines.iter().enumerate() {
            let Some(draft) = slot.draft.as_ref().filter(|_| slot.editor.draft().is_some())
            else {
                return Err(SubmitError::IncompleteLine(index));
            };
            if slot.has_allocation_error {
                return Err(SubmitError::InvalidAllocation(index));
            }
            lines.push(draft.clone());
        }

        Ok(SaleDraft {
            id: self.sale_id,
            status: self.status,
            lines,
        })
    }
}

impl<C> SaleForm<C> {
    fn collect(&mut self) {
        for slot in &mut self.lines {
            slot.collect();
        }
        self.lines.retain(|slot| !slot.remove_requested);
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the sale has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Editor of the line at `index`.
    #[must_use]
    pub fn line(&self, index: usize) -> Option<&LineItemEditor<C>> {
        self.lines.get(index).map(|slot| &slot.editor)
    }

    /// Mutable editor of the line at `index`.
    ///
    /// Call [`SaleForm::sync`] after editing so the form sees the change.
    pub fn line_mut(&mut self, index: usize) -> Option<&mut LineItemEditor<C>> {
        self.lines.get_mut(index).map(|slot| &mut slot.editor)
    }

    /// Indices of lines reporting an allocation error.
    #[must_use]
    pub fn invalid_lines(&self) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.has_allocation_error)
            .map(|(index, _)| index)
            .collect()
    }
}

impl<C> std::fmt::Debug for SaleForm<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaleForm")
            .field("status", &self.status)
            .field("lines", &self.lines.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use batchwise_core::{BatchId, PriceTier, ProductId};

    use super::*;
    use crate::allocation::RowValue;
    use crate::catalog::CatalogError;
    use crate::models::{AllocationEntry, Batch};

    struct EmptyCatalog;

    impl BatchCatalog for EmptyCatalog {
        async fn batches_for_product(
            &self,
            _product_id: ProductId,
        ) -> Result<Vec<Batch>, CatalogError> {
            Ok(Vec::new())
        }
    }

    fn form() -> SaleForm<EmptyCatalog> {
        let products: Arc<[Product]> = Arc::from(vec![Product {
            id: ProductId::new(1),
            name: "Rye Loaf".to_string(),
            wholesale_price: dec!(3),
            retail_price: dec!(4),
        }]);
        SaleForm::new(Arc::new(EmptyCatalog), products, EditorConfig::default())
    }

    fn fill_line(form: &mut SaleForm<EmptyCatalog>, quantity: rust_decimal::Decimal) -> usize {
        let index = form.add_line();
        let line = form.line_mut(index).unwrap();
        line.select_product(Some(ProductId::new(1)));
        line.set_requested_quantity(Some(quantity));
        form.sync();
        index
    }

    #[tokio::test]
    async fn test_empty_sale_cannot_submit() {
        let form = form();
        assert_eq!(form.submit(), Err(SubmitError::NoLines));
        assert!(!form.can_submit());
    }

    #[tokio::test]
    async fn test_incomplete_line_blocks_submit() {
        let mut form = form();
        form.add_line();
        assert_eq!(form.submit(), Err(SubmitError::IncompleteLine(0)));
    }

    #[tokio::test]
    async fn test_status_policy_reaches_lines() {
        let mut form = form();
        let index = fill_line(&mut form, dec!(6));
        assert!(form.can_submit());

        form.set_status(SaleStatus::Dispatched);
        assert!(form.line(index).unwrap().batch_required());
        assert_eq!(form.submit(), Err(SubmitError::InvalidAllocation(0)));
        assert_eq!(form.invalid_lines(), vec![0]);

        form.line_mut(index)
            .unwrap()
            .add_allocation_with(RowValue::filled(BatchId::new(8), dec!(6)));
        form.sync();
        let sale = form.submit().unwrap();
        assert_eq!(sale.status, SaleStatus::Dispatched);
        assert_eq!(
            sale.lines[0].allocations,
            vec![AllocationEntry::new(BatchId::new(8), dec!(6))]
        );
    }

    #[tokio::test]
    async fn test_new_lines_inherit_status_policy() {
        let mut form = form();
        form.set_status(SaleStatus::Delivered);
        let index = form.add_line();
        assert!(form.line(index).unwrap().batch_required());
    }

    #[tokio::test]
    async fn test_remove_line_shifts_later_lines() {
        let mut form = form();
        fill_line(&mut form, dec!(1));
        fill_line(&mut form, dec!(2));

        assert!(form.remove_line(0));
        assert!(!form.remove_line(5));
        assert_eq!(form.len(), 1);
        let sale = form.submit().unwrap();
        assert_eq!(sale.lines[0].requested_quantity, dec!(2));
    }

    #[tokio::test]
    async fn test_edit_loads_existing_sale() {
        let sale = SaleDraft {
            id: Some(SaleId::new(31)),
            status: SaleStatus::Delivered,
            lines: vec![SaleLineItemDraft {
                product_id: ProductId::new(1),
                requested_quantity: dec!(5),
                custom_price: Some(dec!(3.75)),
                price_tier: PriceTier::Retail,
                allocations: vec![
                    AllocationEntry::new(BatchId::new(1), dec!(2)),
                    AllocationEntry::new(BatchId::new(2), dec!(3)),
                ],
            }],
        };
        let products: Arc<[Product]> = Arc::from(Vec::new());
        let mut form = SaleForm::edit(
            Arc::new(EmptyCatalog),
            products,
            EditorConfig::default(),
            sale.clone(),
        );
        form.settle().await;

        assert_eq!(form.line(0).unwrap().allocation_count(), 2);
        assert_eq!(form.submit().unwrap(), sale);
    }

    #[tokio::test]
    async fn test_reset_clears_lines() {
        let mut form = form();
        fill_line(&mut form, dec!(1));
        form.reset();
        assert!(form.is_empty());
    }
}
