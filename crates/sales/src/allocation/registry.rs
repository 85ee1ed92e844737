//! Ordered, densely indexed allocation rows of one line item.
//!
//! A row's index is its position and shifts when an earlier row is removed.
//! Subscriptions are keyed by [`RowKey`] instead, which never changes and is
//! never reused within a registry.

use std::sync::Arc;

use futures::stream::BoxStream;
use rust_decimal::Decimal;
use tokio::sync::watch;

use batchwise_core::BatchId;

use crate::models::AllocationEntry;

/// Stable identity of a row for the lifetime of its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(u64);

impl RowKey {
    /// Key used by detached rows. Registries start numbering at 1.
    pub const DETACHED: Self = Self(0);
}

/// Current content of an allocation row's two controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowValue {
    /// Chosen batch, if any.
    pub batch_id: Option<BatchId>,
    /// Entered quantity, if any.
    pub quantity: Option<Decimal>,
}

impl RowValue {
    /// A row with both controls filled.
    #[must_use]
    pub const fn filled(batch_id: BatchId, quantity: Decimal) -> Self {
        Self {
            batch_id: Some(batch_id),
            quantity: Some(quantity),
        }
    }

    /// The allocation this row currently claims.
    ///
    /// `None` until both a batch and a positive quantity are present.
    #[must_use]
    pub fn entry(&self) -> Option<AllocationEntry> {
        match (self.batch_id, self.quantity) {
            (Some(batch_id), Some(quantity)) if quantity > Decimal::ZERO => {
                Some(AllocationEntry::new(batch_id, quantity))
            }
            _ => None,
        }
    }
}

impl From<AllocationEntry> for RowValue {
    fn from(entry: AllocationEntry) -> Self {
        Self::filled(entry.batch_id, entry.quantity)
    }
}

/// Stream of a row's values, tagged with its key.
pub type RowStream = BoxStream<'static, (RowKey, RowValue)>;

/// Handle to one editable allocation row.
///
/// Clones edit the same row. Edits to a row that has been removed from its
/// registry (or to a detached row) are accepted and reach no subscriber.
#[derive(Debug, Clone)]
pub struct AllocationRow {
    key: RowKey,
    control: Arc<watch::Sender<RowValue>>,
}

impl AllocationRow {
    fn new(key: RowKey, value: RowValue) -> Self {
        let (control, _) = watch::channel(value);
        Self {
            key,
            control: Arc::new(control),
        }
    }

    /// A row that belongs to no registry.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(RowKey::DETACHED, RowValue::default())
    }

    /// Stable key of this row.
    #[must_use]
    pub const fn key(&self) -> RowKey {
        self.key
    }

    /// Current value of both controls.
    #[must_use]
    pub fn value(&self) -> RowValue {
        *self.control.borrow()
    }

    /// Select (or clear) the batch.
    pub fn set_batch(&self, batch_id: Option<BatchId>) {
        self.control.send_modify(|v| v.batch_id = batch_id);
    }

    /// Enter (or clear) the quantity.
    pub fn set_quantity(&self, quantity: Option<Decimal>) {
        self.control.send_modify(|v| v.quantity = quantity);
    }

    /// Replace both controls at once.
    pub fn set_value(&self, value: RowValue) {
        self.control.send_replace(value);
    }

    /// Subscribe to this row's values.
    ///
    /// The stream yields the current value first, then each change. Edits
    /// made between polls are coalesced into the latest value; values are
    /// never reordered.
    #[must_use]
    pub fn subscribe(&self) -> RowStream {
        let key = self.key;
        let mut rx = self.control.subscribe();
        Box::pin(async_stream::stream! {
            let initial = *rx.borrow_and_update();
            yield (key, initial);
            while rx.changed().await.is_ok() {
                let value = *rx.borrow_and_update();
                yield (key, value);
            }
        })
    }
}

/// The allocation rows of one line item.
#[derive(Debug)]
pub struct AllocationRegistry {
    rows: Vec<AllocationRow>,
    next_key: u64,
}

impl Default for AllocationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rows: Vec::new(),
            next_key: 1,
        }
    }

    /// Append an empty row and return its index.
    pub fn add_row(&mut self) -> usize {
        self.add_row_with(RowValue::default())
    }

    /// Append a pre-filled row and return its index.
    pub fn add_row_with(&mut self, value: RowValue) -> usize {
        let key = RowKey(self.next_key);
        self.next_key += 1;
        self.rows.push(AllocationRow::new(key, value));
        self.rows.len() - 1
    }

    /// Remove the row at `index`, shifting later rows down by one.
    ///
    /// Out-of-range indices are ignored.
    pub fn remove_row(&mut self, index: usize) -> Option<AllocationRow> {
        (index < self.rows.len()).then(|| self.rows.remove(index))
    }

    /// The row at `index`, or a detached row when out of range.
    #[must_use]
    pub fn row(&self, index: usize) -> AllocationRow {
        self.rows
            .get(index)
            .cloned()
            .unwrap_or_else(AllocationRow::detached)
    }

    /// Position of the row with `key`, if it is still registered.
    #[must_use]
    pub fn index_of(&self, key: RowKey) -> Option<usize> {
        self.rows.iter().position(|row| row.key == key)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in index order.
    pub fn iter(&self) -> impl Iterator<Item = &AllocationRow> {
        self.rows.iter()
    }

    /// Row keys in index order.
    #[must_use]
    pub fn keys(&self) -> Vec<RowKey> {
        self.rows.iter().map(AllocationRow::key).collect()
    }

    /// Drop every row.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
