//! Folds per-row value streams into one canonical allocation list.
//!
//! The canonical list holds at most one entry per batch, in the order batches
//! first arrived. A row that claims a batch already held by another row is
//! kept aside as a shadowed claim until the holder lets go; the duplicate is
//! reported through [`AllocationMerger::duplicate_batches`].

use futures::stream::{SelectAll, StreamExt, select_all};
use futures::FutureExt;
use rust_decimal::Decimal;

use batchwise_core::BatchId;

use super::registry::{AllocationRegistry, RowKey, RowStream, RowValue};
use crate::models::AllocationEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Claim {
    row: RowKey,
    entry: AllocationEntry,
}

/// Canonical allocation state fed by the rows of one registry.
pub struct AllocationMerger {
    streams: SelectAll<RowStream>,
    held: Vec<Claim>,
    shadowed: Vec<Claim>,
}

impl Default for AllocationMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AllocationMerger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationMerger")
            .field("subscriptions", &self.streams.len())
            .field("held", &self.held)
            .field("shadowed", &self.shadowed)
            .finish()
    }
}

impl AllocationMerger {
    /// Create a merger with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            streams: select_all(Vec::<RowStream>::new()),
            held: Vec::new(),
            shadowed: Vec::new(),
        }
    }

    /// Replace all subscriptions with fresh ones for the rows in `registry`.
    ///
    /// Each fresh subscription replays its row's current value, so an edit
    /// that had not been observed yet is still applied.
    pub fn resubscribe(&mut self, registry: &AllocationRegistry) {
        self.streams = select_all(registry.iter().map(|row| row.subscribe()));
    }

    /// Drop every subscription and claim.
    pub fn clear(&mut self) {
        self.streams = select_all(Vec::<RowStream>::new());
        self.held.clear();
        self.shadowed.clear();
    }

    /// Number of live row subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.streams.len()
    }

    /// Apply one row emission. Returns whether the canonical state changed.
    pub fn apply(&mut self, row: RowKey, value: &RowValue) -> bool {
        let Some(entry) = value.entry() else {
            return self.retract(row);
        };

        if let Some(claim) = self.held.iter_mut().find(|c| c.row == row)
            && claim.entry.batch_id == entry.batch_id
        {
            let changed = claim.entry.quantity != entry.quantity;
            claim.entry.quantity = entry.quantity;
            return changed;
        }

        if let Some(claim) = self.shadowed.iter_mut().find(|c| c.row == row)
            && claim.entry.batch_id == entry.batch_id
        {
            let changed = claim.entry.quantity != entry.quantity;
            claim.entry.quantity = entry.quantity;
            return changed;
        }

        // The row moved to another batch (or is new): release, then claim.
        self.retract(row);
        let claim = Claim { row, entry };
        if self.held.iter().any(|c| c.entry.batch_id == entry.batch_id) {
            self.shadowed.push(claim);
        } else {
            self.held.push(claim);
        }
        true
    }

    /// Withdraw whatever `row` currently claims.
    ///
    /// A held batch passes in place to its earliest shadowed claimant, if
    /// any. Returns whether the canonical state changed.
    pub fn retract(&mut self, row: RowKey) -> bool {
        let shadowed_before = self.shadowed.len();
        self.shadowed.retain(|c| c.row != row);
        let mut changed = self.shadowed.len() != shadowed_before;

        if let Some(pos) = self.held.iter().position(|c| c.row == row) {
            changed = true;
            let batch_id = self.held.get(pos).map(|c| c.entry.batch_id);
            let heir = self
                .shadowed
                .iter()
                .position(|c| Some(c.entry.batch_id) == batch_id)
                .map(|i| self.shadowed.remove(i));
            match heir {
                Some(heir) => {
                    if let Some(slot) = self.held.get_mut(pos) {
                        *slot = heir;
                    }
                }
                None => {
                    self.held.remove(pos);
                }
            }
        }
        changed
    }

    /// Apply every emission that is ready now, without waiting.
    ///
    /// Returns whether the canonical state changed.
    pub fn drain_ready(&mut self) -> bool {
        let mut changed = false;
        while let Some(Some((row, value))) = self.streams.next().now_or_never() {
            changed |= self.apply(row, &value);
        }
        changed
    }

    /// Wait for the next row emission and apply it.
    ///
    /// Returns `None` once there are no subscriptions left, otherwise whether
    /// the canonical state changed.
    pub async fn next_change(&mut self) -> Option<bool> {
        let (row, value) = self.streams.next().await?;
        Some(self.apply(row, &value))
    }

    /// The canonical allocation list.
    #[must_use]
    pub fn entries(&self) -> Vec<AllocationEntry> {
        self.held.iter().map(|c| c.entry).collect()
    }

    /// Sum of the canonical quantities.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.held.iter().map(|c| c.entry.quantity).sum()
    }

    /// Batches claimed by more than one row, in canonical order.
    #[must_use]
    pub fn duplicate_batches(&self) -> Vec<BatchId> {
        self.held
            .iter()
            .map(|c| c.entry.batch_id)
            .filter(|batch_id| self.shadowed.iter().any(|s| s.entry.batch_id == *batch_id))
            .collect()
    }
}
