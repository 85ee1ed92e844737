//! Property-based tests using proptest
//!
//! Tests invariants that should hold for any input:
//! - Row indices stay dense and ordered under any add/remove sequence
//! - Reconciliation flags exactly the totals that differ from the request
//! - Batch policy off never flags anything
//! - Re-applying a row's value never changes the canonical list

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use rust_decimal::Decimal;

use batchwise_core::BatchId;
use batchwise_sales::allocation::{
    AllocationMerger, AllocationRegistry, FieldErrorKind, Reconciliation, RowValue, reconcile,
};
use batchwise_sales::models::AllocationEntry;

#[derive(Debug, Clone)]
enum Op {
    Add,
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Add), (0usize..10).prop_map(Op::Remove)]
}

fn entries(quantities: &[i64]) -> Vec<AllocationEntry> {
    quantities
        .iter()
        .zip(1..)
        .map(|(&q, id)| AllocationEntry::new(BatchId::new(id), Decimal::from(q)))
        .collect()
}

// ============================================================================
// Registry Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Indices are always 0..len with survivors in their original order
    #[test]
    fn prop_reindex_keeps_rows_dense_and_ordered(ops in prop::collection::vec(op(), 0..40)) {
        let mut registry = AllocationRegistry::new();
        let mut model = Vec::new();

        for op in ops {
            match op {
                Op::Add => {
                    let index = registry.add_row();
                    prop_assert_eq!(index, model.len());
                    model.push(registry.row(index).key());
                }
                Op::Remove(index) => {
                    let removed = registry.remove_row(index);
                    if index < model.len() {
                        prop_assert_eq!(removed.map(|r| r.key()), Some(model.remove(index)));
                    } else {
                        prop_assert!(removed.is_none());
                    }
                }
            }

            prop_assert_eq!(registry.keys(), model.clone());
            for (position, key) in model.iter().enumerate() {
                prop_assert_eq!(registry.index_of(*key), Some(position));
            }
        }
    }
}

// ============================================================================
// Reconciliation Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Required batches: error iff the total differs, kind by direction
    #[test]
    fn prop_reconciliation_matches_totals(
        requested in 0i64..1_000,
        quantities in prop::collection::vec(1i64..300, 0..6),
    ) {
        let requested = Decimal::from(requested);
        let allocations = entries(&quantities);
        let total: Decimal = allocations.iter().map(|a| a.quantity).sum();
        let outcome = reconcile(requested, &allocations, true);

        prop_assert_eq!(outcome.is_valid(), total == requested);
        prop_assert_eq!(
            outcome.error_kind() == Some(FieldErrorKind::BatchAllocationMismatch),
            total < requested
        );
        prop_assert_eq!(
            outcome.error_kind() == Some(FieldErrorKind::BatchOverAllocated),
            total > requested
        );
    }

    /// Optional batches: never an error, whatever the allocations
    #[test]
    fn prop_policy_off_never_flags(
        requested in 0i64..1_000,
        quantities in prop::collection::vec(1i64..300, 0..6),
    ) {
        let outcome = reconcile(Decimal::from(requested), &entries(&quantities), false);
        prop_assert_eq!(outcome, Reconciliation::NotApplicable);
        prop_assert!(outcome.is_valid());
    }

    /// Re-applying the same pair from the same row is a no-op
    #[test]
    fn prop_merge_is_idempotent(
        batches in prop::collection::vec((1i32..5, 1i64..50), 1..6),
        repeats in 1usize..4,
    ) {
        let mut registry = AllocationRegistry::new();
        let mut merger = AllocationMerger::new();
        let values: Vec<RowValue> = batches
            .iter()
            .map(|&(b, q)| RowValue::filled(BatchId::new(b), Decimal::from(q)))
            .collect();
        for value in &values {
            let index = registry.add_row_with(*value);
            merger.apply(registry.row(index).key(), value);
        }
        let snapshot = merger.entries();

        for _ in 0..repeats {
            for (index, value) in values.iter().enumerate() {
                prop_assert!(!merger.apply(registry.row(index).key(), value));
            }
        }
        prop_assert_eq!(merger.entries(), snapshot);
    }
}
