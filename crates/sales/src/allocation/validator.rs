//! Reconciliation of allocated against requested quantity.

use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::AllocationEntry;

/// Errors that can sit on the requested-quantity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// No quantity entered.
    Required,
    /// Quantity below one unit.
    Min,
    /// Batches cover less than the requested quantity.
    BatchAllocationMismatch,
    /// Batches cover more than the requested quantity.
    BatchOverAllocated,
    /// The same batch is selected on more than one row.
    DuplicateBatch,
}

impl FieldErrorKind {
    /// Kinds owned by reconciliation; field validation never touches them.
    pub const ALLOCATION: [Self; 3] = [
        Self::BatchAllocationMismatch,
        Self::BatchOverAllocated,
        Self::DuplicateBatch,
    ];

    /// Kinds owned by plain field validation.
    pub const FIELD: [Self; 2] = [Self::Required, Self::Min];

    /// Whether this kind comes from reconciliation.
    #[must_use]
    pub fn is_allocation(self) -> bool {
        Self::ALLOCATION.contains(&self)
    }
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "Quantity is required"),
            Self::Min => write!(f, "Quantity must be at least 1"),
            Self::BatchAllocationMismatch => {
                write!(f, "Allocated batches do not cover the requested quantity")
            }
            Self::BatchOverAllocated => {
                write!(f, "Allocated batches exceed the requested quantity")
            }
            Self::DuplicateBatch => write!(f, "The same batch is selected more than once"),
        }
    }
}

/// Keyed error set of one form field.
///
/// Each producer prunes and inserts only the kinds it owns, so errors from
/// different producers coexist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeSet<FieldErrorKind>);

impl FieldErrors {
    /// Create an empty error set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Replace the kinds in `owned` with those in `asserted`.
    ///
    /// Returns whether the set changed.
    pub fn merge(&mut self, owned: &[FieldErrorKind], asserted: &[FieldErrorKind]) -> bool {
        let before = self.0.clone();
        self.0.retain(|kind| !owned.contains(kind));
        self.0
            .extend(asserted.iter().copied().filter(|kind| owned.contains(kind)));
        before != self.0
    }

    /// Whether `kind` is present.
    #[must_use]
    pub fn contains(&self, kind: FieldErrorKind) -> bool {
        self.0.contains(&kind)
    }

    /// Whether any reconciliation error is present.
    #[must_use]
    pub fn has_allocation_error(&self) -> bool {
        self.0.iter().any(|kind| kind.is_allocation())
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Errors in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = FieldErrorKind> + '_ {
        self.0.iter().copied()
    }
}

/// Relationship between requested and allocated quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Reconciliation {
    /// Batch detail is not required; allocations are ignored.
    NotApplicable,
    /// Allocations cover less than requested.
    UnderAllocated { requested: Decimal, allocated: Decimal },
    /// Allocations match the request exactly.
    Exact { requested: Decimal },
    /// Allocations cover more than requested.
    OverAllocated { requested: Decimal, allocated: Decimal },
}

impl Reconciliation {
    /// The error kind this state asserts, if any.
    #[must_use]
    pub const fn error_kind(self) -> Option<FieldErrorKind> {
        match self {
            Self::NotApplicable | Self::Exact { .. } => None,
            Self::UnderAllocated { .. } => Some(FieldErrorKind::BatchAllocationMismatch),
            Self::OverAllocated { .. } => Some(FieldErrorKind::BatchOverAllocated),
        }
    }

    /// Whether the state is acceptable for submission.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.error_kind().is_none()
    }
}

/// Classify `allocations` against `requested` under the batch policy.
#[must_use]
pub fn reconcile(
    requested: Decimal,
    allocations: &[AllocationEntry],
    batch_required: bool,
) -> Reconciliation {
    if !batch_required {
        return Reconciliation::NotApplicable;
    }
    let allocated: Decimal = allocations.iter().map(|a| a.quantity).sum();
    match allocated.cmp(&requested) {
        std::cmp::Ordering::Less => Reconciliation::UnderAllocated {
            requested,
            allocated,
        },
        std::cmp::Ordering::Equal => Reconciliation::Exact { requested },
        std::cmp::Ordering::Greater => Reconciliation::OverAllocated {
            requested,
            allocated,
        },
    }
}

/// Policy-gated validator for one line item's allocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationValidator {
    batch_required: bool,
}

impl ReconciliationValidator {
    /// Create a validator with the given batch policy.
    #[must_use]
    pub const fn new(batch_required: bool) -> Self {
        Self { batch_required }
    }

    /// Current batch policy.
    #[must_use]
    pub const fn batch_required(&self) -> bool {
        self.batch_required
    }

    /// Change the batch policy.
    pub fn set_batch_required(&mut self, batch_required: bool) {
        self.batch_required = batch_required;
    }

    /// Reconcile and write the resulting allocation errors into `errors`.
    ///
    /// A missing requested quantity counts as zero. Duplicate batch
    /// selections are asserted only while batch detail is required.
    pub fn validate(
        &self,
        requested: Option<Decimal>,
        allocations: &[AllocationEntry],
        has_duplicates: bool,
        errors: &mut FieldErrors,
    ) -> Reconciliation {
        let outcome = reconcile(
            requested.unwrap_or(Decimal::ZERO),
            allocations,
            self.batch_required,
        );

        let mut asserted: Vec<FieldErrorKind> = outcome.error_kind().into_iter().collect();
        if self.batch_required && has_duplicates {
            asserted.push(FieldErrorKind::DuplicateBatch);
        }
        errors.merge(&FieldErrorKind::ALLOCATION, &asserted);
        outcome
    }
}
