//! Production batch projection used while allocating a line item.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use batchwise_core::BatchId;

/// A production batch of one product, as reported by the batch catalog.
///
/// Read-only: the sale engine never deducts from `remaining_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// Unique batch ID.
    pub id: BatchId,
    /// Printed batch/lot number.
    pub batch_number: String,
    /// Units not yet sold from this batch.
    pub remaining_quantity: Decimal,
    /// Best-before date, if the product expires.
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

impl Batch {
    /// Whether the batch has expired on the given day.
    #[must_use]
    pub fn is_expired_on(&self, day: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < day)
    }
}
