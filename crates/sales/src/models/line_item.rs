//! Sale line item drafts and their batch allocations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use batchwise_core::{BatchId, PriceTier, ProductId, SaleId, SaleStatus};

/// A claim of some quantity from one batch toward a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationEntry {
    /// Batch the units come from.
    pub batch_id: BatchId,
    /// Units taken from the batch (always positive).
    pub quantity: Decimal,
}

impl AllocationEntry {
    /// Create an allocation entry.
    #[must_use]
    pub const fn new(batch_id: BatchId, quantity: Decimal) -> Self {
        Self { batch_id, quantity }
    }
}

/// One product/quantity/price entry of a sale being authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineItemDraft {
    /// Product sold.
    pub product_id: ProductId,
    /// Units requested by the customer.
    pub requested_quantity: Decimal,
    /// Unit price on this line (tier price unless overridden).
    #[serde(default)]
    pub custom_price: Option<Decimal>,
    /// Price tier the line is sold at.
    #[serde(default)]
    pub price_tier: PriceTier,
    /// Batches the requested quantity is fulfilled from.
    #[serde(default)]
    pub allocations: Vec<AllocationEntry>,
}

impl SaleLineItemDraft {
    /// Sum of all allocated quantities.
    #[must_use]
    pub fn allocated_quantity(&self) -> Decimal {
        self.allocations.iter().map(|a| a.quantity).sum()
    }
}

/// A whole sale ready to be handed to persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDraft {
    /// Existing sale being edited; absent for a new sale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SaleId>,
    /// Fulfillment status the sale is saved with.
    #[serde(default)]
    pub status: SaleStatus,
    /// Line items in form order.
    pub lines: Vec<SaleLineItemDraft>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_allocated_quantity_sums_entries() {
        let draft = SaleLineItemDraft {
            product_id: ProductId::new(1),
            requested_quantity: dec!(10),
            custom_price: None,
            price_tier: PriceTier::Retail,
            allocations: vec![
                AllocationEntry::new(BatchId::new(1), dec!(6)),
                AllocationEntry::new(BatchId::new(2), dec!(4.5)),
            ],
        };
        assert_eq!(draft.allocated_quantity(), dec!(10.5));
    }

    #[test]
    fn test_line_defaults_when_missing() {
        let json = r#"{"productId":4,"requestedQuantity":"2"}"#;
        let draft: SaleLineItemDraft = serde_json::from_str(json).unwrap();
        assert_eq!(draft.price_tier, PriceTier::Retail);
        assert!(draft.allocations.is_empty());
        assert!(draft.custom_price.is_none());
    }
}
