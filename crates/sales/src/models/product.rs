//! Product snapshot as supplied by the product catalog.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use batchwise_core::{PriceTier, ProductId};

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Trade price per unit.
    pub wholesale_price: Decimal,
    /// End-customer price per unit.
    pub retail_price: Decimal,
}

impl Product {
    /// Unit price for the given tier.
    #[must_use]
    pub const fn price_for(&self, tier: PriceTier) -> Decimal {
        match tier {
            PriceTier::Wholesale => self.wholesale_price,
            PriceTier::Retail => self.retail_price,
        }
    }
}
