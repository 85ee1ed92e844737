//! Status enums for sales.

use serde::{Deserialize, Serialize};

/// Fulfillment status of a sale.
///
/// Statuses are ordered: a sale moves from `Ordered` towards `Delivered`.
/// `Cancelled` sits outside the fulfillment path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    #[default]
    Ordered,
    InProduction,
    Packaging,
    Dispatched,
    Delivered,
    Cancelled,
}

impl SaleStatus {
    /// Whether line items of a sale in this status must name the batches
    /// they are fulfilled from.
    ///
    /// Only statuses beyond packaging require batch detail.
    #[must_use]
    pub const fn requires_batch_detail(self) -> bool {
        matches!(self, Self::Dispatched | Self::Delivered)
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ordered => write!(f, "ordered"),
            Self::InProduction => write!(f, "in_production"),
            Self::Packaging => write!(f, "packaging"),
            Self::Dispatched => write!(f, "dispatched"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for SaleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ordered" => Ok(Self::Ordered),
            "in_production" => Ok(Self::InProduction),
            "packaging" => Ok(Self::Packaging),
            "dispatched" => Ok(Self::Dispatched),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid sale status: {s}")),
        }
    }
}
