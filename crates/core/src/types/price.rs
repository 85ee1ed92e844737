//! Price tiers for sale line items.
//!
//! Every product carries a wholesale and a retail price. The tier chosen on a
//! line item decides which of the two pre-fills the line's price field.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing an unknown price tier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid price tier: {0}")]
pub struct PriceTierError(String);

/// Which product price a line item is sold at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    /// Trade price for resellers.
    Wholesale,
    /// Price for end customers.
    #[default]
    Retail,
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wholesale => write!(f, "wholesale"),
            Self::Retail => write!(f, "retail"),
        }
    }
}

impl std::str::FromStr for PriceTier {
    type Err = PriceTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wholesale" => Ok(Self::Wholesale),
            "retail" => Ok(Self::Retail),
            _ => Err(PriceTierError(s.to_string())),
        }
    }
}
