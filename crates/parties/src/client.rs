use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fieldops_core::{ClientId, CountryId, DomainError, DomainResult, RegionId};

/// A buying client (shop, outlet, distributor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    /// Running balance as stored: a decimal string, never a float.
    pub balance: String,
    pub region_id: Option<RegionId>,
    pub country_id: Option<CountryId>,
}

impl Client {
    /// Parse the stored running balance. An empty string reads as zero.
    pub fn balance_amount(&self) -> DomainResult<Decimal> {
        let raw = self.balance.trim();
        if raw.is_empty() {
            return Ok(Decimal::ZERO);
        }
        Decimal::from_str(raw).map_err(|e| {
            DomainError::validation(format!("client {} has a malformed balance '{}': {}", self.id, raw, e))
        })
    }

    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            id: self.id,
            name: self.name.clone(),
            balance: self.balance_amount().ok(),
        }
    }
}

/// Client fields echoed back on order responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: ClientId,
    pub name: String,
    pub balance: Option<Decimal>,
}
