use serde::{Deserialize, Serialize};

use fieldops_core::{CountryId, RegionId, StoreId};

/// A stock-holding location.
///
/// A store without a region is a *country-level* store: a fallback source for
/// every region of its country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub region_id: Option<RegionId>,
    pub country_id: CountryId,
    pub active: bool,
}

impl Store {
    pub fn is_country_level(&self) -> bool {
        self.region_id.is_none()
    }
}

/// Quantity of one product on hand at one store.
///
/// `quantity` is nullable in storage; a missing value counts as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreQuantity {
    pub store: Store,
    pub quantity: Option<i64>,
}

impl StoreQuantity {
    pub fn available(&self) -> i64 {
        self.quantity.unwrap_or(0)
    }
}
