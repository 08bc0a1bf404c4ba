//! Stock allocation: which single store fulfils a line item.
//!
//! ```text
//! stock records
//!   ↓ drop inactive stores
//!   ↓ policy filter (country-only | region ∪ country-level)
//!   ↓ insufficient combined pool? narrow to country-level if that alone covers it
//!   ↓ rank by available quantity (desc), store id (asc)
//! fulfilling store + fallbacks that could also cover the full quantity
//! ```
//!
//! The read here is not a reservation. The committer re-checks with a
//! conditional decrement and walks the fallbacks if the first store was
//! drained in the meantime.

use core::fmt;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fieldops_core::{ProductId, StoreId};

use crate::policy::{SourcingContext, SourcingPolicy};
use crate::store::StoreQuantity;

/// One line item to allocate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
}

/// Which pool the final eligible set was drawn from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolScope {
    /// Country-only policy: every active store in the user's country.
    Country,
    /// Default policy: region stores combined with country-level stores.
    RegionAndCountry,
    /// Default policy after dropping the region preference.
    CountryLevel,
}

impl fmt::Display for PoolScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolScope::Country => f.write_str("in your country"),
            PoolScope::RegionAndCountry => f.write_str("in your region or at country level"),
            PoolScope::CountryLevel => f.write_str("at country level"),
        }
    }
}

/// A store able to cover the whole line item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCandidate {
    pub store_id: StoreId,
    pub available: i64,
}

/// Result of a successful allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub product_id: ProductId,
    pub quantity: i64,
    pub policy: SourcingPolicy,
    pub scope: PoolScope,
    /// Sum over the final eligible set.
    pub eligible_total: i64,
    /// Ranked best-first; never empty. The first entry is the fulfilling store.
    candidates: Vec<StoreCandidate>,
}

impl Allocation {
    pub fn fulfilling_store(&self) -> StoreId {
        self.candidates[0].store_id
    }

    pub fn candidates(&self) -> &[StoreCandidate] {
        &self.candidates
    }

    pub fn candidate_store_ids(&self) -> Vec<StoreId> {
        self.candidates.iter().map(|c| c.store_id).collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("Invalid quantity {quantity} for product '{product_name}': quantity must be positive")]
    InvalidQuantity {
        product_id: ProductId,
        product_name: String,
        quantity: i64,
    },

    #[error("No active stores carry product '{product_name}'")]
    NoActiveStores {
        product_id: ProductId,
        product_name: String,
    },

    #[error("No active stores {scope} carry product '{product_name}'")]
    NoEligibleStores {
        product_id: ProductId,
        product_name: String,
        scope: PoolScope,
    },

    #[error(
        "Insufficient stock for '{product_name}': requested {requested}, available {available} {scope}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: i64,
        available: i64,
        scope: PoolScope,
    },

    #[error(
        "Insufficient stock for '{product_name}' in a single store: requested {requested}, \
         largest store holds {largest} ({available} available {scope}); \
         a line item cannot be split across stores"
    )]
    NoSingleStoreCovers {
        product_id: ProductId,
        product_name: String,
        requested: i64,
        largest: i64,
        available: i64,
        scope: PoolScope,
    },
}

/// Stock left once quantities promised to earlier lines of the same order are
/// taken out. Never negative.
pub fn remaining_after(records: &[StoreQuantity], claimed: Option<&HashMap<StoreId, i64>>) -> Vec<StoreQuantity> {
    let Some(claimed) = claimed else {
        return records.to_vec();
    };
    records
        .iter()
        .map(|r| match claimed.get(&r.store.id) {
            Some(taken) => StoreQuantity {
                store: r.store.clone(),
                quantity: Some((r.available() - taken).max(0)),
            },
            None => r.clone(),
        })
        .collect()
}

/// Choose the fulfilling store for one line item.
pub fn allocate(
    request: &AllocationRequest,
    records: &[StoreQuantity],
    ctx: &SourcingContext,
    policy: SourcingPolicy,
) -> Result<Allocation, AllocationError> {
    if request.quantity <= 0 {
        return Err(AllocationError::InvalidQuantity {
            product_id: request.product_id,
            product_name: request.product_name.clone(),
            quantity: request.quantity,
        });
    }

    let active: Vec<&StoreQuantity> = records.iter().filter(|r| r.store.active).collect();
    if active.is_empty() {
        return Err(AllocationError::NoActiveStores {
            product_id: request.product_id,
            product_name: request.product_name.clone(),
        });
    }

    let (eligible, scope) = match policy {
        SourcingPolicy::CountryOnly => {
            let in_country = active
                .into_iter()
                .filter(|r| r.store.country_id == ctx.country_id)
                .collect::<Vec<_>>();
            (in_country, PoolScope::Country)
        }
        SourcingPolicy::RegionThenCountry => {
            let region_pool = active
                .iter()
                .copied()
                .filter(|r| r.store.region_id == Some(ctx.region_id));
            let country_pool = active
                .iter()
                .copied()
                .filter(|r| r.store.is_country_level() && r.store.country_id == ctx.country_id)
                .collect::<Vec<_>>();

            let combined = region_pool.chain(country_pool.iter().copied()).collect::<Vec<_>>();

            // Quantities can be negative in legacy data, so the country-level
            // pool alone may cover what the combined pool does not.
            if total(&combined) < request.quantity && total(&country_pool) >= request.quantity {
                (country_pool, PoolScope::CountryLevel)
            } else {
                (combined, PoolScope::RegionAndCountry)
            }
        }
    };

    if eligible.is_empty() {
        return Err(AllocationError::NoEligibleStores {
            product_id: request.product_id,
            product_name: request.product_name.clone(),
            scope,
        });
    }

    let eligible_total = total(&eligible);
    if eligible_total < request.quantity {
        return Err(AllocationError::InsufficientStock {
            product_id: request.product_id,
            product_name: request.product_name.clone(),
            requested: request.quantity,
            available: eligible_total.max(0),
            scope,
        });
    }

    let mut ranked = eligible
        .iter()
        .map(|r| StoreCandidate {
            store_id: r.store.id,
            available: r.available(),
        })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.available.cmp(&a.available).then(a.store_id.cmp(&b.store_id)));

    let largest = ranked[0].available;
    if largest < request.quantity {
        return Err(AllocationError::NoSingleStoreCovers {
            product_id: request.product_id,
            product_name: request.product_name.clone(),
            requested: request.quantity,
            largest: largest.max(0),
            available: eligible_total,
            scope,
        });
    }

    ranked.retain(|c| c.available >= request.quantity);

    Ok(Allocation {
        product_id: request.product_id,
        quantity: request.quantity,
        policy,
        scope,
        eligible_total,
        candidates: ranked,
    })
}

fn total(pool: &[&StoreQuantity]) -> i64 {
    pool.iter().map(|r| r.available()).sum()
}
