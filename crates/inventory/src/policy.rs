//! Sourcing policies, keyed by the requester's country.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use fieldops_core::{CountryId, RegionId};

/// Where the requesting user sells from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcingContext {
    pub region_id: RegionId,
    pub country_id: CountryId,
}

/// How eligible stores are chosen for a line item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcingPolicy {
    /// Stores in the user's region plus the country-level stores of the
    /// user's country. Region is a soft preference, not a boundary.
    #[default]
    RegionThenCountry,
    /// Any store in the user's country, regardless of region. Nothing
    /// outside the country is ever visible.
    CountryOnly,
}

/// Default policy plus per-country overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcingPolicyTable {
    default: SourcingPolicy,
    overrides: HashMap<CountryId, SourcingPolicy>,
}

impl SourcingPolicyTable {
    pub fn new(default: SourcingPolicy) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Region-then-country everywhere except the given countries, which use
    /// the country-only policy.
    pub fn country_only_for(countries: impl IntoIterator<Item = CountryId>) -> Self {
        countries
            .into_iter()
            .fold(Self::default(), |table, c| table.with_override(c, SourcingPolicy::CountryOnly))
    }

    pub fn with_override(mut self, country: CountryId, policy: SourcingPolicy) -> Self {
        self.overrides.insert(country, policy);
        self
    }

    pub fn policy_for(&self, country: CountryId) -> SourcingPolicy {
        self.overrides.get(&country).copied().unwrap_or(self.default)
    }
}
