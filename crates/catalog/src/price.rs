//! Country-aware monetary values.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fieldops_core::CountryId;

/// A base value plus per-country overrides.
///
/// This is the "value pair" handed to a [`CurrencyResolver`]: the base value
/// applies to any country without its own entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceValues {
    pub base: Decimal,
    #[serde(default)]
    pub by_country: BTreeMap<CountryId, Decimal>,
}

impl PriceValues {
    pub fn new(base: Decimal) -> Self {
        Self {
            base,
            by_country: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, country: CountryId, value: Decimal) -> Self {
        self.by_country.insert(country, value);
        self
    }
}

/// Which monetary figure is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceKind {
    /// Selling price of a price tier.
    Sale,
    /// Unit cost of a product.
    Cost,
}

/// Resolves a monetary value for a country.
///
/// Currency tables are maintained elsewhere; the fulfillment core only
/// consumes the already-resolved figure.
pub trait CurrencyResolver: Send + Sync {
    fn resolve(&self, values: &PriceValues, country: CountryId, kind: PriceKind) -> Decimal;
}

/// Picks the country override when one exists, otherwise the base value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountryOverrideResolver;

impl CurrencyResolver for CountryOverrideResolver {
    fn resolve(&self, values: &PriceValues, country: CountryId, _kind: PriceKind) -> Decimal {
        values
            .by_country
            .get(&country)
            .copied()
            .unwrap_or(values.base)
    }
}
