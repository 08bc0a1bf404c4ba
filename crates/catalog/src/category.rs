use serde::{Deserialize, Serialize};

use fieldops_core::{CategoryId, PriceOptionId};

use crate::price::PriceValues;

/// Product category. Owns a set of price tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A named price tier under a category (e.g. "Retail", "Wholesale").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceOption {
    pub id: PriceOptionId,
    pub name: String,
    pub category: Category,
    pub values: PriceValues,
}

impl PriceOption {
    pub fn category_id(&self) -> CategoryId {
        self.category.id
    }
}
