use serde::{Deserialize, Serialize};
use thiserror::Error;

use fieldops_core::{CategoryId, PriceOptionId, ProductId};

use crate::category::{Category, PriceOption};
use crate::price::PriceValues;

/// A sellable product.
///
/// Stock lives in per-store quantity records owned by the inventory module;
/// the catalog only knows the product's identity, category and unit cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub unit_cost: PriceValues,
}

impl Product {
    pub fn category_id(&self) -> CategoryId {
        self.category.id
    }
}

/// Catalog consistency failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error(
        "price option '{price_option_name}' belongs to category '{price_option_category}' \
         but product '{product_name}' belongs to category '{product_category}'"
    )]
    CategoryMismatch {
        product_id: ProductId,
        product_name: String,
        product_category: String,
        price_option_id: PriceOptionId,
        price_option_name: String,
        price_option_category: String,
    },
}

/// A price tier may only be applied to products of its own category.
pub fn ensure_same_category(product: &Product, price_option: &PriceOption) -> Result<(), CatalogError> {
    if product.category_id() == price_option.category_id() {
        return Ok(());
    }
    Err(CatalogError::CategoryMismatch {
        product_id: product.id,
        product_name: product.name.clone(),
        product_category: product.category.name.clone(),
        price_option_id: price_option.id,
        price_option_name: price_option.name.clone(),
        price_option_category: price_option.category.name.clone(),
    })
}
