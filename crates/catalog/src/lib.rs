//! Catalog domain module: products, categories and price tiers.
//!
//! Pure data + deterministic checks (no IO). Loading is the infra crate's job;
//! this crate only decides whether a loaded product and price tier may be
//! combined on an order line, and what a tier costs in a given country.

pub mod category;
pub mod price;
pub mod product;

pub use category::{Category, PriceOption};
pub use price::{CountryOverrideResolver, CurrencyResolver, PriceKind, PriceValues};
pub use product::{CatalogError, Product, ensure_same_category};
