//! Fulfillment storage boundary.
//!
//! The trait is storage-agnostic; `in_memory` backs tests and local runs,
//! `postgres` backs production.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryFulfillmentStore;
pub use postgres::PostgresFulfillmentStore;
pub use r#trait::{FulfillmentStore, ProductStock, StoreError};
