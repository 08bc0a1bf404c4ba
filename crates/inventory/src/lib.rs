//! Inventory domain module: stores, per-store stock and sourcing.
//!
//! This crate contains the stock-sourcing rules, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). The committed
//! decrement itself happens in the infra layer.

pub mod allocator;
pub mod policy;
pub mod store;

pub use allocator::{
    Allocation, AllocationError, AllocationRequest, PoolScope, StoreCandidate, allocate, remaining_after,
};
pub use policy::{SourcingContext, SourcingPolicy, SourcingPolicyTable};
pub use store::{Store, StoreQuantity};
