//! Sales domain module: order assembly and the outstanding-balance gate.
//!
//! Deterministic domain logic only. Loading, committing and retrying live in
//! `fieldops-infra`.

pub mod assembler;
pub mod balance;
pub mod order;

pub use assembler::{OrderHeaderInput, ResolvedLine, assemble, round_total};
pub use balance::{BalanceBlock, BalanceGate, BalanceGateDecision, UnpaidOrder};
pub use order::{
    CommitReceipt, CommittedLine, NamedRef, OrderDraft, OrderItemRecord, OrderRecord, PreparedItem,
};
