//! Parties domain module (clients).
//!
//! Clients are maintained by administrative CRUD elsewhere; the fulfillment
//! core only reads them.

pub mod client;

pub use client::{Client, ClientSummary};
