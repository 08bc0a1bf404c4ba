//! HTTP API: routing, identity extraction, and request/response mapping for
//! the order fulfillment service.

pub mod app;
pub mod context;
pub mod middleware;
