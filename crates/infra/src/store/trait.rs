use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use fieldops_catalog::{PriceOption, Product};
use fieldops_core::{ClientId, OrderId, PriceOptionId, ProductId};
use fieldops_inventory::StoreQuantity;
use fieldops_parties::Client;
use fieldops_sales::{CommitReceipt, OrderDraft, OrderRecord, UnpaidOrder};

/// A product together with every per-store stock record it has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStock {
    pub product: Product,
    pub stock: Vec<StoreQuantity>,
}

/// Storage failures.
///
/// `is_transient` decides what the retry wrapper may try again. Everything
/// else is surfaced on the first occurrence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Every ranked store for a line item was drained by a concurrent order.
    #[error(
        "Stock for '{product_name}' was taken by another order: no store can still cover {requested}"
    )]
    StockConflict {
        product_id: ProductId,
        product_name: String,
        requested: i64,
    },

    /// Lock wait timeout, deadlock, serialization failure, pool exhaustion,
    /// dropped connection.
    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("transaction timed out after {0:?}")]
    TransactionTimeout(Duration),

    #[error("storage failure: {0}")]
    Backend(String),

    /// A row could not be mapped to a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_) | StoreError::TransactionTimeout(_))
    }
}

/// Everything the fulfillment pipeline reads and writes.
///
/// `commit_order` is the only mutating call: the header, its items and the
/// stock decrements are written atomically, or nothing is.
#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    async fn find_client(&self, id: ClientId) -> Result<Option<Client>, StoreError>;

    /// Oldest order of the client with a strictly positive remaining balance.
    async fn oldest_unpaid_order(&self, client_id: ClientId) -> Result<Option<UnpaidOrder>, StoreError>;

    /// Sum of positive remaining balances across the client's orders.
    async fn outstanding_balance(&self, client_id: ClientId) -> Result<Decimal, StoreError>;

    async fn find_price_option(&self, id: PriceOptionId) -> Result<Option<PriceOption>, StoreError>;

    /// Batch lookup; ids that do not exist are simply absent from the result.
    async fn find_price_options(&self, ids: &[PriceOptionId]) -> Result<Vec<PriceOption>, StoreError>;

    async fn find_product_with_stock(&self, id: ProductId) -> Result<Option<ProductStock>, StoreError>;

    async fn commit_order(&self, draft: &OrderDraft) -> Result<CommitReceipt, StoreError>;

    async fn find_order(&self, id: OrderId) -> Result<Option<OrderRecord>, StoreError>;
}
