use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fieldops_core::{
    ClientId, CountryId, OrderId, OrderItemId, PriceOptionId, ProductId, RegionId, StoreId, UserId,
};
use fieldops_parties::ClientSummary;

/// A line item ready to commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub price_option_id: Option<PriceOptionId>,
    pub price_option_name: Option<String>,
    /// Stores able to cover the full quantity, best first. The committer
    /// decrements the first one whose stock still covers the item.
    pub store_candidates: Vec<StoreId>,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    /// The tier could not be re-matched at assembly time; `unit_price` is zero.
    pub price_degraded: bool,
}

impl PreparedItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    pub fn fulfilling_store(&self) -> Option<StoreId> {
        self.store_candidates.first().copied()
    }
}

/// In-memory order header plus its prepared items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub client_id: ClientId,
    pub requested_by: UserId,
    pub region_id: RegionId,
    pub country_id: CountryId,
    pub comment: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub attachment_url: Option<String>,
    /// Sum of line totals, rounded once to 2 decimal places.
    pub total_amount: Decimal,
    pub items: Vec<PreparedItem>,
}

impl OrderDraft {
    pub fn degraded_items(&self) -> impl Iterator<Item = &PreparedItem> {
        self.items.iter().filter(|i| i.price_degraded)
    }
}

/// One committed line: which store was actually decremented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedLine {
    pub item_id: OrderItemId,
    pub product_id: ProductId,
    pub store_id: StoreId,
}

/// What the store hands back after a successful commit.
///
/// `lines` is in the same order as `OrderDraft::items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<CommittedLine>,
}

/// Id + display name of a related record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef<I> {
    pub id: I,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub id: OrderItemId,
    pub product: NamedRef<ProductId>,
    pub price_option: Option<NamedRef<PriceOptionId>>,
    pub store: NamedRef<StoreId>,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// Country-resolved cost at the time of sale.
    pub unit_cost: Decimal,
}

/// A committed order with its items, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub client: ClientSummary,
    pub requested_by: UserId,
    pub region_id: RegionId,
    pub country_id: CountryId,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub balance: Decimal,
    pub comment: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemRecord>,
}
