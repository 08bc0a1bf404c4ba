use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fieldops_core::{
    ClientId, CountryId, DomainError, OrderId, OrderItemId, PriceOptionId, ProductId, RegionId, UserId,
};
use fieldops_infra::{CreatedOrder, DegradedPriceItem, InlineAttachment, OrderLineRequest, Requester};
use fieldops_sales::{BalanceBlock, NamedRef, OrderItemRecord, OrderRecord};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub client_id: i64,
    pub region_id: Option<i64>,
    pub country_id: Option<i64>,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    pub comment: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub attachment_url: Option<String>,
    pub attachment: Option<AttachmentRequest>,
    #[serde(default)]
    pub acknowledge_outstanding_balance: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub price_option_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRequest {
    pub file_name: String,
    /// Base64-encoded bytes.
    pub content: String,
}

impl CreateOrderRequest {
    /// Validate identifiers and map to the service request.
    pub fn into_service_request(self, requester: Requester) -> Result<fieldops_infra::CreateOrderRequest, DomainError> {
        let items = self
            .items
            .into_iter()
            .map(|item| {
                Ok(OrderLineRequest {
                    product_id: ProductId::new(item.product_id)?,
                    quantity: item.quantity,
                    price_option_id: PriceOptionId::new(item.price_option_id)?,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(fieldops_infra::CreateOrderRequest {
            requester,
            client_id: ClientId::new(self.client_id)?,
            region_id: self.region_id.map(RegionId::new).transpose()?,
            country_id: self.country_id.map(CountryId::new).transpose()?,
            items,
            comment: non_blank(self.comment),
            customer_name: non_blank(self.customer_name),
            customer_phone: non_blank(self.customer_phone),
            attachment_url: non_blank(self.attachment_url),
            attachment: self.attachment.map(|a| InlineAttachment {
                file_name: a.file_name,
                content: a.content,
            }),
            acknowledge_outstanding_balance: self.acknowledge_outstanding_balance,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrderResponse {
    pub success: bool,
    pub order: OrderResponse,
    pub degraded_price_items: Vec<DegradedPriceItemResponse>,
}

impl From<CreatedOrder> for CreatedOrderResponse {
    fn from(created: CreatedOrder) -> Self {
        Self {
            success: true,
            order: created.order.into(),
            degraded_price_items: created.degraded_price_items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradedPriceItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub price_option_id: Option<PriceOptionId>,
}

impl From<DegradedPriceItem> for DegradedPriceItemResponse {
    fn from(d: DegradedPriceItem) -> Self {
        Self {
            product_id: d.product_id,
            product_name: d.product_name,
            price_option_id: d.price_option_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Named<I> {
    pub id: I,
    pub name: String,
}

impl<I> From<NamedRef<I>> for Named<I> {
    fn from(r: NamedRef<I>) -> Self {
        Self { id: r.id, name: r.name }
    }
}

#[derive(Debug, Serialize)]
pub struct ClientResponse {
    pub id: ClientId,
    pub name: String,
    pub balance: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct RequesterResponse {
    pub id: UserId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub client: ClientResponse,
    pub requester: RequesterResponse,
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
    pub items: Vec<OrderItemResponse>,
}

impl From<OrderRecord> for OrderResponse {
    fn from(o: OrderRecord) -> Self {
        Self {
            id: o.id,
            client: ClientResponse {
                id: o.client.id,
                name: o.client.name,
                balance: o.client.balance,
            },
            requester: RequesterResponse { id: o.requested_by },
            region_id: o.region_id,
            country_id: o.country_id,
            total_amount: o.total_amount,
            amount_paid: o.amount_paid,
            balance: o.balance,
            comment: o.comment,
            customer_name: o.customer_name,
            customer_phone: o.customer_phone,
            attachment_url: o.attachment_url,
            created_at: o.created_at,
            items: o.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: OrderItemId,
    pub product: Named<ProductId>,
    pub price_option: Option<Named<PriceOptionId>>,
    pub store: Named<fieldops_core::StoreId>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
}

impl From<OrderItemRecord> for OrderItemResponse {
    fn from(i: OrderItemRecord) -> Self {
        Self {
            id: i.id,
            product: i.product.into(),
            price_option: i.price_option.map(Into::into),
            store: i.store.into(),
            quantity: i.quantity,
            unit_price: i.unit_price,
            unit_cost: i.unit_cost,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEnvelope {
    pub success: bool,
    pub order: OrderResponse,
}

/// "Confirm or settle first" payload. Returned with 200, not as an error.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceBlockedResponse {
    pub success: bool,
    pub has_outstanding_balance: bool,
    pub balance_age: i64,
    pub total_outstanding_balance: Decimal,
    pub oldest_unpaid_order: UnpaidOrderResponse,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpaidOrderResponse {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub balance: Decimal,
}

impl From<BalanceBlock> for BalanceBlockedResponse {
    fn from(block: BalanceBlock) -> Self {
        let message = format!(
            "Client has an outstanding balance of {} with the oldest unpaid order placed {} days ago. \
             Settle the balance or confirm to place the order anyway.",
            block.total_outstanding, block.balance_age_days
        );
        Self {
            success: true,
            has_outstanding_balance: true,
            balance_age: block.balance_age_days,
            total_outstanding_balance: block.total_outstanding,
            oldest_unpaid_order: UnpaidOrderResponse {
                id: block.oldest_unpaid.order_id,
                created_at: block.oldest_unpaid.created_at,
                balance: block.oldest_unpaid.balance,
            },
            message,
        }
    }
}
