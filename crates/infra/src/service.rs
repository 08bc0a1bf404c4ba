//! Order fulfillment pipeline.
//!
//! ```text
//! request validation
//!   → balance gate (may hold the order back)
//!   → per line: price tier → product + stock → category check → allocation
//!   → batch tier re-lookup → assembly
//!   → attachment hand-off
//!   → transactional commit (timeout + retry)
//!   → read-back
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use fieldops_catalog::{CatalogError, CurrencyResolver, ensure_same_category};
use fieldops_core::{
    ClientId, CountryId, DomainError, OrderId, PriceOptionId, ProductId, RegionId, StoreId, UserId,
};
use fieldops_inventory::{
    AllocationError, AllocationRequest, SourcingContext, SourcingPolicyTable, allocate, remaining_after,
};
use fieldops_sales::{
    BalanceBlock, BalanceGate, BalanceGateDecision, OrderHeaderInput, OrderRecord, ResolvedLine, assemble,
};

use crate::attachments::{AttachmentError, AttachmentStore, InlineAttachment};
use crate::committer::TransactionalCommitter;
use crate::config::FulfillmentConfig;
use crate::store::{FulfillmentStore, StoreError};

/// The authenticated field user placing the order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
    pub region_id: RegionId,
    pub country_id: CountryId,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price_option_id: PriceOptionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrderRequest {
    pub requester: Requester,
    pub client_id: ClientId,
    /// Defaults to the requester's region.
    pub region_id: Option<RegionId>,
    /// Defaults to the requester's country.
    pub country_id: Option<CountryId>,
    pub items: Vec<OrderLineRequest>,
    pub comment: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub attachment_url: Option<String>,
    pub attachment: Option<InlineAttachment>,
    /// The user saw the outstanding-balance warning and confirmed anyway.
    pub acknowledge_outstanding_balance: bool,
}

/// A line whose price tier could not be re-matched; it was priced at zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedPriceItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub price_option_id: Option<PriceOptionId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub order: OrderRecord,
    pub degraded_price_items: Vec<DegradedPriceItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    Created(Box<CreatedOrder>),
    /// Not an error: the caller shows a "confirm or settle first" prompt.
    BalanceBlocked(BalanceBlock),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("Client {0} not found")]
    ClientNotFound(ClientId),

    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Price option {0} not found")]
    PriceOptionNotFound(PriceOptionId),

    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error(transparent)]
    CategoryMismatch(#[from] CatalogError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Another order took the stock between allocation and commit.
    #[error("{0}")]
    StockConflict(StoreError),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StockConflict { .. } => FulfillmentError::StockConflict(err),
            other => FulfillmentError::Store(other),
        }
    }
}

pub struct OrderFulfillmentService {
    store: Arc<dyn FulfillmentStore>,
    /// `None` when no durable attachment store is configured.
    attachments: Option<Arc<dyn AttachmentStore>>,
    resolver: Arc<dyn CurrencyResolver>,
    committer: TransactionalCommitter,
    gate: BalanceGate,
    policies: SourcingPolicyTable,
}

impl OrderFulfillmentService {
    pub fn new(
        store: Arc<dyn FulfillmentStore>,
        attachments: Option<Arc<dyn AttachmentStore>>,
        resolver: Arc<dyn CurrencyResolver>,
        config: &FulfillmentConfig,
    ) -> Self {
        Self {
            committer: TransactionalCommitter::new(store.clone(), config.retry.clone(), config.transaction_timeout),
            store,
            attachments,
            resolver,
            gate: BalanceGate::new(config.balance_age_threshold_days),
            policies: config.sourcing_policies(),
        }
    }

    #[instrument(
        skip(self, request),
        fields(
            client_id = %request.client_id,
            user_id = %request.requester.user_id,
            line_count = request.items.len()
        ),
        err
    )]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderOutcome, FulfillmentError> {
        let attachment_bytes = validate(&request)?;
        if attachment_bytes.is_some() && self.attachments.is_none() {
            return Err(DomainError::validation(
                "inline attachments are not accepted by this deployment; send an attachment URL instead",
            )
            .into());
        }

        let client = self
            .store
            .find_client(request.client_id)
            .await?
            .ok_or(FulfillmentError::ClientNotFound(request.client_id))?;

        if let BalanceGateDecision::Blocked(block) = self.check_balance(client.id).await? {
            if !request.acknowledge_outstanding_balance {
                info!(
                    client_id = %client.id,
                    balance_age_days = block.balance_age_days,
                    total_outstanding = %block.total_outstanding,
                    oldest_order_id = %block.oldest_unpaid.order_id,
                    "order held back by outstanding balance"
                );
                return Ok(OrderOutcome::BalanceBlocked(block));
            }
            info!(
                client_id = %client.id,
                balance_age_days = block.balance_age_days,
                "outstanding balance acknowledged by requester"
            );
        }

        let requester = request.requester;
        // Sourcing always follows the authenticated user; body overrides only label the header.
        let ctx = SourcingContext {
            region_id: requester.region_id,
            country_id: requester.country_id,
        };
        let policy = self.policies.policy_for(ctx.country_id);

        // Quantities already promised to earlier lines of this order, per product and store.
        let mut claimed: HashMap<ProductId, HashMap<StoreId, i64>> = HashMap::new();
        let mut lines = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let price_option = self
                .store
                .find_price_option(line.price_option_id)
                .await?
                .ok_or(FulfillmentError::PriceOptionNotFound(line.price_option_id))?;
            let product_stock = self
                .store
                .find_product_with_stock(line.product_id)
                .await?
                .ok_or(FulfillmentError::ProductNotFound(line.product_id))?;
            ensure_same_category(&product_stock.product, &price_option)?;

            let allocation = allocate(
                &AllocationRequest {
                    product_id: product_stock.product.id,
                    product_name: product_stock.product.name.clone(),
                    quantity: line.quantity,
                },
                &remaining_after(&product_stock.stock, claimed.get(&product_stock.product.id)),
                &ctx,
                policy,
            )?;
            *claimed
                .entry(product_stock.product.id)
                .or_default()
                .entry(allocation.fulfilling_store())
                .or_default() += line.quantity;

            lines.push(ResolvedLine {
                product: product_stock.product,
                price_option_id: line.price_option_id,
                quantity: line.quantity,
                allocation,
            });
        }

        let tier_ids = request.items.iter().map(|l| l.price_option_id).collect::<Vec<_>>();
        let tiers = self
            .store
            .find_price_options(&tier_ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect::<HashMap<_, _>>();

        let attachment_url = match (&request.attachment, attachment_bytes) {
            (Some(a), Some(bytes)) => match &self.attachments {
                Some(store) => Some(store.store(&a.file_name, bytes).await?),
                None => None,
            },
            _ => request.attachment_url.clone(),
        };

        let header = OrderHeaderInput {
            client_id: client.id,
            requested_by: requester.user_id,
            region_id: request.region_id.unwrap_or(requester.region_id),
            country_id: request.country_id.unwrap_or(requester.country_id),
            comment: request.comment,
            customer_name: request.customer_name,
            customer_phone: request.customer_phone,
            attachment_url,
        };
        let draft = assemble(header, lines, &tiers, self.resolver.as_ref())?;

        let degraded_price_items = draft
            .degraded_items()
            .map(|item| {
                warn!(
                    product_id = %item.product_id,
                    price_option_id = ?item.price_option_id,
                    "price tier could not be re-matched, line priced at zero"
                );
                DegradedPriceItem {
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    price_option_id: item.price_option_id,
                }
            })
            .collect::<Vec<_>>();

        let receipt = self.committer.commit(&draft).await?;

        let order = self
            .store
            .find_order(receipt.order_id)
            .await?
            .ok_or_else(|| {
                FulfillmentError::Store(StoreError::Backend(format!(
                    "order {} missing right after commit",
                    receipt.order_id
                )))
            })?;

        info!(
            order_id = %order.id,
            item_count = order.items.len(),
            total_amount = %order.total_amount,
            "order committed"
        );

        Ok(OrderOutcome::Created(Box::new(CreatedOrder {
            order,
            degraded_price_items,
        })))
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn get_order(&self, id: OrderId) -> Result<OrderRecord, FulfillmentError> {
        self.store
            .find_order(id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(id))
    }

    async fn check_balance(&self, client_id: ClientId) -> Result<BalanceGateDecision, FulfillmentError> {
        let Some(oldest) = self.store.oldest_unpaid_order(client_id).await? else {
            return Ok(BalanceGateDecision::Clear);
        };
        let total = self.store.outstanding_balance(client_id).await?;
        Ok(self.gate.evaluate(Some(&oldest), total, Utc::now()))
    }
}

/// Checks that need no storage. Returns the decoded inline attachment, if any.
fn validate(request: &CreateOrderRequest) -> Result<Option<Vec<u8>>, DomainError> {
    if request.items.is_empty() {
        return Err(DomainError::validation("order must contain at least one item"));
    }
    if let Some(bad) = request.items.iter().find(|l| l.quantity <= 0) {
        return Err(DomainError::validation(format!(
            "quantity for product {} must be positive, got {}",
            bad.product_id, bad.quantity
        )));
    }
    match (&request.attachment, &request.attachment_url) {
        (Some(_), Some(_)) => Err(DomainError::validation(
            "send either an inline attachment or an attachment URL, not both",
        )),
        (Some(a), None) => a.decode().map(Some),
        (None, _) => Ok(None),
    }
}
