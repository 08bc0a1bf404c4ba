use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use fieldops_catalog::{PriceOption, Product};
use fieldops_core::{ClientId, OrderId, OrderItemId, PriceOptionId, ProductId, StoreId};
use fieldops_inventory::{Store, StoreQuantity};
use fieldops_parties::Client;
use fieldops_sales::{
    CommitReceipt, CommittedLine, NamedRef, OrderDraft, OrderItemRecord, OrderRecord, UnpaidOrder,
};

use super::r#trait::{FulfillmentStore, ProductStock, StoreError};

#[derive(Debug, Clone)]
struct StoredOrder {
    draft: OrderDraft,
    amount_paid: Decimal,
    created_at: DateTime<Utc>,
    items: Vec<StoredItem>,
}

impl StoredOrder {
    fn balance(&self) -> Decimal {
        self.draft.total_amount - self.amount_paid
    }
}

#[derive(Debug, Clone)]
struct StoredItem {
    id: OrderItemId,
    product_id: ProductId,
    price_option_id: Option<PriceOptionId>,
    store_id: StoreId,
    quantity: i64,
    unit_price: Decimal,
    unit_cost: Decimal,
}

#[derive(Debug, Default)]
struct State {
    clients: HashMap<ClientId, Client>,
    price_options: HashMap<PriceOptionId, PriceOption>,
    products: HashMap<ProductId, Product>,
    stores: HashMap<StoreId, Store>,
    quantities: HashMap<(StoreId, ProductId), Option<i64>>,
    orders: Vec<(OrderId, StoredOrder)>,
    next_order_id: i64,
    next_item_id: i64,
}

impl State {
    fn next_order_id(&mut self) -> OrderId {
        self.next_order_id += 1;
        OrderId::from_db(self.next_order_id)
    }

    fn next_item_id(&mut self) -> OrderItemId {
        self.next_item_id += 1;
        OrderItemId::from_db(self.next_item_id)
    }

    fn unpaid_orders(&self, client_id: ClientId) -> impl Iterator<Item = &(OrderId, StoredOrder)> {
        self.orders
            .iter()
            .filter(move |(_, o)| o.draft.client_id == client_id && o.balance() > Decimal::ZERO)
    }
}

/// In-memory fulfillment store.
///
/// Intended for tests/dev. A commit runs entirely under the write lock, so two
/// concurrent commits against the same stock row are serialized just like the
/// Postgres row lock serializes them.
#[derive(Debug, Default)]
pub struct InMemoryFulfillmentStore {
    state: RwLock<State>,
}

impl InMemoryFulfillmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_client(&self, client: Client) {
        self.write().clients.insert(client.id, client);
    }

    pub fn insert_price_option(&self, option: PriceOption) {
        self.write().price_options.insert(option.id, option);
    }

    pub fn insert_product(&self, product: Product) {
        self.write().products.insert(product.id, product);
    }

    pub fn insert_store(&self, store: Store) {
        self.write().stores.insert(store.id, store);
    }

    /// Set (or clear, with `None`) the on-hand quantity of a product at a store.
    pub fn set_stock(&self, store_id: StoreId, product_id: ProductId, quantity: Option<i64>) {
        self.write().quantities.insert((store_id, product_id), quantity);
    }

    pub fn stock_of(&self, store_id: StoreId, product_id: ProductId) -> Option<i64> {
        self.read().quantities.get(&(store_id, product_id)).copied().flatten()
    }

    pub fn order_count(&self) -> usize {
        self.read().orders.len()
    }

    /// Record a historical order header (no items) with a remaining balance.
    pub fn insert_historical_order(
        &self,
        draft: OrderDraft,
        amount_paid: Decimal,
        created_at: DateTime<Utc>,
    ) -> OrderId {
        let mut state = self.write();
        let id = state.next_order_id();
        state.orders.push((
            id,
            StoredOrder {
                draft,
                amount_paid,
                created_at,
                items: Vec::new(),
            },
        ));
        id
    }
}

#[async_trait]
impl FulfillmentStore for InMemoryFulfillmentStore {
    async fn find_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.read().clients.get(&id).cloned())
    }

    async fn oldest_unpaid_order(&self, client_id: ClientId) -> Result<Option<UnpaidOrder>, StoreError> {
        let state = self.read();
        let oldest = state
            .unpaid_orders(client_id)
            .min_by_key(|(id, o)| (o.created_at, *id))
            .map(|(id, o)| UnpaidOrder {
                order_id: *id,
                created_at: o.created_at,
                balance: o.balance(),
            });
        Ok(oldest)
    }

    async fn outstanding_balance(&self, client_id: ClientId) -> Result<Decimal, StoreError> {
        Ok(self.read().unpaid_orders(client_id).map(|(_, o)| o.balance()).sum())
    }

    async fn find_price_option(&self, id: PriceOptionId) -> Result<Option<PriceOption>, StoreError> {
        Ok(self.read().price_options.get(&id).cloned())
    }

    async fn find_price_options(&self, ids: &[PriceOptionId]) -> Result<Vec<PriceOption>, StoreError> {
        let state = self.read();
        Ok(ids.iter().filter_map(|id| state.price_options.get(id).cloned()).collect())
    }

    async fn find_product_with_stock(&self, id: ProductId) -> Result<Option<ProductStock>, StoreError> {
        let state = self.read();
        let Some(product) = state.products.get(&id).cloned() else {
            return Ok(None);
        };

        let mut stock = state
            .quantities
            .iter()
            .filter(|((_, product_id), _)| *product_id == id)
            .map(|((store_id, _), quantity)| {
                let store = state
                    .stores
                    .get(store_id)
                    .cloned()
                    .ok_or_else(|| StoreError::Corrupt(format!("stock row references unknown store {store_id}")))?;
                Ok(StoreQuantity {
                    store,
                    quantity: *quantity,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        stock.sort_by_key(|s| s.store.id);

        Ok(Some(ProductStock { product, stock }))
    }

    async fn commit_order(&self, draft: &OrderDraft) -> Result<CommitReceipt, StoreError> {
        let mut state = self.write();

        // Decrement a scratch copy; it replaces the live quantities only once
        // every item found a store.
        let mut quantities = state.quantities.clone();
        let mut chosen = Vec::with_capacity(draft.items.len());
        for item in &draft.items {
            let store_id = item
                .store_candidates
                .iter()
                .copied()
                .find(|store_id| {
                    match quantities.get_mut(&(*store_id, item.product_id)) {
                        Some(Some(on_hand)) if *on_hand >= item.quantity => {
                            *on_hand -= item.quantity;
                            true
                        }
                        _ => false,
                    }
                })
                .ok_or_else(|| StoreError::StockConflict {
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    requested: item.quantity,
                })?;
            chosen.push(store_id);
        }
        state.quantities = quantities;

        let order_id = state.next_order_id();
        let created_at = Utc::now();
        let mut items = Vec::with_capacity(draft.items.len());
        let mut lines = Vec::with_capacity(draft.items.len());
        for (item, store_id) in draft.items.iter().zip(chosen) {
            let id = state.next_item_id();
            items.push(StoredItem {
                id,
                product_id: item.product_id,
                price_option_id: item.price_option_id,
                store_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                unit_cost: item.unit_cost,
            });
            lines.push(CommittedLine {
                item_id: id,
                product_id: item.product_id,
                store_id,
            });
        }

        state.orders.push((
            order_id,
            StoredOrder {
                draft: draft.clone(),
                amount_paid: Decimal::ZERO,
                created_at,
                items,
            },
        ));

        Ok(CommitReceipt {
            order_id,
            created_at,
            lines,
        })
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<OrderRecord>, StoreError> {
        let state = self.read();
        let Some((_, order)) = state.orders.iter().find(|(order_id, _)| *order_id == id) else {
            return Ok(None);
        };

        let client = state
            .clients
            .get(&order.draft.client_id)
            .ok_or_else(|| StoreError::Corrupt(format!("order {id} references unknown client")))?;

        let items = order
            .items
            .iter()
            .map(|item| {
                let product = state
                    .products
                    .get(&item.product_id)
                    .ok_or_else(|| StoreError::Corrupt(format!("order item {} references unknown product", item.id)))?;
                let store = state
                    .stores
                    .get(&item.store_id)
                    .ok_or_else(|| StoreError::Corrupt(format!("order item {} references unknown store", item.id)))?;
                let price_option = item
                    .price_option_id
                    .and_then(|po| state.price_options.get(&po))
                    .map(|po| NamedRef {
                        id: po.id,
                        name: po.name.clone(),
                    });
                Ok(OrderItemRecord {
                    id: item.id,
                    product: NamedRef {
                        id: product.id,
                        name: product.name.clone(),
                    },
                    price_option,
                    store: NamedRef {
                        id: store.id,
                        name: store.name.clone(),
                    },
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    unit_cost: item.unit_cost,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let draft = &order.draft;
        Ok(Some(OrderRecord {
            id,
            client: client.summary(),
            requested_by: draft.requested_by,
            region_id: draft.region_id,
            country_id: draft.country_id,
            total_amount: draft.total_amount,
            amount_paid: order.amount_paid,
            balance: order.balance(),
            comment: draft.comment.clone(),
            customer_name: draft.customer_name.clone(),
            customer_phone: draft.customer_phone.clone(),
            attachment_url: draft.attachment_url.clone(),
            created_at: order.created_at,
            items,
        }))
    }
}
