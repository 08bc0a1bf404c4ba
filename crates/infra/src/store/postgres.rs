//! Postgres-backed fulfillment store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database | `55P03` | `Transient` | `lock_timeout` elapsed waiting for a stock row |
//! | Database | `40P01` | `Transient` | Deadlock detected |
//! | Database | `40001` | `Transient` | Serialization failure |
//! | Database | `57014` | `Transient` | Statement cancelled (statement timeout) |
//! | Database | Any other | `Backend` | Constraint violations, bad SQL |
//! | PoolTimedOut | N/A | `Transient` | Connection pool exhausted |
//! | Io | N/A | `Transient` | Connection dropped |
//! | Other | N/A | `Backend` | Everything else |
//!
//! ## Stock decrement
//!
//! The allocator reads stock without locking. `commit_order` closes that gap
//! with `quantity = quantity - n WHERE quantity >= n`: the row lock taken by
//! the UPDATE serializes concurrent commits, and the predicate is re-checked
//! once the lock is held. Zero affected rows means the store was drained in
//! the meantime; the next ranked store is tried before giving up.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use fieldops_catalog::{Category, PriceOption, PriceValues, Product};
use fieldops_core::{
    CategoryId, ClientId, CountryId, OrderId, OrderItemId, PriceOptionId, ProductId, RegionId, StoreId,
    UserId,
};
use fieldops_inventory::{Store, StoreQuantity};
use fieldops_parties::Client;
use fieldops_sales::{
    CommitReceipt, CommittedLine, NamedRef, OrderDraft, OrderItemRecord, OrderRecord, PreparedItem,
    UnpaidOrder,
};

use super::r#trait::{FulfillmentStore, ProductStock, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_fulfillment.sql");

/// Postgres-backed fulfillment store.
///
/// The pool is owned by the caller (constructed and closed by the binary);
/// this type only borrows connections from it.
#[derive(Debug, Clone)]
pub struct PostgresFulfillmentStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresFulfillmentStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Apply the bundled schema. Every statement is idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn load_price_options(&self, ids: &[i64]) -> Result<Vec<PriceOption>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT po.id, po.name, po.value, c.id AS category_id, c.name AS category_name
            FROM price_options po
            JOIN categories c ON c.id = po.category_id
            WHERE po.id = ANY($1)
            ORDER BY po.id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_price_options", e))?;

        let overrides = sqlx::query(
            r#"
            SELECT price_option_id AS owner_id, country_id, value
            FROM price_option_country_values
            WHERE price_option_id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_price_option_overrides", e))?;
        let mut overrides = group_overrides(&overrides)?;

        rows.iter()
            .map(|row| {
                let id: i64 = get(row, "id")?;
                let mut values = PriceValues::new(get(row, "value")?);
                values.by_country = overrides.remove(&id).unwrap_or_default().into_iter().collect();
                Ok(PriceOption {
                    id: PriceOptionId::from_db(id),
                    name: get(row, "name")?,
                    category: Category {
                        id: CategoryId::from_db(get(row, "category_id")?),
                        name: get(row, "category_name")?,
                    },
                    values,
                })
            })
            .collect()
    }

    async fn decrement_first_covering(
        tx: &mut Transaction<'_, Postgres>,
        item: &PreparedItem,
    ) -> Result<StoreId, StoreError> {
        for store_id in &item.store_candidates {
            let result = sqlx::query(
                r#"
                UPDATE store_quantities
                SET quantity = quantity - $1
                WHERE store_id = $2 AND product_id = $3 AND quantity >= $1
                "#,
            )
            .bind(item.quantity)
            .bind(store_id.get())
            .bind(item.product_id.get())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("decrement_stock", e))?;

            if result.rows_affected() == 1 {
                return Ok(*store_id);
            }
            tracing::debug!(
                store_id = %store_id,
                product_id = %item.product_id,
                "store no longer covers the item, trying next candidate"
            );
        }

        Err(StoreError::StockConflict {
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            requested: item.quantity,
        })
    }
}

#[async_trait]
impl FulfillmentStore for PostgresFulfillmentStore {
    #[instrument(skip(self), fields(client_id = %id), err)]
    async fn find_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, balance, region_id, country_id
            FROM clients
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_client", e))?;

        row.map(|row| {
            Ok(Client {
                id: ClientId::from_db(get(&row, "id")?),
                name: get(&row, "name")?,
                balance: get(&row, "balance")?,
                region_id: get::<Option<i64>>(&row, "region_id")?.map(RegionId::from_db),
                country_id: get::<Option<i64>>(&row, "country_id")?.map(CountryId::from_db),
            })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(client_id = %client_id), err)]
    async fn oldest_unpaid_order(&self, client_id: ClientId) -> Result<Option<UnpaidOrder>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, created_at, balance
            FROM orders
            WHERE client_id = $1 AND balance > 0
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(client_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("oldest_unpaid_order", e))?;

        row.map(|row| {
            Ok(UnpaidOrder {
                order_id: OrderId::from_db(get(&row, "id")?),
                created_at: get(&row, "created_at")?,
                balance: get(&row, "balance")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(client_id = %client_id), err)]
    async fn outstanding_balance(&self, client_id: ClientId) -> Result<Decimal, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(balance), 0) AS total
            FROM orders
            WHERE client_id = $1 AND balance > 0
            "#,
        )
        .bind(client_id.get())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("outstanding_balance", e))?;

        get(&row, "total")
    }

    #[instrument(skip(self), fields(price_option_id = %id), err)]
    async fn find_price_option(&self, id: PriceOptionId) -> Result<Option<PriceOption>, StoreError> {
        Ok(self.load_price_options(&[id.get()]).await?.into_iter().next())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn find_price_options(&self, ids: &[PriceOptionId]) -> Result<Vec<PriceOption>, StoreError> {
        let raw = ids.iter().map(|id| id.get()).collect::<Vec<_>>();
        self.load_price_options(&raw).await
    }

    #[instrument(skip(self), fields(product_id = %id, stock_records), err)]
    async fn find_product_with_stock(&self, id: ProductId) -> Result<Option<ProductStock>, StoreError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT p.id, p.name, p.cost, c.id AS category_id, c.name AS category_name
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE p.id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_product", e))?
        else {
            return Ok(None);
        };

        let cost_overrides = sqlx::query(
            r#"
            SELECT product_id AS owner_id, country_id, cost AS value
            FROM product_country_costs
            WHERE product_id = $1
            "#,
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_product_costs", e))?;

        let mut unit_cost = PriceValues::new(get(&row, "cost")?);
        unit_cost.by_country = group_overrides(&cost_overrides)?
            .remove(&id.get())
            .unwrap_or_default()
            .into_iter()
            .collect();

        let product = Product {
            id,
            name: get(&row, "name")?,
            category: Category {
                id: CategoryId::from_db(get(&row, "category_id")?),
                name: get(&row, "category_name")?,
            },
            unit_cost,
        };

        let stock_rows = sqlx::query(
            r#"
            SELECT s.id, s.name, s.region_id, s.country_id, s.is_active, sq.quantity
            FROM store_quantities sq
            JOIN stores s ON s.id = sq.store_id
            WHERE sq.product_id = $1
            ORDER BY s.id
            "#,
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_product_stock", e))?;

        let stock = stock_rows
            .iter()
            .map(|row| {
                Ok(StoreQuantity {
                    store: Store {
                        id: StoreId::from_db(get(row, "id")?),
                        name: get(row, "name")?,
                        region_id: get::<Option<i64>>(row, "region_id")?.map(RegionId::from_db),
                        country_id: CountryId::from_db(get(row, "country_id")?),
                        active: get(row, "is_active")?,
                    },
                    quantity: get(row, "quantity")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Span::current().record("stock_records", stock.len());
        Ok(Some(ProductStock { product, stock }))
    }

    #[instrument(
        skip(self, draft),
        fields(
            client_id = %draft.client_id,
            item_count = draft.items.len(),
            total_amount = %draft.total_amount,
            order_id
        ),
        err
    )]
    async fn commit_order(&self, draft: &OrderDraft) -> Result<CommitReceipt, StoreError> {
        let span = Span::current();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // SET does not take bind parameters; the value is an integer we format.
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        let header = sqlx::query(
            r#"
            INSERT INTO orders (
                client_id,
                requested_by,
                region_id,
                country_id,
                total_amount,
                amount_paid,
                balance,
                comment,
                customer_name,
                customer_phone,
                attachment_url
            )
            VALUES ($1, $2, $3, $4, $5, 0, $5, $6, $7, $8, $9)
            RETURNING id, created_at
            "#,
        )
        .bind(draft.client_id.get())
        .bind(draft.requested_by.get())
        .bind(draft.region_id.get())
        .bind(draft.country_id.get())
        .bind(draft.total_amount)
        .bind(&draft.comment)
        .bind(&draft.customer_name)
        .bind(&draft.customer_phone)
        .bind(&draft.attachment_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        let order_id = OrderId::from_db(get(&header, "id")?);
        let created_at: DateTime<Utc> = get(&header, "created_at")?;
        span.record("order_id", order_id.get());

        let mut lines = Vec::with_capacity(draft.items.len());
        for item in &draft.items {
            let store_id = match Self::decrement_first_covering(&mut tx, item).await {
                Ok(store_id) => store_id,
                Err(err) => {
                    tx.rollback()
                        .await
                        .map_err(|e| map_sqlx_error("rollback", e))?;
                    return Err(err);
                }
            };

            let row = sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id,
                    product_id,
                    price_option_id,
                    store_id,
                    quantity,
                    unit_price,
                    unit_cost
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(order_id.get())
            .bind(item.product_id.get())
            .bind(item.price_option_id.map(|id| id.get()))
            .bind(store_id.get())
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.unit_cost)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;

            lines.push(CommittedLine {
                item_id: OrderItemId::from_db(get(&row, "id")?),
                product_id: item.product_id,
                store_id,
            });
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(CommitReceipt {
            order_id,
            created_at,
            lines,
        })
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn find_order(&self, id: OrderId) -> Result<Option<OrderRecord>, StoreError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT
                o.id,
                o.requested_by,
                o.region_id,
                o.country_id,
                o.total_amount,
                o.amount_paid,
                o.balance,
                o.comment,
                o.customer_name,
                o.customer_phone,
                o.attachment_url,
                o.created_at,
                c.id AS client_id,
                c.name AS client_name,
                c.balance AS client_balance,
                c.region_id AS client_region_id,
                c.country_id AS client_country_id
            FROM orders o
            JOIN clients c ON c.id = o.client_id
            WHERE o.id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_order", e))?
        else {
            return Ok(None);
        };

        let item_rows = sqlx::query(
            r#"
            SELECT
                oi.id,
                oi.quantity,
                oi.unit_price,
                oi.unit_cost,
                p.id AS product_id,
                p.name AS product_name,
                po.id AS price_option_id,
                po.name AS price_option_name,
                s.id AS store_id,
                s.name AS store_name
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            JOIN stores s ON s.id = oi.store_id
            LEFT JOIN price_options po ON po.id = oi.price_option_id
            WHERE oi.order_id = $1
            ORDER BY oi.id
            "#,
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_order_items", e))?;

        let items = item_rows
            .iter()
            .map(|row| {
                let price_option = match get::<Option<i64>>(row, "price_option_id")? {
                    Some(po) => Some(NamedRef {
                        id: PriceOptionId::from_db(po),
                        name: get(row, "price_option_name")?,
                    }),
                    None => None,
                };
                Ok(OrderItemRecord {
                    id: OrderItemId::from_db(get(row, "id")?),
                    product: NamedRef {
                        id: ProductId::from_db(get(row, "product_id")?),
                        name: get(row, "product_name")?,
                    },
                    price_option,
                    store: NamedRef {
                        id: StoreId::from_db(get(row, "store_id")?),
                        name: get(row, "store_name")?,
                    },
                    quantity: get(row, "quantity")?,
                    unit_price: get(row, "unit_price")?,
                    unit_cost: get(row, "unit_cost")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let client = Client {
            id: ClientId::from_db(get(&row, "client_id")?),
            name: get(&row, "client_name")?,
            balance: get(&row, "client_balance")?,
            region_id: get::<Option<i64>>(&row, "client_region_id")?.map(RegionId::from_db),
            country_id: get::<Option<i64>>(&row, "client_country_id")?.map(CountryId::from_db),
        };

        Ok(Some(OrderRecord {
            id,
            client: client.summary(),
            requested_by: UserId::from_db(get(&row, "requested_by")?),
            region_id: RegionId::from_db(get(&row, "region_id")?),
            country_id: CountryId::from_db(get(&row, "country_id")?),
            total_amount: get(&row, "total_amount")?,
            amount_paid: get(&row, "amount_paid")?,
            balance: get(&row, "balance")?,
            comment: get(&row, "comment")?,
            customer_name: get(&row, "customer_name")?,
            customer_phone: get(&row, "customer_phone")?,
            attachment_url: get(&row, "attachment_url")?,
            created_at: get(&row, "created_at")?,
            items,
        }))
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("failed to read column '{}': {}", column, e)))
}

/// `owner_id, country_id, value` rows grouped by owner.
fn group_overrides(rows: &[PgRow]) -> Result<HashMap<i64, Vec<(CountryId, Decimal)>>, StoreError> {
    let mut grouped: HashMap<i64, Vec<(CountryId, Decimal)>> = HashMap::new();
    for row in rows {
        grouped
            .entry(get(row, "owner_id")?)
            .or_default()
            .push((CountryId::from_db(get(row, "country_id")?), get(row, "value")?));
    }
    Ok(grouped)
}

/// Map a sqlx error to `StoreError`, classifying what may be retried.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("55P03" | "40P01" | "40001" | "57014") => StoreError::Transient(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Transient(format!("connection pool exhausted in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Transient(format!("connection lost in {}: {}", operation, e)),
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_transient() {
        assert!(map_sqlx_error("commit", sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn dropped_connection_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(map_sqlx_error("commit", sqlx::Error::Io(io)).is_transient());
    }

    #[test]
    fn closed_pool_and_missing_rows_are_not_retried() {
        assert!(!map_sqlx_error("commit", sqlx::Error::PoolClosed).is_transient());
        assert!(!map_sqlx_error("commit", sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn bundled_schema_creates_every_table() {
        for table in [
            "categories",
            "price_options",
            "products",
            "stores",
            "store_quantities",
            "clients",
            "orders",
            "order_items",
        ] {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table} ")),
                "missing table {table}"
            );
        }
    }
}
