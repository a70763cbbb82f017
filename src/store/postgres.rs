//! PostgreSQL backend.
//!
//! Every statement uses bound parameters. Stock changes are conditional
//! updates (`stock + $1 >= 0`), and reads inside a transaction lock the
//! product row, so concurrent reservations serialize on the row.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{
    CategoryId, NewOrder, NewProduct, Order, OrderId, OrderItem, OrderItemId, OrderStatus, Product,
    ProductId, ProductPatch, ProductSnapshot, UserId,
};
use crate::store::{OrderStore, ProductStore, Storage, StoreError, StoreResult, StoreTransaction};

const SCHEMA: &str = include_str!("../../migrations/0001_create_tables.sql");

const FOREIGN_KEY_VIOLATION: &str = "23503";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, config: &PostgresConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(db_error("failed to connect"))?;
        info!(max_connections = config.max_connections, "PostgreSQL pool ready");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the tables if they do not exist yet.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(db_error("failed to run migrations"))?;
        info!("Schema up to date");
        Ok(())
    }

    async fn connection(&self) -> StoreResult<sqlx::pool::PoolConnection<Postgres>> {
        self.pool.acquire().await.map_err(db_error("failed to acquire connection"))
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn product(&self, id: ProductId) -> StoreResult<Product> {
        let mut conn = self.connection().await?;
        fetch_product(&mut conn, id, false).await
    }

    #[instrument(skip(self))]
    async fn adjust_stock(&self, id: ProductId, delta: i64) -> StoreResult<Product> {
        let mut conn = self.connection().await?;
        adjust_stock(&mut conn, id, delta).await
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        product.validate().map_err(StoreError::Validation)?;
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO products (id, name, description, price, stock, category_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING id, name, description, price, stock, category_id, created_at, updated_at",
        )
        .bind(Uuid::from(ProductId::new()))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.category_id.map(Uuid::from))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("failed to create product"))?;
        product_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> StoreResult<Product> {
        patch.validate().map_err(StoreError::Validation)?;
        let row = sqlx::query(
            "UPDATE products SET
                name = COALESCE($1, name),
                description = COALESCE($2, description),
                price = COALESCE($3, price),
                stock = COALESCE($4, stock),
                category_id = COALESCE($5, category_id),
                updated_at = $6
             WHERE id = $7
             RETURNING id, name, description, price, stock, category_id, created_at, updated_at",
        )
        .bind(patch.name)
        .bind(patch.description)
        .bind(patch.price)
        .bind(patch.stock)
        .bind(patch.category_id.map(Uuid::from))
        .bind(Utc::now())
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("failed to update product"))?
        .ok_or(StoreError::ProductNotFound(id))?;
        product_from_row(&row)
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(
            "SELECT id, name, description, price, stock, category_id, created_at, updated_at
             FROM products
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("failed to list products"))?;
        rows.iter().map(product_from_row).collect()
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[instrument(skip(self, order), fields(user_id = %order.user_id))]
    async fn create_with_items(&self, order: NewOrder) -> StoreResult<Order> {
        let mut tx = self.pool.begin().await.map_err(db_error("failed to begin transaction"))?;
        let created = insert_order(&mut tx, order).await?;
        tx.commit().await.map_err(db_error("failed to commit transaction"))?;
        Ok(created)
    }

    async fn order(&self, id: OrderId) -> StoreResult<Order> {
        let mut conn = self.connection().await?;
        fetch_order(&mut conn, id).await
    }

    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let mut conn = self.connection().await?;
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(Uuid::from(user_id))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error("failed to get orders"))?;
        fetch_orders(&mut conn, ids).await
    }

    async fn all_orders(&self) -> StoreResult<Vec<Order>> {
        let mut conn = self.connection().await?;
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM orders ORDER BY created_at DESC, id DESC")
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error("failed to get orders"))?;
        fetch_orders(&mut conn, ids).await
    }

    #[instrument(skip(self))]
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> StoreResult<Order> {
        let mut conn = self.connection().await?;
        set_order_status(&mut conn, id, status).await
    }
}

#[async_trait]
impl Storage for PostgresStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await.map_err(db_error("failed to begin transaction"))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// A sqlx transaction. Dropping it without commit rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn product(&mut self, id: ProductId) -> StoreResult<Product> {
        fetch_product(&mut self.tx, id, true).await
    }

    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> StoreResult<Product> {
        adjust_stock(&mut self.tx, id, delta).await
    }

    async fn order(&mut self, id: OrderId) -> StoreResult<Order> {
        lock_order(&mut self.tx, id).await?;
        fetch_order(&mut self.tx, id).await
    }

    async fn create_with_items(&mut self, order: NewOrder) -> StoreResult<Order> {
        insert_order(&mut self.tx, order).await
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> StoreResult<Order> {
        set_order_status(&mut self.tx, id, status).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(db_error("failed to commit transaction"))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await.map_err(db_error("failed to roll back transaction"))
    }
}

// =============================================================================
// Queries
// =============================================================================

async fn fetch_product(conn: &mut PgConnection, id: ProductId, for_update: bool) -> StoreResult<Product> {
    let sql = if for_update {
        "SELECT id, name, description, price, stock, category_id, created_at, updated_at
         FROM products WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT id, name, description, price, stock, category_id, created_at, updated_at
         FROM products WHERE id = $1"
    };
    let row = sqlx::query(sql)
        .bind(Uuid::from(id))
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("failed to get product"))?
        .ok_or(StoreError::ProductNotFound(id))?;
    product_from_row(&row)
}

async fn adjust_stock(conn: &mut PgConnection, id: ProductId, delta: i64) -> StoreResult<Product> {
    let row = sqlx::query(
        "UPDATE products SET stock = stock + $1, updated_at = $2
         WHERE id = $3 AND stock + $1 >= 0
         RETURNING id, name, description, price, stock, category_id, created_at, updated_at",
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(Uuid::from(id))
    .fetch_optional(&mut *conn)
    .await
    .map_err(|error| {
        if is_numeric_out_of_range(&error) {
            StoreError::Validation(format!("stock for product {id} would overflow"))
        } else {
            db_error("failed to update stock")(error)
        }
    })?;

    if let Some(row) = row {
        return product_from_row(&row);
    }

    // Nothing matched: either the product is gone or the stock is too low.
    let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(Uuid::from(id))
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("failed to get product"))?;
    match available {
        None => Err(StoreError::ProductNotFound(id)),
        Some(available) => Err(StoreError::InsufficientStock {
            product_id: id,
            requested: delta.saturating_neg(),
            available,
        }),
    }
}

async fn lock_order(conn: &mut PgConnection, id: OrderId) -> StoreResult<()> {
    sqlx::query("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
        .bind(Uuid::from(id))
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("failed to lock order"))?
        .ok_or(StoreError::OrderNotFound(id))?;
    Ok(())
}

async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> StoreResult<Order> {
    let header = sqlx::query(
        "SELECT id, user_id, status, total_price, created_at, updated_at
         FROM orders WHERE id = $1",
    )
    .bind(Uuid::from(id))
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("failed to get order"))?
    .ok_or(StoreError::OrderNotFound(id))?;

    let item_rows = sqlx::query(
        "SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.price, oi.created_at,
                p.name AS product_name, p.price AS product_price, p.stock AS product_stock
         FROM order_items oi
         LEFT JOIN products p ON oi.product_id = p.id
         WHERE oi.order_id = $1
         ORDER BY oi.created_at, oi.id",
    )
    .bind(Uuid::from(id))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("failed to get order items"))?;

    let items = item_rows.iter().map(item_from_row).collect::<StoreResult<Vec<_>>>()?;
    let status: String = column(&header, "status")?;

    Ok(Order {
        id: OrderId::from_uuid(column(&header, "id")?),
        user_id: UserId::from_uuid(column(&header, "user_id")?),
        status: status.parse::<OrderStatus>().map_err(|e| StoreError::Database(format!("{e}")))?,
        total_price: column(&header, "total_price")?,
        items,
        created_at: column(&header, "created_at")?,
        updated_at: column(&header, "updated_at")?,
    })
}

async fn fetch_orders(conn: &mut PgConnection, ids: Vec<Uuid>) -> StoreResult<Vec<Order>> {
    let mut orders = Vec::with_capacity(ids.len());
    for id in ids {
        orders.push(fetch_order(conn, OrderId::from_uuid(id)).await?);
    }
    Ok(orders)
}

async fn insert_order(conn: &mut PgConnection, order: NewOrder) -> StoreResult<Order> {
    if order.items.is_empty() {
        return Err(StoreError::Validation("order has no items".to_string()));
    }

    let order_id = OrderId::new();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO orders (id, user_id, status, total_price, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $5)",
    )
    .bind(Uuid::from(order_id))
    .bind(Uuid::from(order.user_id))
    .bind(OrderStatus::Pending.as_str())
    .bind(order.total_price)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(db_error("failed to create order"))?;

    for item in &order.items {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::from(OrderItemId::new()))
        .bind(Uuid::from(order_id))
        .bind(Uuid::from(item.product_id))
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                StoreError::ProductNotFound(item.product_id)
            } else {
                db_error("failed to create order item")(error)
            }
        })?;
    }

    fetch_order(conn, order_id).await
}

async fn set_order_status(conn: &mut PgConnection, id: OrderId, status: OrderStatus) -> StoreResult<Order> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(Uuid::from(id))
        .execute(&mut *conn)
        .await
        .map_err(db_error("failed to update order status"))?;
    if result.rows_affected() == 0 {
        return Err(StoreError::OrderNotFound(id));
    }
    fetch_order(conn, id).await
}

// =============================================================================
// Row mapping
// =============================================================================

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    let category_id: Option<Uuid> = column(row, "category_id")?;
    Ok(Product {
        id: ProductId::from_uuid(column(row, "id")?),
        name: column(row, "name")?,
        description: column(row, "description")?,
        price: column(row, "price")?,
        stock: column(row, "stock")?,
        category_id: category_id.map(CategoryId::from_uuid),
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn item_from_row(row: &PgRow) -> StoreResult<OrderItem> {
    let product_id = ProductId::from_uuid(column(row, "product_id")?);
    let name: Option<String> = column(row, "product_name")?;
    let price: Option<rust_decimal::Decimal> = column(row, "product_price")?;
    let stock: Option<i64> = column(row, "product_stock")?;
    let product = match (name, price, stock) {
        (Some(name), Some(price), Some(stock)) => Some(ProductSnapshot { id: product_id, name, price, stock }),
        _ => None,
    };

    Ok(OrderItem {
        id: OrderItemId::from_uuid(column(row, "id")?),
        order_id: OrderId::from_uuid(column(row, "order_id")?),
        product_id,
        product,
        quantity: column(row, "quantity")?,
        unit_price: column(row, "price")?,
        created_at: column(row, "created_at")?,
    })
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Database(format!("failed to decode column {name}: {e}")))
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |error| StoreError::Database(format!("{context}: {error}"))
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    has_sqlstate(error, FOREIGN_KEY_VIOLATION)
}

fn is_numeric_out_of_range(error: &sqlx::Error) -> bool {
    has_sqlstate(error, NUMERIC_VALUE_OUT_OF_RANGE)
}

fn has_sqlstate(error: &sqlx::Error, state: &str) -> bool {
    error
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == state)
}
