//! Collaborator contracts for product and order persistence.
//!
//! The workflow engine only talks to [`Storage`]. Backends:
//! - [`memory::MemoryStore`]: an actor owning both tables; transactions are
//!   exclusive sessions with the actor.
//! - `postgres::PostgresStore` (feature `postgres`): sqlx with bound
//!   parameters and row-locking transactions.

pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::*;
pub use memory::{MemoryStore, StoreActor};

use async_trait::async_trait;

use crate::domain::{
    NewOrder, NewProduct, Order, OrderId, OrderStatus, Product, ProductId, ProductPatch, UserId,
};

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn product(&self, id: ProductId) -> StoreResult<Product>;

    /// Adds `delta` (possibly negative) to the product's stock. Refuses to go
    /// below zero with [`StoreError::InsufficientStock`].
    async fn adjust_stock(&self, id: ProductId, delta: i64) -> StoreResult<Product>;

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product>;

    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> StoreResult<Product>;

    /// All products, newest first.
    async fn list_products(&self) -> StoreResult<Vec<Product>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists the header and its items atomically.
    async fn create_with_items(&self, order: NewOrder) -> StoreResult<Order>;

    async fn order(&self, id: OrderId) -> StoreResult<Order>;

    /// Orders owned by `user_id`, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>>;

    /// Every order, newest first.
    async fn all_orders(&self) -> StoreResult<Vec<Order>>;

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> StoreResult<Order>;
}

/// An open unit of work. Nothing it writes is visible to others until
/// [`commit`](StoreTransaction::commit); dropping it rolls back.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn product(&mut self, id: ProductId) -> StoreResult<Product>;

    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> StoreResult<Product>;

    async fn order(&mut self, id: OrderId) -> StoreResult<Order>;

    async fn create_with_items(&mut self, order: NewOrder) -> StoreResult<Order>;

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> StoreResult<Order>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait Storage: ProductStore + OrderStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}
