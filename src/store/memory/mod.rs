//! In-memory backend: one actor task owns all tables.

mod actor;
mod entity;
pub mod messages;
mod tables;

pub use actor::StoreActor;
pub use entity::StockAction;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::actor_framework::request;
use crate::domain::{
    NewOrder, NewProduct, Order, OrderId, OrderStatus, Product, ProductId, ProductPatch, UserId,
};
use crate::store::{OrderStore, ProductStore, Storage, StoreError, StoreResult, StoreTransaction};
use messages::{StoreRequest, TxRequest};

fn actor_closed() -> StoreError {
    StoreError::ActorCommunication("store actor is not running".to_string())
}

/// Client handle for the [`StoreActor`]. Cheap to clone.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    sender: mpsc::Sender<StoreRequest>,
}

impl MemoryStore {
    pub(crate) fn new(sender: mpsc::Sender<StoreRequest>) -> Self {
        Self { sender }
    }

    /// Asks the actor to stop once it has drained the requests queued ahead.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> StoreResult<()> {
        debug!("Sending request");
        self.sender.send(StoreRequest::Shutdown).await.map_err(|_| actor_closed())
    }

    #[cfg(test)]
    pub(crate) async fn counts(&self) -> StoreResult<(usize, usize)> {
        request!(self.sender, StoreRequest::Counts {}, closed = actor_closed())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    #[instrument(skip(self))]
    async fn product(&self, id: ProductId) -> StoreResult<Product> {
        request!(self.sender, StoreRequest::GetProduct { id }, closed = actor_closed())
    }

    #[instrument(skip(self))]
    async fn adjust_stock(&self, id: ProductId, delta: i64) -> StoreResult<Product> {
        request!(self.sender, StoreRequest::AdjustStock { id, delta }, closed = actor_closed())
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        request!(self.sender, StoreRequest::InsertProduct { product }, closed = actor_closed())
    }

    #[instrument(skip(self))]
    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> StoreResult<Product> {
        request!(self.sender, StoreRequest::UpdateProduct { id, patch }, closed = actor_closed())
    }

    #[instrument(skip(self))]
    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        request!(self.sender, StoreRequest::ListProducts {}, closed = actor_closed())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    #[instrument(skip(self, order), fields(user_id = %order.user_id))]
    async fn create_with_items(&self, order: NewOrder) -> StoreResult<Order> {
        request!(self.sender, StoreRequest::CreateOrder { order }, closed = actor_closed())
    }

    #[instrument(skip(self))]
    async fn order(&self, id: OrderId) -> StoreResult<Order> {
        request!(self.sender, StoreRequest::GetOrder { id }, closed = actor_closed())
    }

    #[instrument(skip(self))]
    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        request!(self.sender, StoreRequest::OrdersForUser { user_id }, closed = actor_closed())
    }

    #[instrument(skip(self))]
    async fn all_orders(&self) -> StoreResult<Vec<Order>> {
        request!(self.sender, StoreRequest::AllOrders {}, closed = actor_closed())
    }

    #[instrument(skip(self))]
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> StoreResult<Order> {
        request!(self.sender, StoreRequest::UpdateOrderStatus { id, status }, closed = actor_closed())
    }
}

#[async_trait]
impl Storage for MemoryStore {
    #[instrument(skip(self))]
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let sender = request!(self.sender, StoreRequest::Begin {}, closed = actor_closed())?;
        Ok(Box::new(MemoryTransaction { sender }))
    }
}

/// Handle on an open session with the store actor. Dropping it rolls back.
#[derive(Debug)]
pub struct MemoryTransaction {
    sender: mpsc::Sender<TxRequest>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn product(&mut self, id: ProductId) -> StoreResult<Product> {
        request!(self.sender, TxRequest::GetProduct { id }, closed = StoreError::TransactionClosed)
    }

    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> StoreResult<Product> {
        request!(self.sender, TxRequest::AdjustStock { id, delta }, closed = StoreError::TransactionClosed)
    }

    async fn order(&mut self, id: OrderId) -> StoreResult<Order> {
        request!(self.sender, TxRequest::GetOrder { id }, closed = StoreError::TransactionClosed)
    }

    async fn create_with_items(&mut self, order: NewOrder) -> StoreResult<Order> {
        request!(self.sender, TxRequest::CreateOrder { order }, closed = StoreError::TransactionClosed)
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> StoreResult<Order> {
        request!(self.sender, TxRequest::SetOrderStatus { id, status }, closed = StoreError::TransactionClosed)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        request!(self.sender, TxRequest::Commit {}, closed = StoreError::TransactionClosed)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        request!(self.sender, TxRequest::Rollback {}, closed = StoreError::TransactionClosed)
    }
}
