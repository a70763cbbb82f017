//! The order workflow engine.
//!
//! Places orders against live inventory, moves them through their status
//! lifecycle, and restores stock on cancellation. Every multi-write
//! operation runs in a single store transaction: it either commits as a
//! whole or leaves storage untouched.

pub mod error;

pub use error::*;

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    line_subtotal, Caller, NewOrder, NewOrderItem, NewOrderRequest, Order, OrderId, OrderLineRequest,
    OrderStatus, UserId,
};
use crate::store::{Storage, StoreError, StoreTransaction};

/// Entry point for every order operation. Cheap to clone.
#[derive(Clone)]
pub struct OrderWorkflow {
    store: Arc<dyn Storage>,
}

impl OrderWorkflow {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Validates the request, reserves stock line by line in request order,
    /// and persists the order with its items, all in one transaction.
    ///
    /// # Errors
    /// - [`WorkflowError::Validation`] for an empty request or a
    ///   non-positive quantity, before the store is touched
    /// - [`WorkflowError::ProductNotFound`] / [`WorkflowError::InsufficientStock`]
    ///   for the first line that cannot be served
    /// - [`WorkflowError::Validation`] if the total does not fit in a
    ///   `Decimal`, with every reservation rolled back
    /// - [`WorkflowError::Storage`] for backend failures
    #[instrument(skip(self, request), fields(user_id = %caller.user_id, lines = request.items.len()))]
    pub async fn create_order(&self, caller: &Caller, request: NewOrderRequest) -> WorkflowResult<Order> {
        info!("Processing create_order request");
        if let Err(reason) = request.validate() {
            warn!(%reason, "Order request rejected");
            return Err(WorkflowError::Validation(reason));
        }

        let mut tx = self.store.begin().await?;
        let outcome = reserve_and_insert(tx.as_mut(), caller.user_id, &request.items).await;
        let order = finish(tx, outcome).await?;

        info!(order_id = %order.id, total = %order.total_price, "Order placed");
        Ok(order)
    }

    /// # Errors
    /// [`WorkflowError::OrderNotFound`], or [`WorkflowError::AccessDenied`]
    /// when the caller is neither the owner nor an admin.
    #[instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn get_order(&self, caller: &Caller, order_id: OrderId) -> WorkflowResult<Order> {
        debug!("Processing get_order request");
        let order = self.store.order(order_id).await?;
        authorize(caller, &order)?;
        Ok(order)
    }

    /// Orders owned by `user_id`, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders_for_user(&self, user_id: UserId) -> WorkflowResult<Vec<Order>> {
        let orders = self.store.orders_for_user(user_id).await?;
        debug!(count = orders.len(), "Listed user orders");
        Ok(orders)
    }

    /// Every order, newest first. Restricting this to admins is up to the
    /// caller.
    #[instrument(skip(self))]
    pub async fn list_all_orders(&self) -> WorkflowResult<Vec<Order>> {
        let orders = self.store.all_orders().await?;
        debug!(count = orders.len(), "Listed all orders");
        Ok(orders)
    }

    /// Moves an order to `status`.
    ///
    /// A cancelled order accepts no update; a delivered order only accepts
    /// `delivered` again.
    #[instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> WorkflowResult<Order> {
        info!("Processing update_status request");
        let mut tx = self.store.begin().await?;
        let outcome = transition(tx.as_mut(), order_id, status).await;
        let order = finish(tx, outcome).await?;
        info!(status = %order.status, "Order status updated");
        Ok(order)
    }

    /// Cancels a pending or processing order and puts its stock back.
    ///
    /// Items whose product no longer exists are skipped; the cancellation
    /// still goes through.
    #[instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn cancel(&self, caller: &Caller, order_id: OrderId) -> WorkflowResult<Order> {
        info!("Processing cancel request");
        let mut tx = self.store.begin().await?;
        let outcome = cancel_and_restock(tx.as_mut(), caller, order_id).await;
        let order = finish(tx, outcome).await?;
        info!("Order cancelled");
        Ok(order)
    }
}

/// Commit on success, roll back on failure.
async fn finish<T>(tx: Box<dyn StoreTransaction>, outcome: WorkflowResult<T>) -> WorkflowResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                // Dropping the handle still discards the staged writes.
                warn!(error = %rollback_error, "Rollback failed");
            }
            Err(error)
        }
    }
}

fn authorize(caller: &Caller, order: &Order) -> WorkflowResult<()> {
    if caller.can_access(order.user_id) {
        return Ok(());
    }
    warn!(order_id = %order.id, "Access denied");
    Err(WorkflowError::AccessDenied {
        order_id: order.id,
        user_id: caller.user_id,
    })
}

async fn reserve_and_insert(
    tx: &mut dyn StoreTransaction,
    user_id: UserId,
    lines: &[OrderLineRequest],
) -> WorkflowResult<Order> {
    let mut items = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;

    for line in lines {
        let product = tx.product(line.product_id).await?;
        if line.quantity > product.stock {
            warn!(product_id = %product.id, requested = line.quantity, available = product.stock, "Insufficient stock");
            return Err(WorkflowError::InsufficientStock {
                product_id: product.id,
                requested: line.quantity,
                available: product.stock,
            });
        }

        total = line_subtotal(product.price, line.quantity)
            .and_then(|subtotal| total.checked_add(subtotal))
            .ok_or_else(|| {
                warn!(product_id = %product.id, quantity = line.quantity, "Order total overflows");
                WorkflowError::Validation(format!(
                    "order total overflows at product {} with quantity {}",
                    product.id, line.quantity
                ))
            })?;
        items.push(NewOrderItem {
            product_id: product.id,
            quantity: line.quantity,
            unit_price: product.price,
        });

        tx.adjust_stock(product.id, -line.quantity).await?;
        debug!(product_id = %product.id, quantity = line.quantity, "Stock reserved");
    }

    let order = tx
        .create_with_items(NewOrder {
            user_id,
            total_price: total,
            items,
        })
        .await?;
    Ok(order)
}

async fn transition(
    tx: &mut dyn StoreTransaction,
    order_id: OrderId,
    status: OrderStatus,
) -> WorkflowResult<Order> {
    let order = tx.order(order_id).await?;
    if !order.status.can_transition_to(status) {
        warn!(from = %order.status, to = %status, "Invalid status transition");
        return Err(WorkflowError::InvalidTransition {
            from: order.status,
            to: status,
        });
    }
    Ok(tx.set_order_status(order_id, status).await?)
}

async fn cancel_and_restock(
    tx: &mut dyn StoreTransaction,
    caller: &Caller,
    order_id: OrderId,
) -> WorkflowResult<Order> {
    let order = tx.order(order_id).await?;
    authorize(caller, &order)?;
    if !order.status.is_cancellable() {
        return Err(WorkflowError::InvalidState {
            order_id,
            status: order.status,
        });
    }

    for item in &order.items {
        match tx.adjust_stock(item.product_id, item.quantity).await {
            Ok(product) => debug!(product_id = %product.id, stock = product.stock, "Stock restored"),
            Err(StoreError::ProductNotFound(product_id)) => {
                warn!(%product_id, quantity = item.quantity, "Product missing, skipping stock restore");
            }
            Err(error) => return Err(error.into()),
        }
    }

    Ok(tx.set_order_status(order_id, OrderStatus::Cancelled).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewProduct, OrderItem, OrderItemId, Product, ProductId};
    use crate::mock_framework::{create_mock_store, expect_begin, expect_tx};
    use crate::store::memory::messages::TxRequest;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc::error::TryRecvError;

    fn product(stock: i64) -> Product {
        let now = Utc::now();
        let new = NewProduct::new("Desk", dec!(120), stock);
        Product {
            id: ProductId::new(),
            name: new.name,
            description: new.description,
            price: new.price,
            stock: new.stock,
            category_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_the_store() {
        let (store, mut receiver) = create_mock_store(4);
        let workflow = OrderWorkflow::new(Arc::new(store));
        let caller = Caller::customer(UserId::new());

        let err = workflow.create_order(&caller, NewOrderRequest::default()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let err = workflow
            .create_order(&caller, NewOrderRequest::default().line(ProductId::new(), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn storage_failure_mid_order_rolls_back() {
        let (store, mut receiver) = create_mock_store(4);
        let workflow = OrderWorkflow::new(Arc::new(store));
        let caller = Caller::customer(UserId::new());
        let desk = product(5);
        let desk_id = desk.id;

        let order_task = tokio::spawn(async move {
            workflow
                .create_order(&caller, NewOrderRequest::default().line(desk_id, 2))
                .await
        });

        let mut session = expect_begin(&mut receiver).await.expect("Expected Begin");

        match expect_tx(&mut session).await {
            Some(TxRequest::GetProduct { id, respond_to }) => {
                assert_eq!(id, desk_id);
                respond_to.send(Ok(desk)).unwrap();
            }
            other => panic!("Unexpected request: {other:?}"),
        }

        match expect_tx(&mut session).await {
            Some(TxRequest::AdjustStock { id, delta, respond_to }) => {
                assert_eq!((id, delta), (desk_id, -2));
                respond_to
                    .send(Err(StoreError::Database("connection reset".into())))
                    .unwrap();
            }
            other => panic!("Unexpected request: {other:?}"),
        }

        match expect_tx(&mut session).await {
            Some(TxRequest::Rollback { respond_to }) => respond_to.send(Ok(())).unwrap(),
            other => panic!("Expected Rollback, got {other:?}"),
        }

        let result = order_task.await.unwrap();
        assert_eq!(
            result.unwrap_err(),
            WorkflowError::Storage(StoreError::Database("connection reset".into()))
        );
    }

    #[tokio::test]
    async fn cancel_skips_products_that_disappeared() {
        let (store, mut receiver) = create_mock_store(4);
        let workflow = OrderWorkflow::new(Arc::new(store));
        let caller = Caller::customer(UserId::new());
        let now = Utc::now();
        let order_id = OrderId::new();
        let (gone, kept) = (ProductId::new(), ProductId::new());
        let item = |product_id, quantity| OrderItem {
            id: OrderItemId::new(),
            order_id,
            product_id,
            product: None,
            quantity,
            unit_price: dec!(10),
            created_at: now,
        };
        let order = Order {
            id: order_id,
            user_id: caller.user_id,
            status: OrderStatus::Processing,
            total_price: dec!(30),
            items: vec![item(gone, 2), item(kept, 1)],
            created_at: now,
            updated_at: now,
        };

        let cancel_task = tokio::spawn(async move { workflow.cancel(&caller, order_id).await });
        let mut session = expect_begin(&mut receiver).await.expect("Expected Begin");

        match expect_tx(&mut session).await {
            Some(TxRequest::GetOrder { id, respond_to }) => {
                assert_eq!(id, order_id);
                respond_to.send(Ok(order.clone())).unwrap();
            }
            other => panic!("Unexpected request: {other:?}"),
        }
        match expect_tx(&mut session).await {
            Some(TxRequest::AdjustStock { id, delta, respond_to }) => {
                assert_eq!((id, delta), (gone, 2));
                respond_to.send(Err(StoreError::ProductNotFound(gone))).unwrap();
            }
            other => panic!("Unexpected request: {other:?}"),
        }
        match expect_tx(&mut session).await {
            Some(TxRequest::AdjustStock { id, delta, respond_to }) => {
                assert_eq!((id, delta), (kept, 1));
                let mut restored = product(4);
                restored.id = kept;
                respond_to.send(Ok(restored)).unwrap();
            }
            other => panic!("Unexpected request: {other:?}"),
        }
        match expect_tx(&mut session).await {
            Some(TxRequest::SetOrderStatus { id, status, respond_to }) => {
                assert_eq!((id, status), (order_id, OrderStatus::Cancelled));
                let mut cancelled = order.clone();
                cancelled.status = OrderStatus::Cancelled;
                respond_to.send(Ok(cancelled)).unwrap();
            }
            other => panic!("Unexpected request: {other:?}"),
        }
        match expect_tx(&mut session).await {
            Some(TxRequest::Commit { respond_to }) => respond_to.send(Ok(())).unwrap(),
            other => panic!("Expected Commit, got {other:?}"),
        }

        let cancelled = cancel_task.await.unwrap().unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }

    #[test]
    fn store_errors_map_onto_workflow_kinds() {
        let product_id = ProductId::new();
        assert_eq!(
            WorkflowError::from(StoreError::ProductNotFound(product_id)),
            WorkflowError::ProductNotFound(product_id)
        );
        assert!(matches!(
            WorkflowError::from(StoreError::TransactionClosed),
            WorkflowError::Storage(StoreError::TransactionClosed)
        ));
    }
}
