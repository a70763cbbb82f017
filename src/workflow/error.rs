use thiserror::Error;

use crate::domain::{OrderId, OrderStatus, ProductId, UserId};
use crate::store::StoreError;

/// Errors that can occur during order workflow operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Order validation error: {0}")]
    Validation(String),
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),
    #[error("Access denied: order {order_id} does not belong to user {user_id}")]
    AccessDenied { order_id: OrderId, user_id: UserId },
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order {order_id} cannot be cancelled in status {status}")]
    InvalidState { order_id: OrderId, status: OrderStatus },
    #[error("Storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ProductNotFound(id) => Self::ProductNotFound(id),
            StoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            StoreError::InsufficientStock { product_id, requested, available } => {
                Self::InsufficientStock { product_id, requested, available }
            }
            StoreError::Validation(reason) => Self::Validation(reason),
            other => Self::Storage(other),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
