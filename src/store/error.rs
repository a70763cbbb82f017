use thiserror::Error;

use crate::domain::{OrderId, ProductId};

/// Errors reported by a storage backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },
    #[error("Store validation error: {0}")]
    Validation(String),
    #[error("Transaction is no longer open")]
    TransactionClosed,
    #[error("Actor communication error: {0}")]
    ActorCommunication(String),
    #[error("Database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
