//! # Mock Framework
//!
//! Utilities for testing store clients in isolation.
//!
//! Use [`create_mock_store`] to get a [`MemoryStore`] and the receiver its
//! requests land on. The test plays the actor: helpers like
//! [`expect_begin`] and [`expect_tx`] pull the next request so it can be
//! asserted on and answered.

use tokio::sync::mpsc;

use crate::actor_framework::Response;
use crate::domain::{Product, ProductId};
use crate::store::memory::messages::{StoreRequest, TxRequest};
use crate::store::MemoryStore;

/// Creates a store client wired to a channel the test controls.
///
/// Nothing runs behind the receiver, so every reply (success, failure, or
/// silence) is up to the test.
pub fn create_mock_store(buffer_size: usize) -> (MemoryStore, mpsc::Receiver<StoreRequest>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (MemoryStore::new(sender), receiver)
}

/// Expects a `Begin` request, accepts it, and returns the session receiver
/// the transaction's requests will arrive on.
pub async fn expect_begin(receiver: &mut mpsc::Receiver<StoreRequest>) -> Option<mpsc::Receiver<TxRequest>> {
    match receiver.recv().await {
        Some(StoreRequest::Begin { respond_to }) => {
            let (sender, session) = mpsc::channel(8);
            respond_to.send(Ok(sender)).ok()?;
            Some(session)
        }
        _ => None,
    }
}

/// Next request on an open transaction session.
pub async fn expect_tx(session: &mut mpsc::Receiver<TxRequest>) -> Option<TxRequest> {
    session.recv().await
}

/// Helper to verify that the next message is a `GetProduct` request.
pub async fn expect_get_product(
    receiver: &mut mpsc::Receiver<StoreRequest>,
) -> Option<(ProductId, Response<Product>)> {
    match receiver.recv().await {
        Some(StoreRequest::GetProduct { id, respond_to }) => Some((id, respond_to)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ProductStore, Storage, StoreError};

    #[tokio::test]
    async fn test_mock_store() {
        let (store, mut receiver) = create_mock_store(10);
        let missing = ProductId::new();

        let task = tokio::spawn(async move { store.product(missing).await });

        let (id, responder) = expect_get_product(&mut receiver).await.expect("Expected GetProduct");
        assert_eq!(id, missing);
        responder.send(Err(StoreError::ProductNotFound(id))).unwrap();

        let result = task.await.unwrap();
        assert_eq!(result.unwrap_err(), StoreError::ProductNotFound(missing));
    }

    #[tokio::test]
    async fn test_mock_transaction_session() {
        let (store, mut receiver) = create_mock_store(10);

        let task = tokio::spawn(async move {
            let tx = store.begin().await?;
            tx.commit().await
        });

        let mut session = expect_begin(&mut receiver).await.expect("Expected Begin");
        match expect_tx(&mut session).await {
            Some(TxRequest::Commit { respond_to }) => respond_to.send(Ok(())).unwrap(),
            other => panic!("Expected Commit, got {other:?}"),
        }

        assert_eq!(task.await.unwrap(), Ok(()));
    }
}
