use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::actor_framework::respond;
use super::messages::{StoreRequest, TxRequest};
use super::tables::Tables;
use super::MemoryStore;

/// Mailbox size for a transaction session. Sessions are driven by one
/// caller awaiting each reply, so a handful of slots is plenty.
const TX_MAILBOX: usize = 8;

/// The actor owning the product and order tables.
///
/// Requests are handled one at a time, which makes every single request
/// atomic. Transactions extend that to a sequence of requests: while a
/// session is open, the main mailbox is not polled.
pub struct StoreActor {
    receiver: mpsc::Receiver<StoreRequest>,
    tables: Tables,
    tx_timeout: Duration,
}

impl StoreActor {
    pub fn new(buffer_size: usize, tx_timeout: Duration) -> (Self, MemoryStore) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            tables: Tables::default(),
            tx_timeout,
        };
        (actor, MemoryStore::new(sender))
    }

    #[instrument(name = "store_actor", skip(self))]
    pub async fn run(mut self) {
        info!("StoreActor starting");
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StoreRequest::GetProduct { id, respond_to } => {
                    respond(respond_to, self.tables.product(id));
                }
                StoreRequest::AdjustStock { id, delta, respond_to } => {
                    respond(respond_to, self.tables.adjust_stock(id, delta));
                }
                StoreRequest::InsertProduct { product, respond_to } => {
                    respond(respond_to, self.tables.insert_product(product));
                }
                StoreRequest::UpdateProduct { id, patch, respond_to } => {
                    respond(respond_to, self.tables.update_product(id, patch));
                }
                StoreRequest::ListProducts { respond_to } => {
                    respond(respond_to, Ok(self.tables.list_products()));
                }
                StoreRequest::CreateOrder { order, respond_to } => {
                    respond(respond_to, self.tables.create_order(order));
                }
                StoreRequest::GetOrder { id, respond_to } => {
                    respond(respond_to, self.tables.order(id));
                }
                StoreRequest::OrdersForUser { user_id, respond_to } => {
                    let orders = self.tables.orders_where(|order| order.user_id == user_id);
                    respond(respond_to, Ok(orders));
                }
                StoreRequest::AllOrders { respond_to } => {
                    respond(respond_to, Ok(self.tables.orders_where(|_| true)));
                }
                StoreRequest::UpdateOrderStatus { id, status, respond_to } => {
                    respond(respond_to, self.tables.set_order_status(id, status));
                }
                StoreRequest::Begin { respond_to } => {
                    let (sender, session) = mpsc::channel(TX_MAILBOX);
                    if respond_to.send(Ok(sender)).is_ok() {
                        self.run_transaction(session).await;
                    }
                }
                StoreRequest::Shutdown => {
                    info!("StoreActor shutting down");
                    break;
                }
                #[cfg(test)]
                StoreRequest::Counts { respond_to } => {
                    respond(respond_to, Ok(self.tables.counts()));
                }
            }
        }
        info!("StoreActor stopped");
    }

    /// Serve one transaction session against a staged copy of the tables.
    #[instrument(name = "store_transaction", skip_all)]
    async fn run_transaction(&mut self, mut session: mpsc::Receiver<TxRequest>) {
        debug!("Transaction opened");
        let mut staged = self.tables.clone();

        loop {
            let msg = match tokio::time::timeout(self.tx_timeout, session.recv()).await {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    debug!("Transaction handle dropped, rolling back");
                    return;
                }
                Err(_) => {
                    warn!(timeout_ms = self.tx_timeout.as_millis(), "Transaction idle too long, rolling back");
                    return;
                }
            };

            match msg {
                TxRequest::GetProduct { id, respond_to } => {
                    respond(respond_to, staged.product(id));
                }
                TxRequest::AdjustStock { id, delta, respond_to } => {
                    respond(respond_to, staged.adjust_stock(id, delta));
                }
                TxRequest::GetOrder { id, respond_to } => {
                    respond(respond_to, staged.order(id));
                }
                TxRequest::CreateOrder { order, respond_to } => {
                    respond(respond_to, staged.create_order(order));
                }
                TxRequest::SetOrderStatus { id, status, respond_to } => {
                    respond(respond_to, staged.set_order_status(id, status));
                }
                TxRequest::Commit { respond_to } => {
                    self.tables = staged;
                    debug!("Transaction committed");
                    respond(respond_to, Ok(()));
                    return;
                }
                TxRequest::Rollback { respond_to } => {
                    debug!("Transaction rolled back");
                    respond(respond_to, Ok(()));
                    return;
                }
            }
        }
    }
}
