use tokio::sync::mpsc;

use crate::actor_framework::Response;
use crate::domain::{
    NewOrder, NewProduct, Order, OrderId, OrderStatus, Product, ProductId, ProductPatch, UserId,
};

/// Typed messages for the store actor. Each variant carries its parameters
/// and a oneshot channel for the reply.
#[derive(Debug)]
pub enum StoreRequest {
    GetProduct {
        id: ProductId,
        respond_to: Response<Product>,
    },
    AdjustStock {
        id: ProductId,
        delta: i64,
        respond_to: Response<Product>,
    },
    InsertProduct {
        product: NewProduct,
        respond_to: Response<Product>,
    },
    UpdateProduct {
        id: ProductId,
        patch: ProductPatch,
        respond_to: Response<Product>,
    },
    ListProducts {
        respond_to: Response<Vec<Product>>,
    },
    CreateOrder {
        order: NewOrder,
        respond_to: Response<Order>,
    },
    GetOrder {
        id: OrderId,
        respond_to: Response<Order>,
    },
    OrdersForUser {
        user_id: UserId,
        respond_to: Response<Vec<Order>>,
    },
    AllOrders {
        respond_to: Response<Vec<Order>>,
    },
    UpdateOrderStatus {
        id: OrderId,
        status: OrderStatus,
        respond_to: Response<Order>,
    },
    /// Opens an exclusive session. The actor serves nothing else until the
    /// session commits, rolls back, is dropped, or idles out.
    Begin {
        respond_to: Response<mpsc::Sender<TxRequest>>,
    },
    Shutdown,
    #[cfg(test)]
    Counts {
        respond_to: Response<(usize, usize)>,
    },
}

/// Messages accepted while a transaction session is open.
#[derive(Debug)]
pub enum TxRequest {
    GetProduct {
        id: ProductId,
        respond_to: Response<Product>,
    },
    AdjustStock {
        id: ProductId,
        delta: i64,
        respond_to: Response<Product>,
    },
    GetOrder {
        id: OrderId,
        respond_to: Response<Order>,
    },
    CreateOrder {
        order: NewOrder,
        respond_to: Response<Order>,
    },
    SetOrderStatus {
        id: OrderId,
        status: OrderStatus,
        respond_to: Response<Order>,
    },
    Commit {
        respond_to: Response<()>,
    },
    Rollback {
        respond_to: Response<()>,
    },
}
