use chrono::Utc;
use rust_decimal::Decimal;
use std::convert::Infallible;

use crate::actor_framework::Entity;
use crate::domain::{
    NewOrder, NewProduct, Order, OrderId, OrderItem, OrderItemId, OrderStatus, Product, ProductId,
    ProductPatch,
};
use crate::store::StoreError;

/// Stock operations on a single product row.
#[derive(Debug, Clone, Copy)]
pub enum StockAction {
    /// Adds the delta, refusing to go below zero.
    Adjust(i64),
}

impl Entity for Product {
    type Id = ProductId;
    type CreateParams = NewProduct;
    type Patch = ProductPatch;
    type Action = StockAction;
    type ActionResult = i64;

    fn id(&self) -> &ProductId {
        &self.id
    }

    fn not_found(id: ProductId) -> StoreError {
        StoreError::ProductNotFound(id)
    }

    fn from_create_params(id: ProductId, params: NewProduct) -> Result<Self, StoreError> {
        params.validate().map_err(StoreError::Validation)?;
        let now = Utc::now();
        Ok(Self {
            id,
            name: params.name,
            description: params.description,
            price: params.price,
            stock: params.stock,
            category_id: params.category_id,
            created_at: now,
            updated_at: now,
        })
    }

    fn on_update(&mut self, patch: ProductPatch) -> Result<(), StoreError> {
        patch.validate().map_err(StoreError::Validation)?;
        patch.apply(self);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn handle_action(&mut self, action: StockAction) -> Result<i64, StoreError> {
        match action {
            StockAction::Adjust(delta) => {
                let next = self.stock.checked_add(delta).ok_or_else(|| {
                    StoreError::Validation(format!("stock for product {} would overflow", self.id))
                })?;
                if next < 0 {
                    return Err(StoreError::InsufficientStock {
                        product_id: self.id,
                        requested: delta.saturating_neg(),
                        available: self.stock,
                    });
                }
                self.stock = next;
                self.updated_at = Utc::now();
                Ok(next)
            }
        }
    }
}

impl Entity for Order {
    type Id = OrderId;
    type CreateParams = NewOrder;
    /// Orders only ever change status after creation.
    type Patch = OrderStatus;
    type Action = Infallible;
    type ActionResult = ();

    fn id(&self) -> &OrderId {
        &self.id
    }

    fn not_found(id: OrderId) -> StoreError {
        StoreError::OrderNotFound(id)
    }

    fn from_create_params(id: OrderId, params: NewOrder) -> Result<Self, StoreError> {
        if params.items.is_empty() {
            return Err(StoreError::Validation("order has no items".to_string()));
        }
        if params.total_price < Decimal::ZERO {
            return Err(StoreError::Validation(format!(
                "order total must not be negative, got {}",
                params.total_price
            )));
        }

        let now = Utc::now();
        let items = params
            .items
            .into_iter()
            .map(|item| {
                if item.quantity <= 0 {
                    return Err(StoreError::Validation(format!(
                        "quantity for product {} must be positive",
                        item.product_id
                    )));
                }
                Ok(OrderItem {
                    id: OrderItemId::new(),
                    order_id: id,
                    product_id: item.product_id,
                    product: None,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    created_at: now,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            user_id: params.user_id,
            status: OrderStatus::Pending,
            total_price: params.total_price,
            items,
            created_at: now,
            updated_at: now,
        })
    }

    fn on_update(&mut self, status: OrderStatus) -> Result<(), StoreError> {
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn handle_action(&mut self, action: Infallible) -> Result<(), StoreError> {
        match action {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewOrderItem, UserId};
    use rust_decimal_macros::dec;

    fn lamp() -> Product {
        Product::from_create_params(ProductId::new(), NewProduct::new("Lamp", dec!(20), 3)).unwrap()
    }

    #[test]
    fn stock_adjustment_refuses_negative_result() {
        let mut product = lamp();
        let err = product.handle_action(StockAction::Adjust(-5)).unwrap_err();
        assert_eq!(
            err,
            StoreError::InsufficientStock { product_id: product.id, requested: 5, available: 3 }
        );
        assert_eq!(product.stock, 3);

        assert_eq!(product.handle_action(StockAction::Adjust(-3)).unwrap(), 0);
        assert_eq!(product.handle_action(StockAction::Adjust(2)).unwrap(), 2);
    }

    #[test]
    fn stock_adjustment_at_integer_limits_fails_cleanly() {
        let mut product = lamp();
        product.stock = i64::MAX;
        assert!(matches!(
            product.handle_action(StockAction::Adjust(1)),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(product.stock, i64::MAX);

        let mut product = lamp();
        let err = product.handle_action(StockAction::Adjust(i64::MIN)).unwrap_err();
        assert_eq!(
            err,
            StoreError::InsufficientStock { product_id: product.id, requested: i64::MAX, available: 3 }
        );
        assert_eq!(product.stock, 3);
    }

    #[test]
    fn invalid_product_payload_is_rejected() {
        let err = Product::from_create_params(ProductId::new(), NewProduct::new("Lamp", dec!(0), 3))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn new_orders_start_pending_with_items_bound_to_header() {
        let id = OrderId::new();
        let order = Order::from_create_params(
            id,
            NewOrder {
                user_id: UserId::new(),
                total_price: dec!(40),
                items: vec![NewOrderItem { product_id: ProductId::new(), quantity: 2, unit_price: dec!(20) }],
            },
        )
        .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items[0].order_id, id);
        assert_eq!(order.created_at, order.updated_at);
    }
}
