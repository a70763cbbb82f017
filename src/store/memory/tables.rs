use std::cmp::Reverse;

use crate::actor_framework::Table;
use crate::domain::{
    NewOrder, NewProduct, Order, OrderId, OrderStatus, Product, ProductId, ProductPatch,
};
use crate::store::{StoreError, StoreResult};
use super::entity::StockAction;

/// Everything the store actor owns. Cloned to stage a transaction.
#[derive(Clone)]
pub(crate) struct Tables {
    products: Table<Product>,
    orders: Table<Order>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            products: Table::new(ProductId::new),
            orders: Table::new(OrderId::new),
        }
    }
}

impl Tables {
    pub fn product(&self, id: ProductId) -> StoreResult<Product> {
        self.products.require(id).cloned()
    }

    pub fn adjust_stock(&mut self, id: ProductId, delta: i64) -> StoreResult<Product> {
        self.products.perform(id, StockAction::Adjust(delta))?;
        self.product(id)
    }

    pub fn insert_product(&mut self, product: NewProduct) -> StoreResult<Product> {
        self.products.create(product)
    }

    pub fn update_product(&mut self, id: ProductId, patch: ProductPatch) -> StoreResult<Product> {
        self.products.update(id, patch)
    }

    pub fn list_products(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self.products.values().cloned().collect();
        products.sort_by_key(|product| Reverse((product.created_at, product.id)));
        products
    }

    pub fn order(&self, id: OrderId) -> StoreResult<Order> {
        self.orders.require(id).map(|order| self.hydrate(order))
    }

    /// Inserts the order header and its items. Every referenced product must
    /// exist, as a foreign key would demand.
    pub fn create_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        if let Some(item) = order.items.iter().find(|item| self.products.get(item.product_id).is_none()) {
            return Err(StoreError::ProductNotFound(item.product_id));
        }
        let created = self.orders.create(order)?;
        Ok(self.hydrate(&created))
    }

    pub fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> StoreResult<Order> {
        let updated = self.orders.update(id, status)?;
        Ok(self.hydrate(&updated))
    }

    /// Orders matching `filter`, newest first.
    pub fn orders_where(&self, filter: impl Fn(&Order) -> bool) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .values()
            .filter(|order| filter(order))
            .map(|order| self.hydrate(order))
            .collect();
        orders.sort_by_key(|order| Reverse((order.created_at, order.id)));
        orders
    }

    #[cfg(test)]
    pub fn counts(&self) -> (usize, usize) {
        (self.products.len(), self.orders.len())
    }

    /// Resolve each item's current product, like a left join.
    fn hydrate(&self, order: &Order) -> Order {
        let mut order = order.clone();
        for item in &mut order.items {
            item.product = self.products.get(item.product_id).map(Product::snapshot);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewOrderItem, UserId};
    use rust_decimal_macros::dec;

    fn order_for(user_id: UserId, product: &Product, quantity: i64) -> NewOrder {
        NewOrder {
            user_id,
            total_price: product.price * rust_decimal::Decimal::from(quantity),
            items: vec![NewOrderItem { product_id: product.id, quantity, unit_price: product.price }],
        }
    }

    #[test]
    fn orders_are_listed_newest_first() {
        let mut tables = Tables::default();
        let product = tables.insert_product(NewProduct::new("Mug", dec!(8), 10)).unwrap();
        let user = UserId::new();
        let first = tables.create_order(order_for(user, &product, 1)).unwrap();
        let second = tables.create_order(order_for(user, &product, 2)).unwrap();
        let other = tables.create_order(order_for(UserId::new(), &product, 1)).unwrap();

        let mine: Vec<OrderId> = tables.orders_where(|o| o.user_id == user).iter().map(|o| o.id).collect();
        assert_eq!(mine, vec![second.id, first.id]);
        assert_eq!(tables.orders_where(|_| true)[0].id, other.id);
    }

    #[test]
    fn reads_resolve_current_product_snapshot() {
        let mut tables = Tables::default();
        let product = tables.insert_product(NewProduct::new("Mug", dec!(8), 10)).unwrap();
        let order = tables.create_order(order_for(UserId::new(), &product, 1)).unwrap();
        tables
            .update_product(product.id, ProductPatch { price: Some(dec!(9)), ..Default::default() })
            .unwrap();

        let reread = tables.order(order.id).unwrap();
        assert_eq!(reread.items[0].unit_price, dec!(8));
        assert_eq!(reread.items[0].product.as_ref().unwrap().price, dec!(9));
    }

    #[test]
    fn order_referencing_unknown_product_is_rejected() {
        let mut tables = Tables::default();
        let ghost = ProductId::new();
        let err = tables
            .create_order(NewOrder {
                user_id: UserId::new(),
                total_price: dec!(1),
                items: vec![NewOrderItem { product_id: ghost, quantity: 1, unit_price: dec!(1) }],
            })
            .unwrap_err();
        assert_eq!(err, StoreError::ProductNotFound(ghost));
        assert_eq!(tables.counts(), (0, 0));
    }
}
