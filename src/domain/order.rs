use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use super::{OrderId, OrderItemId, ProductId, ProductSnapshot, UserId};

/// Lifecycle state of an order.
///
/// `pending → processing → shipped → delivered`, or `pending/processing →
/// cancelled`. `delivered` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Only orders that have not left the warehouse can be cancelled.
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Whether a status update from `self` to `next` is allowed.
    ///
    /// A cancelled order accepts nothing; a delivered order only accepts a
    /// repeated `delivered`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match self {
            Self::Cancelled => false,
            Self::Delivered => next == Self::Delivered,
            _ => true,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Represents a customer order with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of an order. `unit_price` is the product price at purchase time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSnapshot>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// `unit_price × quantity`, or `None` if it does not fit in a [`Decimal`].
    pub fn subtotal(&self) -> Option<Decimal> {
        line_subtotal(self.unit_price, self.quantity)
    }
}

/// Price of one order line. `None` on overflow.
pub fn line_subtotal(unit_price: Decimal, quantity: i64) -> Option<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity))
}

/// Payload handed to the order store: a priced order ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_price: Decimal,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
}

/// What a buyer asks for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl NewOrderRequest {
    pub fn line(mut self, product_id: ProductId, quantity: i64) -> Self {
        self.items.push(OrderLineRequest { product_id, quantity });
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("order must contain at least one item".to_string());
        }
        if let Some(line) = self.items.iter().find(|line| line.quantity <= 0) {
            return Err(format!(
                "quantity for product {} must be positive, got {}",
                line.product_id, line.quantity
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn cancelled_accepts_no_transition() {
        for next in ALL {
            assert!(!OrderStatus::Cancelled.can_transition_to(next), "cancelled -> {next}");
        }
    }

    #[test]
    fn delivered_only_accepts_delivered() {
        for next in ALL {
            assert_eq!(
                OrderStatus::Delivered.can_transition_to(next),
                next == OrderStatus::Delivered
            );
        }
    }

    #[test]
    fn open_states_accept_forward_moves_and_cancel() {
        for from in [OrderStatus::Pending, OrderStatus::Processing] {
            for next in [
                OrderStatus::Processing,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
            ] {
                assert!(from.can_transition_to(next), "{from} -> {next}");
            }
            assert!(from.is_cancellable());
        }
        assert!(!OrderStatus::Shipped.is_cancellable());
    }

    #[test]
    fn status_string_forms() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!("SHIPPED".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!("lost".parse::<OrderStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&OrderStatus::Processing).unwrap(),
            "\"processing\""
        );
    }

    #[test]
    fn request_validation() {
        assert!(NewOrderRequest::default().validate().is_err());
        let product = ProductId::new();
        assert!(NewOrderRequest::default().line(product, 0).validate().is_err());
        assert!(NewOrderRequest::default().line(product, -2).validate().is_err());
        assert!(NewOrderRequest::default().line(product, 1).validate().is_ok());
    }

    #[test]
    fn line_subtotal_reports_overflow() {
        assert_eq!(line_subtotal(Decimal::new(125, 2), 4), Some(Decimal::new(500, 2)));
        assert_eq!(line_subtotal(Decimal::MAX, 2), None);
        assert_eq!(line_subtotal(Decimal::new(999_999_999_999, 2), i64::MAX), None);
    }
}
