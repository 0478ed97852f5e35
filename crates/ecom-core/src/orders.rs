//! Order status lifecycle and validated order lines.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Lifecycle of an order.
///
/// `pending → confirmed → processing → shipped → delivered`, with `cancelled`
/// reachable from every state before shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether `self → next` is an allowed edge. Self-loops are not edges.
    #[must_use]
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::{Cancelled, Confirmed, Delivered, Pending, Processing, Shipped};
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending | Confirmed | Processing, Cancelled)
        )
    }

    /// Validate a requested status change.
    ///
    /// Returns `Ok(None)` when `next` equals the current status, `Ok(Some(next))`
    /// for an allowed transition.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidStatusTransition`] for any other change.
    pub fn transition(self, next: OrderStatus) -> Result<Option<OrderStatus>, CoreError> {
        if self == next {
            return Ok(None);
        }
        if self.can_transition_to(next) {
            Ok(Some(next))
        } else {
            Err(CoreError::InvalidStatusTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Orders in these states still hold the stock they reserved and have not
    /// left the warehouse, so their lines may be edited.
    #[must_use]
    pub fn is_editable(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        )
    }

    /// `false` only for cancelled orders, whose stock was already released.
    #[must_use]
    pub fn holds_stock(self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| CoreError::InvalidOrderStatus(s.to_string()))
    }
}

/// A validated order line ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Caller-supplied price override; `None` snapshots the product's current price.
    pub price_at_time: Option<Decimal>,
}

impl OrderLine {
    /// Build a line from loosely-typed request fields.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLineItem`] when the product id is missing,
    /// the quantity is missing or not positive, or the price override is negative.
    pub fn new(
        product_id: Option<Uuid>,
        quantity: Option<i64>,
        price_at_time: Option<Decimal>,
    ) -> Result<Self, CoreError> {
        let product_id = product_id
            .ok_or_else(|| CoreError::InvalidLineItem("productId is required".to_string()))?;
        let quantity = match quantity {
            Some(q) if q > 0 => i32::try_from(q).map_err(|_| {
                CoreError::InvalidLineItem(format!("quantity {q} is too large"))
            })?,
            Some(q) => {
                return Err(CoreError::InvalidLineItem(format!(
                    "quantity must be positive, got {q}"
                )))
            }
            None => {
                return Err(CoreError::InvalidLineItem(
                    "quantity is required".to_string(),
                ))
            }
        };
        if let Some(price) = price_at_time {
            if price < Decimal::ZERO {
                return Err(CoreError::InvalidLineItem(format!(
                    "priceAtTime must not be negative, got {price}"
                )));
            }
        }
        Ok(Self {
            product_id,
            quantity,
            price_at_time,
        })
    }
}

/// Validate a whole batch of lines; an order needs at least one.
///
/// # Errors
///
/// Returns [`CoreError::InvalidLineItem`] for an empty batch.
pub fn require_lines(lines: Vec<OrderLine>) -> Result<Vec<OrderLine>, CoreError> {
    if lines.is_empty() {
        return Err(CoreError::InvalidLineItem(
            "an order needs at least one item".to_string(),
        ));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_chain_is_allowed() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn cancellation_only_before_shipment() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn skipping_and_reversing_are_rejected() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
        let err = OrderStatus::Shipped
            .transition(OrderStatus::Confirmed)
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidStatusTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Confirmed,
            }
        );
    }

    #[test]
    fn same_status_is_a_no_op() {
        assert_eq!(
            OrderStatus::Delivered.transition(OrderStatus::Delivered),
            Ok(None)
        );
        assert_eq!(
            OrderStatus::Pending.transition(OrderStatus::Confirmed),
            Ok(Some(OrderStatus::Confirmed))
        );
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            "Shipped".parse::<OrderStatus>().unwrap(),
            OrderStatus::Shipped
        );
        assert!(matches!(
            "lost".parse::<OrderStatus>(),
            Err(CoreError::InvalidOrderStatus(_))
        ));
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn editable_and_stock_holding_states() {
        assert!(OrderStatus::Processing.is_editable());
        assert!(!OrderStatus::Shipped.is_editable());
        assert!(OrderStatus::Delivered.holds_stock());
        assert!(!OrderStatus::Cancelled.holds_stock());
    }

    #[test]
    fn order_line_requires_product_and_positive_quantity() {
        let id = Uuid::new_v4();
        assert!(OrderLine::new(Some(id), Some(2), None).is_ok());
        assert!(matches!(
            OrderLine::new(None, Some(2), None),
            Err(CoreError::InvalidLineItem(_))
        ));
        assert!(matches!(
            OrderLine::new(Some(id), Some(0), None),
            Err(CoreError::InvalidLineItem(_))
        ));
        assert!(matches!(
            OrderLine::new(Some(id), None, None),
            Err(CoreError::InvalidLineItem(_))
        ));
        assert!(matches!(
            OrderLine::new(Some(id), Some(i64::from(i32::MAX) + 1), None),
            Err(CoreError::InvalidLineItem(_))
        ));
    }

    #[test]
    fn order_line_rejects_negative_price_override() {
        let id = Uuid::new_v4();
        assert!(matches!(
            OrderLine::new(Some(id), Some(1), Some(Decimal::new(-100, 2))),
            Err(CoreError::InvalidLineItem(_))
        ));
        let line = OrderLine::new(Some(id), Some(1), Some(Decimal::ZERO)).unwrap();
        assert_eq!(line.price_at_time, Some(Decimal::ZERO));
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            require_lines(Vec::new()),
            Err(CoreError::InvalidLineItem(_))
        ));
    }
}
