use crate::money::Money;
use crate::status::OrderStatus;
use crate::types::{Address, PaymentMethod};
use serde::{Deserialize, Serialize};

/// One line of a persisted order.
///
/// `unit_price` is the catalog price resolved at order-creation time.
/// It is a snapshot: later catalog price changes never alter it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn subtotal(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// A persisted order record.
///
/// Invariants:
/// - `lines` is non-empty;
/// - `total` equals the sum of line subtotals at creation time and is
///   never recomputed afterward;
/// - `shipping_address` is a snapshot copy, not a live reference;
/// - `status` changes only through the order manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub total: Money,
    pub lines: Vec<OrderLine>,
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    pub created_at: String,
    pub updated_at: String,
}

impl Order {
    /// Sums line subtotals, failing on arithmetic overflow.
    pub fn total_of(lines: &[OrderLine]) -> Option<Money> {
        lines
            .iter()
            .map(OrderLine::subtotal)
            .collect::<Option<Vec<_>>>()
            .and_then(Money::checked_sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_of_sums_line_subtotals() {
        let lines = vec![
            OrderLine {
                product_id: "p-1".into(),
                variant: Some("M".into()),
                quantity: 2,
                unit_price: Money::from_cents(1_000),
            },
            OrderLine {
                product_id: "p-2".into(),
                variant: None,
                quantity: 1,
                unit_price: Money::from_cents(450),
            },
        ];
        assert_eq!(Order::total_of(&lines).unwrap().cents(), 2_450);
    }

    #[test]
    fn total_of_empty_is_zero() {
        assert_eq!(Order::total_of(&[]).unwrap(), Money::ZERO);
    }
}
