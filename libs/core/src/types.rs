use crate::money::Money;
use serde::{Deserialize, Serialize};

/// One (product, variant, quantity) entry in a client-side cart.
///
/// `unit_price` is the last-known price captured when the line was added;
/// it drives display totals only. The order service re-resolves live
/// prices at checkout and is the single source of truth for what is
/// actually charged.
///
/// Invariant: a cart holds at most one line per (`product_id`, `variant`)
/// pair; adding the same pair again increments `quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartLine {
    /// Display subtotal from the add-time price.
    pub fn subtotal(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// A shipping address. Orders store a copied snapshot of this, never a
/// live reference, so later edits to a saved address do not rewrite
/// history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// How the customer intends to pay. No gateway integration exists; this
/// is recorded on the order for the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Card => "card",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
            "card" => Ok(PaymentMethod::Card),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_line_subtotal_uses_add_time_price() {
        let line = CartLine {
            product_id: "p-1".into(),
            variant: Some("M".into()),
            quantity: 3,
            unit_price: Money::from_cents(1_500),
        };
        assert_eq!(line.subtotal().unwrap().cents(), 4_500);
    }

    #[test]
    fn payment_method_round_trips() {
        let json = serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap();
        assert_eq!(json, "\"cash_on_delivery\"");
        let back: PaymentMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PaymentMethod::CashOnDelivery);
    }
}
