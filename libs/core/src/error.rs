use crate::status::OrderStatus;
use thiserror::Error;

/// Persistence-layer failures shared by the cart and order stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Checkout and lifecycle failures surfaced to callers as 4xx.
///
/// Transient transport problems never appear here; those are retried
/// inside the gateway and logged, not surfaced.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("cannot create an order from an empty cart")]
    EmptyCart,
    #[error("product unavailable: {product_id}")]
    ProductUnavailable { product_id: String },
    #[error("invalid quantity for product: {product_id}")]
    InvalidQuantity { product_id: String },
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("order not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_specific_reason() {
        let err = OrderError::ProductUnavailable {
            product_id: "p-9".into(),
        };
        assert_eq!(err.to_string(), "product unavailable: p-9");

        let err = OrderError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Processing,
        };
        assert_eq!(
            err.to_string(),
            "invalid status transition: delivered -> processing"
        );
    }
}
