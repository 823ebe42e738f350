use std::sync::Arc;

use cm_core::{
    Address, CartLine, Order, OrderError, OrderLine, OrderStatus, PaymentMethod, TransitionCheck,
};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

use crate::providers::CatalogProvider;
use crate::store::OrderStore;

// Lost optimistic writes are re-read and re-validated; two races in a
// row on one order means something is persistently wrong.
const TRANSITION_ATTEMPTS: usize = 3;

/// Authoritative conversion of carts into orders, and the only path
/// through which an order's status may change.
pub struct OrderManager {
    catalog: Arc<dyn CatalogProvider>,
    store: Arc<dyn OrderStore>,
}

impl OrderManager {
    pub fn new(catalog: Arc<dyn CatalogProvider>, store: Arc<dyn OrderStore>) -> Self {
        Self { catalog, store }
    }

    /// Creates an order from a cart snapshot, all-or-nothing.
    ///
    /// Every line is revalidated against the catalog before anything is
    /// written: a zero-quantity line, a missing product, or an
    /// out-of-stock product aborts the whole order. The resolved unit prices and the shipping address are
    /// snapshotted into the record; the total is computed once, in
    /// cents, and never recomputed.
    ///
    /// Clearing the client cart is the caller's separate follow-up step.
    pub async fn create_order(
        &self,
        customer_id: &str,
        cart_lines: &[CartLine],
        shipping_address: Address,
        payment_method: PaymentMethod,
    ) -> Result<Order, OrderError> {
        if cart_lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(cart_lines.len());
        for cart_line in cart_lines {
            if cart_line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: cart_line.product_id.clone(),
                });
            }
            let product = self
                .catalog
                .get_product(&cart_line.product_id)
                .await
                .map_err(cm_core::StoreError::Internal)?;
            let product = match product {
                Some(p) if p.in_stock => p,
                _ => {
                    return Err(OrderError::ProductUnavailable {
                        product_id: cart_line.product_id.clone(),
                    });
                }
            };
            lines.push(OrderLine {
                product_id: cart_line.product_id.clone(),
                variant: cart_line.variant.clone(),
                quantity: cart_line.quantity,
                unit_price: product.price,
            });
        }

        let total = Order::total_of(&lines).ok_or_else(|| {
            cm_core::StoreError::Internal(anyhow::anyhow!("order total overflow"))
        })?;
        let now = now_rfc3339();
        let order = Order {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            status: OrderStatus::Pending,
            total,
            lines,
            shipping_address,
            payment_method,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.insert(&order).await?;
        info!(
            event = "order_created",
            order_id = %order.id,
            customer_id = %order.customer_id,
            total_cents = order.total.cents(),
            line_count = order.lines.len(),
        );
        Ok(order)
    }

    /// Moves an order to `target`, enforcing the status machine.
    ///
    /// Same-state requests succeed as no-ops. The check is optimistic:
    /// current status is re-read and re-validated immediately before the
    /// conditional write, so two concurrent conflicting transitions
    /// cannot both land.
    pub async fn transition_status(
        &self,
        order_id: &str,
        target: OrderStatus,
    ) -> Result<Order, OrderError> {
        for _ in 0..TRANSITION_ATTEMPTS {
            let order = self
                .store
                .get(order_id)
                .await?
                .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

            match order.status.check_transition(target) {
                TransitionCheck::Noop => return Ok(order),
                TransitionCheck::Rejected => {
                    return Err(OrderError::InvalidTransition {
                        from: order.status,
                        to: target,
                    });
                }
                TransitionCheck::Apply => {}
            }

            let updated_at = now_rfc3339();
            if self
                .store
                .set_status_if(order_id, order.status, target, &updated_at)
                .await?
            {
                info!(
                    event = "order_status_changed",
                    order_id = %order_id,
                    from = %order.status,
                    to = %target,
                );
                return Ok(Order {
                    status: target,
                    updated_at,
                    ..order
                });
            }
            warn!(
                event = "order_status_race",
                order_id = %order_id,
                target = %target,
                "concurrent transition won; re-reading"
            );
        }
        Err(cm_core::StoreError::Internal(anyhow::anyhow!(
            "order {order_id} kept changing under transition to {target}"
        ))
        .into())
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderError> {
        self.store
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list().await?)
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryOrderStore;
    use crate::providers::Product;
    use anyhow::Result;
    use async_trait::async_trait;
    use cm_core::Money;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct MockCatalog {
        products: Mutex<HashMap<String, Product>>,
    }

    impl MockCatalog {
        fn new(entries: &[(&str, i64, bool)]) -> Self {
            let products = entries
                .iter()
                .map(|(id, cents, in_stock)| {
                    (
                        id.to_string(),
                        Product {
                            price: Money::from_cents(*cents),
                            in_stock: *in_stock,
                        },
                    )
                })
                .collect();
            Self {
                products: Mutex::new(products),
            }
        }

        async fn set_price(&self, id: &str, cents: i64) {
            if let Some(p) = self.products.lock().await.get_mut(id) {
                p.price = Money::from_cents(cents);
            }
        }
    }

    #[async_trait]
    impl CatalogProvider for MockCatalog {
        async fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
            Ok(self.products.lock().await.get(product_id).cloned())
        }
    }

    fn address() -> Address {
        Address {
            full_name: "Ada L.".into(),
            line1: "1 Engine St".into(),
            line2: None,
            city: "London".into(),
            postal_code: "N1".into(),
            country: "GB".into(),
            phone: None,
        }
    }

    fn cart_line(product_id: &str, variant: Option<&str>, quantity: u32) -> CartLine {
        CartLine {
            product_id: product_id.into(),
            variant: variant.map(str::to_string),
            quantity,
            // Stale on purpose: the manager must use catalog prices.
            unit_price: Money::from_cents(1),
        }
    }

    fn manager(catalog: MockCatalog) -> (OrderManager, Arc<MemoryOrderStore>) {
        let store = Arc::new(MemoryOrderStore::new());
        (
            OrderManager::new(Arc::new(catalog), store.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn empty_cart_fails_and_persists_nothing() {
        let (manager, store) = manager(MockCatalog::new(&[]));
        let err = manager
            .create_order("cust-1", &[], address(), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::EmptyCart));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_product_aborts_the_whole_order() {
        let (manager, store) = manager(MockCatalog::new(&[
            ("p-1", 1_000, true),
            ("p-2", 500, false),
        ]));
        let lines = [cart_line("p-1", None, 1), cart_line("p-2", None, 1)];
        let err = manager
            .create_order("cust-1", &lines, address(), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(
            matches!(err, OrderError::ProductUnavailable { ref product_id } if product_id == "p-2")
        );
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_quantity_line_aborts_the_whole_order() {
        let (manager, store) = manager(MockCatalog::new(&[("p-1", 1_000, true)]));
        let lines = [cart_line("p-1", None, 1), cart_line("p-1", Some("M"), 0)];
        let err = manager
            .create_order("cust-1", &lines, address(), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(
            matches!(err, OrderError::InvalidQuantity { ref product_id } if product_id == "p-1")
        );
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_product_is_unavailable_too() {
        let (manager, _) = manager(MockCatalog::new(&[("p-1", 1_000, true)]));
        let lines = [cart_line("ghost", None, 1)];
        let err = manager
            .create_order("cust-1", &lines, address(), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::ProductUnavailable { .. }));
    }

    #[tokio::test]
    async fn total_snapshots_catalog_prices_not_cart_prices() {
        let catalog = MockCatalog::new(&[("p-1", 1_200, true), ("p-2", 300, true)]);
        let (manager, _) = manager(catalog);
        let lines = [cart_line("p-1", Some("M"), 2), cart_line("p-2", None, 3)];
        let order = manager
            .create_order("cust-1", &lines, address(), PaymentMethod::CashOnDelivery)
            .await
            .unwrap();
        assert_eq!(order.total.cents(), 2 * 1_200 + 3 * 300);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.lines[0].unit_price.cents(), 1_200);
    }

    #[tokio::test]
    async fn later_price_change_does_not_alter_a_persisted_order() {
        let catalog = MockCatalog::new(&[("p-1", 1_000, true)]);
        let store = Arc::new(MemoryOrderStore::new());
        let catalog = Arc::new(catalog);
        let manager = OrderManager::new(catalog.clone(), store.clone());

        let order = manager
            .create_order(
                "cust-1",
                &[cart_line("p-1", None, 2)],
                address(),
                PaymentMethod::Card,
            )
            .await
            .unwrap();
        catalog.set_price("p-1", 9_999).await;

        let reloaded = manager.get_order(&order.id).await.unwrap();
        assert_eq!(reloaded.total.cents(), 2_000);
        assert_eq!(reloaded.lines[0].unit_price.cents(), 1_000);
    }

    #[tokio::test]
    async fn address_is_snapshotted_by_value() {
        let (manager, _) = manager(MockCatalog::new(&[("p-1", 100, true)]));
        let mut addr = address();
        let order = manager
            .create_order(
                "cust-1",
                &[cart_line("p-1", None, 1)],
                addr.clone(),
                PaymentMethod::Card,
            )
            .await
            .unwrap();
        addr.city = "Paris".into();
        let reloaded = manager.get_order(&order.id).await.unwrap();
        assert_eq!(reloaded.shipping_address.city, "London");
    }

    async fn pending_order(manager: &OrderManager) -> Order {
        manager
            .create_order(
                "cust-1",
                &[cart_line("p-1", None, 1)],
                address(),
                PaymentMethod::Card,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn forward_transitions_walk_the_chain() {
        let (manager, _) = manager(MockCatalog::new(&[("p-1", 100, true)]));
        let order = pending_order(&manager).await;

        for target in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let updated = manager.transition_status(&order.id, target).await.unwrap();
            assert_eq!(updated.status, target);
        }
    }

    #[tokio::test]
    async fn same_state_transition_is_an_idempotent_noop() {
        let (manager, store) = manager(MockCatalog::new(&[("p-1", 100, true)]));
        let order = pending_order(&manager).await;
        manager
            .transition_status(&order.id, OrderStatus::Processing)
            .await
            .unwrap();
        let before = store.get(&order.id).await.unwrap().unwrap();

        let again = manager
            .transition_status(&order.id, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(again.status, OrderStatus::Processing);
        // No write happened on the no-op.
        let after = store.get(&order.id).await.unwrap().unwrap();
        assert_eq!(before.updated_at, after.updated_at);
    }

    #[tokio::test]
    async fn backward_and_skip_transitions_are_rejected() {
        let (manager, _) = manager(MockCatalog::new(&[("p-1", 100, true)]));
        let order = pending_order(&manager).await;

        let err = manager
            .transition_status(&order.id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered,
            }
        ));

        manager
            .transition_status(&order.id, OrderStatus::Processing)
            .await
            .unwrap();
        let err = manager
            .transition_status(&order.id, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn cancel_is_allowed_until_terminal() {
        let (manager, _) = manager(MockCatalog::new(&[("p-1", 100, true)]));
        let order = pending_order(&manager).await;
        manager
            .transition_status(&order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        let err = manager
            .transition_status(&order.id, OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn transition_does_not_touch_total() {
        let (manager, _) = manager(MockCatalog::new(&[("p-1", 100, true)]));
        let order = pending_order(&manager).await;
        let updated = manager
            .transition_status(&order.id, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(updated.total, order.total);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (manager, _) = manager(MockCatalog::new(&[]));
        let err = manager
            .transition_status("ghost", OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound(_)));
    }

    #[tokio::test]
    async fn lost_race_revalidates_against_the_new_state() {
        let (manager, store) = manager(MockCatalog::new(&[("p-1", 100, true)]));
        let order = pending_order(&manager).await;

        // Simulate a concurrent operator winning a cancel between our
        // read and our write by moving the row out from under us.
        store
            .set_status_if(
                &order.id,
                OrderStatus::Pending,
                OrderStatus::Cancelled,
                "2024-01-02T00:00:00Z",
            )
            .await
            .unwrap();

        let err = manager
            .transition_status(&order.id, OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Processing,
            }
        ));
    }
}
