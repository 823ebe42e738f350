//! In-memory [`OrderStore`] used by tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use cm_core::{Order, OrderStatus, StoreError};
use tokio::sync::Mutex;

use crate::store::OrderStore;

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<String, Order>>,
    insertion: Mutex<Vec<String>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        self.orders
            .lock()
            .await
            .insert(order.id.clone(), order.clone());
        self.insertion.lock().await.push(order.id.clone());
        Ok(())
    }

    async fn get(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.lock().await.get(order_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.lock().await;
        let ids = self.insertion.lock().await;
        Ok(ids
            .iter()
            .rev()
            .filter_map(|id| orders.get(id).cloned())
            .collect())
    }

    async fn set_status_if(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: &str,
    ) -> Result<bool, StoreError> {
        let mut orders = self.orders.lock().await;
        match orders.get_mut(order_id) {
            Some(order) if order.status == expected => {
                order.status = next;
                order.updated_at = updated_at.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
