use anyhow::Result;
use async_trait::async_trait;
use cm_core::{Address, Money};

/// Current catalog facts about one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub price: Money,
    pub in_stock: bool,
}

/// Read access to the product catalog. The order manager resolves every
/// line against this at creation time; the resolved prices become the
/// order's permanent snapshot.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// `Ok(None)` means the product id does not exist.
    async fn get_product(&self, product_id: &str) -> Result<Option<Product>>;
}

/// Read access to saved shipping addresses.
#[async_trait]
pub trait AddressProvider: Send + Sync {
    async fn default_address(&self, customer_id: &str) -> Result<Option<Address>>;
}
