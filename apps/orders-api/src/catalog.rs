//! File-backed catalog and address collaborators.
//!
//! The order service only reads from these; they stand in for whatever
//! product and customer systems the storefront runs. Both load once at
//! startup from JSON files.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cm_core::{Address, Money};
use cm_orders::{AddressProvider, CatalogProvider, Product};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ProductRecord {
    price_cents: i64,
    #[serde(default = "default_in_stock")]
    in_stock: bool,
}

fn default_in_stock() -> bool {
    true
}

/// Catalog loaded from a `{product_id: {price_cents, in_stock}}` file.
pub struct FileCatalog {
    products: HashMap<String, Product>,
}

impl FileCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("read catalog {}", path.as_ref().display()))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let records: HashMap<String, ProductRecord> =
            serde_json::from_str(raw).context("parse catalog JSON")?;
        let products = records
            .into_iter()
            .map(|(id, rec)| {
                (
                    id,
                    Product {
                        price: Money::from_cents(rec.price_cents),
                        in_stock: rec.in_stock,
                    },
                )
            })
            .collect();
        Ok(Self { products })
    }
}

#[async_trait]
impl CatalogProvider for FileCatalog {
    async fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
        Ok(self.products.get(product_id).cloned())
    }
}

/// Saved default addresses, keyed by customer id.
pub struct FileAddressBook {
    addresses: HashMap<String, Address>,
}

impl FileAddressBook {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("read address book {}", path.as_ref().display()))?;
        let addresses = serde_json::from_str(&raw).context("parse address book JSON")?;
        Ok(Self { addresses })
    }

    pub fn empty() -> Self {
        Self {
            addresses: HashMap::new(),
        }
    }
}

#[async_trait]
impl AddressProvider for FileAddressBook {
    async fn default_address(&self, customer_id: &str) -> Result<Option<Address>> {
        Ok(self.addresses.get(customer_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn catalog_parses_and_serves_products() {
        let catalog = FileCatalog::from_json(
            r#"{
                "tee-1": {"price_cents": 1999},
                "hoodie-1": {"price_cents": 4999, "in_stock": false}
            }"#,
        )
        .unwrap();

        let tee = catalog.get_product("tee-1").await.unwrap().unwrap();
        assert_eq!(tee.price.cents(), 1_999);
        assert!(tee.in_stock);

        let hoodie = catalog.get_product("hoodie-1").await.unwrap().unwrap();
        assert!(!hoodie.in_stock);

        assert!(catalog.get_product("ghost").await.unwrap().is_none());
    }

    #[test]
    fn bad_catalog_json_is_an_error() {
        assert!(FileCatalog::from_json("not json").is_err());
    }
}
