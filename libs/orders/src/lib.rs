//! Server-side order lifecycle.
//!
//! Converts a client cart snapshot into an immutable order record and
//! advances that order through the fixed status machine. Catalog and
//! address lookups are external collaborators behind traits; the
//! manager only calls their read accessors.

pub mod manager;
pub mod memory;
pub mod providers;
pub mod store;

pub use manager::OrderManager;
pub use memory::MemoryOrderStore;
pub use providers::{AddressProvider, CatalogProvider, Product};
pub use store::{OrderStore, SqliteOrderStore};
