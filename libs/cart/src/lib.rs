//! Client-side cart persistence.
//!
//! The cart is an optimistic, locally persisted mapping of selected
//! items keyed by (product, variant). It survives process restarts and
//! merges duplicate selections deterministically: adding the same
//! (product, variant) pair again increments the existing line instead of
//! appending a second one. Prices carried on the lines are add-time
//! snapshots used for display only; the order service re-validates live
//! prices at checkout.

use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Context;
use cm_core::{CartLine, Money, StoreError};
use rusqlite::{Connection, params};
use tokio::task::spawn_blocking;

// The variant column is part of the primary key, and sqlite treats NULLs
// as distinct in unique constraints, so "no variant" is stored as ''.
const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cart_lines (
    cart_id TEXT NOT NULL,
    product_id TEXT NOT NULL,
    variant TEXT NOT NULL DEFAULT '',
    quantity INTEGER NOT NULL,
    unit_price_cents INTEGER NOT NULL,
    PRIMARY KEY (cart_id, product_id, variant)
);
"#;

/// Sqlite-backed cart store. Cheap to clone; all clones share one
/// connection behind a blocking mutex, accessed off the async runtime
/// via `spawn_blocking`.
#[derive(Clone)]
pub struct SqliteCartStore {
    conn: Arc<StdMutex<Connection>>,
}

impl SqliteCartStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("open cart database")?;
        Self::with_schema(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::with_schema(Connection::open_in_memory().context("open in-memory cart database")?)
    }

    fn with_schema(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(CREATE_TABLE_SQL)
            .context("create cart schema")?;
        Ok(Self {
            conn: Arc::new(StdMutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, func: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let guard = conn.lock().unwrap();
            func(&guard)
        })
        .await
        .map_err(|err| StoreError::Internal(err.into()))?
    }

    /// Adds `quantity` of a (product, variant) pair to the cart.
    ///
    /// Lookup-or-append: an existing line for the pair is incremented,
    /// never duplicated. The stored unit price is refreshed to the price
    /// seen on this add. Adding zero of something leaves the cart
    /// unchanged; stored lines always hold a quantity of at least one.
    pub async fn add_item(
        &self,
        cart_id: &str,
        product_id: &str,
        variant: Option<&str>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<(), StoreError> {
        if quantity == 0 {
            return Ok(());
        }
        let cart_id = cart_id.to_string();
        let product_id = product_id.to_string();
        let variant = variant.unwrap_or("").to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO cart_lines (cart_id, product_id, variant, quantity, unit_price_cents)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(cart_id, product_id, variant) DO UPDATE SET
                   quantity = quantity + excluded.quantity,
                   unit_price_cents = excluded.unit_price_cents",
                params![cart_id, product_id, variant, quantity, unit_price.cents()],
            )
            .map_err(|err| StoreError::Internal(err.into()))?;
            Ok(())
        })
        .await
    }

    /// Overwrites a line's quantity; zero removes the line. Removing a
    /// line that is already gone is an idempotent no-op.
    pub async fn set_quantity(
        &self,
        cart_id: &str,
        product_id: &str,
        variant: Option<&str>,
        quantity: u32,
    ) -> Result<(), StoreError> {
        let cart_id = cart_id.to_string();
        let product_id = product_id.to_string();
        let variant = variant.unwrap_or("").to_string();
        self.with_conn(move |conn| {
            if quantity == 0 {
                conn.execute(
                    "DELETE FROM cart_lines
                     WHERE cart_id = ?1 AND product_id = ?2 AND variant = ?3",
                    params![cart_id, product_id, variant],
                )
                .map_err(|err| StoreError::Internal(err.into()))?;
                return Ok(());
            }
            let affected = conn
                .execute(
                    "UPDATE cart_lines SET quantity = ?4
                     WHERE cart_id = ?1 AND product_id = ?2 AND variant = ?3",
                    params![cart_id, product_id, variant, quantity],
                )
                .map_err(|err| StoreError::Internal(err.into()))?;
            if affected == 0 {
                return Err(StoreError::NotFound(format!(
                    "cart line {product_id}/{variant}"
                )));
            }
            Ok(())
        })
        .await
    }

    /// All lines of a cart, in insertion order.
    pub async fn lines(&self, cart_id: &str) -> Result<Vec<CartLine>, StoreError> {
        let cart_id = cart_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT product_id, variant, quantity, unit_price_cents
                     FROM cart_lines WHERE cart_id = ?1 ORDER BY rowid",
                )
                .map_err(|err| StoreError::Internal(err.into()))?;
            let rows = stmt
                .query_map(params![cart_id], |row| {
                    let variant: String = row.get(1)?;
                    // Repeated upserts can push the i64 column past u32.
                    let quantity = u32::try_from(row.get::<_, i64>(2)?).map_err(|err| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Integer,
                            Box::new(err),
                        )
                    })?;
                    Ok(CartLine {
                        product_id: row.get(0)?,
                        variant: if variant.is_empty() {
                            None
                        } else {
                            Some(variant)
                        },
                        quantity,
                        unit_price: Money::from_cents(row.get(3)?),
                    })
                })
                .map_err(|err| StoreError::Internal(err.into()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|err| StoreError::Internal(err.into()))
        })
        .await
    }

    /// Display total from the add-time prices carried on the lines. The
    /// cart never re-fetches live prices; the order service re-validates
    /// them at checkout.
    pub async fn total(&self, cart_id: &str) -> Result<Money, StoreError> {
        let lines = self.lines(cart_id).await?;
        lines
            .iter()
            .map(CartLine::subtotal)
            .collect::<Option<Vec<_>>>()
            .and_then(Money::checked_sum)
            .ok_or_else(|| StoreError::Internal(anyhow::anyhow!("cart total overflow")))
    }

    /// Removes every line of the cart.
    ///
    /// Called by the client after a confirmed checkout. If the clear
    /// signal is lost, a non-empty cart next to a confirmed order is a
    /// display-only leftover: the client clears it on the next sync and
    /// never re-submits the same order from it.
    pub async fn clear(&self, cart_id: &str) -> Result<(), StoreError> {
        let cart_id = cart_id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM cart_lines WHERE cart_id = ?1", params![cart_id])
                .map_err(|err| StoreError::Internal(err.into()))?;
            Ok(())
        })
        .await
    }
}
