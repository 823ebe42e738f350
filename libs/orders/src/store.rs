use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use cm_core::{Address, Money, Order, OrderLine, OrderStatus, PaymentMethod, StoreError};
use rusqlite::{Connection, Row, params};
use tokio::task::spawn_blocking;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL,
    status TEXT NOT NULL,
    total_cents INTEGER NOT NULL,
    lines TEXT NOT NULL,
    shipping_address TEXT NOT NULL,
    payment_method TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Order persistence. Writes are whole records; the one partial write is
/// the conditional status update used for optimistic check-then-write.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;
    async fn get(&self, order_id: &str) -> Result<Option<Order>, StoreError>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<Order>, StoreError>;
    /// Writes `next` only if the stored status still equals `expected`.
    /// Returns whether a row was written; a `false` means the caller
    /// lost a race and must re-read before retrying.
    async fn set_status_if(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: &str,
    ) -> Result<bool, StoreError>;
}

/// Sqlite-backed [`OrderStore`]. Lines and the address snapshot are
/// serialized as JSON inside the row.
#[derive(Clone)]
pub struct SqliteOrderStore {
    conn: Arc<StdMutex<Connection>>,
}

impl SqliteOrderStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("open orders database")?;
        Self::with_schema(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::with_schema(Connection::open_in_memory().context("open in-memory orders database")?)
    }

    fn with_schema(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(CREATE_TABLE_SQL)
            .context("create orders schema")?;
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
}

fn order_from_row(row: &Row<'_>) -> Result<Order, StoreError> {
    let status: String = row.get(2).map_err(internal)?;
    let lines_json: String = row.get(4).map_err(internal)?;
    let address_json: String = row.get(5).map_err(internal)?;
    let payment: String = row.get(6).map_err(internal)?;

    let lines: Vec<OrderLine> = serde_json::from_str(&lines_json).map_err(internal)?;
    let shipping_address: Address = serde_json::from_str(&address_json).map_err(internal)?;
    Ok(Order {
        id: row.get(0).map_err(internal)?,
        customer_id: row.get(1).map_err(internal)?,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        total: Money::from_cents(row.get(3).map_err(internal)?),
        lines,
        shipping_address,
        payment_method: payment
            .parse::<PaymentMethod>()
            .map_err(|e: String| anyhow!(e))?,
        created_at: row.get(7).map_err(internal)?,
        updated_at: row.get(8).map_err(internal)?,
    })
}

fn internal(err: impl Into<anyhow::Error>) -> StoreError {
    StoreError::Internal(err.into())
}

const SELECT_COLUMNS: &str = "id, customer_id, status, total_cents, lines, \
     shipping_address, payment_method, created_at, updated_at";

#[async_trait]
impl OrderStore for SqliteOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let order = order.clone();
        let lines = serde_json::to_string(&order.lines).map_err(internal)?;
        let address = serde_json::to_string(&order.shipping_address).map_err(internal)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO orders (id, customer_id, status, total_cents, lines,
                                     shipping_address, payment_method, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    order.id,
                    order.customer_id,
                    order.status.as_str(),
                    order.total.cents(),
                    lines,
                    address,
                    order.payment_method.as_str(),
                    order.created_at,
                    order.updated_at,
                ],
            )
            .map_err(internal)?;
            Ok(())
        })
        .await
    }

    async fn get(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        let id = order_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {SELECT_COLUMNS} FROM orders WHERE id = ?1"))
                .map_err(internal)?;
            let mut rows = stmt.query(params![id]).map_err(internal)?;
            match rows.next().map_err(internal)? {
                Some(row) => Ok(Some(order_from_row(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Order>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM orders ORDER BY created_at DESC, rowid DESC"
                ))
                .map_err(internal)?;
            let mut rows = stmt.query([]).map_err(internal)?;
            let mut orders = Vec::new();
            while let Some(row) = rows.next().map_err(internal)? {
                orders.push(order_from_row(row)?);
            }
            Ok(orders)
        })
        .await
    }

    async fn set_status_if(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: &str,
    ) -> Result<bool, StoreError> {
        let id = order_id.to_string();
        let updated_at = updated_at.to_string();
        self.with_conn(move |conn| {
            let affected = conn
                .execute(
                    "UPDATE orders SET status = ?1, updated_at = ?2
                     WHERE id = ?3 AND status = ?4",
                    params![next.as_str(), updated_at, id, expected.as_str()],
                )
                .map_err(internal)?;
            Ok(affected == 1)
        })
        .await
    }
}
