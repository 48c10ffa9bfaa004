use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;

/// Connection handle for the character store. Cheap to clone; the writer,
/// reader and ranking stores each hold their own copy of the pool.
#[derive(Clone)]
pub struct StoreClient {
    pool: SqlitePool,
}

impl StoreClient {
    /// Open (creating if missing) the database at the given SQLite URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new().max_connections(5).connect(url).await?;
        info!(url, "Connected to character store");
        Ok(Self { pool })
    }

    /// An isolated in-memory database. Capped at one connection: each
    /// in-memory connection is its own database.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
