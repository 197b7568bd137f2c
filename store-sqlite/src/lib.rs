#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;
#[macro_use]
extern crate async_trait;

pub use sqlx;

use cashu_mints::store::KvStore;
use cashu_mints::RegistryError;
use futures_util::StreamExt;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::Row;
use sqlx::SqlitePool;
use std::collections::BTreeMap as Map;
use strum::EnumIs;

/// table created by store-sqlite/migrations
pub const TABLE_KV: &str = "cashu_kv";

#[derive(Debug, Clone)]
pub struct LitePool {
    db: SqlitePool,
}

impl LitePool {
    pub async fn new(db: SqlitePool) -> Result<LitePool, StoreError> {
        let this = Self { db };
        this.init().await?;

        Ok(this)
    }

    /// https://docs.rs/sqlx-sqlite/0.7.1/sqlx_sqlite/struct.SqliteConnectOptions.html#impl-FromStr-for-SqliteConnectOptions
    pub async fn open(dbpath: &str) -> Result<LitePool, StoreError> {
        let opts = dbpath
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // prevent other thread open it
            .locking_mode(sqlx::sqlite::SqliteLockingMode::Exclusive)
            // or normal
            .synchronous(sqlx::sqlite::SqliteSynchronous::Full);

        info!("SqlitePool open: {:?}", opts);
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        Self::new(db).await
    }

    pub fn database(&self) -> &SqlitePool {
        &self.db
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../store-sqlite/migrations")
            .run(&self.db)
            .await
            .map_err(|e| format_err!("run sqlite migrations failed: {}", e))?;

        Ok(())
    }
}

#[derive(Debug)]
//
#[derive(EnumIs, thiserror::Error)]
pub enum StoreError {
    /// Json error
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(#[from] anyhow::Error),
    #[error("{0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for RegistryError<StoreError> {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

#[async_trait]
impl KvStore for LitePool {
    type Error = StoreError;

    async fn load(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let sql = format!("select value from {} where key=?;", TABLE_KV);

        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|r| r.get::<'_, String, _>(0)))
    }

    /// overwrite it
    async fn save(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        let sql = format!(
            "insert into {} (key, value) values(?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ;",
            TABLE_KV
        );

        debug!("save {}: {}", key, value.len());
        sqlx::query(&sql)
            .bind(key)
            .bind(value)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn entries(&self) -> Result<Map<String, String>, Self::Error> {
        let sql = format!("select key, value from {};", TABLE_KV);

        let mut iter = sqlx::query(&sql).fetch(&self.db);

        let mut kvs = Map::new();
        while let Some(it) = iter.next().await {
            let it = it?;
            kvs.insert(it.get::<'_, String, _>(0), it.get::<'_, String, _>(1));
        }

        Ok(kvs)
    }
}
