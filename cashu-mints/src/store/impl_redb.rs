pub use redb;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeMap as Map;
use std::sync::Arc;
use strum::EnumIs;

use super::KvStore;
use crate::registry::RegistryError;

pub const TABLE_KV: &str = "kv";

/// redb wrap, one `<key, value>` table
pub struct Redb {
    table: &'static str,
    db: Database,
}

impl Redb {
    pub fn new(db: Database, table: &'static str) -> Result<Arc<Redb>, StoreError> {
        if table.is_empty() {
            return Err(format_err!("empty table name").into());
        }

        let this = Self { db, table };
        this.init()?;

        Ok(Arc::new(this))
    }

    pub fn open<P: AsRef<std::path::Path>>(
        dbpath: P,
        table: &'static str,
    ) -> Result<Arc<Redb>, StoreError> {
        let db = Database::builder().create(dbpath)?;

        Self::new(db, table)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn init(&self) -> Result<(), StoreError> {
        let tn = self.db.begin_write()?;
        {
            tn.open_table(self.definition_kv())?;
        }
        tn.commit()?;

        Ok(())
    }

    // <'a>: not use the self life
    ///
    /// <slot, json>
    #[inline]
    pub fn definition_kv<'a>(&self) -> TableDefinition<'static, &'a str, &'a str> {
        TableDefinition::new(self.table)
    }

    pub fn len(&self) -> Result<u64, StoreError> {
        let tn = self.database().begin_read()?;
        let table = tn.open_table(self.definition_kv())?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[derive(Debug)]
//
#[derive(EnumIs, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] redb::DatabaseError),
    #[error("{0}")]
    Commit(#[from] redb::CommitError),
    #[error("{0}")]
    Store(#[from] redb::StorageError),
    #[error("{0}")]
    Table(anyhow::Error),
    #[error("{0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("{0}")]
    Custom(#[from] anyhow::Error),
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        Self::Table(err.into())
    }
}

impl From<StoreError> for RegistryError<StoreError> {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

#[async_trait]
impl KvStore for Redb {
    type Error = StoreError;

    async fn load(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let tn = self.database().begin_read()?;
        let table = tn.open_table(self.definition_kv())?;

        let got = table.get(key)?.map(|v| v.value().to_owned());
        debug!("load {}: {}", key, got.as_ref().map(|s| s.len()).unwrap_or(0));
        Ok(got)
    }

    /// overwrite it
    async fn save(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        debug!("save {}: {}", key, value.len());

        let tn = self.database().begin_write()?;
        {
            let mut table = tn.open_table(self.definition_kv())?;
            table.insert(key, value)?;
        }
        tn.commit()?;

        Ok(())
    }

    async fn entries(&self) -> Result<Map<String, String>, Self::Error> {
        let tn = self.database().begin_read()?;
        let table = tn.open_table(self.definition_kv())?;

        let mut kvs = Map::new();
        for row in table.iter()? {
            let (k, v) = row?;
            kvs.insert(k.value().to_owned(), v.value().to_owned());
        }
        Ok(kvs)
    }
}
