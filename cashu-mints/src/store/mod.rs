pub mod impl_redb;

use std::collections::BTreeMap as Map;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::sync::RwLock;

use crate::registry::RegistryError;

/// key => serialized value, as exported by `backup`
pub type Snapshot = Map<String, String>;

/// durable key-value cells
///
/// A read returns the last successful write, including writes made earlier in the process.
#[async_trait]
pub trait KvStore {
    type Error: StdError + Send + Sync;

    async fn load(&self, key: &str) -> Result<Option<String>, Self::Error>;
    async fn save(&self, key: &str, value: &str) -> Result<(), Self::Error>;
    async fn entries(&self) -> Result<Map<String, String>, Self::Error>;
}

#[async_trait]
impl<T> KvStore for std::sync::Arc<T>
where
    T: KvStore + Sync + Send,
{
    type Error = T::Error;

    async fn load(&self, key: &str) -> Result<Option<String>, Self::Error> {
        self.as_ref().load(key).await
    }
    async fn save(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.as_ref().save(key, value).await
    }
    async fn entries(&self) -> Result<Map<String, String>, Self::Error> {
        self.as_ref().entries().await
    }
}

/// key names of the persisted slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Slots {
    pub active_unit: String,
    pub active_mint_url: String,
    pub mints: String,
    pub proofs: String,
    pub spent_proofs: String,
    pub blind_signatures: String,
    /// a backup without it is not ours
    pub welcome_dialog_seen: String,
}

impl Default for Slots {
    fn default() -> Self {
        Self {
            active_unit: "cashu.activeUnit".to_owned(),
            active_mint_url: "cashu.activeMintUrl".to_owned(),
            mints: "cashu.mints".to_owned(),
            proofs: "cashu.proofs".to_owned(),
            spent_proofs: "cashu.spentProofs".to_owned(),
            blind_signatures: "cashu.blindSignatures".to_owned(),
            welcome_dialog_seen: "cashu.welcomeDialogSeen".to_owned(),
        }
    }
}

impl Slots {
    pub fn check(&self) -> anyhow::Result<()> {
        let strs = [
            self.active_unit.as_str(),
            self.active_mint_url.as_str(),
            self.mints.as_str(),
            self.proofs.as_str(),
            self.spent_proofs.as_str(),
            self.blind_signatures.as_str(),
            self.welcome_dialog_seen.as_str(),
        ];
        let mut names = strs.iter().filter(|s| !s.is_empty()).collect::<Vec<_>>();
        if names.len() != strs.len() {
            bail!("empty slot name");
        }

        names.sort();
        names.dedup();
        if names.len() != strs.len() {
            bail!("duplicate slot name");
        }

        Ok(())
    }
}

/// Lives as long as the process, nothing reaches the disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    kvs: RwLock<Map<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<Snapshot> for MemoryStore {
    fn from(kvs: Snapshot) -> Self {
        Self {
            kvs: RwLock::new(kvs),
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    type Error = Infallible;

    async fn load(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let kvs = self.kvs.read().unwrap_or_else(|e| e.into_inner());
        Ok(kvs.get(key).cloned())
    }
    async fn save(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        let mut kvs = self.kvs.write().unwrap_or_else(|e| e.into_inner());
        kvs.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
    async fn entries(&self) -> Result<Map<String, String>, Self::Error> {
        let kvs = self.kvs.read().unwrap_or_else(|e| e.into_inner());
        Ok(kvs.clone())
    }
}

/// every slot of the store, unfiltered
pub async fn backup<S: KvStore>(store: &S) -> Result<Snapshot, S::Error> {
    let kvs = store.entries().await?;
    debug!("backup: {} keys", kvs.len());
    Ok(kvs)
}

/// Overwrite the store with `snapshot` verbatim.
///
/// Rejected without writing anything unless the snapshot carries a non-empty sentinel slot.
pub async fn restore<S: KvStore>(
    store: &S,
    snapshot: &Snapshot,
    slots: &Slots,
) -> Result<usize, RegistryError<S::Error>> {
    let seen = snapshot
        .get(&slots.welcome_dialog_seen)
        .filter(|v| !v.is_empty());
    if seen.is_none() {
        return Err(RegistryError::UnrecognizedBackup);
    }

    for (k, v) in snapshot {
        store.save(k, v).await.map_err(RegistryError::Store)?;
    }
    debug!("restore: {} keys", snapshot.len());

    Ok(snapshot.len())
}

// #[cfg(test)]
pub mod tests {
    use super::*;

    use crate::types::tests::{MINT_URL, MINT_URL_TEST as MINT_URL2};

    pub fn tmpfi(f: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmpdir = tempfile::TempDir::new().unwrap();
        let tf = tmpdir.as_ref().join(f);
        println!("{}", tf.display());
        (tmpdir, tf)
    }

    pub async fn test_kv<S: KvStore>(store: &S) -> Result<(), S::Error> {
        let slots = Slots::default();

        assert_eq!(store.load(&slots.mints).await?, None);

        let mints = format!(r#"[{{"url":"{}"}}]"#, MINT_URL);
        store.save(&slots.mints, &mints).await?;
        store.save(&slots.active_mint_url, "\"\"").await?;
        assert_eq!(store.load(&slots.mints).await?.as_deref(), Some(mints.as_str()));
        assert_eq!(store.load(&slots.active_mint_url).await?.as_deref(), Some("\"\""));

        // overwrite, never append
        let mints2 = format!(r#"[{{"url":"{}"}},{{"url":"{}"}}]"#, MINT_URL, MINT_URL2);
        store.save(&slots.mints, &mints2).await?;
        assert_eq!(store.load(&slots.mints).await?.as_deref(), Some(mints2.as_str()));

        let unit = "\"sat\u{26a1}\"";
        store.save(&slots.active_unit, unit).await?;
        assert_eq!(store.load(&slots.active_unit).await?.as_deref(), Some(unit));

        let all = store.entries().await?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[&slots.mints], mints2);

        Ok(())
    }

    pub async fn test_backup_restore<S: KvStore>(store: &S) -> Result<(), RegistryError<S::Error>> {
        let slots = Slots::default();

        store
            .save(&slots.active_unit, "\"usd\"")
            .await
            .map_err(RegistryError::Store)?;
        store
            .save(&slots.welcome_dialog_seen, "true")
            .await
            .map_err(RegistryError::Store)?;

        let snapshot = backup(store).await.map_err(RegistryError::Store)?;
        assert_eq!(snapshot.len(), 2);

        // missing sentinel
        let mut bad = Snapshot::new();
        bad.insert(slots.active_unit.clone(), "\"eur\"".to_owned());
        let e = restore(store, &bad, &slots).await.unwrap_err();
        assert!(e.is_unrecognized_backup());

        // empty sentinel
        bad.insert(slots.welcome_dialog_seen.clone(), String::new());
        let e = restore(store, &bad, &slots).await.unwrap_err();
        assert!(e.is_unrecognized_backup());
        let unit = store.load(&slots.active_unit).await.map_err(RegistryError::Store)?;
        assert_eq!(unit.as_deref(), Some("\"usd\""));

        let mut good = snapshot.clone();
        good.insert(slots.active_unit.clone(), "\"eur\"".to_owned());
        good.insert("unrelated.key".to_owned(), "1".to_owned());
        assert_eq!(restore(store, &good, &slots).await?, 3);

        let after = backup(store).await.map_err(RegistryError::Store)?;
        assert_eq!(after, good);

        Ok(())
    }

    #[test]
    fn test_slots_check() {
        assert!(Slots::default().check().is_ok());

        let mut s = Slots::default();
        s.proofs = String::new();
        assert_eq!(s.check().unwrap_err().to_string(), "empty slot name");

        // duplicates that are not neighbours
        let mut s = Slots::default();
        s.welcome_dialog_seen = s.active_unit.clone();
        assert_eq!(s.check().unwrap_err().to_string(), "duplicate slot name");
    }

    #[tokio::test]
    async fn it_works_memory_kv() {
        let store = MemoryStore::new();
        test_kv(&store).await.unwrap();
    }

    #[tokio::test]
    async fn it_works_memory_backup_restore() {
        let store = std::sync::Arc::new(MemoryStore::new());
        test_backup_restore(&store).await.unwrap();
    }
}
