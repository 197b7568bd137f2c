use strum::{AsRefStr, Display, EnumIs, EnumString};

use super::client::MintApi;
use crate::error::{MintError as Error, SyncStage};
use crate::types::{Keyset, Mint};

/// How a fresh keyset listing is folded into the stored one.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
//
#[derive(Display, AsRefStr, EnumIs, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum KeysetMergePolicy {
    /// stored list is overwritten: absent keysets and local active flags are lost
    #[default]
    Replace,
    /// update by id, append new ones, keep absent ones as inactive
    Merge,
}

/// Brings a mint record's info, keysets and keys up to date with what its API reports.
pub struct KeysetSynchronizer<'a, A: ?Sized> {
    api: &'a A,
    policy: KeysetMergePolicy,
}

impl<'a, A> KeysetSynchronizer<'a, A>
where
    A: MintApi + ?Sized,
{
    pub fn new(api: &'a A, policy: KeysetMergePolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> KeysetMergePolicy {
        self.policy
    }

    /// info, then keysets, then keys; stops at the first failure
    pub async fn sync(&self, mint: &mut Mint) -> Result<(), Error> {
        self.sync_info(mint).await?;
        self.sync_keysets(mint).await?;
        self.sync_keys(mint).await?;
        Ok(())
    }

    pub async fn sync_info(&self, mint: &mut Mint) -> Result<(), Error> {
        let info = self
            .api
            .get_info(&mint.url)
            .await
            .map_err(Error::sync(SyncStage::Info))?;
        debug!("{} info: {} {}", mint.url, info.name, info.version);

        mint.info = Some(info);
        Ok(())
    }

    pub async fn sync_keysets(&self, mint: &mut Mint) -> Result<(), Error> {
        let fetched = self
            .api
            .get_keysets(&mint.url)
            .await
            .map_err(Error::sync(SyncStage::Keysets))?
            .keysets;

        if fetched.is_empty() {
            warn!("{} returns no keysets, keep {}", mint.url, mint.keysets.len());
            return Ok(());
        }

        match self.policy {
            KeysetMergePolicy::Replace => mint.keysets = fetched,
            KeysetMergePolicy::Merge => merge_keysets(&mut mint.keysets, fetched),
        }
        debug!(
            "{} keysets {:?}: {:?}",
            mint.url,
            self.policy,
            mint.keysets.iter().map(|k| k.id.as_str()).collect::<Vec<_>>()
        );

        Ok(())
    }

    /// Fetch keys only for keysets that have none. Cached key records are never replaced.
    ///
    /// Returns how many key records were added.
    pub async fn sync_keys(&self, mint: &mut Mint) -> Result<usize, Error> {
        let before = mint.keys.len();

        if mint.keys.is_empty() {
            let res = self
                .api
                .get_keys(&mint.url, None)
                .await
                .map_err(Error::sync(SyncStage::Keys))?;
            mint.keys = res.keysets;
        }

        let missing = mint
            .keysets
            .iter()
            .filter(|k| mint.keys_for(&k.id).is_none())
            .map(|k| k.id.clone())
            .collect::<Vec<_>>();

        for id in missing {
            let res = self
                .api
                .get_keys(&mint.url, Some(&id))
                .await
                .map_err(Error::sync(SyncStage::Keys))?;

            let record = res
                .keysets
                .into_iter()
                .find(|k| k.id == id)
                .ok_or_else(|| Error::KeysNotFound(id.clone()))?;
            debug!("{} keys fetched for {}", mint.url, id);
            mint.keys.push(record);
        }

        Ok(mint.keys.len() - before)
    }
}

fn merge_keysets(stored: &mut Vec<Keyset>, fetched: Vec<Keyset>) {
    for k in stored.iter_mut() {
        if !fetched.iter().any(|f| f.id == k.id) {
            k.active = false;
        }
    }

    for f in fetched {
        match stored.iter_mut().find(|k| k.id == f.id) {
            Some(k) => *k = f,
            None => stored.push(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mint::client::tests::*;

    const URL: &str = "https://a.example";

    fn mock() -> MockMint {
        MockMint::new().with_mint(
            URL,
            MockMintData::with_units("A", &[(KEYS_SAT, "sat"), (KEYS_USD, "usd")]),
        )
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(KeysetMergePolicy::default(), KeysetMergePolicy::Replace);
        assert_eq!("merge".parse::<KeysetMergePolicy>().unwrap(), KeysetMergePolicy::Merge);
        assert_eq!(KeysetMergePolicy::Replace.to_string(), "replace");
        let js: KeysetMergePolicy = serde_json::from_str("\"merge\"").unwrap();
        assert!(js.is_merge());
    }

    #[tokio::test]
    async fn test_sync_fresh_mint() {
        let api = mock();
        let sync = KeysetSynchronizer::new(&api, KeysetMergePolicy::Replace);

        let mut m = Mint::new(URL, None);
        sync.sync(&mut m).await.unwrap();

        assert_eq!(m.info.as_ref().map(|i| i.name.as_str()), Some("A"));
        assert_eq!(m.keysets.len(), 2);
        assert_eq!(m.keys.len(), 2);
        // one bulk call covered both keysets
        assert_eq!(
            api.calls(),
            vec![
                format!("info {}", URL),
                format!("keysets {}", URL),
                format!("keys {} *", URL),
            ]
        );
    }

    #[tokio::test]
    async fn test_sync_keys_cached_not_refetched() {
        let api = mock();
        let sync = KeysetSynchronizer::new(&api, KeysetMergePolicy::Replace);

        let mut m = Mint::new(URL, None);
        sync.sync(&mut m).await.unwrap();
        let cached = m.keys.clone();

        // mint rotates: usd keys change upstream, a new eur keyset appears
        let mut data = MockMintData::with_units(
            "A",
            &[(KEYS_SAT, "sat"), (KEYS_USD, "usd"), (KEYS_EUR, "eur")],
        );
        data.keys[1].keys.insert(4, "02ffff".to_owned());
        api.set_mint(URL, data);
        api.clear_calls();

        sync.sync_keysets(&mut m).await.unwrap();
        let added = sync.sync_keys(&mut m).await.unwrap();

        assert_eq!(added, 1);
        assert_eq!(&m.keys[..2], &cached[..]);
        assert_eq!(m.keys[2].id, KEYS_EUR);
        assert_eq!(
            api.calls(),
            vec![format!("keysets {}", URL), format!("keys {} {}", URL, KEYS_EUR)]
        );
    }

    #[tokio::test]
    async fn test_sync_inactive_keyset_fetched_individually() {
        let mut data = MockMintData::with_units("A", &[(KEYS_SAT, "sat"), (KEYS_OLD, "sat")]);
        data.keysets[1].active = false;
        let api = MockMint::new().with_mint(URL, data);
        let sync = KeysetSynchronizer::new(&api, KeysetMergePolicy::Replace);

        let mut m = Mint::new(URL, None);
        sync.sync(&mut m).await.unwrap();

        assert_eq!(m.keys.len(), 2);
        assert!(m.keys_for(KEYS_OLD).is_some());
        assert!(api.calls().contains(&format!("keys {} {}", URL, KEYS_OLD)));
    }

    #[tokio::test]
    async fn test_sync_keys_not_found() {
        let mut data = MockMintData::with_units("A", &[(KEYS_SAT, "sat"), (KEYS_USD, "usd")]);
        data.keys.truncate(1);
        let api = MockMint::new().with_mint(URL, data);
        let sync = KeysetSynchronizer::new(&api, KeysetMergePolicy::Replace);

        let mut m = Mint::new(URL, None);
        let e = sync.sync(&mut m).await.unwrap_err();
        assert!(matches!(&e, Error::KeysNotFound(id) if id == KEYS_USD));
    }

    #[tokio::test]
    async fn test_sync_failure_stage() {
        let api = mock();
        api.fail_at(URL, SyncStage::Keysets);
        let sync = KeysetSynchronizer::new(&api, KeysetMergePolicy::Replace);

        let mut m = Mint::new(URL, None);
        let e = sync.sync(&mut m).await.unwrap_err();
        assert!(matches!(e, Error::Sync { stage: SyncStage::Keysets, .. }));
        assert!(m.keysets.is_empty());
        // keys never requested
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_drops_absent_keysets() {
        let api = mock();
        let sync = KeysetSynchronizer::new(&api, KeysetMergePolicy::Replace);

        let mut m = Mint::new(URL, None);
        m.keysets = vec![Keyset::new(KEYS_OLD, "sat", true), Keyset::new(KEYS_SAT, "sat", false)];
        sync.sync_keysets(&mut m).await.unwrap();

        assert_eq!(m.keysets.len(), 2);
        assert!(!m.has_keyset(KEYS_OLD));
        // local flag overwritten by the fresh listing
        assert!(m.keysets[0].active);
    }

    #[tokio::test]
    async fn test_merge_keeps_absent_keysets_inactive() {
        let api = mock();
        let sync = KeysetSynchronizer::new(&api, KeysetMergePolicy::Merge);

        let mut m = Mint::new(URL, None);
        m.keysets = vec![Keyset::new(KEYS_OLD, "sat", true), Keyset::new(KEYS_SAT, "sat", false)];
        sync.sync_keysets(&mut m).await.unwrap();

        let ids = m.keysets.iter().map(|k| k.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec![KEYS_OLD, KEYS_SAT, KEYS_USD]);
        assert!(!m.keysets[0].active);
        assert!(m.keysets[1].active);
        assert!(m.keysets[2].active);
    }

    #[tokio::test]
    async fn test_empty_listing_keeps_stored() {
        let mut data = MockMintData::with_units("A", &[]);
        data.keysets.clear();
        let api = MockMint::new().with_mint(URL, data);
        let sync = KeysetSynchronizer::new(&api, KeysetMergePolicy::Replace);

        let mut m = Mint::new(URL, None);
        m.keysets = vec![Keyset::new(KEYS_SAT, "sat", true)];
        sync.sync_keysets(&mut m).await.unwrap();
        assert_eq!(m.keysets.len(), 1);
    }
}
