use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::activation::{ActivationController, ActivationState};
use crate::error::MintError;
use crate::hooks::{Hooks, Notifier, Pollers};
use crate::ledger::ProofLedger;
use crate::mint::{KeysetMergePolicy, MintApi, MintView};
use crate::store::impl_redb::StoreError;
use crate::store::{KvStore, Slots, Snapshot};
use crate::types::{
    sanitize_url, unit_label, BlindSignature, BlindSignatureAudit, KeyRecord, Mint, Proof,
    CURRENCY_UNIT_SAT,
};

#[derive(Debug)]
//
#[derive(strum::EnumIs, thiserror::Error)]
pub enum RegistryError<E: StdError = StoreError> {
    #[error("{0}")]
    Mint(#[from] MintError),
    /// restore snapshot without the first-run flag
    #[error("Unrecognized backup")]
    UnrecognizedBackup,
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// custum error
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
    #[error("{0}")]
    Store(E),
}

pub(crate) type Error<E> = RegistryError<E>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// success notifications for routine operations
    pub verbose: bool,
    /// active unit of a fresh store
    pub default_unit: String,
    pub keyset_merge: KeysetMergePolicy,
    pub slots: Slots,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            default_unit: CURRENCY_UNIT_SAT.to_owned(),
            keyset_merge: KeysetMergePolicy::default(),
            slots: Slots::default(),
        }
    }
}

impl RegistryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose(mut self, b: bool) -> Self {
        self.verbose = b;
        self
    }

    pub fn default_unit(mut self, unit: &str) -> Self {
        if !unit.is_empty() {
            self.default_unit = unit.to_owned();
        }
        self
    }

    pub fn keyset_merge(mut self, policy: KeysetMergePolicy) -> Self {
        self.keyset_merge = policy;
        self
    }

    pub fn slots(mut self, slots: Slots) -> Self {
        self.slots = slots;
        self
    }
}

/// Everything the registry persists, in memory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RegistryState {
    /// empty for none
    pub active_mint_url: String,
    pub active_unit: String,
    pub mints: Vec<Mint>,
    pub ledger: ProofLedger,
}

impl RegistryState {
    pub fn mint(&self, url: &str) -> Option<&Mint> {
        self.mints.iter().find(|m| m.url == url)
    }

    pub fn active_mint(&self) -> Option<&Mint> {
        if self.active_mint_url.is_empty() {
            return None;
        }
        self.mint(&self.active_mint_url)
    }

    pub fn view<'a>(&'a self, mint: &'a Mint) -> MintView<'a> {
        MintView::new(mint, self.ledger.proofs())
    }

    /// unit of a keyset on any known mint, active or not
    pub fn keyset_unit(&self, keyset_id: &str) -> Option<&str> {
        self.mints
            .iter()
            .flat_map(|m| m.keysets.iter())
            .find(|k| k.id == keyset_id)
            .map(|k| k.unit.as_str())
    }

    /// proofs of the active mint in the active unit
    pub fn active_proofs(&self) -> Vec<&Proof> {
        let mint = match self.active_mint() {
            Some(m) => m,
            None => return vec![],
        };
        let ids = mint
            .keysets
            .iter()
            .filter(|k| k.unit == self.active_unit)
            .map(|k| k.id.as_str())
            .collect::<Vec<_>>();

        self.ledger
            .proofs()
            .iter()
            .filter(|p| ids.contains(&p.id.as_str()))
            .collect()
    }

    /// active unit over every mint
    pub fn active_balance(&self) -> u64 {
        self.ledger
            .proofs()
            .iter()
            .filter(|p| self.keyset_unit(&p.id) == Some(self.active_unit.as_str()))
            .map(|p| p.amount)
            .sum()
    }

    pub fn active_mint_balance(&self) -> u64 {
        self.active_mint()
            .map(|m| self.view(m).unit_balance(&self.active_unit))
            .unwrap_or(0)
    }
}

pub(crate) fn state_read(
    state: &RwLock<RegistryState>,
) -> Result<RwLockReadGuard<'_, RegistryState>, MintError> {
    let r = state
        .read()
        .map_err(|e| format_err!("registry read {}", e))?;
    Ok(r)
}

pub(crate) fn state_write(
    state: &RwLock<RegistryState>,
) -> Result<RwLockWriteGuard<'_, RegistryState>, MintError> {
    let w = state
        .write()
        .map_err(|e| format_err!("registry write {}", e))?;
    Ok(w)
}

/// The wallet's mints, active pointers and proofs, persisted in `S`.
pub struct MintRegistry<S, A>
where
    S: KvStore,
    A: MintApi,
{
    store: S,
    api: A,
    options: RegistryOptions,
    state: RwLock<RegistryState>,
    activation: ActivationController,
    hooks: Hooks,
}

impl<S, A> MintRegistry<S, A>
where
    S: KvStore,
    A: MintApi,
{
    /// empty state, call `reload` (or use `load`) to read the store
    pub fn new(store: S, api: A, options: RegistryOptions) -> Result<Self, Error<S::Error>> {
        options.slots.check()?;

        let state = RegistryState {
            active_unit: options.default_unit.clone(),
            ..Default::default()
        };

        Ok(Self {
            store,
            api,
            options,
            state: RwLock::new(state),
            activation: ActivationController::new(),
            hooks: Hooks::default(),
        })
    }

    pub async fn load(store: S, api: A, options: RegistryOptions) -> Result<Self, Error<S::Error>> {
        let this = Self::new(store, api, options)?;
        this.reload().await?;
        Ok(this)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.hooks.notifier = notifier;
        self
    }

    pub fn with_pollers(mut self, pollers: Arc<dyn Pollers>) -> Self {
        self.hooks.pollers = pollers;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn activation_state(&self) -> ActivationState {
        self.activation.state()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>, MintError> {
        state_read(&self.state)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>, MintError> {
        state_write(&self.state)
    }

    /// copy of the whole state
    pub fn state(&self) -> Result<RegistryState, Error<S::Error>> {
        Ok(self.read()?.clone())
    }

    pub fn mints(&self) -> Result<Vec<Mint>, Error<S::Error>> {
        Ok(self.read()?.mints.clone())
    }

    pub fn mint(&self, url: &str) -> Result<Mint, Error<S::Error>> {
        let m = self
            .read()?
            .mint(url)
            .cloned()
            .ok_or_else(|| MintError::MintNotFound(url.to_owned()))?;
        Ok(m)
    }

    pub fn active_mint_url(&self) -> Result<String, Error<S::Error>> {
        Ok(self.read()?.active_mint_url.clone())
    }

    pub fn active_unit(&self) -> Result<String, Error<S::Error>> {
        Ok(self.read()?.active_unit.clone())
    }

    pub fn active_unit_label(&self) -> Result<String, Error<S::Error>> {
        let r = self.read()?;
        Ok(unit_label(&r.active_unit).to_owned())
    }

    pub fn active_mint(&self) -> Result<Mint, Error<S::Error>> {
        let m = self
            .read()?
            .active_mint()
            .cloned()
            .ok_or(MintError::NoActiveMint)?;
        Ok(m)
    }

    pub fn proofs(&self) -> Result<Vec<Proof>, Error<S::Error>> {
        Ok(self.read()?.ledger.proofs().to_vec())
    }

    pub fn spent_proofs(&self) -> Result<Vec<Proof>, Error<S::Error>> {
        Ok(self.read()?.ledger.spent_proofs().to_vec())
    }

    pub fn blind_signatures(&self) -> Result<Vec<BlindSignatureAudit>, Error<S::Error>> {
        Ok(self.read()?.ledger.blind_signatures().to_vec())
    }

    pub fn active_proofs(&self) -> Result<Vec<Proof>, Error<S::Error>> {
        let r = self.read()?;
        Ok(r.active_proofs().into_iter().cloned().collect())
    }

    pub fn active_balance(&self) -> Result<u64, Error<S::Error>> {
        Ok(self.read()?.active_balance())
    }

    pub fn active_mint_balance(&self) -> Result<u64, Error<S::Error>> {
        Ok(self.read()?.active_mint_balance())
    }

    /// unit => balance of one mint
    pub fn balances(&self, url: &str) -> Result<BTreeMap<String, u64>, Error<S::Error>> {
        let r = self.read()?;
        let mint = r
            .mint(url)
            .ok_or_else(|| MintError::MintNotFound(url.to_owned()))?;
        Ok(r.view(mint).all_balances())
    }

    /// key material of a keyset on the active mint
    pub fn get_keys_for_keyset(&self, keyset_id: &str) -> Result<KeyRecord, Error<S::Error>> {
        let r = self.read()?;
        let mint = r.active_mint().ok_or(MintError::NoActiveMint)?;
        let keys = mint
            .keys_for(keyset_id)
            .cloned()
            .ok_or_else(|| MintError::KeysNotFound(keyset_id.to_owned()))?;
        Ok(keys)
    }

    /// Sanitize `url`, insert it and activate it.
    ///
    /// A known url is returned as is, without activation. A mint inserted here is
    /// dropped again if its activation fails.
    pub async fn add_mint(
        &self,
        url: &str,
        nickname: Option<&str>,
    ) -> Result<Mint, Error<S::Error>> {
        let url = sanitize_url(url);

        let inserted = {
            let mut w = self.write()?;
            if w.mint(&url).is_some() {
                false
            } else {
                w.mints
                    .push(Mint::new(url.clone(), nickname.map(|s| s.to_owned())));
                true
            }
        };

        if !inserted {
            debug!("add_mint {} already known", url);
            if self.options.verbose {
                self.hooks.notify_success("Mint already added");
            }
            return self.mint(&url);
        }

        let mint = self.mint(&url)?;
        if let Err(e) = self.activate_mint(&mint, false).await {
            let mut w = self.write()?;
            w.mints.retain(|m| m.url != url);
            warn!("add_mint {} dropped: {}", url, e);
            return Err(e);
        }

        self.persist_mints().await?;
        if self.options.verbose {
            self.hooks.notify_success("Mint added");
        }

        self.mint(&url)
    }

    /// Remove a mint, then activate the first remaining one if any.
    ///
    /// `url` matches as given first, then sanitized. Returns false if it was unknown.
    pub async fn remove_mint(&self, url: &str) -> Result<bool, Error<S::Error>> {
        let next = {
            let mut w = self.write()?;
            // restored records may hold a url that was never sanitized
            let url = if w.mint(url).is_some() {
                url.to_owned()
            } else {
                sanitize_url(url)
            };

            let before = w.mints.len();
            w.mints.retain(|m| m.url != url);
            if w.mints.len() == before {
                return Ok(false);
            }

            if w.active_mint_url == url {
                w.active_mint_url.clear();
            }
            w.mints.first().cloned()
        };

        self.persist_mints().await?;
        self.persist_pointers().await?;
        if self.options.verbose {
            self.hooks.notify_success("Mint removed");
        }

        if let Some(m) = next {
            self.activate_mint(&m, false).await?;
        }

        Ok(true)
    }

    /// Returns whether an activation actually ran.
    pub async fn activate_mint(&self, mint: &Mint, force: bool) -> Result<bool, Error<S::Error>> {
        let ran = self
            .activation
            .activate_mint(
                &self.state,
                &self.api,
                &self.hooks,
                self.options.keyset_merge,
                mint,
                force,
            )
            .await;

        let ran = match ran {
            Ok(ran) => ran,
            Err(e) => {
                // the rolled back pointer may differ from what is stored
                if let Err(pe) = self.persist_pointers().await {
                    warn!("persist pointers after failed activation: {}", pe);
                }
                return Err(e.into());
            }
        };

        if ran {
            self.persist_mints().await?;
            self.persist_pointers().await?;
            if self.options.verbose {
                self.hooks.notify_success("Mint activated.");
            }
        }

        Ok(ran)
    }

    /// activate the mint known by `url`, then `unit` on it
    pub async fn activate_mint_url(
        &self,
        url: &str,
        force: bool,
        unit: Option<&str>,
    ) -> Result<bool, Error<S::Error>> {
        let mint = self.mint(&sanitize_url(url))?;
        let ran = self.activate_mint(&mint, force).await?;

        if let Some(u) = unit {
            self.activate_unit(u).await?;
        }

        Ok(ran)
    }

    /// Repair an active pointer that matches no mint by activating the first mint.
    pub async fn ensure_active_mint(&self) -> Result<Option<Mint>, Error<S::Error>> {
        let (current, first, pointer) = {
            let r = self.read()?;
            (
                r.active_mint().cloned(),
                r.mints.first().cloned(),
                r.active_mint_url.clone(),
            )
        };
        if current.is_some() {
            return Ok(current);
        }

        match first {
            Some(m) => {
                warn!("active mint {:?} not found, use {}", pointer, m.url);
                self.activate_mint(&m, false).await?;
                Ok(Some(self.active_mint()?))
            }
            None => {
                let dangling = {
                    let mut w = self.write()?;
                    let dangling = !w.active_mint_url.is_empty();
                    w.active_mint_url.clear();
                    dangling
                };
                if dangling {
                    self.persist_pointers().await?;
                }
                Ok(None)
            }
        }
    }

    pub async fn activate_unit(&self, unit: &str) -> Result<(), Error<S::Error>> {
        self.write()?.activate_unit(unit)?;
        self.persist_pointers().await
    }

    /// next unit of the active mint
    pub async fn toggle_unit(&self) -> Result<String, Error<S::Error>> {
        let unit = self.write()?.toggle_unit()?.to_owned();
        self.persist_pointers().await?;
        Ok(unit)
    }

    /// replace the record stored under `old.url`, `new.url` must not belong to another mint
    pub async fn update_mint(&self, old: &Mint, new: Mint) -> Result<(), Error<S::Error>> {
        {
            let mut w = self.write()?;
            let idx = w
                .mints
                .iter()
                .position(|m| m.url == old.url)
                .ok_or_else(|| MintError::MintNotFound(old.url.clone()))?;
            if new.url != old.url && w.mint(&new.url).is_some() {
                return Err(format_err!("mint {} already exists", new.url).into());
            }

            if w.active_mint_url == old.url {
                w.active_mint_url = new.url.clone();
            }
            w.mints[idx] = new;
        }

        self.persist_mints().await?;
        self.persist_pointers().await
    }

    /// Every proof must reference a keyset of a known mint.
    pub async fn add_proofs(&self, proofs: &[Proof]) -> Result<(), Error<S::Error>> {
        {
            let mut w = self.write()?;
            if let Some(p) = proofs.iter().find(|p| w.keyset_unit(&p.id).is_none()) {
                return Err(MintError::KeysetNotFound(p.id.clone()).into());
            }
            w.ledger.add_proofs(proofs)?;
        }

        self.persist_proofs().await
    }

    pub async fn remove_proofs(&self, proofs: &[Proof]) -> Result<usize, Error<S::Error>> {
        let removed = self.write()?.ledger.remove_proofs(proofs);

        self.persist_proofs().await?;
        self.persist_spent_proofs().await?;
        Ok(removed)
    }

    pub async fn append_audit(
        &self,
        signature: BlindSignature,
        amount: u64,
        secret: &[u8],
        r: &[u8],
    ) -> Result<BlindSignatureAudit, Error<S::Error>> {
        let audit = self
            .write()?
            .ledger
            .append_audit(signature, amount, secret, r)
            .clone();

        self.persist_blind_signatures().await?;
        Ok(audit)
    }

    pub async fn backup(&self) -> Result<Snapshot, Error<S::Error>> {
        crate::store::backup(&self.store)
            .await
            .map_err(Error::Store)
    }

    /// Overwrite the store with `snapshot`, then reload from it.
    pub async fn restore_from_backup(&self, snapshot: &Snapshot) -> Result<usize, Error<S::Error>> {
        let restored = crate::store::restore(&self.store, snapshot, &self.options.slots).await;

        let restored = match restored {
            Ok(n) => n,
            Err(e) => {
                self.hooks
                    .notify_error(&e.to_string(), Some("Restore failed"));
                return Err(e);
            }
        };

        self.reload().await?;
        self.hooks.notify_success("Backup restored");
        Ok(restored)
    }

    /// Replace the in-memory state with what the store holds, defaults for missing slots.
    pub async fn reload(&self) -> Result<(), Error<S::Error>> {
        let slots = &self.options.slots;

        let active_mint_url = self
            .load_string(&slots.active_mint_url)
            .await?
            .unwrap_or_default();
        let active_unit = self
            .load_string(&slots.active_unit)
            .await?
            .unwrap_or_else(|| self.options.default_unit.clone());
        let mints: Vec<Mint> = self.load_slot(&slots.mints).await?.unwrap_or_default();
        let proofs = self.load_slot(&slots.proofs).await?.unwrap_or_default();
        let spent_proofs = self.load_slot(&slots.spent_proofs).await?.unwrap_or_default();
        let blind_signatures = self
            .load_slot(&slots.blind_signatures)
            .await?
            .unwrap_or_default();

        let state = RegistryState {
            active_mint_url,
            active_unit,
            mints,
            ledger: ProofLedger::new(proofs, spent_proofs, blind_signatures),
        };
        if !state.active_mint_url.is_empty() && state.active_mint().is_none() {
            warn!("active mint {} is not a known mint", state.active_mint_url);
        }
        debug!(
            "reload: {} mints, {} proofs, active {:?} {}",
            state.mints.len(),
            state.ledger.proofs().len(),
            state.active_mint_url,
            state.active_unit
        );

        *self.write()? = state;
        Ok(())
    }

    async fn load_slot<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error<S::Error>> {
        let json = self.store.load(key).await.map_err(Error::Store)?;
        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    // a plain string slot may have been written without json quotes
    async fn load_string(&self, key: &str) -> Result<Option<String>, Error<S::Error>> {
        let raw = self.store.load(key).await.map_err(Error::Store)?;
        Ok(raw.map(|s| serde_json::from_str::<String>(&s).unwrap_or(s)))
    }

    async fn save_json(&self, key: &str, json: String) -> Result<(), Error<S::Error>> {
        self.store.save(key, &json).await.map_err(Error::Store)
    }

    async fn persist_pointers(&self) -> Result<(), Error<S::Error>> {
        let (url, unit) = {
            let r = self.read()?;
            (
                serde_json::to_string(&r.active_mint_url)?,
                serde_json::to_string(&r.active_unit)?,
            )
        };

        let slots = &self.options.slots;
        self.save_json(&slots.active_mint_url, url).await?;
        self.save_json(&slots.active_unit, unit).await
    }

    async fn persist_mints(&self) -> Result<(), Error<S::Error>> {
        let json = serde_json::to_string(&self.read()?.mints)?;
        self.save_json(&self.options.slots.mints, json).await
    }

    async fn persist_proofs(&self) -> Result<(), Error<S::Error>> {
        let json = serde_json::to_string(self.read()?.ledger.proofs())?;
        self.save_json(&self.options.slots.proofs, json).await
    }

    async fn persist_spent_proofs(&self) -> Result<(), Error<S::Error>> {
        let json = serde_json::to_string(self.read()?.ledger.spent_proofs())?;
        self.save_json(&self.options.slots.spent_proofs, json).await
    }

    async fn persist_blind_signatures(&self) -> Result<(), Error<S::Error>> {
        let json = serde_json::to_string(self.read()?.ledger.blind_signatures())?;
        self.save_json(&self.options.slots.blind_signatures, json)
            .await
    }
}
