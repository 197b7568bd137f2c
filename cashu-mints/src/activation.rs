//! Switching the active mint and unit.
//!
//! One activation runs at a time. A second caller waits for the lock and then re-checks
//! whether its mint became active meanwhile.

use std::sync::RwLock;
use strum::{AsRefStr, Display, EnumIs};
use tokio::sync::Mutex;

use crate::error::MintError as Error;
use crate::hooks::Hooks;
use crate::mint::{KeysetMergePolicy, KeysetSynchronizer, MintApi, MintView};
use crate::registry::{state_read, state_write, RegistryState};
use crate::types::Mint;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
//
#[derive(Display, AsRefStr, EnumIs)]
pub enum ActivationState {
    /// nothing activated by this controller yet
    #[default]
    Inactive,
    /// lock held, sync in flight
    Activating,
    Active,
    /// last attempt failed, the previous active url is back (or cleared if it was removed meanwhile)
    FailedRollback,
}

#[derive(Debug, Default)]
pub struct ActivationController {
    lock: Mutex<()>,
    phase: std::sync::Mutex<ActivationState>,
}

impl ActivationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ActivationState {
        match self.phase.lock() {
            Ok(s) => *s,
            Err(e) => *e.into_inner(),
        }
    }

    fn set_state(&self, state: ActivationState) {
        match self.phase.lock() {
            Ok(mut s) => *s = state,
            Err(e) => *e.into_inner() = state,
        }
    }

    /// Make `mint` the active one: fetch info, sync keysets and keys, pick a unit.
    ///
    /// Returns false without touching anything when `mint` is already active and not `force`.
    /// On failure the previous active url is restored and the error is returned.
    pub async fn activate_mint<A>(
        &self,
        registry: &RwLock<RegistryState>,
        api: &A,
        hooks: &Hooks,
        policy: KeysetMergePolicy,
        mint: &Mint,
        force: bool,
    ) -> Result<bool, Error>
    where
        A: MintApi + ?Sized,
    {
        if !force && is_active(registry, &mint.url)? {
            return Ok(false);
        }

        hooks.clear_all_workers();
        let _guard = self.lock.lock().await;

        if !force && is_active(registry, &mint.url)? {
            debug!("{} activated while waiting", mint.url);
            return Ok(false);
        }

        self.set_state(ActivationState::Activating);
        let previous = {
            let mut w = state_write(registry)?;
            std::mem::replace(&mut w.active_mint_url, mint.url.clone())
        };

        match sync_mint(registry, api, policy, mint).await {
            Ok(()) => {
                self.set_state(ActivationState::Active);
                info!("mint activated: {}", mint.url);
                Ok(true)
            }
            Err(e) => {
                error!("activate {} failed, back to {:?}: {}", mint.url, previous, e);
                match state_write(registry) {
                    Ok(mut w) => w.rollback_active_mint(previous),
                    Err(le) => error!("rollback {}: {}", mint.url, le),
                }
                self.set_state(ActivationState::FailedRollback);

                hooks.notify_error(&e.to_string(), Some("Mint activation"));
                Err(e)
            }
        }
    }
}

fn is_active(registry: &RwLock<RegistryState>, url: &str) -> Result<bool, Error> {
    Ok(state_read(registry)?.active_mint_url == url)
}

// works on a copy, the stored record only changes on success
async fn sync_mint<A>(
    registry: &RwLock<RegistryState>,
    api: &A,
    policy: KeysetMergePolicy,
    mint: &Mint,
) -> Result<(), Error>
where
    A: MintApi + ?Sized,
{
    let mut fresh = mint.clone();
    KeysetSynchronizer::new(api, policy)
        .sync(&mut fresh)
        .await?;

    let mut w = state_write(registry)?;
    let stored = w
        .mints
        .iter_mut()
        .find(|m| m.url == fresh.url)
        .ok_or_else(|| Error::MintNotFound(fresh.url.clone()))?;
    *stored = fresh.clone();

    w.toggle_active_unit_for_mint(&fresh);
    Ok(())
}

impl RegistryState {
    // the previous mint may have been removed while the sync was in flight
    fn rollback_active_mint(&mut self, previous: String) {
        if previous.is_empty() || self.mint(&previous).is_some() {
            self.active_mint_url = previous;
        } else {
            warn!("previous active mint {} is gone, clear it", previous);
            self.active_mint_url.clear();
        }
    }

    pub fn activate_unit(&mut self, unit: &str) -> Result<(), Error> {
        let mint = self.active_mint().ok_or(Error::NoActiveMint)?;
        if !self.view(mint).supports_unit(unit) {
            return Err(Error::UnsupportedUnit(unit.to_owned()));
        }

        self.active_unit = unit.to_owned();
        Ok(())
    }

    /// Keep the active unit if `mint` offers it, else take the mint's first unit.
    pub fn toggle_active_unit_for_mint(&mut self, mint: &Mint) {
        let view = MintView::new(mint, self.ledger.proofs());
        let balances = view.all_balances();
        if !self.active_unit.is_empty() && balances.contains_key(&self.active_unit) {
            return;
        }

        let first = view.units().first().map(|u| u.to_string());
        match first {
            Some(u) => {
                debug!("{} unit {:?} -> {}", mint.url, self.active_unit, u);
                self.active_unit = u;
            }
            None => warn!("{} has no active keysets, unit stays {:?}", mint.url, self.active_unit),
        }
    }

    /// Next unit of the active mint, wrapping around.
    pub fn toggle_unit(&mut self) -> Result<&str, Error> {
        let mint = self.active_mint().ok_or(Error::NoActiveMint)?;
        let units = self
            .view(mint)
            .units()
            .into_iter()
            .map(|u| u.to_owned())
            .collect::<Vec<_>>();

        if units.is_empty() {
            return Err(Error::UnsupportedUnit(self.active_unit.clone()));
        }

        let next = match units.iter().position(|u| *u == self.active_unit) {
            Some(idx) => (idx + 1) % units.len(),
            None => 0,
        };
        self.active_unit = units[next].clone();

        Ok(self.active_unit.as_str())
    }
}
