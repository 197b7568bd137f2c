#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate async_trait;

/// mints, keysets, proofs
pub mod types;

pub mod error;

/// unspent/spent proofs and blind signature audits
pub mod ledger;

/// mint api port, per-mint view, keyset sync
pub mod mint;

pub mod activation;

pub mod hooks;

/// persisted slots: redb, in-memory, backup/restore
pub mod store;

mod registry;
pub use registry::*;

pub use crate::activation::{ActivationController, ActivationState};
pub use crate::error::{assert_mint_error, ClientError, MintError, SyncStage};
pub use crate::hooks::{Hooks, LogNotifier, Notifier, Pollers, Silent};
pub use crate::ledger::ProofLedger;
pub use crate::mint::{KeysetMergePolicy, KeysetSynchronizer, MintApi, MintView, Offline};
pub use crate::store::impl_redb::{Redb, StoreError};
pub use crate::store::{KvStore, MemoryStore, Slots, Snapshot};
pub use crate::types::{
    sanitize_url, unit_label, BlindSignature, BlindSignatureAudit, KeyRecord, Keyset, Mint,
    MintInfo, Proof, ProofsHelper,
};
