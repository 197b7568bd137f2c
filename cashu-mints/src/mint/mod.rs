pub mod client;
pub mod sync;
pub mod view;

pub use client::{KeysResponse, KeysetResponse, MintApi, Offline};
pub use sync::{KeysetMergePolicy, KeysetSynchronizer};
pub use view::MintView;
