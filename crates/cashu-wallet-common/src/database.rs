//! Wallet storage
//!
//! A backend persists exactly one [`WalletState`] snapshot per mint wallet. Writes replace the
//! whole snapshot.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::WalletState;

#[cfg(feature = "test")]
pub mod test;

/// Wallet storage error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database Error
    #[error(transparent)]
    Database(Box<dyn std::error::Error + Send + Sync>),
    /// Serde Error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// IO Error
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Stored snapshot belongs to another mint
    #[error("Stored state belongs to `{0}`")]
    MintMismatch(String),
}

/// Storage of a wallet state snapshot
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait WalletStorage: Debug {
    /// Last written snapshot, if any
    async fn get(&self) -> Result<Option<WalletState>, Error>;

    /// Replace the stored snapshot
    async fn set(&self, state: &WalletState) -> Result<(), Error>;
}
