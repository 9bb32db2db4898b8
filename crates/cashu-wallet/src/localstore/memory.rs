//! Memory storage

use async_trait::async_trait;
use cashu_wallet_common::database::Error;
use cashu_wallet_common::{WalletState, WalletStorage};
use tokio::sync::RwLock;

/// Keeps the snapshot in memory only
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<Option<WalletState>>,
}

impl MemoryStorage {
    /// Create new [`MemoryStorage`] holding `state`
    pub fn with_state(state: WalletState) -> Self {
        Self {
            state: RwLock::new(Some(state)),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl WalletStorage for MemoryStorage {
    async fn get(&self) -> Result<Option<WalletState>, Error> {
        Ok(self.state.read().await.clone())
    }

    async fn set(&self, state: &WalletState) -> Result<(), Error> {
        *self.state.write().await = Some(state.clone());
        Ok(())
    }
}
