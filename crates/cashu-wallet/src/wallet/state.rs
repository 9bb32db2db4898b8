//! Observable, write-through wallet state

use cashu_wallet_common::database::Error as DatabaseError;
use cashu_wallet_common::{Error, MintUrl, WalletState};
use tokio::sync::{watch, Mutex};

use crate::localstore::DynWalletStorage;

/// Holds the current [`WalletState`] of a wallet
///
/// Readers get cheap snapshots and a change stream. Only the owning wallet mutates, through
/// [`StateStore::update`], which applies a change to a copy, persists it and then publishes it
/// as a whole.
#[derive(Debug)]
pub(crate) struct StateStore {
    sender: watch::Sender<WalletState>,
    write_lock: Mutex<()>,
    localstore: DynWalletStorage,
}

impl StateStore {
    /// Load the last stored snapshot of `mint_url`, or start empty
    pub(crate) async fn load(mint_url: &MintUrl, localstore: DynWalletStorage) -> Result<Self, Error> {
        let state = match localstore.get().await? {
            Some(state) if state.mint_url() == mint_url => state,
            Some(state) => {
                tracing::warn!(
                    "Stored state belongs to {}, not {}",
                    state.mint_url(),
                    mint_url
                );
                return Err(DatabaseError::MintMismatch(state.mint_url().to_string()).into());
            }
            None => WalletState::new(mint_url.clone()),
        };

        let (sender, _) = watch::channel(state);

        Ok(Self {
            sender,
            write_lock: Mutex::new(()),
            localstore,
        })
    }

    /// Current snapshot
    pub(crate) fn snapshot(&self) -> WalletState {
        self.sender.borrow().clone()
    }

    /// Receiver that sees every published snapshot, starting with the current one
    pub(crate) fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.sender.subscribe()
    }

    /// Apply `f` to a copy of the state, persist the result and publish it
    ///
    /// Nothing changes if `f` fails. A failed write is logged and the new state is published
    /// anyway, the next successful write catches storage up.
    pub(crate) async fn update<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut WalletState) -> Result<T, Error>,
    {
        let _guard = self.write_lock.lock().await;

        let mut state = self.snapshot();
        let output = f(&mut state)?;

        if let Err(err) = self.localstore.set(&state).await {
            tracing::error!(
                "Could not persist wallet state of {}: {}",
                state.mint_url(),
                err
            );
        }

        self.sender.send_replace(state);

        Ok(output)
    }
}
