//! Single-mint wallet
//!
//! Every transaction the wallet tracks moves `created -> pending -> {paid, abandoned}`. It is
//! created and handed to the poller inside the operation that produces it, becomes paid only
//! when the poller confirms it and is abandoned only by [`Wallet::revoke_transaction`].

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cashu_wallet_common::amount;
use cashu_wallet_common::invoice::decode_invoice_amount;
use cashu_wallet_common::parking_lot::Mutex;
use cashu_wallet_common::{
    ensure_cashu, Amount, EcashTransaction, Error, LightningTransaction, MintConnector, MintQuote,
    MintUrl, Proofs, ProofsMethods, SendResponse, Token, Transaction, WalletState,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::PollerConfig;
use crate::localstore::DynWalletStorage;
use crate::poller::{ConfirmationStreams, Poller};

mod builder;
mod state;
mod swap;

pub use builder::WalletBuilder;
use state::StateStore;

/// Shared mint connector
pub type DynMintConnector = Arc<dyn MintConnector + Send + Sync>;

/// Creates the connector for a mint
pub type ConnectorFactory = Arc<dyn Fn(&MintUrl) -> Result<DynMintConnector, Error> + Send + Sync>;

/// Cashu Wallet of one mint
///
/// Cloning is cheap, clones share state and poller.
#[derive(Clone)]
pub struct Wallet {
    /// Mint Url
    pub mint_url: MintUrl,
    client: DynMintConnector,
    state: Arc<StateStore>,
    poller: Arc<Poller>,
    connector_factory: Option<ConnectorFactory>,
    listener: Arc<Listener>,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("mint_url", &self.mint_url)
            .field("client", &self.client)
            .field("poller", &self.poller)
            .finish()
    }
}

impl Wallet {
    /// Create new [`Wallet`]
    ///
    /// Shorthand for a [`WalletBuilder`] without a connector factory.
    pub async fn new(
        mint_url: MintUrl,
        client: DynMintConnector,
        localstore: DynWalletStorage,
        poller_config: PollerConfig,
    ) -> Result<Self, Error> {
        WalletBuilder::new()
            .mint_url(mint_url)
            .shared_client(client)
            .localstore(localstore)
            .poller_config(poller_config)
            .build()
            .await
    }

    /// Client of the wallet's mint
    pub fn client(&self) -> &DynMintConnector {
        &self.client
    }

    /// Current state snapshot
    pub fn state(&self) -> WalletState {
        self.state.snapshot()
    }

    /// Total balance
    pub fn balance(&self) -> Amount {
        self.state.snapshot().balance()
    }

    /// Receiver of state snapshots, starting with the current one
    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.state.subscribe()
    }

    /// Stream of state snapshots, starting with the current one
    pub fn state_stream(&self) -> WatchStream<WalletState> {
        WatchStream::new(self.state.subscribe())
    }

    /// Redeem an encoded token of this wallet's mint
    ///
    /// Tokens of any other mint are rejected before the mint is contacted.
    #[instrument(skip_all, fields(mint_url = %self.mint_url))]
    pub async fn receive_ecash(&self, encoded_token: &str) -> Result<Amount, Error> {
        let token = Token::from_str(encoded_token)?;
        self.receive_token(&token).await
    }

    pub(crate) async fn receive_token(&self, token: &Token) -> Result<Amount, Error> {
        let token_mint = token.mint_url()?;
        ensure_cashu!(
            token_mint == self.mint_url,
            Error::IncorrectMint {
                wallet: self.mint_url.to_string(),
                token: token_mint.to_string(),
            }
        );

        let proofs = self.client.receive(token).await?;
        let amount = proofs.total_amount()?;

        self.state
            .update(|state| {
                state.add_proofs(proofs)?;
                Ok(())
            })
            .await?;

        tracing::debug!("Received {} from {}", amount, self.mint_url);
        Ok(amount)
    }

    /// Create a token worth `amount`
    ///
    /// The token is tracked until its recipient has redeemed all of its proofs.
    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    pub async fn send_ecash(&self, amount: Amount) -> Result<String, Error> {
        ensure_cashu!(amount > Amount::ZERO, Error::AmountZero);
        ensure_cashu!(!self.poller.is_destroyed(), Error::Shutdown);

        let inputs = self.state.snapshot().proofs().to_vec();
        ensure_cashu!(inputs.total_amount()? >= amount, Error::InsufficientFunds);

        let SendResponse { send, change } = self.client.send(amount, inputs.clone()).await?;

        let token = Token::new(self.mint_url.clone(), send, None)?.to_string();
        let tx = EcashTransaction::new(token.clone(), amount)?;

        let spent = secrets(&inputs);
        self.state
            .update(|state| {
                remove_proofs(state, &spent);
                state.add_proofs(change)?;
                state.insert_transaction(tx.clone().into());
                Ok(())
            })
            .await?;

        self.poller.add_ecash(tx);

        Ok(token)
    }

    /// Request an invoice for `amount`
    ///
    /// The invoice is tracked and its proofs are claimed once it has been paid.
    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    pub async fn receive_lightning(&self, amount: Amount) -> Result<String, Error> {
        ensure_cashu!(amount > Amount::ZERO, Error::AmountZero);
        ensure_cashu!(!self.poller.is_destroyed(), Error::Shutdown);

        let quote = self.client.request_mint(amount).await?;
        let tx = LightningTransaction::new(quote.pr.clone(), amount, quote.hash)?;

        self.state
            .update(|state| {
                state.insert_transaction(tx.clone().into());
                Ok(())
            })
            .await?;

        self.poller.add_lightning(tx);

        Ok(quote.pr)
    }

    /// Mint quote that is neither stored nor polled
    pub(crate) async fn untracked_mint_quote(&self, amount: Amount) -> Result<MintQuote, Error> {
        ensure_cashu!(amount > Amount::ZERO, Error::AmountZero);
        self.client.request_mint(amount).await
    }

    /// Pay a bolt11 invoice
    ///
    /// Returns the amount spent, invoice amount plus fee. Nothing is tracked, the payment is
    /// final once the mint accepts it.
    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    pub async fn send_lightning(&self, invoice: &str) -> Result<Amount, Error> {
        let amount = decode_invoice_amount(invoice)?;
        ensure_cashu!(amount > Amount::ZERO, Error::AmountZero);

        let fee = self.client.get_fee(invoice).await?;
        let total = amount
            .checked_add(fee)
            .ok_or(amount::Error::AmountOverflow)?;

        let inputs = self.state.snapshot().proofs().to_vec();
        ensure_cashu!(inputs.total_amount()? >= total, Error::InsufficientFunds);

        let SendResponse { send, change } = self.client.send(total, inputs.clone()).await?;

        // The split is final at the mint, keep both halves until the payment settles
        let spent = secrets(&inputs);
        let payment = send.clone();
        self.state
            .update(|state| {
                remove_proofs(state, &spent);
                state.add_proofs(change)?;
                state.add_proofs(payment)?;
                Ok(())
            })
            .await?;

        match self.client.pay_invoice(invoice, send.clone()).await {
            Ok(()) => {
                let paid = secrets(&send);
                self.state
                    .update(|state| {
                        remove_proofs(state, &paid);
                        Ok(())
                    })
                    .await?;

                tracing::debug!("Paid invoice of {} with fee {}", amount, fee);
                Ok(total)
            }
            Err(err) => {
                tracing::warn!("Invoice payment failed: {}", err);
                self.remove_spent(&send).await;
                Err(err)
            }
        }
    }

    /// Fee the mint charges to pay `invoice`
    #[instrument(skip(self))]
    pub async fn get_fee(&self, invoice: &str) -> Result<Amount, Error> {
        self.client.get_fee(invoice).await
    }

    /// Stop tracking an unpaid invoice
    ///
    /// Nothing is reimbursed, no value was transferred.
    #[instrument(skip(self))]
    pub async fn revoke_transaction(&self, hash: &str) -> Result<(), Error> {
        self.state
            .update(|state| {
                let revocable = match state.transaction(hash) {
                    None => return Err(Error::TransactionNotFound),
                    Some(Transaction::Lightning(tx)) => !tx.is_paid,
                    Some(Transaction::Ecash(_)) => false,
                };
                ensure_cashu!(revocable, Error::CannotRevoke);

                state.remove_transaction(hash);
                Ok(())
            })
            .await?;

        self.poller.remove_lightning(hash);

        Ok(())
    }

    /// Hand every unpaid stored transaction to the poller
    ///
    /// Returns how many were not being polled already.
    pub fn check_pending_transactions(&self) -> usize {
        let state = self.state.snapshot();

        state
            .pending_transactions()
            .filter(|tx| match tx {
                Transaction::Lightning(tx) => self.poller.add_lightning(tx.clone()),
                Transaction::Ecash(tx) => self.poller.add_ecash(tx.clone()),
            })
            .count()
    }

    /// Resume polling for every unpaid transaction and run a poll cycle
    ///
    /// Confirmations are applied by the wallet's listener shortly after this returns.
    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    pub async fn check(&self) {
        self.check_pending_transactions();
        self.poller.poll_now().await;
    }

    /// Stop polling and stop applying confirmations
    ///
    /// Confirmations of a poll cycle that was running are applied before this returns. Safe to
    /// call more than once.
    pub async fn destroy(&self) {
        self.poller.destroy().await;
        self.listener.stop().await;
    }

    /// Whether both handles drive the same wallet
    pub(crate) fn is_same_wallet(&self, other: &Wallet) -> bool {
        Arc::ptr_eq(&self.poller, &other.poller)
    }

    /// Remove proofs the mint reports spent
    async fn remove_spent(&self, proofs: &Proofs) {
        match self.client.check_proofs_spent(proofs).await {
            Ok(spent) if !spent.is_empty() => {
                let spent = secrets(&spent);
                if let Err(err) = self
                    .state
                    .update(|state| {
                        remove_proofs(state, &spent);
                        Ok(())
                    })
                    .await
                {
                    tracing::error!("Could not remove spent proofs: {}", err);
                }
            }
            Ok(_) => (),
            Err(err) => tracing::warn!("Could not check spent proofs: {}", err),
        }
    }
}

fn secrets(proofs: &Proofs) -> HashSet<String> {
    proofs.iter().map(|p| p.secret.clone()).collect()
}

fn remove_proofs(state: &mut WalletState, secrets: &HashSet<String>) {
    state.retain_proofs(|p| !secrets.contains(&p.secret));
}

/// Task applying poller confirmations to the state
#[derive(Debug)]
struct Listener {
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Listener {
    fn new(cancel: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self {
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::warn!("Confirmation listener ended abnormally: {}", err);
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn listen(state: Arc<StateStore>, mut streams: ConfirmationStreams, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Apply what the poller emitted before it stopped
                while let Ok((tx, proofs)) = streams.paid.try_recv() {
                    on_paid(&state, tx, proofs).await;
                }
                while let Ok(transactions) = streams.spent.try_recv() {
                    on_spent(&state, transactions).await;
                }
                break;
            }
            Some((tx, proofs)) = streams.paid.recv() => on_paid(&state, tx, proofs).await,
            Some(transactions) = streams.spent.recv() => on_spent(&state, transactions).await,
        }
    }
}

async fn on_paid(state: &StateStore, tx: LightningTransaction, proofs: Proofs) {
    let hash = tx.hash.clone();
    let result = state
        .update(|state| {
            state.add_proofs(proofs)?;
            if !state.mark_paid(&hash) {
                tracing::warn!("Minted proofs for untracked invoice {}", hash);
            }
            Ok(())
        })
        .await;

    match result {
        Ok(()) => tracing::debug!("Invoice {} of {} paid", tx.hash, tx.amount),
        Err(err) => tracing::error!("Could not apply paid invoice {}: {}", tx.hash, err),
    }
}

async fn on_spent(state: &StateStore, transactions: Vec<EcashTransaction>) {
    let result = state
        .update(|state| {
            for tx in &transactions {
                if !state.mark_paid(&tx.token) {
                    tracing::debug!("Spent token of {} is not tracked", tx.amount);
                }
            }
            Ok(())
        })
        .await;

    if let Err(err) = result {
        tracing::error!("Could not apply spent tokens: {}", err);
    }
}
