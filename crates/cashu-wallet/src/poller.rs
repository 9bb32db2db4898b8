//! Reconciliation poller
//!
//! Watches the transactions of one mint that wait for something to happen outside the wallet: an
//! invoice being paid or an outgoing token being redeemed. Confirmations are delivered on two
//! channels handed out when the poller is created.
//!
//! Cycles run on a fixed interval or when forced with [`Poller::check`]. A cycle never overlaps
//! another one, and forced checks issued while a cycle is in flight collapse into a single
//! follow-up cycle.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use cashu_wallet_common::parking_lot::Mutex;
use cashu_wallet_common::{
    EcashTransaction, LightningTransaction, MintConnector, MintUrl, Proof, Proofs, ProofsMethods,
    Token,
};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::PollerConfig;

/// Receiving ends of the poller's confirmations
#[derive(Debug)]
pub struct ConfirmationStreams {
    /// Paid invoices with the proofs minted for them
    pub paid: mpsc::UnboundedReceiver<(LightningTransaction, Proofs)>,
    /// Batches of tokens whose proofs are all spent
    pub spent: mpsc::UnboundedReceiver<Vec<EcashTransaction>>,
}

#[derive(Debug)]
struct PendingLightning {
    tx: LightningTransaction,
    failures: u32,
}

#[derive(Debug)]
struct PendingEcash {
    tx: EcashTransaction,
    proofs: Proofs,
    failures: u32,
}

#[derive(Debug, Default)]
struct Pending {
    /// Keyed by quote hash
    lightning: BTreeMap<String, PendingLightning>,
    /// Keyed by encoded token
    ecash: BTreeMap<String, PendingEcash>,
}

#[derive(Debug)]
struct PollerInner {
    mint_url: MintUrl,
    client: Arc<dyn MintConnector + Send + Sync>,
    config: PollerConfig,
    pending: Mutex<Pending>,
    /// Held for the whole of a cycle
    cycle: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    /// Once set nothing is emitted anymore
    closed: Mutex<bool>,
    paid_sender: mpsc::UnboundedSender<(LightningTransaction, Proofs)>,
    spent_sender: mpsc::UnboundedSender<Vec<EcashTransaction>>,
}

/// Reconciliation poller of one mint
#[derive(Debug)]
pub struct Poller {
    inner: Arc<PollerInner>,
    notify: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    /// Create new [`Poller`] and start its background task
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        mint_url: MintUrl,
        client: Arc<dyn MintConnector + Send + Sync>,
        config: PollerConfig,
    ) -> (Self, ConfirmationStreams) {
        let (paid_sender, paid) = mpsc::unbounded_channel();
        let (spent_sender, spent) = mpsc::unbounded_channel();

        let inner = Arc::new(PollerInner {
            mint_url,
            client,
            config,
            pending: Mutex::new(Pending::default()),
            cycle: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
            closed: Mutex::new(false),
            paid_sender,
            spent_sender,
        });
        let notify = Arc::new(Notify::new());

        let worker = tokio::spawn(Self::run(Arc::clone(&inner), Arc::clone(&notify)));

        (
            Self {
                inner,
                notify,
                worker: Mutex::new(Some(worker)),
            },
            ConfirmationStreams { paid, spent },
        )
    }

    /// Mint the poller checks against
    pub fn mint_url(&self) -> &MintUrl {
        &self.inner.mint_url
    }

    /// Register an invoice for payment polling
    ///
    /// Returns `false` without changing anything if the transaction is already paid or an
    /// invoice with the same hash is already pending.
    pub fn add_lightning(&self, tx: LightningTransaction) -> bool {
        if tx.is_paid || self.inner.cancel.is_cancelled() {
            return false;
        }

        let mut pending = self.inner.pending.lock();
        if pending.lightning.contains_key(&tx.hash) {
            return false;
        }

        tracing::debug!("Polling invoice {} at {}", tx.hash, self.inner.mint_url);
        pending
            .lightning
            .insert(tx.hash.clone(), PendingLightning { tx, failures: 0 });
        true
    }

    /// Register an outgoing token for spent polling
    ///
    /// Returns `false` without changing anything if the transaction is already paid, the same
    /// token is already pending or the token cannot be decoded.
    pub fn add_ecash(&self, tx: EcashTransaction) -> bool {
        if tx.is_paid || self.inner.cancel.is_cancelled() {
            return false;
        }

        if self.inner.pending.lock().ecash.contains_key(&tx.token) {
            return false;
        }

        let proofs = match Token::from_str(&tx.token) {
            Ok(token) => token.proofs(),
            Err(err) => {
                tracing::warn!("Not polling undecodable token: {}", err);
                return false;
            }
        };

        let mut pending = self.inner.pending.lock();
        if pending.ecash.contains_key(&tx.token) {
            return false;
        }

        tracing::debug!("Polling token of {} at {}", tx.amount, self.inner.mint_url);
        pending.ecash.insert(
            tx.token.clone(),
            PendingEcash {
                tx,
                proofs,
                failures: 0,
            },
        );
        true
    }

    /// Stop polling an invoice
    pub fn remove_lightning(&self, hash: &str) -> bool {
        self.inner.pending.lock().lightning.remove(hash).is_some()
    }

    /// Whether an invoice is being polled
    pub fn is_lightning_pending(&self, hash: &str) -> bool {
        self.inner.pending.lock().lightning.contains_key(hash)
    }

    /// Whether a token is being polled
    pub fn is_ecash_pending(&self, token: &str) -> bool {
        self.inner.pending.lock().ecash.contains_key(token)
    }

    /// Number of transactions being polled
    pub fn pending_count(&self) -> usize {
        let pending = self.inner.pending.lock();
        pending.lightning.len() + pending.ecash.len()
    }

    /// Request a poll cycle without waiting for the interval
    ///
    /// Returns immediately. Requests made while a cycle is running are served by one cycle after
    /// it.
    pub fn check(&self) {
        self.notify.notify_one();
    }

    /// Run a poll cycle now and wait for it to finish
    ///
    /// Waits for a cycle already in flight first.
    pub async fn poll_now(&self) {
        self.inner.poll_cycle().await;
    }

    /// Stop polling
    ///
    /// Waits for a cycle in flight to finish. Once this returns nothing is emitted on the
    /// confirmation channels. Calling it again does nothing.
    pub async fn destroy(&self) {
        self.inner.cancel.cancel();

        {
            let _cycle = self.inner.cycle.lock().await;
            *self.inner.closed.lock() = true;
        }

        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
            tracing::debug!("Poller of {} stopped", self.inner.mint_url);
        }
    }

    /// Whether [`Poller::destroy`] has been called
    pub fn is_destroyed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    async fn run(inner: Arc<PollerInner>, notify: Arc<Notify>) {
        let period = inner.config.check_interval();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = inner.cancel.cancelled() => {
                    tracing::debug!("Poller of {} cancelled", inner.mint_url);
                    break;
                }
                _ = notify.notified() => {
                    tracing::trace!("Forced poll of {}", inner.mint_url);
                }
                _ = interval.tick() => {}
            }

            inner.poll_cycle().await;
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

impl PollerInner {
    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn poll_cycle(&self) {
        let _cycle = self.cycle.lock().await;

        if self.cancel.is_cancelled() {
            return;
        }
        self.check_lightning().await;

        if self.cancel.is_cancelled() {
            return;
        }
        self.check_ecash().await;
    }

    async fn check_lightning(&self) {
        let transactions: Vec<LightningTransaction> = self
            .pending
            .lock()
            .lightning
            .values()
            .map(|pending| pending.tx.clone())
            .collect();

        if transactions.is_empty() {
            return;
        }
        tracing::debug!("Checking {} pending invoices", transactions.len());

        for tx in transactions {
            if self.cancel.is_cancelled() {
                break;
            }
            // Revoked while the cycle was running
            if !self.pending.lock().lightning.contains_key(&tx.hash) {
                continue;
            }

            match self.client.request_tokens(tx.amount, &tx.hash).await {
                Ok(proofs) => {
                    self.pending.lock().lightning.remove(&tx.hash);
                    tracing::debug!("Invoice {} paid, {} proofs minted", tx.hash, proofs.len());
                    self.emit_paid(tx, proofs);
                }
                Err(err) if err.is_transient() => {
                    let mut pending = self.pending.lock();
                    let exhausted = match pending.lightning.get_mut(&tx.hash) {
                        Some(entry) => {
                            entry.failures += 1;
                            entry.failures >= self.config.attempts
                        }
                        None => false,
                    };
                    if exhausted {
                        pending.lightning.remove(&tx.hash);
                        tracing::warn!(
                            "Invoice {} still unpaid after {} attempts, no longer polling: {}",
                            tx.hash,
                            self.config.attempts,
                            err
                        );
                    } else {
                        tracing::trace!("Invoice {} not confirmed yet: {}", tx.hash, err);
                    }
                }
                Err(err) => {
                    self.pending.lock().lightning.remove(&tx.hash);
                    tracing::warn!("Invoice {} can not be claimed, no longer polling: {}", tx.hash, err);
                }
            }
        }
    }

    async fn check_ecash(&self) {
        let batch: Vec<(String, Proofs)> = self
            .pending
            .lock()
            .ecash
            .iter()
            .map(|(token, pending)| (token.clone(), pending.proofs.clone()))
            .collect();

        if batch.is_empty() {
            return;
        }

        let mut seen = HashSet::new();
        let proofs: Proofs = batch
            .iter()
            .flat_map(|(_, proofs)| proofs.iter())
            .filter(|proof| seen.insert(proof.secret.clone()))
            .cloned()
            .collect();
        tracing::debug!(
            "Checking {} proofs of {} pending tokens",
            proofs.len(),
            batch.len()
        );

        let spent = match self.client.check_proofs_spent(&proofs).await {
            Ok(spent) => spent,
            Err(err) => {
                tracing::debug!("Could not check spent proofs: {}", err);
                self.record_ecash_failures(batch.iter().map(|(token, _)| token.as_str()));
                return;
            }
        };
        let spent_secrets = spent.secrets();

        let (confirmed, unconfirmed): (Vec<_>, Vec<_>) =
            batch.iter().partition(|(_, proofs)| {
                !proofs.is_empty() && proofs.iter().all(|p: &Proof| spent_secrets.contains(p.secret.as_str()))
            });

        let confirmed: Vec<EcashTransaction> = {
            let mut pending = self.pending.lock();
            confirmed
                .into_iter()
                .filter_map(|(token, _)| pending.ecash.remove(token))
                .map(|pending| pending.tx)
                .collect()
        };

        self.record_ecash_failures(unconfirmed.iter().map(|(token, _)| token.as_str()));

        if !confirmed.is_empty() {
            tracing::debug!("{} tokens fully spent", confirmed.len());
            self.emit_spent(confirmed);
        }
    }

    fn record_ecash_failures<'a>(&self, tokens: impl Iterator<Item = &'a str>) {
        let mut pending = self.pending.lock();
        for token in tokens {
            let exhausted = match pending.ecash.get_mut(token) {
                Some(entry) => {
                    entry.failures += 1;
                    entry.failures >= self.config.attempts
                }
                None => false,
            };
            if exhausted {
                if let Some(entry) = pending.ecash.remove(token) {
                    tracing::warn!(
                        "Token of {} still unspent after {} attempts, no longer polling",
                        entry.tx.amount,
                        self.config.attempts
                    );
                }
            }
        }
    }

    fn emit_paid(&self, tx: LightningTransaction, proofs: Proofs) {
        let closed = self.closed.lock();
        if *closed {
            return;
        }
        if self.paid_sender.send((tx, proofs)).is_err() {
            tracing::warn!("Paid confirmation dropped, no listener");
        }
    }

    fn emit_spent(&self, transactions: Vec<EcashTransaction>) {
        let closed = self.closed.lock();
        if *closed {
            return;
        }
        if self.spent_sender.send(transactions).is_err() {
            tracing::warn!("Spent confirmation dropped, no listener");
        }
    }
}
