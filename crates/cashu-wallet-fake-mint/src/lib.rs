//! Fake Mint
//!
//! An in-process mint for tests and demos. Proofs carry random secrets and no signatures; the
//! mint only remembers which secrets it issued and which have been spent. Quotes are backed by
//! real signed bolt11 invoices registered on a shared [`FakeLightningNetwork`], so a quote is paid
//! either explicitly with [`FakeMint::pay_quote`] or by another fake mint paying its invoice.

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::hex::DisplayHex;
use cashu_wallet_common::invoice::decode_invoice_amount;
use cashu_wallet_common::parking_lot::Mutex;
use cashu_wallet_common::{
    ensure_cashu, Amount, MintConnector, MintQuote, MintUrl, Proof, Proofs, ProofsMethods,
    SendResponse, Token,
};
use error::Error;
use lightning_invoice::Bolt11Invoice;
use rand::Rng;
use tracing::instrument;
use uuid::Uuid;

pub mod error;
pub mod network;

pub use network::{create_fake_invoice, FakeLightningNetwork};

#[derive(Debug, Clone)]
struct Quote {
    amount: Amount,
    payment_hash: String,
    pr: String,
    issued: bool,
}

#[derive(Debug, Default)]
struct MintState {
    unspent: HashMap<String, Amount>,
    spent: HashSet<String>,
    quotes: HashMap<String, Quote>,
}

/// Call counters, for asserting on how a wallet talks to the mint
#[derive(Debug, Default)]
pub struct CallCounters {
    /// Calls to `request_tokens`
    pub request_tokens: AtomicUsize,
    /// Calls to `check_proofs_spent`
    pub check_proofs_spent: AtomicUsize,
    /// Calls to `pay_invoice`
    pub pay_invoice: AtomicUsize,
}

/// Fake Mint
#[derive(Debug)]
pub struct FakeMint {
    mint_url: MintUrl,
    keyset_id: String,
    network: Arc<FakeLightningNetwork>,
    state: Mutex<MintState>,
    fee: AtomicU64,
    offline: AtomicBool,
    latency: Mutex<Option<Duration>>,
    counters: CallCounters,
}

impl FakeMint {
    /// Create new [`FakeMint`] on `network`
    pub fn new(mint_url: MintUrl, network: Arc<FakeLightningNetwork>) -> Self {
        let keyset_id = format!("00{}", &Uuid::new_v4().simple().to_string()[..14]);
        Self {
            mint_url,
            keyset_id,
            network,
            state: Mutex::new(MintState::default()),
            fee: AtomicU64::new(0),
            offline: AtomicBool::new(false),
            latency: Mutex::new(None),
            counters: CallCounters::default(),
        }
    }

    /// Mint url
    pub fn mint_url(&self) -> &MintUrl {
        &self.mint_url
    }

    /// Network the mint pays and receives on
    pub fn network(&self) -> Arc<FakeLightningNetwork> {
        Arc::clone(&self.network)
    }

    /// Fee charged for paying any invoice
    pub fn set_fee(&self, fee: Amount) {
        self.fee.store(fee.to_u64(), Ordering::SeqCst);
    }

    /// While offline every call fails with a connection error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay applied to every call before it is served
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Call counters
    pub fn counters(&self) -> &CallCounters {
        &self.counters
    }

    /// Issue proofs worth `amount` without a quote
    pub fn issue_proofs(&self, amount: Amount) -> Proofs {
        let mut state = self.state.lock();
        self.issue(&mut state, amount)
    }

    /// Issue a token worth `amount` without a quote
    pub fn issue_token(&self, amount: Amount) -> Result<Token, cashu_wallet_common::Error> {
        Token::new(self.mint_url.clone(), self.issue_proofs(amount), None)
    }

    /// Pay the invoice of a quote from outside the mint
    pub fn pay_quote(&self, pr: &str) -> Result<(), Error> {
        self.network.pay(pr)
    }

    /// Mark proofs spent as if their holder redeemed them
    pub fn spend_proofs(&self, proofs: &[Proof]) {
        let mut state = self.state.lock();
        for proof in proofs {
            if state.unspent.remove(&proof.secret).is_some() {
                state.spent.insert(proof.secret.clone());
            }
        }
    }

    /// Paid status of the quote with `hash`, `None` if the quote is unknown
    pub fn quote_is_paid(&self, hash: &str) -> Option<bool> {
        let state = self.state.lock();
        state
            .quotes
            .get(hash)
            .map(|quote| self.network.is_paid(&quote.payment_hash))
    }

    /// Invoice of a quote
    pub fn quote_invoice(&self, hash: &str) -> Option<String> {
        self.state.lock().quotes.get(hash).map(|quote| quote.pr.clone())
    }

    fn issue(&self, state: &mut MintState, amount: Amount) -> Proofs {
        amount
            .split()
            .into_iter()
            .map(|amount| {
                let secret = rand::rng().random::<[u8; 32]>().to_lower_hex_string();
                let c = format!("02{}", rand::rng().random::<[u8; 32]>().to_lower_hex_string());
                state.unspent.insert(secret.clone(), amount);
                Proof::new(amount, self.keyset_id.clone(), secret, c)
            })
            .collect()
    }

    fn verify_and_spend(state: &mut MintState, proofs: &[Proof]) -> Result<Amount, Error> {
        let mut seen = HashSet::new();
        for proof in proofs {
            ensure_cashu!(seen.insert(proof.secret.as_str()), Error::ProofSpent);
            if state.spent.contains(&proof.secret) {
                return Err(Error::ProofSpent);
            }
            match state.unspent.get(&proof.secret) {
                Some(amount) if *amount == proof.amount => (),
                _ => return Err(Error::UnknownProof),
            }
        }

        for proof in proofs {
            state.unspent.remove(&proof.secret);
            state.spent.insert(proof.secret.clone());
        }

        Ok(proofs.iter().map(|p| p.amount).sum())
    }

    async fn serve(&self) -> Result<(), Error> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        ensure_cashu!(!self.offline.load(Ordering::SeqCst), Error::Offline);
        Ok(())
    }
}

#[async_trait]
impl MintConnector for FakeMint {
    #[instrument(skip(self))]
    async fn request_mint(&self, amount: Amount) -> Result<MintQuote, cashu_wallet_common::Error> {
        self.serve().await?;

        let invoice = self
            .network
            .create_invoice(amount.to_u64().saturating_mul(1000), self.mint_url.to_string())?;
        let hash = Uuid::new_v4().to_string();
        let pr = invoice.to_string();

        self.state.lock().quotes.insert(
            hash.clone(),
            Quote {
                amount,
                payment_hash: invoice.payment_hash().to_string(),
                pr: pr.clone(),
                issued: false,
            },
        );

        Ok(MintQuote { pr, hash })
    }

    #[instrument(skip(self))]
    async fn request_tokens(
        &self,
        amount: Amount,
        hash: &str,
    ) -> Result<Proofs, cashu_wallet_common::Error> {
        self.counters.request_tokens.fetch_add(1, Ordering::SeqCst);
        self.serve().await?;

        let mut state = self.state.lock();
        let quote = state.quotes.get(hash).cloned().ok_or(Error::UnknownQuote)?;

        ensure_cashu!(!quote.issued, cashu_wallet_common::Error::IssuedQuote);
        ensure_cashu!(
            self.network.is_paid(&quote.payment_hash),
            cashu_wallet_common::Error::UnpaidQuote
        );
        ensure_cashu!(
            amount <= quote.amount,
            cashu_wallet_common::Error::Custom("Amount exceeds quote".to_string())
        );

        if let Some(quote) = state.quotes.get_mut(hash) {
            quote.issued = true;
        }

        Ok(self.issue(&mut state, amount))
    }

    #[instrument(skip_all)]
    async fn send(
        &self,
        amount: Amount,
        proofs: Proofs,
    ) -> Result<SendResponse, cashu_wallet_common::Error> {
        self.serve().await?;

        let total = proofs.total_amount()?;
        let change_amount = total
            .checked_sub(amount)
            .ok_or(cashu_wallet_common::Error::InsufficientFunds)?;

        let mut state = self.state.lock();
        Self::verify_and_spend(&mut state, &proofs)?;

        let send = self.issue(&mut state, amount);
        let change = self.issue(&mut state, change_amount);

        Ok(SendResponse { send, change })
    }

    #[instrument(skip_all)]
    async fn receive(&self, token: &Token) -> Result<Proofs, cashu_wallet_common::Error> {
        self.serve().await?;

        let token_mint = token.mint_url()?;
        ensure_cashu!(
            token_mint == self.mint_url,
            cashu_wallet_common::Error::TokenNotVerified
        );

        let mut state = self.state.lock();
        let amount = Self::verify_and_spend(&mut state, &token.proofs())?;

        Ok(self.issue(&mut state, amount))
    }

    #[instrument(skip_all)]
    async fn check_proofs_spent(
        &self,
        proofs: &Proofs,
    ) -> Result<Proofs, cashu_wallet_common::Error> {
        self.counters
            .check_proofs_spent
            .fetch_add(1, Ordering::SeqCst);
        self.serve().await?;

        let state = self.state.lock();
        Ok(proofs
            .iter()
            .filter(|p| state.spent.contains(&p.secret))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, proofs))]
    async fn pay_invoice(&self, pr: &str, proofs: Proofs) -> Result<(), cashu_wallet_common::Error> {
        self.counters.pay_invoice.fetch_add(1, Ordering::SeqCst);
        self.serve().await?;

        let amount = decode_invoice_amount(pr)?;
        let fee = Amount::from(self.fee.load(Ordering::SeqCst));
        let required = amount
            .checked_add(fee)
            .ok_or(cashu_wallet_common::Error::InputsInsufficient)?;
        ensure_cashu!(
            proofs.total_amount()? >= required,
            cashu_wallet_common::Error::InputsInsufficient
        );

        let mut state = self.state.lock();
        // Validate before paying so a rejected payment leaves the proofs unspent
        for proof in &proofs {
            ensure_cashu!(
                state.unspent.get(&proof.secret) == Some(&proof.amount),
                Error::UnknownProof.into()
            );
        }
        self.network.pay(pr)?;
        Self::verify_and_spend(&mut state, &proofs)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_fee(&self, pr: &str) -> Result<Amount, cashu_wallet_common::Error> {
        self.serve().await?;

        Bolt11Invoice::from_str(pr)?;
        Ok(Amount::from(self.fee.load(Ordering::SeqCst)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint(network: &Arc<FakeLightningNetwork>, url: &str) -> FakeMint {
        FakeMint::new(MintUrl::from_str(url).unwrap(), Arc::clone(network))
    }

    #[tokio::test]
    async fn test_quote_lifecycle() {
        let network = FakeLightningNetwork::new();
        let mint = mint(&network, "https://a.example.com");

        let quote = mint.request_mint(Amount::from(50)).await.unwrap();
        assert_eq!(
            decode_invoice_amount(&quote.pr).unwrap(),
            Amount::from(50)
        );

        assert!(matches!(
            mint.request_tokens(Amount::from(50), &quote.hash).await,
            Err(cashu_wallet_common::Error::UnpaidQuote)
        ));

        mint.pay_quote(&quote.pr).unwrap();
        let proofs = mint
            .request_tokens(Amount::from(50), &quote.hash)
            .await
            .unwrap();
        assert_eq!(proofs.total_amount().unwrap(), Amount::from(50));

        assert!(matches!(
            mint.request_tokens(Amount::from(50), &quote.hash).await,
            Err(cashu_wallet_common::Error::IssuedQuote)
        ));
        assert!(matches!(
            mint.request_tokens(Amount::from(1), "nope").await,
            Err(cashu_wallet_common::Error::UnknownQuote)
        ));
    }

    #[tokio::test]
    async fn test_send_and_spent() {
        let network = FakeLightningNetwork::new();
        let mint = mint(&network, "https://a.example.com");
        let proofs = mint.issue_proofs(Amount::from(100));

        let response = mint.send(Amount::from(30), proofs.clone()).await.unwrap();
        assert_eq!(response.send.total_amount().unwrap(), Amount::from(30));
        assert_eq!(response.change.total_amount().unwrap(), Amount::from(70));

        let spent = mint.check_proofs_spent(&proofs).await.unwrap();
        assert_eq!(spent.len(), proofs.len());
        assert!(mint
            .check_proofs_spent(&response.send)
            .await
            .unwrap()
            .is_empty());

        assert!(matches!(
            mint.send(Amount::from(1), proofs).await,
            Err(cashu_wallet_common::Error::TokenAlreadySpent)
        ));
        assert!(matches!(
            mint.send(Amount::from(71), response.change).await,
            Err(cashu_wallet_common::Error::InsufficientFunds)
        ));
    }

    #[tokio::test]
    async fn test_receive_checks_mint() {
        let network = FakeLightningNetwork::new();
        let a = mint(&network, "https://a.example.com");
        let b = mint(&network, "https://b.example.com");

        let token = a.issue_token(Amount::from(8)).unwrap();
        assert!(b.receive(&token).await.is_err());

        let proofs = a.receive(&token).await.unwrap();
        assert_eq!(proofs.total_amount().unwrap(), Amount::from(8));
        assert!(a.receive(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_pay_across_mints() {
        let network = FakeLightningNetwork::new();
        let a = mint(&network, "https://a.example.com");
        let b = mint(&network, "https://b.example.com");
        a.set_fee(Amount::from(2));

        let quote = b.request_mint(Amount::from(38)).await.unwrap();
        assert_eq!(a.get_fee(&quote.pr).await.unwrap(), Amount::from(2));

        let proofs = a.issue_proofs(Amount::from(40));
        a.pay_invoice(&quote.pr, proofs).await.unwrap();

        assert_eq!(b.quote_is_paid(&quote.hash), Some(true));
        let minted = b
            .request_tokens(Amount::from(38), &quote.hash)
            .await
            .unwrap();
        assert_eq!(minted.total_amount().unwrap(), Amount::from(38));
    }

    #[tokio::test]
    async fn test_pay_requires_fee() {
        let network = FakeLightningNetwork::new();
        let a = mint(&network, "https://a.example.com");
        a.set_fee(Amount::from(2));

        let quote = a.request_mint(Amount::from(10)).await.unwrap();
        let proofs = a.issue_proofs(Amount::from(10));
        assert!(matches!(
            a.pay_invoice(&quote.pr, proofs.clone()).await,
            Err(cashu_wallet_common::Error::InputsInsufficient)
        ));
        // Rejected payment leaves the proofs spendable
        assert!(a.check_proofs_spent(&proofs).await.unwrap().is_empty());
        assert_eq!(a.quote_is_paid(&quote.hash), Some(false));
    }

    #[tokio::test]
    async fn test_offline() {
        let network = FakeLightningNetwork::new();
        let a = mint(&network, "https://a.example.com");
        a.set_offline(true);

        let err = a.request_mint(Amount::from(1)).await.unwrap_err();
        assert!(err.is_transient());

        a.set_offline(false);
        assert!(a.request_mint(Amount::from(1)).await.is_ok());
    }
}
