//! Mint connector
//!
//! The boundary between a wallet and the mint it talks to. Implementations own transport,
//! timeouts and the cryptography of blinded outputs; the wallet only sees proofs, encoded tokens
//! and invoices.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Amount, Error, Proofs, Token};

/// Mint quote: an invoice that entitles the payer to new proofs once paid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuote {
    /// Bolt11 payment request
    pub pr: String,
    /// Quote hash used to claim the proofs
    pub hash: String,
}

/// Result of splitting proofs for a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    /// Proofs worth exactly the requested amount
    pub send: Proofs,
    /// Everything else, to be kept by the wallet
    #[serde(rename = "returnChange")]
    pub change: Proofs,
}

/// Interface that connects a wallet to a mint
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait MintConnector: Debug {
    /// Request a mint quote for `amount`
    async fn request_mint(&self, amount: Amount) -> Result<MintQuote, Error>;

    /// Claim the proofs of a paid quote
    ///
    /// Fails with [`Error::UnpaidQuote`] while the invoice has not been paid.
    async fn request_tokens(&self, amount: Amount, hash: &str) -> Result<Proofs, Error>;

    /// Split `proofs` into a part worth `amount` and the change
    ///
    /// Fails with [`Error::InsufficientFunds`] when `proofs` do not cover `amount`.
    async fn send(&self, amount: Amount, proofs: Proofs) -> Result<SendResponse, Error>;

    /// Redeem a token, returning fresh proofs owned by the caller
    async fn receive(&self, token: &Token) -> Result<Proofs, Error>;

    /// Return the subset of `proofs` the mint reports as spent
    async fn check_proofs_spent(&self, proofs: &Proofs) -> Result<Proofs, Error>;

    /// Pay a bolt11 invoice with `proofs`
    async fn pay_invoice(&self, pr: &str, proofs: Proofs) -> Result<(), Error>;

    /// Fee reserve the mint charges to pay `pr`
    async fn get_fee(&self, pr: &str) -> Result<Amount, Error>;
}
