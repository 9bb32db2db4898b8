//! Tracked transactions
//!
//! Only operations whose completion depends on the mint confirming something later are tracked:
//! an outgoing token waiting for its recipient to redeem it, and an invoice waiting to be paid.
//! A transaction is keyed by a value derived from its own payload, so registering the same
//! logical transaction twice always lands on the same key.

use serde::{Deserialize, Serialize};

use crate::util::unix_time;
use crate::{ensure_cashu, Amount, Error};

/// Outgoing ecash token awaiting redemption by its recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcashTransaction {
    /// Encoded token
    pub token: String,
    /// Value of the token
    pub amount: Amount,
    /// Unix time of creation
    pub date: u64,
    /// All proofs of the token have been spent
    #[serde(default)]
    pub is_paid: bool,
}

impl EcashTransaction {
    /// Create new unpaid [`EcashTransaction`]
    pub fn new(token: String, amount: Amount) -> Result<Self, Error> {
        ensure_cashu!(
            !token.is_empty(),
            Error::InvalidTransaction("token is empty".to_string())
        );
        ensure_cashu!(
            amount >= Amount::ONE,
            Error::InvalidTransaction("amount must be at least 1".to_string())
        );

        Ok(Self {
            token,
            amount,
            date: unix_time(),
            is_paid: false,
        })
    }
}

/// Mint quote awaiting payment of its invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightningTransaction {
    /// Bolt11 payment request
    pub pr: String,
    /// Amount requested
    pub amount: Amount,
    /// Quote hash used to claim the minted proofs
    pub hash: String,
    /// Unix time of creation
    pub date: u64,
    /// Invoice has been paid and proofs minted
    #[serde(default)]
    pub is_paid: bool,
}

impl LightningTransaction {
    /// Create new unpaid [`LightningTransaction`]
    pub fn new(pr: String, amount: Amount, hash: String) -> Result<Self, Error> {
        ensure_cashu!(
            !pr.is_empty(),
            Error::InvalidTransaction("payment request is empty".to_string())
        );
        ensure_cashu!(
            !hash.is_empty(),
            Error::InvalidTransaction("hash is empty".to_string())
        );
        ensure_cashu!(
            amount >= Amount::ONE,
            Error::InvalidTransaction("amount must be at least 1".to_string())
        );

        Ok(Self {
            pr,
            amount,
            hash,
            date: unix_time(),
            is_paid: false,
        })
    }
}

/// Transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transaction {
    /// Outgoing token
    Ecash(EcashTransaction),
    /// Incoming invoice
    Lightning(LightningTransaction),
}

impl Transaction {
    /// Key of the transaction: the encoded token or the quote hash
    pub fn key(&self) -> &str {
        match self {
            Self::Ecash(tx) => &tx.token,
            Self::Lightning(tx) => &tx.hash,
        }
    }

    /// Amount
    pub fn amount(&self) -> Amount {
        match self {
            Self::Ecash(tx) => tx.amount,
            Self::Lightning(tx) => tx.amount,
        }
    }

    /// Paid flag
    pub fn is_paid(&self) -> bool {
        match self {
            Self::Ecash(tx) => tx.is_paid,
            Self::Lightning(tx) => tx.is_paid,
        }
    }

    /// Mark the transaction as paid
    pub fn mark_paid(&mut self) {
        match self {
            Self::Ecash(tx) => tx.is_paid = true,
            Self::Lightning(tx) => tx.is_paid = true,
        }
    }
}

impl From<EcashTransaction> for Transaction {
    fn from(tx: EcashTransaction) -> Self {
        Self::Ecash(tx)
    }
}

impl From<LightningTransaction> for Transaction {
    fn from(tx: LightningTransaction) -> Self {
        Self::Lightning(tx)
    }
}
