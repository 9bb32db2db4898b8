//! Errors

use std::string::FromUtf8Error;

use thiserror::Error;

use crate::{amount, database, mint_url};

/// Wallet Error
#[derive(Debug, Error)]
pub enum Error {
    /// Amount must be greater than zero
    #[error("Amount must be greater than zero")]
    AmountZero,
    /// Not enough proofs to cover the amount
    #[error("Insufficient funds")]
    InsufficientFunds,
    /// Token was issued by a different mint than the wallet's
    #[error("Token mint `{token}` does not match wallet mint `{wallet}`")]
    IncorrectMint {
        /// Mint of the wallet
        wallet: String,
        /// Mint of the token
        token: String,
    },
    /// Token references more than one mint
    #[error("Multi-mint tokens are not supported")]
    MultiMintTokenNotSupported,
    /// Token does not reference any mint
    #[error("Token mint undefined")]
    TokenMintUndefined,
    /// Token has no proofs
    #[error("Proofs required in token")]
    ProofsRequired,
    /// Token prefix is not supported
    #[error("Unsupported token")]
    UnsupportedToken,
    /// Bolt11 invoice does not have amount
    #[error("Invoice Amount undefined")]
    InvoiceAmountUndefined,
    /// Transaction payload is not valid
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    /// Quote is not known by the mint
    #[error("Unknown quote")]
    UnknownQuote,
    /// Quote has not been paid yet
    #[error("Quote not paid")]
    UnpaidQuote,
    /// Quote has already been issued
    #[error("Quote already issued")]
    IssuedQuote,
    /// Proofs are already spent
    #[error("Token already spent")]
    TokenAlreadySpent,
    /// Proofs are not known by the mint
    #[error("Token not verified")]
    TokenNotVerified,
    /// Invoice already paid
    #[error("Request already paid")]
    InvoiceAlreadyPaid,
    /// Proofs do not cover the requested payment
    #[error("Inputs do not cover amount")]
    InputsInsufficient,
    /// Mint could not be reached
    #[error("Could not connect to mint: {0}")]
    Connection(String),
    /// Swap amount does not cover the swap fee
    #[error("Swap amount `{amount}` does not cover fee `{fee}`")]
    SwapAmountTooSmall {
        /// Token value
        amount: u64,
        /// Fee charged by the source mint
        fee: u64,
    },
    /// Transaction not tracked by the wallet
    #[error("Transaction not found")]
    TransactionNotFound,
    /// Transaction cannot be revoked
    #[error("Only unpaid lightning transactions can be revoked")]
    CannotRevoke,
    /// No wallet for the mint
    #[error("Unknown wallet: `{0}`")]
    UnknownWallet(String),
    /// Wallet has been destroyed
    #[error("Wallet is shut down")]
    Shutdown,
    /// Custom error
    #[error("`{0}`")]
    Custom(String),

    // External Error conversions
    /// Mint Url Error
    #[error(transparent)]
    MintUrl(#[from] mint_url::Error),
    /// Amount Error
    #[error(transparent)]
    Amount(#[from] amount::Error),
    /// Parse invoice error
    #[error(transparent)]
    Invoice(#[from] lightning_invoice::ParseOrSemanticError),
    /// Base64 error
    #[error(transparent)]
    Base64Error(#[from] bitcoin::base64::DecodeError),
    /// From Utf8 Error
    #[error(transparent)]
    Utf8ParseError(#[from] FromUtf8Error),
    /// Serde Json error
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
    /// Database Error
    #[error(transparent)]
    Database(#[from] database::Error),
}

impl Error {
    /// Check if the error is transient
    ///
    /// A transient error says nothing about the state of the request at the mint. The poller
    /// keeps retrying these until its attempt budget runs out.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::UnpaidQuote)
    }
}
