//! Fake Mint Error

use thiserror::Error;

/// Fake Mint Error
#[derive(Debug, Error)]
pub enum Error {
    /// Quote not created by this mint
    #[error("Unknown quote")]
    UnknownQuote,
    /// Invoice already paid
    #[error("Invoice already paid")]
    AlreadyPaid,
    /// Proof not issued by this mint
    #[error("Unknown proof")]
    UnknownProof,
    /// Proof already spent
    #[error("Proof already spent")]
    ProofSpent,
    /// Invoice could not be built
    #[error("Could not create invoice: {0}")]
    Invoice(String),
    /// Mint set offline
    #[error("Mint offline")]
    Offline,
}

impl From<Error> for cashu_wallet_common::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::UnknownQuote => Self::UnknownQuote,
            Error::AlreadyPaid => Self::InvoiceAlreadyPaid,
            Error::UnknownProof => Self::TokenNotVerified,
            Error::ProofSpent => Self::TokenAlreadySpent,
            Error::Offline => Self::Connection("fake mint offline".to_string()),
            Error::Invoice(err) => Self::Custom(err),
        }
    }
}
