//! Cashu ecash wallet
//!
//! A [`Wallet`] holds the proofs of one mint and tracks the transactions that wait for the mint
//! to confirm something: an invoice being paid or a sent token being redeemed. A background
//! [`Poller`](poller::Poller) per wallet reconciles them. A [`MultiMintWallet`] holds the wallets
//! of every trusted mint and swaps tokens of untrusted mints into trusted ones over lightning.
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod config;
pub mod localstore;
pub mod multi_mint_wallet;
pub mod poller;
pub mod wallet;

/// Re-export shared types
#[doc(hidden)]
pub use cashu_wallet_common::{
    amount, database, ensure_cashu,
    error::{self, Error},
    invoice, lightning_invoice, mint_url, Amount, Bolt11Invoice, EcashTransaction,
    LightningTransaction, MintConnector, MintQuote, MintUrl, Proof, Proofs, ProofsMethods,
    SendResponse, Token, Transaction, WalletState, WalletStorage,
};
/// Re-export futures::Stream
pub use futures::{Stream, StreamExt};

pub use self::config::{PollerConfig, Settings};
pub use self::multi_mint_wallet::{
    MultiMintWallet, ReceivePayload, ReceiveResult, ReceiveStrategy, SendPayload, SendResult,
};
pub use self::wallet::{ConnectorFactory, DynMintConnector, Wallet, WalletBuilder};
