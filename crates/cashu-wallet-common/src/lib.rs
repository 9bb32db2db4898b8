//! Cashu wallet shared types and functions.
//!
//! This crate is the base foundation for the wallet crates: value types, the encoded token wire
//! format, the transaction model, the wallet state snapshot and the two boundaries a wallet
//! consumes (the mint connector and the storage backend).

pub mod amount;
pub mod connector;
pub mod database;
pub mod error;
pub mod invoice;
pub mod mint_url;
pub mod proof;
pub mod state;
pub mod token;
pub mod transaction;
pub mod util;

// re-exporting external crates
pub use lightning_invoice::{self, Bolt11Invoice};
pub use {bitcoin, parking_lot};

pub use self::amount::Amount;
pub use self::connector::{MintConnector, MintQuote, SendResponse};
pub use self::database::WalletStorage;
pub use self::error::Error;
pub use self::mint_url::MintUrl;
pub use self::proof::{Proof, ProofDleq, Proofs, ProofsMethods};
pub use self::state::WalletState;
pub use self::token::Token;
pub use self::transaction::{EcashTransaction, LightningTransaction, Transaction};

/// Return early with an error if a condition is not satisfied
#[macro_export]
macro_rules! ensure_cashu {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
