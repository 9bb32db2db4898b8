//! Proofs
//!
//! A proof is an opaque unit of value issued by a mint. The wallet never inspects the signature;
//! it only sums amounts and identifies proofs by their secret.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::amount::{self, Amount};

/// List of [Proof]
pub type Proofs = Vec<Proof>;

/// Proof
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proof {
    /// Amount
    pub amount: Amount,
    /// `Keyset id`
    #[serde(rename = "id")]
    pub keyset_id: String,
    /// Secret message
    pub secret: String,
    /// Unblinded signature
    #[serde(rename = "C")]
    pub c: String,
    /// Witness unlocking a spending condition, kept in its encoded form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness: Option<String>,
    /// DLEQ Proof
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dleq: Option<ProofDleq>,
}

/// DLEQ proof of a [`Proof`], hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofDleq {
    /// e
    pub e: String,
    /// s
    pub s: String,
    /// Blinding factor
    pub r: String,
}

impl Proof {
    /// Create new [`Proof`]
    pub fn new(amount: Amount, keyset_id: String, secret: String, c: String) -> Self {
        Proof {
            amount,
            keyset_id,
            secret,
            c,
            witness: None,
            dleq: None,
        }
    }
}

/// Utility methods for [Proofs]
pub trait ProofsMethods {
    /// Try to sum up the amounts of all [Proof]s
    fn total_amount(&self) -> Result<Amount, amount::Error>;

    /// Secrets of all [Proof]s
    fn secrets(&self) -> HashSet<&str>;
}

impl ProofsMethods for [Proof] {
    fn total_amount(&self) -> Result<Amount, amount::Error> {
        Amount::try_sum(self.iter().map(|p| p.amount))
    }

    fn secrets(&self) -> HashSet<&str> {
        self.iter().map(|p| p.secret.as_str()).collect()
    }
}
