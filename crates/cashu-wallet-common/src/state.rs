//! Wallet state snapshot
//!
//! One mint's proofs and tracked transactions. The balance is never stored, it is always the sum
//! of the current proofs. It is written out for consumers of the serialized snapshot and ignored
//! when a snapshot is read back.
//!
//! The sum of the proofs always fits an [`Amount`]: proofs that would overflow it are rejected
//! when added and when a snapshot is loaded.

use std::collections::{BTreeMap, HashSet};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::amount;
use crate::{Amount, MintUrl, Proof, Proofs, Transaction};

/// Wallet State
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "StoredWalletState")]
pub struct WalletState {
    mint_url: MintUrl,
    proofs: Proofs,
    transactions: BTreeMap<String, Transaction>,
}

/// Snapshot as written to storage, checked before it becomes a [`WalletState`]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredWalletState {
    mint_url: MintUrl,
    #[serde(default)]
    proofs: Proofs,
    #[serde(default)]
    transactions: BTreeMap<String, Transaction>,
}

impl TryFrom<StoredWalletState> for WalletState {
    type Error = amount::Error;

    fn try_from(stored: StoredWalletState) -> Result<Self, Self::Error> {
        let mut state = WalletState::new(stored.mint_url);
        state.set_proofs(stored.proofs)?;
        state.transactions = stored.transactions;
        Ok(state)
    }
}

impl WalletState {
    /// Create new empty [`WalletState`]
    pub fn new(mint_url: MintUrl) -> Self {
        Self {
            mint_url,
            proofs: Vec::new(),
            transactions: BTreeMap::new(),
        }
    }

    /// Mint of the wallet
    pub fn mint_url(&self) -> &MintUrl {
        &self.mint_url
    }

    /// Spendable proofs
    pub fn proofs(&self) -> &[Proof] {
        &self.proofs
    }

    /// Tracked transactions by key
    pub fn transactions(&self) -> &BTreeMap<String, Transaction> {
        &self.transactions
    }

    /// Transaction by key
    pub fn transaction(&self, key: &str) -> Option<&Transaction> {
        self.transactions.get(key)
    }

    /// Transactions still waiting for confirmation
    pub fn pending_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values().filter(|tx| !tx.is_paid())
    }

    /// Balance: sum of all proof amounts
    pub fn balance(&self) -> Amount {
        // Cannot overflow, proofs are only accepted while their sum fits
        self.proofs.iter().map(|p| p.amount).sum()
    }

    /// Append proofs, skipping any whose secret is already held
    ///
    /// Nothing is added if the new balance would overflow.
    pub fn add_proofs(&mut self, proofs: Proofs) -> Result<(), amount::Error> {
        let mut known: HashSet<String> = self.proofs.iter().map(|p| p.secret.clone()).collect();
        let new: Proofs = proofs
            .into_iter()
            .filter(|proof| known.insert(proof.secret.clone()))
            .collect();

        Amount::try_sum(self.proofs.iter().chain(new.iter()).map(|p| p.amount))?;
        self.proofs.extend(new);
        Ok(())
    }

    /// Replace the proof set
    pub fn set_proofs(&mut self, proofs: Proofs) -> Result<(), amount::Error> {
        let mut state = WalletState::new(self.mint_url.clone());
        state.add_proofs(proofs)?;
        self.proofs = state.proofs;
        Ok(())
    }

    /// Keep only the proofs matching `keep`
    pub fn retain_proofs<F>(&mut self, keep: F)
    where
        F: FnMut(&Proof) -> bool,
    {
        self.proofs.retain(keep);
    }

    /// Insert a transaction under its own key
    ///
    /// An existing transaction with the same key is left untouched and `false` is returned.
    pub fn insert_transaction(&mut self, tx: Transaction) -> bool {
        let key = tx.key().to_string();
        if self.transactions.contains_key(&key) {
            return false;
        }
        self.transactions.insert(key, tx);
        true
    }

    /// Flip a transaction to paid
    ///
    /// Returns `true` only when an unpaid transaction was found.
    pub fn mark_paid(&mut self, key: &str) -> bool {
        match self.transactions.get_mut(key) {
            Some(tx) if !tx.is_paid() => {
                tx.mark_paid();
                true
            }
            _ => false,
        }
    }

    /// Remove a transaction from tracking
    pub fn remove_transaction(&mut self, key: &str) -> Option<Transaction> {
        self.transactions.remove(key)
    }
}

impl Serialize for WalletState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("WalletState", 4)?;
        state.serialize_field("mintUrl", &self.mint_url)?;
        state.serialize_field("proofs", &self.proofs)?;
        state.serialize_field("transactions", &self.transactions)?;
        state.serialize_field("balance", &self.balance())?;
        state.end()
    }
}
