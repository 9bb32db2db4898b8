//! Macro with default tests
//!
//! This set is generic and checks the default and expected behaviour for a wallet storage
//! implementation. Storages under test must be created for [`MINT_URL`].
#![allow(clippy::unwrap_used)]

use std::str::FromStr;

use super::*;
use crate::{Amount, EcashTransaction, LightningTransaction, MintUrl, Proof};

/// Mint the storage under test is bound to
pub const MINT_URL: &str = "https://mint.example.com";

fn proof(amount: u64, secret: &str) -> Proof {
    Proof::new(
        Amount::from(amount),
        "009a1f293253e41e".to_string(),
        secret.to_string(),
        "02bc9097997d81afb2cc7346b5e4345a9346bd2a506eb7958598a72f0cf85163ea".to_string(),
    )
}

fn populated_state() -> WalletState {
    let mut state = WalletState::new(MintUrl::from_str(MINT_URL).unwrap());
    state
        .add_proofs(vec![proof(64, "a"), proof(4, "b"), proof(2, "c")])
        .unwrap();
    state.insert_transaction(
        EcashTransaction::new("cashuAtoken".to_string(), Amount::from(30))
            .unwrap()
            .into(),
    );
    state.insert_transaction(
        LightningTransaction::new("lnbc500n1".to_string(), Amount::from(50), "hash".to_string())
            .unwrap()
            .into(),
    );
    state
}

/// Fresh storage has no snapshot
pub async fn empty_storage<S>(storage: S)
where
    S: WalletStorage,
{
    assert!(storage.get().await.unwrap().is_none());
}

/// A written snapshot is read back unchanged
pub async fn set_and_get<S>(storage: S)
where
    S: WalletStorage,
{
    let state = populated_state();
    storage.set(&state).await.unwrap();

    let stored = storage.get().await.unwrap().unwrap();
    assert_eq!(stored, state);
    assert_eq!(stored.balance(), Amount::from(70));
    assert_eq!(stored.transactions().len(), 2);
}

/// Every write replaces the previous snapshot
pub async fn set_overwrites<S>(storage: S)
where
    S: WalletStorage,
{
    let mut state = populated_state();
    storage.set(&state).await.unwrap();

    state.set_proofs(vec![proof(8, "d")]).unwrap();
    assert!(state.mark_paid("hash"));
    storage.set(&state).await.unwrap();

    let stored = storage.get().await.unwrap().unwrap();
    assert_eq!(stored.proofs().len(), 1);
    assert_eq!(stored.balance(), Amount::from(8));
    assert!(stored.transaction("hash").unwrap().is_paid());
}

/// An empty snapshot is still a snapshot
pub async fn set_empty_state<S>(storage: S)
where
    S: WalletStorage,
{
    storage.set(&populated_state()).await.unwrap();

    let empty = WalletState::new(MintUrl::from_str(MINT_URL).unwrap());
    storage.set(&empty).await.unwrap();

    let stored = storage.get().await.unwrap().unwrap();
    assert_eq!(stored, empty);
    assert_eq!(stored.balance(), Amount::ZERO);
}

/// Unit test that is expected to be passed for a correct wallet storage implementation
#[macro_export]
macro_rules! wallet_storage_test {
    ($make_storage_fn:ident) => {
        wallet_storage_test!(
            $make_storage_fn,
            empty_storage,
            set_and_get,
            set_overwrites,
            set_empty_state
        );
    };
    ($make_storage_fn:ident, $($name:ident),+ $(,)?) => {
        ::paste::paste! {
            $(
                #[tokio::test]
                async fn [<storage_ $name>]() {
                    cashu_wallet_common::database::test::$name($make_storage_fn(stringify!($name)).await).await;
                }
            )+
        }
    };
}
