//! Multi mint wallet routing and swaps against fake mints

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cashu_wallet::config::{StorageEngine, StorageSettings};
use cashu_wallet::localstore::{DynWalletStorage, MemoryStorage, StorageFactory};
use cashu_wallet::{
    Amount, ConnectorFactory, DynMintConnector, Error, MintUrl, MultiMintWallet, PollerConfig,
    ReceivePayload, ReceiveResult, ReceiveStrategy, SendPayload, SendResult, Settings, Wallet,
};
use cashu_wallet_fake_mint::{create_fake_invoice, FakeLightningNetwork, FakeMint};

const MINT_A: &str = "https://a.example.com";
const MINT_B: &str = "https://b.example.com";
const MINT_C: &str = "https://c.example.com";

struct TestMints {
    mints: HashMap<MintUrl, Arc<FakeMint>>,
}

impl TestMints {
    fn new(urls: &[&str]) -> Self {
        let network = FakeLightningNetwork::new();
        let mints = urls
            .iter()
            .map(|url| {
                let mint_url = MintUrl::from_str(url).unwrap();
                let mint = Arc::new(FakeMint::new(mint_url.clone(), Arc::clone(&network)));
                (mint_url, mint)
            })
            .collect();
        Self { mints }
    }

    fn mint(&self, url: &str) -> Arc<FakeMint> {
        Arc::clone(&self.mints[&MintUrl::from_str(url).unwrap()])
    }

    fn connector_factory(&self) -> ConnectorFactory {
        let mints = self.mints.clone();
        Arc::new(move |mint_url: &MintUrl| -> Result<DynMintConnector, Error> {
            mints
                .get(mint_url)
                .map(|mint| Arc::clone(mint) as DynMintConnector)
                .ok_or(Error::Connection(format!("no route to {mint_url}")))
        })
    }
}

fn memory_storage() -> StorageFactory {
    Arc::new(|_mint_url: &MintUrl| -> DynWalletStorage { Arc::new(MemoryStorage::default()) })
}

fn poller_config() -> PollerConfig {
    PollerConfig {
        check_interval_ms: 3_600_000,
        attempts: 20,
    }
}

fn url(url: &str) -> MintUrl {
    MintUrl::from_str(url).unwrap()
}

async fn wait_for_balance(wallet: &Wallet, amount: Amount) {
    let mut receiver = wallet.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        receiver.wait_for(|state| state.balance() == amount),
    )
    .await
    .expect("balance not reached in time")
    .expect("wallet dropped");
}

#[tokio::test]
async fn test_trust_creates_wallet() {
    let mints = TestMints::new(&[MINT_A, MINT_B]);
    let wallet = MultiMintWallet::new(memory_storage(), mints.connector_factory(), poller_config());
    let mut mint_list = wallet.subscribe_mints();
    assert!(mint_list.borrow_and_update().is_empty());

    let token = mints.mint(MINT_A).issue_token(Amount::from(16)).unwrap();
    let received = wallet
        .receive(ReceivePayload::Ecash {
            token: token.to_string(),
            strategy: ReceiveStrategy::Trust,
        })
        .await
        .unwrap();

    assert_eq!(received, ReceiveResult::Ecash(Amount::from(16)));
    assert!(wallet.is_trusted_mint(&url(MINT_A)).await);
    assert!(!wallet.is_trusted_mint(&url(MINT_B)).await);
    assert!(mint_list.has_changed().unwrap());
    assert_eq!(*mint_list.borrow_and_update(), vec![url(MINT_A)]);
    assert_eq!(wallet.total_balance().await.unwrap(), Amount::from(16));
}

#[tokio::test]
async fn test_send_routes_by_mint() {
    let mints = TestMints::new(&[MINT_A, MINT_B]);
    let wallet = MultiMintWallet::new(memory_storage(), mints.connector_factory(), poller_config());

    for mint_url in [MINT_A, MINT_B] {
        wallet.add_mint(url(mint_url)).await.unwrap();
        let token = mints.mint(mint_url).issue_token(Amount::from(10)).unwrap();
        wallet
            .receive(ReceivePayload::Ecash {
                token: token.to_string(),
                strategy: ReceiveStrategy::Trust,
            })
            .await
            .unwrap();
    }

    let sent = wallet
        .send(SendPayload::Ecash {
            mint_url: url(MINT_B),
            amount: Amount::from(3),
        })
        .await
        .unwrap();
    assert!(matches!(sent, SendResult::Ecash(_)));

    let balances = wallet.get_balances().await;
    assert_eq!(balances[&url(MINT_A)], Amount::from(10));
    assert_eq!(balances[&url(MINT_B)], Amount::from(7));
    assert_eq!(wallet.total_balance().await.unwrap(), Amount::from(17));

    let invoice = create_fake_invoice(2_000, "external".to_string()).unwrap();
    let paid = wallet
        .send(SendPayload::Lightning {
            mint_url: url(MINT_A),
            invoice: invoice.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(paid, SendResult::Lightning(Amount::from(2)));

    assert!(matches!(
        wallet
            .send(SendPayload::Ecash {
                mint_url: url(MINT_C),
                amount: Amount::from(1),
            })
            .await,
        Err(Error::UnknownWallet(_))
    ));
}

#[tokio::test]
async fn test_receive_lightning_routes_by_mint() {
    let mints = TestMints::new(&[MINT_A]);
    let wallet = MultiMintWallet::new(memory_storage(), mints.connector_factory(), poller_config());

    assert!(matches!(
        wallet
            .receive(ReceivePayload::Lightning {
                mint_url: url(MINT_A),
                amount: Amount::from(5),
            })
            .await,
        Err(Error::UnknownWallet(_))
    ));

    let mint_wallet = wallet.add_mint(url(MINT_A)).await.unwrap();
    let invoice = match wallet
        .receive(ReceivePayload::Lightning {
            mint_url: url(MINT_A),
            amount: Amount::from(5),
        })
        .await
        .unwrap()
    {
        ReceiveResult::Lightning(invoice) => invoice,
        other => panic!("unexpected result {other:?}"),
    };

    mints.mint(MINT_A).pay_quote(&invoice).unwrap();
    mint_wallet.check().await;
    wait_for_balance(&mint_wallet, Amount::from(5)).await;
}

#[tokio::test]
async fn test_swap_into_trusted_mint() {
    let mints = TestMints::new(&[MINT_A, MINT_B]);
    mints.mint(MINT_A).set_fee(Amount::from(2));
    let wallet = MultiMintWallet::new(memory_storage(), mints.connector_factory(), poller_config());
    let trusted = wallet.add_mint(url(MINT_B)).await.unwrap();

    let token = mints.mint(MINT_A).issue_token(Amount::from(40)).unwrap();
    assert_eq!(
        wallet
            .get_swap_fee(&token.to_string(), &url(MINT_B))
            .await
            .unwrap(),
        Amount::from(2)
    );

    let received = wallet
        .receive(ReceivePayload::Ecash {
            token: token.to_string(),
            strategy: ReceiveStrategy::Swap {
                mint_url: url(MINT_B),
            },
        })
        .await
        .unwrap();
    assert_eq!(received, ReceiveResult::Swap(Amount::from(38)));
    // The untrusted mint did not become trusted
    assert!(!wallet.is_trusted_mint(&url(MINT_A)).await);

    trusted.check().await;
    wait_for_balance(&trusted, Amount::from(38)).await;
}

#[tokio::test]
async fn test_swap_from_trusted_mint_is_a_receive() {
    let mints = TestMints::new(&[MINT_A, MINT_B]);
    let wallet = MultiMintWallet::new(memory_storage(), mints.connector_factory(), poller_config());
    let a = wallet.add_mint(url(MINT_A)).await.unwrap();
    let b = wallet.add_mint(url(MINT_B)).await.unwrap();

    let token = mints.mint(MINT_A).issue_token(Amount::from(12)).unwrap();
    let received = wallet
        .receive(ReceivePayload::Ecash {
            token: token.to_string(),
            strategy: ReceiveStrategy::Swap {
                mint_url: url(MINT_B),
            },
        })
        .await
        .unwrap();

    assert_eq!(received, ReceiveResult::Ecash(Amount::from(12)));
    assert_eq!(a.balance(), Amount::from(12));
    assert_eq!(b.balance(), Amount::ZERO);
    assert!(b.state().transactions().is_empty());
}

#[tokio::test]
async fn test_swap_needs_trusted_destination() {
    let mints = TestMints::new(&[MINT_A, MINT_B]);
    let wallet = MultiMintWallet::new(memory_storage(), mints.connector_factory(), poller_config());

    let token = mints.mint(MINT_A).issue_token(Amount::from(12)).unwrap();
    assert!(matches!(
        wallet
            .receive(ReceivePayload::Ecash {
                token: token.to_string(),
                strategy: ReceiveStrategy::Swap {
                    mint_url: url(MINT_B),
                },
            })
            .await,
        Err(Error::UnknownWallet(_))
    ));
}

#[tokio::test]
async fn test_add_and_remove_mints() {
    let mints = TestMints::new(&[MINT_A, MINT_B]);
    let wallet = MultiMintWallet::new(memory_storage(), mints.connector_factory(), poller_config());

    let first = wallet.add_mint(url(MINT_A)).await.unwrap();
    let again = wallet.add_mint(url(MINT_A)).await.unwrap();
    first
        .receive_ecash(
            &mints
                .mint(MINT_A)
                .issue_token(Amount::from(4))
                .unwrap()
                .to_string(),
        )
        .await
        .unwrap();
    // Both handles share one wallet
    assert_eq!(again.balance(), Amount::from(4));

    let external = Wallet::new(
        url(MINT_B),
        mints.mint(MINT_B) as DynMintConnector,
        Arc::new(MemoryStorage::default()),
        poller_config(),
    )
    .await
    .unwrap();
    wallet.add_wallet(external).await;
    assert_eq!(wallet.get_wallets().await.len(), 2);

    assert!(wallet.remove_mint(&url(MINT_A)).await);
    assert!(!wallet.remove_mint(&url(MINT_A)).await);
    assert!(wallet.get_wallet(&url(MINT_A)).await.is_none());
    assert_eq!(*wallet.subscribe_mints().borrow(), vec![url(MINT_B)]);

    wallet.destroy().await;
}

#[tokio::test]
async fn test_add_wallet_keeps_held_wallet_running() {
    let mints = TestMints::new(&[MINT_A]);
    let wallet = MultiMintWallet::new(memory_storage(), mints.connector_factory(), poller_config());

    let held = wallet.add_mint(url(MINT_A)).await.unwrap();
    wallet.add_wallet(held.clone()).await;

    let mint_wallet = wallet.get_wallet(&url(MINT_A)).await.unwrap();
    let invoice = mint_wallet.receive_lightning(Amount::from(10)).await.unwrap();
    mints.mint(MINT_A).pay_quote(&invoice).unwrap();
    mint_wallet.check().await;
    wait_for_balance(&held, Amount::from(10)).await;

    // A different wallet for the same mint replaces and shuts down the held one
    let replacement = Wallet::new(
        url(MINT_A),
        mints.mint(MINT_A) as DynMintConnector,
        Arc::new(MemoryStorage::default()),
        poller_config(),
    )
    .await
    .unwrap();
    wallet.add_wallet(replacement).await;

    assert!(matches!(
        held.receive_lightning(Amount::from(1)).await,
        Err(Error::Shutdown)
    ));
    let current = wallet.get_wallet(&url(MINT_A)).await.unwrap();
    assert!(current.receive_lightning(Amount::from(1)).await.is_ok());
}

#[tokio::test]
async fn test_from_settings() {
    let dir = tempfile::tempdir().unwrap();
    let mints = TestMints::new(&[MINT_A, MINT_B]);

    let settings = Settings {
        poller: poller_config(),
        storage: StorageSettings {
            engine: StorageEngine::File,
            work_dir: dir.path().to_path_buf(),
        },
        mints: vec![MINT_A.to_string(), MINT_B.to_string()],
    };

    let wallet = MultiMintWallet::from_settings(&settings, mints.connector_factory())
        .await
        .unwrap();
    let a = wallet.get_wallet(&url(MINT_A)).await.unwrap();
    a.receive_ecash(
        &mints
            .mint(MINT_A)
            .issue_token(Amount::from(6))
            .unwrap()
            .to_string(),
    )
    .await
    .unwrap();
    wallet.destroy().await;

    // Balances are restored from the work dir
    let restored = MultiMintWallet::from_settings(&settings, mints.connector_factory())
        .await
        .unwrap();
    assert_eq!(restored.total_balance().await.unwrap(), Amount::from(6));
    assert_eq!(restored.get_wallets().await.len(), 2);
}

#[tokio::test]
async fn test_from_settings_rejects_invalid_mint() {
    let mints = TestMints::new(&[]);
    let settings = Settings {
        mints: vec!["not a url".to_string()],
        ..Settings::default()
    };

    assert!(MultiMintWallet::from_settings(&settings, mints.connector_factory())
        .await
        .is_err());
}
