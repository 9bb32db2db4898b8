use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cashu_wallet::localstore::FileStorage;
use cashu_wallet::{Amount, DynMintConnector, MintConnector, MintUrl, PollerConfig, Token, Wallet};
use cashu_wallet_fake_mint::{FakeLightningNetwork, FakeMint};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mint_url = MintUrl::from_str("https://fake.example.com")?;
    let mint = Arc::new(FakeMint::new(mint_url.clone(), FakeLightningNetwork::new()));

    // Persist the wallet next to the example
    let work_dir = tempfile::tempdir()?;
    let localstore = Arc::new(FileStorage::new(work_dir.path().join("wallet.json")));

    let wallet = Wallet::new(
        mint_url,
        Arc::clone(&mint) as DynMintConnector,
        localstore,
        PollerConfig {
            check_interval_ms: 500,
            attempts: 20,
        },
    )
    .await?;

    let mut updates = wallet.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            println!(
                "balance {} with {} pending transactions",
                state.balance(),
                state.pending_transactions().count()
            );
        }
    });

    // Request an invoice and have someone pay it
    let invoice = wallet.receive_lightning(Amount::from(64)).await?;
    println!("Pay request: {invoice}");
    mint.pay_quote(&invoice)?;

    let mut receiver = wallet.subscribe();
    tokio::time::timeout(
        Duration::from_secs(10),
        receiver.wait_for(|state| state.balance() == Amount::from(64)),
    )
    .await??;

    // Send a token and wait for the recipient to redeem it
    let token = wallet.send_ecash(Amount::from(21)).await?;
    println!("{token}");

    mint.receive(&Token::from_str(&token)?).await?;
    tokio::time::timeout(
        Duration::from_secs(10),
        receiver.wait_for(|state| state.pending_transactions().count() == 0),
    )
    .await??;

    println!("Final balance: {}", wallet.balance());
    wallet.destroy().await;

    Ok(())
}
