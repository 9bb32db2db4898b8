//! Moves a token of an untrusted mint into a trusted one over lightning

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cashu_wallet::config::{Settings, StorageEngine};
use cashu_wallet::{
    Amount, ConnectorFactory, DynMintConnector, Error, MintUrl, MultiMintWallet, ReceivePayload,
    ReceiveStrategy,
};
use cashu_wallet_fake_mint::{FakeLightningNetwork, FakeMint};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let network = FakeLightningNetwork::new();
    let trusted_url = MintUrl::from_str("https://trusted.example.com")?;
    let untrusted_url = MintUrl::from_str("https://untrusted.example.com")?;

    let trusted = Arc::new(FakeMint::new(trusted_url.clone(), Arc::clone(&network)));
    let untrusted = Arc::new(FakeMint::new(untrusted_url.clone(), Arc::clone(&network)));
    untrusted.set_fee(Amount::from(2));

    let mints: HashMap<MintUrl, Arc<FakeMint>> = [
        (trusted_url.clone(), trusted),
        (untrusted_url, Arc::clone(&untrusted)),
    ]
    .into_iter()
    .collect();
    let connector_factory: ConnectorFactory =
        Arc::new(move |mint_url: &MintUrl| -> Result<DynMintConnector, Error> {
            mints
                .get(mint_url)
                .map(|mint| Arc::clone(mint) as DynMintConnector)
                .ok_or(Error::Connection(format!("no route to {mint_url}")))
        });

    // Settings from an optional file given as first argument, then the environment
    let mut settings = Settings::new(std::env::args().nth(1));
    settings.storage.engine = StorageEngine::Memory;
    settings.poller.check_interval_ms = 500;
    settings.mints = vec![trusted_url.to_string()];

    let wallet = MultiMintWallet::from_settings(&settings, connector_factory).await?;

    let token = untrusted.issue_token(Amount::from(40))?.to_string();
    println!(
        "Swap fee: {}",
        wallet.get_swap_fee(&token, &trusted_url).await?
    );

    let result = wallet
        .receive(ReceivePayload::Ecash {
            token,
            strategy: ReceiveStrategy::Swap {
                mint_url: trusted_url.clone(),
            },
        })
        .await?;
    println!("{result:?}");

    if let Some(trusted_wallet) = wallet.get_wallet(&trusted_url).await {
        let mut receiver = trusted_wallet.subscribe();
        tokio::time::timeout(
            Duration::from_secs(10),
            receiver.wait_for(|state| state.pending_transactions().count() == 0),
        )
        .await??;
    }

    for (mint_url, balance) in wallet.get_balances().await {
        println!("{mint_url}: {balance}");
    }
    wallet.destroy().await;

    Ok(())
}
