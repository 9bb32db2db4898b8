use std::fmt;
use std::sync::Arc;

use cashu_wallet_common::{Error, MintConnector, MintUrl, WalletStorage};
use tokio_util::sync::CancellationToken;

use super::state::StateStore;
use super::{ConnectorFactory, DynMintConnector, Listener, Wallet};
use crate::config::PollerConfig;
use crate::localstore::{DynWalletStorage, MemoryStorage};
use crate::poller::Poller;

/// Builder for creating a new [`Wallet`]
#[derive(Default)]
pub struct WalletBuilder {
    mint_url: Option<MintUrl>,
    client: Option<DynMintConnector>,
    localstore: Option<DynWalletStorage>,
    poller_config: PollerConfig,
    connector_factory: Option<ConnectorFactory>,
}

impl fmt::Debug for WalletBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletBuilder")
            .field("mint_url", &self.mint_url)
            .field("client", &self.client)
            .field("localstore", &self.localstore)
            .field("poller_config", &self.poller_config)
            .field("connector_factory", &self.connector_factory.is_some())
            .finish()
    }
}

impl WalletBuilder {
    /// Create a new WalletBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mint URL
    pub fn mint_url(mut self, mint_url: MintUrl) -> Self {
        self.mint_url = Some(mint_url);
        self
    }

    /// Set a custom client connector
    pub fn client<C: MintConnector + 'static + Send + Sync>(mut self, client: C) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    /// Set a shared client connector
    pub fn shared_client(mut self, client: DynMintConnector) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the local storage backend, in memory if not set
    pub fn localstore(mut self, localstore: Arc<dyn WalletStorage + Send + Sync>) -> Self {
        self.localstore = Some(localstore);
        self
    }

    /// Set the poller config
    pub fn poller_config(mut self, poller_config: PollerConfig) -> Self {
        self.poller_config = poller_config;
        self
    }

    /// Set the factory used to reach other mints
    ///
    /// Required for swaps. Also used to create the wallet's own client when none is set.
    pub fn connector_factory(mut self, connector_factory: ConnectorFactory) -> Self {
        self.connector_factory = Some(connector_factory);
        self
    }

    /// Build the wallet
    ///
    /// Loads the stored state and resumes polling for every transaction still pending in it.
    pub async fn build(self) -> Result<Wallet, Error> {
        let mint_url = self
            .mint_url
            .ok_or(Error::Custom("Mint url required".to_string()))?;

        let client = match (self.client, &self.connector_factory) {
            (Some(client), _) => client,
            (None, Some(factory)) => factory(&mint_url)?,
            (None, None) => return Err(Error::Custom("Mint connector required".to_string())),
        };

        let localstore = self
            .localstore
            .unwrap_or_else(|| Arc::new(MemoryStorage::default()));

        let state = Arc::new(StateStore::load(&mint_url, localstore).await?);
        let (poller, streams) =
            Poller::new(mint_url.clone(), Arc::clone(&client), self.poller_config);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(super::listen(
            Arc::clone(&state),
            streams,
            cancel.clone(),
        ));

        let wallet = Wallet {
            mint_url,
            client,
            state,
            poller: Arc::new(poller),
            connector_factory: self.connector_factory,
            listener: Arc::new(Listener::new(cancel, handle)),
        };

        let resumed = wallet.check_pending_transactions();
        if resumed > 0 {
            tracing::debug!(
                "Resuming {} pending transactions of {}",
                resumed,
                wallet.mint_url
            );
            wallet.poller.check();
        }

        Ok(wallet)
    }
}
