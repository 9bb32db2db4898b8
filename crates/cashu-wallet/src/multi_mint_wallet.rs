//! MultiMint Wallet
//!
//! Holds one [`Wallet`] per trusted mint and routes payloads to the wallet of the mint they name.
//! Tokens of mints that are not trusted can be swapped into a trusted one over lightning.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cashu_wallet_common::{Amount, Error, MintUrl, Token};
use tokio::sync::{watch, RwLock};
use tracing::instrument;

use crate::config::{PollerConfig, Settings};
use crate::localstore::{storage_factory, StorageFactory};
use crate::wallet::{ConnectorFactory, Wallet, WalletBuilder};

/// What to send and from which mint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendPayload {
    /// Create a token
    Ecash {
        /// Mint to send from
        mint_url: MintUrl,
        /// Amount
        amount: Amount,
    },
    /// Pay an invoice
    Lightning {
        /// Mint to pay from
        mint_url: MintUrl,
        /// Bolt11 invoice
        invoice: String,
    },
}

impl SendPayload {
    /// Mint the payload is routed to
    pub fn mint_url(&self) -> &MintUrl {
        match self {
            Self::Ecash { mint_url, .. } | Self::Lightning { mint_url, .. } => mint_url,
        }
    }
}

/// Outcome of [`MultiMintWallet::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    /// Encoded token
    Ecash(String),
    /// Amount spent including the fee
    Lightning(Amount),
}

/// How to receive a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveStrategy {
    /// Redeem at the token's own mint, trusting it from then on
    Trust,
    /// Swap into a trusted mint unless the token's mint is already trusted
    Swap {
        /// Trusted mint receiving the value
        mint_url: MintUrl,
    },
}

/// What to receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceivePayload {
    /// Encoded token
    Ecash {
        /// Encoded token
        token: String,
        /// Strategy
        strategy: ReceiveStrategy,
    },
    /// Invoice to be paid by someone else
    Lightning {
        /// Mint issuing the invoice
        mint_url: MintUrl,
        /// Amount
        amount: Amount,
    },
}

/// Outcome of [`MultiMintWallet::receive`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveResult {
    /// Amount received
    Ecash(Amount),
    /// Amount invoiced by a swap, credited once the invoice is paid
    Swap(Amount),
    /// Invoice to pay
    Lightning(String),
}

/// Multi Mint Wallet
///
/// Wallets of newly trusted mints get their storage from the storage factory and their client
/// from the connector factory.
#[derive(Clone)]
pub struct MultiMintWallet {
    /// Wallets indexed by mint URL
    wallets: Arc<RwLock<BTreeMap<MintUrl, Wallet>>>,
    mints: Arc<watch::Sender<Vec<MintUrl>>>,
    storage_factory: StorageFactory,
    connector_factory: ConnectorFactory,
    poller_config: PollerConfig,
}

impl fmt::Debug for MultiMintWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiMintWallet")
            .field("mints", &*self.mints.borrow())
            .field("poller_config", &self.poller_config)
            .finish()
    }
}

impl MultiMintWallet {
    /// Create new empty [`MultiMintWallet`]
    pub fn new(
        storage_factory: StorageFactory,
        connector_factory: ConnectorFactory,
        poller_config: PollerConfig,
    ) -> Self {
        let (mints, _) = watch::channel(Vec::new());

        Self {
            wallets: Arc::new(RwLock::new(BTreeMap::new())),
            mints: Arc::new(mints),
            storage_factory,
            connector_factory,
            poller_config,
        }
    }

    /// Create a [`MultiMintWallet`] from settings, trusting every mint they list
    pub async fn from_settings(
        settings: &Settings,
        connector_factory: ConnectorFactory,
    ) -> Result<Self, Error> {
        let wallet = Self::new(
            storage_factory(&settings.storage)?,
            connector_factory,
            settings.poller,
        );

        for mint in &settings.mints {
            wallet.add_mint(MintUrl::from_str(mint)?).await?;
        }

        Ok(wallet)
    }

    /// Trust a mint, loading its wallet from storage
    ///
    /// Returns the existing wallet if the mint is already trusted.
    #[instrument(skip(self))]
    pub async fn add_mint(&self, mint_url: MintUrl) -> Result<Wallet, Error> {
        let mut wallets = self.wallets.write().await;
        if let Some(wallet) = wallets.get(&mint_url) {
            return Ok(wallet.clone());
        }

        let wallet = WalletBuilder::new()
            .mint_url(mint_url.clone())
            .localstore((self.storage_factory)(&mint_url))
            .connector_factory(Arc::clone(&self.connector_factory))
            .poller_config(self.poller_config)
            .build()
            .await?;

        wallets.insert(mint_url, wallet.clone());
        self.publish_mints(&wallets);

        Ok(wallet)
    }

    /// Add a wallet built elsewhere
    ///
    /// A different wallet already held for the same mint is destroyed and replaced. Adding a
    /// handle of the wallet already held changes nothing.
    #[instrument(skip_all, fields(mint_url = %wallet.mint_url))]
    pub async fn add_wallet(&self, wallet: Wallet) {
        let replaced = {
            let mut wallets = self.wallets.write().await;
            if wallets
                .get(&wallet.mint_url)
                .is_some_and(|held| held.is_same_wallet(&wallet))
            {
                return;
            }

            let replaced = wallets.insert(wallet.mint_url.clone(), wallet);
            self.publish_mints(&wallets);
            replaced
        };

        if let Some(replaced) = replaced {
            replaced.destroy().await;
        }
    }

    /// Stop trusting a mint
    ///
    /// Its wallet is destroyed, its stored state is left untouched.
    #[instrument(skip(self))]
    pub async fn remove_mint(&self, mint_url: &MintUrl) -> bool {
        let removed = {
            let mut wallets = self.wallets.write().await;
            let removed = wallets.remove(mint_url);
            self.publish_mints(&wallets);
            removed
        };

        match removed {
            Some(wallet) => {
                wallet.destroy().await;
                true
            }
            None => false,
        }
    }

    /// Wallet of a trusted mint
    pub async fn get_wallet(&self, mint_url: &MintUrl) -> Option<Wallet> {
        self.wallets.read().await.get(mint_url).cloned()
    }

    /// Wallets of all trusted mints
    pub async fn get_wallets(&self) -> Vec<Wallet> {
        self.wallets.read().await.values().cloned().collect()
    }

    /// Whether a wallet is held for `mint_url`
    pub async fn is_trusted_mint(&self, mint_url: &MintUrl) -> bool {
        self.wallets.read().await.contains_key(mint_url)
    }

    /// Balance of every trusted mint
    pub async fn get_balances(&self) -> BTreeMap<MintUrl, Amount> {
        self.wallets
            .read()
            .await
            .iter()
            .map(|(mint_url, wallet)| (mint_url.clone(), wallet.balance()))
            .collect()
    }

    /// Sum of all balances
    pub async fn total_balance(&self) -> Result<Amount, Error> {
        let balances = self.get_balances().await;
        Ok(Amount::try_sum(balances.into_values())?)
    }

    /// Receiver of the trusted mint list, starting with the current one
    pub fn subscribe_mints(&self) -> watch::Receiver<Vec<MintUrl>> {
        self.mints.subscribe()
    }

    /// Send from the wallet of the payload's mint
    #[instrument(skip(self))]
    pub async fn send(&self, payload: SendPayload) -> Result<SendResult, Error> {
        let wallet = self.trusted_wallet(payload.mint_url()).await?;

        match payload {
            SendPayload::Ecash { amount, .. } => Ok(SendResult::Ecash(wallet.send_ecash(amount).await?)),
            SendPayload::Lightning { invoice, .. } => Ok(SendResult::Lightning(
                wallet.send_lightning(&invoice).await?,
            )),
        }
    }

    /// Receive a token or request an invoice
    #[instrument(skip(self))]
    pub async fn receive(&self, payload: ReceivePayload) -> Result<ReceiveResult, Error> {
        match payload {
            ReceivePayload::Ecash {
                token,
                strategy: ReceiveStrategy::Trust,
            } => self.receive_and_trust(&token).await,
            ReceivePayload::Ecash {
                token,
                strategy: ReceiveStrategy::Swap { mint_url },
            } => self.receive_and_swap(&token, &mint_url).await,
            ReceivePayload::Lightning { mint_url, amount } => {
                let wallet = self.trusted_wallet(&mint_url).await?;
                Ok(ReceiveResult::Lightning(
                    wallet.receive_lightning(amount).await?,
                ))
            }
        }
    }

    /// Swap fee of moving `token` into the wallet of `mint_url`
    pub async fn get_swap_fee(&self, token: &str, mint_url: &MintUrl) -> Result<Amount, Error> {
        let token = Token::from_str(token)?;
        let wallet = self.trusted_wallet(mint_url).await?;
        let untrusted = (self.connector_factory)(&token.mint_url()?)?;

        wallet.get_swap_fee_via(&token, untrusted).await
    }

    /// Destroy every wallet
    pub async fn destroy(&self) {
        for wallet in self.get_wallets().await {
            wallet.destroy().await;
        }
    }

    async fn receive_and_trust(&self, token: &str) -> Result<ReceiveResult, Error> {
        let decoded = Token::from_str(token)?;
        let wallet = self.add_mint(decoded.mint_url()?).await?;

        Ok(ReceiveResult::Ecash(wallet.receive_ecash(token).await?))
    }

    async fn receive_and_swap(&self, token: &str, mint_url: &MintUrl) -> Result<ReceiveResult, Error> {
        let decoded = Token::from_str(token)?;
        let token_mint = decoded.mint_url()?;

        if self.is_trusted_mint(&token_mint).await {
            return self.receive_and_trust(token).await;
        }

        let wallet = self.trusted_wallet(mint_url).await?;
        let untrusted = (self.connector_factory)(&token_mint)?;

        Ok(ReceiveResult::Swap(wallet.swap_via(&decoded, untrusted).await?))
    }

    async fn trusted_wallet(&self, mint_url: &MintUrl) -> Result<Wallet, Error> {
        self.get_wallet(mint_url)
            .await
            .ok_or(Error::UnknownWallet(mint_url.to_string()))
    }

    fn publish_mints(&self, wallets: &BTreeMap<MintUrl, Wallet>) {
        self.mints.send_replace(wallets.keys().cloned().collect());
    }
}
