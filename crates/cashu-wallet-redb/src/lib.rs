//! Redb storage backend for cashu wallets
//!
//! One database file holds the snapshots of every mint wallet, keyed by mint url.

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::cmp::Ordering;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use cashu_wallet_common::{database, MintUrl, WalletState, WalletStorage};
use redb::{Database, ReadableTable, TableDefinition};
use tracing::instrument;

pub mod error;

use crate::error::Error;

// <Mint_url, WalletState>
const STATES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("wallet_states");
const CONFIG_TABLE: TableDefinition<&str, &str> = TableDefinition::new("config");

const DATABASE_VERSION: u32 = 1;

/// Redb database shared by the wallets of many mints
#[derive(Debug, Clone)]
pub struct RedbDatabase {
    db: Arc<Database>,
}

impl RedbDatabase {
    /// Open or create the database at `path`
    pub fn new(path: &Path) -> Result<Self, Error> {
        // Check if parent directory exists before attempting to create database
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Parent directory does not exist: {parent:?}"),
                )));
            }
        }

        let db = Arc::new(Database::create(path)?);

        let db_version: Option<String>;
        {
            // Check database version
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(CONFIG_TABLE);

            db_version = match table {
                Ok(table) => table.get("db_version")?.map(|v| v.value().to_string()),
                Err(_) => None,
            };
        }

        match db_version {
            Some(db_version) => {
                let current_file_version = u32::from_str(&db_version)?;

                match current_file_version.cmp(&DATABASE_VERSION) {
                    Ordering::Equal => {
                        tracing::info!("Database is at current version {}", DATABASE_VERSION);
                    }
                    Ordering::Less | Ordering::Greater => {
                        tracing::warn!(
                            "Database at version {} cannot be used, current is {}",
                            current_file_version,
                            DATABASE_VERSION
                        );
                        return Err(Error::UnknownDatabaseVersion);
                    }
                }
            }
            None => {
                let write_txn = db.begin_write()?;
                {
                    let mut table = write_txn.open_table(CONFIG_TABLE)?;
                    // Open all tables to init a new db
                    let _ = write_txn.open_table(STATES_TABLE)?;
                    table.insert("db_version", DATABASE_VERSION.to_string().as_str())?;
                }

                write_txn.commit()?;
            }
        }

        Ok(Self { db })
    }

    /// Storage for the wallet of `mint_url`
    pub fn storage(&self, mint_url: MintUrl) -> RedbStorage {
        RedbStorage {
            db: Arc::clone(&self.db),
            mint_url,
        }
    }

    /// Mints that have a stored snapshot
    pub fn mints(&self) -> Result<Vec<MintUrl>, Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STATES_TABLE)?;

        let mut mints = Vec::new();
        for entry in table.iter()? {
            let (mint_url, _) = entry?;
            match MintUrl::from_str(mint_url.value()) {
                Ok(mint_url) => mints.push(mint_url),
                Err(err) => tracing::warn!("Skipping stored state of invalid mint: {}", err),
            }
        }

        Ok(mints)
    }
}

/// Wallet storage for one mint inside a [`RedbDatabase`]
#[derive(Debug, Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
    mint_url: MintUrl,
}

impl RedbStorage {
    /// Open or create the database at `path` and bind it to `mint_url`
    pub fn new(path: &Path, mint_url: MintUrl) -> Result<Self, Error> {
        Ok(RedbDatabase::new(path)?.storage(mint_url))
    }

    /// Mint the storage is bound to
    pub fn mint_url(&self) -> &MintUrl {
        &self.mint_url
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl WalletStorage for RedbStorage {
    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn get(&self) -> Result<Option<WalletState>, database::Error> {
        let read_txn = self.db.begin_read().map_err(Error::from)?;
        let table = read_txn.open_table(STATES_TABLE).map_err(Error::from)?;

        if let Some(state) = table
            .get(self.mint_url.as_str())
            .map_err(Error::from)?
        {
            return Ok(Some(
                serde_json::from_str(state.value()).map_err(Error::from)?,
            ));
        }

        Ok(None)
    }

    #[instrument(skip_all, fields(mint_url = %self.mint_url))]
    async fn set(&self, state: &WalletState) -> Result<(), database::Error> {
        let json = serde_json::to_string(state).map_err(Error::from)?;

        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn.open_table(STATES_TABLE).map_err(Error::from)?;
            table
                .insert(self.mint_url.as_str(), json.as_str())
                .map_err(Error::from)?;
        }
        write_txn.commit().map_err(Error::from)?;

        Ok(())
    }
}
