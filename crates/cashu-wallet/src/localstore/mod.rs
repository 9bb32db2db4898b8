//! Wallet state storage backends

mod file;
mod memory;

use std::sync::Arc;

use cashu_wallet_common::{Error, MintUrl, WalletStorage};

pub use self::file::FileStorage;
pub use self::memory::MemoryStorage;
use crate::config::{StorageEngine, StorageSettings};

/// Shared storage handle
pub type DynWalletStorage = Arc<dyn WalletStorage + Send + Sync>;

/// Creates the storage for a mint wallet
pub type StorageFactory = Arc<dyn Fn(&MintUrl) -> DynWalletStorage + Send + Sync>;

/// File name a mint's state is stored under inside a work dir
///
/// Every character that is not safe in a file name is replaced, so `https://a.com` and
/// `http://a.com` still map to distinct files.
pub fn state_file_name(mint_url: &MintUrl) -> String {
    let name: String = mint_url
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{name}.json")
}

/// Storage factory for the configured engine
pub fn storage_factory(settings: &StorageSettings) -> Result<StorageFactory, Error> {
    let work_dir = settings.work_dir.clone();

    let factory: StorageFactory = match settings.engine {
        StorageEngine::Memory => Arc::new(|_mint_url: &MintUrl| -> DynWalletStorage {
            Arc::new(MemoryStorage::default())
        }),
        StorageEngine::File => Arc::new(move |mint_url: &MintUrl| -> DynWalletStorage {
            Arc::new(FileStorage::new(work_dir.join(state_file_name(mint_url))))
        }),
        #[cfg(feature = "redb")]
        StorageEngine::Redb => {
            std::fs::create_dir_all(&work_dir).map_err(cashu_wallet_common::database::Error::from)?;
            let db = cashu_wallet_redb::RedbDatabase::new(&work_dir.join("cashu-wallet.redb"))
                .map_err(cashu_wallet_common::database::Error::from)?;
            Arc::new(move |mint_url: &MintUrl| -> DynWalletStorage {
                Arc::new(db.storage(mint_url.clone()))
            })
        }
        #[cfg(not(feature = "redb"))]
        StorageEngine::Redb => {
            return Err(Error::Custom(
                "redb storage requires the `redb` feature".to_string(),
            ))
        }
    };

    Ok(factory)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_state_file_name() {
        let https = MintUrl::from_str("https://mint.example.com:3338").unwrap();
        let http = MintUrl::from_str("http://mint.example.com:3338").unwrap();

        assert_eq!(state_file_name(&https), "https___mint.example.com_3338.json");
        assert_ne!(state_file_name(&https), state_file_name(&http));
    }

    #[tokio::test]
    async fn test_file_factory_separates_mints() {
        let dir = tempfile::tempdir().unwrap();
        let factory = storage_factory(&StorageSettings {
            engine: StorageEngine::File,
            work_dir: dir.path().to_path_buf(),
        })
        .unwrap();

        let a = MintUrl::from_str("https://a.example.com").unwrap();
        let b = MintUrl::from_str("https://b.example.com").unwrap();
        factory(&a).set(&cashu_wallet_common::WalletState::new(a.clone())).await.unwrap();

        assert!(factory(&a).get().await.unwrap().is_some());
        assert!(factory(&b).get().await.unwrap().is_none());
    }
}
