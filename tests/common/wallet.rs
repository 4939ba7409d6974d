use std::path::Path;

use wots_vault::application::storage::FileStore;
use wots_vault::application::storage::MemoryStore;
use wots_vault::state::wallet::encryption::KdfProfile;
use wots_vault::state::wallet::secret_bytes::SecretBytes;
use wots_vault::state::wallet::wallet_configuration::WalletConfiguration;
use wots_vault::HdWallet;
use wots_vault::MasterSeed;

pub const PASSWORD: &str = "correct horse battery";

pub const KANDOKANDO_MCM: &[u8] = include_bytes!("../fixtures/kandokando.mcm");
pub const KANDOKANDO_PASSWORD: &str = "kandokando";

pub const ABANDON_PHRASE: &str = "abandon abandon abandon abandon abandon abandon \
                                  abandon abandon abandon abandon abandon about";

pub fn fixed_seed() -> MasterSeed {
    MasterSeed::from_secret(SecretBytes::new([0x42; 32]))
}

pub fn configuration() -> WalletConfiguration {
    WalletConfiguration::new().with_kdf_profile(KdfProfile::Testing)
}

pub async fn unlocked_memory_wallet() -> anyhow::Result<(HdWallet<MemoryStore>, MemoryStore)> {
    let store = MemoryStore::new();
    let mut wallet = HdWallet::new(store.clone(), configuration());
    wallet.initialize(fixed_seed(), PASSWORD).await?;
    Ok((wallet, store))
}

pub async fn file_wallet(directory: &Path) -> anyhow::Result<HdWallet<FileStore>> {
    Ok(HdWallet::new(FileStore::open(directory).await?, configuration()))
}
