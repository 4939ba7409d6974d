use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use directories::ProjectDirs;

const WALLET_DIRECTORY: &str = "wallet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    /// Use `root_dir` if given, else the platform's per-user data
    /// directory.
    pub fn get(root_dir: Option<PathBuf>) -> Result<Self> {
        let root = match root_dir {
            Some(root) => root,
            None => ProjectDirs::from("org", "wots-vault", "wots-vault")
                .context("Could not determine data directory")?
                .data_dir()
                .to_path_buf(),
        };
        Ok(Self { root })
    }

    pub async fn create_dir_if_not_exists(dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", dir.to_string_lossy()))
    }

    pub fn root_dir_path(&self) -> PathBuf {
        self.root.clone()
    }

    /// Where the wallet's key-value store lives.
    pub fn wallet_directory_path(&self) -> PathBuf {
        self.root.join(WALLET_DIRECTORY)
    }
}

impl fmt::Display for DataDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_wins() {
        let data_dir = DataDirectory::get(Some(PathBuf::from("/tmp/vault"))).unwrap();
        assert_eq!(PathBuf::from("/tmp/vault"), data_dir.root_dir_path());
        assert_eq!(PathBuf::from("/tmp/vault/wallet"), data_dir.wallet_directory_path());
    }

    #[tokio::test]
    async fn creates_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        DataDirectory::create_dir_if_not_exists(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
