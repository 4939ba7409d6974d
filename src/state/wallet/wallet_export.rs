use serde::Deserialize;
use serde::Serialize;

use super::encryption::EncryptedBlob;
use super::errors::WalletError;
use super::wots::AccountTag;

/// Version written by this crate. Imports accept any `1.x`.
pub const EXPORT_VERSION: &str = "1.0";
const SUPPORTED_MAJOR: &str = "1";

/// An account record encrypted under the wallet's storage key.
///
/// The same shape is used at rest and inside exports, so an export is a
/// straight copy of the stored records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedAccount {
    pub tag: AccountTag,
    pub data: EncryptedBlob,
}

/// A complete, password-protected wallet backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletExport {
    pub version: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// The master seed, encrypted under the wallet password.
    pub encrypted: EncryptedBlob,
    pub accounts: Vec<EncryptedAccount>,
}

impl WalletExport {
    pub fn new(encrypted: EncryptedBlob, accounts: Vec<EncryptedAccount>) -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            encrypted,
            accounts,
        }
    }

    pub fn check_version(&self) -> Result<(), WalletError> {
        match self.version.split('.').next() {
            Some(SUPPORTED_MAJOR) if self.version.contains('.') => Ok(()),
            _ => Err(WalletError::UnsupportedVersion(self.version.clone())),
        }
    }

    pub fn to_json(&self) -> Result<String, WalletError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::let_assert;

    use super::*;

    fn export_with_version(version: &str) -> WalletExport {
        WalletExport {
            version: version.to_string(),
            ..WalletExport::new(
                EncryptedBlob {
                    ciphertext: vec![1; 16],
                    iv: [2; 16],
                    salt: vec![3; 16],
                },
                vec![],
            )
        }
    }

    #[test]
    fn accepts_any_minor_of_major_one() {
        for version in ["1.0", "1.1", "1.23.4"] {
            assert!(export_with_version(version).check_version().is_ok(), "{version}");
        }
    }

    #[test]
    fn rejects_other_versions() {
        for version in ["2.0", "0.9", "1", "10.0", ""] {
            let_assert!(
                Err(WalletError::UnsupportedVersion(v)) = export_with_version(version).check_version()
            );
            assert_eq!(version, v);
        }
    }

    #[test]
    fn json_round_trip() {
        let export = export_with_version(EXPORT_VERSION);
        let json = export.to_json().unwrap();
        assert!(json.contains("\"version\": \"1.0\""));
        assert_eq!(export, WalletExport::from_json(&json).unwrap());
    }
}
