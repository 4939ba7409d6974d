use std::fmt;

use rand::Rng;
use serde::de::Error as _;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use zeroize::Zeroize;
use zeroize::ZeroizeOnDrop;
use zeroize::Zeroizing;

/// A fixed-size secret that is overwritten with zeros when dropped.
///
/// Master seeds, account seeds, WOTS secrets and storage keys all live in
/// this type so that no error path can forget to wipe them. `Debug` never
/// prints the contents.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBytes<const N: usize>([u8; N]);

impl<const N: usize> SecretBytes<N> {
    pub fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// Fresh secret from the operating system's RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; N];
        rand::rng().fill(&mut bytes[..]);
        Self(bytes)
    }

    /// Copy from a slice, or `None` if the length is not exactly `N`.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; N] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    pub fn from_hex(hex_str: &str) -> Option<Self> {
        let decoded = Zeroizing::new(hex::decode(hex_str).ok()?);
        Self::from_slice(&decoded)
    }

    pub fn expose(&self) -> &[u8; N] {
        &self.0
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0))
    }
}

impl<const N: usize> Zeroize for SecretBytes<N> {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl<const N: usize> Drop for SecretBytes<N> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl<const N: usize> ZeroizeOnDrop for SecretBytes<N> {}

impl<const N: usize> fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{}>(..)", N)
    }
}

impl<const N: usize> Serialize for SecretBytes<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de, const N: usize> Deserialize<'de> for SecretBytes<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = Zeroizing::new(String::deserialize(deserializer)?);
        Self::from_hex(&hex_str)
            .ok_or_else(|| D::Error::custom(format!("expected {} hex-encoded bytes", N)))
    }
}
