//! Decoder for MCM archives, the legacy wallet interchange format.
//!
//! Archives are produced by other software and only ever read here. Layout:
//!
//! ```text
//! integrity hash (32)
//! BE32 length ‖ public header JSON      { pbkdf2_salt, pbkdf2_iterations, version }
//! IV (16) ‖ BE32 length ‖ ciphertext    private header JSON { name, deterministic_seed }
//! ( IV (16) ‖ BE32 length ‖ ciphertext )*  DEFLATE'd entry JSON { address, secret, name }
//! ```
//!
//! Records are AES-128-CBC under a PBKDF2-HMAC-SHA1 key derived from the
//! password and the public header's salt and iteration count. Byte arrays
//! are Java-style strings such as `"[1, -2, 3]"`. Decrypted JSON is not
//! length-delimited: it is cut at the first `}` and trailing bytes are
//! ignored.

mod java_bytes;
mod reader;

use std::fmt;

use serde::de::Error as _;
use serde::Deserialize;
use serde::Deserializer;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

pub use reader::McmReader;

use super::derivation::WotsKeypair;
use super::secret_bytes::SecretBytes;
use super::wots::AccountTag;
use super::wots::WotsAddress;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum McmError {
    /// The archive's structure is broken before anything was decrypted.
    #[error("malformed archive: {0}")]
    Malformed(String),

    /// The private header did not decrypt.
    #[error("invalid password")]
    InvalidPassword,

    #[error("cannot decode entry {index}: {cause}")]
    Entry { index: usize, cause: String },

    #[error("decoder task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublicHeader {
    #[serde(deserialize_with = "java_bytes::deserialize")]
    pub pbkdf2_salt: Vec<u8>,
    #[serde(deserialize_with = "lenient_u32")]
    pub pbkdf2_iterations: u32,
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: String,
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| D::Error::custom(format!("{number} is not a valid count"))),
        Value::String(text) => text.trim().parse().map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("expected a number, found {other}"))),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// The wallet label, and the seed the archive's entries were generated
/// from when the exporting software recorded it.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateHeader {
    pub name: String,
    pub deterministic_seed: Option<Zeroizing<Vec<u8>>>,
}

impl PrivateHeader {
    fn from_json(object: &Value) -> Result<Self, String> {
        if !object.is_object() {
            return Err("private header is not an object".to_string());
        }
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let deterministic_seed = object
            .get("deterministic_seed")
            .filter(|seed| !seed.is_null())
            .map(java_bytes::from_value)
            .transpose()?
            .map(Zeroizing::new);
        Ok(Self {
            name,
            deterministic_seed,
        })
    }
}

impl fmt::Debug for PrivateHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateHeader")
            .field("name", &self.name)
            .field("has_deterministic_seed", &self.deterministic_seed.is_some())
            .finish()
    }
}

/// One imported keypair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WotsEntry {
    pub name: String,
    pub address: WotsAddress,
    pub secret: SecretBytes<32>,
}

impl WotsEntry {
    pub fn tag(&self) -> AccountTag {
        self.address.tag()
    }

    pub fn address_hex(&self) -> String {
        self.address.to_hex()
    }

    pub fn secret_hex(&self) -> Zeroizing<String> {
        self.secret.to_hex()
    }

    pub fn into_keypair(self) -> WotsKeypair {
        WotsKeypair {
            secret: self.secret,
            address: self.address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McmArchive {
    pub integrity_hash: [u8; 32],
    pub public_header: PublicHeader,
    pub private_header: PrivateHeader,
    pub entries: Vec<WotsEntry>,
}

/// Decode a whole archive.
pub fn decode(bytes: &[u8], password: &str) -> Result<McmArchive, McmError> {
    let mut reader = McmReader::open(bytes, password)?;
    let entries = reader.by_ref().collect::<Result<Vec<_>, _>>()?;
    Ok(reader.into_archive(entries))
}

/// Result of [`decode_cancellable`].
#[derive(Debug)]
pub struct PartialDecode {
    pub archive: McmArchive,
    /// `false` if cancellation stopped the decoder before the last entry.
    pub completed: bool,
}

/// Decode on the blocking pool, checking `cancel` between entries.
///
/// Entries decoded before cancellation are returned; each one is
/// independent of the rest.
pub async fn decode_cancellable(
    bytes: Vec<u8>,
    password: Zeroizing<String>,
    cancel: CancellationToken,
) -> Result<PartialDecode, McmError> {
    tokio::task::spawn_blocking(move || {
        let mut reader = McmReader::open(&bytes, &password)?;
        let mut entries = Vec::new();
        while !cancel.is_cancelled() {
            match reader.next() {
                Some(entry) => entries.push(entry?),
                None => break,
            }
        }
        let completed = reader.is_finished();
        if !completed {
            tracing::info!("MCM decode cancelled after {} entries", entries.len());
        }
        Ok(PartialDecode {
            archive: reader.into_archive(entries),
            completed,
        })
    })
    .await
    .map_err(|e| McmError::Task(e.to_string()))?
}
