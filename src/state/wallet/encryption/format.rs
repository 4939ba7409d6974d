//! Serialized form of an encrypted secret.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde::Serialize;

use super::cipher::IV_LEN;

/// Ciphertext plus the parameters needed to decrypt it.
///
/// All three fields serialize as standard base64 strings. `salt` is empty
/// for blobs encrypted under a derived key rather than a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "base64_iv")]
    pub iv: [u8; IV_LEN],
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
}

mod base64_bytes {
    use serde::de::Error as _;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    use super::BASE64;
    use super::Engine;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(D::Error::custom)
    }
}

mod base64_iv {
    use serde::de::Error as _;
    use serde::Deserializer;
    use serde::Serializer;

    use super::IV_LEN;

    pub fn serialize<S: Serializer>(iv: &[u8; IV_LEN], serializer: S) -> Result<S::Ok, S::Error> {
        super::base64_bytes::serialize(iv, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; IV_LEN], D::Error> {
        let bytes = super::base64_bytes::deserialize(deserializer)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| D::Error::invalid_length(bytes.len(), &"a 16-byte IV"))
    }
}
