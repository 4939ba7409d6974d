use std::fmt;
use std::io::Read;

use flate2::read::DeflateDecoder;
use flate2::read::ZlibDecoder;
use serde_json::Value;
use zeroize::Zeroizing;

use super::java_bytes;
use super::McmArchive;
use super::McmError;
use super::PrivateHeader;
use super::PublicHeader;
use super::WotsEntry;
use crate::state::wallet::encryption::LegacyKey;
use crate::state::wallet::secret_bytes::SecretBytes;
use crate::state::wallet::wots::WotsAddress;

const HASH_LEN: usize = 32;
const IV_LEN: usize = 16;
const AES_BLOCK_LEN: usize = 16;

struct ByteCursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], String> {
        if self.remaining() < len {
            return Err(format!(
                "truncated {what}: need {len} bytes at offset {}, {} left",
                self.position,
                self.remaining()
            ));
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], String> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N, what)?);
        Ok(array)
    }

    fn take_length(&mut self, what: &str) -> Result<usize, String> {
        Ok(u32::from_be_bytes(self.take_array(what)?) as usize)
    }

    /// `IV ‖ BE32 length ‖ ciphertext`, checked for shape only.
    fn take_record(&mut self, what: &str) -> Result<([u8; IV_LEN], &'a [u8]), String> {
        let iv = self.take_array(what)?;
        let len = self.take_length(what)?;
        if len == 0 || len % AES_BLOCK_LEN != 0 {
            return Err(format!("{what} ciphertext length {len} is not a whole number of blocks"));
        }
        Ok((iv, self.take(len, what)?))
    }
}

/// Parse the JSON object at the start of `plaintext`, ignoring everything
/// after the first `}`.
fn parse_leading_object(plaintext: &[u8]) -> Result<Value, String> {
    let end = plaintext
        .iter()
        .position(|&byte| byte == b'}')
        .ok_or("no closing brace")?;
    serde_json::from_slice(&plaintext[..=end]).map_err(|e| format!("invalid JSON: {e}"))
}

/// zlib-wrapped DEFLATE, falling back to raw DEFLATE.
fn inflate(compressed: &[u8]) -> Result<Zeroizing<Vec<u8>>, String> {
    let mut inflated = Zeroizing::new(Vec::new());
    if ZlibDecoder::new(compressed).read_to_end(&mut inflated).is_ok() {
        return Ok(inflated);
    }
    inflated.clear();
    DeflateDecoder::new(compressed)
        .read_to_end(&mut inflated)
        .map_err(|e| format!("inflate failed: {e}"))?;
    Ok(inflated)
}

fn parse_entry(object: &Value) -> Result<WotsEntry, String> {
    let field = |name: &str| {
        object
            .get(name)
            .ok_or_else(|| format!("missing field '{name}'"))
    };

    let address_bytes = java_bytes::from_value(field("address")?)?;
    let address = WotsAddress::from_bytes(&address_bytes).map_err(|e| format!("address: {e}"))?;

    let secret_bytes = Zeroizing::new(java_bytes::from_value(field("secret")?)?);
    let secret = SecretBytes::from_slice(&secret_bytes)
        .ok_or_else(|| format!("secret must be 32 bytes, got {}", secret_bytes.len()))?;

    let name = object
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(WotsEntry {
        name,
        address,
        secret,
    })
}

/// Streaming MCM decoder.
///
/// [`open`](Self::open) reads and decrypts the headers; each call to
/// [`next`](Iterator::next) then decrypts, inflates and parses one entry,
/// so a caller can stop between entries. After the first failed entry the
/// reader yields nothing more.
pub struct McmReader<'a> {
    cursor: ByteCursor<'a>,
    key: LegacyKey,
    integrity_hash: [u8; HASH_LEN],
    public_header: PublicHeader,
    private_header: PrivateHeader,
    next_index: usize,
    failed: bool,
}

impl<'a> McmReader<'a> {
    pub fn open(bytes: &'a [u8], password: &str) -> Result<Self, McmError> {
        let mut cursor = ByteCursor::new(bytes);

        // integrity hash is carried but never verified
        let integrity_hash = cursor
            .take_array("integrity hash")
            .map_err(McmError::Malformed)?;

        let public_header_len = cursor
            .take_length("public header")
            .map_err(McmError::Malformed)?;
        let public_header: PublicHeader = cursor
            .take(public_header_len, "public header")
            .and_then(|json| {
                serde_json::from_slice(json).map_err(|e| format!("public header: {e}"))
            })
            .map_err(McmError::Malformed)?;
        if public_header.pbkdf2_iterations == 0 {
            return Err(McmError::Malformed(
                "public header: zero PBKDF2 iterations".to_string(),
            ));
        }

        let (iv, ciphertext) = cursor
            .take_record("private header")
            .map_err(McmError::Malformed)?;

        let key = LegacyKey::derive(
            password,
            &public_header.pbkdf2_salt,
            public_header.pbkdf2_iterations,
        );

        // from here on a failure most likely means a wrong password
        let plaintext = key
            .decrypt(ciphertext, &iv)
            .map_err(|_| McmError::InvalidPassword)?;
        let private_header = parse_leading_object(&plaintext)
            .and_then(|object| PrivateHeader::from_json(&object))
            .map_err(|_| McmError::InvalidPassword)?;

        tracing::debug!(
            version = %public_header.version,
            iterations = public_header.pbkdf2_iterations,
            "opened MCM archive"
        );

        Ok(Self {
            cursor,
            key,
            integrity_hash,
            public_header,
            private_header,
            next_index: 0,
            failed: false,
        })
    }

    pub fn public_header(&self) -> &PublicHeader {
        &self.public_header
    }

    pub fn private_header(&self) -> &PrivateHeader {
        &self.private_header
    }

    /// Whether every entry has been read.
    pub fn is_finished(&self) -> bool {
        self.failed || self.cursor.remaining() == 0
    }

    fn read_entry(&mut self) -> Result<WotsEntry, String> {
        let (iv, ciphertext) = self.cursor.take_record("entry")?;
        let compressed = self
            .key
            .decrypt(ciphertext, &iv)
            .map_err(|_| "decryption failed".to_string())?;
        let json = inflate(&compressed)?;
        parse_entry(&parse_leading_object(&json)?)
    }

    pub fn into_archive(self, entries: Vec<WotsEntry>) -> McmArchive {
        McmArchive {
            integrity_hash: self.integrity_hash,
            public_header: self.public_header,
            private_header: self.private_header,
            entries,
        }
    }
}

impl fmt::Debug for McmReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McmReader")
            .field("public_header", &self.public_header)
            .field("next_index", &self.next_index)
            .field("remaining", &self.cursor.remaining())
            .finish_non_exhaustive()
    }
}

impl Iterator for McmReader<'_> {
    type Item = Result<WotsEntry, McmError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_finished() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        let entry = self.read_entry().map_err(|cause| {
            self.failed = true;
            McmError::Entry { index, cause }
        });
        if let Ok(entry) = &entry {
            tracing::debug!(index, tag = %entry.tag(), "decoded MCM entry");
        }
        Some(entry)
    }
}
