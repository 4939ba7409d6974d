//! WOTS+ one-time signatures and the ledger's address format.
//!
//! Parameters are fixed by the ledger: `n = 32`, `w = 16`, giving 64
//! message digits plus 3 checksum digits. A full address is
//! `public_key(2144) ‖ pub_seed(32) ‖ rnd2(32)`, and the last 12 bytes of
//! `rnd2` double as the address tag that the ledger resolves.

pub mod transaction;

use std::fmt;
use std::str::FromStr;

use ripemd::Ripemd160;
use serde::de::Error as _;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use sha2::Digest;
use sha2::Sha256;
use sha3::Sha3_512;
use zeroize::Zeroizing;

use super::secret_bytes::SecretBytes;

pub const PARAMS_N: usize = 32;
pub const WOTS_W: u32 = 16;
const LOG_W: u32 = 4;
pub const WOTS_LEN1: usize = 64;
pub const WOTS_LEN2: usize = 3;
pub const WOTS_LEN: usize = WOTS_LEN1 + WOTS_LEN2;

pub const WOTS_PK_LEN: usize = WOTS_LEN * PARAMS_N;
pub const WOTS_SIG_LEN: usize = WOTS_LEN * PARAMS_N;
pub const WOTS_ADDRESS_LEN: usize = WOTS_PK_LEN + 2 * PARAMS_N;
pub const TAG_LEN: usize = 12;

const PUB_SEED_OFFSET: usize = WOTS_PK_LEN;
const RND2_OFFSET: usize = PUB_SEED_OFFSET + PARAMS_N;
const TAG_OFFSET: usize = WOTS_ADDRESS_LEN - TAG_LEN;

// domain separators, encoded as 32-byte big-endian integers
const DOMAIN_F: u8 = 0;
const DOMAIN_PRF: u8 = 3;

type Hash = [u8; PARAMS_N];

fn to_byte(value: u8) -> [u8; PARAMS_N] {
    let mut out = [0u8; PARAMS_N];
    out[PARAMS_N - 1] = value;
    out
}

fn prf(input: &[u8; 32], key: &[u8; 32]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(to_byte(DOMAIN_PRF));
    hasher.update(key);
    hasher.update(input);
    hasher.finalize().into()
}

/// The eight-word hash address that domain-separates every chain step.
///
/// Words are read little-endian from `rnd2` and serialised big-endian.
#[derive(Clone, Copy)]
struct HashAddress([u32; 8]);

impl HashAddress {
    fn from_rnd2(rnd2: &[u8; 32]) -> Self {
        let mut words = [0u32; 8];
        for (word, chunk) in words.iter_mut().zip(rnd2.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self(words)
    }

    fn set_chain(&mut self, chain: u32) {
        self.0[5] = chain;
    }

    fn set_hash(&mut self, hash: u32) {
        self.0[6] = hash;
    }

    fn set_key_and_mask(&mut self, key_and_mask: u32) {
        self.0[7] = key_and_mask;
    }

    fn to_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.0) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        out
    }
}

fn thash_f(input: &Hash, pub_seed: &[u8; 32], address: &mut HashAddress) -> Hash {
    address.set_key_and_mask(0);
    let key = prf(&address.to_bytes(), pub_seed);
    address.set_key_and_mask(1);
    let mask = prf(&address.to_bytes(), pub_seed);

    let mut masked = [0u8; PARAMS_N];
    for ((out, byte), mask_byte) in masked.iter_mut().zip(input).zip(mask) {
        *out = byte ^ mask_byte;
    }

    let mut hasher = Sha256::new();
    hasher.update(to_byte(DOMAIN_F));
    hasher.update(key);
    hasher.update(masked);
    hasher.finalize().into()
}

fn gen_chain(
    input: &Hash,
    start: u32,
    steps: u32,
    pub_seed: &[u8; 32],
    address: &mut HashAddress,
) -> Hash {
    let mut out = *input;
    for position in start..(start + steps).min(WOTS_W) {
        address.set_hash(position);
        out = thash_f(&out, pub_seed, address);
    }
    out
}

/// Chain starting points, one per digit.
fn expand_seed(seed: &[u8; 32]) -> Zeroizing<Vec<Hash>> {
    Zeroizing::new(
        (0..WOTS_LEN)
            .map(|i| {
                let mut index = [0u8; 32];
                index[28..].copy_from_slice(&(i as u32).to_be_bytes());
                prf(&index, seed)
            })
            .collect(),
    )
}

fn base_w(input: &[u8], out_len: usize) -> Vec<u32> {
    let mut out = Vec::with_capacity(out_len);
    let mut bytes = input.iter();
    let mut total = 0u32;
    let mut bits = 0u32;
    for _ in 0..out_len {
        if bits == 0 {
            total = bytes.next().copied().map(u32::from).unwrap_or(0);
            bits += 8;
        }
        bits -= LOG_W;
        out.push((total >> bits) & (WOTS_W - 1));
    }
    out
}

/// Message digits followed by checksum digits.
fn chain_lengths(message: &[u8; 32]) -> Vec<u32> {
    let mut lengths = base_w(message, WOTS_LEN1);
    let checksum: u32 = lengths.iter().map(|digit| WOTS_W - 1 - digit).sum();
    let checksum = (checksum << 4) as u16;
    lengths.extend(base_w(&checksum.to_be_bytes(), WOTS_LEN2));
    lengths
}

/// Public key for a secret seed.
pub fn public_key_gen(secret: &[u8; 32], pub_seed: &[u8; 32], rnd2: &[u8; 32]) -> Vec<u8> {
    let mut address = HashAddress::from_rnd2(rnd2);
    let chain_starts = expand_seed(secret);
    let mut public_key = Vec::with_capacity(WOTS_PK_LEN);
    for (i, start) in chain_starts.iter().enumerate() {
        address.set_chain(i as u32);
        public_key.extend(gen_chain(start, 0, WOTS_W - 1, pub_seed, &mut address));
    }
    public_key
}

/// Sign a 32-byte message digest.
pub fn sign(message: &[u8; 32], secret: &[u8; 32], pub_seed: &[u8; 32], rnd2: &[u8; 32]) -> Vec<u8> {
    let mut address = HashAddress::from_rnd2(rnd2);
    let chain_starts = expand_seed(secret);
    let mut signature = Vec::with_capacity(WOTS_SIG_LEN);
    for (i, (start, length)) in chain_starts.iter().zip(chain_lengths(message)).enumerate() {
        address.set_chain(i as u32);
        signature.extend(gen_chain(start, 0, length, pub_seed, &mut address));
    }
    signature
}

/// Recompute the public key a signature commits to.
///
/// Returns `None` if the signature does not have the expected length.
pub fn public_key_from_signature(
    signature: &[u8],
    message: &[u8; 32],
    pub_seed: &[u8; 32],
    rnd2: &[u8; 32],
) -> Option<Vec<u8>> {
    if signature.len() != WOTS_SIG_LEN {
        return None;
    }
    let mut address = HashAddress::from_rnd2(rnd2);
    let mut public_key = Vec::with_capacity(WOTS_PK_LEN);
    for (i, (chunk, length)) in signature
        .chunks_exact(PARAMS_N)
        .zip(chain_lengths(message))
        .enumerate()
    {
        address.set_chain(i as u32);
        let mut element = [0u8; PARAMS_N];
        element.copy_from_slice(chunk);
        public_key.extend(gen_chain(
            &element,
            length,
            WOTS_W - 1 - length,
            pub_seed,
            &mut address,
        ));
    }
    Some(public_key)
}

/// Build a full address for `secret`.
///
/// `pub_seed` and then `rnd2` are drawn from `fill`. When `tag` is given it
/// overwrites the last twelve bytes of `rnd2` before the public key is
/// computed, so the tag is bound into every hash address.
pub fn generate_random_address(
    tag: Option<&AccountTag>,
    secret: &SecretBytes<32>,
    mut fill: impl FnMut(&mut [u8]),
) -> WotsAddress {
    let mut pub_seed = [0u8; 32];
    let mut rnd2 = [0u8; 32];
    fill(&mut pub_seed);
    fill(&mut rnd2);
    if let Some(tag) = tag {
        rnd2[32 - TAG_LEN..].copy_from_slice(tag.as_bytes());
    }

    let mut bytes = public_key_gen(secret.expose(), &pub_seed, &rnd2);
    bytes.extend_from_slice(&pub_seed);
    bytes.extend_from_slice(&rnd2);
    WotsAddress(bytes.into_boxed_slice())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} bytes, got {actual}")]
pub struct InvalidLength {
    pub expected: usize,
    pub actual: usize,
}

/// A 2208-byte WOTS+ address.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WotsAddress(Box<[u8]>);

impl WotsAddress {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidLength> {
        if bytes.len() != WOTS_ADDRESS_LEN {
            return Err(InvalidLength {
                expected: WOTS_ADDRESS_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn public_key(&self) -> &[u8] {
        &self.0[..WOTS_PK_LEN]
    }

    pub fn pub_seed(&self) -> &[u8; 32] {
        self.0[PUB_SEED_OFFSET..RND2_OFFSET]
            .try_into()
            .expect("address length is checked on construction")
    }

    pub fn rnd2(&self) -> &[u8; 32] {
        self.0[RND2_OFFSET..]
            .try_into()
            .expect("address length is checked on construction")
    }

    pub fn tag(&self) -> AccountTag {
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&self.0[TAG_OFFSET..]);
        AccountTag(tag)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for WotsAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WotsAddress")
            .field("tag", &self.tag())
            .finish_non_exhaustive()
    }
}

impl FromStr for WotsAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_bytes(&hex::decode(s)?)?)
    }
}

impl Serialize for WotsAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for WotsAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

/// Twelve-byte account identifier, carried in the tail of every address
/// the account issues.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountTag([u8; TAG_LEN]);

impl AccountTag {
    pub fn new(bytes: [u8; TAG_LEN]) -> Self {
        Self(bytes)
    }

    /// First twelve bytes of `RIPEMD160(SHA3-512(address))`.
    pub fn from_address_digest(address: &WotsAddress) -> Self {
        let wide = Sha3_512::digest(address.as_bytes());
        let narrow = Ripemd160::digest(wide);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&narrow[..TAG_LEN]);
        Self(tag)
    }

    pub fn as_bytes(&self) -> &[u8; TAG_LEN] {
        &self.0
    }
}

impl fmt::Display for AccountTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountTag({})", self)
    }
}

impl FromStr for AccountTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let tag: [u8; TAG_LEN] = bytes.as_slice().try_into().map_err(|_| InvalidLength {
            expected: TAG_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(tag))
    }
}

impl Serialize for AccountTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}
