//! Iterated HMAC-SHA256 key derivation and the wallet's named derivations.

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::secret_bytes::SecretBytes;

type HmacSha256 = Hmac<Sha256>;

/// Iteration count used by every named derivation in the wallet tree.
pub const DERIVATION_ITERATIONS: u32 = 1_000;

/// Each round performs two HMACs; the count is rounded up to whole
/// hundreds.
const ITERATIONS_PER_ROUND: u32 = 100;

pub const SCAN_TAG_LEN: usize = 12;
const SCAN_TAG_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

fn hmac_sha256(key: &[u8], message: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(message);
    Zeroizing::new(mac.finalize().into_bytes().to_vec())
}

/// Derive `out_len` bytes from `secret`.
///
/// `input = secret ‖ decimal(index) ‖ salt`. Starting from `key = input`,
/// each of `ceil(iterations / 100)` rounds sets `key = HMAC(key, salt)` then
/// `key = HMAC(key, input)`. The result is truncated, or zero-padded, to
/// `out_len`.
pub fn derive(
    secret: &[u8],
    index: u64,
    salt: &[u8],
    iterations: u32,
    out_len: usize,
) -> Zeroizing<Vec<u8>> {
    let index_digits = index.to_string();
    let mut input = Zeroizing::new(Vec::with_capacity(
        secret.len() + index_digits.len() + salt.len(),
    ));
    input.extend_from_slice(secret);
    input.extend_from_slice(index_digits.as_bytes());
    input.extend_from_slice(salt);

    let rounds = iterations.div_ceil(ITERATIONS_PER_ROUND);
    let mut key = input.clone();
    for _ in 0..rounds {
        key = hmac_sha256(&key, salt);
        key = hmac_sha256(&key, &input);
    }

    key.resize(out_len, 0);
    key
}

fn derive_32(secret: &[u8], index: u64, salt: &str) -> SecretBytes<32> {
    let derived = derive(secret, index, salt.as_bytes(), DERIVATION_ITERATIONS, 32);
    let mut out = [0u8; 32];
    out.copy_from_slice(&derived);
    SecretBytes::new(out)
}

/// Seed of account `account_index`, derived from the master secret.
pub fn derive_account_seed(master: &SecretBytes<32>, account_index: u32) -> SecretBytes<32> {
    derive_32(
        master.expose(),
        account_index.into(),
        &format!("account_{}", account_index),
    )
}

/// Per-index WOTS seed under an account seed.
///
/// Keypair derivation does not go through this seed: it seeds its DRBG
/// with `SHA512(account_seed ‖ BE32(wots_index))` instead. This derivation
/// is kept for callers that need the KDF-based per-index seed.
pub fn derive_wots_seed(account_seed: &SecretBytes<32>, wots_index: u32) -> SecretBytes<32> {
    derive_32(
        account_seed.expose(),
        wots_index.into(),
        &format!("wots_{}", wots_index),
    )
}

/// Key for the at-rest account records.
pub fn derive_storage_key(master: &SecretBytes<32>) -> SecretBytes<32> {
    derive_32(master.expose(), 0, "storage_key")
}

/// Legacy scan tag: twelve characters from a base32 alphabet.
///
/// Only used to locate accounts created by older wallets; current accounts
/// are identified by their [`AccountTag`](super::wots::AccountTag).
pub fn derive_scan_tag(master: &SecretBytes<32>, account_index: u32) -> String {
    let salt = format!("tag_{}", account_index);
    derive(
        master.expose(),
        account_index.into(),
        salt.as_bytes(),
        DERIVATION_ITERATIONS,
        SCAN_TAG_LEN,
    )
    .iter()
    .map(|byte| SCAN_TAG_ALPHABET[usize::from(byte % 32)] as char)
    .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use test_strategy::proptest;

    use super::*;

    fn master() -> SecretBytes<32> {
        SecretBytes::new([0x42; 32])
    }

    #[test]
    fn zero_iterations_pads_raw_input() {
        assert_eq!("6162377800000000", hex::encode(derive(b"ab", 7, b"x", 0, 8)));
    }

    #[test]
    fn account_seeds_match_reference() {
        assert_eq!(
            "f5db3fabf548b3604dc0e91268fef8a57ade7b00d059a0bbc044a90a8388306a",
            hex::encode(derive_account_seed(&master(), 0).expose())
        );
        assert_eq!(
            "48392cb06beb05b571fc9f3fd8cb5220b3413f2480982d77356a66d29921a37a",
            hex::encode(derive_account_seed(&master(), 1).expose())
        );
    }

    #[test]
    fn wots_seed_matches_reference() {
        let mut counting = [0u8; 32];
        for (i, byte) in counting.iter_mut().enumerate() {
            *byte = i as u8;
        }
        assert_eq!(
            "b5d38b53e6ac1080cd9a78fd9dd51036bb8c93fb1a17e966009e71d29bb04e7f",
            hex::encode(derive_wots_seed(&SecretBytes::new(counting), 3).expose())
        );
    }

    #[test]
    fn storage_key_matches_reference() {
        assert_eq!(
            "bb29e956c0f3bc79b033e15c21966452dab731874ab58ed3a104656572ef0b62",
            hex::encode(derive_storage_key(&master()).expose())
        );
    }

    #[test]
    fn scan_tag_matches_reference() {
        assert_eq!("7mbwpk74hcqc", derive_scan_tag(&master(), 0));
    }

    #[test]
    fn iterations_round_up_to_whole_rounds() {
        assert_eq!(derive(b"s", 1, b"t", 1, 32), derive(b"s", 1, b"t", 100, 32));
        assert_ne!(derive(b"s", 1, b"t", 100, 32), derive(b"s", 1, b"t", 101, 32));
    }

    #[proptest(cases = 32)]
    fn output_has_requested_length(
        secret: Vec<u8>,
        index: u64,
        #[strategy(0usize..80)] out_len: usize,
    ) {
        assert_eq!(out_len, derive(&secret, index, b"salt", 100, out_len).len());
    }

    #[proptest(cases = 32)]
    fn distinct_indices_give_distinct_account_seeds(master: [u8; 32], i: u32, j: u32) {
        proptest::prop_assume!(i != j);
        let master = SecretBytes::new(master);
        assert_ne!(derive_account_seed(&master, i), derive_account_seed(&master, j));
    }
}
