//! Deterministic WOTS keypairs under an account seed.
//!
//! Every byte of randomness used to build an address comes from a
//! [`DigestDrbg`] seeded by the account seed, never from a system RNG, so a
//! wallet restored from its recovery phrase reproduces every address.

use sha2::digest::Output;
use sha2::Digest;
use sha2::Sha512;
use zeroize::Zeroizing;

use super::drbg::DigestDrbg;
use super::errors::WalletError;
use super::kdf;
use super::secret_bytes::SecretBytes;
use super::wots::generate_random_address;
use super::wots::AccountTag;
use super::wots::WotsAddress;

/// A WOTS secret and the address it signs for.
///
/// The secret may sign exactly once; after that the address must never be
/// reused.
#[derive(Debug, Clone)]
pub struct WotsKeypair {
    pub secret: SecretBytes<32>,
    pub address: WotsAddress,
}

fn keypair_from_drbg(mut drbg: DigestDrbg, tag: Option<&AccountTag>) -> WotsKeypair {
    let mut secret = [0u8; 32];
    drbg.fill(&mut secret);
    let secret = SecretBytes::new(secret);
    let address = generate_random_address(tag, &secret, |buf| drbg.fill(buf));
    WotsKeypair { secret, address }
}

/// DRBG seeded with `SHA512(account_seed ‖ BE32(wots_index))`.
fn seed_from(account_seed: &SecretBytes<32>, wots_index: u32) -> DigestDrbg {
    let mut hasher = Sha512::new();
    hasher.update(account_seed.expose());
    hasher.update(wots_index.to_be_bytes());
    drbg_from_digest(hasher)
}

fn drbg_from_digest(hasher: Sha512) -> DigestDrbg {
    let mut material = Zeroizing::new([0u8; 64]);
    hasher.finalize_into(Output::<Sha512>::from_mut_slice(material.as_mut_slice()));
    DigestDrbg::from_seed_material(material.as_slice())
}

/// Keypair at `wots_index` under `account_seed`.
///
/// Fails with [`WalletError::InvalidIndex`] for negative indices. The
/// canonical first address of an account is not addressed by index; see
/// [`derive_first_keypair`].
pub fn derive_wots_keypair(
    account_seed: &SecretBytes<32>,
    wots_index: i64,
    tag: Option<&AccountTag>,
) -> Result<WotsKeypair, WalletError> {
    let index = u32::try_from(wots_index).map_err(|_| WalletError::InvalidIndex(wots_index))?;
    Ok(keypair_from_drbg(seed_from(account_seed, index), tag))
}

/// The account's canonical first keypair, the one whose address carries
/// the account's public identity before any index has been spent.
///
/// Seeded with `SHA512(account_seed)` alone, without index salting.
pub fn derive_first_keypair(account_seed: &SecretBytes<32>, tag: &AccountTag) -> WotsKeypair {
    let drbg = drbg_from_digest(Sha512::new_with_prefix(account_seed.expose()));
    keypair_from_drbg(drbg, Some(tag))
}

/// Tag of account `account_index`: the digest of its untagged index-0
/// address.
pub fn derive_account_tag(master: &SecretBytes<32>, account_index: u32) -> AccountTag {
    let account_seed = kdf::derive_account_seed(master, account_index);
    let untagged = keypair_from_drbg(seed_from(&account_seed, 0), None);
    AccountTag::from_address_digest(&untagged.address)
}
