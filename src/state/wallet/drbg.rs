//! Deterministic random bit generator built on SHA-512.
//!
//! Every WOTS keypair is a pure function of the DRBG's seed material, so
//! the exact update rules below are part of the wallet's on-chain identity:
//! changing a single byte of them orphans every address ever derived.

use sha2::Digest;
use sha2::Sha512;
use zeroize::Zeroize;
use zeroize::Zeroizing;

const STATE_LEN: usize = 64;

/// The seed is re-hashed after this many state generations.
const RESEED_INTERVAL: u32 = 10;

/// Digest-based DRBG.
///
/// State and seed start zeroed. `add_seed_material(m)` sets
/// `seed = SHA512(m ‖ seed)`. Each generation step increments the state
/// counter `c` and sets `state = SHA512(BE32(c) ‖ state ‖ seed)`; every
/// tenth step also increments the seed counter `s` and sets
/// `seed = SHA512(seed ‖ BE32(s))`.
///
/// [`next_bytes`](Self::next_bytes) concatenates fresh states and truncates.
/// Unused bytes of the final state are discarded, never carried into the
/// next call.
pub struct DigestDrbg {
    state: [u8; STATE_LEN],
    seed: [u8; STATE_LEN],
    state_counter: u32,
    seed_counter: u32,
}

impl DigestDrbg {
    pub fn new() -> Self {
        Self {
            state: [0u8; STATE_LEN],
            seed: [0u8; STATE_LEN],
            state_counter: 0,
            seed_counter: 0,
        }
    }

    pub fn from_seed_material(material: &[u8]) -> Self {
        let mut drbg = Self::new();
        drbg.add_seed_material(material);
        drbg
    }

    pub fn add_seed_material(&mut self, material: &[u8]) {
        let mut hasher = Sha512::new();
        hasher.update(material);
        hasher.update(self.seed);
        self.seed.copy_from_slice(&hasher.finalize());
    }

    fn generate_state(&mut self) {
        self.state_counter = self.state_counter.wrapping_add(1);

        let mut hasher = Sha512::new();
        hasher.update(self.state_counter.to_be_bytes());
        hasher.update(self.state);
        hasher.update(self.seed);
        self.state.copy_from_slice(&hasher.finalize());

        if self.state_counter % RESEED_INTERVAL == 0 {
            self.seed_counter = self.seed_counter.wrapping_add(1);

            let mut reseed = Sha512::new();
            reseed.update(self.seed);
            reseed.update(self.seed_counter.to_be_bytes());
            self.seed.copy_from_slice(&reseed.finalize());
        }
    }

    /// Fill `out` entirely with fresh output.
    pub fn fill(&mut self, out: &mut [u8]) {
        for chunk in out.chunks_mut(STATE_LEN) {
            self.generate_state();
            chunk.copy_from_slice(&self.state[..chunk.len()]);
        }
    }

    pub fn next_bytes(&mut self, len: usize) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(vec![0u8; len]);
        self.fill(&mut out);
        out
    }
}

impl Default for DigestDrbg {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DigestDrbg {
    fn drop(&mut self) {
        self.state.zeroize();
        self.seed.zeroize();
    }
}
