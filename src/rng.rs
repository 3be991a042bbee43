//! Seedable random number generator for deterministic testing.
//!
//! When a seed is provided via [`Config::rng_seed`][crate::Config::rng_seed], every random
//! value the engine draws (hello randoms, ephemeral keys, cookie and ticket secrets, retransmit
//! jitter) is deterministic. Without a seed the operating system generator is used.

use rand::distributions::{Distribution, Standard};
use rand::rngs::{OsRng, StdRng};
use rand::{CryptoRng, Rng, RngCore, SeedableRng};

/// A random number generator that can be seeded for deterministic behavior.
pub struct SeededRng {
    inner: Option<StdRng>,
}

impl SeededRng {
    /// Create a new RNG with an optional seed.
    ///
    /// If `seed` is `Some`, the RNG will produce deterministic values.
    /// If `seed` is `None`, it draws from the operating system.
    pub fn new(seed: Option<u64>) -> Self {
        let inner = seed.map(StdRng::seed_from_u64);
        Self { inner }
    }

    /// Generate a random value of type T.
    pub fn random<T>(&mut self) -> T
    where
        Standard: Distribution<T>,
    {
        match self.inner.as_mut() {
            Some(rng) => rng.gen(),
            None => OsRng.gen(),
        }
    }

    /// Fill `dest` with random bytes.
    pub fn fill(&mut self, dest: &mut [u8]) {
        self.fill_bytes(dest)
    }
}

impl RngCore for SeededRng {
    fn next_u32(&mut self) -> u32 {
        match self.inner.as_mut() {
            Some(rng) => rng.next_u32(),
            None => OsRng.next_u32(),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match self.inner.as_mut() {
            Some(rng) => rng.next_u64(),
            None => OsRng.next_u64(),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match self.inner.as_mut() {
            Some(rng) => rng.fill_bytes(dest),
            None => OsRng.fill_bytes(dest),
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        match self.inner.as_mut() {
            Some(rng) => rng.try_fill_bytes(dest),
            None => OsRng.try_fill_bytes(dest),
        }
    }
}

// StdRng is a CSPRNG; seeding only makes it reproducible.
impl CryptoRng for SeededRng {}

impl std::fmt::Debug for SeededRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let is_seeded = self.inner.is_some();
        f.debug_struct("SeededRng")
            .field("seeded", &is_seeded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_rng_is_deterministic() {
        let mut rng1 = SeededRng::new(Some(12345));
        let mut rng2 = SeededRng::new(Some(12345));

        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        rng1.fill(&mut a);
        rng2.fill(&mut b);
        assert_eq!(a, b, "Same seed should produce same bytes");

        let x: u64 = rng1.random();
        let y: u64 = rng2.random();
        assert_eq!(x, y);
    }

    #[test]
    fn different_seeds_produce_different_values() {
        let mut rng1 = SeededRng::new(Some(12345));
        let mut rng2 = SeededRng::new(Some(54321));

        let value1: u64 = rng1.random();
        let value2: u64 = rng2.random();

        assert_ne!(
            value1, value2,
            "Different seeds should produce different values"
        );
    }

    #[test]
    fn unseeded_fills() {
        let mut rng = SeededRng::new(None);
        let mut a = [0u8; 32];
        rng.fill(&mut a);
        assert_ne!(a, [0u8; 32]);
    }
}
