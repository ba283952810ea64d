#![forbid(unsafe_code)]

use awg_core::{AwgError, AwgResult};
use log::debug;
use rand_chacha::ChaCha8Rng;
use rand_core::{OsRng, RngCore, SeedableRng};
use spin::Mutex;
use zeroize::Zeroize;

mod bounded;
pub use bounded::RangeInt;

pub const SEED_LEN: usize = 32;

/// A shared source of keystream randomness.
/// INVARIANT: Must be callable from many packet threads at once.
pub trait RandomSource: Send + Sync {
    fn next_u64(&self) -> u64;

    fn fill_bytes(&self, buf: &mut [u8]);

    fn read_bytes(&self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.fill_bytes(&mut buf);
        buf
    }
}

/// Range draws for any [`RandomSource`], including `dyn` handles.
pub trait RandomSourceExt: RandomSource {
    /// Draws a value in `[min, max]`.
    /// `min == max` returns `min` without touching the keystream.
    /// Callers hold `min <= max`; an inverted pair collapses to `min`.
    fn bounded<T: RangeInt>(&self, min: T, max: T) -> T {
        bounded::draw(self, min, max)
    }
}

impl<R: RandomSource + ?Sized> RandomSourceExt for R {}

/// ChaCha8 keystream seeded once from the OS.
pub struct KeystreamRng {
    inner: Mutex<ChaCha8Rng>,
}

impl KeystreamRng {
    /// Seeds from the operating system. There is no weaker fallback:
    /// a short or failed read aborts construction.
    pub fn from_entropy() -> AwgResult<Self> {
        let mut seed = [0u8; SEED_LEN];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| AwgError::EntropyUnavailable(e.to_string()))?;
        let rng = Self::from_seed(seed);
        seed.zeroize();
        debug!("keystream seeded from OS entropy");
        Ok(rng)
    }

    /// Deterministic instance for tests and replay.
    pub fn from_seed(mut seed: [u8; SEED_LEN]) -> Self {
        let rng = ChaCha8Rng::from_seed(seed);
        seed.zeroize();
        Self { inner: Mutex::new(rng) }
    }
}

impl RandomSource for KeystreamRng {
    fn next_u64(&self) -> u64 {
        self.inner.lock().next_u64()
    }

    fn fill_bytes(&self, buf: &mut [u8]) {
        self.inner.lock().fill_bytes(buf);
    }
}

impl core::fmt::Debug for KeystreamRng {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("KeystreamRng { .. }")
    }
}
