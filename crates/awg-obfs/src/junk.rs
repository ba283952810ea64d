use std::sync::Arc;

use awg_core::AwgResult;
use awg_prng::RandomSource;

/// Strategy that appends `size` bytes of padding to `buf`.
pub trait JunkCreator: Send + Sync {
    fn append_junk(&self, buf: &mut Vec<u8>, size: usize) -> AwgResult<()>;
}

/// Keystream padding. Indistinguishable from ciphertext to an observer.
pub struct RandomJunk {
    rng: Arc<dyn RandomSource>,
}

impl RandomJunk {
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self { rng }
    }
}

impl JunkCreator for RandomJunk {
    fn append_junk(&self, buf: &mut Vec<u8>, size: usize) -> AwgResult<()> {
        let start = buf.len();
        buf.resize(start + size, 0);
        self.rng.fill_bytes(&mut buf[start..]);
        Ok(())
    }
}
