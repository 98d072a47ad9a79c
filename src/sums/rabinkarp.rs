//! The RabinKarp rolling hash.
//!
//! A 32-bit polynomial hash with better distribution than the legacy
//! rollsum. The seed folds the window length into the hash, so zero blocks
//! of different lengths still differ. Rolling out divides by the multiplier
//! via its inverse modulo 2^32.

/// Seed value; encodes the window length into the hash.
const SEED: u32 = 1;

/// Multiplier: a product of two large primes with an LCG-grade bit pattern.
const MULT: u32 = 0x08104225;

/// Inverse of `MULT` modulo 2^32.
const INV_MULT: u32 = 0x98f009ad;

/// `(MULT - 1) * SEED`, the seed adjustment applied when rolling out.
const ADJ: u32 = 0x08104224;

fn pow32(mut m: u32, mut p: usize) -> u32 {
    let mut ans: u32 = 1;
    while p > 0 {
        if p & 1 != 0 {
            ans = ans.wrapping_mul(m);
        }
        m = m.wrapping_mul(m);
        p >>= 1;
    }
    ans
}

#[derive(Debug, Clone)]
pub struct RabinKarp {
    count: usize,
    hash: u32,
    /// `MULT^count`, maintained incrementally.
    mult: u32,
}

impl Default for RabinKarp {
    fn default() -> Self {
        Self {
            count: 0,
            hash: SEED,
            mult: 1,
        }
    }
}

impl RabinKarp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn update(&mut self, buf: &[u8]) {
        for &b in buf {
            self.hash = self.hash.wrapping_mul(MULT).wrapping_add(u32::from(b));
        }
        self.count += buf.len();
        self.mult = self.mult.wrapping_mul(pow32(MULT, buf.len()));
    }

    pub fn rollin(&mut self, in_: u8) {
        self.hash = self.hash.wrapping_mul(MULT).wrapping_add(u32::from(in_));
        self.count += 1;
        self.mult = self.mult.wrapping_mul(MULT);
    }

    pub fn rollout(&mut self, out: u8) {
        self.count -= 1;
        self.mult = self.mult.wrapping_mul(INV_MULT);
        self.hash = self
            .hash
            .wrapping_sub(self.mult.wrapping_mul(u32::from(out).wrapping_add(ADJ)));
    }

    /// Fused rollout + rollin for a full window slide.
    pub fn rotate(&mut self, out: u8, in_: u8) {
        self.hash = self
            .hash
            .wrapping_mul(MULT)
            .wrapping_add(u32::from(in_))
            .wrapping_sub(self.mult.wrapping_mul(u32::from(out).wrapping_add(ADJ)));
    }

    pub fn digest(&self) -> u32 {
        self.hash
    }
}
