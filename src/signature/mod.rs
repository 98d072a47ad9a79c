//! Block signatures: the compact summary of a basis that delta matches
//! against.
//!
//! A signature is a plain value: the magic (selecting the weak and strong
//! algorithms), the block length, the strong-sum truncation length, and the
//! ordered array of per-block sums. The derived lookup structures are built
//! on demand by [`Signature::build_hash_table`] and required before any
//! matching.

mod index;

use crate::error::{JobError, Result};
use crate::stats::JobStats;
use crate::sums::{calc_strong_sum, mix32, StrongsumKind, WeaksumKind};
use index::HashIndex;

/// Magic at the head of every delta stream.
pub const DELTA_MAGIC: u32 = 0x7273_0236;

/// Widest strong sum we store (BLAKE2b).
pub const MAX_STRONG_LEN: usize = 32;

/// Default basis block length in bytes.
pub const DEFAULT_BLOCK_LEN: usize = 2048;

/// Signature header magics. Each value picks a (weak, strong) algorithm
/// pair; the choice is fixed for the life of the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SigMagic {
    /// MD4 strong sums, legacy rollsum weak sums.
    Md4 = 0x7273_0136,
    /// BLAKE2b strong sums, legacy rollsum weak sums.
    Blake2 = 0x7273_0137,
    /// MD4 strong sums, RabinKarp weak sums.
    RkMd4 = 0x7273_0146,
    /// BLAKE2b strong sums, RabinKarp weak sums.
    RkBlake2 = 0x7273_0147,
}

impl Default for SigMagic {
    fn default() -> Self {
        SigMagic::Blake2
    }
}

impl SigMagic {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0x7273_0136 => Some(SigMagic::Md4),
            0x7273_0137 => Some(SigMagic::Blake2),
            0x7273_0146 => Some(SigMagic::RkMd4),
            0x7273_0147 => Some(SigMagic::RkBlake2),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn weaksum_kind(self) -> WeaksumKind {
        match self {
            SigMagic::Md4 | SigMagic::Blake2 => WeaksumKind::Rollsum,
            SigMagic::RkMd4 | SigMagic::RkBlake2 => WeaksumKind::RabinKarp,
        }
    }

    pub fn strongsum_kind(self) -> StrongsumKind {
        match self {
            SigMagic::Md4 | SigMagic::RkMd4 => StrongsumKind::Md4,
            SigMagic::Blake2 | SigMagic::RkBlake2 => StrongsumKind::Blake2,
        }
    }

    /// Widest strong sum this magic can carry.
    pub fn max_strong_len(self) -> usize {
        self.strongsum_kind().sum_len()
    }
}

/// One signed basis block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSig {
    /// 1-based position of the block in the basis.
    pub index: u32,
    /// Raw weak sum, exactly as carried on the wire.
    pub weak: u32,
    /// Strong sum, meaningful up to the signature's strong-sum length.
    pub strong: [u8; MAX_STRONG_LEN],
}

/// Signature of a whole basis.
pub struct Signature {
    magic: SigMagic,
    block_len: usize,
    strong_len: usize,
    blocks: Vec<BlockSig>,
    index: Option<HashIndex>,
}

impl Signature {
    /// Create an empty signature.
    ///
    /// `strong_len == 0` selects the full width of the magic's strong hash.
    /// A zero block length or an over-long strong sum is a parameter error.
    pub fn new(magic: SigMagic, block_len: usize, strong_len: usize) -> Result<Self> {
        Self::with_capacity(magic, block_len, strong_len, 0)
    }

    pub(crate) fn with_capacity(
        magic: SigMagic,
        block_len: usize,
        strong_len: usize,
        blocks_hint: usize,
    ) -> Result<Self> {
        if block_len < 1 {
            return Err(JobError::Param("block length must be at least 1"));
        }
        let strong_len = if strong_len == 0 {
            magic.max_strong_len()
        } else {
            strong_len
        };
        if strong_len > magic.max_strong_len() {
            return Err(JobError::Param("strong sum length exceeds hash width"));
        }
        let mut blocks = Vec::new();
        if blocks_hint > 0 {
            blocks
                .try_reserve(blocks_hint)
                .map_err(|_| JobError::Mem("signature block array"))?;
        }
        Ok(Self {
            magic,
            block_len,
            strong_len,
            blocks,
            index: None,
        })
    }

    pub fn magic(&self) -> SigMagic {
        self.magic
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    pub fn strong_sum_len(&self) -> usize {
        self.strong_len
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block sums in basis order.
    pub fn blocks(&self) -> &[BlockSig] {
        &self.blocks
    }

    /// Append the sums of the next basis block.
    ///
    /// Blocks are never reordered; their 1-based position is their identity.
    pub(crate) fn add_block(&mut self, weak: u32, strong: &[u8; MAX_STRONG_LEN]) -> Result<()> {
        if self.blocks.len() == self.blocks.capacity() {
            self.blocks
                .try_reserve(16.max(self.blocks.len()))
                .map_err(|_| JobError::Mem("signature block array"))?;
        }
        let index = self.blocks.len() as u32 + 1;
        let mut stored = [0u8; MAX_STRONG_LEN];
        stored[..self.strong_len].copy_from_slice(&strong[..self.strong_len]);
        self.blocks.push(BlockSig {
            index,
            weak,
            strong: stored,
        });
        Ok(())
    }

    /// Weak sum as used by the hash index. Rollsum signatures store raw
    /// digests but index mixed ones; RabinKarp digests index as-is.
    pub(crate) fn hash_weak(&self, weak: u32) -> u32 {
        match self.magic.weaksum_kind() {
            WeaksumKind::Rollsum => mix32(weak),
            WeaksumKind::RabinKarp => weak,
        }
    }

    pub(crate) fn calc_strong(&self, buf: &[u8]) -> [u8; MAX_STRONG_LEN] {
        calc_strong_sum(self.magic.strongsum_kind(), buf)
    }

    /// Build the lookup structures used by delta. Idempotent; must be called
    /// before the signature is handed to a delta job. Once built, the
    /// signature is read-only for the duration of any matching operation.
    pub fn build_hash_table(&mut self) -> Result<()> {
        if self.index.is_none() {
            self.index = Some(HashIndex::build(self)?);
            tracing::trace!(blocks = self.blocks.len(), "built signature hash table");
        }
        Ok(())
    }

    pub(crate) fn has_hash_table(&self) -> bool {
        self.index.is_some()
    }

    /// Look for a block matching `window`, whose index-ready weak digest is
    /// `digest`. Returns the byte position of the match in the basis.
    pub(crate) fn find_match(
        &self,
        digest: u32,
        window: &[u8],
        stats: &mut JobStats,
    ) -> Option<u64> {
        let index = self.index.as_ref()?;
        index.find_match(self, digest, window, stats)
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("magic", &self.magic)
            .field("block_len", &self.block_len)
            .field("strong_len", &self.strong_len)
            .field("blocks", &self.blocks.len())
            .field("indexed", &self.index.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sums::calc_weak_sum;

    fn sig_for(data: &[u8], block_len: usize, magic: SigMagic) -> Signature {
        let mut sig = Signature::new(magic, block_len, 0).unwrap();
        for chunk in data.chunks(block_len) {
            let weak = calc_weak_sum(magic.weaksum_kind(), chunk);
            let strong = calc_strong_sum(magic.strongsum_kind(), chunk);
            sig.add_block(weak, &strong).unwrap();
        }
        sig
    }

    #[test]
    fn test_param_validation() {
        assert_eq!(
            Signature::new(SigMagic::Blake2, 0, 0).unwrap_err(),
            JobError::Param("block length must be at least 1")
        );
        assert!(Signature::new(SigMagic::Md4, 4, 17).is_err());
        assert!(Signature::new(SigMagic::Md4, 4, 16).is_ok());
        // Zero selects the full hash width.
        let sig = Signature::new(SigMagic::Blake2, 4, 0).unwrap();
        assert_eq!(sig.strong_sum_len(), 32);
    }

    #[test]
    fn test_blocks_keep_insertion_order() {
        let sig = sig_for(b"AAAABBBBCCCC", 4, SigMagic::Blake2);
        assert_eq!(sig.len(), 3);
        for (i, block) in sig.blocks().iter().enumerate() {
            assert_eq!(block.index, i as u32 + 1);
        }
    }

    #[test]
    fn test_build_hash_table_is_idempotent() {
        let mut sig = sig_for(b"AAAABBBBCCCCDDDD", 4, SigMagic::Blake2);
        sig.build_hash_table().unwrap();
        sig.build_hash_table().unwrap();
        assert!(sig.has_hash_table());
    }

    #[test]
    fn test_every_inserted_block_is_found() {
        for magic in [SigMagic::Md4, SigMagic::Blake2, SigMagic::RkMd4, SigMagic::RkBlake2] {
            let data: Vec<u8> = (0u16..256).map(|v| (v * 7 + 13) as u8).collect();
            let block_len = 16;
            let mut sig = sig_for(&data, block_len, magic);
            sig.build_hash_table().unwrap();
            let mut stats = JobStats::default();

            for (i, chunk) in data.chunks(block_len).enumerate() {
                let digest = sig.hash_weak(calc_weak_sum(magic.weaksum_kind(), chunk));
                let found = sig.find_match(digest, chunk, &mut stats);
                assert_eq!(found, Some((i * block_len) as u64), "magic {magic:?} block {i}");
            }
        }
    }

    #[test]
    fn test_absent_tag_misses_quickly() {
        let mut sig = sig_for(b"AAAABBBB", 4, SigMagic::RkBlake2);
        sig.build_hash_table().unwrap();
        let mut stats = JobStats::default();
        // A digest whose tag bucket is empty: probe a few arbitrary values
        // that don't belong to the signature.
        let mut missed = false;
        for probe in [0x0102_0304u32, 0xdead_beef, 0x0000_ffff] {
            if sig.find_match(probe, b"ZZZZ", &mut stats).is_none() {
                missed = true;
            }
        }
        assert!(missed);
    }

    #[test]
    fn test_duplicate_blocks_match_lowest_index() {
        let mut sig = sig_for(b"AAAAAAAAAAAA", 4, SigMagic::Blake2);
        sig.build_hash_table().unwrap();
        let mut stats = JobStats::default();
        let digest = sig.hash_weak(calc_weak_sum(WeaksumKind::Rollsum, b"AAAA"));
        assert_eq!(sig.find_match(digest, b"AAAA", &mut stats), Some(0));
    }

    #[test]
    fn test_false_match_is_counted() {
        let mut sig = sig_for(b"AAAABBBB", 4, SigMagic::Blake2);
        sig.build_hash_table().unwrap();
        let mut stats = JobStats::default();
        let weak = sig.blocks()[0].weak;
        // Same weak digest, different content: the strong sum must reject it
        // and the miss is recorded.
        let found = sig.find_match(sig.hash_weak(weak), b"AAAB", &mut stats);
        assert_eq!(found, None);
        assert_eq!(stats.false_matches, 1);
    }
}
