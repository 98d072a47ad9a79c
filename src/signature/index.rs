//! Hash index over a signature's block sums.
//!
//! The index is two parallel structures: a target array of
//! `(tag, block index)` pairs sorted so equal tags cluster, and a 65536-entry
//! table mapping each tag to the inclusive `[l, r]` range of its cluster.
//! Lookup folds the window's weak digest to a tag, binary-searches the
//! cluster for the weak sum, and confirms candidates with the strong sum,
//! computed at most once per scan position.

use crate::error::{JobError, Result};
use crate::stats::JobStats;

use super::Signature;

const TABLE_SIZE: usize = 1 << 16;
const EMPTY: u32 = u32::MAX;

/// Fold a 32-bit weak digest down to a table tag.
fn tag16(digest: u32) -> u16 {
    ((digest & 0xffff) + (digest >> 16)) as u16
}

#[derive(Debug, Clone, Copy)]
struct Target {
    tag: u16,
    /// 0-based position into the signature's block array.
    idx: u32,
}

#[derive(Debug, Clone, Copy)]
struct TagRange {
    l: u32,
    r: u32,
}

pub(crate) struct HashIndex {
    targets: Vec<Target>,
    table: Vec<TagRange>,
}

impl HashIndex {
    pub(crate) fn build(sig: &Signature) -> Result<Self> {
        let blocks = sig.blocks();
        let strong_len = sig.strong_sum_len();

        let mut targets = Vec::new();
        targets
            .try_reserve_exact(blocks.len())
            .map_err(|_| JobError::Mem("signature target array"))?;
        for (idx, block) in blocks.iter().enumerate() {
            targets.push(Target {
                tag: tag16(sig.hash_weak(block.weak)),
                idx: idx as u32,
            });
        }

        // Cluster by tag; order clusters by weak then strong so lookups can
        // binary-search, and finally by block index so ties resolve to the
        // earliest block deterministically.
        targets.sort_unstable_by(|a, b| {
            let ba = &blocks[a.idx as usize];
            let bb = &blocks[b.idx as usize];
            a.tag
                .cmp(&b.tag)
                .then_with(|| sig.hash_weak(ba.weak).cmp(&sig.hash_weak(bb.weak)))
                .then_with(|| ba.strong[..strong_len].cmp(&bb.strong[..strong_len]))
                .then_with(|| a.idx.cmp(&b.idx))
        });

        let mut table = Vec::new();
        table
            .try_reserve_exact(TABLE_SIZE)
            .map_err(|_| JobError::Mem("signature tag table"))?;
        table.resize(TABLE_SIZE, TagRange { l: EMPTY, r: EMPTY });

        for (i, target) in targets.iter().enumerate() {
            let entry = &mut table[target.tag as usize];
            if entry.l == EMPTY {
                entry.l = i as u32;
            }
            entry.r = i as u32;
        }

        Ok(Self { targets, table })
    }

    /// Search for a block whose weak digest equals `digest` and whose strong
    /// sum matches `window`. Returns the match position in the basis.
    pub(crate) fn find_match(
        &self,
        sig: &Signature,
        digest: u32,
        window: &[u8],
        stats: &mut JobStats,
    ) -> Option<u64> {
        let bucket = self.table[tag16(digest) as usize];
        if bucket.l == EMPTY {
            return None;
        }

        let blocks = sig.blocks();
        let strong_len = sig.strong_sum_len();
        let cluster = &self.targets[bucket.l as usize..=bucket.r as usize];

        // Entries with this weak sum form a contiguous run; binary-search
        // its start, then walk it in strong-sum order.
        let start = cluster
            .partition_point(|t| sig.hash_weak(blocks[t.idx as usize].weak) < digest);

        let mut strong = None;
        let mut weak_hit = false;
        for target in &cluster[start..] {
            let block = &blocks[target.idx as usize];
            if sig.hash_weak(block.weak) != digest {
                break;
            }
            weak_hit = true;
            let strong = strong.get_or_insert_with(|| sig.calc_strong(window));
            match strong[..strong_len].cmp(&block.strong[..strong_len]) {
                std::cmp::Ordering::Equal => {
                    return Some(u64::from(block.index - 1) * sig.block_len() as u64);
                }
                // The run ascends by strong sum; past ours, nothing matches.
                std::cmp::Ordering::Less => break,
                std::cmp::Ordering::Greater => continue,
            }
        }

        if weak_hit {
            stats.false_matches += 1;
        }
        None
    }
}
