//! Delta generation: scan the target for blocks the basis already has.
//!
//! The scan keeps a rolling weak sum over a block-sized window of the
//! scooped input. A hit in the signature's hash index is confirmed with the
//! strong sum and extends or starts a pending COPY; a miss slides the
//! window one byte and the byte joins a pending LITERAL run. When the input
//! ends, the window shrinks byte by byte so the final short block can still
//! match. Without a usable signature the job degrades to a "slack delta" of
//! pure literals.
//!
//! Scanning and emission are decoupled from consumption: `pos` marks how
//! far ahead of the scoop's front the scan has looked, and scanned data is
//! only consumed off the scoop once the command covering it has been queued
//! through the tube.

use crate::buf::Buffers;
use crate::error::{JobError, Result};
use crate::signature::Signature;
use crate::sums::Weaksum;
use crate::wire::emit::{emit_copy_cmd, emit_delta_header, emit_end_cmd, emit_literal_cmd};

use super::{Job, JobCore, Step, StepResult};

/// Cap on an unflushed literal run, keeping scoop memory bounded. Costs 3
/// command bytes per 32 KiB of literal data in the worst case.
const MAX_MISS: usize = 32768;

enum DeltaState {
    Header,
    Scan,
    Flush,
    End,
    Slack,
}

/// State machine for delta generation; drive it via [`DeltaJob`].
pub struct Delta<'a> {
    state: DeltaState,
    sig: Option<&'a Signature>,
    weak: Weaksum,
    /// Bytes scanned beyond the scoop front but not yet covered by a
    /// command: a pending literal run, or a just-matched block.
    pos: usize,
    /// Pending match, empty when `basis_len == 0`.
    basis_pos: u64,
    basis_len: u64,
    paranoia: bool,
}

pub type DeltaJob<'a> = Job<Delta<'a>>;

impl<'a> DeltaJob<'a> {
    /// Start a delta job against `sig`.
    ///
    /// `None` (or an empty signature) produces a slack delta of pure
    /// literals. A non-empty signature must have had its hash table built.
    pub fn new(sig: Option<&'a Signature>) -> Result<Self> {
        let sig = match sig {
            Some(s) if s.is_empty() => None,
            other => other,
        };
        if let Some(s) = sig {
            if !s.has_hash_table() {
                return Err(JobError::Param("signature hash table has not been built"));
            }
        }
        let weak = Weaksum::new(
            sig.map(|s| s.magic().weaksum_kind())
                .unwrap_or(crate::sums::WeaksumKind::Rollsum),
        );
        Ok(Job::start(
            "delta",
            Delta {
                state: DeltaState::Header,
                sig,
                weak,
                pos: 0,
                basis_pos: 0,
                basis_len: 0,
                paranoia: false,
            },
        ))
    }

    /// Re-verify the rolling sum from scratch after every slide. A
    /// development guard; mismatches are internal errors.
    pub fn set_paranoia(&mut self, on: bool) {
        self.op.paranoia = on;
    }
}

impl<'a> Delta<'a> {
    fn header(&mut self, core: &mut JobCore) -> Result<StepResult> {
        emit_delta_header(&mut core.tube)?;
        if self.sig.is_some() {
            self.state = DeltaState::Scan;
        } else {
            tracing::trace!("no signature for delta, emitting slack delta");
            self.state = DeltaState::Slack;
        }
        Ok(StepResult::Running)
    }

    /// Find a match for the window at the scan position, priming the weak
    /// sum from scratch if a match or reset just cleared it.
    fn find_match(&mut self, core: &mut JobCore) -> Option<(u64, usize)> {
        let sig = self.sig.expect("scan states require a signature");
        let data = core.scoop.buffered();
        let match_len = if self.weak.count() == 0 {
            let len = sig.block_len().min(data.len() - self.pos);
            self.weak.update(&data[self.pos..self.pos + len]);
            len
        } else {
            self.weak.count()
        };
        let window = &data[self.pos..self.pos + match_len];
        sig.find_match(self.weak.digest(), window, &mut core.stats)
            .map(|pos| (pos, match_len))
    }

    /// Emit any pending match or literal run. Returns true if the tube
    /// blocked on output.
    fn append_flush(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<bool> {
        if self.basis_len > 0 {
            tracing::trace!(pos = self.basis_pos, len = self.basis_len, "flush match");
            emit_copy_cmd(&mut core.tube, &mut core.stats, self.basis_pos, self.basis_len)?;
            self.basis_len = 0;
            self.process_match(core, io)
        } else if self.pos > 0 {
            tracing::trace!(len = self.pos, "flush literal run");
            emit_literal_cmd(&mut core.tube, &mut core.stats, self.pos as u64)?;
            self.process_miss(core, io)
        } else {
            Ok(false)
        }
    }

    /// Append a match, extending the pending one when contiguous.
    fn append_match(
        &mut self,
        core: &mut JobCore,
        io: &mut Buffers<'_, '_>,
        match_pos: u64,
        match_len: usize,
    ) -> Result<bool> {
        let mut blocked = false;
        if self.basis_len > 0 && self.basis_pos + self.basis_len == match_pos {
            self.basis_len += match_len as u64;
        } else {
            blocked = self.append_flush(core, io)?;
            self.basis_pos = match_pos;
            self.basis_len = match_len as u64;
        }
        self.pos += match_len;
        if !blocked {
            blocked = self.process_match(core, io)?;
        }
        Ok(blocked)
    }

    /// Append a miss byte, flushing first when it follows a match or the
    /// literal run has grown to its cap.
    fn append_miss(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<bool> {
        let mut blocked = false;
        if self.basis_len > 0 || self.pos >= MAX_MISS {
            blocked = self.append_flush(core, io)?;
        }
        self.pos += 1;
        Ok(blocked)
    }

    /// Matched data needs no output; drop it off the scoop.
    fn process_match(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<bool> {
        core.scoop.consume(self.pos);
        self.pos = 0;
        Ok(core.tube.catchup(&mut core.scoop, io)? == crate::stream::Flush::Blocked)
    }

    /// Miss data goes out as the pending literal's payload, straight off
    /// the scoop.
    fn process_miss(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<bool> {
        core.tube.copy(self.pos as u64);
        self.pos = 0;
        Ok(core.tube.catchup(&mut core.scoop, io)? == crate::stream::Flush::Blocked)
    }

    fn check_paranoia(&self, core: &JobCore) -> Result<()> {
        let mut fresh = Weaksum::new(self.weak.kind());
        let data = core.scoop.buffered();
        fresh.update(&data[self.pos..self.pos + self.weak.count()]);
        if fresh.digest() != self.weak.digest() {
            tracing::warn!("rolled weak sum does not match recomputation");
            return Err(JobError::Internal("rolling checksum mismatch"));
        }
        Ok(())
    }

    fn scan(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        let block_len = self.sig.expect("scan requires a signature").block_len();

        core.scoop.fill_from(io)?;
        let mut blocked = core.tube.catchup(&mut core.scoop, io)? == crate::stream::Flush::Blocked;

        // One byte of lookahead past the window keeps the rotate legal.
        while !blocked && self.pos + block_len < core.scoop.avail() {
            if let Some((match_pos, match_len)) = self.find_match(core) {
                blocked = self.append_match(core, io, match_pos, match_len)?;
                self.weak.reset();
            } else {
                let out = core.scoop.byte(self.pos);
                let in_ = core.scoop.byte(self.pos + block_len);
                self.weak.rotate(out, in_);
                blocked = self.append_miss(core, io)?;
                if self.paranoia {
                    self.check_paranoia(core)?;
                }
            }
        }

        if blocked {
            return Ok(StepResult::Blocked);
        }
        if io.eof_in() {
            self.state = DeltaState::Flush;
            return Ok(StepResult::Running);
        }
        Ok(StepResult::Blocked)
    }

    fn flush(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        core.scoop.fill_from(io)?;
        let mut blocked = core.tube.catchup(&mut core.scoop, io)? == crate::stream::Flush::Blocked;

        // The window shrinks from the back as the scan closes on the end of
        // input; a short final block can still match on its sums.
        while !blocked && self.pos < core.scoop.avail() {
            if let Some((match_pos, match_len)) = self.find_match(core) {
                blocked = self.append_match(core, io, match_pos, match_len)?;
                self.weak.reset();
            } else {
                let out = core.scoop.byte(self.pos);
                self.weak.rollout(out);
                tracing::trace!(remaining = self.weak.count(), "window reduced");
                blocked = self.append_miss(core, io)?;
            }
        }

        if blocked {
            return Ok(StepResult::Blocked);
        }
        let flushed_blocked = self.append_flush(core, io)?;
        self.state = DeltaState::End;
        if flushed_blocked {
            return Ok(StepResult::Blocked);
        }
        Ok(StepResult::Running)
    }

    fn slack(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        let avail = io.avail_in();
        if avail > 0 {
            tracing::trace!(avail, "slack delta literal");
            emit_literal_cmd(&mut core.tube, &mut core.stats, avail as u64)?;
            core.tube.copy(avail as u64);
            Ok(StepResult::Running)
        } else if io.eof_in() {
            self.state = DeltaState::End;
            Ok(StepResult::Running)
        } else {
            Ok(StepResult::Blocked)
        }
    }

    fn end(&mut self, core: &mut JobCore) -> Result<StepResult> {
        emit_end_cmd(&mut core.tube)?;
        Ok(StepResult::Finished)
    }
}

impl<'a> Step for Delta<'a> {
    fn step(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        match self.state {
            DeltaState::Header => self.header(core),
            DeltaState::Scan => self.scan(core, io),
            DeltaState::Flush => self.flush(core, io),
            DeltaState::End => self.end(core),
            DeltaState::Slack => self.slack(core, io),
        }
    }
}
