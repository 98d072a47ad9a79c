//! Signature loading: parse a signature stream back into a [`Signature`].
//!
//! The header is validated field by field, then (weak, strong) records are
//! appended until the input ends. Signatures are self-delimiting: running
//! out of input just before a weak sum is a clean end, anywhere else it is
//! truncation.

use crate::buf::Buffers;
use crate::error::{JobError, Result};
use crate::signature::{SigMagic, Signature, MAX_STRONG_LEN};
use crate::wire::netint::suck_n4;

use super::{Job, JobCore, Step, StepResult};

enum LoadSigState {
    Magic,
    BlockLen,
    StrongLen,
    Weak,
    Strong,
}

/// State machine for signature loading; drive it via [`LoadSigJob`].
pub struct LoadSig {
    state: LoadSigState,
    magic: Option<SigMagic>,
    block_len: usize,
    sig: Option<Signature>,
    pending_weak: u32,
    /// Signature file length, if known, used to preallocate the block array.
    size_hint: Option<u64>,
}

pub type LoadSigJob = Job<LoadSig>;

impl LoadSigJob {
    pub fn new() -> Self {
        Self::start_load(None)
    }

    /// Like [`LoadSigJob::new`], preallocating for a signature file of
    /// `file_len` bytes.
    pub fn with_size_hint(file_len: u64) -> Self {
        Self::start_load(Some(file_len))
    }

    fn start_load(size_hint: Option<u64>) -> Self {
        Job::start(
            "loadsig",
            LoadSig {
                state: LoadSigState::Magic,
                magic: None,
                block_len: 0,
                sig: None,
                pending_weak: 0,
                size_hint,
            },
        )
    }

    /// The parsed signature, available once the job has completed.
    pub fn into_signature(self) -> Result<Signature> {
        if !self.is_done() {
            return Err(JobError::Param("loadsig job has not completed"));
        }
        self.op
            .sig
            .ok_or(JobError::Internal("loadsig completed without a signature"))
    }
}

impl Default for LoadSigJob {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSig {
    fn read_magic(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        let raw = match suck_n4(&mut core.scoop, io)? {
            Some(v) => v,
            None => return Ok(StepResult::Blocked),
        };
        match SigMagic::from_u32(raw) {
            Some(magic) => {
                tracing::trace!(magic = raw, "got signature magic");
                self.magic = Some(magic);
                self.state = LoadSigState::BlockLen;
                Ok(StepResult::Running)
            }
            None => {
                tracing::warn!(magic = raw, "wrong magic number for signature");
                Err(JobError::BadMagic(raw))
            }
        }
    }

    fn read_block_len(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        let len = match suck_n4(&mut core.scoop, io)? {
            Some(v) => v,
            None => return Ok(StepResult::Blocked),
        };
        if len < 1 {
            tracing::warn!(len, "bogus block length");
            return Err(JobError::Corrupt("block length of zero"));
        }
        self.block_len = len as usize;
        core.stats.block_len = u64::from(len);
        self.state = LoadSigState::StrongLen;
        Ok(StepResult::Running)
    }

    fn read_strong_len(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        let len = match suck_n4(&mut core.scoop, io)? {
            Some(v) => v as usize,
            None => return Ok(StepResult::Blocked),
        };
        let magic = self.magic.expect("magic read before strong length");
        // Older encoders truncated non-canonically (MD4 at 8); anything up
        // to the hash width is accepted.
        if len < 1 || len > magic.max_strong_len() {
            tracing::warn!(len, "implausible strong sum length");
            return Err(JobError::Corrupt("implausible strong sum length"));
        }

        // Header is 12 bytes, each record 4 + strong_len.
        let hint = self
            .size_hint
            .map(|bytes| (bytes.saturating_sub(12) / (4 + len as u64)) as usize)
            .unwrap_or(0);
        self.sig = Some(Signature::with_capacity(magic, self.block_len, len, hint)?);
        tracing::trace!(block_len = self.block_len, strong_len = len, "parsed signature header");
        self.state = LoadSigState::Weak;
        Ok(StepResult::Running)
    }

    fn read_weak(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        match suck_n4(&mut core.scoop, io) {
            Ok(Some(v)) => {
                self.pending_weak = v;
                self.state = LoadSigState::Strong;
                Ok(StepResult::Running)
            }
            Ok(None) => Ok(StepResult::Blocked),
            // Ending here is the normal end of a signature.
            Err(JobError::InputEnded) => Ok(StepResult::Finished),
            Err(e) => Err(e),
        }
    }

    fn read_strong(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        let sig = self.sig.as_mut().expect("signature exists in strong state");
        let strong_len = sig.strong_sum_len();

        let mut strong = [0u8; MAX_STRONG_LEN];
        match core.scoop.readahead(io, strong_len)? {
            Some(span) => strong[..strong_len].copy_from_slice(span),
            None => return Ok(StepResult::Blocked),
        }
        core.scoop.advance(io, strong_len);

        sig.add_block(self.pending_weak, &strong)?;
        core.stats.sig_blocks += 1;
        self.state = LoadSigState::Weak;
        Ok(StepResult::Running)
    }
}

impl Step for LoadSig {
    fn step(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        match self.state {
            LoadSigState::Magic => self.read_magic(core, io),
            LoadSigState::BlockLen => self.read_block_len(core, io),
            LoadSigState::StrongLen => self.read_strong_len(core, io),
            LoadSigState::Weak => self.read_weak(core, io),
            LoadSigState::Strong => self.read_strong(core, io),
        }
    }
}
