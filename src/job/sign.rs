//! Signature generation.
//!
//! Emits the signature header, then a weak + strong sum pair for every
//! block of the input. Checksum generation can always use whatever data has
//! arrived; only a full block (or the final short tail) is hashed at a
//! time. The sums are also accumulated into an owned [`Signature`] so the
//! caller can keep matching against them without re-parsing its own output.

use crate::buf::Buffers;
use crate::error::{JobError, Result};
use crate::signature::{SigMagic, Signature, MAX_STRONG_LEN};
use crate::sums::calc_weak_sum;
use crate::wire::netint::squirt_n4;

use super::{Job, JobCore, Step, StepResult};

enum SignState {
    Header,
    Generate,
}

/// State machine for signature generation; drive it via [`SignJob`].
pub struct Sign {
    state: SignState,
    sig: Signature,
}

pub type SignJob = Job<Sign>;

impl SignJob {
    /// Start a signature job.
    ///
    /// `strong_len == 0` selects the full strong-sum width for the magic.
    pub fn new(magic: SigMagic, block_len: usize, strong_len: usize) -> Result<Self> {
        let sig = Signature::new(magic, block_len, strong_len)?;
        Ok(Job::start(
            "signature",
            Sign {
                state: SignState::Header,
                sig,
            },
        ))
    }

    /// The signature accumulated while emitting, available once the job has
    /// completed.
    pub fn into_signature(self) -> Result<Signature> {
        if !self.is_done() {
            return Err(JobError::Param("signature job has not completed"));
        }
        Ok(self.op.sig)
    }
}

impl Sign {
    fn emit_header(&mut self, core: &mut JobCore) -> Result<StepResult> {
        let sig = &self.sig;
        squirt_n4(&mut core.tube, sig.magic().as_u32())?;
        squirt_n4(&mut core.tube, sig.block_len() as u32)?;
        squirt_n4(&mut core.tube, sig.strong_sum_len() as u32)?;
        tracing::trace!(
            magic = sig.magic().as_u32(),
            block_len = sig.block_len(),
            strong_len = sig.strong_sum_len(),
            "sent signature header"
        );
        core.stats.block_len = sig.block_len() as u64;
        self.state = SignState::Generate;
        Ok(StepResult::Running)
    }

    fn generate(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        let block_len = self.sig.block_len();

        // A whole block if we can get one; at end of input, the residue.
        let len = match core.scoop.readahead(io, block_len) {
            Ok(Some(_)) => block_len,
            Ok(None) => return Ok(StepResult::Blocked),
            Err(JobError::InputEnded) => {
                let rest = core.scoop.total_avail(io);
                if rest == 0 {
                    return Ok(StepResult::Finished);
                }
                rest
            }
            Err(e) => return Err(e),
        };

        let (weak, strong) = {
            let block = match core.scoop.readahead(io, len)? {
                Some(block) => block,
                None => return Ok(StepResult::Blocked),
            };
            let weak = calc_weak_sum(self.sig.magic().weaksum_kind(), block);
            let strong = self.sig.calc_strong(block);
            (weak, strong)
        };
        core.scoop.advance(io, len);

        self.emit_block(core, len, weak, &strong)
    }

    fn emit_block(
        &mut self,
        core: &mut JobCore,
        len: usize,
        weak: u32,
        strong: &[u8; MAX_STRONG_LEN],
    ) -> Result<StepResult> {
        squirt_n4(&mut core.tube, weak)?;
        core.tube.write(&strong[..self.sig.strong_sum_len()])?;
        self.sig.add_block(weak, strong)?;
        core.stats.sig_blocks += 1;
        tracing::trace!(len, weak, "signed block");
        Ok(StepResult::Running)
    }
}

impl Step for Sign {
    fn step(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        match self.state {
            SignState::Header => self.emit_header(core),
            SignState::Generate => self.generate(core, io),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_all(magic: SigMagic, block_len: usize, strong_len: usize, data: &[u8]) -> Vec<u8> {
        let mut job = SignJob::new(magic, block_len, strong_len).unwrap();
        let mut out = Vec::new();
        job.drive(data, &mut out).unwrap();
        out
    }

    #[test]
    fn test_header_layout() {
        let out = sign_all(SigMagic::Blake2, 4, 32, b"");
        assert_eq!(out.len(), 12);
        assert_eq!(&out[0..4], &0x72730137u32.to_be_bytes());
        assert_eq!(&out[4..8], &4u32.to_be_bytes());
        assert_eq!(&out[8..12], &32u32.to_be_bytes());
    }

    #[test]
    fn test_block_records() {
        let data = b"AAAABBBBCC";
        let out = sign_all(SigMagic::Md4, 4, 8, data);
        // Header plus three (weak, strong) records: 4, 4 and the 2-byte tail.
        assert_eq!(out.len(), 12 + 3 * (4 + 8));

        let weak0 = u32::from_be_bytes(out[12..16].try_into().unwrap());
        assert_eq!(
            weak0,
            calc_weak_sum(crate::sums::WeaksumKind::Rollsum, b"AAAA")
        );
        let weak2 = u32::from_be_bytes(out[36..40].try_into().unwrap());
        assert_eq!(
            weak2,
            calc_weak_sum(crate::sums::WeaksumKind::Rollsum, b"CC")
        );
    }

    #[test]
    fn test_accumulated_signature_matches_output() {
        let data = b"AAAABBBBCCCCDD";
        let mut job = SignJob::new(SigMagic::RkBlake2, 4, 0).unwrap();
        let mut out = Vec::new();
        job.drive(data, &mut out).unwrap();
        let sig = job.into_signature().unwrap();
        assert_eq!(sig.len(), 4);
        assert_eq!(sig.blocks()[3].index, 4);
    }

    #[test]
    fn test_into_signature_requires_completion() {
        let job = SignJob::new(SigMagic::Blake2, 4, 0).unwrap();
        assert!(job.into_signature().is_err());
    }

    #[test]
    fn test_byte_at_a_time_matches_all_at_once() {
        let data = b"the streaming laws hold for signatures too";
        let whole = sign_all(SigMagic::Blake2, 8, 16, data);

        let mut job = SignJob::new(SigMagic::Blake2, 8, 16).unwrap();
        let mut dribbled = Vec::new();
        let mut status = crate::job::Status::Blocked;
        for (i, byte) in data.iter().enumerate() {
            let eof = i == data.len() - 1;
            let mut out = [0u8; 128];
            let mut io = Buffers::new(std::slice::from_ref(byte), eof, &mut out);
            status = job.iter(&mut io).unwrap();
            assert_eq!(io.consumed(), 1);
            let produced = io.produced();
            dribbled.extend_from_slice(&out[..produced]);
        }
        while status != crate::job::Status::Done {
            let mut out = [0u8; 128];
            let mut io = Buffers::new(b"", true, &mut out);
            status = job.iter(&mut io).unwrap();
            let produced = io.produced();
            dribbled.extend_from_slice(&out[..produced]);
        }

        assert_eq!(dribbled, whole);
    }
}
