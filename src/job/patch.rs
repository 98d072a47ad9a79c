//! Patch: apply a delta to a basis, reconstructing the target.
//!
//! The command stream drives a small decoder: LITERAL payloads are copied
//! through from the delta itself, COPY commands pull from the basis via the
//! [`Basis`] seam — the one place the pull model reaches out. Basis bytes
//! land directly in the caller's output window.

use crate::buf::Buffers;
use crate::error::{JobError, Result};
use crate::signature::DELTA_MAGIC;
use crate::wire::command::{kind_name, CmdEntry, Kind, PROTOTAB};
use crate::wire::netint::{suck_byte, suck_n4, suck_netint};

use super::{Job, JobCore, Step, StepResult};

/// Result of one basis read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// This many bytes were written to the front of the output slice.
    Filled(usize),
    /// The data is not available yet; the patch job reports `Blocked`.
    Blocked,
}

/// Random-access source for the basis being patched against.
pub trait Basis {
    /// Copy bytes starting at `pos` into the front of `out`.
    ///
    /// May fill less than `out.len()`; the job asks again for the rest.
    fn copy_at(&mut self, pos: u64, out: &mut [u8]) -> Result<Fetch>;
}

/// An in-memory basis. Reads past the end report `InputEnded`, like a file
/// callback hitting EOF.
impl Basis for &[u8] {
    fn copy_at(&mut self, pos: u64, out: &mut [u8]) -> Result<Fetch> {
        let pos = usize::try_from(pos).map_err(|_| JobError::InputEnded)?;
        if pos >= self.len() {
            return Err(JobError::InputEnded);
        }
        let len = out.len().min(self.len() - pos);
        out[..len].copy_from_slice(&self[pos..pos + len]);
        Ok(Fetch::Filled(len))
    }
}

enum PatchState {
    Header,
    CmdByte,
    Params,
    Run,
    Copying,
}

/// State machine for patch application; drive it via [`PatchJob`].
pub struct Patch<B> {
    state: PatchState,
    basis: B,
    op_byte: u8,
    cmd: &'static CmdEntry,
    param1: u64,
    param2: u64,
    basis_pos: u64,
    basis_len: u64,
}

pub type PatchJob<B> = Job<Patch<B>>;

impl<B: Basis> PatchJob<B> {
    pub fn new(basis: B) -> Self {
        Job::start_with_out_digest(
            "patch",
            Patch {
                state: PatchState::Header,
                basis,
                op_byte: 0,
                cmd: &PROTOTAB[0],
                param1: 0,
                param2: 0,
                basis_pos: 0,
                basis_len: 0,
            },
        )
    }

    /// MD4 over all output produced so far.
    pub fn output_digest(&self) -> [u8; 16] {
        self.output_md4().expect("patch jobs keep an output digest")
    }
}

impl<B: Basis> Patch<B> {
    fn read_header(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        let magic = match suck_n4(&mut core.scoop, io)? {
            Some(v) => v,
            None => return Ok(StepResult::Blocked),
        };
        if magic != DELTA_MAGIC {
            tracing::warn!(magic, expected = DELTA_MAGIC, "bad delta magic");
            return Err(JobError::BadMagic(magic));
        }
        tracing::trace!("got delta magic");
        self.state = PatchState::CmdByte;
        Ok(StepResult::Running)
    }

    fn read_cmd_byte(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        let op = match suck_byte(&mut core.scoop, io)? {
            Some(v) => v,
            None => return Ok(StepResult::Blocked),
        };
        self.op_byte = op;
        self.cmd = &PROTOTAB[op as usize];
        tracing::trace!(
            op,
            kind = kind_name(self.cmd.kind),
            len1 = self.cmd.len1,
            "got command"
        );
        if self.cmd.len1 > 0 {
            self.state = PatchState::Params;
        } else {
            self.param1 = u64::from(self.cmd.immediate);
            self.state = PatchState::Run;
        }
        Ok(StepResult::Running)
    }

    fn read_params(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        let len1 = self.cmd.len1 as usize;
        let len2 = self.cmd.len2 as usize;
        if core.scoop.readahead(io, len1 + len2)?.is_none() {
            return Ok(StepResult::Blocked);
        }
        // Both parameters are buffered now; the sucks cannot come up short.
        self.param1 = suck_netint(&mut core.scoop, io, len1)?
            .ok_or(JobError::Internal("parameter vanished after readahead"))?;
        if len2 > 0 {
            self.param2 = suck_netint(&mut core.scoop, io, len2)?
                .ok_or(JobError::Internal("parameter vanished after readahead"))?;
        }
        self.state = PatchState::Run;
        Ok(StepResult::Running)
    }

    fn run(&mut self, core: &mut JobCore) -> Result<StepResult> {
        match self.cmd.kind {
            Kind::Literal => {
                let len = self.param1;
                tracing::trace!(len, "LITERAL");
                core.stats.lit_cmds += 1;
                core.stats.lit_bytes += len;
                core.stats.lit_cmdbytes += 1 + u64::from(self.cmd.len1);
                core.tube.copy(len);
                self.state = PatchState::CmdByte;
                Ok(StepResult::Running)
            }
            Kind::Copy => {
                let (pos, len) = (self.param1, self.param2);
                tracing::trace!(pos, len, "COPY");
                self.basis_pos = pos;
                self.basis_len = len;
                core.stats.copy_cmds += 1;
                core.stats.copy_bytes += len;
                core.stats.copy_cmdbytes +=
                    1 + u64::from(self.cmd.len1) + u64::from(self.cmd.len2);
                self.state = PatchState::Copying;
                Ok(StepResult::Running)
            }
            Kind::End => Ok(StepResult::Finished),
            Kind::Reserved => {
                tracing::warn!(op = self.op_byte, "bogus command byte");
                Err(JobError::Corrupt("reserved command byte"))
            }
        }
    }

    /// Pull the next stretch of a COPY from the basis, straight into the
    /// caller's output window.
    fn copying(&mut self, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        let want = (io.avail_out() as u64).min(self.basis_len) as usize;
        if want == 0 {
            return Ok(StepResult::Blocked);
        }

        let out = &mut io.out_space()[..want];
        let got = match self.basis.copy_at(self.basis_pos, out)? {
            Fetch::Filled(n) => n.min(want),
            Fetch::Blocked => return Ok(StepResult::Blocked),
        };
        if got == 0 {
            return Err(JobError::InputEnded);
        }
        io.advance_out(got);
        self.basis_pos += got as u64;
        self.basis_len -= got as u64;
        tracing::trace!(got, remaining = self.basis_len, "copied from basis");

        if self.basis_len == 0 {
            self.state = PatchState::CmdByte;
        }
        Ok(StepResult::Running)
    }
}

impl<B: Basis> Step for Patch<B> {
    fn step(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult> {
        match self.state {
            PatchState::Header => self.read_header(core, io),
            PatchState::CmdByte => self.read_cmd_byte(core, io),
            PatchState::Params => self.read_params(core, io),
            PatchState::Run => self.run(core),
            PatchState::Copying => self.copying(io),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use md4::{Digest, Md4};

    fn patch_all(basis: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
        let mut job = PatchJob::new(basis);
        let mut out = Vec::new();
        job.drive(delta, &mut out)?;
        Ok(out)
    }

    fn delta_with(commands: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x72730236u32.to_be_bytes());
        bytes.extend_from_slice(commands);
        bytes
    }

    #[test]
    fn test_literal_commands() {
        // Inline immediate form.
        let delta = delta_with(&[0x05, b'h', b'e', b'l', b'l', b'o', 0x00]);
        assert_eq!(patch_all(b"", &delta).unwrap(), b"hello");

        // Explicit length form.
        let delta = delta_with(&[0x41, 5, b'h', b'e', b'l', b'l', b'o', 0x00]);
        assert_eq!(patch_all(b"", &delta).unwrap(), b"hello");
    }

    #[test]
    fn test_copy_command() {
        let delta = delta_with(&[0x45, 4, 8, 0x00]);
        assert_eq!(patch_all(b"AAAABBBBCCCC", &delta).unwrap(), b"BBBBCCCC");
    }

    #[test]
    fn test_bad_magic() {
        let mut delta = Vec::new();
        delta.extend_from_slice(&0x72730237u32.to_be_bytes());
        assert_eq!(
            patch_all(b"", &delta).unwrap_err(),
            JobError::BadMagic(0x72730237)
        );
    }

    #[test]
    fn test_reserved_command_is_corrupt() {
        let delta = delta_with(&[0x55]);
        assert!(matches!(
            patch_all(b"", &delta).unwrap_err(),
            JobError::Corrupt(_)
        ));
    }

    #[test]
    fn test_copy_past_basis_end() {
        let delta = delta_with(&[0x45, 0, 32, 0x00]);
        assert_eq!(
            patch_all(b"short", &delta).unwrap_err(),
            JobError::InputEnded
        );
    }

    #[test]
    fn test_truncated_delta_is_input_ended() {
        // LITERAL announces 5 bytes but only 3 arrive.
        let delta = delta_with(&[0x41, 5, b'a', b'b', b'c']);
        assert_eq!(patch_all(b"", &delta).unwrap_err(), JobError::InputEnded);
    }

    #[test]
    fn test_blocking_basis_propagates() {
        struct Stall;
        impl Basis for Stall {
            fn copy_at(&mut self, _pos: u64, _out: &mut [u8]) -> Result<Fetch> {
                Ok(Fetch::Blocked)
            }
        }

        let delta = delta_with(&[0x45, 0, 4, 0x00]);
        let mut job = PatchJob::new(Stall);
        let mut out = [0u8; 16];
        let mut io = Buffers::new(&delta, true, &mut out);
        assert_eq!(job.iter(&mut io).unwrap(), crate::job::Status::Blocked);
    }

    #[test]
    fn test_watchdog_fires_when_stalled_with_usable_buffers() {
        struct Stall;
        impl Basis for Stall {
            fn copy_at(&mut self, _pos: u64, _out: &mut [u8]) -> Result<Fetch> {
                Ok(Fetch::Blocked)
            }
        }

        let delta = delta_with(&[0x45, 0, 4, 0x00]);
        let mut job = PatchJob::new(Stall);

        // First call makes progress decoding the header and command.
        let mut out = [0u8; 16];
        let mut io = Buffers::new(&delta, true, &mut out);
        assert_eq!(job.iter(&mut io).unwrap(), crate::job::Status::Blocked);
        let consumed = io.consumed();
        assert!(consumed < delta.len());

        // Second call has input and output available but can move neither.
        let mut out = [0u8; 16];
        let mut io = Buffers::new(&delta[consumed..], true, &mut out);
        assert_eq!(
            job.iter(&mut io).unwrap_err(),
            JobError::Internal("job made no progress")
        );
    }

    #[test]
    fn test_errors_latch_across_calls() {
        let mut delta = Vec::new();
        delta.extend_from_slice(&0xbad0_5eedu32.to_be_bytes());

        let mut job = PatchJob::new(&b""[..]);
        let mut out = [0u8; 16];
        let mut io = Buffers::new(&delta, true, &mut out);
        assert_eq!(
            job.iter(&mut io).unwrap_err(),
            JobError::BadMagic(0xbad05eed)
        );

        // Every further call reports the same terminal error.
        let mut out = [0u8; 16];
        let mut io = Buffers::new(b"", true, &mut out);
        assert_eq!(
            job.iter(&mut io).unwrap_err(),
            JobError::BadMagic(0xbad05eed)
        );
    }

    #[test]
    fn test_output_digest_covers_produced_bytes() {
        let delta = delta_with(&[0x05, b'h', b'e', b'l', b'l', b'o', 0x00]);
        let mut job = PatchJob::new(&b""[..]);
        let mut out = Vec::new();
        job.drive(&delta, &mut out).unwrap();
        let expect: [u8; 16] = Md4::digest(b"hello").into();
        assert_eq!(job.output_digest(), expect);
    }

    #[test]
    fn test_stats_mirror_decoded_commands() {
        let delta = delta_with(&[0x03, b'x', b'y', b'z', 0x45, 0, 4, 0x00]);
        let mut job = PatchJob::new(&b"ABCDEF"[..]);
        let mut out = Vec::new();
        job.drive(&delta, &mut out).unwrap();
        assert_eq!(out, b"xyzABCD");
        assert_eq!(job.stats().lit_cmds, 1);
        assert_eq!(job.stats().lit_bytes, 3);
        assert_eq!(job.stats().copy_cmds, 1);
        assert_eq!(job.stats().copy_bytes, 4);
    }
}
