//! The tube: a small elastic buffer for pending output.
//!
//! A state function can queue a handful of literal bytes (command headers)
//! and one copy-through-from-input instruction. The tube drains in strict
//! order — literals first, then the copy — whenever output space appears.
//! Nothing new may be queued until it is idle again.

use crate::buf::Buffers;
use crate::error::{JobError, Result};

use super::scoop::Scoop;

/// Room for one encoded command header plus a strong sum.
const WRITE_BUF_LEN: usize = 36;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Flush {
    /// Everything pending went out; a new command may be queued.
    Idle,
    /// Output filled up (or input ran dry) before the tube emptied.
    Blocked,
}

pub(crate) struct Tube {
    write_buf: [u8; WRITE_BUF_LEN],
    write_len: usize,
    copy_len: u64,
}

impl Tube {
    pub(crate) fn new() -> Self {
        Self {
            write_buf: [0; WRITE_BUF_LEN],
            write_len: 0,
            copy_len: 0,
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.write_len == 0 && self.copy_len == 0
    }

    /// Queue literal bytes. Only valid while no copy is pending.
    pub(crate) fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.copy_len != 0 {
            return Err(JobError::Internal("tube write while copy pending"));
        }
        if data.len() > WRITE_BUF_LEN - self.write_len {
            return Err(JobError::Internal("tube overflow"));
        }
        self.write_buf[self.write_len..self.write_len + data.len()].copy_from_slice(data);
        self.write_len += data.len();
        Ok(())
    }

    /// Queue a copy of `len` bytes through from the input side.
    pub(crate) fn copy(&mut self, len: u64) {
        debug_assert_eq!(self.copy_len, 0, "tube copy while copy pending");
        self.copy_len = len;
    }

    /// Push whatever fits out: pending literals, then the pending copy,
    /// preferring scooped bytes over direct caller input.
    pub(crate) fn catchup(&mut self, scoop: &mut Scoop, io: &mut Buffers<'_, '_>) -> Result<Flush> {
        if self.write_len > 0 {
            let sent = io.write_out(&self.write_buf[..self.write_len]);
            if sent < self.write_len {
                self.write_buf.copy_within(sent..self.write_len, 0);
            }
            self.write_len -= sent;
            if self.write_len > 0 {
                return Ok(Flush::Blocked);
            }
        }

        if self.copy_len > 0 {
            if scoop.avail() > 0 {
                let len = (self.copy_len.min(scoop.avail() as u64)) as usize;
                let sent = io.write_out(&scoop.buffered()[..len]);
                scoop.consume(sent);
                self.copy_len -= sent as u64;
            }
            if self.copy_len > 0 {
                let sent = io.copy_through(self.copy_len);
                self.copy_len -= sent as u64;
            }
        }

        if self.copy_len > 0 {
            if io.eof_in() && io.avail_in() == 0 && scoop.avail() == 0 {
                tracing::warn!(
                    pending = self.copy_len,
                    "input ended while copying literal data through"
                );
                return Err(JobError::InputEnded);
            }
            return Ok(Flush::Blocked);
        }

        Ok(Flush::Idle)
    }
}
