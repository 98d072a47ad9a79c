//! The scoop: readahead from caller-supplied buffers.
//!
//! State functions often need a minimum contiguous span to make progress —
//! a whole block to hash, a command header to decode — while the caller may
//! deliver input in arbitrarily small fragments. Input that cannot yet be
//! used is pulled into this owned buffer; when the caller's window already
//! holds enough, readahead hands out a span of it directly and nothing is
//! copied.

use crate::buf::Buffers;
use crate::error::{JobError, Result};

pub(crate) struct Scoop {
    buf: Vec<u8>,
    /// Start of live data inside `buf`.
    next: usize,
    /// Length of live data.
    avail: usize,
}

impl Scoop {
    pub(crate) fn new() -> Self {
        Self {
            buf: Vec::new(),
            next: 0,
            avail: 0,
        }
    }

    pub(crate) fn avail(&self) -> usize {
        self.avail
    }

    /// Live bytes currently held.
    pub(crate) fn buffered(&self) -> &[u8] {
        &self.buf[self.next..self.next + self.avail]
    }

    pub(crate) fn byte(&self, pos: usize) -> u8 {
        self.buf[self.next + pos]
    }

    /// Total bytes reachable right now: scooped plus caller input.
    pub(crate) fn total_avail(&self, io: &Buffers<'_, '_>) -> usize {
        self.avail + io.avail_in()
    }

    /// Accept caller input so the scoop holds up to `len` bytes.
    fn input(&mut self, io: &mut Buffers<'_, '_>, len: usize) -> Result<()> {
        debug_assert!(len > self.avail);

        if self.buf.len() < len {
            let mut newsize = 64;
            while newsize < len {
                newsize <<= 1;
            }
            let mut newbuf = Vec::new();
            newbuf
                .try_reserve_exact(newsize)
                .map_err(|_| JobError::Mem("scoop buffer"))?;
            newbuf.extend_from_slice(&self.buf[self.next..self.next + self.avail]);
            newbuf.resize(newsize, 0);
            tracing::trace!(from = self.buf.len(), to = newsize, "resized scoop");
            self.buf = newbuf;
            self.next = 0;
        } else if self.next != 0 {
            self.buf.copy_within(self.next..self.next + self.avail, 0);
            self.next = 0;
        }

        let tocopy = (len - self.avail).min(io.avail_in());
        let src = &io.remaining_in()[..tocopy];
        self.buf[self.next + self.avail..self.next + self.avail + tocopy].copy_from_slice(src);
        self.avail += tocopy;
        io.skip_in(tocopy);
        Ok(())
    }

    /// Pull everything the caller currently offers into the scoop.
    pub(crate) fn fill_from(&mut self, io: &mut Buffers<'_, '_>) -> Result<()> {
        if io.avail_in() > 0 {
            let want = self.avail + io.avail_in();
            self.input(io, want)?;
        }
        Ok(())
    }

    /// Look at `len` contiguous bytes without consuming them.
    ///
    /// Returns a span of the caller's input if it alone suffices and the
    /// scoop is empty, otherwise a span of the scoop (pulling caller input
    /// in as needed). `Ok(None)` means not enough data yet; `InputEnded`
    /// means not enough data and none is coming. Repeated calls at the same
    /// position are free.
    pub(crate) fn readahead<'a>(
        &'a mut self,
        io: &'a mut Buffers<'_, '_>,
        len: usize,
    ) -> Result<Option<&'a [u8]>> {
        if self.avail == 0 && io.avail_in() >= len {
            return Ok(Some(&io.remaining_in()[..len]));
        }
        if self.avail < len && io.avail_in() > 0 {
            self.input(io, len)?;
        }
        if self.avail >= len {
            Ok(Some(&self.buf[self.next..self.next + len]))
        } else if io.eof_in() {
            Err(JobError::InputEnded)
        } else {
            Ok(None)
        }
    }

    /// Consume `len` bytes from whatever source the last readahead served.
    ///
    /// Consumption never mixes scoop and direct input in one call: if the
    /// scoop holds data, the bytes come from it, else from the caller.
    pub(crate) fn advance(&mut self, io: &mut Buffers<'_, '_>, len: usize) {
        if self.avail > 0 {
            debug_assert!(len <= self.avail);
            self.next += len;
            self.avail -= len;
        } else {
            io.skip_in(len);
        }
    }

    /// Drop `len` bytes off the front of the scoop itself.
    pub(crate) fn consume(&mut self, len: usize) {
        debug_assert!(len <= self.avail);
        self.next += len;
        self.avail -= len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_readahead_copies_nothing() {
        let mut scoop = Scoop::new();
        let mut out: [u8; 0] = [];
        let mut io = Buffers::new(b"abcdef", false, &mut out);

        let span = scoop.readahead(&mut io, 4).unwrap().unwrap();
        assert_eq!(span, b"abcd");
        scoop.advance(&mut io, 4);
        assert_eq!(io.consumed(), 4);
        assert_eq!(scoop.avail(), 0);
    }

    #[test]
    fn test_fragmented_input_accumulates() {
        let mut scoop = Scoop::new();
        let mut out: [u8; 0] = [];

        let mut io = Buffers::new(b"ab", false, &mut out);
        assert!(scoop.readahead(&mut io, 4).unwrap().is_none());
        assert_eq!(io.consumed(), 2);

        let mut io = Buffers::new(b"cd", false, &mut out);
        let got = scoop.readahead(&mut io, 4).unwrap().unwrap().to_vec();
        assert_eq!(got, b"abcd");
        scoop.advance(&mut io, 4);
        assert_eq!(scoop.avail(), 0);
    }

    #[test]
    fn test_readahead_is_repeatable() {
        let mut scoop = Scoop::new();
        let mut out: [u8; 0] = [];
        let mut io = Buffers::new(b"xy", false, &mut out);
        assert!(scoop.readahead(&mut io, 4).unwrap().is_none());

        let mut io = Buffers::new(b"", false, &mut out);
        assert!(scoop.readahead(&mut io, 4).unwrap().is_none());
        assert_eq!(scoop.avail(), 2);
    }

    #[test]
    fn test_eof_with_partial_data() {
        let mut scoop = Scoop::new();
        let mut out: [u8; 0] = [];
        let mut io = Buffers::new(b"ab", true, &mut out);
        assert_eq!(
            scoop.readahead(&mut io, 4).unwrap_err(),
            JobError::InputEnded
        );
        // The partial bytes are still there for a shorter read.
        let got = scoop.readahead(&mut io, 2).unwrap().unwrap().to_vec();
        assert_eq!(got, b"ab");
    }

    #[test]
    fn test_growth_preserves_content() {
        let mut scoop = Scoop::new();
        let mut out: [u8; 0] = [];
        let big: Vec<u8> = (0..200u8).collect();
        let mut io = Buffers::new(&big[..100], false, &mut out);
        assert!(scoop.readahead(&mut io, 200).unwrap().is_none());
        let mut io = Buffers::new(&big[100..], false, &mut out);
        let got = scoop.readahead(&mut io, 200).unwrap().unwrap().to_vec();
        assert_eq!(got, big);
    }
}
