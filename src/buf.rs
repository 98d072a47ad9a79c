//! Caller-owned buffer windows for one `iter` step.
//!
//! The caller hands a job an input window (plus an end-of-input flag) and an
//! output window for every step. The job consumes and produces as much as it
//! can and never keeps references into either window between steps; anything
//! it must remember is copied into its own scoop or tube.

/// Input and output windows for a single call to `Job::iter`.
pub struct Buffers<'i, 'o> {
    input: &'i [u8],
    in_pos: usize,
    eof_in: bool,
    output: &'o mut [u8],
    out_pos: usize,
}

impl<'i, 'o> Buffers<'i, 'o> {
    /// Wrap an input window and an output window.
    ///
    /// `eof_in` marks that no data will follow `input`; it must stay set on
    /// every subsequent call once given.
    pub fn new(input: &'i [u8], eof_in: bool, output: &'o mut [u8]) -> Self {
        Self {
            input,
            in_pos: 0,
            eof_in,
            output,
            out_pos: 0,
        }
    }

    /// Bytes of input the job consumed so far.
    pub fn consumed(&self) -> usize {
        self.in_pos
    }

    /// Bytes of output the job produced so far.
    pub fn produced(&self) -> usize {
        self.out_pos
    }

    pub(crate) fn eof_in(&self) -> bool {
        self.eof_in
    }

    pub(crate) fn avail_in(&self) -> usize {
        self.input.len() - self.in_pos
    }

    pub(crate) fn avail_out(&self) -> usize {
        self.output.len() - self.out_pos
    }

    pub(crate) fn remaining_in(&self) -> &'i [u8] {
        &self.input[self.in_pos..]
    }

    pub(crate) fn skip_in(&mut self, len: usize) {
        debug_assert!(len <= self.avail_in());
        self.in_pos += len;
    }

    /// Unwritten tail of the output window.
    pub(crate) fn out_space(&mut self) -> &mut [u8] {
        &mut self.output[self.out_pos..]
    }

    pub(crate) fn advance_out(&mut self, len: usize) {
        debug_assert!(len <= self.avail_out());
        self.out_pos += len;
    }

    /// Copy as much of `data` as fits into the output window.
    pub(crate) fn write_out(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(self.avail_out());
        self.output[self.out_pos..self.out_pos + len].copy_from_slice(&data[..len]);
        self.out_pos += len;
        len
    }

    /// Move up to `len` bytes straight from input to output.
    pub(crate) fn copy_through(&mut self, len: u64) -> usize {
        let len = (self.avail_in().min(self.avail_out()) as u64).min(len) as usize;
        self.output[self.out_pos..self.out_pos + len]
            .copy_from_slice(&self.input[self.in_pos..self.in_pos + len]);
        self.in_pos += len;
        self.out_pos += len;
        len
    }

    /// Output written since position `from`, used for running output digests.
    pub(crate) fn written_since(&self, from: usize) -> &[u8] {
        &self.output[from..self.out_pos]
    }
}
