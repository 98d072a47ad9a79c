//! Per-job counters for the encoded command stream and buffer traffic.

use serde::Serialize;
use std::fmt;

/// Statistics accumulated while a job runs.
///
/// Counters cover the commands a delta job emits (or a patch job decodes),
/// the blocks a signature job hashes, and the raw bytes moved through the
/// caller's buffers. Serializable for export; `Display` gives the compact
/// one-line summary.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct JobStats {
    /// Operation name: "signature", "loadsig", "delta" or "patch".
    pub op: &'static str,
    pub lit_cmds: u64,
    pub lit_bytes: u64,
    /// Bytes spent on LITERAL command headers.
    pub lit_cmdbytes: u64,
    pub copy_cmds: u64,
    pub copy_bytes: u64,
    /// Bytes spent on COPY command headers.
    pub copy_cmdbytes: u64,
    /// Weak-sum hits whose strong sum did not confirm.
    pub false_matches: u64,
    pub sig_blocks: u64,
    pub block_len: u64,
    pub in_bytes: u64,
    pub out_bytes: u64,
}

impl Default for JobStats {
    fn default() -> Self {
        Self {
            op: "noop",
            lit_cmds: 0,
            lit_bytes: 0,
            lit_cmdbytes: 0,
            copy_cmds: 0,
            copy_bytes: 0,
            copy_cmdbytes: 0,
            false_matches: 0,
            sig_blocks: 0,
            block_len: 0,
            in_bytes: 0,
            out_bytes: 0,
        }
    }
}

impl JobStats {
    pub(crate) fn new(op: &'static str) -> Self {
        Self {
            op,
            ..Self::default()
        }
    }
}

impl fmt::Display for JobStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} statistics: ", self.op)?;
        if self.lit_cmds > 0 {
            write!(
                f,
                "literal[{} cmds, {} bytes, {} cmdbytes] ",
                self.lit_cmds, self.lit_bytes, self.lit_cmdbytes
            )?;
        }
        if self.copy_cmds > 0 || self.false_matches > 0 {
            write!(
                f,
                "copy[{} cmds, {} bytes, {} cmdbytes, {} false] ",
                self.copy_cmds, self.copy_bytes, self.copy_cmdbytes, self.false_matches
            )?;
        }
        if self.sig_blocks > 0 {
            write!(
                f,
                "signature[{} blocks, {} bytes per block] ",
                self.sig_blocks, self.block_len
            )?;
        }
        write!(f, "io[{} bytes in, {} bytes out]", self.in_bytes, self.out_bytes)
    }
}
