//! Streaming delta encoding with rolling-checksum block matching.
//!
//! Three operations over byte streams: **sign** summarizes a basis into a
//! compact signature, **delta** matches a target against a signature and
//! encodes the difference as COPY/LITERAL commands, and **patch** replays a
//! delta against the basis to reconstruct the target. A fourth job,
//! **loadsig**, parses a signature stream back into matchable form.
//!
//! Every operation is an incremental, caller-driven state machine: the
//! caller owns the I/O and hands each job an input window and an output
//! window of any size per step. Jobs never retain pointers into caller
//! buffers between steps and never perform I/O themselves.
//!
//! ```
//! use deltastream::{Buffers, DeltaJob, LoadSigJob, PatchJob, SigMagic, SignJob};
//!
//! let basis = b"the quick brown fox jumps over the lazy dog";
//! let target = b"the quick brown cat jumps over the lazy dog";
//!
//! // Sign the basis.
//! let mut sign = SignJob::new(SigMagic::Blake2, 8, 0).unwrap();
//! let mut sig_bytes = Vec::new();
//! sign.drive(basis, &mut sig_bytes).unwrap();
//!
//! // Load the signature and index it.
//! let mut load = LoadSigJob::new();
//! let mut sink = Vec::new();
//! load.drive(&sig_bytes, &mut sink).unwrap();
//! let mut sig = load.into_signature().unwrap();
//! sig.build_hash_table().unwrap();
//!
//! // Delta, then patch.
//! let mut delta = DeltaJob::new(Some(&sig)).unwrap();
//! let mut delta_bytes = Vec::new();
//! delta.drive(target, &mut delta_bytes).unwrap();
//!
//! let mut patch = PatchJob::new(&basis[..]);
//! let mut result = Vec::new();
//! patch.drive(&delta_bytes, &mut result).unwrap();
//! assert_eq!(result, target);
//! ```

pub mod buf;
pub mod error;
pub mod job;
pub mod signature;
pub mod stats;
pub mod sums;

pub(crate) mod stream;
pub(crate) mod wire;

pub use buf::Buffers;
pub use error::{JobError, Result};
pub use job::{Basis, DeltaJob, Fetch, Job, LoadSigJob, PatchJob, SignJob, Status};
pub use signature::{
    BlockSig, SigMagic, Signature, DEFAULT_BLOCK_LEN, DELTA_MAGIC, MAX_STRONG_LEN,
};
pub use stats::JobStats;
