//! The streaming job engine.
//!
//! A job is an incremental state machine the caller drives by repeatedly
//! handing it an input window and an output window. Each `iter` call drains
//! pending output, then runs the operation's state steps until it blocks on
//! one of the buffers, completes, or fails. Between calls the job holds no
//! references into caller memory.

mod delta;
mod loadsig;
mod patch;
mod sign;

pub use delta::{Delta, DeltaJob};
pub use loadsig::{LoadSig, LoadSigJob};
pub use patch::{Basis, Fetch, Patch, PatchJob};
pub use sign::{Sign, SignJob};

use md4::{Digest, Md4};

use crate::buf::Buffers;
use crate::error::{JobError, Result};
use crate::stats::JobStats;
use crate::stream::{Flush, Scoop, Tube};

/// Outcome of one `iter` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation finished and all output has been emitted.
    Done,
    /// Progress stopped: more input is needed, or the output window filled.
    Blocked,
}

/// What a state step asks the engine to do next.
#[doc(hidden)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Keep stepping within this `iter` call.
    Running,
    /// Suspend until the caller supplies fresh buffers.
    Blocked,
    /// The operation is complete; drain the tube and report `Done`.
    Finished,
}

/// Shared per-job machinery every operation steps against.
#[doc(hidden)]
pub struct JobCore {
    pub(crate) scoop: Scoop,
    pub(crate) tube: Tube,
    pub(crate) stats: JobStats,
    /// Set once the job reaches a terminal state; errors are replayed on
    /// every later call.
    done: Option<std::result::Result<(), JobError>>,
    /// Running digest over produced output, kept by patch jobs.
    out_digest: Option<Md4>,
}

impl JobCore {
    fn new(op: &'static str, with_out_digest: bool) -> Self {
        tracing::debug!(op, "start job");
        Self {
            scoop: Scoop::new(),
            tube: Tube::new(),
            stats: JobStats::new(op),
            done: None,
            out_digest: with_out_digest.then(Md4::new),
        }
    }
}

/// One streaming operation. The concrete state machine is supplied by the
/// type parameter; see [`SignJob`], [`LoadSigJob`], [`DeltaJob`] and
/// [`PatchJob`] for the constructors.
pub struct Job<S> {
    pub(crate) core: JobCore,
    pub(crate) op: S,
}

/// Internal seam between the engine and the per-operation state machines.
#[doc(hidden)]
pub trait Step {
    fn step(&mut self, core: &mut JobCore, io: &mut Buffers<'_, '_>) -> Result<StepResult>;
}

impl<S: Step> Job<S> {
    pub(crate) fn start(op_name: &'static str, op: S) -> Self {
        Self {
            core: JobCore::new(op_name, false),
            op,
        }
    }

    pub(crate) fn start_with_out_digest(op_name: &'static str, op: S) -> Self {
        Self {
            core: JobCore::new(op_name, true),
            op,
        }
    }

    /// Advance the job as far as the supplied buffers allow.
    ///
    /// Consumes from `io`'s input window and produces into its output
    /// window; inspect [`Buffers::consumed`] and [`Buffers::produced`]
    /// afterwards. Once a job has returned an error it will keep returning
    /// it (after draining any output already produced).
    pub fn iter(&mut self, io: &mut Buffers<'_, '_>) -> Result<Status> {
        let orig_in = io.avail_in();
        let orig_out = io.avail_out();
        let out_mark = io.produced();

        let result = self.work(io);

        if let Some(digest) = &mut self.core.out_digest {
            digest.update(io.written_since(out_mark));
        }
        self.core.stats.in_bytes += (orig_in - io.avail_in()) as u64;
        self.core.stats.out_bytes += (orig_out - io.avail_out()) as u64;

        // Progress watchdog: with both windows usable, a healthy state
        // machine must move at least one of them.
        if result.is_ok()
            && orig_in > 0
            && orig_out > 0
            && io.avail_in() == orig_in
            && io.avail_out() == orig_out
        {
            tracing::warn!(orig_in, orig_out, "job made no progress");
            return Err(JobError::Internal("job made no progress"));
        }

        result
    }

    fn work(&mut self, io: &mut Buffers<'_, '_>) -> Result<Status> {
        loop {
            match self.core.tube.catchup(&mut self.core.scoop, io) {
                Ok(Flush::Blocked) => return Ok(Status::Blocked),
                Ok(Flush::Idle) => {}
                Err(e) => return Err(self.complete(e)),
            }

            match &self.core.done {
                Some(Ok(())) => return Ok(Status::Done),
                Some(Err(e)) => return Err(e.clone()),
                None => {}
            }

            match self.op.step(&mut self.core, io) {
                Ok(StepResult::Running) => {}
                Ok(StepResult::Blocked) => return Ok(Status::Blocked),
                Ok(StepResult::Finished) => {
                    tracing::debug!(op = self.core.stats.op, "job complete");
                    self.core.done = Some(Ok(()));
                }
                Err(e) => return Err(self.complete(e)),
            }
        }
    }

    fn complete(&mut self, err: JobError) -> JobError {
        tracing::debug!(op = self.core.stats.op, error = %err, "job failed");
        self.core.done = Some(Err(err.clone()));
        err
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &JobStats {
        &self.core.stats
    }

    pub(crate) fn is_done(&self) -> bool {
        matches!(self.core.done, Some(Ok(())))
    }

    pub(crate) fn output_md4(&self) -> Option<[u8; 16]> {
        self.core
            .out_digest
            .as_ref()
            .map(|d| d.clone().finalize().into())
    }

    /// Run the job over an in-memory input, appending all output to `out`.
    ///
    /// The whole of `input` is offered with end-of-input set; the loop
    /// continues until the job reports `Done`. Requires an operation that
    /// can always progress given input and output space (a patch job's
    /// basis must not report `Blocked`).
    pub fn drive(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let mut consumed = 0;
        loop {
            let mut chunk = [0u8; 4096];
            let mut io = Buffers::new(&input[consumed..], true, &mut chunk);
            let status = self.iter(&mut io)?;
            consumed += io.consumed();
            let produced = io.produced();
            out.extend_from_slice(&chunk[..produced]);
            if status == Status::Done {
                return Ok(());
            }
        }
    }
}
