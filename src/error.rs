use thiserror::Error;

/// Terminal failure of a streaming job.
///
/// Errors are sticky: once a job has returned one, every further call to
/// `iter` reports it again (after any already-produced output has drained).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unexpected end of input")]
    InputEnded,

    #[error("corrupt stream: {0}")]
    Corrupt(&'static str),

    #[error("out of memory allocating {0}")]
    Mem(&'static str),

    #[error("invalid parameter: {0}")]
    Param(&'static str),

    #[error("internal error: {0}")]
    Internal(&'static str),

    #[error("unimplemented command {0:#04x}")]
    Unimplemented(u8),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, JobError>;

impl JobError {
    /// Process exit code for this error, for drivers that shell out.
    pub fn exit_code(&self) -> i32 {
        match self {
            JobError::Io(_) => 100,
            JobError::Mem(_) => 102,
            JobError::InputEnded => 103,
            JobError::BadMagic(_) => 104,
            JobError::Unimplemented(_) => 105,
            JobError::Corrupt(_) => 106,
            JobError::Internal(_) => 107,
            JobError::Param(_) => 108,
        }
    }
}
