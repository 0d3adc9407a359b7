//! Error taxonomy for the tuning core.
//!
//! Every variant is a recoverable negative result the caller is expected to
//! handle; none should abort a compilation on its own.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuningError {
    /// The configuration cannot drive this workload. Callers try another
    /// candidate or another lowering strategy.
    #[error("configuration unsupported for this workload: {0}")]
    Unsupported(String),

    /// A perf-config string the serializer never produced.
    #[error("malformed perf config `{input}`: {reason}")]
    Parse { input: String, reason: String },

    /// Positional index past the end of a tuning space.
    #[error("position {pos} out of range for a tuning space of {count} candidates")]
    OutOfRange { pos: usize, count: usize },

    /// No tuning-table entry for the workload signature.
    #[error("no tuning entry for `{signature}`")]
    NotFound { signature: String },

    /// A caller-supplied buffer was too small for the canonical encoding.
    /// Carries the true length so the caller can retry.
    #[error("encoding needs {needed} bytes but the buffer holds {capacity}")]
    Truncated { needed: usize, capacity: usize },
}

impl From<waveforge_insn::Unsupported> for TuningError {
    fn from(err: waveforge_insn::Unsupported) -> Self {
        TuningError::Unsupported(err.to_string())
    }
}
