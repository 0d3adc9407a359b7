//! Launcher boundary helpers.
//!
//! External drivers talk to the tuning core through fixed-capacity buffers
//! and caller-declared arrays. Every helper here writes at most the caller's
//! capacity and reports the true length, so a too-small buffer is a retry,
//! never an overrun.

use crate::errors::TuningError;
use crate::perf_config::PerfConfig;
use waveforge_ir::{InitValue, KernelModule};

/// Copies `src` into `buf`, truncating if needed. Always returns the true
/// length of `src`; the caller compares it against the capacity it passed
/// and reallocates when the result is larger.
pub fn copy_str_into(src: &str, buf: &mut [u8]) -> usize {
    let n = src.len().min(buf.len());
    buf[..n].copy_from_slice(&src.as_bytes()[..n]);
    src.len()
}

/// `copy_str_into` with truncation surfaced as an error carrying the true
/// length.
pub fn copy_str_checked(src: &str, buf: &mut [u8]) -> Result<usize, TuningError> {
    let needed = copy_str_into(src, buf);
    if needed > buf.len() {
        return Err(TuningError::Truncated {
            needed,
            capacity: buf.len(),
        });
    }
    Ok(needed)
}

/// Writes the canonical perf-config string into `buf`; returns its true
/// length.
pub fn perf_config_into(config: &PerfConfig, buf: &mut [u8]) -> usize {
    copy_str_into(&config.to_perf_str(), buf)
}

/// Writes the workload's tuning signature into `buf`; returns its true
/// length.
pub fn tuning_key_into(module: &KernelModule, buf: &mut [u8]) -> usize {
    copy_str_into(&module.signature(), buf)
}

/// Number of launch arguments needing a deterministic initial value.
pub fn num_prefill_args(module: &KernelModule) -> usize {
    module.prefill_args().len()
}

/// Fills `(index, initial value)` pairs into the caller's arrays, writing at
/// most the shorter declared length. Returns the number of entries written;
/// call `num_prefill_args` first to size the arrays.
pub fn prefill_args_into(
    module: &KernelModule,
    indices: &mut [usize],
    init_values: &mut [InitValue],
) -> usize {
    let args = module.prefill_args();
    let len = args.len().min(indices.len()).min(init_values.len());
    for (slot, arg) in indices.iter_mut().zip(args).take(len) {
        *slot = arg.arg_index;
    }
    for (slot, arg) in init_values.iter_mut().zip(args).take(len) {
        *slot = arg.init;
    }
    len
}

/// Auxiliary workspace buffers required by the current lowering: none.
pub fn num_aux_buffers(_module: &KernelModule) -> usize {
    0
}

/// Counterpart of `prefill_args_into` for auxiliary buffers; writes nothing
/// while `num_aux_buffers` reports zero.
pub fn aux_buffers_into(
    _module: &KernelModule,
    _sizes: &mut [usize],
    _init_values: &mut [InitValue],
) -> usize {
    0
}
