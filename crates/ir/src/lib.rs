//! Program representation for waveforge kernels.
//!
//! The tuning core treats a kernel as an opaque module it can query for
//! shape/type metadata and patch with the configuration it settles on.
//! This crate is that module: workload descriptions (GEMM and implicit-GEMM
//! convolution), canonical tuning signatures, and the attribute storage the
//! launcher reads back.

pub mod builder;
pub mod dialect;

pub use builder::*;
pub use dialect::*;
