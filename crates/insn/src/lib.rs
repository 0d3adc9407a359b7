//! Matrix-instruction selection for waveforge code generation.
//!
//! Given operand element types and a per-wave output tile, picks the WMMA
//! instruction that implements the inner product and describes how often it
//! repeats to cover the tile. Selection is pure; descriptors are recomputed
//! per query and never cached here.

pub mod wmma;

pub use wmma::*;
