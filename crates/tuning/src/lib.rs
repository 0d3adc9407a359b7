//! Autotuning core for waveforge kernels.
//!
//! Enumerates candidate execution configurations for a workload, keeps the
//! best measured result per workload signature, and hosts the classifiers
//! code-generation passes consult while lowering. Benchmarking itself lives
//! with the driver; this crate only generates candidates and records times.

pub mod bridge;
pub mod errors;
pub mod heuristics;
pub mod perf_config;
pub mod space;
pub mod table;

pub use bridge::*;
pub use errors::*;
pub use heuristics::*;
pub use perf_config::*;
pub use space::*;
pub use table::*;
