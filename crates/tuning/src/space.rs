//! Tuning-space generation.
//!
//! A tuning space is an ordered, immutable sequence of valid perf configs
//! for one workload. Generation is deterministic: the same module and effort
//! always produce the same candidates in the same order, so positional
//! indexes stay stable across processes tuning equivalent problems.

use crate::errors::TuningError;
use crate::heuristics::{split_k_likelihood, SplitKLikelihood};
use crate::perf_config::PerfConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use waveforge_ir::KernelModule;

/// How exhaustively to enumerate. Each level is a superset of the one below
/// it, so the candidate count never shrinks as effort grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TuningEffort {
    Quick,
    Full,
    Exhaustive,
}

/// Immutable candidate sequence for one workload.
#[derive(Debug, Clone)]
pub struct TuningSpace {
    signature: String,
    effort: TuningEffort,
    candidates: Vec<PerfConfig>,
}

impl TuningSpace {
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn effort(&self) -> TuningEffort {
        self.effort
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidate at `pos`. Out-of-range positions are a recoverable error,
    /// not undefined data: external drivers index spaces by position.
    pub fn get(&self, pos: usize) -> Result<&PerfConfig, TuningError> {
        self.candidates.get(pos).ok_or(TuningError::OutOfRange {
            pos,
            count: self.candidates.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &PerfConfig> {
        self.candidates.iter()
    }
}

const fn seed(
    m_per_block: i64,
    n_per_block: i64,
    k_per_block: i64,
    m_per_wave: i64,
    n_per_wave: i64,
    kpack: i64,
) -> PerfConfig {
    PerfConfig {
        block_size: (m_per_block / m_per_wave) * (n_per_block / n_per_wave) * 32,
        m_per_block,
        n_per_block,
        k_per_block,
        m_per_wave,
        n_per_wave,
        kpack,
        split_k_factor: 1,
        force_unroll: true,
    }
}

/// Hand-picked configs that win often enough to be worth trying first.
/// Quick tuning benchmarks only these; higher efforts keep them at the
/// front of the sequence. No split-k here, by construction.
const QUICK_SEEDS: [PerfConfig; 8] = [
    seed(64, 64, 8, 32, 32, 8),
    seed(128, 128, 8, 64, 32, 8),
    seed(128, 64, 16, 64, 32, 4),
    seed(32, 32, 16, 16, 16, 4),
    seed(64, 64, 4, 32, 32, 4),
    seed(128, 128, 16, 64, 64, 2),
    seed(256, 128, 8, 64, 64, 4),
    seed(64, 32, 16, 32, 16, 8),
];

/// Knob ranges swept by the Full grid.
const FULL_M_PER_BLOCK: [i64; 4] = [32, 64, 128, 256];
const FULL_N_PER_BLOCK: [i64; 4] = [32, 64, 128, 256];
const FULL_K_PER_BLOCK: [i64; 3] = [4, 8, 16];
const FULL_WAVE_TILES: [i64; 3] = [16, 32, 64];
const FULL_KPACK: [i64; 2] = [4, 8];

/// Extra ranges only Exhaustive sweeps.
const EXHAUSTIVE_K_PER_BLOCK: [i64; 5] = [2, 4, 8, 16, 32];
const EXHAUSTIVE_KPACK: [i64; 4] = [1, 2, 8, 16];

/// Largest workgroup the grids will emit.
const MAX_BLOCK_SIZE: i64 = 256;

/// Enumerates the valid configs for this workload at the requested effort.
pub fn create_tuning_space(module: &KernelModule, effort: TuningEffort) -> TuningSpace {
    let mut candidates: Vec<PerfConfig> = Vec::new();
    let mut seen: HashSet<PerfConfig> = HashSet::new();

    let mut extend = |batch: Vec<PerfConfig>, candidates: &mut Vec<PerfConfig>| {
        for config in batch {
            if seen.insert(config) {
                candidates.push(config);
            }
        }
    };

    extend(filter_valid(module, QUICK_SEEDS.to_vec()), &mut candidates);

    if effort >= TuningEffort::Full {
        let splits = split_k_values(module, effort);
        let grid = build_grid(
            &FULL_M_PER_BLOCK,
            &FULL_N_PER_BLOCK,
            &FULL_K_PER_BLOCK,
            &FULL_WAVE_TILES,
            &FULL_KPACK,
            &splits,
            &[true],
        );
        extend(filter_valid(module, grid), &mut candidates);

        if effort == TuningEffort::Exhaustive {
            let grid = build_grid(
                &FULL_M_PER_BLOCK,
                &FULL_N_PER_BLOCK,
                &EXHAUSTIVE_K_PER_BLOCK,
                &FULL_WAVE_TILES,
                &EXHAUSTIVE_KPACK,
                &splits,
                &[true, false],
            );
            extend(filter_valid(module, grid), &mut candidates);
        }
    }

    debug!(
        signature = %module.signature(),
        ?effort,
        count = candidates.len(),
        "generated tuning space"
    );

    TuningSpace {
        signature: module.signature(),
        effort,
        candidates,
    }
}

/// Split-k values offered at this effort. Quick never offers any (the
/// likelihood classifier short-circuits to Never for the same reason), and
/// higher efforts only sweep them when the classifier sees room.
fn split_k_values(module: &KernelModule, effort: TuningEffort) -> Vec<i64> {
    let shape = module.gemm_shape();
    match split_k_likelihood(shape.g, shape.m, shape.n, shape.k, module.num_cu(), effort) {
        SplitKLikelihood::Never => vec![1],
        SplitKLikelihood::Maybe | SplitKLikelihood::Always => vec![1, 2, 4],
    }
}

/// Nested sweep in fixed knob order; the ordering is part of the contract.
fn build_grid(
    m_blocks: &[i64],
    n_blocks: &[i64],
    k_blocks: &[i64],
    wave_tiles: &[i64],
    kpacks: &[i64],
    splits: &[i64],
    unrolls: &[bool],
) -> Vec<PerfConfig> {
    let mut grid = Vec::new();
    for &m_per_block in m_blocks {
        for &n_per_block in n_blocks {
            for &k_per_block in k_blocks {
                for &m_per_wave in wave_tiles {
                    for &n_per_wave in wave_tiles {
                        if m_per_block % m_per_wave != 0 || n_per_block % n_per_wave != 0 {
                            continue;
                        }
                        let block_size =
                            (m_per_block / m_per_wave) * (n_per_block / n_per_wave) * 32;
                        if block_size > MAX_BLOCK_SIZE {
                            continue;
                        }
                        for &kpack in kpacks {
                            for &split_k_factor in splits {
                                for &force_unroll in unrolls {
                                    grid.push(PerfConfig {
                                        block_size,
                                        m_per_block,
                                        n_per_block,
                                        k_per_block,
                                        m_per_wave,
                                        n_per_wave,
                                        kpack,
                                        split_k_factor,
                                        force_unroll,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    grid
}

/// Drops candidates the workload cannot run. Parallel filter; rayon keeps
/// the input order, so determinism is preserved.
fn filter_valid(module: &KernelModule, grid: Vec<PerfConfig>) -> Vec<PerfConfig> {
    grid.into_par_iter()
        .filter(|config| config.validate_for(module).is_ok())
        .collect()
}
