//! Search-steering classifiers consulted during lowering and tuning.

use crate::perf_config::PerfConfig;
use crate::space::TuningEffort;
use serde::{Deserialize, Serialize};
use tracing::debug;
use waveforge_ir::KernelModule;

/// How likely a split-k configuration is to beat the best non-split one.
/// Ordered: callers may use it to prioritize which candidates to benchmark
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SplitKLikelihood {
    Never,
    Maybe,
    Always,
}

/// Cost-model thresholds behind the non-Quick split-k decision. The numbers
/// are calibration data, not contract; swap in measured values per target.
#[derive(Debug, Clone, Copy)]
pub struct SplitKPolicy {
    /// Macro tile assumed when counting how many workgroups a problem yields.
    pub macro_tile: i64,
    /// K extent below which splitting the reduction cannot amortize the
    /// extra output traffic.
    pub min_k: i64,
    /// Under-utilization ratio past which split-k is expected to win outright.
    pub starvation_factor: i64,
}

impl Default for SplitKPolicy {
    fn default() -> Self {
        Self {
            macro_tile: 128,
            min_k: 1024,
            starvation_factor: 4,
        }
    }
}

impl SplitKPolicy {
    pub fn classify(&self, g: i64, m: i64, n: i64, k: i64, num_cus: i64) -> SplitKLikelihood {
        let tiles = g * div_ceil(m, self.macro_tile) * div_ceil(n, self.macro_tile);
        if k < self.min_k || tiles >= num_cus {
            return SplitKLikelihood::Never;
        }
        let likelihood = if tiles.saturating_mul(self.starvation_factor) <= num_cus {
            SplitKLikelihood::Always
        } else {
            SplitKLikelihood::Maybe
        };
        debug!(g, m, n, k, num_cus, tiles, ?likelihood, "split-k classification");
        likelihood
    }
}

/// Classifies whether splitting the reduction across extra workgroups is
/// worth trying for this problem.
///
/// Quick spaces never contain split-k candidates, so at Quick effort the
/// answer is `Never` regardless of the dimensions. Remove that short-circuit
/// only together with lifting the restriction in the space generator.
pub fn split_k_likelihood(
    g: i64,
    m: i64,
    n: i64,
    k: i64,
    num_cus: i64,
    effort: TuningEffort,
) -> SplitKLikelihood {
    if effort == TuningEffort::Quick {
        return SplitKLikelihood::Never;
    }
    SplitKPolicy::default().classify(g, m, n, k, num_cus)
}

/// Shared-memory ceiling a candidate may claim while still leaving room for
/// the tiles of operations fused around it.
pub const FUSION_LDS_BUDGET: i64 = 32 * 1024;

/// True iff applying `perf_config` to the workload leaves it compatible with
/// fusion into a surrounding operation chain. Pure: operates on a scratch
/// clone, the module is never touched.
pub fn is_fusible(module: &KernelModule, perf_config: &str) -> bool {
    let Ok(config) = PerfConfig::from_perf_str(perf_config) else {
        return false;
    };
    // Split-k writes partial results with atomics; fused consumers would
    // observe them mid-reduction.
    if config.split_k_factor > 1 {
        return false;
    }
    if config.lds_bytes(module.elem_type_a()) > FUSION_LDS_BUDGET {
        return false;
    }
    let mut scratch = module.clone();
    config.apply(&mut scratch).is_ok()
}

fn div_ceil(value: i64, divisor: i64) -> i64 {
    (value + divisor - 1) / divisor
}
