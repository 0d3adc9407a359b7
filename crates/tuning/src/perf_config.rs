//! Perf configs: one serializable set of tuning knobs for a workload.

use crate::errors::TuningError;
use serde::{Deserialize, Serialize};
use tracing::debug;
use waveforge_insn::{WmmaInsn, WMMA_WAVE_SIZE};
use waveforge_ir::{DataType, InitValue, KernelModule};

/// Version tag of the canonical textual encoding. Bumped whenever the field
/// list changes, so stale cache entries parse-fail instead of misapplying.
pub const PERF_CONFIG_VERSION: &str = "v2";

/// Shared-memory budget one workgroup may claim.
pub const LDS_BYTE_BUDGET: i64 = 64 * 1024;

/// Largest value any integer knob may take. Far beyond any real tile size,
/// and small enough that every product derived from knobs stays within
/// `i64`.
const MAX_KNOB: i64 = 1 << 16;

/// Launch-argument index of the output buffer (A, B, C).
const OUTPUT_ARG_INDEX: usize = 2;

/// Tuning knobs for one kernel launch.
///
/// The canonical textual form (`to_perf_str`/`from_perf_str`) is what gets
/// hashed, cached, and exchanged across processes; the struct is what the
/// generator and validity checks operate on. The two stay in bijection:
/// `from_perf_str(to_perf_str(c)) == c` for every valid config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerfConfig {
    /// Threads per workgroup; always the wave count times the wave size.
    pub block_size: i64,
    pub m_per_block: i64,
    pub n_per_block: i64,
    pub k_per_block: i64,
    pub m_per_wave: i64,
    pub n_per_wave: i64,
    /// Elements packed per K-dimension vector load.
    pub kpack: i64,
    /// Reduction split factor; 1 means no split-k.
    pub split_k_factor: i64,
    pub force_unroll: bool,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            block_size: 128,
            m_per_block: 64,
            n_per_block: 64,
            k_per_block: 8,
            m_per_wave: 32,
            n_per_wave: 32,
            kpack: 4,
            split_k_factor: 1,
            force_unroll: true,
        }
    }
}

impl PerfConfig {
    /// Canonical textual encoding: `v2:` followed by the nine knobs in
    /// declaration order. Stable byte-for-byte per config.
    pub fn to_perf_str(&self) -> String {
        format!(
            "{}:{},{},{},{},{},{},{},{},{}",
            PERF_CONFIG_VERSION,
            self.block_size,
            self.m_per_block,
            self.n_per_block,
            self.k_per_block,
            self.m_per_wave,
            self.n_per_wave,
            self.kpack,
            self.split_k_factor,
            self.force_unroll as u8
        )
    }

    /// Parses a canonical perf-config string. Accepts exactly the strings
    /// `to_perf_str` produces; anything else is a `Parse` error and no
    /// partially-built config escapes.
    pub fn from_perf_str(input: &str) -> Result<Self, TuningError> {
        let parse_err = |reason: &str| TuningError::Parse {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = input.splitn(2, ':');
        let version = parts.next().unwrap_or_default();
        let body = parts.next().ok_or_else(|| parse_err("missing `:` separator"))?;
        if version != PERF_CONFIG_VERSION {
            return Err(parse_err("unknown perf config version"));
        }

        let fields: Vec<&str> = body.split(',').collect();
        if fields.len() != 9 {
            return Err(parse_err("expected nine comma-separated fields"));
        }

        let mut knobs = [0i64; 8];
        for (slot, field) in knobs.iter_mut().zip(&fields) {
            // Canonical spellings only: the serializer never emits a sign
            // or a leading zero.
            if field.starts_with('+') || (field.len() > 1 && field.starts_with('0')) {
                return Err(parse_err("knob is not in canonical form"));
            }
            *slot = field
                .parse::<i64>()
                .map_err(|_| parse_err("knob is not an integer"))?;
            if *slot <= 0 {
                return Err(parse_err("knobs must be positive"));
            }
            if *slot > MAX_KNOB {
                return Err(parse_err("knob exceeds the supported range"));
            }
        }
        let force_unroll = match fields[8] {
            "0" => false,
            "1" => true,
            _ => return Err(parse_err("unroll flag must be 0 or 1")),
        };

        Ok(Self {
            block_size: knobs[0],
            m_per_block: knobs[1],
            n_per_block: knobs[2],
            k_per_block: knobs[3],
            m_per_wave: knobs[4],
            n_per_wave: knobs[5],
            kpack: knobs[6],
            split_k_factor: knobs[7],
            force_unroll,
        })
    }

    /// Shared memory one workgroup needs for the A and B tiles.
    pub fn lds_bytes(&self, elem: DataType) -> i64 {
        (self.m_per_block + self.n_per_block)
            * self.k_per_block
            * self.kpack
            * elem.element_size_bytes() as i64
    }

    /// Checks the config against the workload: wave layout must tile the
    /// block, the WMMA selector must accept the wave tile, K blocking must
    /// meet the instruction's minimum K extent, and split-k must divide K.
    pub fn validate_for(&self, module: &KernelModule) -> Result<(), TuningError> {
        let shape = module.gemm_shape();

        // The fields are public, so a hand-built config with zero, negative,
        // or absurd knobs is ordinary external input. Reject it before any
        // of the divisions and products below.
        let knobs = [
            self.block_size,
            self.m_per_block,
            self.n_per_block,
            self.k_per_block,
            self.m_per_wave,
            self.n_per_wave,
            self.kpack,
            self.split_k_factor,
        ];
        if knobs.iter().any(|&knob| knob <= 0 || knob > MAX_KNOB) {
            return Err(TuningError::Unsupported(
                "knob outside the supported range".into(),
            ));
        }

        if self.m_per_block % self.m_per_wave != 0 || self.n_per_block % self.n_per_wave != 0 {
            return Err(TuningError::Unsupported(
                "block tile is not divisible into wave tiles".into(),
            ));
        }
        let waves = (self.m_per_block / self.m_per_wave) * (self.n_per_block / self.n_per_wave);
        if waves * WMMA_WAVE_SIZE != self.block_size {
            return Err(TuningError::Unsupported(
                "block size does not match the wave layout".into(),
            ));
        }

        let insn = WmmaInsn::select(
            module.elem_type_a(),
            module.elem_type_b(),
            WMMA_WAVE_SIZE,
            self.m_per_wave,
            self.n_per_wave,
        )?;
        if !insn.is_coherent_with_k(self.kpack, self.k_per_block) {
            return Err(TuningError::Unsupported(
                "k blocking below the instruction minimum".into(),
            ));
        }

        if self.lds_bytes(module.elem_type_a()) > LDS_BYTE_BUDGET {
            return Err(TuningError::Unsupported(
                "tile does not fit in shared memory".into(),
            ));
        }

        if self.split_k_factor > 1 && shape.k % self.split_k_factor != 0 {
            return Err(TuningError::Unsupported(
                "split-k factor does not divide the reduction".into(),
            ));
        }
        if shape.k / self.split_k_factor < self.k_per_block * self.kpack {
            return Err(TuningError::Unsupported(
                "reduction slice smaller than one k block".into(),
            ));
        }

        Ok(())
    }

    /// Writes the config onto the module so downstream code generation uses
    /// it: perf-config string, launch dims, and (under split-k) a prefill
    /// record that zero-fills the output buffer before accumulation.
    pub fn apply(&self, module: &mut KernelModule) -> Result<(), TuningError> {
        self.validate_for(module)?;

        let shape = module.gemm_shape();
        let grid_m = (shape.m + self.m_per_block - 1) / self.m_per_block;
        let grid_n = (shape.n + self.n_per_block - 1) / self.n_per_block;
        let grid_size = shape.g * grid_m * grid_n * self.split_k_factor;

        module.reset_tuning_attrs();
        module.set_perf_config(self.to_perf_str());
        module.set_launch_dims(self.block_size, grid_size);
        if self.split_k_factor > 1 {
            let init = if module.elem_type_a() == DataType::I8 {
                InitValue::I32(0)
            } else {
                InitValue::F32(0.0)
            };
            module.add_prefill_arg(OUTPUT_ARG_INDEX, init);
        }

        debug!(
            perf_config = %self.to_perf_str(),
            block_size = self.block_size,
            grid_size,
            "applied perf config"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waveforge_ir::GemmShape;

    fn module(dtype: DataType, k: i64) -> KernelModule {
        KernelModule::builder("gfx1100", 48)
            .element_types(dtype, dtype)
            .gemm(GemmShape::new(1, 1024, 1024, k))
            .build()
            .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let config = PerfConfig {
            block_size: 256,
            m_per_block: 128,
            n_per_block: 128,
            k_per_block: 8,
            m_per_wave: 64,
            n_per_wave: 32,
            kpack: 8,
            split_k_factor: 2,
            force_unroll: false,
        };
        let text = config.to_perf_str();
        assert_eq!(text, "v2:256,128,128,8,64,32,8,2,0");
        assert_eq!(PerfConfig::from_perf_str(&text).unwrap(), config);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for bad in [
            "",
            "v2",
            "v1:128,64,64,8,32,32,4,1,1",
            "v2:128,64,64,8,32,32,4,1",
            "v2:128,64,64,8,32,32,4,1,1,1",
            "v2:128,64,64,8,32,32,4,1,2",
            "v2:128,64,sixty,8,32,32,4,1,1",
            "v2:128,64,-64,8,32,32,4,1,1",
            "v2:128,64,0,8,32,32,4,1,1",
            "v2:+128,64,64,8,32,32,4,1,1",
            "v2:0128,64,64,8,32,32,4,1,1",
        ] {
            assert!(
                PerfConfig::from_perf_str(bad).is_err(),
                "accepted `{bad}`"
            );
        }
    }

    #[test]
    fn test_apply_attaches_launch_dims() {
        let mut m = module(DataType::F16, 512);
        let config = PerfConfig::default();
        config.apply(&mut m).unwrap();
        assert_eq!(m.perf_config(), Some(config.to_perf_str().as_str()));
        assert_eq!(m.attrs().block_size, Some(128));
        // 1024/64 * 1024/64 tiles
        assert_eq!(m.attrs().grid_size, Some(16 * 16));
        assert!(m.prefill_args().is_empty());
    }

    #[test]
    fn test_apply_split_k_records_prefill() {
        let mut m = module(DataType::F16, 512);
        let config = PerfConfig {
            split_k_factor: 4,
            ..Default::default()
        };
        config.apply(&mut m).unwrap();
        assert_eq!(m.attrs().grid_size, Some(16 * 16 * 4));
        assert_eq!(m.prefill_args().len(), 1);
        assert_eq!(m.prefill_args()[0].arg_index, 2);
        assert_eq!(m.prefill_args()[0].init, InitValue::F32(0.0));
    }

    #[test]
    fn test_apply_split_k_i8_prefills_i32_zero() {
        let mut m = module(DataType::I8, 512);
        let config = PerfConfig {
            split_k_factor: 2,
            ..Default::default()
        };
        config.apply(&mut m).unwrap();
        assert_eq!(m.prefill_args()[0].init, InitValue::I32(0));
    }

    #[test]
    fn test_parse_rejects_oversized_knobs() {
        // Grammar-valid, but the knobs could overflow every derived product.
        let huge = "v2:128,4611686018427387904,4611686018427387904,8,32,32,4,1,1";
        assert!(PerfConfig::from_perf_str(huge).is_err());
        let just_past = format!("v2:128,{},64,8,32,32,4,1,1", (1i64 << 16) + 1);
        assert!(PerfConfig::from_perf_str(&just_past).is_err());
    }

    #[test]
    fn test_validate_rejects_degenerate_knobs() {
        let m = module(DataType::F16, 512);
        // Hand-built configs are external input; zero or negative knobs must
        // come back as errors, not divide-by-zero panics.
        for config in [
            PerfConfig {
                m_per_wave: 0,
                ..Default::default()
            },
            PerfConfig {
                split_k_factor: 0,
                ..Default::default()
            },
            PerfConfig {
                k_per_block: -8,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                config.validate_for(&m),
                Err(TuningError::Unsupported(_))
            ));
        }
    }

    #[test]
    fn test_validate_rejects_oversized_knobs() {
        let m = module(DataType::F16, 512);
        let config = PerfConfig {
            m_per_block: 1 << 40,
            n_per_block: 1 << 40,
            ..Default::default()
        };
        assert!(matches!(
            config.validate_for(&m),
            Err(TuningError::Unsupported(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_wave_layout() {
        let m = module(DataType::F16, 512);
        let config = PerfConfig {
            m_per_wave: 48,
            ..Default::default()
        };
        assert!(config.validate_for(&m).is_err());

        let config = PerfConfig {
            block_size: 64,
            ..Default::default()
        };
        assert!(config.validate_for(&m).is_err());
    }

    #[test]
    fn test_validate_rejects_unsupported_element_type() {
        let m = module(DataType::F32, 512);
        assert!(PerfConfig::default().validate_for(&m).is_err());
    }

    #[test]
    fn test_validate_rejects_fine_k_blocking() {
        let m = module(DataType::F16, 512);
        let config = PerfConfig {
            k_per_block: 4,
            kpack: 2,
            ..Default::default()
        };
        assert!(config.validate_for(&m).is_err());
    }

    #[test]
    fn test_validate_rejects_indivisible_split_k() {
        let m = module(DataType::F16, 500);
        let config = PerfConfig {
            split_k_factor: 3,
            ..Default::default()
        };
        assert!(config.validate_for(&m).is_err());
    }
}
