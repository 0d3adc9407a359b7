//! WMMA instruction group descriptors.

use thiserror::Error;
use tracing::debug;
use waveforge_ir::DataType;

/// Wave width the WMMA instruction family schedules on.
pub const WMMA_WAVE_SIZE: i64 = 32;

/// Selection failed for the given operands. A legitimate negative result:
/// callers fall back to another lowering strategy or fail the compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no wmma instruction for the requested operands: {0}")]
pub struct Unsupported(pub &'static str);

/// Element count and type of one instruction operand or result register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorSpec {
    pub len: i64,
    pub elem: DataType,
}

/// How one WMMA instruction covers a per-wave output tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WmmaInsn {
    /// Concrete instruction mnemonic the lowering emits.
    pub insn: &'static str,
    /// Side length of the base instruction tile (inputLen x inputLen).
    pub input_len: i64,
    /// Result vector length per lane.
    pub out_len: i64,
    /// Stride between consecutive result elements in the destination register.
    pub out_stride: i64,
    /// Instruction repetitions along the M axis of the wave tile.
    pub m_repeats: i64,
    /// Instruction repetitions along the N axis of the wave tile.
    pub n_repeats: i64,
    pub arg_type_a: VectorSpec,
    pub arg_type_b: VectorSpec,
    pub ret_type: VectorSpec,
}

fn accumulator_type(input: DataType) -> DataType {
    if input == DataType::I8 {
        return DataType::I32;
    }
    DataType::F32
}

impl WmmaInsn {
    /// Picks the WMMA instruction implementing one (m_per_wave x n_per_wave)
    /// tile for matching operand element types. Partial-tile coverage is not
    /// supported: both tile extents must be exact multiples of the base
    /// instruction tile.
    pub fn select(
        elem_type_a: DataType,
        elem_type_b: DataType,
        wave_size: i64,
        m_per_wave: i64,
        n_per_wave: i64,
    ) -> Result<WmmaInsn, Unsupported> {
        debug!(
            elem_type_a = elem_type_a.as_str(),
            elem_type_b = elem_type_b.as_str(),
            m_per_wave,
            n_per_wave,
            "wmma group selection"
        );

        if elem_type_a != elem_type_b {
            return Err(Unsupported("operand element types differ"));
        }
        if wave_size != WMMA_WAVE_SIZE {
            return Err(Unsupported("wave size not supported by the wmma family"));
        }

        let input_len = 16;
        let out_len = 8;
        let out_stride = 2;

        if m_per_wave % input_len != 0 {
            return Err(Unsupported("m_per_wave is not a multiple of the instruction tile"));
        }
        if n_per_wave % input_len != 0 {
            return Err(Unsupported("n_per_wave is not a multiple of the instruction tile"));
        }

        let m_repeats = m_per_wave / input_len;
        let n_repeats = n_per_wave / input_len;

        let insn = match elem_type_a {
            DataType::F16 => "rocdl.wmma.f32.16x16x16.f16",
            DataType::BF16 => "rocdl.wmma.f32.16x16x16.bf16",
            DataType::I8 => "rocdl.wmma.i32.16x16x16.iu8",
            _ => return Err(Unsupported("element type has no wmma encoding")),
        };

        Ok(WmmaInsn {
            insn,
            input_len,
            out_len,
            out_stride,
            m_repeats,
            n_repeats,
            arg_type_a: VectorSpec {
                len: input_len,
                elem: elem_type_a,
            },
            arg_type_b: VectorSpec {
                len: input_len,
                elem: elem_type_b,
            },
            ret_type: VectorSpec {
                len: out_len,
                elem: accumulator_type(elem_type_a),
            },
        })
    }

    /// True iff the K-dimension blocking covers at least one instruction's
    /// minimum K extent. Candidates that slice K finer than `input_len`
    /// cannot feed the instruction and must be rejected.
    pub fn is_coherent_with_k(&self, kpack: i64, k_per_block: i64) -> bool {
        if k_per_block * kpack < self.input_len {
            debug!(
                kpack,
                k_per_block,
                input_len = self.input_len,
                "k blocking below the instruction minimum"
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_mismatched_operand_types() {
        let result = WmmaInsn::select(DataType::F16, DataType::BF16, 32, 64, 64);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_wrong_wave_size() {
        let result = WmmaInsn::select(DataType::F16, DataType::F16, 64, 64, 64);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_partial_tiles() {
        let result = WmmaInsn::select(DataType::F16, DataType::F16, 32, 24, 16);
        assert!(result.is_err());
        let result = WmmaInsn::select(DataType::F16, DataType::F16, 32, 16, 24);
        assert!(result.is_err());
    }

    #[test]
    fn test_repeat_factors() {
        let insn = WmmaInsn::select(DataType::F16, DataType::F16, 32, 32, 16).unwrap();
        assert_eq!(insn.m_repeats, 2);
        assert_eq!(insn.n_repeats, 1);
        assert_eq!(insn.input_len, 16);
        assert_eq!(insn.out_len, 8);
        assert_eq!(insn.out_stride, 2);
    }

    #[test]
    fn test_instruction_per_element_type() {
        let f16 = WmmaInsn::select(DataType::F16, DataType::F16, 32, 16, 16).unwrap();
        assert_eq!(f16.insn, "rocdl.wmma.f32.16x16x16.f16");
        assert_eq!(f16.ret_type.elem, DataType::F32);

        let bf16 = WmmaInsn::select(DataType::BF16, DataType::BF16, 32, 16, 16).unwrap();
        assert_eq!(bf16.insn, "rocdl.wmma.f32.16x16x16.bf16");

        let i8 = WmmaInsn::select(DataType::I8, DataType::I8, 32, 16, 16).unwrap();
        assert_eq!(i8.insn, "rocdl.wmma.i32.16x16x16.iu8");
        assert_eq!(i8.ret_type.elem, DataType::I32);

        assert!(WmmaInsn::select(DataType::F32, DataType::F32, 32, 16, 16).is_err());
    }

    #[test]
    fn test_k_coherency_boundary() {
        let insn = WmmaInsn::select(DataType::F16, DataType::F16, 32, 16, 16).unwrap();
        // 2 * 4 = 8 < 16
        assert!(!insn.is_coherent_with_k(2, 4));
        // exactly the instruction minimum
        assert!(insn.is_coherent_with_k(4, 4));
        // one short of the minimum
        assert!(!insn.is_coherent_with_k(3, 5));
        assert!(insn.is_coherent_with_k(8, 8));
    }
}
