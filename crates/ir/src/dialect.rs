//! Workload and element-type definitions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    F32,
    F16,
    BF16,
    I8,
    I32,
}

impl DataType {
    pub fn element_size_bytes(&self) -> usize {
        match self {
            DataType::F32 | DataType::I32 => 4,
            DataType::F16 | DataType::BF16 => 2,
            DataType::I8 => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F16 => "f16",
            DataType::BF16 => "bf16",
            DataType::I8 => "i8",
            DataType::I32 => "i32",
        }
    }
}

/// Logical GEMM dimensions. Convolutions are normalized to this form before
/// tuning, so the whole candidate machinery only ever sees (g, m, n, k).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GemmShape {
    pub g: i64,
    pub m: i64,
    pub n: i64,
    pub k: i64,
}

impl GemmShape {
    pub fn new(g: i64, m: i64, n: i64, k: i64) -> Self {
        Self { g, m, n, k }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConvLayout {
    Nchw,
    Nhwc,
}

impl ConvLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvLayout::Nchw => "NCHW",
            ConvLayout::Nhwc => "NHWC",
        }
    }
}

/// Forward-convolution problem description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConvShape {
    /// Batch size.
    pub n: i64,
    /// Input channels.
    pub c: i64,
    /// Input spatial dims.
    pub hi: i64,
    pub wi: i64,
    /// Output channels (filter count).
    pub k: i64,
    /// Filter spatial dims.
    pub y: i64,
    pub x: i64,
    pub stride_h: i64,
    pub stride_w: i64,
    pub pad_h: i64,
    pub pad_w: i64,
    pub dilation_h: i64,
    pub dilation_w: i64,
    pub group: i64,
    pub layout: ConvLayout,
}

impl ConvShape {
    /// Output spatial dims for this convolution.
    pub fn output_dims(&self) -> (i64, i64) {
        let ho = (self.hi + 2 * self.pad_h - self.dilation_h * (self.y - 1) - 1) / self.stride_h + 1;
        let wo = (self.wi + 2 * self.pad_w - self.dilation_w * (self.x - 1) - 1) / self.stride_w + 1;
        (ho, wo)
    }

    /// Implicit-GEMM view of the convolution: output channels become rows,
    /// batch times output pixels become columns, and the filter window times
    /// input channels becomes the reduction.
    pub fn to_gemm_shape(&self) -> GemmShape {
        let (ho, wo) = self.output_dims();
        GemmShape {
            g: self.group,
            m: self.k / self.group,
            n: self.n * ho * wo,
            k: (self.c / self.group) * self.y * self.x,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    Gemm {
        shape: GemmShape,
        trans_a: bool,
        trans_b: bool,
    },
    Conv(ConvShape),
}

/// Initial value for a launch argument that must be prefilled before the
/// kernel runs (e.g. the output buffer under split-k accumulation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InitValue {
    I32(i32),
    F32(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrefillArg {
    pub arg_index: usize,
    pub init: InitValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv_output_dims() {
        let conv = ConvShape {
            n: 1,
            c: 64,
            hi: 56,
            wi: 56,
            k: 128,
            y: 3,
            x: 3,
            stride_h: 1,
            stride_w: 1,
            pad_h: 1,
            pad_w: 1,
            dilation_h: 1,
            dilation_w: 1,
            group: 1,
            layout: ConvLayout::Nchw,
        };
        assert_eq!(conv.output_dims(), (56, 56));
    }

    #[test]
    fn test_conv_implicit_gemm_shape() {
        let conv = ConvShape {
            n: 2,
            c: 64,
            hi: 28,
            wi: 28,
            k: 128,
            y: 1,
            x: 1,
            stride_h: 1,
            stride_w: 1,
            pad_h: 0,
            pad_w: 0,
            dilation_h: 1,
            dilation_w: 1,
            group: 1,
            layout: ConvLayout::Nhwc,
        };
        let gemm = conv.to_gemm_shape();
        assert_eq!(gemm, GemmShape::new(1, 128, 2 * 28 * 28, 64));
    }

    #[test]
    fn test_grouped_conv_splits_channels() {
        let conv = ConvShape {
            n: 1,
            c: 64,
            hi: 14,
            wi: 14,
            k: 64,
            y: 3,
            x: 3,
            stride_h: 1,
            stride_w: 1,
            pad_h: 1,
            pad_w: 1,
            dilation_h: 1,
            dilation_w: 1,
            group: 4,
            layout: ConvLayout::Nchw,
        };
        let gemm = conv.to_gemm_shape();
        assert_eq!(gemm.g, 4);
        assert_eq!(gemm.m, 16);
        assert_eq!(gemm.k, 16 * 9);
    }

    #[test]
    fn test_datatype_serialization() {
        let json = serde_json::to_string(&DataType::BF16).unwrap();
        let parsed: DataType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, DataType::BF16);
    }
}
