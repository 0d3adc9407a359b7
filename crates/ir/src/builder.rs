//! Kernel module construction and tuning-attribute storage.

use crate::dialect::{
    ConvShape, DataType, GemmShape, InitValue, PrefillArg, WorkloadKind,
};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One tunable kernel: a workload description plus the attributes the tuning
/// core attaches once a configuration is chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelModule {
    kind: WorkloadKind,
    elem_type_a: DataType,
    elem_type_b: DataType,
    arch: String,
    num_cu: i64,
    attrs: TuningAttrs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuningAttrs {
    pub perf_config: Option<String>,
    pub block_size: Option<i64>,
    pub grid_size: Option<i64>,
    pub prefill: Vec<PrefillArg>,
}

impl KernelModule {
    pub fn builder<A: Into<String>>(arch: A, num_cu: i64) -> ModuleBuilder {
        ModuleBuilder::new(arch, num_cu)
    }

    pub fn kind(&self) -> &WorkloadKind {
        &self.kind
    }

    pub fn elem_type_a(&self) -> DataType {
        self.elem_type_a
    }

    pub fn elem_type_b(&self) -> DataType {
        self.elem_type_b
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn num_cu(&self) -> i64 {
        self.num_cu
    }

    /// Logical GEMM dims of the workload; convolutions are normalized through
    /// their implicit-GEMM view.
    pub fn gemm_shape(&self) -> GemmShape {
        match &self.kind {
            WorkloadKind::Gemm { shape, .. } => *shape,
            WorkloadKind::Conv(conv) => conv.to_gemm_shape(),
        }
    }

    /// Canonical tuning signature. Two modules with equal signatures are
    /// interchangeable for tuning, so this doubles as the performance-table
    /// key. Tab-separated: arch, CU count, then the problem text.
    pub fn signature(&self) -> String {
        let mut key = format!("{}\t{}\t", self.arch, self.num_cu);
        match &self.kind {
            WorkloadKind::Gemm {
                shape,
                trans_a,
                trans_b,
            } => {
                let _ = write!(
                    key,
                    "gemm -g {} -m {} -n {} -k {} -transA {} -transB {} -a {} -b {}",
                    shape.g,
                    shape.m,
                    shape.n,
                    shape.k,
                    trans_a,
                    trans_b,
                    self.elem_type_a.as_str(),
                    self.elem_type_b.as_str()
                );
            }
            WorkloadKind::Conv(conv) => {
                let _ = write!(
                    key,
                    "conv -f {} -n {} -c {} -H {} -W {} -k {} -y {} -x {} \
                     -p {} -q {} -u {} -v {} -l {} -j {} -g {} -a {} -b {}",
                    conv.layout.as_str(),
                    conv.n,
                    conv.c,
                    conv.hi,
                    conv.wi,
                    conv.k,
                    conv.y,
                    conv.x,
                    conv.pad_h,
                    conv.pad_w,
                    conv.stride_h,
                    conv.stride_w,
                    conv.dilation_h,
                    conv.dilation_w,
                    conv.group,
                    self.elem_type_a.as_str(),
                    self.elem_type_b.as_str()
                );
            }
        }
        key
    }

    pub fn attrs(&self) -> &TuningAttrs {
        &self.attrs
    }

    pub fn perf_config(&self) -> Option<&str> {
        self.attrs.perf_config.as_deref()
    }

    pub fn prefill_args(&self) -> &[PrefillArg] {
        &self.attrs.prefill
    }

    /// Drops any previously attached configuration. Applying a candidate
    /// always starts from a clean slate so stale launch dims or prefill
    /// records cannot leak across configurations.
    pub fn reset_tuning_attrs(&mut self) {
        self.attrs = TuningAttrs::default();
    }

    pub fn set_perf_config<S: Into<String>>(&mut self, perf_config: S) {
        self.attrs.perf_config = Some(perf_config.into());
    }

    pub fn set_launch_dims(&mut self, block_size: i64, grid_size: i64) {
        self.attrs.block_size = Some(block_size);
        self.attrs.grid_size = Some(grid_size);
    }

    /// Records a launch argument that needs a deterministic initial value.
    /// Re-registering the same argument replaces the previous record.
    pub fn add_prefill_arg(&mut self, arg_index: usize, init: InitValue) {
        if let Some(existing) = self
            .attrs
            .prefill
            .iter_mut()
            .find(|arg| arg.arg_index == arg_index)
        {
            existing.init = init;
            return;
        }
        self.attrs.prefill.push(PrefillArg { arg_index, init });
    }
}

#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    arch: String,
    num_cu: i64,
    elem_type_a: DataType,
    elem_type_b: DataType,
    kind: Option<WorkloadKind>,
}

impl ModuleBuilder {
    pub fn new<A: Into<String>>(arch: A, num_cu: i64) -> Self {
        Self {
            arch: arch.into(),
            num_cu,
            elem_type_a: DataType::F16,
            elem_type_b: DataType::F16,
            kind: None,
        }
    }

    pub fn element_types(mut self, a: DataType, b: DataType) -> Self {
        self.elem_type_a = a;
        self.elem_type_b = b;
        self
    }

    pub fn gemm(mut self, shape: GemmShape) -> Self {
        self.kind = Some(WorkloadKind::Gemm {
            shape,
            trans_a: false,
            trans_b: false,
        });
        self
    }

    pub fn gemm_transposed(mut self, shape: GemmShape, trans_a: bool, trans_b: bool) -> Self {
        self.kind = Some(WorkloadKind::Gemm {
            shape,
            trans_a,
            trans_b,
        });
        self
    }

    pub fn conv(mut self, shape: ConvShape) -> Self {
        self.kind = Some(WorkloadKind::Conv(shape));
        self
    }

    pub fn build(self) -> Result<KernelModule> {
        let Some(kind) = self.kind else {
            bail!("module has no workload; call gemm() or conv() before build()");
        };
        Ok(KernelModule {
            kind,
            elem_type_a: self.elem_type_a,
            elem_type_b: self.elem_type_b,
            arch: self.arch,
            num_cu: self.num_cu,
            attrs: TuningAttrs::default(),
        })
    }
}
