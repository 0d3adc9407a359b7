//! Concurrent best-result table keyed by workload signature.

use crate::errors::TuningError;
use crate::perf_config::PerfConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;
use waveforge_ir::KernelModule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub perf_config: String,
    pub time_ms: f32,
}

/// Best measured config per workload signature. Lives as long as its owner
/// keeps it; construct one per tuning session and pass it by reference.
///
/// Updates take the write lock for the whole compare-and-replace, so two
/// racing updates on one signature serialize and only the smaller time
/// survives. Lookups never observe a half-written entry.
#[derive(Debug, Default)]
pub struct TuningTable {
    entries: RwLock<HashMap<String, TableEntry>>,
}

impl TuningTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records a measurement. Inserts if the signature is new; replaces only
    /// if `time_ms` is strictly smaller than the stored time. Returns whether
    /// the table changed. Non-finite or negative times are rejected.
    pub fn update(&self, signature: &str, perf_config: &str, time_ms: f32) -> bool {
        if !time_ms.is_finite() || time_ms < 0.0 {
            return false;
        }
        let mut entries = self.entries.write().unwrap();
        match entries.get_mut(signature) {
            Some(entry) if time_ms >= entry.time_ms => false,
            Some(entry) => {
                debug!(signature, perf_config, time_ms, prev = entry.time_ms, "replacing best");
                entry.perf_config = perf_config.to_string();
                entry.time_ms = time_ms;
                true
            }
            None => {
                entries.insert(
                    signature.to_string(),
                    TableEntry {
                        perf_config: perf_config.to_string(),
                        time_ms,
                    },
                );
                true
            }
        }
    }

    pub fn get(&self, signature: &str) -> Option<TableEntry> {
        self.entries.read().unwrap().get(signature).cloned()
    }

    /// Best known perf-config string for this workload.
    pub fn lookup(&self, module: &KernelModule) -> Result<String, TuningError> {
        let signature = module.signature();
        self.get(&signature)
            .map(|entry| entry.perf_config)
            .ok_or(TuningError::NotFound { signature })
    }

    /// Looks up the best config and writes it onto the module. Fails if the
    /// signature was never tuned or the stored config no longer applies.
    pub fn lookup_and_apply(&self, module: &mut KernelModule) -> Result<(), TuningError> {
        let perf_config = self.lookup(module)?;
        PerfConfig::from_perf_str(&perf_config)?.apply(module)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read(path)?;
        let entries: HashMap<String, TableEntry> = serde_json::from_slice(&data)?;
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot = self.entries.read().unwrap().clone();
        let blob = serde_json::to_vec_pretty(&snapshot)?;
        fs::write(path, blob)?;
        Ok(())
    }
}
