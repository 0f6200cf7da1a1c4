// Copyright 2025 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod compaction_config;
pub mod geometry;
mod hybrid;
pub mod picker;
pub mod status;

pub use compaction_config::{CompactionConfig, CompactionConfigBuilder, CompressionAlgorithm, DbOptions};
pub use hybrid::HybridCompactionPicker;

use crate::level::Levels;
use crate::sstable_info::SstableInfo;

/// Why a compaction was scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompactionReason {
    /// L0 accumulated enough files to merge into the first hyper-level.
    L0FilesNum,
    /// A hyper-level outgrew its share and merges into the next one.
    LevelMaxLevelSize,
    /// A trivial move that relocates a sorted run without rewriting it.
    Rearrange,
    /// Coalescing a run of small adjacent files at the terminal level.
    ReduceNumFiles,
    /// User-triggered compaction, owned by the engine.
    Manual,
}

impl std::fmt::Display for CompactionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CompactionReason::L0FilesNum => "L0FilesNum",
            CompactionReason::LevelMaxLevelSize => "LevelMaxLevelSize",
            CompactionReason::Rearrange => "Rearrange",
            CompactionReason::ReduceNumFiles => "ReduceNumFiles",
            CompactionReason::Manual => "Manual",
        })
    }
}

/// Files selected from one physical level.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputLevel {
    pub level: usize,
    pub table_infos: Vec<SstableInfo>,
}

/// The decision the picker hands back to the engine: which files to merge,
/// where the output goes and with what parallelism. Input levels are
/// ordered shallowest first; the final entry is the output level's own
/// slice (possibly empty).
#[derive(Clone, Debug, PartialEq)]
pub struct CompactionPlan {
    pub task_id: u64,
    pub input_levels: Vec<InputLevel>,
    pub output_level: usize,
    pub max_subcompactions: u32,
    pub max_output_file_size: u64,
    /// Deeper files intersecting the output range, used by the merge to
    /// bound output file size.
    pub grandparents: Vec<SstableInfo>,
    pub compression: CompressionAlgorithm,
    pub reason: CompactionReason,
    pub trivial_move: bool,
}

impl CompactionPlan {
    pub fn start_level(&self) -> usize {
        self.input_levels.first().map_or(0, |input| input.level)
    }

    pub fn input_file_count(&self) -> usize {
        self.input_levels.iter().map(|input| input.table_infos.len()).sum()
    }
}

/// Structured observability hook; `print_lsm_state` reports through it so
/// callers can route the record to their event log.
pub trait EventSink {
    fn lsm_state(&mut self, hyper_level_bytes_mb: &[u64], last_level_bytes_mb: u64);
}

/// Forwards LSM state records to `tracing`.
#[derive(Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn lsm_state(&mut self, hyper_level_bytes_mb: &[u64], last_level_bytes_mb: u64) {
        tracing::info!(
            hyper_levels_mb = ?hyper_level_bytes_mb,
            last_level_mb = last_level_bytes_mb,
            "lsm_state"
        );
    }
}

/// The surface the engine's flush/compaction scheduler drives.
pub trait CompactionPicker: Send + Sync {
    /// Cheap advisory probe used to decide whether scheduling a pick is
    /// worthwhile. Read-only and may race with concurrent picks; the
    /// authoritative answer is `pick_compaction` itself.
    fn needs_compaction(&self, levels: &Levels) -> bool;

    fn pick_compaction(
        &self,
        cf_name: &str,
        cf_options: &CompactionConfig,
        db_options: &DbOptions,
        levels: &Levels,
    ) -> Option<CompactionPlan>;

    fn print_lsm_state(&self, sink: &mut dyn EventSink, levels: &Levels);

    fn enable_low_priority_compaction(&self, enable: bool);
}
