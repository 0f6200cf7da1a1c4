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

//! Hybrid hyper-level compaction picker for LSM storage engines.
//!
//! The picker is a pure decision engine: given an immutable snapshot of a
//! column family's on-disk state it chooses which group of sstables to
//! merge next, where the output goes and with what parallelism. It never
//! reads blocks, copies keys or performs I/O; the engine executes the
//! returned [`CompactionPlan`] and reports completion back.
//!
//! Physical levels are grouped into hyper-levels of 24 levels each. Sorted
//! runs stack against the bottom of each band; trivial-move rearranges
//! keep receiving room open at the top, and partial key-range compactions
//! carry data from one band into the next while bounding write and space
//! amplification.

mod compaction;
pub mod key_range;
pub mod level;
pub mod sstable_info;

pub use compaction::{
    compaction_config, geometry, picker, status, CompactionConfig, CompactionConfigBuilder,
    CompactionPicker, CompactionPlan, CompactionReason, CompressionAlgorithm, DbOptions, EventSink,
    HybridCompactionPicker, InputLevel, TracingEventSink,
};
pub use key_range::{BytewiseComparator, KeyComparator, KeyRange};
pub use level::{Level, Levels};
pub use sstable_info::SstableInfo;
