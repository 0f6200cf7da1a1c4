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

use crate::compaction::geometry::{
    HYPER_LEVELS_MAX, HYPER_LEVELS_MIN, LEVELS_IN_HYPER_LEVEL, LEVELS_TO_MERGE_MAX,
    LEVELS_TO_MERGE_MIN,
};

const MIN_SPACE_AMPLIFICATION_PERCENT: u32 = 110;
const MAX_SPACE_AMPLIFICATION_PERCENT: u32 = 200;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    #[default]
    None,
    Lz4,
    Zstd,
}

/// Per-column-family knobs the picker recognizes. Anything else the engine
/// carries in its option bag is ignored here. Out-of-range values are
/// corrected silently by [`CompactionConfig::clamp`]; the picker never
/// rejects a column family over configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct CompactionConfig {
    /// Maximum allowed ratio of stored bytes to live bytes, in percent.
    pub max_space_amplification_percent: u32,
    /// Geometric fan-out between hyper-levels; also the L0 merge width.
    pub min_merge_width: usize,
    /// Size of a freshly flushed L0 file; seeds the hyper-level targets.
    pub write_buffer_size: u64,
    pub level0_file_num_compaction_trigger: usize,
    pub level0_slowdown_writes_trigger: usize,
    pub level0_stop_writes_trigger: usize,
    pub num_levels: usize,
    /// Key prefix length used to group adjacent small files at the last
    /// level.
    pub table_prefix_size: usize,
    pub compression: CompressionAlgorithm,
    pub bottommost_compression: Option<CompressionAlgorithm>,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        CompactionConfigBuilder::new().build()
    }
}

impl CompactionConfig {
    /// `100 / (pct - 100)`, in `[1, 10]` after clamping.
    pub fn space_amp_factor(&self) -> f64 {
        100.0 / (self.max_space_amplification_percent - 100) as f64
    }

    pub fn compression_for(&self, output_level: usize, last_level: usize) -> CompressionAlgorithm {
        if output_level >= last_level {
            self.bottommost_compression.unwrap_or(self.compression)
        } else {
            self.compression
        }
    }

    /// Corrects out-of-range options in place. Applied by the builder and
    /// re-applied defensively on every picker invocation, since the engine
    /// may mutate options at runtime.
    pub fn clamp(&mut self) {
        self.max_space_amplification_percent = self
            .max_space_amplification_percent
            .clamp(MIN_SPACE_AMPLIFICATION_PERCENT, MAX_SPACE_AMPLIFICATION_PERCENT);

        if self.min_merge_width < LEVELS_TO_MERGE_MIN || self.min_merge_width > LEVELS_TO_MERGE_MAX
        {
            self.min_merge_width = LEVELS_TO_MERGE_MAX;
        }

        // A small `num_levels` is read as the requested hyper-level count:
        // one slot for L0, one for the terminal level, and a full band per
        // hyper-level in between.
        if self.num_levels < HYPER_LEVELS_MIN * LEVELS_IN_HYPER_LEVEL + 2 {
            let required = self.num_levels.clamp(HYPER_LEVELS_MIN, HYPER_LEVELS_MAX);
            self.num_levels = required * LEVELS_IN_HYPER_LEVEL + 2;
        }

        if self.level0_file_num_compaction_trigger < self.min_merge_width
            && self.level0_slowdown_writes_trigger >= self.min_merge_width
            && self.level0_stop_writes_trigger >= self.min_merge_width
        {
            self.level0_file_num_compaction_trigger = self.min_merge_width;
        }
    }
}

pub struct CompactionConfigBuilder {
    config: CompactionConfig,
}

impl CompactionConfigBuilder {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            config: CompactionConfig {
                max_space_amplification_percent: 200,
                min_merge_width: LEVELS_TO_MERGE_MAX,
                write_buffer_size: 64 * 1024 * 1024,
                level0_file_num_compaction_trigger: 4,
                level0_slowdown_writes_trigger: 20,
                level0_stop_writes_trigger: 36,
                num_levels: 7,
                table_prefix_size: 4,
                compression: CompressionAlgorithm::None,
                bottommost_compression: None,
            },
        }
    }

    pub fn build(mut self) -> CompactionConfig {
        self.config.clamp();
        self.config
    }
}

macro_rules! builder_field {
    ($( $name:ident: $ty:ty ),* ,) => {
        impl CompactionConfigBuilder {
            $(
                pub fn $name(mut self, v: $ty) -> Self {
                    self.config.$name = v;
                    self
                }
            )*
        }
    };
}

builder_field! {
    max_space_amplification_percent: u32,
    min_merge_width: usize,
    write_buffer_size: u64,
    level0_file_num_compaction_trigger: usize,
    level0_slowdown_writes_trigger: usize,
    level0_stop_writes_trigger: usize,
    num_levels: usize,
    table_prefix_size: usize,
    compression: CompressionAlgorithm,
    bottommost_compression: Option<CompressionAlgorithm>,
}

/// Database-wide knobs the picker consults.
#[derive(Clone, Debug, PartialEq)]
pub struct DbOptions {
    pub max_open_files: usize,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            max_open_files: 1024,
        }
    }
}
