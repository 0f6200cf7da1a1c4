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

use crate::sstable_info::SstableInfo;

/// One physical level. Level 0 holds freshly flushed files in arrival
/// order (oldest first) and they may overlap arbitrarily; every deeper
/// level is a single sorted run: pairwise key-disjoint files in ascending
/// smallest-key order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Level {
    pub level_idx: u32,
    pub table_infos: Vec<SstableInfo>,
    pub total_file_size: u64,
}

impl Level {
    pub fn new(level_idx: u32, table_infos: Vec<SstableInfo>) -> Self {
        let total_file_size = table_infos.iter().map(|sst| sst.file_size).sum();
        Self {
            level_idx,
            table_infos,
            total_file_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.table_infos.is_empty()
    }
}

/// Immutable snapshot of the on-disk state of one column family. Borrowed
/// by the picker for the duration of a single decision; the picker never
/// mutates it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Levels {
    pub levels: Vec<Level>,
}

impl Levels {
    /// A snapshot with `num_levels` empty levels.
    pub fn new(num_levels: usize) -> Self {
        Self {
            levels: (0..num_levels as u32).map(|idx| Level::new(idx, vec![])).collect(),
        }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level_files(&self, level: usize) -> &[SstableInfo] {
        static EMPTY: &[SstableInfo] = &[];
        self.levels.get(level).map_or(EMPTY, |l| &l.table_infos)
    }

    pub fn num_level_bytes(&self, level: usize) -> u64 {
        self.levels.get(level).map_or(0, |l| l.total_file_size)
    }

    /// Replaces the file list of one level, keeping `total_file_size`
    /// consistent. Intended for the engine's version edits and for tests.
    pub fn set_level(&mut self, level: usize, table_infos: Vec<SstableInfo>) {
        let slot = &mut self.levels[level];
        slot.total_file_size = table_infos.iter().map(|sst| sst.file_size).sum();
        slot.table_infos = table_infos;
    }
}
