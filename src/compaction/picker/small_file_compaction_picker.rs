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

use super::{CompactionInput, LocalPickerStatistic};
use crate::compaction::InputLevel;
use crate::level::Levels;
use crate::sstable_info::SstableInfo;

/// Longest run of adjacent files one sweep will coalesce.
const MAX_RUN_FILES: usize = 200;
/// Cumulative bytes one sweep will rewrite.
const MAX_RUN_BYTES: u64 = 1024 * 1024 * 1024;
/// Ceiling on the per-file smallness threshold.
const SMALL_FILE_THRESHOLD_CAP: u64 = 256 * 1024 * 1024;

/// Coalesces runs of small adjacent files at the terminal level, keeping
/// the open-file count in check. Self-merging: output level equals input
/// level.
pub struct SmallFileCompactionPicker {
    table_prefix_size: usize,
}

impl SmallFileCompactionPicker {
    pub fn new(table_prefix_size: usize) -> Self {
        Self { table_prefix_size }
    }

    pub fn pick_compaction(
        &self,
        levels: &Levels,
        last_level: usize,
        stats: &mut LocalPickerStatistic,
    ) -> Option<CompactionInput> {
        let table_infos = levels.level_files(last_level);
        if table_infos.is_empty() {
            return None;
        }
        let last_level_bytes = levels.num_level_bytes(last_level);
        let threshold = (last_level_bytes / 1024).min(SMALL_FILE_THRESHOLD_CAP);

        let mut best: Option<std::ops::Range<usize>> = None;
        let mut idx = 0;
        while idx < table_infos.len() {
            let first = &table_infos[idx];
            if !self.is_small(first, threshold) || self.prefix_of(first).is_none() {
                idx += 1;
                continue;
            }
            let prefix = self.prefix_of(first).unwrap();
            let mut run_bytes = first.file_size;
            let mut end = idx + 1;
            while end < table_infos.len() && end - idx < MAX_RUN_FILES {
                let next = &table_infos[end];
                if !self.is_small(next, threshold)
                    || self.prefix_of(next) != Some(prefix)
                    || run_bytes + next.file_size > MAX_RUN_BYTES
                {
                    break;
                }
                run_bytes += next.file_size;
                end += 1;
            }
            if end - idx >= 2 && best.as_ref().map_or(true, |b| end - idx > b.len()) {
                best = Some(idx..end);
            }
            idx = end.max(idx + 1);
        }

        let run = match best {
            Some(run) => run,
            None => {
                stats.skip_by_empty_selection += 1;
                return None;
            }
        };

        Some(CompactionInput {
            input_levels: vec![
                InputLevel {
                    level: last_level,
                    table_infos: table_infos[run].to_vec(),
                },
                InputLevel {
                    level: last_level,
                    table_infos: vec![],
                },
            ],
            target_level: last_level,
            max_subcompactions: 1,
            max_output_file_size: u64::MAX,
            grandparents: vec![],
            trivial_move: false,
        })
    }

    fn is_small(&self, sst: &SstableInfo, threshold: u64) -> bool {
        sst.uncompressed_file_size < threshold
    }

    /// The run prefix of a file, if both of its boundary keys agree on the
    /// configured prefix length.
    fn prefix_of<'a>(&self, sst: &'a SstableInfo) -> Option<&'a [u8]> {
        let left = sst.smallest();
        let right = sst.largest();
        if left.len() < self.table_prefix_size || right.len() < self.table_prefix_size {
            return None;
        }
        let prefix = &left[..self.table_prefix_size];
        (prefix == &right[..self.table_prefix_size]).then_some(prefix)
    }
}
