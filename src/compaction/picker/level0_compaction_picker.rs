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
use crate::compaction::geometry::{first_level_in_hyper, last_level_in_hyper};
use crate::compaction::InputLevel;
use crate::key_range::KeyComparator;
use crate::level::Levels;
use crate::sstable_info::SstableInfo;

/// Merges a bounded tail of L0 into an empty slot of the first
/// hyper-level.
pub struct Level0CompactionPicker {
    merge_width: usize,
    trigger: usize,
    cur_num_hyper_levels: usize,
    last_level: usize,
    write_buffer_size: u64,
}

impl Level0CompactionPicker {
    pub fn new(
        merge_width: usize,
        trigger: usize,
        cur_num_hyper_levels: usize,
        last_level: usize,
        write_buffer_size: u64,
    ) -> Self {
        Self {
            merge_width,
            trigger,
            cur_num_hyper_levels,
            last_level,
            write_buffer_size,
        }
    }

    pub fn pick_compaction(
        &self,
        levels: &Levels,
        ucmp: &dyn KeyComparator,
        stats: &mut LocalPickerStatistic,
    ) -> Option<CompactionInput> {
        let l0 = levels.level_files(0);
        if l0.len() < self.merge_width.min(self.trigger) {
            stats.skip_by_count_limit += 1;
            return None;
        }

        // the receiving hyper-level must have an open slot at its top
        let first = first_level_in_hyper(1);
        if !levels.level_files(first).is_empty() {
            stats.skip_by_no_free_slot += 1;
            return None;
        }
        let last = last_level_in_hyper(1);
        let mut output_level = first;
        for level in first + 1..=last {
            if !levels.level_files(level).is_empty() {
                break;
            }
            output_level = level;
        }

        // newest files first fill up the merge width
        let truncated = l0.len() > self.merge_width;
        let table_infos = if truncated {
            l0[l0.len() - self.merge_width..].to_vec()
        } else {
            l0.to_vec()
        };
        let max_subcompactions = if truncated { 2 } else { 1 };

        let mut grandparents = vec![];
        let mut max_output_file_size = u64::MAX;
        if batch_intersects(&table_infos, ucmp) {
            if self.cur_num_hyper_levels <= 2 {
                grandparents = levels.level_files(self.last_level).to_vec();
            }
            if grandparents.is_empty() {
                max_output_file_size = self.write_buffer_size;
            }
        }

        Some(CompactionInput {
            input_levels: vec![
                InputLevel {
                    level: 0,
                    table_infos,
                },
                InputLevel {
                    level: output_level,
                    table_infos: vec![],
                },
            ],
            target_level: output_level,
            max_subcompactions,
            max_output_file_size,
            grandparents,
            trivial_move: false,
        })
    }
}

/// Whether any two of the chosen L0 files overlap. Disjoint batches keep
/// their shape through the merge, so they need neither grandparent hints
/// nor an output size bound.
fn batch_intersects(table_infos: &[SstableInfo], ucmp: &dyn KeyComparator) -> bool {
    for (idx, sst) in table_infos.iter().enumerate() {
        for other in &table_infos[idx + 1..] {
            if sst.key_range.overlaps(&other.key_range, ucmp) {
                return true;
            }
        }
    }
    false
}
