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

mod hyper_level_compaction_picker;
mod level0_compaction_picker;
mod rearrange_compaction_picker;
mod small_file_compaction_picker;

use std::cmp::Ordering;

use bytes::Bytes;
pub use hyper_level_compaction_picker::HyperLevelCompactionPicker;
pub use level0_compaction_picker::Level0CompactionPicker;
pub use rearrange_compaction_picker::{level_needs_rearrange, RearrangeMove, RearrangePicker};
pub use small_file_compaction_picker::SmallFileCompactionPicker;

use crate::compaction::InputLevel;
use crate::key_range::KeyComparator;
use crate::sstable_info::SstableInfo;

/// Output of one inner picker before the orchestrator stamps a task id,
/// reason and compression onto it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompactionInput {
    pub input_levels: Vec<InputLevel>,
    pub target_level: usize,
    pub max_subcompactions: u32,
    pub max_output_file_size: u64,
    pub grandparents: Vec<SstableInfo>,
    pub trivial_move: bool,
}

/// Where the previous partial sub-compaction of a hyper-level ended. An
/// empty `last_key` leaves the next pick unbounded; a set key pins both
/// the resume point and the output level so that consecutive
/// sub-compactions write disjoint ranges.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrevPlace {
    pub output_level: usize,
    pub last_key: Bytes,
}

/// Why a picker came back empty-handed, for observability.
#[derive(Debug, Default)]
pub struct LocalPickerStatistic {
    pub skip_by_count_limit: u64,
    pub skip_by_no_free_slot: u64,
    pub skip_by_pending_compaction: u64,
    pub skip_by_empty_selection: u64,
}

/// First index at or after `start` whose file may still hold `key`, i.e.
/// whose largest key is not below it. An empty key means "from the start".
pub(crate) fn locate_file(
    files: &[SstableInfo],
    key: &[u8],
    start: usize,
    ucmp: &dyn KeyComparator,
) -> usize {
    let mut idx = start;
    if !key.is_empty() {
        while idx < files.len() && ucmp.compare(files[idx].largest(), key) == Ordering::Less {
            idx += 1;
        }
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compaction::tests::{generate_table, test_key};
    use crate::key_range::BytewiseComparator;

    #[test]
    fn test_locate_file() {
        let ucmp = BytewiseComparator;
        let files = vec![
            generate_table(1, 0, 100),
            generate_table(2, 200, 300),
            generate_table(3, 400, 500),
        ];
        assert_eq!(locate_file(&files, &test_key(0), 0, &ucmp), 0);
        assert_eq!(locate_file(&files, &test_key(150), 0, &ucmp), 1);
        assert_eq!(locate_file(&files, &test_key(300), 0, &ucmp), 1);
        assert_eq!(locate_file(&files, &test_key(301), 0, &ucmp), 2);
        assert_eq!(locate_file(&files, &test_key(501), 0, &ucmp), 3);
        // empty key starts from the given position
        assert_eq!(locate_file(&files, b"", 2, &ucmp), 2);
        // start position is honored even when earlier files match
        assert_eq!(locate_file(&files, &test_key(0), 1, &ucmp), 1);
    }
}
