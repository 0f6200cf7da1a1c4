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

use std::cmp::Ordering;

use bytes::Bytes;

use super::{locate_file, CompactionInput, LocalPickerStatistic, PrevPlace};
use crate::compaction::geometry::{first_level_in_hyper, hyper_level_size, last_level_in_hyper};
use crate::compaction::InputLevel;
use crate::key_range::KeyComparator;
use crate::level::Levels;
use crate::sstable_info::SstableInfo;

/// Free additions to the start-level window stop once the window holds
/// this many bytes.
const FREE_EXPANSION_BYTES: u64 = 64 * 1024 * 1024;

/// Picks a coherent key range spanning several levels of one hyper-level
/// and merges it into the next hyper-level (or the terminal level),
/// producing a parallelisable partial compaction.
pub struct HyperLevelCompactionPicker<'a> {
    hyper_level: usize,
    cur_num_hyper_levels: usize,
    last_level: usize,
    write_buffer_size: u64,
    space_amp_factor: f64,
    ucmp: &'a dyn KeyComparator,
}

/// A picked compaction together with the cursor the next sub-compaction
/// of the same hyper-level must resume from.
pub struct HyperLevelOutcome {
    pub input: CompactionInput,
    pub cursor: PrevPlace,
}

/// Working state of one range selection. `lower_bound` and `upper_bound`
/// are exclusive open-range sentinels taken from the keys of adjacent
/// output-level files that stay out of the compaction.
struct RangeSelection {
    files: Vec<SstableInfo>,
    smallest: Bytes,
    largest: Bytes,
    lower_bound: Bytes,
    upper_bound: Bytes,
    last_file_selected: bool,
}

impl<'a> HyperLevelCompactionPicker<'a> {
    pub fn new(
        hyper_level: usize,
        cur_num_hyper_levels: usize,
        last_level: usize,
        write_buffer_size: u64,
        space_amp_factor: f64,
        ucmp: &'a dyn KeyComparator,
    ) -> Self {
        assert!(hyper_level > 0);
        Self {
            hyper_level,
            cur_num_hyper_levels,
            last_level,
            write_buffer_size,
            space_amp_factor,
            ucmp,
        }
    }

    /// `prev` is this hyper-level's own cursor; `feeding_output_level` is
    /// the output level of an in-flight sub-compaction of the hyper-level
    /// above, which must not be interleaved with.
    pub fn pick_compaction(
        &self,
        levels: &Levels,
        prev: Option<&PrevPlace>,
        feeding_output_level: Option<usize>,
        stats: &mut LocalPickerStatistic,
    ) -> Option<HyperLevelOutcome> {
        let first_pickable = first_level_in_hyper(self.hyper_level) + 3;
        let last_in_hyper = last_level_in_hyper(self.hyper_level);

        let mut start_level = last_in_hyper;
        while start_level > first_pickable && levels.level_files(start_level).is_empty() {
            start_level -= 1;
        }
        if levels.level_files(start_level).is_empty() {
            stats.skip_by_empty_selection += 1;
            return None;
        }
        if let Some(floor) = feeding_output_level {
            if floor + 1 > start_level {
                stats.skip_by_pending_compaction += 1;
                return None;
            }
        }

        let terminal = self.hyper_level == self.cur_num_hyper_levels;
        let db_bytes = levels.num_level_bytes(self.last_level);
        let output_level = self.pick_output_level(levels, start_level, terminal, prev);

        let mut n_sub: u32 = 1;
        let first_in_hyper = first_level_in_hyper(self.hyper_level);
        for level in first_in_hyper + 2..=first_in_hyper + 5 {
            if !levels.level_files(level).is_empty() {
                n_sub += 1;
            }
        }
        let mut max_output_file_size = u64::MAX;
        if terminal {
            let amplified =
                (hyper_level_size(levels, self.hyper_level) as f64 * self.space_amp_factor) as u64;
            if db_bytes > 0 && amplified > db_bytes {
                let extra = (amplified.saturating_mul(10) / db_bytes).saturating_sub(10).min(3);
                n_sub += extra as u32;
            }
            max_output_file_size = (db_bytes / 32).max(self.write_buffer_size);
        }
        n_sub = n_sub.min(4);

        let mut grandparents = vec![];
        if !terminal && self.hyper_level + 2 >= self.cur_num_hyper_levels {
            grandparents = levels.level_files(self.last_level).to_vec();
        }

        let (middle, selection, output_slice) =
            self.select_inputs(levels, n_sub as usize, output_level, start_level, first_pickable);

        let trivial_move = output_slice.is_empty()
            && middle.iter().all(|input| input.table_infos.is_empty());

        let mut input_levels;
        if trivial_move {
            input_levels = vec![
                InputLevel {
                    level: start_level,
                    table_infos: selection.files,
                },
                InputLevel {
                    level: output_level,
                    table_infos: vec![],
                },
            ];
            grandparents.clear();
            max_output_file_size = u64::MAX;
        } else {
            if terminal {
                grandparents = build_grandparents(&output_slice, max_output_file_size);
            }
            input_levels = middle;
            input_levels.push(InputLevel {
                level: start_level,
                table_infos: selection.files,
            });
            input_levels.push(InputLevel {
                level: output_level,
                table_infos: output_slice,
            });
        }

        let cursor = PrevPlace {
            output_level,
            last_key: if selection.last_file_selected {
                Bytes::new()
            } else {
                selection.upper_bound.clone()
            },
        };

        Some(HyperLevelOutcome {
            input: CompactionInput {
                input_levels,
                target_level: output_level,
                max_subcompactions: n_sub,
                max_output_file_size,
                grandparents,
                trivial_move,
            },
            cursor,
        })
    }

    /// For the terminal hyper-level everything lands in the last level.
    /// Otherwise take the deepest level of the next hyper-level's leading
    /// empty run, stepping into the first populated run when the start
    /// file clears it entirely; a live cursor pins its own output level so
    /// successive sub-compactions stack in one slot.
    fn pick_output_level(
        &self,
        levels: &Levels,
        start_level: usize,
        terminal: bool,
        prev: Option<&PrevPlace>,
    ) -> usize {
        if terminal {
            return self.last_level;
        }
        if let Some(prev) = prev {
            if !prev.last_key.is_empty() {
                let first_s = levels.level_files(start_level)[0].smallest();
                if self.ucmp.compare(first_s, &prev.last_key) != Ordering::Less {
                    return prev.output_level;
                }
            }
        }
        let mut output_level = last_level_in_hyper(self.hyper_level) + 1;
        let next_end = last_level_in_hyper(self.hyper_level + 1);
        while output_level < next_end && levels.level_files(output_level + 1).is_empty() {
            output_level += 1;
        }
        if output_level < next_end {
            let first = &levels.level_files(start_level)[0];
            let candidates = levels.level_files(output_level + 1);
            let idx = locate_file(candidates, first.smallest(), 0, self.ucmp);
            if idx == candidates.len()
                || self.ucmp.compare(candidates[idx].smallest(), first.largest()) == Ordering::Greater
            {
                output_level += 1;
            }
        }
        output_level
    }

    fn select_inputs(
        &self,
        levels: &Levels,
        n_buffers: usize,
        output_level: usize,
        start_level: usize,
        first_pickable: usize,
    ) -> (Vec<InputLevel>, RangeSelection, Vec<SstableInfo>) {
        let start_files = levels.level_files(start_level);
        debug_assert!(!start_files.is_empty());
        let target_files = levels.level_files(output_level);

        let mut selection = self.select_from_start_level(start_files, target_files, n_buffers);

        let mut middle: Vec<InputLevel> = vec![];
        for level in (first_pickable..start_level).rev() {
            let level_files = levels.level_files(level);
            if level_files.is_empty() {
                continue;
            }
            let table_infos = self.expand_selection(level_files, &mut selection);
            if let Some(first) = table_infos.first() {
                if self.ucmp.compare(first.smallest(), &selection.smallest) == Ordering::Less {
                    selection.smallest = first.key_range.left.clone();
                }
            }
            if let Some(last) = table_infos.last() {
                if self.ucmp.compare(last.largest(), &selection.largest) == Ordering::Greater {
                    selection.largest = last.key_range.right.clone();
                }
            }
            middle.push(InputLevel { level, table_infos });
        }
        middle.reverse();

        let output_slice =
            self.select_output_slice(target_files, &selection.smallest, &selection.largest);
        (middle, selection, output_slice)
    }

    /// Seeds the key range from the head of the start level and greedily
    /// widens the window. A window that does not touch the output run
    /// stays strictly between two adjacent output files (zero write
    /// amplification); an overlapping window grows while the merge stays
    /// favourable.
    fn select_from_start_level(
        &self,
        start_files: &[SstableInfo],
        target_files: &[SstableInfo],
        n_buffers: usize,
    ) -> RangeSelection {
        let first = &start_files[0];
        let mut selection = RangeSelection {
            files: vec![first.clone()],
            smallest: first.key_range.left.clone(),
            largest: first.key_range.right.clone(),
            lower_bound: Bytes::new(),
            upper_bound: Bytes::new(),
            last_file_selected: true,
        };
        let mut s_size = first.file_size;
        let mut t_size = 0u64;

        let t_begin = locate_file(target_files, &selection.smallest, 0, self.ucmp);
        let mut t_end = t_begin;
        let overlapping = t_begin < target_files.len()
            && self.ucmp.compare(target_files[t_begin].smallest(), &selection.largest)
                != Ordering::Greater;
        if t_begin > 0 {
            selection.lower_bound = target_files[t_begin - 1].key_range.right.clone();
        }
        if overlapping {
            while t_end < target_files.len()
                && self.ucmp.compare(target_files[t_end].smallest(), &selection.largest)
                    != Ordering::Greater
            {
                t_size += target_files[t_end].file_size;
                t_end += 1;
            }
        } else if t_begin < target_files.len() {
            selection.upper_bound = target_files[t_begin].key_range.left.clone();
        }

        let mut idx = 1;
        while idx < start_files.len() {
            let file = &start_files[idx];
            // multiple versions of one user key never split across
            // compactions
            let tied =
                self.ucmp.compare(file.smallest(), &selection.largest) == Ordering::Equal;
            if tied {
                selection.largest = file.key_range.right.clone();
                s_size += file.file_size;
                selection.files.push(file.clone());
                while t_end < target_files.len()
                    && self.ucmp.compare(target_files[t_end].smallest(), &selection.largest)
                        != Ordering::Greater
                {
                    t_size += target_files[t_end].file_size;
                    t_end += 1;
                }
                selection.upper_bound = Bytes::new();
                idx += 1;
                continue;
            }
            if !selection.upper_bound.is_empty()
                && self.ucmp.compare(file.largest(), &selection.upper_bound) == Ordering::Greater
            {
                break;
            }
            let pulls_target = t_end < target_files.len()
                && self.ucmp.compare(target_files[t_end].smallest(), file.largest())
                    != Ordering::Greater;
            if pulls_target {
                let inside_covered = t_end > t_begin
                    && self.ucmp.compare(file.smallest(), target_files[t_end - 1].largest())
                        != Ordering::Greater;
                if selection.files.len() >= n_buffers || !inside_covered {
                    break;
                }
                selection.largest = file.key_range.right.clone();
                s_size += file.file_size;
                selection.files.push(file.clone());
                while t_end < target_files.len()
                    && self.ucmp.compare(target_files[t_end].smallest(), &selection.largest)
                        != Ordering::Greater
                {
                    t_size += target_files[t_end].file_size;
                    t_end += 1;
                }
            } else {
                // free addition, bounded so one sub-compaction stays small
                if selection.files.len() > n_buffers
                    || s_size >= FREE_EXPANSION_BYTES
                    || t_size >= s_size.saturating_mul(2)
                {
                    break;
                }
                selection.largest = file.key_range.right.clone();
                s_size += file.file_size;
                selection.files.push(file.clone());
            }
            idx += 1;
        }

        if t_end < target_files.len() {
            let candidate = target_files[t_end].smallest();
            if selection.upper_bound.is_empty()
                || self.ucmp.compare(candidate, &selection.upper_bound) == Ordering::Less
            {
                selection.upper_bound = target_files[t_end].key_range.left.clone();
            }
        }
        if idx < start_files.len() {
            selection.last_file_selected = false;
            let candidate = start_files[idx].smallest();
            if selection.upper_bound.is_empty()
                || self.ucmp.compare(candidate, &selection.upper_bound) == Ordering::Less
            {
                selection.upper_bound = start_files[idx].key_range.left.clone();
            }
        }
        selection
    }

    /// Takes every file of a shallower level that fits inside the open
    /// range `(lower_bound, upper_bound)` and intersects the selection.
    /// Hitting a blocking file tightens `upper_bound` for the levels still
    /// to come.
    fn expand_selection(
        &self,
        level_files: &[SstableInfo],
        selection: &mut RangeSelection,
    ) -> Vec<SstableInfo> {
        let mut out = vec![];
        if level_files.is_empty() {
            return out;
        }

        let mut idx = locate_file(level_files, &selection.smallest, 0, self.ucmp);
        if !selection.lower_bound.is_empty() {
            while idx < level_files.len()
                && self.ucmp.compare(level_files[idx].smallest(), &selection.lower_bound)
                    != Ordering::Greater
            {
                idx += 1;
            }
        }
        // a file opening on its excluded predecessor's closing key belongs
        // to the previous slice
        while idx > 0
            && idx < level_files.len()
            && self.ucmp.compare(level_files[idx].smallest(), level_files[idx - 1].largest())
                == Ordering::Equal
        {
            idx += 1;
        }

        if idx == level_files.len() {
            let last = level_files.last().unwrap();
            if selection.lower_bound.is_empty()
                || self.ucmp.compare(last.largest(), &selection.lower_bound) == Ordering::Greater
            {
                selection.lower_bound = last.key_range.right.clone();
            }
            return out;
        }
        if idx > 0 {
            let prev = &level_files[idx - 1];
            if selection.lower_bound.is_empty()
                || self.ucmp.compare(prev.largest(), &selection.lower_bound) == Ordering::Greater
            {
                selection.lower_bound = prev.key_range.right.clone();
            }
        }

        while idx < level_files.len() {
            let file = &level_files[idx];
            if self.ucmp.compare(file.smallest(), &selection.largest) == Ordering::Greater {
                break;
            }
            if !selection.upper_bound.is_empty()
                && self.ucmp.compare(file.largest(), &selection.upper_bound) != Ordering::Less
            {
                break;
            }
            out.push(file.clone());
            idx += 1;
        }
        if idx < level_files.len() {
            let blocking = &level_files[idx];
            if selection.upper_bound.is_empty()
                || self.ucmp.compare(blocking.smallest(), &selection.upper_bound) == Ordering::Less
            {
                selection.upper_bound = blocking.key_range.left.clone();
            }
        }
        out
    }

    /// The output level's files intersecting the selected range, widened
    /// on both edges so that every version of a boundary user key travels
    /// with the compaction.
    fn select_output_slice(
        &self,
        target_files: &[SstableInfo],
        smallest: &Bytes,
        largest: &Bytes,
    ) -> Vec<SstableInfo> {
        let mut start = locate_file(target_files, smallest, 0, self.ucmp);
        while start > 0
            && start < target_files.len()
            && self.ucmp.compare(target_files[start - 1].largest(), target_files[start].smallest())
                == Ordering::Equal
        {
            start -= 1;
        }
        let mut out = vec![];
        let mut idx = start;
        while idx < target_files.len() {
            let file = &target_files[idx];
            if self.ucmp.compare(file.smallest(), largest) == Ordering::Greater {
                let straddles = idx > start
                    && self.ucmp.compare(file.smallest(), target_files[idx - 1].largest())
                        == Ordering::Equal;
                if !straddles {
                    break;
                }
            }
            out.push(file.clone());
            idx += 1;
        }
        out
    }
}

/// Spreads grandparent hints over the output run so the merge cuts output
/// files roughly every `desired_size` bytes.
fn build_grandparents(last_level_files: &[SstableInfo], desired_size: u64) -> Vec<SstableInfo> {
    let mut grandparents = vec![];
    let min_size = desired_size / 5 * 3;
    let mut acc_size = 0u64;
    for file in last_level_files {
        acc_size += file.file_size;
        if acc_size > min_size {
            grandparents.push(file.clone());
            acc_size = 0;
        }
    }
    grandparents
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::compaction::tests::{generate_levels, generate_table, test_key};
    use crate::key_range::{BytewiseComparator, KeyRange};

    const UCMP: BytewiseComparator = BytewiseComparator;

    fn terminal_picker(write_buffer_size: u64) -> HyperLevelCompactionPicker<'static> {
        HyperLevelCompactionPicker::new(1, 1, 25, write_buffer_size, 2.0, &UCMP)
    }

    fn ids(table_infos: &[SstableInfo]) -> Vec<u64> {
        table_infos.iter().map(|sst| sst.sst_id).collect()
    }

    #[test]
    fn test_merge_with_output_run() {
        let levels = generate_levels(
            26,
            vec![
                (
                    24,
                    vec![
                        generate_table(1, 0, 100),
                        generate_table(2, 150, 250),
                        generate_table(3, 300, 400),
                    ],
                ),
                (
                    25,
                    vec![
                        generate_table(4, 0, 80),
                        generate_table(5, 90, 180),
                        generate_table(6, 200, 260),
                        generate_table(7, 500, 600),
                    ],
                ),
            ],
        );
        let mut stats = LocalPickerStatistic::default();
        let outcome = terminal_picker(16)
            .pick_compaction(&levels, None, None, &mut stats)
            .unwrap();
        let input = &outcome.input;
        assert!(!input.trivial_move);
        assert_eq!(input.target_level, 25);
        assert_eq!(input.input_levels.len(), 2);
        assert_eq!(ids(&input.input_levels[0].table_infos), vec![1, 2, 3]);
        // file 7 stays out: it starts past the selected range
        assert_eq!(ids(&input.input_levels[1].table_infos), vec![4, 5, 6]);
        // the whole start level was consumed, so no resume cursor
        assert!(outcome.cursor.last_key.is_empty());
        assert_eq!(outcome.cursor.output_level, 25);
        // terminal merges carry grandparent hints from the output run
        assert!(!input.grandparents.is_empty());
    }

    #[test]
    fn test_disjoint_window_is_trivial_move() {
        // start run sits entirely between two output files
        let levels = generate_levels(
            26,
            vec![
                (24, vec![generate_table(1, 300, 350), generate_table(2, 360, 380)]),
                (25, vec![generate_table(4, 0, 100), generate_table(5, 500, 600)]),
            ],
        );
        let mut stats = LocalPickerStatistic::default();
        let outcome = terminal_picker(16)
            .pick_compaction(&levels, None, None, &mut stats)
            .unwrap();
        let input = &outcome.input;
        assert!(input.trivial_move);
        assert_eq!(input.input_levels.len(), 2);
        assert_eq!(ids(&input.input_levels[0].table_infos), vec![1, 2]);
        assert!(input.input_levels[1].table_infos.is_empty());
        assert!(input.grandparents.is_empty());
        assert_eq!(input.max_output_file_size, u64::MAX);
    }

    #[test]
    fn test_user_key_tie_keeps_versions_together() {
        // files 1 and 2 share the boundary key; the bound from the output
        // run would otherwise cut between them
        let levels = generate_levels(
            26,
            vec![
                (24, vec![generate_table(1, 0, 100), generate_table(2, 100, 150)]),
                (25, vec![generate_table(4, 120, 200)]),
            ],
        );
        let mut stats = LocalPickerStatistic::default();
        let outcome = terminal_picker(16)
            .pick_compaction(&levels, None, None, &mut stats)
            .unwrap();
        let input = &outcome.input;
        assert_eq!(ids(&input.input_levels[0].table_infos), vec![1, 2]);
        // stretching across the tie pulled the overlapping output file in
        assert_eq!(ids(&input.input_levels[1].table_infos), vec![4]);
        assert!(!input.trivial_move);
    }

    #[test]
    fn test_partial_pick_sets_resume_cursor() {
        // more start files than one window takes; the cursor records where
        // the next sub-compaction resumes
        let start: Vec<_> = (0..6)
            .map(|i| generate_table(i as u64 + 1, i * 100, i * 100 + 50))
            .collect();
        let target = vec![
            generate_table(11, 0, 140),
            generate_table(12, 160, 240),
            generate_table(13, 260, 340),
            generate_table(14, 360, 440),
            generate_table(15, 460, 540),
        ];
        let levels = generate_levels(26, vec![(24, start), (25, target)]);
        let mut stats = LocalPickerStatistic::default();
        let outcome = terminal_picker(16)
            .pick_compaction(&levels, None, None, &mut stats)
            .unwrap();
        let input = &outcome.input;
        assert!(!input.trivial_move);
        let picked = ids(&input.input_levels[0].table_infos);
        assert!(picked.len() < 6);
        assert!(!outcome.cursor.last_key.is_empty());
        // every unpicked start file begins at or past the cursor
        for sst in &levels.level_files(24)[picked.len()..] {
            assert!(sst.key_range.left >= outcome.cursor.last_key);
        }
        // no selected file crosses the cursor
        for input_level in &input.input_levels {
            for sst in &input_level.table_infos {
                assert!(sst.key_range.left < outcome.cursor.last_key);
            }
        }
    }

    #[test]
    fn test_middle_levels_expand_within_bounds() {
        let levels = generate_levels(
            26,
            vec![
                // shallower run partially inside the window
                (20, vec![generate_table(21, 0, 40), generate_table(22, 60, 90)]),
                (24, vec![generate_table(1, 0, 100)]),
                (25, vec![generate_table(4, 50, 120), generate_table(5, 300, 400)]),
            ],
        );
        let mut stats = LocalPickerStatistic::default();
        let outcome = terminal_picker(16)
            .pick_compaction(&levels, None, None, &mut stats)
            .unwrap();
        let input = &outcome.input;
        assert_eq!(input.input_levels.len(), 3);
        assert_eq!(input.input_levels[0].level, 20);
        assert_eq!(ids(&input.input_levels[0].table_infos), vec![21, 22]);
        assert_eq!(input.input_levels[1].level, 24);
        assert_eq!(ids(&input.input_levels[2].table_infos), vec![4]);
    }

    #[test]
    fn test_middle_level_blocking_file_tightens_bound() {
        // file 31 reaches past the upper bound, stays behind and tightens
        // the bound; the shallower file 32 is then shut out by the
        // tightened bound as well
        let start = vec![
            generate_table(1, 0, 100),
            generate_table(2, 400, 450),
            generate_table(3, 500, 550),
        ];
        let mut far = generate_table(4, 700, 800);
        far.file_size = 100_000;
        far.uncompressed_file_size = 100_000;
        let levels = generate_levels(
            26,
            vec![
                (20, vec![generate_table(32, 350, 380)]),
                (22, vec![generate_table(31, 300, 600)]),
                (24, start),
                (25, vec![far]),
            ],
        );
        let mut stats = LocalPickerStatistic::default();
        let outcome = terminal_picker(16)
            .pick_compaction(&levels, None, None, &mut stats)
            .unwrap();
        let input = &outcome.input;
        // both shallower slices came up empty, so the pick collapses to a
        // move of the start window
        assert!(input.trivial_move);
        assert_eq!(ids(&input.input_levels[0].table_infos), vec![1, 2]);
        assert_eq!(outcome.cursor.last_key, test_key(300));
    }

    #[test]
    fn test_feeding_compaction_aborts_pick() {
        let levels = generate_levels(26, vec![(24, vec![generate_table(1, 0, 100)])]);
        let mut stats = LocalPickerStatistic::default();
        let outcome =
            terminal_picker(16).pick_compaction(&levels, None, Some(24), &mut stats);
        assert!(outcome.is_none());
        assert_eq!(stats.skip_by_pending_compaction, 1);
    }

    #[test]
    fn test_empty_pickable_band_skips() {
        // only the reserved receiving room is populated
        let levels = generate_levels(26, vec![(2, vec![generate_table(1, 0, 100)])]);
        let mut stats = LocalPickerStatistic::default();
        assert!(terminal_picker(16)
            .pick_compaction(&levels, None, None, &mut stats)
            .is_none());
        assert_eq!(stats.skip_by_empty_selection, 1);
    }

    #[test]
    fn test_cursor_reuses_output_level() {
        // non-terminal hyper-level with a live cursor: the remaining range
        // starts past the cursor, so the pick keeps writing into the same
        // output slot instead of opening a new one
        let picker = HyperLevelCompactionPicker::new(1, 2, 49, 16, 2.0, &UCMP);
        let start: Vec<_> = (0..3)
            .map(|i| generate_table(i as u64 + 1, 500 + i * 100, 500 + i * 100 + 50))
            .collect();
        let levels = generate_levels(50, vec![(24, start), (48, vec![generate_table(9, 0, 10_000)])]);
        let prev = PrevPlace {
            output_level: 40,
            last_key: test_key(450),
        };
        let mut stats = LocalPickerStatistic::default();
        let outcome = picker
            .pick_compaction(&levels, Some(&prev), None, &mut stats)
            .unwrap();
        assert_eq!(outcome.input.target_level, 40);
    }

    #[test]
    fn test_non_terminal_output_walks_to_free_slot() {
        // hyper-2 runs packed at the bottom; output opens just above them
        let picker = HyperLevelCompactionPicker::new(1, 2, 49, 16, 2.0, &UCMP);
        let levels = generate_levels(
            50,
            vec![
                (24, vec![generate_table(1, 0, 100)]),
                (48, vec![generate_table(9, 50, 120)]),
                (49, vec![generate_table(10, 0, 10_000)]),
            ],
        );
        let mut stats = LocalPickerStatistic::default();
        let outcome = picker.pick_compaction(&levels, None, None, &mut stats).unwrap();
        // level 48 holds an overlapping run, so the empty level above it
        // receives the merge
        assert_eq!(outcome.input.target_level, 47);
        assert!(outcome.input.trivial_move);
    }

    #[test]
    fn test_non_terminal_steps_into_disjoint_run() {
        let picker = HyperLevelCompactionPicker::new(1, 2, 49, 16, 2.0, &UCMP);
        let levels = generate_levels(
            50,
            vec![
                (24, vec![generate_table(1, 0, 100)]),
                (48, vec![generate_table(9, 500, 600)]),
            ],
        );
        let mut stats = LocalPickerStatistic::default();
        let outcome = picker.pick_compaction(&levels, None, None, &mut stats).unwrap();
        // the start file clears the run at 48 entirely, so the pick lands
        // inside it instead of opening level 47
        assert_eq!(outcome.input.target_level, 48);
        assert!(outcome.input.trivial_move);
    }

    #[test]
    fn test_terminal_subcompactions_scale_with_excess() {
        // amplified hyper-level size far above the database size pushes the
        // sub-compaction count to its cap
        let start = vec![generate_table(1, 0, 1000)];
        let mut big = generate_table(2, 0, 2000);
        big.file_size = 1 << 20;
        big.uncompressed_file_size = 1 << 20;
        let mut db = generate_table(3, 0, 3000);
        db.file_size = 4096;
        db.uncompressed_file_size = 4096;
        let levels = generate_levels(26, vec![(4, vec![big]), (24, start), (25, vec![db])]);
        let mut stats = LocalPickerStatistic::default();
        let outcome = terminal_picker(16)
            .pick_compaction(&levels, None, None, &mut stats)
            .unwrap();
        // 1 base + 1 for the populated shallow level, + capped excess
        assert_eq!(outcome.input.max_subcompactions, 4);
        assert_eq!(outcome.input.max_output_file_size, 128);
    }

    #[test]
    fn test_grandparent_hints_follow_output_run() {
        let files: Vec<_> = (0..10)
            .map(|i| {
                let mut sst = generate_table(20 + i as u64, i * 100, i * 100 + 90);
                sst.file_size = 100;
                sst
            })
            .collect();
        let grandparents = build_grandparents(&files, 300);
        // one hint roughly every 180 accumulated bytes
        assert!(!grandparents.is_empty());
        assert!(grandparents.len() < files.len());

        let none = build_grandparents(&files, u64::MAX);
        assert!(none.is_empty());
    }

    #[test]
    fn test_output_slice_respects_boundary_versions() {
        let picker = terminal_picker(16);
        let target = vec![
            generate_table(1, 0, 50),
            SstableInfo {
                sst_id: 2,
                key_range: KeyRange::new(test_key(60), test_key(100)),
                file_size: 10,
                uncompressed_file_size: 10,
            },
            // same user key continues in the next file
            SstableInfo {
                sst_id: 3,
                key_range: KeyRange::new(test_key(100), test_key(140)),
                file_size: 10,
                uncompressed_file_size: 10,
            },
            generate_table(4, 150, 200),
        ];
        let slice = picker.select_output_slice(&target, &test_key(55), &test_key(90));
        // file 3 straddles the range end with a shared user key
        assert_eq!(ids(&slice), vec![2, 3]);
    }
}
