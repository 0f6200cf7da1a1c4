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

use crate::compaction::geometry::{first_level_in_hyper, last_level_in_hyper};
use crate::level::Levels;

/// A hyper-level needs a rearrange when an inner hole exists: some level
/// below a populated one is empty, so sorted runs are not packed against
/// the bottom of the band.
pub fn level_needs_rearrange(levels: &Levels, hyper_level: usize) -> bool {
    if hyper_level == 0 {
        return false;
    }
    let first = first_level_in_hyper(hyper_level);
    let last = last_level_in_hyper(hyper_level);
    let mut found_non_empty = false;
    for level in first..=last {
        let is_empty = levels.level_files(level).is_empty();
        if !found_non_empty {
            found_non_empty = !is_empty;
        } else if is_empty {
            return true;
        }
    }
    false
}

/// One sorted run relocating to an empty slot, achievable by re-labelling
/// file metadata only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RearrangeMove {
    pub input_level: usize,
    pub output_level: usize,
}

/// Shifts a sorted run to the deepest empty slot of its hyper-level,
/// opening receiving room at the top of the band.
pub struct RearrangePicker {
    hyper_level: usize,
}

impl RearrangePicker {
    pub fn new(hyper_level: usize) -> Self {
        assert!(hyper_level > 0);
        Self { hyper_level }
    }

    /// `floor_level`, when set, is the output level of an in-flight
    /// sub-compaction feeding this hyper-level; everything at or above it
    /// is left untouched so the slot being written stays stable.
    pub fn pick_rearrange(&self, levels: &Levels, floor_level: Option<usize>) -> Option<RearrangeMove> {
        let first = first_level_in_hyper(self.hyper_level);
        let last = last_level_in_hyper(self.hyper_level);
        let min_level = floor_level.map_or(first, |floor| (floor + 1).max(first));

        for output_level in (min_level..=last).rev() {
            if !levels.level_files(output_level).is_empty() {
                continue;
            }
            for input_level in (min_level..output_level).rev() {
                if !levels.level_files(input_level).is_empty() {
                    return Some(RearrangeMove {
                        input_level,
                        output_level,
                    });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compaction::tests::{generate_levels, generate_table};

    #[test]
    fn test_needs_rearrange_detects_inner_hole() {
        // empty prefix alone is not a hole
        let levels = generate_levels(26, vec![(23, vec![generate_table(1, 0, 10)]), (24, vec![generate_table(2, 20, 30)])]);
        assert!(!level_needs_rearrange(&levels, 1));

        // populated level followed by an empty one is
        let levels = generate_levels(26, vec![(1, vec![generate_table(1, 0, 10)]), (3, vec![generate_table(2, 20, 30)])]);
        assert!(level_needs_rearrange(&levels, 1));

        // a trailing hole after the deepest run counts too
        let levels = generate_levels(26, vec![(23, vec![generate_table(1, 0, 10)])]);
        assert!(level_needs_rearrange(&levels, 1));

        assert!(!level_needs_rearrange(&levels, 0));
    }

    #[test]
    fn test_pick_moves_deepest_run_down() {
        let levels = generate_levels(
            26,
            vec![
                (1, vec![generate_table(1, 0, 10)]),
                (3, vec![generate_table(2, 20, 30)]),
            ],
        );
        let mv = RearrangePicker::new(1).pick_rearrange(&levels, None).unwrap();
        assert_eq!(mv.input_level, 3);
        assert_eq!(mv.output_level, 24);
    }

    #[test]
    fn test_pick_respects_feeding_floor() {
        // a sub-compaction is writing into level 4; the runs above it must
        // not move, the ones below may
        let levels = generate_levels(
            26,
            vec![
                (2, vec![generate_table(1, 0, 10)]),
                (10, vec![generate_table(2, 20, 30)]),
            ],
        );
        let mv = RearrangePicker::new(1).pick_rearrange(&levels, Some(4)).unwrap();
        assert_eq!(mv.input_level, 10);
        assert_eq!(mv.output_level, 24);

        // nothing below the floor: no move at all
        let levels = generate_levels(26, vec![(2, vec![generate_table(1, 0, 10)])]);
        assert!(RearrangePicker::new(1).pick_rearrange(&levels, Some(4)).is_none());
    }

    #[test]
    fn test_pick_none_when_packed() {
        let levels = generate_levels(
            26,
            vec![
                (23, vec![generate_table(1, 0, 10)]),
                (24, vec![generate_table(2, 20, 30)]),
            ],
        );
        // the only empty slots are above every run
        assert!(RearrangePicker::new(1).pick_rearrange(&levels, None).is_none());
    }
}
