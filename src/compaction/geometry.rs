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

//! Hyper-level arithmetic. A hyper-level is a band of
//! [`LEVELS_IN_HYPER_LEVEL`] physical levels treated as a unit for sizing,
//! rearranging and compaction targeting. Hyper-level 0 is exactly level 0.

use crate::level::Levels;

pub const LEVELS_TO_MERGE_MIN: usize = 4;
pub const LEVELS_TO_MERGE_MAX: usize = 8;
pub const LEVELS_IN_HYPER_LEVEL: usize = (LEVELS_TO_MERGE_MAX + 4) * 2;
pub const HYPER_LEVELS_MIN: usize = 1;
pub const HYPER_LEVELS_MAX: usize = 10;

pub fn first_level_in_hyper(hyper_level: usize) -> usize {
    if hyper_level == 0 {
        0
    } else {
        (hyper_level - 1) * LEVELS_IN_HYPER_LEVEL + 1
    }
}

pub fn last_level_in_hyper(hyper_level: usize) -> usize {
    if hyper_level == 0 {
        0
    } else {
        hyper_level * LEVELS_IN_HYPER_LEVEL
    }
}

pub fn hyper_level_of(level: usize) -> usize {
    if level == 0 {
        0
    } else {
        (level - 1) / LEVELS_IN_HYPER_LEVEL + 1
    }
}

/// Sum of bytes across every physical level of one hyper-level.
pub fn hyper_level_size(levels: &Levels, hyper_level: usize) -> u64 {
    let first = first_level_in_hyper(hyper_level);
    let last = last_level_in_hyper(hyper_level);
    (first..=last).map(|level| levels.num_level_bytes(level)).sum()
}
