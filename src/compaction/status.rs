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

use std::ops::Index;

use itertools::Itertools;

use crate::compaction::geometry::hyper_level_of;
use crate::compaction::{CompactionPlan, CompactionReason};

/// One in-flight compaction as the picker tracks it between
/// `pick_compaction` and the engine's completion report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunningCompaction {
    pub task_id: u64,
    pub start_level: usize,
    pub output_level: usize,
    pub reason: CompactionReason,
}

/// Registry of in-flight compactions for one column family. Every plan the
/// picker hands out is recorded here first; the engine reports completion
/// (or abort) through [`CompactStatus::report_compact_task`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompactStatus {
    running: Vec<RunningCompaction>,
}

impl CompactStatus {
    pub fn register(&mut self, plan: &CompactionPlan) {
        self.running.push(RunningCompaction {
            task_id: plan.task_id,
            start_level: plan.start_level(),
            output_level: plan.output_level,
            reason: plan.reason,
        });
    }

    pub fn register_running(&mut self, compaction: RunningCompaction) {
        self.running.push(compaction);
    }

    /// Declares a task as either succeeded, failed or canceled. Returns
    /// false when the task was not known.
    pub fn report_compact_task(&mut self, task_id: u64) -> bool {
        let before = self.running.len();
        self.running.retain(|c| c.task_id != task_id);
        self.running.len() != before
    }

    pub fn cancel_compaction_tasks_if<F: Fn(u64) -> bool>(&mut self, should_cancel: F) -> u32 {
        let before = self.running.len();
        self.running.retain(|c| !should_cancel(c.task_id));
        (before - self.running.len()) as u32
    }

    pub fn compactions_in_progress(&self) -> &[RunningCompaction] {
        &self.running
    }

    pub fn level0_compactions_in_progress(&self) -> usize {
        self.running.iter().filter(|c| c.start_level == 0).count()
    }

    pub fn pending_task_ids(&self) -> Vec<u64> {
        self.running.iter().map(|c| c.task_id).collect_vec()
    }

    pub fn any_targets_level(&self, level: usize) -> bool {
        self.running.iter().any(|c| c.output_level == level)
    }

    /// Folds the running set into one descriptor per hyper-level. A
    /// compaction starting at or past `last_level` is attributed to the
    /// terminal hyper-level.
    pub fn build_descriptors(&self, cur_num_hyper_levels: usize, last_level: usize) -> RunningSet {
        let mut out = RunningSet {
            descriptors: vec![HyperLevelDescriptor::default(); cur_num_hyper_levels + 1],
            rearrange_running: false,
            manual_running: false,
        };
        for compaction in &self.running {
            if compaction.reason == CompactionReason::Manual {
                out.manual_running = true;
            }
            let hyper_level = if compaction.start_level >= last_level {
                cur_num_hyper_levels
            } else {
                hyper_level_of(compaction.start_level)
            };
            let desc = &mut out.descriptors[hyper_level];
            desc.n_compactions += 1;
            desc.start_level = Some(compaction.start_level);
            if compaction.reason == CompactionReason::Rearrange {
                desc.has_rearrange = true;
                out.rearrange_running = true;
            }
        }
        out
    }
}

#[derive(Clone, Debug, Default)]
pub struct HyperLevelDescriptor {
    pub n_compactions: usize,
    pub start_level: Option<usize>,
    pub has_rearrange: bool,
}

/// Per-hyper-level view of the running set, plus the set-wide flags the
/// gates consult.
#[derive(Debug)]
pub struct RunningSet {
    descriptors: Vec<HyperLevelDescriptor>,
    pub rearrange_running: bool,
    pub manual_running: bool,
}

impl Index<usize> for RunningSet {
    type Output = HyperLevelDescriptor;

    fn index(&self, hyper_level: usize) -> &HyperLevelDescriptor {
        &self.descriptors[hyper_level]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(task_id: u64, start_level: usize, output_level: usize, reason: CompactionReason) -> RunningCompaction {
        RunningCompaction {
            task_id,
            start_level,
            output_level,
            reason,
        }
    }

    #[test]
    fn test_descriptor_attribution() {
        let mut status = CompactStatus::default();
        status.register_running(running(1, 0, 24, CompactionReason::L0FilesNum));
        status.register_running(running(2, 24, 30, CompactionReason::LevelMaxLevelSize));
        status.register_running(running(3, 30, 48, CompactionReason::Rearrange));
        // starts at the terminal level itself
        status.register_running(running(4, 49, 49, CompactionReason::ReduceNumFiles));

        let set = status.build_descriptors(2, 49);
        assert_eq!(set[0].n_compactions, 1);
        assert_eq!(set[1].n_compactions, 1);
        assert_eq!(set[1].start_level, Some(24));
        assert_eq!(set[2].n_compactions, 2);
        assert!(set[2].has_rearrange);
        assert!(set.rearrange_running);
        assert!(!set.manual_running);
        assert_eq!(status.level0_compactions_in_progress(), 1);
    }

    #[test]
    fn test_manual_flag_and_report() {
        let mut status = CompactStatus::default();
        status.register_running(running(7, 5, 10, CompactionReason::Manual));
        assert!(status.build_descriptors(1, 25).manual_running);

        assert!(status.report_compact_task(7));
        assert!(!status.report_compact_task(7));
        assert!(!status.build_descriptors(1, 25).manual_running);
    }

    #[test]
    fn test_cancel_if() {
        let mut status = CompactStatus::default();
        status.register_running(running(1, 1, 2, CompactionReason::Rearrange));
        status.register_running(running(2, 3, 4, CompactionReason::Rearrange));
        assert_eq!(status.cancel_compaction_tasks_if(|id| id == 2), 1);
        assert_eq!(status.pending_task_ids(), vec![1]);
    }
}
