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

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::compaction::compaction_config::{CompactionConfig, DbOptions};
use crate::compaction::geometry::{
    first_level_in_hyper, hyper_level_of, hyper_level_size, last_level_in_hyper, HYPER_LEVELS_MAX,
    HYPER_LEVELS_MIN,
};
use crate::compaction::picker::{
    level_needs_rearrange, CompactionInput, HyperLevelCompactionPicker, Level0CompactionPicker,
    LocalPickerStatistic, PrevPlace, RearrangePicker, SmallFileCompactionPicker,
};
use crate::compaction::status::{CompactStatus, RunningCompaction, RunningSet};
use crate::compaction::{
    CompactionPicker, CompactionPlan, CompactionReason, EventSink, InputLevel,
};
use crate::key_range::{BytewiseComparator, KeyComparator};
use crate::level::Levels;

/// The hybrid picker: one instance per column family. All mutable state
/// sits behind a single lock; `pick_compaction` is the only writer, while
/// `needs_compaction` takes read access for its advisory probe.
pub struct HybridCompactionPicker {
    ucmp: Arc<dyn KeyComparator>,
    inner: RwLock<PickerState>,
    enable_low: AtomicBool,
}

struct PickerState {
    /// 0 until the first pick initialises the column family.
    cur_num_hyper_levels: usize,
    max_num_hyper_levels: usize,
    multiplier: [u64; HYPER_LEVELS_MAX + 1],
    size_to_compact: [u64; HYPER_LEVELS_MAX + 1],
    space_amp_factor: f64,
    level0_trigger: usize,
    max_open_files: usize,
    prev_sub_compaction: [Option<PrevPlace>; HYPER_LEVELS_MAX + 1],
    next_task_id: u64,
    status: CompactStatus,
}

impl PickerState {
    fn last_level(&self) -> usize {
        last_level_in_hyper(self.cur_num_hyper_levels) + 1
    }
}

impl Default for HybridCompactionPicker {
    fn default() -> Self {
        Self::new(Arc::new(BytewiseComparator))
    }
}

impl HybridCompactionPicker {
    pub fn new(ucmp: Arc<dyn KeyComparator>) -> Self {
        Self {
            ucmp,
            inner: RwLock::new(PickerState {
                cur_num_hyper_levels: 0,
                max_num_hyper_levels: HYPER_LEVELS_MIN,
                multiplier: [0; HYPER_LEVELS_MAX + 1],
                size_to_compact: [0; HYPER_LEVELS_MAX + 1],
                space_amp_factor: 0.0,
                level0_trigger: 0,
                max_open_files: DbOptions::default().max_open_files,
                prev_sub_compaction: Default::default(),
                next_task_id: 1,
                status: CompactStatus::default(),
            }),
            enable_low: AtomicBool::new(false),
        }
    }

    /// Declares a task as succeeded, failed or canceled; the engine calls
    /// this for every plan it received.
    pub fn report_compact_task(&self, task_id: u64) -> bool {
        self.inner.write().status.report_compact_task(task_id)
    }

    pub fn cancel_compaction_tasks_if<F: Fn(u64) -> bool>(&self, should_cancel: F) -> u32 {
        self.inner.write().status.cancel_compaction_tasks_if(should_cancel)
    }

    pub fn compactions_in_progress(&self) -> Vec<RunningCompaction> {
        self.inner.read().status.compactions_in_progress().to_vec()
    }

    /// Records an engine-owned compaction (e.g. a user-triggered manual
    /// one) so the picker yields to it.
    pub fn register_running_compaction(&self, compaction: RunningCompaction) {
        self.inner.write().status.register_running(compaction);
    }

    fn init_cf(&self, state: &mut PickerState, config: &CompactionConfig, levels: &Levels) {
        state.space_amp_factor = config.space_amp_factor();
        state.max_num_hyper_levels = HYPER_LEVELS_MIN.max(hyper_level_of(config.num_levels - 2));

        let mut last_non_empty = 0;
        for level in 0..levels.num_levels() {
            if !levels.level_files(level).is_empty() {
                last_non_empty = level;
            }
        }
        state.cur_num_hyper_levels = if last_non_empty == 0 {
            HYPER_LEVELS_MIN
        } else {
            // the bulk of the data sits in the snapshot's deepest level
            HYPER_LEVELS_MIN.max(hyper_level_of(last_non_empty - 1))
        };

        let multiplier = config.min_merge_width as u64;
        let mut size_to_compact = config.write_buffer_size;
        for hyper_level in 0..=HYPER_LEVELS_MAX {
            state.multiplier[hyper_level] = multiplier;
            size_to_compact = size_to_compact.saturating_mul(multiplier);
            state.size_to_compact[hyper_level] = size_to_compact;
        }
        state.level0_trigger =
            (state.multiplier[0] as usize).min(config.level0_file_num_compaction_trigger);
    }

    fn may_run_rearrange(hyper_level: usize, running: &RunningSet) -> bool {
        hyper_level > 0
            && !running.rearrange_running
            && running[hyper_level].n_compactions == 0
    }

    fn may_run_compaction(state: &PickerState, hyper_level: usize, running: &RunningSet) -> bool {
        running[hyper_level].n_compactions == 0
            && (hyper_level == state.cur_num_hyper_levels
                || !running[hyper_level + 1].has_rearrange)
    }

    fn may_start_level_compaction(
        state: &PickerState,
        hyper_level: usize,
        running: &RunningSet,
        levels: &Levels,
    ) -> bool {
        if running[hyper_level].n_compactions > 0 {
            return false;
        }
        if hyper_level == state.cur_num_hyper_levels {
            return true;
        }
        // without a live cursor a fresh output slot must exist in the next
        // hyper-level
        if state.prev_sub_compaction[hyper_level].is_none()
            && !levels.level_files(last_level_in_hyper(hyper_level) + 1).is_empty()
        {
            return false;
        }
        // never compact into a hyper-level that is rearranging, or that is
        // free to start a rearrange it needs
        if running[hyper_level + 1].has_rearrange {
            return false;
        }
        if level_needs_rearrange(levels, hyper_level + 1)
            && running[hyper_level + 1].n_compactions == 0
        {
            return false;
        }
        true
    }

    fn need_to_run_level_compaction(
        state: &PickerState,
        hyper_level: usize,
        levels: &Levels,
    ) -> bool {
        if hyper_level == 0 {
            return levels.level_files(0).len() >= state.level0_trigger;
        }
        let last_in_hyper = last_level_in_hyper(hyper_level);
        if levels.level_files(last_in_hyper).is_empty() {
            return false;
        }
        // a run that sank this deep into the band cannot wait any longer
        let force_level = last_in_hyper - state.multiplier[hyper_level] as usize - 6;
        if !levels.level_files(force_level).is_empty() {
            return true;
        }
        let db_bytes = levels.num_level_bytes(state.last_level());
        let mut projected_share = db_bytes as f64 / (state.space_amp_factor * 1.1);
        for deeper in hyper_level + 1..=state.cur_num_hyper_levels {
            projected_share /= state.multiplier[deeper] as f64;
        }
        let max_size = state.size_to_compact[hyper_level].min(projected_share as u64);
        hyper_level_size(levels, hyper_level) > max_size
    }

    /// Promotes the database to one more hyper-level once the terminal
    /// level has outgrown the current capacity, seeding the new terminal
    /// level with the old one's run.
    fn check_db_size(&self, state: &mut PickerState, cf_name: &str, levels: &Levels) -> Option<CompactionInput> {
        let old_last = state.last_level();
        let db_bytes = levels.num_level_bytes(old_last);
        if db_bytes == 0 || state.cur_num_hyper_levels >= state.max_num_hyper_levels {
            return None;
        }
        let amp = state.space_amp_factor.max(1.3);
        let threshold = state.size_to_compact[state.cur_num_hyper_levels] as f64 * amp;
        if db_bytes as f64 <= threshold {
            return None;
        }
        let hyper_bytes = hyper_level_size(levels, state.cur_num_hyper_levels);
        let first = first_level_in_hyper(state.cur_num_hyper_levels);
        let grow = db_bytes as f64 > threshold * 1.2
            || ((hyper_bytes as f64 * amp) < db_bytes as f64
                && !levels.level_files(first + 3).is_empty())
            || !levels.level_files(first + 1).is_empty();
        if !grow {
            return None;
        }

        state.cur_num_hyper_levels += 1;
        state.prev_sub_compaction[state.cur_num_hyper_levels - 1] = None;
        tracing::info!(
            cf_name,
            db_mb = db_bytes / 1024 / 1024,
            hyper_levels = state.cur_num_hyper_levels,
            "hybrid: increasing supported db size"
        );

        Some(CompactionInput {
            input_levels: vec![
                InputLevel {
                    level: old_last,
                    table_infos: levels.level_files(old_last).to_vec(),
                },
                InputLevel {
                    level: state.last_level(),
                    table_infos: vec![],
                },
            ],
            target_level: state.last_level(),
            max_subcompactions: 1,
            max_output_file_size: u64::MAX,
            grandparents: vec![],
            trivial_move: true,
        })
    }

    /// When the deepest run of the previous hyper-level dwarfs the
    /// database, push it straight into the terminal band instead of
    /// merging it level by level.
    fn move_sst_to_last_level(&self, state: &PickerState, levels: &Levels) -> Option<CompactionInput> {
        let source = last_level_in_hyper(state.cur_num_hyper_levels - 1);
        if levels.level_files(source).is_empty() {
            return None;
        }
        let last_in_terminal = last_level_in_hyper(state.cur_num_hyper_levels);
        for output_level in (source + 1..=last_in_terminal).rev() {
            if levels.level_files(output_level).is_empty() {
                return Some(CompactionInput {
                    input_levels: vec![
                        InputLevel {
                            level: source,
                            table_infos: levels.level_files(source).to_vec(),
                        },
                        InputLevel {
                            level: output_level,
                            table_infos: vec![],
                        },
                    ],
                    target_level: output_level,
                    max_subcompactions: 1,
                    max_output_file_size: u64::MAX,
                    grandparents: vec![],
                    trivial_move: true,
                });
            }
        }
        None
    }

    /// Stamps the task id, reason and compression onto a picked input and
    /// records it as running.
    fn build_plan(
        &self,
        state: &mut PickerState,
        config: &CompactionConfig,
        input: CompactionInput,
        reason: CompactionReason,
    ) -> CompactionPlan {
        let task_id = state.next_task_id;
        state.next_task_id += 1;
        let plan = CompactionPlan {
            task_id,
            output_level: input.target_level,
            max_subcompactions: input.max_subcompactions,
            max_output_file_size: input.max_output_file_size,
            grandparents: input.grandparents,
            compression: config.compression_for(input.target_level, state.last_level()),
            reason,
            trivial_move: input.trivial_move,
            input_levels: input.input_levels,
        };
        state.status.register(&plan);
        plan
    }

    /// The output level of an in-flight sub-compaction feeding
    /// `hyper_level` from above, if any.
    fn feeding_output_level(
        state: &PickerState,
        hyper_level: usize,
        running: &RunningSet,
    ) -> Option<usize> {
        if hyper_level == 0 {
            return None;
        }
        let feeder = hyper_level - 1;
        if running[feeder].n_compactions == 0 {
            return None;
        }
        state.prev_sub_compaction[feeder].as_ref().map(|prev| prev.output_level)
    }
}

impl CompactionPicker for HybridCompactionPicker {
    fn needs_compaction(&self, levels: &Levels) -> bool {
        let state = self.inner.read();
        if state.cur_num_hyper_levels == 0 {
            return true;
        }
        let running = state
            .status
            .build_descriptors(state.cur_num_hyper_levels, state.last_level());
        for hyper_level in 0..=state.cur_num_hyper_levels {
            let rearrange_needed = level_needs_rearrange(levels, hyper_level);
            if rearrange_needed && Self::may_run_rearrange(hyper_level, &running) {
                return true;
            }
            if !rearrange_needed
                && Self::may_start_level_compaction(&state, hyper_level, &running, levels)
                && Self::need_to_run_level_compaction(&state, hyper_level, levels)
            {
                return true;
            }
        }
        levels.level_files(state.last_level()).len() > state.max_open_files / 2
    }

    fn pick_compaction(
        &self,
        cf_name: &str,
        cf_options: &CompactionConfig,
        db_options: &DbOptions,
        levels: &Levels,
    ) -> Option<CompactionPlan> {
        let mut state = self.inner.write();
        let state = &mut *state;
        let mut config = cf_options.clone();
        config.clamp();

        if state.cur_num_hyper_levels == 0 {
            self.init_cf(state, &config, levels);
            tracing::info!(
                cf_name,
                hyper_levels = state.cur_num_hyper_levels,
                max_hyper_levels = state.max_num_hyper_levels,
                "hybrid: init"
            );
        }
        state.max_open_files = db_options.max_open_files;

        let running = state
            .status
            .build_descriptors(state.cur_num_hyper_levels, state.last_level());
        if running.manual_running {
            return None;
        }

        // rearrange first: holes in a band block its compactions
        for hyper_level in 1..=state.cur_num_hyper_levels {
            let below = hyper_level - 1;
            if running[below].n_compactions == 0
                && state.prev_sub_compaction[below]
                    .as_ref()
                    .is_some_and(|prev| prev.last_key.is_empty())
            {
                state.prev_sub_compaction[below] = None;
            }
            if level_needs_rearrange(levels, hyper_level)
                && Self::may_run_rearrange(hyper_level, &running)
            {
                let floor = Self::feeding_output_level(state, hyper_level, &running);
                if let Some(mv) = RearrangePicker::new(hyper_level).pick_rearrange(levels, floor) {
                    tracing::debug!(
                        cf_name,
                        hyper_level,
                        from = mv.input_level,
                        to = mv.output_level,
                        "hybrid: rearranging"
                    );
                    let input = CompactionInput {
                        input_levels: vec![
                            InputLevel {
                                level: mv.input_level,
                                table_infos: levels.level_files(mv.input_level).to_vec(),
                            },
                            InputLevel {
                                level: mv.output_level,
                                table_infos: vec![],
                            },
                        ],
                        target_level: mv.output_level,
                        max_subcompactions: 1,
                        max_output_file_size: u64::MAX,
                        grandparents: vec![],
                        trivial_move: true,
                    };
                    return Some(self.build_plan(state, &config, input, CompactionReason::Rearrange));
                }
                tracing::debug!(cf_name, hyper_level, "hybrid: rearrange came up empty");
            }
        }

        // does the database need one more hyper-level?
        if Self::may_run_compaction(state, state.cur_num_hyper_levels, &running)
            && !running.rearrange_running
        {
            if let Some(input) = self.check_db_size(state, cf_name, levels) {
                return Some(self.build_plan(state, &config, input, CompactionReason::Rearrange));
            }
            if state.cur_num_hyper_levels > 1
                && Self::may_run_compaction(state, state.cur_num_hyper_levels - 1, &running)
            {
                let source = last_level_in_hyper(state.cur_num_hyper_levels - 1);
                let db_bytes = levels.num_level_bytes(state.last_level());
                let run_bytes = levels.num_level_bytes(source);
                let multiplier = state.multiplier[state.cur_num_hyper_levels] as f64;
                if run_bytes as f64 * multiplier * state.space_amp_factor > db_bytes as f64 {
                    if let Some(input) = self.move_sst_to_last_level(state, levels) {
                        tracing::debug!(
                            cf_name,
                            run_mb = run_bytes / 1024 / 1024,
                            db_mb = db_bytes / 1024 / 1024,
                            to = input.target_level,
                            "hybrid: moving oversized run to the terminal band"
                        );
                        return Some(self.build_plan(
                            state,
                            &config,
                            input,
                            CompactionReason::Rearrange,
                        ));
                    }
                }
            }
        }

        // normal compaction starts with L0
        if Self::may_start_level_compaction(state, 0, &running, levels)
            && levels.level_files(0).len() >= state.level0_trigger
        {
            let picker = Level0CompactionPicker::new(
                state.multiplier[0] as usize,
                state.level0_trigger,
                state.cur_num_hyper_levels,
                state.last_level(),
                config.write_buffer_size,
            );
            let mut stats = LocalPickerStatistic::default();
            if let Some(input) = picker.pick_compaction(levels, &*self.ucmp, &mut stats) {
                state.prev_sub_compaction[0] = Some(PrevPlace {
                    output_level: input.target_level,
                    last_key: Default::default(),
                });
                tracing::debug!(cf_name, to = input.target_level, "hybrid: compacting L0");
                return Some(self.build_plan(state, &config, input, CompactionReason::L0FilesNum));
            }
        }

        for hyper_level in 1..=state.cur_num_hyper_levels {
            if level_needs_rearrange(levels, hyper_level) {
                continue;
            }
            if !Self::may_start_level_compaction(state, hyper_level, &running, levels)
                || !Self::need_to_run_level_compaction(state, hyper_level, levels)
            {
                continue;
            }
            debug_assert!(!levels.level_files(last_level_in_hyper(hyper_level)).is_empty());
            let picker = HyperLevelCompactionPicker::new(
                hyper_level,
                state.cur_num_hyper_levels,
                state.last_level(),
                config.write_buffer_size,
                state.space_amp_factor,
                &*self.ucmp,
            );
            let mut stats = LocalPickerStatistic::default();
            let prev = state.prev_sub_compaction[hyper_level].clone();
            let feeding = Self::feeding_output_level(state, hyper_level, &running);
            if let Some(outcome) = picker.pick_compaction(levels, prev.as_ref(), feeding, &mut stats)
            {
                state.prev_sub_compaction[hyper_level] = Some(outcome.cursor);
                tracing::debug!(
                    cf_name,
                    hyper_level,
                    from = outcome.input.input_levels[0].level,
                    to = outcome.input.target_level,
                    "hybrid: compacting hyper-level"
                );
                return Some(self.build_plan(
                    state,
                    &config,
                    outcome.input,
                    CompactionReason::LevelMaxLevelSize,
                ));
            }
            tracing::debug!(cf_name, hyper_level, ?stats, "hybrid: level pick came up empty");
        }

        // too many files at the terminal level hurt the open-file budget
        let last_level = state.last_level();
        if levels.level_files(last_level).len() > state.max_open_files / 2
            && !state.status.any_targets_level(last_level)
        {
            let picker = SmallFileCompactionPicker::new(config.table_prefix_size);
            let mut stats = LocalPickerStatistic::default();
            if let Some(input) = picker.pick_compaction(levels, last_level, &mut stats) {
                tracing::debug!(
                    cf_name,
                    files = input.input_levels[0].table_infos.len(),
                    "hybrid: reducing small files at the terminal level"
                );
                return Some(self.build_plan(
                    state,
                    &config,
                    input,
                    CompactionReason::ReduceNumFiles,
                ));
            }
        }

        #[cfg(feature = "low-priority-compaction")]
        if self.enable_low.load(AtomicOrdering::Relaxed) {
            // Opportunistic sorted-run reduction on an idle system. The
            // thresholds are not finalised; nothing is picked yet.
        }

        tracing::debug!(cf_name, "hybrid: nothing to do");
        None
    }

    fn print_lsm_state(&self, sink: &mut dyn EventSink, levels: &Levels) {
        let state = self.inner.read();
        let hyper_level_bytes_mb: Vec<u64> = (0..=state.cur_num_hyper_levels)
            .map(|hyper_level| hyper_level_size(levels, hyper_level) / 1024 / 1024)
            .collect();
        let last_level_bytes_mb = levels.num_level_bytes(state.last_level()) / 1024 / 1024;
        sink.lsm_state(&hyper_level_bytes_mb, last_level_bytes_mb);
    }

    fn enable_low_priority_compaction(&self, enable: bool) {
        self.enable_low.store(enable, AtomicOrdering::Relaxed);
    }
}
