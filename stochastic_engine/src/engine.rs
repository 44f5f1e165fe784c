use stochastic_shared::types::{
    CvUpdateMode, FillMode, GATE_OFFSET, LENGTH, MonitorMode, PlayMode, RecordMode,
};
use stochastic_shared::{
    MidiMessage, PATTERN_COUNT, ProjectSettings, STEP_COUNT, Scale, StochasticTrack,
};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::evaluator::{
    NoteParams, eval_stage_repeat, eval_step_condition, eval_step_gate, eval_step_length,
    eval_step_note, eval_step_retrigger, eval_transposition,
};
use crate::groove::Groove;
use crate::output::MidiOutput;
use crate::queue::{CvEvent, EventQueue};
use crate::random::Random;
use crate::record::{RecordHistory, note_from_midi_note, quantize, write_recorded_step};
use crate::sequence_state::{SequenceState, rotate_step};
use crate::slide::apply_slide;
use crate::transport::TransportState;
use crate::weighted::{LoopMemory, Selection, WeightedPitchSelector};

/// Everything outside the track the engine reads or notifies during a call.
pub struct EngineContext<'a> {
    pub transport: TransportState,
    pub project: &'a ProjectSettings,
    pub groove: &'a dyn Groove,
    pub output: &'a mut dyn MidiOutput,
}

/// Timing snapshot a track publishes for tracks linked to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkData {
    pub divisor: u32,
    pub relative_tick: u32,
    pub sequence_state: SequenceState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickResult {
    pub gate_update: bool,
    pub cv_update: bool,
}

/// What the most recent trigger decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// No position yet, nothing evaluated.
    #[default]
    Idle,
    Rest,
    /// Every degree had zero weight.
    Silent,
    Triggered { degree: usize, gate: bool },
}

/// Stochastic track engine: picks a weighted scale degree per step and
/// schedules the resulting gate and CV changes.
pub struct StochasticEngine {
    track_index: usize,
    config: EngineConfig,
    pattern: usize,
    mute: bool,
    fill: bool,

    rng: Random,
    selector: WeightedPitchSelector,
    sequence_state: SequenceState,
    free_relative_tick: u32,
    current_step: i32,
    current_stage_repeat: i32,
    prev_condition: bool,
    last_outcome: TriggerOutcome,
    link_data: Option<LinkData>,

    activity: bool,
    gate_output: bool,
    cv_output: f32,
    cv_output_target: f32,
    slide_active: bool,
    monitor_override_active: bool,
    monitor_step: Option<usize>,
    step_record_index: Option<usize>,

    gate_queue: EventQueue<bool>,
    cv_queue: EventQueue<CvEvent>,
    record_history: RecordHistory,
}

impl StochasticEngine {
    pub fn new(track_index: usize, config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            track_index,
            config: config.clone(),
            pattern: 0,
            mute: false,
            fill: false,
            rng: Random::new(config.seed),
            selector: WeightedPitchSelector::new(),
            sequence_state: SequenceState::default(),
            free_relative_tick: 0,
            current_step: -1,
            current_stage_repeat: 1,
            prev_condition: false,
            last_outcome: TriggerOutcome::Idle,
            link_data: None,
            activity: false,
            gate_output: false,
            cv_output: 0.0,
            cv_output_target: 0.0,
            slide_active: false,
            monitor_override_active: false,
            monitor_step: None,
            step_record_index: None,
            gate_queue: EventQueue::new(config.gate_queue_capacity),
            cv_queue: EventQueue::new(config.cv_queue_capacity),
            record_history: RecordHistory::new(config.record_history_capacity),
        })
    }

    /// Drops all scheduled events and live state. CV output and loop memory are kept.
    pub fn reset(&mut self) {
        self.free_relative_tick = 0;
        self.sequence_state.reset();
        self.current_step = -1;
        self.current_stage_repeat = 1;
        self.prev_condition = false;
        self.activity = false;
        self.gate_output = false;
        self.slide_active = false;
        self.last_outcome = TriggerOutcome::Idle;
        self.gate_queue.clear();
        self.cv_queue.clear();
        self.record_history.clear();
        info!(track = self.track_index, "engine reset");

        self.change_pattern();
    }

    /// Rewinds the position only.
    pub fn restart(&mut self) {
        self.free_relative_tick = 0;
        self.sequence_state.reset();
        self.current_step = -1;
    }

    pub fn tick(
        &mut self,
        tick: u32,
        track: &mut StochasticTrack,
        ctx: &mut EngineContext<'_>,
        link: Option<&LinkData>,
    ) -> TickResult {
        if let Some(link) = link {
            self.link_data = Some(*link);
            self.sequence_state = link.sequence_state;

            if link.divisor > 0 && link.relative_tick % link.divisor == 0 {
                self.record_step(tick, link.divisor, track, ctx);
                self.last_outcome = self.trigger_step(tick, link.divisor, track, ctx);
            }
        } else {
            let sequence = track.sequence(self.pattern);
            let divisor = self.config.divisor_ticks(sequence.divisor());
            let mut relative_tick = ctx.transport.relative_tick(tick, sequence.reset_measure());

            if relative_tick == 0 {
                self.reset();
            }

            let sequence = track.sequence(self.pattern);
            let run_mode = sequence.run_mode();
            let (first_step, last_step) = (sequence.first_step(), sequence.last_step());

            match track.play_mode() {
                PlayMode::Aligned => {
                    if relative_tick % divisor == 0 {
                        self.sequence_state.advance_aligned(
                            relative_tick / divisor,
                            run_mode,
                            first_step,
                            last_step,
                            &mut self.rng,
                        );
                        self.record_step(tick, divisor, track, ctx);
                        self.last_outcome = self.trigger_step(tick, divisor, track, ctx);
                    }
                }
                PlayMode::Free => {
                    relative_tick = self.free_relative_tick;
                    self.free_relative_tick += 1;
                    if self.free_relative_tick >= divisor {
                        self.free_relative_tick = 0;
                    }

                    if relative_tick == 0 {
                        if self.current_stage_repeat == 1 || self.sequence_state.step() < 0 {
                            self.sequence_state.advance_free(
                                run_mode,
                                first_step,
                                last_step,
                                &mut self.rng,
                            );
                        }

                        self.record_step(tick, divisor, track, ctx);
                        let stage_repeats = track
                            .sequence(self.pattern)
                            .step(self.sequence_state.step() as usize)
                            .stage_repeats();
                        let last_stage_step =
                            self.current_stage_repeat >= stage_repeats.saturating_add(1);

                        let schedule_tick = tick.saturating_add(divisor);
                        self.last_outcome = self.trigger_step(schedule_tick, divisor, track, ctx);

                        if last_stage_step {
                            self.current_stage_repeat = 1;
                        } else {
                            self.current_stage_repeat += 1;
                        }
                    }
                }
                PlayMode::Last => {}
            }

            self.link_data = Some(LinkData {
                divisor,
                relative_tick,
                sequence_state: self.sequence_state,
            });
        }

        self.drain_queues(tick, track, ctx)
    }

    fn drain_queues(
        &mut self,
        tick: u32,
        track: &StochasticTrack,
        ctx: &mut EngineContext<'_>,
    ) -> TickResult {
        let mut result = TickResult::default();

        while let Some(entry) = self.gate_queue.pop_due(tick) {
            if !self.monitor_override_active {
                result.gate_update = true;
                self.activity = entry.value;
                self.gate_output = (!self.mute || self.fill) && self.activity;
                ctx.output.send_gate(self.track_index, self.gate_output);
            }
        }

        let cv_enabled = !self.mute || track.cv_update_mode() == CvUpdateMode::Always;
        while let Some(entry) = self.cv_queue.pop_due(tick) {
            if cv_enabled && !self.monitor_override_active {
                result.cv_update = true;
                self.cv_output_target = entry.value.volts;
                self.slide_active = entry.value.slide;
                ctx.output.send_cv(self.track_index, self.cv_output_target);
                ctx.output.send_slide(self.track_index, self.slide_active);
            }
        }

        result
    }

    fn trigger_step(
        &mut self,
        tick: u32,
        divisor: u32,
        track: &mut StochasticTrack,
        ctx: &mut EngineContext<'_>,
    ) -> TriggerOutcome {
        let fill_step = self.fill && self.rng.next_range(100) < track.fill_amount() as u32;
        let use_fill_gates = fill_step && track.fill_mode() == FillMode::Gates;
        let use_fill_sequence = fill_step && track.fill_mode() == FillMode::NextPattern;
        let use_fill_condition = fill_step && track.fill_mode() == FillMode::Condition;

        let sequence = track.sequence(self.pattern);
        self.current_step = rotate_step(
            self.sequence_state.step(),
            sequence.first_step(),
            sequence.last_step(),
            track.rotate(),
        );
        if self.current_step < 0 {
            return TriggerOutcome::Idle;
        }

        let scale = sequence.selected_scale(ctx.project.scale);
        let absolute_step = ctx.transport.relative_tick(tick, sequence.reset_measure()) / divisor;
        let note_bias = track.note_probability_bias();
        let selection = self.selector.select(
            track.sequence_mut(self.pattern),
            scale.notes_per_octave() as usize,
            note_bias,
            absolute_step,
            &mut self.rng,
        );

        let degree = match selection {
            Selection::Rest => {
                debug!(track = self.track_index, tick, "rest");
                return TriggerOutcome::Rest;
            }
            Selection::Silent => {
                debug!(track = self.track_index, tick, "no weighted degree");
                return TriggerOutcome::Silent;
            }
            Selection::Degree(degree) => degree,
        };

        let step = track.sequence(self.pattern).step(degree).clone();
        let swing = ctx.project.swing;

        let gate_offset = divisor as i64 * step.gate_offset() as i64 / (GATE_OFFSET.max + 1) as i64;
        let step_tick = (tick as i64 + gate_offset).clamp(0, u32::MAX as i64) as u32;

        let mut step_gate =
            eval_step_gate(&step, track.gate_probability_bias(), &mut self.rng) || use_fill_gates;
        if step_gate {
            step_gate = eval_step_condition(
                &step,
                self.sequence_state.iteration(),
                use_fill_condition,
                &mut self.prev_condition,
            );
        }
        step_gate = eval_stage_repeat(
            step_gate,
            step.stage_repeat_mode(),
            self.current_stage_repeat,
            step.stage_repeats(),
            &mut self.rng,
        );

        if step_gate {
            let length_units = eval_step_length(&step, track.length_bias(), &mut self.rng) as u32;
            let length = divisor.saturating_mul(length_units) / LENGTH.range() as u32;
            let retrigger_bias = track.retrigger_probability_bias();
            let retrigger = eval_step_retrigger(&step, retrigger_bias, &mut self.rng);
            let scheduled =
                self.schedule_gates(step_tick, length, divisor, retrigger, swing, ctx.groove);
            if let Err(err) = scheduled {
                warn!(track = self.track_index, %err, "gate dropped");
            }
        }

        if step_gate || track.cv_update_mode() == CvUpdateMode::Always {
            let eval_pattern = if use_fill_sequence {
                self.fill_pattern()
            } else {
                self.pattern
            };
            let eval_sequence = track.sequence(eval_pattern);
            let eval_scale = eval_sequence.selected_scale(ctx.project.scale);
            let params = NoteParams {
                scale: &eval_scale,
                root_note: eval_sequence.selected_root_note(ctx.project.root_note),
                octave: track.octave(),
                transpose: track.transpose(),
            };
            let volts = eval_step_note(&step, note_bias, &params, true, &mut self.rng);
            let cv_tick = ctx.groove.apply_swing(step_tick, swing);
            let event = CvEvent {
                volts,
                slide: step.slide(),
            };
            if let Err(err) = self.cv_queue.push_replace(cv_tick, event) {
                warn!(track = self.track_index, %err, "cv update dropped");
            }
        }

        debug!(
            track = self.track_index,
            tick,
            degree,
            gate = step_gate,
            "step triggered"
        );
        TriggerOutcome::Triggered {
            degree,
            gate: step_gate,
        }
    }

    /// Queues the gate pulses of one step. Stops at the first pulse that does not fit.
    fn schedule_gates(
        &mut self,
        step_tick: u32,
        step_length: u32,
        divisor: u32,
        retrigger: i32,
        swing: i32,
        groove: &dyn Groove,
    ) -> Result<(), EngineError> {
        if retrigger > 1 {
            let count = retrigger as u32;
            let spacing = divisor / count;
            let mut offset = 0;
            for _ in 0..count {
                if offset > step_length {
                    break;
                }
                let on = step_tick.saturating_add(offset);
                let off = on.saturating_add(spacing / 2);
                self.push_gate(
                    groove.apply_swing(on, swing),
                    groove.apply_swing(off, swing),
                )?;
                offset += spacing;
            }
            Ok(())
        } else {
            let off = step_tick.saturating_add(step_length);
            self.push_gate(
                groove.apply_swing(step_tick, swing),
                groove.apply_swing(off, swing),
            )
        }
    }

    fn push_gate(&mut self, on: u32, off: u32) -> Result<(), EngineError> {
        // An unmatched gate-on would hang the output.
        if self.gate_queue.remaining() < 2 {
            return Err(EngineError::QueueFull {
                tick: on,
                capacity: self.gate_queue.capacity(),
            });
        }
        self.gate_queue.push_replace(on, true)?;
        self.gate_queue.push_replace(off, false)
    }

    /// Writes the notes played during the step that just ended into the previous step.
    fn record_step(
        &mut self,
        tick: u32,
        divisor: u32,
        track: &mut StochasticTrack,
        ctx: &EngineContext<'_>,
    ) {
        let record_mode = ctx.project.record_mode;
        let prev_step = self.sequence_state.prev_step();
        if !ctx.transport.recording || record_mode == RecordMode::StepRecord || prev_step < 0 {
            return;
        }

        let selected = self.is_selected(ctx.project);
        let sequence = track.sequence_mut(self.pattern);
        let scale = sequence.selected_scale(ctx.project.scale);
        let root_note = sequence.selected_root_note(ctx.project.root_note);
        let step = sequence.step_mut(prev_step as usize);

        match quantize(&self.record_history, tick, divisor) {
            Some(recorded) => {
                let note = note_from_midi_note(recorded.note, &scale, root_note);
                write_recorded_step(step, note, recorded.length_ticks, divisor);
                debug!(
                    track = self.track_index,
                    step = prev_step,
                    note,
                    "recorded step"
                );
            }
            None if selected && record_mode == RecordMode::Overwrite => step.clear(),
            None => {}
        }
    }

    /// Per-frame work: monitoring overrides and CV slew.
    pub fn update(&mut self, dt: f32, track: &StochasticTrack, ctx: &mut EngineContext<'_>) {
        let running = ctx.transport.running;
        let sequence = track.sequence(self.pattern);
        let scale = sequence.selected_scale(ctx.project.scale);
        let params = NoteParams {
            scale: &scale,
            root_note: sequence.selected_root_note(ctx.project.root_note),
            octave: track.octave(),
            transpose: track.transpose(),
        };

        let live_monitoring = match ctx.project.monitor_mode {
            MonitorMode::Always => true,
            MonitorMode::Stopped => !running,
            MonitorMode::Off => false,
        };

        if let Some(index) = self.monitor_step.filter(|_| !running) {
            let volts = eval_step_note(sequence.step(index), 0, &params, false, &mut self.rng);
            self.set_override(volts, ctx);
        } else if let Some(note) = self.record_history.active_note().filter(|_| live_monitoring) {
            let note = note_from_midi_note(note, &scale, params.root_note)
                + eval_transposition(&scale, params.octave, params.transpose);
            self.set_override(params.volts(note), ctx);
        } else {
            self.clear_override(ctx);
        }

        if self.slide_active && track.slide_time() > 0 {
            self.cv_output = apply_slide(
                self.cv_output,
                self.cv_output_target,
                track.slide_time(),
                dt,
            );
        } else {
            self.cv_output = self.cv_output_target;
        }
    }

    fn set_override(&mut self, volts: f32, ctx: &mut EngineContext<'_>) {
        self.cv_output_target = volts;
        self.activity = true;
        self.gate_output = true;
        self.monitor_override_active = true;
        ctx.output.send_gate(self.track_index, true);
        ctx.output.send_cv(self.track_index, volts);
        ctx.output.send_slide(self.track_index, false);
    }

    fn clear_override(&mut self, ctx: &mut EngineContext<'_>) {
        if self.monitor_override_active {
            self.activity = false;
            self.gate_output = false;
            self.monitor_override_active = false;
            ctx.output.send_gate(self.track_index, false);
        }
    }

    pub fn set_pattern(&mut self, pattern: usize) {
        self.pattern = pattern;
        self.change_pattern();
        info!(
            track = self.track_index,
            pattern = self.pattern,
            "pattern changed"
        );
    }

    /// Re-resolves the playing sequence after the pattern index changed.
    pub fn change_pattern(&mut self) {
        self.pattern = self.pattern.min(PATTERN_COUNT - 1);
    }

    fn fill_pattern(&self) -> usize {
        (self.pattern + 1).min(PATTERN_COUNT - 1)
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub fn set_fill(&mut self, fill: bool) {
        self.fill = fill;
    }

    pub fn monitor_midi(&mut self, tick: u32, message: &MidiMessage) {
        self.record_history.write(tick, message);
    }

    pub fn clear_midi_monitoring(&mut self) {
        self.record_history.clear();
    }

    /// Selects the step to audition while stopped. Out-of-range indices clear it.
    pub fn set_monitor_step(
        &mut self,
        index: Option<i32>,
        track: &StochasticTrack,
        ctx: &EngineContext<'_>,
    ) {
        self.monitor_step = index
            .filter(|&i| i >= 0 && (i as usize) < STEP_COUNT)
            .map(|i| i as usize);

        if let Some(index) = self.monitor_step {
            let sequence = track.sequence(self.pattern);
            if ctx.transport.recording
                && ctx.project.record_mode == RecordMode::StepRecord
                && (sequence.first_step()..=sequence.last_step()).contains(&index)
            {
                self.step_record_index = Some(index);
            }
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng.reseed(seed);
        debug!(track = self.track_index, seed, "reseeded");
    }

    fn is_selected(&self, project: &ProjectSettings) -> bool {
        project.selected_track == self.track_index
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }

    pub fn pattern(&self) -> usize {
        self.pattern
    }

    pub fn mute(&self) -> bool {
        self.mute
    }

    pub fn fill(&self) -> bool {
        self.fill
    }

    /// Rotated index of the playing step, `-1` before the first step.
    pub fn current_step(&self) -> i32 {
        self.current_step
    }

    pub fn current_record_step(&self) -> Option<usize> {
        self.step_record_index
    }

    pub fn activity(&self) -> bool {
        self.activity
    }

    pub fn gate_output(&self) -> bool {
        self.gate_output
    }

    pub fn cv_output(&self) -> f32 {
        self.cv_output
    }

    pub fn monitor_override_active(&self) -> bool {
        self.monitor_override_active
    }

    pub fn is_active_sequence(&self, pattern: usize) -> bool {
        pattern == self.pattern
    }

    pub fn sequence_state(&self) -> &SequenceState {
        &self.sequence_state
    }

    pub fn link_data(&self) -> Option<&LinkData> {
        self.link_data.as_ref()
    }

    pub fn last_outcome(&self) -> TriggerOutcome {
        self.last_outcome
    }

    pub fn last_degree(&self) -> Option<usize> {
        match self.last_outcome {
            TriggerOutcome::Triggered { degree, .. } => Some(degree),
            _ => None,
        }
    }

    pub fn gate_queue(&self) -> &EventQueue<bool> {
        &self.gate_queue
    }

    pub fn cv_queue(&self) -> &EventQueue<CvEvent> {
        &self.cv_queue
    }

    pub fn record_history(&self) -> &RecordHistory {
        &self.record_history
    }

    pub fn loop_memory(&self) -> &LoopMemory {
        self.selector.memory()
    }
}
