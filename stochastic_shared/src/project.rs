use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scale::ScaleType;
use crate::types::*;
use crate::{PATTERN_COUNT, STEP_COUNT};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to parse project: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sequence {index} has {found} steps, expected {expected}")]
    StepCount {
        index: usize,
        found: usize,
        expected: usize,
    },
    #[error("track has {found} sequences, expected {expected}")]
    PatternCount { found: usize, expected: usize },
    #[error("sequence {index} has first step {first} after last step {last}")]
    StepBounds {
        index: usize,
        first: usize,
        last: usize,
    },
}

/// One step of a stochastic sequence. Fields are kept in range by the setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Step {
    gate: bool,
    gate_probability: i32,
    gate_offset: i32,
    slide: bool,
    retrigger: i32,
    retrigger_probability: i32,
    length: i32,
    length_variation_range: i32,
    length_variation_probability: i32,
    note: i32,
    note_octave: i32,
    note_octave_probability: i32,
    note_variation_probability: i32,
    condition: Condition,
    stage_repeats: i32,
    stage_repeat_mode: StageRepeatMode,
}

impl Default for Step {
    fn default() -> Self {
        Self {
            gate: false,
            gate_probability: GATE_PROBABILITY.max,
            gate_offset: 0,
            slide: false,
            retrigger: 0,
            retrigger_probability: RETRIGGER_PROBABILITY.max,
            length: LENGTH.max / 2,
            length_variation_range: 0,
            length_variation_probability: LENGTH_VARIATION_PROBABILITY.max,
            note: 0,
            note_octave: 0,
            note_octave_probability: NOTE_OCTAVE_PROBABILITY.max,
            note_variation_probability: NOTE_VARIATION_PROBABILITY.max,
            condition: Condition::Off,
            stage_repeats: 0,
            stage_repeat_mode: StageRepeatMode::Each,
        }
    }
}

impl Step {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Pulls every field back into range after deserialization.
    pub fn normalize(&mut self) {
        self.gate_probability = GATE_PROBABILITY.clamp(self.gate_probability);
        self.gate_offset = GATE_OFFSET.clamp(self.gate_offset);
        self.retrigger = RETRIGGER.clamp(self.retrigger);
        self.retrigger_probability = RETRIGGER_PROBABILITY.clamp(self.retrigger_probability);
        self.length = LENGTH.clamp(self.length);
        self.length_variation_range = LENGTH_VARIATION_RANGE.clamp(self.length_variation_range);
        self.length_variation_probability =
            LENGTH_VARIATION_PROBABILITY.clamp(self.length_variation_probability);
        self.note = NOTE.clamp(self.note);
        self.note_octave = NOTE_OCTAVE.clamp(self.note_octave);
        self.note_octave_probability = NOTE_OCTAVE_PROBABILITY.clamp(self.note_octave_probability);
        self.note_variation_probability =
            NOTE_VARIATION_PROBABILITY.clamp(self.note_variation_probability);
        self.stage_repeats = STAGE_REPEATS.clamp(self.stage_repeats);
        if let Condition::Loop {
            base,
            offset,
            invert,
        } = self.condition
        {
            self.condition = Condition::looping(base, offset, invert);
        }
    }

    pub fn gate(&self) -> bool {
        self.gate
    }

    pub fn set_gate(&mut self, gate: bool) {
        self.gate = gate;
    }

    pub fn toggle_gate(&mut self) {
        self.gate = !self.gate;
    }

    pub fn gate_probability(&self) -> i32 {
        self.gate_probability
    }

    pub fn set_gate_probability(&mut self, value: i32) {
        self.gate_probability = GATE_PROBABILITY.clamp(value);
    }

    pub fn gate_offset(&self) -> i32 {
        self.gate_offset
    }

    pub fn set_gate_offset(&mut self, value: i32) {
        self.gate_offset = GATE_OFFSET.clamp(value);
    }

    pub fn slide(&self) -> bool {
        self.slide
    }

    pub fn set_slide(&mut self, slide: bool) {
        self.slide = slide;
    }

    pub fn retrigger(&self) -> i32 {
        self.retrigger
    }

    pub fn set_retrigger(&mut self, value: i32) {
        self.retrigger = RETRIGGER.clamp(value);
    }

    pub fn retrigger_probability(&self) -> i32 {
        self.retrigger_probability
    }

    pub fn set_retrigger_probability(&mut self, value: i32) {
        self.retrigger_probability = RETRIGGER_PROBABILITY.clamp(value);
    }

    pub fn length(&self) -> i32 {
        self.length
    }

    pub fn set_length(&mut self, value: i32) {
        self.length = LENGTH.clamp(value);
    }

    pub fn length_variation_range(&self) -> i32 {
        self.length_variation_range
    }

    pub fn set_length_variation_range(&mut self, value: i32) {
        self.length_variation_range = LENGTH_VARIATION_RANGE.clamp(value);
    }

    pub fn length_variation_probability(&self) -> i32 {
        self.length_variation_probability
    }

    pub fn set_length_variation_probability(&mut self, value: i32) {
        self.length_variation_probability = LENGTH_VARIATION_PROBABILITY.clamp(value);
    }

    pub fn note(&self) -> i32 {
        self.note
    }

    pub fn set_note(&mut self, value: i32) {
        self.note = NOTE.clamp(value);
    }

    pub fn note_octave(&self) -> i32 {
        self.note_octave
    }

    pub fn set_note_octave(&mut self, value: i32) {
        self.note_octave = NOTE_OCTAVE.clamp(value);
    }

    pub fn note_octave_probability(&self) -> i32 {
        self.note_octave_probability
    }

    pub fn set_note_octave_probability(&mut self, value: i32) {
        self.note_octave_probability = NOTE_OCTAVE_PROBABILITY.clamp(value);
    }

    /// Weight of this step's scale degree in the pitch distribution.
    pub fn note_variation_probability(&self) -> i32 {
        self.note_variation_probability
    }

    pub fn set_note_variation_probability(&mut self, value: i32) {
        self.note_variation_probability = NOTE_VARIATION_PROBABILITY.clamp(value);
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn set_condition(&mut self, condition: Condition) {
        self.condition = condition;
    }

    pub fn stage_repeats(&self) -> i32 {
        self.stage_repeats
    }

    pub fn set_stage_repeats(&mut self, value: i32) {
        self.stage_repeats = STAGE_REPEATS.clamp(value);
    }

    pub fn stage_repeat_mode(&self) -> StageRepeatMode {
        self.stage_repeat_mode
    }

    pub fn set_stage_repeat_mode(&mut self, mode: StageRepeatMode) {
        self.stage_repeat_mode = mode;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sequence {
    steps: Vec<Step>,
    /// Ticks per step in sequence-PPQN units.
    divisor: i32,
    /// Reset period in measures, `0` disables the reset.
    reset_measure: i32,
    run_mode: RunMode,
    first_step: usize,
    last_step: usize,
    /// Length of the loop memory in steps.
    sequence_length: usize,
    rest_probability: i32,
    use_loop: bool,
    reseed: bool,
    scale: Option<ScaleType>,
    root_note: Option<i32>,
}

impl Default for Sequence {
    fn default() -> Self {
        Self {
            steps: vec![Step::default(); STEP_COUNT],
            divisor: 12,
            reset_measure: 0,
            run_mode: RunMode::Forward,
            first_step: 0,
            last_step: 15,
            sequence_length: 16,
            rest_probability: REST_PROBABILITY.min,
            use_loop: false,
            reseed: false,
            scale: None,
            root_note: None,
        }
    }
}

impl Sequence {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Pulls every value field and step back into range. Step bounds are checked
    /// by [`StochasticTrack::validate`] instead.
    pub fn normalize(&mut self) {
        self.divisor = DIVISOR.clamp(self.divisor);
        self.reset_measure = RESET_MEASURE.clamp(self.reset_measure);
        self.sequence_length = self.sequence_length.clamp(1, STEP_COUNT);
        self.rest_probability = REST_PROBABILITY.clamp(self.rest_probability);
        self.root_note = self.root_note.map(|note| ROOT_NOTE.clamp(note));
        self.steps.iter_mut().for_each(Step::normalize);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Panics if `index >= STEP_COUNT`.
    pub fn step(&self, index: usize) -> &Step {
        &self.steps[index]
    }

    pub fn step_mut(&mut self, index: usize) -> &mut Step {
        &mut self.steps[index]
    }

    pub fn divisor(&self) -> i32 {
        self.divisor
    }

    pub fn set_divisor(&mut self, value: i32) {
        self.divisor = DIVISOR.clamp(value);
    }

    pub fn reset_measure(&self) -> i32 {
        self.reset_measure
    }

    pub fn set_reset_measure(&mut self, value: i32) {
        self.reset_measure = RESET_MEASURE.clamp(value);
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn set_run_mode(&mut self, mode: RunMode) {
        self.run_mode = mode;
    }

    pub fn first_step(&self) -> usize {
        self.first_step
    }

    pub fn set_first_step(&mut self, index: usize) {
        self.first_step = index.min(self.last_step);
    }

    pub fn last_step(&self) -> usize {
        self.last_step
    }

    pub fn set_last_step(&mut self, index: usize) {
        self.last_step = index.clamp(self.first_step, STEP_COUNT - 1);
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn set_sequence_length(&mut self, length: usize) {
        self.sequence_length = length.clamp(1, STEP_COUNT);
    }

    pub fn rest_probability(&self) -> i32 {
        self.rest_probability
    }

    pub fn set_rest_probability(&mut self, value: i32) {
        self.rest_probability = REST_PROBABILITY.clamp(value);
    }

    pub fn use_loop(&self) -> bool {
        self.use_loop
    }

    pub fn set_use_loop(&mut self, use_loop: bool) {
        self.use_loop = use_loop;
    }

    pub fn reseed(&self) -> bool {
        self.reseed
    }

    pub fn set_reseed(&mut self, reseed: bool) {
        self.reseed = reseed;
    }

    /// Sequence scale, falling back to the project scale.
    pub fn selected_scale(&self, project_scale: ScaleType) -> ScaleType {
        self.scale.unwrap_or(project_scale)
    }

    pub fn set_scale(&mut self, scale: Option<ScaleType>) {
        self.scale = scale;
    }

    pub fn selected_root_note(&self, project_root_note: i32) -> i32 {
        self.root_note.unwrap_or(project_root_note)
    }

    pub fn set_root_note(&mut self, root_note: Option<i32>) {
        self.root_note = root_note.map(|note| ROOT_NOTE.clamp(note));
    }
}

/// Track-level configuration plus the track's patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StochasticTrack {
    pub name: String,
    octave: i32,
    transpose: i32,
    rotate: i32,
    gate_probability_bias: i32,
    retrigger_probability_bias: i32,
    length_bias: i32,
    note_probability_bias: i32,
    fill_mode: FillMode,
    fill_amount: i32,
    cv_update_mode: CvUpdateMode,
    slide_time: i32,
    play_mode: PlayMode,
    sequences: Vec<Sequence>,
}

impl Default for StochasticTrack {
    fn default() -> Self {
        Self {
            name: "Stochastic".to_string(),
            octave: 0,
            transpose: 0,
            rotate: 0,
            gate_probability_bias: 0,
            retrigger_probability_bias: 0,
            length_bias: 0,
            note_probability_bias: 0,
            fill_mode: FillMode::Gates,
            fill_amount: FILL_AMOUNT.max,
            cv_update_mode: CvUpdateMode::Gate,
            slide_time: 50,
            play_mode: PlayMode::Aligned,
            sequences: vec![Sequence::default(); PATTERN_COUNT],
        }
    }
}

impl StochasticTrack {
    /// Parses a track from JSON, checks the fixed-capacity invariants and
    /// clamps every field into its range.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let mut track: StochasticTrack = serde_json::from_str(json)?;
        track.validate()?;
        track.normalize();
        Ok(track)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.sequences.len() != PATTERN_COUNT {
            return Err(ModelError::PatternCount {
                found: self.sequences.len(),
                expected: PATTERN_COUNT,
            });
        }
        for (index, sequence) in self.sequences.iter().enumerate() {
            if sequence.steps.len() != STEP_COUNT {
                return Err(ModelError::StepCount {
                    index,
                    found: sequence.steps.len(),
                    expected: STEP_COUNT,
                });
            }
            if sequence.first_step > sequence.last_step || sequence.last_step >= STEP_COUNT {
                return Err(ModelError::StepBounds {
                    index,
                    first: sequence.first_step,
                    last: sequence.last_step,
                });
            }
        }
        Ok(())
    }

    /// Applies the setter ranges to every track, sequence and step field.
    pub fn normalize(&mut self) {
        self.octave = OCTAVE.clamp(self.octave);
        self.transpose = TRANSPOSE.clamp(self.transpose);
        self.rotate = ROTATE.clamp(self.rotate);
        self.gate_probability_bias = PROBABILITY_BIAS.clamp(self.gate_probability_bias);
        self.retrigger_probability_bias = PROBABILITY_BIAS.clamp(self.retrigger_probability_bias);
        self.length_bias = LENGTH_BIAS.clamp(self.length_bias);
        self.note_probability_bias = PROBABILITY_BIAS.clamp(self.note_probability_bias);
        self.fill_amount = FILL_AMOUNT.clamp(self.fill_amount);
        self.slide_time = SLIDE_TIME.clamp(self.slide_time);
        self.sequences.iter_mut().for_each(Sequence::normalize);
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Panics if `pattern >= PATTERN_COUNT`.
    pub fn sequence(&self, pattern: usize) -> &Sequence {
        &self.sequences[pattern]
    }

    pub fn sequence_mut(&mut self, pattern: usize) -> &mut Sequence {
        &mut self.sequences[pattern]
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    pub fn set_octave(&mut self, value: i32) {
        self.octave = OCTAVE.clamp(value);
    }

    pub fn transpose(&self) -> i32 {
        self.transpose
    }

    pub fn set_transpose(&mut self, value: i32) {
        self.transpose = TRANSPOSE.clamp(value);
    }

    pub fn rotate(&self) -> i32 {
        self.rotate
    }

    pub fn set_rotate(&mut self, value: i32) {
        self.rotate = ROTATE.clamp(value);
    }

    pub fn gate_probability_bias(&self) -> i32 {
        self.gate_probability_bias
    }

    pub fn set_gate_probability_bias(&mut self, value: i32) {
        self.gate_probability_bias = PROBABILITY_BIAS.clamp(value);
    }

    pub fn retrigger_probability_bias(&self) -> i32 {
        self.retrigger_probability_bias
    }

    pub fn set_retrigger_probability_bias(&mut self, value: i32) {
        self.retrigger_probability_bias = PROBABILITY_BIAS.clamp(value);
    }

    pub fn length_bias(&self) -> i32 {
        self.length_bias
    }

    pub fn set_length_bias(&mut self, value: i32) {
        self.length_bias = LENGTH_BIAS.clamp(value);
    }

    pub fn note_probability_bias(&self) -> i32 {
        self.note_probability_bias
    }

    pub fn set_note_probability_bias(&mut self, value: i32) {
        self.note_probability_bias = PROBABILITY_BIAS.clamp(value);
    }

    pub fn fill_mode(&self) -> FillMode {
        self.fill_mode
    }

    pub fn set_fill_mode(&mut self, mode: FillMode) {
        self.fill_mode = mode;
    }

    /// Percentage of triggers that use the fill behaviour while fill is held.
    pub fn fill_amount(&self) -> i32 {
        self.fill_amount
    }

    pub fn set_fill_amount(&mut self, value: i32) {
        self.fill_amount = FILL_AMOUNT.clamp(value);
    }

    pub fn cv_update_mode(&self) -> CvUpdateMode {
        self.cv_update_mode
    }

    pub fn set_cv_update_mode(&mut self, mode: CvUpdateMode) {
        self.cv_update_mode = mode;
    }

    pub fn slide_time(&self) -> i32 {
        self.slide_time
    }

    pub fn set_slide_time(&mut self, value: i32) {
        self.slide_time = SLIDE_TIME.clamp(value);
    }

    pub fn play_mode(&self) -> PlayMode {
        self.play_mode
    }

    pub fn set_play_mode(&mut self, mode: PlayMode) {
        self.play_mode = mode;
    }
}

/// Project-wide settings the track engine reads on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub scale: ScaleType,
    pub root_note: i32,
    pub monitor_mode: MonitorMode,
    pub record_mode: RecordMode,
    pub selected_track: usize,
    /// Swing amount in percent, 50 is straight.
    pub swing: i32,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            scale: ScaleType::Chromatic,
            root_note: 0,
            monitor_mode: MonitorMode::Always,
            record_mode: RecordMode::Overdub,
            selected_track: 0,
            swing: SWING.min,
        }
    }
}
