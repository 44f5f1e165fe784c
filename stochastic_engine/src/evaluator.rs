//! Per-step decisions: gate, rest, condition, retrigger, length and pitch.
//!
//! Every probability is `clamp(value + bias, -1, max)` compared against a draw
//! from `[0, range)`, so `-1` never fires and `max` always fires.

use stochastic_shared::Scale;
use stochastic_shared::Step;
use stochastic_shared::types::{
    Condition, FieldRange, GATE_PROBABILITY, LENGTH, LENGTH_VARIATION_PROBABILITY, NOTE,
    NOTE_OCTAVE_PROBABILITY, REST_DRAW_RANGE, RETRIGGER_PROBABILITY, StageRepeatMode,
};

use crate::random::Random;

fn biased(value: i32, bias: i32, range: FieldRange) -> i32 {
    value.saturating_add(bias).clamp(-1, range.max)
}

fn draw(range: FieldRange, rng: &mut Random) -> i32 {
    rng.next_range(range.range() as u32) as i32
}

pub fn eval_step_gate(step: &Step, probability_bias: i32, rng: &mut Random) -> bool {
    let probability = biased(step.gate_probability(), probability_bias, GATE_PROBABILITY);
    step.gate() && draw(GATE_PROBABILITY, rng) <= probability
}

pub fn eval_rest_probability(rest_probability: i32, rng: &mut Random) -> bool {
    (rng.next_range(REST_DRAW_RANGE) as i32) <= rest_probability
}

/// Evaluates the step condition, latching the result in `prev_condition` for
/// every condition except `Pre`/`NotPre`, which only read it.
pub fn eval_step_condition(
    step: &Step,
    iteration: u32,
    fill: bool,
    prev_condition: &mut bool,
) -> bool {
    match step.condition() {
        Condition::Off => true,
        Condition::Fill => {
            *prev_condition = fill;
            *prev_condition
        }
        Condition::NotFill => {
            *prev_condition = !fill;
            *prev_condition
        }
        Condition::Pre => *prev_condition,
        Condition::NotPre => !*prev_condition,
        Condition::First => {
            *prev_condition = iteration == 0;
            *prev_condition
        }
        Condition::NotFirst => {
            *prev_condition = iteration != 0;
            *prev_condition
        }
        Condition::Loop {
            base,
            offset,
            invert,
        } => {
            if base == 0 {
                return true;
            }
            *prev_condition = (iteration % base as u32 == offset as u32) != invert;
            *prev_condition
        }
    }
}

/// Number of gate pulses for the step (`1` means no retrigger).
pub fn eval_step_retrigger(step: &Step, probability_bias: i32, rng: &mut Random) -> i32 {
    let probability = biased(
        step.retrigger_probability(),
        probability_bias,
        RETRIGGER_PROBABILITY,
    );
    if draw(RETRIGGER_PROBABILITY, rng) <= probability {
        step.retrigger().saturating_add(1)
    } else {
        1
    }
}

/// Gate length in `LENGTH.range()` units of the divisor, within `[0, LENGTH.range()]`.
pub fn eval_step_length(step: &Step, length_bias: i32, rng: &mut Random) -> i32 {
    let mut length = LENGTH.clamp(step.length().saturating_add(length_bias)) + 1;
    let probability = step.length_variation_probability();
    if draw(LENGTH_VARIATION_PROBABILITY, rng) <= probability {
        let range = step.length_variation_range();
        let mut offset = if range == 0 {
            0
        } else {
            rng.next_range(range.unsigned_abs() + 1) as i32
        };
        if range < 0 {
            offset = -offset;
        }
        length = (length + offset).clamp(0, LENGTH.range());
    }
    length
}

pub fn eval_transposition(scale: &dyn Scale, octave: i32, transpose: i32) -> i32 {
    octave * scale.notes_per_octave() + transpose
}

/// Pitch inputs that come from the track and project rather than the step.
#[derive(Clone, Copy)]
pub struct NoteParams<'a> {
    pub scale: &'a dyn Scale,
    pub root_note: i32,
    pub octave: i32,
    pub transpose: i32,
}

impl NoteParams<'_> {
    /// Volts for a scale degree, adding the root note offset on chromatic scales.
    pub fn volts(&self, note: i32) -> f32 {
        let root = if self.scale.is_chromatic() {
            self.root_note
        } else {
            0
        };
        self.scale.note_to_volts(note) + root as f32 * (1.0 / 12.0)
    }
}

/// Output voltage for the step, optionally applying the octave variation.
pub fn eval_step_note(
    step: &Step,
    probability_bias: i32,
    params: &NoteParams<'_>,
    use_variation: bool,
    rng: &mut Random,
) -> f32 {
    let notes_per_octave = params.scale.notes_per_octave();
    let mut note = step.note() + eval_transposition(params.scale, params.octave, params.transpose);
    let probability = biased(
        step.note_octave_probability(),
        probability_bias,
        NOTE_OCTAVE_PROBABILITY,
    );
    if use_variation && draw(NOTE_OCTAVE_PROBABILITY, rng) <= probability {
        let octave = rng.range_inclusive(0, step.note_octave());
        note = NOTE.clamp(note + notes_per_octave * octave);
    }
    params.volts(note)
}

/// Filters a gate by the stage-repeat mode. `stage_repeat` counts from 1 to
/// `stage_repeats + 1`.
pub fn eval_stage_repeat(
    gate: bool,
    mode: StageRepeatMode,
    stage_repeat: i32,
    stage_repeats: i32,
    rng: &mut Random,
) -> bool {
    if !gate {
        return false;
    }
    let mode = match mode {
        StageRepeatMode::Random => {
            let index = rng.next_range(StageRepeatMode::CONCRETE.len() as u32) as usize;
            StageRepeatMode::CONCRETE[index]
        }
        mode => mode,
    };
    let total = stage_repeats.saturating_add(1);
    match mode {
        StageRepeatMode::Each | StageRepeatMode::Random => true,
        StageRepeatMode::First => stage_repeat == 1,
        StageRepeatMode::Middle => stage_repeat == (total + 1) / 2,
        StageRepeatMode::Last => stage_repeat == total,
        StageRepeatMode::Odd => stage_repeat % 2 != 0,
        StageRepeatMode::Even => stage_repeat % 2 == 0,
        StageRepeatMode::Triplets => (stage_repeat - 1) % 3 == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stochastic_shared::ScaleType;
    use stochastic_shared::types::RETRIGGER;

    fn gated_step() -> Step {
        let mut step = Step::default();
        step.set_gate(true);
        step
    }

    #[test]
    fn test_gate_saturation() {
        let mut rng = Random::new(11);
        let mut step = gated_step();
        step.set_gate_probability(GATE_PROBABILITY.max);
        for _ in 0..1000 {
            assert!(eval_step_gate(&step, 0, &mut rng));
        }
    }

    #[test]
    fn test_gate_exclusion() {
        let mut rng = Random::new(12);
        let mut step = Step::default();
        step.set_gate(false);
        for bias in -8..=8 {
            for probability in 0..=7 {
                step.set_gate_probability(probability);
                assert!(!eval_step_gate(&step, bias, &mut rng));
            }
        }
    }

    #[test]
    fn test_gate_bias_never() {
        let mut rng = Random::new(13);
        let mut step = gated_step();
        step.set_gate_probability(0);
        for _ in 0..500 {
            assert!(!eval_step_gate(&step, -1, &mut rng));
        }
    }

    #[test]
    fn test_rest_extremes() {
        let mut rng = Random::new(14);
        for _ in 0..500 {
            assert!(eval_rest_probability(8, &mut rng));
            assert!(!eval_rest_probability(-1, &mut rng));
        }
    }

    #[test]
    fn test_condition_loop_automaton() {
        let mut step = Step::default();
        step.set_condition(Condition::looping(4, 0, false));
        let mut latch = false;
        for iteration in 0..100 {
            let result = eval_step_condition(&step, iteration, false, &mut latch);
            assert_eq!(result, iteration % 4 == 0, "iteration {iteration}");
            assert_eq!(latch, result);
        }
    }

    #[test]
    fn test_condition_inverted_loop() {
        let mut step = Step::default();
        step.set_condition(Condition::looping(3, 1, true));
        let mut latch = false;
        let results: Vec<bool> = (0..6)
            .map(|i| eval_step_condition(&step, i, false, &mut latch))
            .collect();
        assert_eq!(results, vec![true, false, true, true, false, true]);
    }

    #[test]
    fn test_condition_pre_reads_latch() {
        let mut fill = Step::default();
        fill.set_condition(Condition::Fill);
        let mut pre = Step::default();
        pre.set_condition(Condition::Pre);
        let mut not_pre = Step::default();
        not_pre.set_condition(Condition::NotPre);

        let mut latch = false;
        assert!(eval_step_condition(&fill, 0, true, &mut latch));
        assert!(eval_step_condition(&pre, 0, false, &mut latch));
        assert!(!eval_step_condition(&not_pre, 0, false, &mut latch));
        // Pre does not update the latch.
        assert!(latch);

        assert!(!eval_step_condition(&fill, 0, false, &mut latch));
        assert!(!eval_step_condition(&pre, 0, false, &mut latch));
    }

    #[test]
    fn test_condition_not_fill_latches_inverse() {
        let mut not_fill = Step::default();
        not_fill.set_condition(Condition::NotFill);
        let mut pre = Step::default();
        pre.set_condition(Condition::Pre);

        let mut latch = true;
        assert!(!eval_step_condition(&not_fill, 0, true, &mut latch));
        assert!(!latch);
        assert!(!eval_step_condition(&pre, 0, true, &mut latch));

        assert!(eval_step_condition(&not_fill, 1, false, &mut latch));
        assert!(latch);
        assert!(eval_step_condition(&pre, 1, false, &mut latch));
    }

    #[test]
    fn test_condition_first() {
        let mut step = Step::default();
        step.set_condition(Condition::First);
        let mut latch = false;
        assert!(eval_step_condition(&step, 0, false, &mut latch));
        assert!(!eval_step_condition(&step, 1, false, &mut latch));
        step.set_condition(Condition::NotFirst);
        assert!(eval_step_condition(&step, 5, false, &mut latch));
    }

    #[test]
    fn test_retrigger() {
        let mut rng = Random::new(15);
        let mut step = gated_step();
        step.set_retrigger(3);
        step.set_retrigger_probability(7);
        assert_eq!(eval_step_retrigger(&step, 0, &mut rng), 4);
        for _ in 0..200 {
            assert_eq!(eval_step_retrigger(&step, -8, &mut rng), 1);
        }
    }

    #[test]
    fn test_length_without_variation() {
        let mut rng = Random::new(16);
        let mut step = gated_step();
        step.set_length(3);
        step.set_length_variation_range(0);
        assert_eq!(eval_step_length(&step, 0, &mut rng), 4);
        assert_eq!(eval_step_length(&step, 8, &mut rng), 8);
        assert_eq!(eval_step_length(&step, -8, &mut rng), 1);
    }

    #[test]
    fn test_length_variation_direction() {
        let mut rng = Random::new(17);
        let mut step = gated_step();
        step.set_length(3);
        step.set_length_variation_range(-3);
        step.set_length_variation_probability(7);
        for _ in 0..200 {
            let length = eval_step_length(&step, 0, &mut rng);
            assert!((1..=4).contains(&length), "length {length}");
        }
        step.set_length_variation_range(7);
        for _ in 0..200 {
            let length = eval_step_length(&step, 0, &mut rng);
            assert!((4..=8).contains(&length), "length {length}");
        }
    }

    #[test]
    fn test_note_voltage() {
        let mut rng = Random::new(18);
        let scale = ScaleType::Chromatic;
        let params = NoteParams {
            scale: &scale,
            root_note: 2,
            octave: 1,
            transpose: 0,
        };
        let mut step = gated_step();
        step.set_note(3);
        let volts = eval_step_note(&step, 0, &params, false, &mut rng);
        // 1 octave + 3 semitones + root offset of 2 semitones.
        assert!((volts - (1.0 + 5.0 / 12.0)).abs() < 1e-5);
    }

    #[test]
    fn test_note_octave_variation_is_whole_octaves() {
        let mut rng = Random::new(19);
        let scale = ScaleType::Major;
        let params = NoteParams {
            scale: &scale,
            root_note: 0,
            octave: 0,
            transpose: 0,
        };
        let mut step = gated_step();
        step.set_note_octave(-2);
        step.set_note_octave_probability(7);
        for _ in 0..200 {
            let volts = eval_step_note(&step, 0, &params, true, &mut rng);
            assert!(
                [0.0, -1.0, -2.0].iter().any(|v| (volts - v).abs() < 1e-5),
                "volts {volts}"
            );
        }
    }

    #[test]
    fn test_stage_repeat_modes() {
        let mut rng = Random::new(20);
        let mut pattern = |mode: StageRepeatMode, stage_repeats: i32| -> Vec<bool> {
            (1..=stage_repeats + 1)
                .map(|c| eval_stage_repeat(true, mode, c, stage_repeats, &mut rng))
                .collect()
        };
        assert_eq!(
            pattern(StageRepeatMode::First, 3),
            vec![true, false, false, false]
        );
        assert_eq!(
            pattern(StageRepeatMode::Last, 3),
            vec![false, false, false, true]
        );
        assert_eq!(
            pattern(StageRepeatMode::Middle, 4),
            vec![false, false, true, false, false]
        );
        assert_eq!(
            pattern(StageRepeatMode::Odd, 3),
            vec![true, false, true, false]
        );
        assert_eq!(
            pattern(StageRepeatMode::Even, 3),
            vec![false, true, false, true]
        );
        assert_eq!(pattern(StageRepeatMode::Even, 0), vec![false]);
        assert_eq!(
            pattern(StageRepeatMode::Triplets, 6),
            vec![true, false, false, true, false, false, true]
        );
        assert!(!eval_stage_repeat(false, StageRepeatMode::Each, 1, 0, &mut rng));
    }

    #[test]
    fn test_retrigger_and_stage_repeat_saturate() {
        let mut rng = Random::new(21);
        let mut step = gated_step();
        step.set_retrigger_probability(7);
        step.set_retrigger(RETRIGGER.max);
        assert_eq!(
            eval_step_retrigger(&step, i32::MAX, &mut rng),
            RETRIGGER.max + 1
        );
        assert!(eval_stage_repeat(true, StageRepeatMode::Last, i32::MAX, i32::MAX, &mut rng));
        assert!(eval_step_gate(&step, i32::MAX, &mut rng));
    }

    #[test]
    fn test_stage_repeat_random_is_reproducible() {
        let run = |seed| {
            let mut rng = Random::new(seed);
            (0..64)
                .map(|i| eval_stage_repeat(true, StageRepeatMode::Random, i % 4 + 1, 3, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(5), run(5));
    }
}
