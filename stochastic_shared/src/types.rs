use serde::{Deserialize, Serialize};

/// Inclusive value range of a bounded step/sequence field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRange {
    pub min: i32,
    pub max: i32,
}

impl FieldRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Number of distinct values (also the random draw range for probabilities).
    pub const fn range(&self) -> i32 {
        self.max - self.min + 1
    }

    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.min, self.max)
    }
}

pub const GATE_PROBABILITY: FieldRange = FieldRange::new(0, 7);
pub const GATE_OFFSET: FieldRange = FieldRange::new(-7, 7);
pub const RETRIGGER: FieldRange = FieldRange::new(0, 3);
pub const RETRIGGER_PROBABILITY: FieldRange = FieldRange::new(0, 7);
pub const LENGTH: FieldRange = FieldRange::new(0, 7);
pub const LENGTH_VARIATION_RANGE: FieldRange = FieldRange::new(-7, 7);
pub const LENGTH_VARIATION_PROBABILITY: FieldRange = FieldRange::new(0, 7);
pub const NOTE: FieldRange = FieldRange::new(-64, 63);
pub const NOTE_OCTAVE: FieldRange = FieldRange::new(-3, 3);
pub const NOTE_OCTAVE_PROBABILITY: FieldRange = FieldRange::new(0, 7);
pub const NOTE_VARIATION_PROBABILITY: FieldRange = FieldRange::new(0, 7);
pub const STAGE_REPEATS: FieldRange = FieldRange::new(0, 7);

/// `-1` never rests, `8` always rests (draws come from `[0, 8)`).
pub const REST_PROBABILITY: FieldRange = FieldRange::new(-1, 8);
pub const REST_DRAW_RANGE: u32 = 8;

/// Sequence divisor in sequence-PPQN units.
pub const DIVISOR: FieldRange = FieldRange::new(1, 768);
pub const RESET_MEASURE: FieldRange = FieldRange::new(0, 128);

pub const PROBABILITY_BIAS: FieldRange = FieldRange::new(-8, 8);
pub const LENGTH_BIAS: FieldRange = FieldRange::new(-8, 8);
pub const OCTAVE: FieldRange = FieldRange::new(-10, 10);
pub const TRANSPOSE: FieldRange = FieldRange::new(-100, 100);
pub const ROTATE: FieldRange = FieldRange::new(-64, 64);
pub const FILL_AMOUNT: FieldRange = FieldRange::new(0, 100);
pub const SLIDE_TIME: FieldRange = FieldRange::new(0, 100);
pub const SWING: FieldRange = FieldRange::new(50, 75);
pub const ROOT_NOTE: FieldRange = FieldRange::new(0, 11);

/// Per-step predicate deciding whether the gate may fire at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Condition {
    #[default]
    Off,
    Fill,
    NotFill,
    Pre,
    NotPre,
    First,
    NotFirst,
    /// `iteration % base == offset`, optionally inverted.
    Loop { base: u8, offset: u8, invert: bool },
}

impl Condition {
    /// Loop condition with `offset` folded into `0..base`.
    pub fn looping(base: u8, offset: u8, invert: bool) -> Self {
        let base = base.max(1);
        Condition::Loop {
            base,
            offset: offset % base,
            invert,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StageRepeatMode {
    #[default]
    Each,
    First,
    Middle,
    Last,
    Odd,
    Even,
    Triplets,
    Random,
}

impl StageRepeatMode {
    /// The modes `Random` picks from.
    pub const CONCRETE: [StageRepeatMode; 7] = [
        StageRepeatMode::Each,
        StageRepeatMode::First,
        StageRepeatMode::Middle,
        StageRepeatMode::Last,
        StageRepeatMode::Odd,
        StageRepeatMode::Even,
        StageRepeatMode::Triplets,
    ];
}

/// How the sequence position moves between first and last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RunMode {
    #[default]
    Forward,
    Backward,
    /// Forward then backward, repeating the end steps.
    Pendulum,
    /// Forward then backward, without repeating the end steps.
    PingPong,
    Random,
    RandomWalk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlayMode {
    #[default]
    Aligned,
    Free,
    /// Kept as a terminal state; the engine does not advance in this mode.
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FillMode {
    #[default]
    None,
    Gates,
    NextPattern,
    Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CvUpdateMode {
    #[default]
    Gate,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MonitorMode {
    #[default]
    Always,
    Stopped,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RecordMode {
    #[default]
    Overdub,
    Overwrite,
    StepRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_range() {
        assert_eq!(GATE_PROBABILITY.range(), 8);
        assert_eq!(LENGTH.range(), 8);
        assert_eq!(NOTE_OCTAVE.clamp(5), 3);
        assert_eq!(REST_PROBABILITY.clamp(-4), -1);
    }

    #[test]
    fn test_loop_condition_folds_offset() {
        assert_eq!(
            Condition::looping(4, 6, false),
            Condition::Loop {
                base: 4,
                offset: 2,
                invert: false,
            }
        );
        assert_eq!(
            Condition::looping(0, 0, true),
            Condition::Loop {
                base: 1,
                offset: 0,
                invert: true,
            }
        );
    }
}
