use stochastic_shared::Sequence;
use stochastic_shared::types::NOTE_VARIATION_PROBABILITY;

use crate::evaluator::eval_rest_probability;
use crate::random::Random;

/// Weight of one scale degree in the pitch distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegreeWeight {
    pub index: usize,
    pub weight: i32,
}

/// Result of choosing a pitch for a triggered position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The rest probability fired.
    Rest,
    /// Every degree has zero weight.
    Silent,
    Degree(usize),
}

/// One weight per scale degree, taken from the step at the same index.
/// Negative weights (`-1`, "never") count as zero.
pub fn build_distribution(
    sequence: &Sequence,
    notes_per_octave: usize,
    probability_bias: i32,
) -> Vec<DegreeWeight> {
    (0..notes_per_octave.min(sequence.steps().len()))
        .map(|index| {
            let weight = sequence
                .step(index)
                .note_variation_probability()
                .saturating_add(probability_bias)
                .clamp(-1, NOTE_VARIATION_PROBABILITY.max)
                .max(0);
            DegreeWeight { index, weight }
        })
        .collect()
}

/// Draws a degree proportionally to its weight, `None` when all weights are zero.
pub fn next_weighted_pitch(distribution: &[DegreeWeight], rng: &mut Random) -> Option<usize> {
    let total: i32 = distribution.iter().map(|d| d.weight).sum();
    if total <= 0 {
        return None;
    }
    let mut rnd = 1 + rng.next_range(total as u32) as i32;
    for degree in distribution {
        if degree.weight > 0 && rnd <= degree.weight {
            return Some(degree.index);
        }
        rnd -= degree.weight;
    }
    None
}

/// Remembers the degree chosen at each position of the loop so it can be
/// replayed verbatim while looping is enabled.
#[derive(Debug, Clone, Default)]
pub struct LoopMemory {
    slots: Vec<Option<usize>>,
    filled: usize,
}

impl LoopMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.filled = 0;
    }

    /// Number of recorded positions.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn is_full(&self) -> bool {
        !self.slots.is_empty() && self.filled == self.slots.len()
    }

    pub fn get(&self, position: usize) -> Option<usize> {
        self.slots.get(position).copied().flatten()
    }

    /// Resolves the degree for `position`: replays a stored value while looping,
    /// otherwise records `drawn` (clearing first once a full loop was recorded).
    pub fn apply(&mut self, position: usize, length: usize, use_loop: bool, drawn: usize) -> usize {
        let length = length.max(1);
        if self.slots.len() != length {
            self.slots = vec![None; length];
            self.filled = 0;
        }
        let position = position % length;

        if use_loop {
            if let Some(stored) = self.slots[position] {
                return stored;
            }
        } else if self.is_full() {
            self.clear();
        }

        if self.slots[position].replace(drawn).is_none() {
            self.filled += 1;
        }
        drawn
    }
}

/// Picks the scale degree for each triggered position and owns the loop memory.
#[derive(Debug, Clone, Default)]
pub struct WeightedPitchSelector {
    memory: LoopMemory,
}

impl WeightedPitchSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(&self) -> &LoopMemory {
        &self.memory
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    /// Runs the rest draw, the weighted draw and the loop memory for one position.
    ///
    /// A pending reseed flag on the sequence restarts `rng` from its seed before
    /// the weighted draw and is cleared.
    pub fn select(
        &mut self,
        sequence: &mut Sequence,
        notes_per_octave: usize,
        probability_bias: i32,
        absolute_step: u32,
        rng: &mut Random,
    ) -> Selection {
        if eval_rest_probability(sequence.rest_probability(), rng) {
            return Selection::Rest;
        }

        let mut distribution = build_distribution(sequence, notes_per_octave, probability_bias);
        if distribution.iter().all(|d| d.weight == 0) {
            return Selection::Silent;
        }
        distribution.sort_by(|a, b| b.weight.cmp(&a.weight));

        if sequence.reseed() {
            rng.restart();
            sequence.set_reseed(false);
        }

        let Some(drawn) = next_weighted_pitch(&distribution, rng) else {
            return Selection::Silent;
        };

        let length = sequence.sequence_length();
        let position = absolute_step as usize % length.max(1);
        Selection::Degree(self.memory.apply(position, length, sequence.use_loop(), drawn))
    }
}
