use stochastic_shared::types::RunMode;

use crate::random::Random;

/// Position of a track inside its sequence.
///
/// Step indices are `-1` before the first advance. The state is `Copy` so a
/// linked track can mirror it from the engine it follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceState {
    step: i32,
    prev_step: i32,
    next_step: i32,
    direction: i32,
    iteration: u32,
    advances: u32,
}

impl Default for SequenceState {
    fn default() -> Self {
        Self {
            step: -1,
            prev_step: -1,
            next_step: -1,
            direction: 1,
            iteration: 0,
            advances: 0,
        }
    }
}

impl SequenceState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn step(&self) -> i32 {
        self.step
    }

    pub fn prev_step(&self) -> i32 {
        self.prev_step
    }

    /// Look-ahead step, `-1` when it cannot be known in advance.
    pub fn next_step(&self) -> i32 {
        self.next_step
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Derives the position from an absolute step counter (aligned play mode).
    pub fn advance_aligned(
        &mut self,
        absolute_step: u32,
        run_mode: RunMode,
        first_step: usize,
        last_step: usize,
        rng: &mut Random,
    ) {
        self.prev_step = self.step;
        let first = first_step as i32;
        let last = last_step.max(first_step) as i32;
        let count = (last - first + 1) as u32;

        match StepGenerator::aligned_step(absolute_step, run_mode, first, last) {
            Some((step, iteration)) => {
                self.step = step;
                self.iteration = iteration;
                let next = absolute_step.saturating_add(1);
                self.next_step = StepGenerator::aligned_step(next, run_mode, first, last)
                    .map(|(step, _)| step)
                    .unwrap_or(-1);
            }
            None => {
                self.step = match run_mode {
                    RunMode::RandomWalk if self.step >= first && self.step <= last => {
                        StepGenerator::random_walk(self.step, first, last, rng)
                    }
                    _ => first + rng.next_range(count) as i32,
                };
                self.iteration = absolute_step / count;
                self.next_step = -1;
            }
        }
    }

    /// Moves one step from the current position (free play mode).
    pub fn advance_free(
        &mut self,
        run_mode: RunMode,
        first_step: usize,
        last_step: usize,
        rng: &mut Random,
    ) {
        self.prev_step = self.step;
        let first = first_step as i32;
        let last = last_step.max(first_step) as i32;
        let count = (last - first + 1) as u32;
        let is_random = matches!(run_mode, RunMode::Random | RunMode::RandomWalk);

        if self.step < 0 {
            self.step = match run_mode {
                RunMode::Backward => last,
                RunMode::Random | RunMode::RandomWalk => first + rng.next_range(count) as i32,
                _ => first,
            };
            self.direction = if run_mode == RunMode::Backward { -1 } else { 1 };
            self.iteration = 0;
            self.advances = 0;
        } else if is_random {
            self.step = if self.next_step >= first && self.next_step <= last {
                self.next_step
            } else {
                StepGenerator::free_move(self, run_mode, first, last, rng).0
            };
            self.advances += 1;
            self.iteration = self.advances / count;
        } else {
            let (step, direction, wrapped) =
                StepGenerator::free_move(self, run_mode, first, last, rng);
            self.step = step;
            self.direction = direction;
            if wrapped {
                self.iteration += 1;
            }
        }

        // Random modes draw the look-ahead now and consume it on the next advance.
        self.next_step = StepGenerator::free_move(self, run_mode, first, last, rng).0;
    }
}

/// Stateless stepping rules shared by the aligned and free advance paths.
pub struct StepGenerator;

impl StepGenerator {
    /// Step and iteration for an absolute counter, `None` for random run modes.
    pub fn aligned_step(
        counter: u32,
        run_mode: RunMode,
        first: i32,
        last: i32,
    ) -> Option<(i32, u32)> {
        if last <= first {
            return Some((first, counter));
        }
        let len = (last - first + 1) as u32;

        match run_mode {
            RunMode::Forward => Some((first + (counter % len) as i32, counter / len)),
            RunMode::Backward => Some((last - (counter % len) as i32, counter / len)),
            RunMode::Pendulum => {
                // 0 1 2 3 3 2 1 0
                let period = len * 2;
                let pos = counter % period;
                let step = if pos < len {
                    first + pos as i32
                } else {
                    last - (pos - len) as i32
                };
                Some((step, counter / period))
            }
            RunMode::PingPong => {
                // 0 1 2 3 2 1
                let period = len * 2 - 2;
                let pos = counter % period;
                let step = if pos < len {
                    first + pos as i32
                } else {
                    last - (pos - len + 1) as i32
                };
                Some((step, counter / period))
            }
            RunMode::Random | RunMode::RandomWalk => None,
        }
    }

    /// Next `(step, direction, wrapped)` from `state`; `wrapped` marks a completed iteration.
    fn free_move(
        state: &SequenceState,
        run_mode: RunMode,
        first: i32,
        last: i32,
        rng: &mut Random,
    ) -> (i32, i32, bool) {
        let step = state.step;
        let direction = state.direction;
        if step < first || step > last {
            return (first, 1, false);
        }
        if first == last {
            return (first, direction, true);
        }

        match run_mode {
            RunMode::Forward => {
                if step >= last {
                    (first, 1, true)
                } else {
                    (step + 1, 1, false)
                }
            }
            RunMode::Backward => {
                if step <= first {
                    (last, -1, true)
                } else {
                    (step - 1, -1, false)
                }
            }
            RunMode::Pendulum => {
                if direction > 0 && step >= last {
                    (last, -1, false)
                } else if direction < 0 && step <= first {
                    (first, 1, true)
                } else {
                    (step + direction, direction, false)
                }
            }
            RunMode::PingPong => {
                if direction > 0 && step >= last {
                    (last - 1, -1, false)
                } else if direction < 0 && step <= first {
                    (first + 1, 1, true)
                } else {
                    (step + direction, direction, false)
                }
            }
            RunMode::Random => {
                let count = (last - first + 1) as u32;
                (first + rng.next_range(count) as i32, direction, false)
            }
            RunMode::RandomWalk => (Self::random_walk(step, first, last, rng), direction, false),
        }
    }

    /// One step left or right, wrapping at the bounds.
    fn random_walk(step: i32, first: i32, last: i32, rng: &mut Random) -> i32 {
        let next = if rng.next_range(2) == 0 {
            step - 1
        } else {
            step + 1
        };
        if next < first {
            last
        } else if next > last {
            first
        } else {
            next
        }
    }
}

/// Applies the track rotation to a step index within `[first_step, last_step]`.
pub fn rotate_step(step: i32, first_step: usize, last_step: usize, rotate: i32) -> i32 {
    if step < 0 {
        return step;
    }
    let first = first_step as i32;
    let count = last_step.max(first_step) as i32 - first + 1;
    first + (step - first + rotate).rem_euclid(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligned(run_mode: RunMode, n: u32, first: i32, last: i32) -> Vec<i32> {
        (0..n)
            .map(|i| StepGenerator::aligned_step(i, run_mode, first, last).unwrap().0)
            .collect()
    }

    #[test]
    fn test_forward() {
        assert_eq!(aligned(RunMode::Forward, 5, 0, 3), vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_backward() {
        assert_eq!(aligned(RunMode::Backward, 5, 0, 3), vec![3, 2, 1, 0, 3]);
    }

    #[test]
    fn test_pendulum_and_ping_pong() {
        assert_eq!(
            aligned(RunMode::Pendulum, 9, 0, 3),
            vec![0, 1, 2, 3, 3, 2, 1, 0, 0]
        );
        assert_eq!(
            aligned(RunMode::PingPong, 7, 0, 3),
            vec![0, 1, 2, 3, 2, 1, 0]
        );
    }

    #[test]
    fn test_aligned_iteration() {
        let mut rng = Random::new(0);
        let mut state = SequenceState::default();
        state.advance_aligned(9, RunMode::Forward, 4, 7, &mut rng);
        assert_eq!(state.step(), 5);
        assert_eq!(state.iteration(), 2);
        assert_eq!(state.next_step(), 6);
        assert_eq!(state.prev_step(), -1);
    }

    #[test]
    fn test_free_forward_wraps_and_counts_iterations() {
        let mut rng = Random::new(0);
        let mut state = SequenceState::default();
        let mut steps = Vec::new();
        for _ in 0..6 {
            state.advance_free(RunMode::Forward, 2, 4, &mut rng);
            steps.push(state.step());
        }
        assert_eq!(steps, vec![2, 3, 4, 2, 3, 4]);
        assert_eq!(state.iteration(), 1);
        assert_eq!(state.prev_step(), 3);
        assert_eq!(state.next_step(), 2);
    }

    #[test]
    fn test_free_pendulum() {
        let mut rng = Random::new(0);
        let mut state = SequenceState::default();
        let steps: Vec<i32> = (0..8)
            .map(|_| {
                state.advance_free(RunMode::Pendulum, 0, 2, &mut rng);
                state.step()
            })
            .collect();
        assert_eq!(steps, vec![0, 1, 2, 2, 1, 0, 0, 1]);
    }

    #[test]
    fn test_free_random_uses_look_ahead() {
        let mut rng = Random::new(3);
        let mut state = SequenceState::default();
        state.advance_free(RunMode::Random, 0, 7, &mut rng);
        for _ in 0..50 {
            let expected = state.next_step();
            state.advance_free(RunMode::Random, 0, 7, &mut rng);
            assert_eq!(state.step(), expected);
            assert!((0..=7).contains(&state.step()));
        }
    }

    #[test]
    fn test_reset() {
        let mut rng = Random::new(0);
        let mut state = SequenceState::default();
        state.advance_free(RunMode::Forward, 0, 3, &mut rng);
        state.reset();
        assert_eq!(state, SequenceState::default());
        assert_eq!(state.step(), -1);
    }

    #[test]
    fn test_rotate_step() {
        assert_eq!(rotate_step(0, 0, 3, 1), 1);
        assert_eq!(rotate_step(3, 0, 3, 1), 0);
        assert_eq!(rotate_step(4, 4, 7, -1), 7);
        assert_eq!(rotate_step(-1, 0, 3, 2), -1);
    }
}
