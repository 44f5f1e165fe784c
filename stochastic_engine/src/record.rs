//! Live MIDI history and the quantizer that turns it into recorded steps.

use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use stochastic_shared::types::{
    Condition, GATE_PROBABILITY, LENGTH, LENGTH_VARIATION_PROBABILITY, NOTE_VARIATION_PROBABILITY,
    RETRIGGER_PROBABILITY,
};
use stochastic_shared::{MidiMessage, Scale, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    NoteOn,
    NoteOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordEvent {
    pub tick: u32,
    pub kind: RecordType,
    pub note: u8,
}

/// Most recent note events, oldest dropped first once full.
pub struct RecordHistory {
    events: HeapRb<RecordEvent>,
    active_note: Option<u8>,
}

impl RecordHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: HeapRb::new(capacity.max(1)),
            active_note: None,
        }
    }

    pub fn clear(&mut self) {
        Consumer::clear(&mut self.events);
        self.active_note = None;
    }

    pub fn len(&self) -> usize {
        self.events.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RecordEvent> {
        self.events.iter().nth(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordEvent> {
        self.events.iter()
    }

    pub fn is_note_active(&self) -> bool {
        self.active_note.is_some()
    }

    pub fn active_note(&self) -> Option<u8> {
        self.active_note
    }

    /// Monophonic: a new note-on closes the held note first, and a note-off
    /// only counts for the held note.
    pub fn write(&mut self, tick: u32, message: &MidiMessage) {
        let note = message.note();
        if message.is_note_on() {
            if let Some(active) = self.active_note.filter(|&active| active != note) {
                self.push(tick, RecordType::NoteOff, active);
            }
            self.active_note = Some(note);
            self.push(tick, RecordType::NoteOn, note);
        } else if self.active_note == Some(note) {
            self.active_note = None;
            self.push(tick, RecordType::NoteOff, note);
        }
    }

    fn push(&mut self, tick: u32, kind: RecordType, note: u8) {
        self.events.push_overwrite(RecordEvent { tick, kind, note });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedNote {
    pub note: u8,
    pub length_ticks: u32,
}

/// Finds the note played for the step that ended at `tick`.
///
/// A note counts if it started within half a step of the step start, or was
/// already held when the step started. The last match wins.
pub fn quantize(history: &RecordHistory, tick: u32, divisor: u32) -> Option<RecordedNote> {
    let step_start = tick.saturating_sub(divisor);
    let step_end = tick;
    let margin = divisor / 2;

    let events: Vec<&RecordEvent> = history.iter().collect();
    let mut recorded = None;
    for (i, event) in events.iter().enumerate() {
        if event.kind != RecordType::NoteOn {
            continue;
        }
        let note_start = event.tick;
        let note_end = events.get(i + 1).map_or(tick, |next| next.tick);

        let starts_in_step = note_start >= step_start.saturating_sub(margin)
            && note_start < step_start.saturating_add(margin);
        let length_ticks = if starts_in_step {
            if note_end >= step_end {
                note_end.min(step_end) - step_start
            } else {
                note_end.saturating_sub(note_start)
            }
        } else if note_start < step_start && note_end > step_start {
            note_end.min(step_end) - step_start
        } else {
            continue;
        };
        recorded = Some(RecordedNote {
            note: event.note,
            length_ticks,
        });
    }
    recorded
}

/// Scale degree for an incoming MIDI note, middle C being degree 0.
pub fn note_from_midi_note(midi_note: u8, scale: &dyn Scale, root_note: i32) -> i32 {
    let offset = midi_note as i32 - 60;
    if scale.is_chromatic() {
        scale.note_from_volts((offset - root_note) as f32 / 12.0)
    } else {
        scale.note_from_volts(offset as f32 / 12.0)
    }
}

/// Overwrites `step` with a plain, always-firing note.
pub fn write_recorded_step(step: &mut Step, note: i32, length_ticks: u32, divisor: u32) {
    let length = length_ticks as u64 * LENGTH.range() as u64 / divisor.max(1) as u64;
    let length = length.min(i32::MAX as u64) as i32;

    step.set_gate(true);
    step.set_gate_probability(GATE_PROBABILITY.max);
    step.set_retrigger(0);
    step.set_retrigger_probability(RETRIGGER_PROBABILITY.max);
    step.set_length(length);
    step.set_length_variation_range(0);
    step.set_length_variation_probability(LENGTH_VARIATION_PROBABILITY.max);
    step.set_note(note);
    step.set_note_octave(0);
    step.set_note_variation_probability(NOTE_VARIATION_PROBABILITY.max);
    step.set_condition(Condition::Off);
    step.set_stage_repeats(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use stochastic_shared::ScaleType;

    fn on(note: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            note,
            velocity: 100,
        }
    }

    fn off(note: u8) -> MidiMessage {
        MidiMessage::NoteOff { note }
    }

    #[test]
    fn test_history_tracks_active_note() {
        let mut history = RecordHistory::new(16);
        history.write(0, &on(60));
        assert_eq!(history.active_note(), Some(60));
        history.write(10, &on(62));
        assert_eq!(history.active_note(), Some(62));
        // Closing 60 implicitly added a note-off.
        assert_eq!(history.len(), 3);
        assert_eq!(
            history.get(1).map(|e| (e.kind, e.note)),
            Some((RecordType::NoteOff, 60))
        );

        history.write(20, &off(60));
        assert!(history.is_note_active());
        history.write(30, &off(62));
        assert!(!history.is_note_active());
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_zero_velocity_is_note_off() {
        let mut history = RecordHistory::new(16);
        history.write(0, &on(60));
        let release = MidiMessage::NoteOn {
            note: 60,
            velocity: 0,
        };
        history.write(5, &release);
        assert!(!history.is_note_active());
    }

    #[test]
    fn test_history_overwrites_oldest() {
        let mut history = RecordHistory::new(4);
        for i in 0..6u32 {
            history.write(i * 10, &on(60 + i as u8));
        }
        assert_eq!(history.len(), 4);
        let ticks: Vec<u32> = history.iter().map(|e| e.tick).collect();
        assert!(ticks.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(history.iter().last().map(|e| e.note), Some(65));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.active_note(), None);
    }

    #[test]
    fn test_quantize_note_held_through_step() {
        let mut history = RecordHistory::new(16);
        history.write(98, &on(64));
        let recorded = quantize(&history, 148, 48).unwrap();
        assert_eq!(
            recorded,
            RecordedNote {
                note: 64,
                length_ticks: 48
            }
        );
    }

    #[test]
    fn test_quantize_note_released_early() {
        let mut history = RecordHistory::new(16);
        history.write(100, &on(64));
        history.write(112, &off(64));
        let recorded = quantize(&history, 148, 48).unwrap();
        assert_eq!(recorded.length_ticks, 12);
    }

    #[test]
    fn test_quantize_note_from_previous_step() {
        let mut history = RecordHistory::new(16);
        history.write(40, &on(67));
        history.write(120, &off(67));
        let recorded = quantize(&history, 148, 48).unwrap();
        assert_eq!(
            recorded,
            RecordedNote {
                note: 67,
                length_ticks: 20
            }
        );
    }

    #[test]
    fn test_quantize_ignores_late_notes() {
        let mut history = RecordHistory::new(16);
        history.write(130, &on(64));
        assert_eq!(quantize(&history, 148, 48), None);
    }

    #[test]
    fn test_note_from_midi_note() {
        assert_eq!(note_from_midi_note(60, &ScaleType::Chromatic, 0), 0);
        assert_eq!(note_from_midi_note(67, &ScaleType::Chromatic, 0), 7);
        assert_eq!(note_from_midi_note(62, &ScaleType::Chromatic, 2), 0);
        assert_eq!(note_from_midi_note(48, &ScaleType::Chromatic, 0), -12);
        // E above middle C is the third degree of C major.
        assert_eq!(note_from_midi_note(64, &ScaleType::Major, 0), 2);
    }

    #[test]
    fn test_write_recorded_step() {
        let mut step = Step::default();
        step.set_condition(Condition::Fill);
        step.set_gate_probability(1);
        write_recorded_step(&mut step, 5, 24, 48);
        assert!(step.gate());
        assert_eq!(step.gate_probability(), GATE_PROBABILITY.max);
        assert_eq!(step.length(), 4);
        assert_eq!(step.note(), 5);
        assert_eq!(step.condition(), Condition::Off);
        assert_eq!(step.stage_repeats(), 1);
    }
}
