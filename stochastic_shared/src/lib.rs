use serde::{Deserialize, Serialize};

pub mod project;
pub mod scale;
pub mod types;

pub use project::{ModelError, ProjectSettings, Sequence, Step, StochasticTrack};
pub use scale::{Scale, ScaleType};

/// Number of steps stored in every sequence.
pub const STEP_COUNT: usize = 64;
/// Number of patterns (sequences) per track.
pub const PATTERN_COUNT: usize = 16;

/// Incoming MIDI note message as seen by the track engine (live input / recording).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
}

impl MidiMessage {
    /// A note-on with velocity 0 is treated as a note-off.
    pub fn is_note_on(&self) -> bool {
        matches!(self, MidiMessage::NoteOn { velocity, .. } if *velocity > 0)
    }

    pub fn is_note_off(&self) -> bool {
        !self.is_note_on()
    }

    pub fn note(&self) -> u8 {
        match *self {
            MidiMessage::NoteOn { note, .. } | MidiMessage::NoteOff { note } => note,
        }
    }
}
