use serde::{Deserialize, Serialize};

/// Scale-degree <-> voltage conversion used by the track engine (1V/octave).
pub trait Scale {
    fn notes_per_octave(&self) -> i32;
    fn is_chromatic(&self) -> bool;
    /// Converts a scale degree (may be negative or span several octaves) to volts.
    fn note_to_volts(&self, note: i32) -> f32;
    /// Nearest scale degree for a voltage.
    fn note_from_volts(&self, volts: f32) -> i32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScaleType {
    #[default]
    Chromatic,
    Major,
    Minor,

    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,

    HarmonicMinor,
    MelodicMinor,

    MajorPentatonic,
    MinorPentatonic,
    Blues,

    WholeTone,
    DiminishedWholeHalf,

    HungarianMinor,
    Hirajoshi,
    Iwato,
}

impl ScaleType {
    /// Semitone offsets of each degree within one octave.
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            ScaleType::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            ScaleType::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleType::Minor => &[0, 2, 3, 5, 7, 8, 10],

            ScaleType::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleType::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            ScaleType::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            ScaleType::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            ScaleType::Locrian => &[0, 1, 3, 5, 6, 8, 10],

            ScaleType::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            ScaleType::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],

            ScaleType::MajorPentatonic => &[0, 2, 4, 7, 9],
            ScaleType::MinorPentatonic => &[0, 3, 5, 7, 10],
            ScaleType::Blues => &[0, 3, 5, 6, 7, 10],

            ScaleType::WholeTone => &[0, 2, 4, 6, 8, 10],
            ScaleType::DiminishedWholeHalf => &[0, 2, 3, 5, 6, 8, 9, 11],

            ScaleType::HungarianMinor => &[0, 2, 3, 6, 7, 8, 11],
            ScaleType::Hirajoshi => &[0, 2, 3, 7, 8],
            ScaleType::Iwato => &[0, 1, 5, 6, 10],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScaleType::Chromatic => "Chromatic",
            ScaleType::Major => "Major",
            ScaleType::Minor => "Minor",
            ScaleType::Dorian => "Dorian",
            ScaleType::Phrygian => "Phrygian",
            ScaleType::Lydian => "Lydian",
            ScaleType::Mixolydian => "Mixolydian",
            ScaleType::Locrian => "Locrian",
            ScaleType::HarmonicMinor => "Harm Minor",
            ScaleType::MelodicMinor => "Mel Minor",
            ScaleType::MajorPentatonic => "Maj Penta",
            ScaleType::MinorPentatonic => "Min Penta",
            ScaleType::Blues => "Blues",
            ScaleType::WholeTone => "Whole Tone",
            ScaleType::DiminishedWholeHalf => "Dim W-H",
            ScaleType::HungarianMinor => "Hung Minor",
            ScaleType::Hirajoshi => "Hirajoshi",
            ScaleType::Iwato => "Iwato",
        }
    }
}

impl Scale for ScaleType {
    fn notes_per_octave(&self) -> i32 {
        self.intervals().len() as i32
    }

    fn is_chromatic(&self) -> bool {
        *self == ScaleType::Chromatic
    }

    fn note_to_volts(&self, note: i32) -> f32 {
        let intervals = self.intervals();
        let per_octave = intervals.len() as i32;
        let octave = note.div_euclid(per_octave);
        let degree = note.rem_euclid(per_octave) as usize;
        let semitones = octave * 12 + intervals[degree] as i32;
        semitones as f32 / 12.0
    }

    fn note_from_volts(&self, volts: f32) -> i32 {
        let intervals = self.intervals();
        let per_octave = intervals.len() as i32;
        let semitones = (volts * 12.0).round() as i32;
        let octave = semitones.div_euclid(12);
        let class = semitones.rem_euclid(12);

        // Candidates: every degree of this octave plus the root of the next one.
        let mut best = (0, i32::MAX);
        for (degree, &interval) in intervals.iter().enumerate() {
            let dist = (class - interval as i32).abs();
            if dist < best.1 {
                best = (degree as i32, dist);
            }
        }
        if 12 - class < best.1 {
            return (octave + 1) * per_octave;
        }
        octave * per_octave + best.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chromatic_volts() {
        let scale = ScaleType::Chromatic;
        assert_eq!(scale.notes_per_octave(), 12);
        assert!(scale.is_chromatic());
        assert!((scale.note_to_volts(12) - 1.0).abs() < 1e-6);
        assert!((scale.note_to_volts(-12) + 1.0).abs() < 1e-6);
        assert_eq!(scale.note_from_volts(7.0 / 12.0), 7);
    }

    #[test]
    fn test_major_degrees() {
        let scale = ScaleType::Major;
        assert_eq!(scale.notes_per_octave(), 7);
        assert!(!scale.is_chromatic());
        // Degree 2 is the major third.
        assert!((scale.note_to_volts(2) - 4.0 / 12.0).abs() < 1e-6);
        // Degree 7 is the next octave.
        assert!((scale.note_to_volts(7) - 1.0).abs() < 1e-6);
        // Negative degrees wrap into the octave below.
        assert!((scale.note_to_volts(-1) - (-1.0 / 12.0)).abs() < 1e-6);
    }

    #[test]
    fn test_note_from_volts_snaps_to_scale() {
        let scale = ScaleType::Major;
        assert_eq!(scale.note_from_volts(4.0 / 12.0), 2);
        // F# sits between F and G, ties resolve to the lower degree.
        assert_eq!(scale.note_from_volts(6.0 / 12.0), 3);
        assert_eq!(scale.note_from_volts(11.0 / 12.0), 6);
        assert_eq!(scale.note_from_volts(1.0), 7);
        assert_eq!(scale.note_from_volts(-1.0), -7);
    }
}
