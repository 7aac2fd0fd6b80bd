//! Open chord shapes and the strum expansion used when a song has chords
//! but no detected notes.

use fretflow_timeline::{FretPosition, Payload, TimedEvent};

/// Fret per string, low E first. `-1` is a muted string.
pub type Shape = [i8; 6];

const SHAPES: &[(&str, Shape)] = &[
    ("C", [0, 3, 2, 0, 1, 0]),
    ("D", [-1, -1, 0, 2, 3, 2]),
    ("E", [0, 2, 2, 1, 0, 0]),
    ("F", [1, 3, 3, 2, 1, 1]),
    ("G", [3, 2, 0, 0, 3, 3]),
    ("A", [0, 0, 2, 2, 2, 0]),
    ("Am", [0, 0, 2, 2, 1, 0]),
    ("B", [2, 2, 4, 4, 4, 2]),
    ("Bm", [2, 3, 4, 4, 3, 2]),
];

/// Labels without a shape of their own, folded onto a nearby one.
const ALIASES: &[(&str, &str)] = &[
    ("C#", "C"),
    ("C#m", "Am"),
    ("Db", "C"),
    ("Dbm", "Am"),
    ("D#", "D"),
    ("D#m", "Bm"),
    ("Eb", "D"),
    ("Ebm", "Bm"),
    ("F#", "F"),
    ("F#m", "Am"),
    ("Gb", "F"),
    ("Gbm", "Am"),
    ("G#", "G"),
    ("G#m", "Am"),
    ("Ab", "G"),
    ("Abm", "Am"),
    ("A#", "A"),
    ("A#m", "Bm"),
    ("Bb", "A"),
    ("Bbm", "Bm"),
];

pub const DEFAULT_STRUMS_PER_BEAT: u32 = 2;

/// Length of each strummed note.
pub const STRUM_NOTE_MS: f64 = 100.0;

const UNKNOWN_TEMPO_STRUM_MS: f64 = 500.0;

/// Strumming stops this close to the end of a segment.
const SEGMENT_TAIL_MS: f64 = 20.0;

/// The shape name a label plays as, if any.
pub fn normalize_chord(label: &str) -> Option<&'static str> {
    let label = label.trim();
    if let Some((name, _)) = SHAPES.iter().find(|(name, _)| *name == label) {
        return Some(*name);
    }
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == label)
        .map(|(_, target)| *target)
}

pub fn chord_shape(label: &str) -> Option<&'static Shape> {
    let name = normalize_chord(label)?;
    SHAPES
        .iter()
        .find(|(shape_name, _)| *shape_name == name)
        .map(|(_, shape)| shape)
}

/// Fretted and open strings of a chord, low E first.
pub fn chord_positions(label: &str) -> Option<Vec<FretPosition>> {
    let shape = chord_shape(label)?;
    Some(
        shape
            .iter()
            .enumerate()
            .filter(|(_, fret)| **fret >= 0)
            .map(|(string, fret)| FretPosition::new(string as u8, *fret as u8))
            .collect(),
    )
}

pub fn strum_interval_ms(bpm: Option<f64>, strums_per_beat: u32) -> f64 {
    match bpm {
        Some(bpm) if bpm.is_finite() && bpm > 0.0 && strums_per_beat > 0 => {
            60_000.0 / bpm / strums_per_beat as f64
        }
        _ => UNKNOWN_TEMPO_STRUM_MS,
    }
}

/// Strum every chord event on its shape for as long as it holds.
///
/// Chord labels without a shape are skipped. Non-chord events are ignored.
pub fn chords_to_notes(chords: &[TimedEvent], bpm: Option<f64>, strums_per_beat: u32) -> Vec<TimedEvent> {
    let interval = strum_interval_ms(bpm, strums_per_beat);
    let mut notes = Vec::new();

    for chord in chords {
        let Some(label) = chord.payload.chord_label() else {
            continue;
        };
        let Some(positions) = chord_positions(label) else {
            continue;
        };

        let stop = chord.end() - SEGMENT_TAIL_MS;
        let mut t = chord.time;
        while t < stop {
            notes.extend(positions.iter().map(|pos| TimedEvent {
                time: t,
                duration: Some(STRUM_NOTE_MS),
                payload: Payload::Note(*pos),
            }));
            t += interval;
        }
    }
    notes
}
