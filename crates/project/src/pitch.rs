//! Pitch to fretboard mapping in standard tuning.

use fretflow_timeline::FretPosition;

/// Open-string MIDI pitches, low E2 to high E4.
pub const OPEN_STRING_MIDI: [i64; 6] = [40, 45, 50, 55, 59, 64];

pub const DEFAULT_MAX_FRET: u8 = 12;

const LOWEST_MIDI: i64 = 40;
const HIGHEST_MIDI: i64 = 127;

pub fn hz_to_midi(hz: f64) -> Option<i64> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }
    Some((69.0 + 12.0 * (hz / 440.0).log2()).round() as i64)
}

/// Parse names like `E2`, `A#3` or `Bb4`. Octaves follow scientific pitch
/// notation, so `A4` is MIDI 69.
pub fn note_name_to_midi(name: &str) -> Option<i64> {
    let name = name.trim();
    let mut chars = name.chars();
    let letter = chars.next()?;
    let base = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = &name[1..];
    let (shift, octave) = if let Some(octave) = rest.strip_prefix('#') {
        (1, octave)
    } else if let Some(octave) = rest.strip_prefix('b') {
        (-1, octave)
    } else {
        (0, rest)
    };

    if octave.is_empty() || !octave.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let octave: i64 = octave.parse().ok()?;
    Some((octave + 1) * 12 + base + shift)
}

/// The playable position with the lowest fret. Ties go to the lower string.
pub fn midi_to_position(midi: i64, max_fret: u8) -> Option<FretPosition> {
    if !(LOWEST_MIDI..=HIGHEST_MIDI).contains(&midi) {
        return None;
    }

    let mut best: Option<FretPosition> = None;
    for (string, open) in OPEN_STRING_MIDI.iter().enumerate() {
        let fret = midi - open;
        if fret < 0 || fret > max_fret as i64 {
            continue;
        }
        if best.is_none_or(|b| (fret as u8) < b.fret) {
            best = Some(FretPosition::new(string as u8, fret as u8));
        }
    }
    best
}
