mod demo;
mod load;
mod pitch;
mod save;
mod shapes;

use fretflow_timeline::TimelineError;
use serde::{Deserialize, Serialize};

pub use demo::{mock_song, practice_song};
pub use load::{EntryKind, LoadedAnalysis, RejectedEntry, load_analysis, read_analysis};
pub use pitch::{DEFAULT_MAX_FRET, OPEN_STRING_MIDI, hz_to_midi, midi_to_position, note_name_to_midi};
pub use save::{save_analysis, save_analysis_msgpack};
pub use shapes::{
    DEFAULT_STRUMS_PER_BEAT, STRUM_NOTE_MS, Shape, chord_positions, chord_shape, chords_to_notes,
    normalize_chord, strum_interval_ms,
};

/// Result of analysing a song, as produced by the analysis service.
///
/// Times are in seconds here. They become milliseconds when turned into
/// timelines by [`LoadedAnalysis::from_result`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub chords: Vec<ChordSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_highway: Option<NoteHighway>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordSegment {
    pub t0: f64,
    /// Missing end means the segment is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t1: Option<f64>,
    #[serde(default)]
    pub label: String,
}

impl ChordSegment {
    pub fn new(t0: f64, t1: f64, label: impl Into<String>) -> Self {
        Self {
            t0,
            t1: Some(t1),
            label: label.into(),
        }
    }

    pub fn end(&self) -> f64 {
        self.t1.unwrap_or(self.t0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteHighway {
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub notes: Vec<NoteData>,
}

/// One detected note. Either `string`/`fret` or a pitch (`midi`, `pitch_hz`
/// or a note name) locates it on the neck.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteData {
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fret: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midi: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_hz: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl NoteData {
    pub fn at(time: f64, string: i64, fret: i64) -> Self {
        Self {
            time,
            string: Some(string),
            fret: Some(fret),
            ..Default::default()
        }
    }
}

impl AnalysisResult {
    /// Plain-text chord sheet: one `[t0 - t1]  label` line per segment.
    pub fn tab_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(bpm) = self.bpm {
            lines.push(format!("Tempo: {} BPM", bpm.round()));
            lines.push(String::new());
        }
        lines.push("Chord progression (time -> chord):".to_string());
        lines.push("-".repeat(40));
        for chord in &self.chords {
            let label = if chord.label.is_empty() { "?" } else { chord.label.as_str() };
            lines.push(format!("  [{:.1}s - {:.1}s]  {}", chord.t0, chord.end(), label));
        }
        lines.join("\n")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),

    #[error("Invalid timeline: {0}")]
    Timeline(#[from] TimelineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_payload_parses() {
        let json = r#"{
            "bpm": 96.0,
            "chords": [{ "t0": 0.0, "t1": 2.5, "label": "Am" }, { "t0": 2.5, "label": "E" }],
            "note_highway": {
                "duration": 30.0,
                "notes": [{ "time": 0.5, "string": 0, "fret": 3, "duration": 0.1 }, { "time": 1.0, "midi": 64 }]
            },
            "tabs": "ignored"
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).expect("parse");

        assert_eq!(result.bpm, Some(96.0));
        assert_eq!(result.chords[1].end(), 2.5);
        let highway = result.note_highway.expect("note highway");
        assert_eq!(highway.notes[0], NoteData {
            duration: Some(0.1),
            ..NoteData::at(0.5, 0, 3)
        });
        assert_eq!(highway.notes[1].midi, Some(64));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let result: AnalysisResult = serde_json::from_str("{}").expect("parse");
        assert!(result.chords.is_empty());
        assert!(result.note_highway.is_none());
        assert!(result.duration.is_none());
    }

    #[test]
    fn test_tab_text_lists_segments() {
        let result = AnalysisResult {
            bpm: Some(119.6),
            chords: vec![ChordSegment::new(0.0, 2.0, "C"), ChordSegment::new(2.0, 4.31, "")],
            ..Default::default()
        };
        let text = result.tab_text();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Tempo: 120 BPM");
        assert_eq!(lines[4], "  [0.0s - 2.0s]  C");
        assert_eq!(lines[5], "  [2.0s - 4.3s]  ?");
    }
}
