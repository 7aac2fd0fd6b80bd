use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use fretflow_timeline::{FretPosition, MAX_FRET, STRING_COUNT, TimedEvent, Timeline};
use tracing::{info, warn};

use crate::pitch::{DEFAULT_MAX_FRET, hz_to_midi, midi_to_position, note_name_to_midi};
use crate::shapes::{DEFAULT_STRUMS_PER_BEAT, chords_to_notes};
use crate::{AnalysisError, AnalysisResult, ChordSegment, NoteData};

const MS_PER_SECOND: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Chord,
    Note,
}

/// An entry of the analysis result that could not be placed on a timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEntry {
    pub kind: EntryKind,
    /// Index within its list in the analysis result
    pub index: usize,
    /// Start time in seconds, as found in the file
    pub time: f64,
    pub reason: String,
}

/// An analysis result turned into engine timelines (milliseconds).
#[derive(Debug, Clone)]
pub struct LoadedAnalysis {
    pub title: Option<String>,
    pub bpm: Option<f64>,
    pub chords: Timeline,
    pub notes: Timeline,
    /// The note timeline was strummed from the chords because the result had
    /// no detected notes.
    pub notes_from_chords: bool,
    /// Entries that were skipped, with the reason
    pub rejected: Vec<RejectedEntry>,
}

/// Read an analysis result. JSON is tried first, then MessagePack.
pub fn read_analysis(path: &Path) -> Result<AnalysisResult, AnalysisError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).or_else(|_| {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        rmp_serde::decode::from_read(reader).map_err(AnalysisError::from)
    })
}

pub fn load_analysis(path: &Path) -> Result<LoadedAnalysis, AnalysisError> {
    let result = read_analysis(path)?;
    let loaded = LoadedAnalysis::from_result(&result)?;
    info!(
        path = %path.display(),
        chords = loaded.chords.len(),
        notes = loaded.notes.len(),
        rejected = loaded.rejected.len(),
        "loaded analysis"
    );
    Ok(loaded)
}

impl LoadedAnalysis {
    pub fn from_result(result: &AnalysisResult) -> Result<Self, AnalysisError> {
        let mut rejected = Vec::new();

        let chord_events: Vec<TimedEvent> = result
            .chords
            .iter()
            .enumerate()
            .filter_map(|(index, segment)| match chord_event(segment) {
                Ok(event) => Some(event),
                Err(reason) => {
                    rejected.push(RejectedEntry {
                        kind: EntryKind::Chord,
                        index,
                        time: segment.t0,
                        reason,
                    });
                    None
                }
            })
            .collect();

        let detected = result.note_highway.as_ref().map(|h| h.notes.as_slice()).unwrap_or(&[]);
        let mut note_events: Vec<TimedEvent> = detected
            .iter()
            .enumerate()
            .filter_map(|(index, note)| match note_event(note) {
                Ok(event) => Some(event),
                Err(reason) => {
                    rejected.push(RejectedEntry {
                        kind: EntryKind::Note,
                        index,
                        time: note.time,
                        reason,
                    });
                    None
                }
            })
            .collect();

        let notes_from_chords = detected.is_empty() && !chord_events.is_empty();
        if notes_from_chords {
            note_events = chords_to_notes(&chord_events, result.bpm, DEFAULT_STRUMS_PER_BEAT);
        }

        for entry in &rejected {
            warn!(kind = ?entry.kind, index = entry.index, time = entry.time, reason = %entry.reason, "skipped analysis entry");
        }

        let duration = chord_events.iter().map(TimedEvent::end).fold(song_duration(result), f64::max);
        Ok(Self {
            title: result.title.clone(),
            bpm: result.bpm.filter(|bpm| bpm.is_finite() && *bpm > 0.0),
            chords: Timeline::new(chord_events, duration)?,
            notes: Timeline::new(note_events, duration)?,
            notes_from_chords,
            rejected,
        })
    }
}

/// Longest of the declared durations, in milliseconds.
fn song_duration(result: &AnalysisResult) -> f64 {
    let declared = [
        result.duration,
        result.note_highway.as_ref().map(|h| h.duration),
    ];
    declared
        .into_iter()
        .flatten()
        .filter(|d| d.is_finite() && *d > 0.0)
        .fold(0.0, f64::max)
        * MS_PER_SECOND
}

fn check_time(seconds: f64) -> Result<f64, String> {
    if !seconds.is_finite() {
        return Err(format!("time is not a number: {seconds}"));
    }
    if seconds < 0.0 {
        return Err(format!("negative time: {seconds}"));
    }
    Ok(seconds * MS_PER_SECOND)
}

fn chord_event(segment: &ChordSegment) -> Result<TimedEvent, String> {
    let start = check_time(segment.t0)?;
    let end = check_time(segment.end())?;
    let label = segment.label.trim();
    if label.is_empty() {
        return Err("missing chord label".to_string());
    }
    if end <= start {
        return Err(format!("segment ends before it starts: {} - {}", segment.t0, segment.end()));
    }
    Ok(TimedEvent::chord(start, end - start, label))
}

fn note_event(note: &NoteData) -> Result<TimedEvent, String> {
    let time = check_time(note.time)?;
    let position = note_position(note)?;

    let mut event = TimedEvent::note(time, position.string, position.fret);
    if let Some(duration) = note.duration.filter(|d| d.is_finite() && *d > 0.0) {
        event = event.with_duration(duration * MS_PER_SECOND);
    }
    Ok(event)
}

fn note_position(note: &NoteData) -> Result<FretPosition, String> {
    if let (Some(string), Some(fret)) = (note.string, note.fret) {
        if !(0..STRING_COUNT as i64).contains(&string) {
            return Err(format!("string out of range: {string}"));
        }
        if !(0..=MAX_FRET as i64).contains(&fret) {
            return Err(format!("fret out of range: {fret}"));
        }
        return Ok(FretPosition::new(string as u8, fret as u8));
    }

    let midi = note
        .midi
        .or_else(|| note.pitch_hz.and_then(hz_to_midi))
        .or_else(|| note.note.as_deref().and_then(note_name_to_midi))
        .ok_or_else(|| "no string/fret or pitch".to_string())?;
    midi_to_position(midi, DEFAULT_MAX_FRET).ok_or_else(|| format!("pitch not playable: midi {midi}"))
}
