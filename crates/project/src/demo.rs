//! Built-in songs for practising without an analysed recording.

use crate::{AnalysisResult, ChordSegment, NoteData, NoteHighway};

/// Eight 7.5 s chords, C C G G Am Am F F, at 80 bpm.
pub fn mock_song() -> AnalysisResult {
    let progression = ["C", "C", "G", "G", "Am", "Am", "F", "F"];
    let chords = progression
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let t0 = i as f64 * 7.5;
            ChordSegment::new(t0, t0 + 7.5, *label)
        })
        .collect();

    AnalysisResult {
        title: Some("Basic Practice Progression".to_string()),
        artist: Some("Guitar Bob".to_string()),
        bpm: Some(80.0),
        duration: Some(60.0),
        chords,
        note_highway: None,
    }
}

/// Twenty seconds of single notes with a C and a G shape in the middle.
pub fn practice_song() -> AnalysisResult {
    let singles = [
        (1.0, 0, 0),
        (2.0, 1, 2),
        (3.0, 2, 3),
        (4.0, 3, 0),
        (5.0, 4, 1),
        (6.0, 5, 0),
        (7.0, 2, 5),
        (8.0, 0, 3),
    ];
    let c_major = [0, 3, 2, 0, 1, 0];
    let g_major = [3, 2, 0, 0, 3, 3];
    let tail = [(14.0, 5, 12), (15.0, 0, 5), (16.0, 3, 7)];

    let mut notes: Vec<NoteData> = singles
        .iter()
        .map(|&(time, string, fret)| NoteData::at(time, string, fret))
        .collect();
    for (time, shape) in [(10.0, c_major), (12.0, g_major)] {
        notes.extend(
            shape
                .iter()
                .enumerate()
                .map(|(string, &fret)| NoteData::at(time, string as i64, fret)),
        );
    }
    notes.extend(tail.iter().map(|&(time, string, fret)| NoteData::at(time, string, fret)));

    AnalysisResult {
        title: Some("Practice Visualizer".to_string()),
        duration: Some(20.0),
        note_highway: Some(NoteHighway { duration: 20.0, notes }),
        ..Default::default()
    }
}
