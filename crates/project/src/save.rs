use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::{AnalysisError, AnalysisResult};

/// Cache an analysis result as pretty-printed JSON.
pub fn save_analysis(path: &Path, result: &AnalysisResult) -> Result<(), AnalysisError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, result)?;

    Ok(())
}

/// Compact MessagePack form, readable by [`crate::load_analysis`].
pub fn save_analysis_msgpack(path: &Path, result: &AnalysisResult) -> Result<(), AnalysisError> {
    let bytes = rmp_serde::to_vec_named(result)?;
    std::fs::write(path, bytes)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChordSegment, NoteData, NoteHighway, load_analysis, read_analysis};
    use tempfile::tempdir;

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            title: Some("Campfire Song".to_string()),
            bpm: Some(92.0),
            duration: Some(8.0),
            chords: vec![ChordSegment::new(0.0, 4.0, "G"), ChordSegment::new(4.0, 8.0, "D")],
            note_highway: Some(NoteHighway {
                duration: 8.0,
                notes: vec![NoteData::at(0.0, 0, 3), NoteData::at(4.0, 2, 0)],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_save_analysis_creates_readable_json() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("song.json");

        save_analysis(&path, &sample_result()).expect("save");

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"label\": \"G\""));
        assert!(!text.contains("artist"));
        assert_eq!(read_analysis(&path).expect("read back"), sample_result());
    }

    #[test]
    fn test_saved_msgpack_loads() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("song.msgpack");

        save_analysis_msgpack(&path, &sample_result()).expect("save");

        let loaded = load_analysis(&path).expect("load");
        assert_eq!(loaded.chords.len(), 2);
        assert_eq!(loaded.notes.len(), 2);
        assert_eq!(loaded.chords.duration(), 8_000.0);
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("song.json");
        assert!(matches!(
            save_analysis(&path, &AnalysisResult::default()),
            Err(AnalysisError::Io(_))
        ));
    }
}
