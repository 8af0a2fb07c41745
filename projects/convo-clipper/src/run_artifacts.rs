// Run artifact definitions
//
// Files persisted next to a run's outputs: the per-frame classification log
// (`frames.csv` in the frames directory) and the run summary (`summary.json`
// in the output directory).

use crate::extract::{ExtractedClip, ExtractionFailure, ExtractionSummary};
use crate::pipeline::types::{AnalysisConfig, FrameRecord, Segment};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const FRAME_LOG_NAME: &str = "frames.csv";
pub const SUMMARY_NAME: &str = "summary.json";

/// Everything known about a finished run.
#[derive(Serialize, Debug)]
pub struct RunSummary {
    pub url: String,
    pub video_id: Option<String>,
    pub video_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub config: AnalysisConfig,
    pub sampled_frames: usize,
    pub conversation_frames: usize,
    pub segments: Vec<Segment>,
    pub extracted: Vec<ExtractedClip>,
    pub failed: Vec<ExtractionFailure>,
}

impl RunSummary {
    pub fn new(
        url: &str,
        video_path: &Path,
        config: &AnalysisConfig,
        frames: &[FrameRecord],
        segments: &[Segment],
        extraction: ExtractionSummary,
    ) -> Self {
        Self {
            url: url.to_string(),
            video_id: crate::source::extract_video_id(url),
            video_path: video_path.to_path_buf(),
            created_at: Utc::now(),
            config: config.clone(),
            sampled_frames: frames.len(),
            conversation_frames: frames.iter().filter(|f| f.is_conversation).count(),
            segments: segments.to_vec(),
            extracted: extraction.extracted,
            failed: extraction.failed,
        }
    }
}

pub fn write_summary(output_dir: &Path, summary: &RunSummary) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(SUMMARY_NAME);
    let content = serde_json::to_string_pretty(summary)?;
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Write one CSV row per classified frame.
pub fn write_frame_log(frames_dir: &Path, frames: &[FrameRecord]) -> Result<PathBuf> {
    fs::create_dir_all(frames_dir)?;
    let path = frames_dir.join(FRAME_LOG_NAME);
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for frame in frames {
        writer.serialize(frame)?;
    }
    writer.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, timestamp: f64, face_count: usize) -> FrameRecord {
        FrameRecord {
            index,
            timestamp,
            face_count,
            is_conversation: face_count >= 2,
        }
    }

    #[test]
    fn test_frame_log_rows() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![record(0, 0.0, 0), record(60, 2.0, 3)];

        let path = write_frame_log(dir.path(), &frames).unwrap();
        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "index,timestamp,face_count,is_conversation");
        assert_eq!(lines[1], "0,0.0,0,false");
        assert_eq!(lines[2], "60,2.0,3,true");
    }

    #[test]
    fn test_summary_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![record(0, 0.0, 2), record(60, 2.0, 2), record(120, 4.0, 1)];
        let segments = vec![Segment::new(0.0, 0, 2.0, 60)];
        let summary = RunSummary::new(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            Path::new("videos/dQw4w9WgXcQ.mp4"),
            &AnalysisConfig::default(),
            &frames,
            &segments,
            ExtractionSummary::default(),
        );

        let path = write_summary(dir.path(), &summary).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(value["video_id"], "dQw4w9WgXcQ");
        assert_eq!(value["sampled_frames"], 3);
        assert_eq!(value["conversation_frames"], 2);
        assert_eq!(value["segments"][0]["end_index"], 60);
        assert_eq!(value["config"]["min_faces"], 2);
    }
}
