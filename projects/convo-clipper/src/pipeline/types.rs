use serde::{Deserialize, Serialize};

/// Classification result for one sampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Position in the native frame stream.
    pub index: usize,
    /// Seconds from the start of the video (`index / native_fps`).
    pub timestamp: f64,
    pub face_count: usize,
    pub is_conversation: bool,
}

/// A maximal run of conversation frames, as a time interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    pub start_index: usize,
    pub end_index: usize,
    pub duration: f64,
}

impl Segment {
    pub fn new(start_time: f64, start_index: usize, end_time: f64, end_index: usize) -> Self {
        Self {
            start_time,
            end_time,
            start_index,
            end_index,
            duration: end_time - start_time,
        }
    }
}

/// Tunables for one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisConfig {
    /// Frames analysed per second of source video.
    pub sampling_rate: f64,
    /// Segments shorter than this (seconds) are discarded. Inclusive.
    pub min_duration: f64,
    /// Faces required for a frame to count as a conversation frame.
    pub min_faces: usize,
    /// Classification threads; 1 classifies on the sampling thread.
    pub workers: usize,
    pub save_frame_images: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 0.5,
            min_duration: 3.0,
            min_faces: 2,
            workers: 1,
            save_frame_images: true,
        }
    }
}
