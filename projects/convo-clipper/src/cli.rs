use crate::pipeline::classifier::DEFAULT_CASCADE;
use crate::pipeline::types::AnalysisConfig;
use crate::video::Backend;
use clap::Parser;
use std::path::PathBuf;

/// Extract segments from YouTube videos where multiple people are talking in a static frame.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// YouTube video URL (prompted for when omitted)
    #[arg(long)]
    pub url: Option<String>,

    /// Number of frames to sample per second of video
    #[arg(long, default_value_t = 0.5, value_parser = parse_positive_rate)]
    pub sampling_rate: f64,

    /// Minimum duration of conversation segments in seconds
    #[arg(
        long,
        default_value_t = 3.0,
        allow_negative_numbers = true,
        value_parser = parse_finite_duration
    )]
    pub min_duration: f64,

    /// Directory to save the extracted segments
    #[arg(long, default_value = "segments", env = "CONVO_CLIPPER_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Directory to save the downloaded videos
    #[arg(long, default_value = "videos", env = "CONVO_CLIPPER_VIDEO_DIR")]
    pub video_dir: PathBuf,

    /// Directory to save the sampled frames and frame log
    #[arg(long, default_value = "frames", env = "CONVO_CLIPPER_FRAMES_DIR")]
    pub frames_dir: PathBuf,

    /// Video decoding backend
    #[arg(long, value_enum, default_value_t = Backend::Opencv)]
    pub backend: Backend,

    /// Faces required for a frame to count as a conversation
    #[arg(long, default_value_t = 2)]
    pub min_faces: usize,

    /// Haar cascade XML used for face detection
    #[arg(long, default_value = DEFAULT_CASCADE, env = "CONVO_CLIPPER_CASCADE")]
    pub cascade: String,

    /// Number of face detection threads
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: u64,

    /// Do not write sampled frames as JPEG files
    #[arg(long)]
    pub no_frame_images: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            sampling_rate: self.sampling_rate,
            min_duration: self.min_duration,
            min_faces: self.min_faces,
            workers: self.workers as usize,
            save_frame_images: !self.no_frame_images,
        }
    }
}

fn parse_positive_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("sampling rate must be greater than 0, got {}", rate))
    }
}

fn parse_finite_duration(s: &str) -> Result<f64, String> {
    let duration: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if duration.is_finite() {
        Ok(duration)
    } else {
        Err(format!("minimum duration must be a finite number, got {}", duration))
    }
}
