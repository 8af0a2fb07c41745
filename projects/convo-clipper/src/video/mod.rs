pub mod ffmpeg_reader;
pub mod opencv_reader;
pub mod processor;
pub mod sampler;

use anyhow::Result;
use clap::ValueEnum;
use opencv::core::Mat;
use std::path::Path;

/// Frame rate assumed when container metadata reports none.
pub const FALLBACK_FPS: f64 = 30.0;

/// Sequential access to the native frame stream of a video file.
pub trait VideoReader: Send {
    /// Frame count from container metadata, `None` when it is not known.
    fn frame_count(&self) -> Option<usize>;
    fn source_fps(&self) -> f64;
    /// Returns the next decoded frame in BGR order, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Mat>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Opencv,
    Ffmpeg,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Opencv => "opencv",
            Backend::Ffmpeg => "ffmpeg",
        }
    }
}

pub fn open_reader(path: &Path, backend: Backend) -> Result<Box<dyn VideoReader>> {
    let reader: Box<dyn VideoReader> = match backend {
        Backend::Opencv => Box::new(opencv_reader::OpencvReader::new(path)?),
        Backend::Ffmpeg => Box::new(ffmpeg_reader::FfmpegReader::new(path)?),
    };
    Ok(reader)
}
