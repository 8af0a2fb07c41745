// Error types for the external collaborators (download and clip cutting)

use std::path::PathBuf;
use thiserror::Error;

/// The video could not be obtained. Fatal to the run.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("Could not find a YouTube video id in '{0}'")]
    InvalidUrl(String),

    #[error("Download failed: {message} (exit code {exit_code:?})")]
    DownloadFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("Downloader finished but {0} was not created")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single clip could not be cut. Recovered per segment.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("FFmpeg command failed: {message} (exit code {exit_code:?})")]
    FfmpegFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("Output clip {0} was not created")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
