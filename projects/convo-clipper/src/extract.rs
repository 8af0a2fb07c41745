// Clip extraction: cut each retained segment out of the source video
//
// A failure on one segment is recorded and the remaining segments are still
// processed.

use crate::error::ExtractionError;
use crate::pipeline::types::Segment;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait ClipExtractor {
    fn extract(
        &self,
        video: &Path,
        segment: &Segment,
        output: &Path,
    ) -> Result<(), ExtractionError>;
}

/// Re-encodes clips with the `ffmpeg` binary (H.264 video, AAC audio).
pub struct FfmpegExtractor {
    binary: PathBuf,
    video_codec: String,
    audio_codec: String,
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegExtractor {
    pub fn new() -> Self {
        // A missing binary surfaces as a per-segment spawn failure.
        let binary = which::which("ffmpeg").unwrap_or_else(|_| {
            tracing::warn!("ffmpeg not found in PATH, clip extraction will fail");
            PathBuf::from("ffmpeg")
        });
        Self {
            binary,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }

    pub fn build_args(&self, video: &Path, segment: &Segment, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format!("{:.3}", segment.start_time),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-t".to_string(),
            format!("{:.3}", segment.duration),
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            output.to_string_lossy().to_string(),
        ]
    }
}

impl ClipExtractor for FfmpegExtractor {
    fn extract(
        &self,
        video: &Path,
        segment: &Segment,
        output: &Path,
    ) -> Result<(), ExtractionError> {
        let args = self.build_args(video, segment, output);
        tracing::debug!("Running {} {}", self.binary.display(), args.join(" "));

        let result = Command::new(&self.binary).args(&args).output()?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ExtractionError::FfmpegFailed {
                message: stderr.trim().lines().last().unwrap_or("unknown error").to_string(),
                exit_code: result.status.code(),
            });
        }

        if !output.exists() {
            return Err(ExtractionError::MissingOutput(output.to_path_buf()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedClip {
    /// 1-based position in the segment list.
    pub number: usize,
    pub segment: Segment,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionFailure {
    pub number: usize,
    pub segment: Segment,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ExtractionSummary {
    pub extracted: Vec<ExtractedClip>,
    pub failed: Vec<ExtractionFailure>,
}

/// `segment_<n>_<start>_<end>.mp4`, with times in seconds to two decimals.
pub fn clip_file_name(number: usize, segment: &Segment) -> String {
    format!(
        "segment_{}_{:.2}_{:.2}.mp4",
        number, segment.start_time, segment.end_time
    )
}

pub fn extract_segments<E: ClipExtractor>(
    extractor: &E,
    video: &Path,
    segments: &[Segment],
    output_dir: &Path,
) -> Result<ExtractionSummary> {
    let mut summary = ExtractionSummary::default();

    if let Err(e) = fs::create_dir_all(output_dir) {
        tracing::warn!(
            "Failed to create output dir {}: {}",
            output_dir.display(),
            e
        );
        let reason = ExtractionError::from(e).to_string();
        summary.failed = segments
            .iter()
            .enumerate()
            .map(|(i, segment)| ExtractionFailure {
                number: i + 1,
                segment: *segment,
                reason: reason.clone(),
            })
            .collect();
        return Ok(summary);
    }

    tracing::info!(
        "Extracting {} segments from {}",
        segments.len(),
        video.display()
    );

    let pb = ProgressBar::new(segments.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Extracting segments");

    for (i, segment) in segments.iter().enumerate() {
        let number = i + 1;
        let path = output_dir.join(clip_file_name(number, segment));

        match extractor.extract(video, segment, &path) {
            Ok(()) => summary.extracted.push(ExtractedClip {
                number,
                segment: *segment,
                path,
            }),
            Err(e) => {
                tracing::warn!(
                    "Segment {} ({:.2}s-{:.2}s) failed: {}",
                    number,
                    segment.start_time,
                    segment.end_time,
                    e
                );
                summary.failed.push(ExtractionFailure {
                    number,
                    segment: *segment,
                    reason: e.to_string(),
                });
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Done");

    Ok(summary)
}
