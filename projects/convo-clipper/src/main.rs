mod cli;
mod error;
mod extract;
mod pipeline;
mod run_artifacts;
mod source;
mod video;

use anyhow::{Context, Result};
use cli::Args;
use extract::{extract_segments, FfmpegExtractor};
use pipeline::analyzer::analyze;
use pipeline::classifier::HaarFaceDetector;
use run_artifacts::{write_summary, RunSummary};
use source::{VideoSource, YtDlpSource};
use std::io::{self, BufRead, Write};
use video::sampler::FrameSampler;

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();

    let url = match &args.url {
        Some(url) => url.clone(),
        None => prompt_for_url()?,
    };

    let source = YtDlpSource::new(&args.video_dir);
    let video_path = match source.acquire(&url) {
        Ok(path) => path,
        Err(e) => {
            tracing::error!("Video acquisition failed: {}", e);
            println!("Failed to download the video. Exiting.");
            return Ok(());
        }
    };

    let config = args.analysis_config();
    let sampler = FrameSampler::open(&video_path, args.backend, config.sampling_rate);
    let report = analyze(sampler, &config, &args.frames_dir, || {
        HaarFaceDetector::new(&args.cascade)
    })?;

    tracing::info!(
        "{} of {} sampled frames look like conversations ({} detection failures, {:.1}s)",
        report.conversation_frames(),
        report.frames.len(),
        report.classification_failures,
        report.duration.as_secs_f64()
    );

    let extractor = FfmpegExtractor::new();
    let extraction = extract_segments(
        &extractor,
        &video_path,
        &report.segments,
        &args.output_dir,
    )?;

    println!("Extracted {} conversation segments", extraction.extracted.len());
    for clip in &extraction.extracted {
        println!("- {}", clip.path.display());
    }
    if !extraction.failed.is_empty() {
        println!("Failed to extract {} segments", extraction.failed.len());
        for failure in &extraction.failed {
            println!(
                "- segment {} ({:.2}s-{:.2}s): {}",
                failure.number,
                failure.segment.start_time,
                failure.segment.end_time,
                failure.reason
            );
        }
    }

    let summary = RunSummary::new(
        &url,
        &video_path,
        &config,
        &report.frames,
        &report.segments,
        extraction,
    );
    match write_summary(&args.output_dir, &summary) {
        Ok(path) => tracing::info!("Run summary written to {}", path.display()),
        Err(e) => tracing::warn!("Could not write run summary: {:#}", e),
    }

    Ok(())
}

fn prompt_for_url() -> Result<String> {
    print!("Enter the YouTube video URL: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read URL from stdin")?;
    Ok(line.trim().to_string())
}
