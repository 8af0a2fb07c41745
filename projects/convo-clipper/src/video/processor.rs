use crate::video::sampler::{FrameSampler, SampledFrame};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

pub struct ProcessingStats {
    pub processed_frames: usize,
    pub duration: Duration,
}

/// A trait for handling sampled frames. This separates the "how to process"
/// from the "how to read and report progress" logic.
pub trait FrameProcessor {
    fn process(&mut self, frame: SampledFrame) -> Result<()>;
}

/// Blanket implementation so any closure with the right signature
/// automatically implements FrameProcessor.
impl<F> FrameProcessor for F
where
    F: FnMut(SampledFrame) -> Result<()>,
{
    fn process(&mut self, frame: SampledFrame) -> Result<()> {
        self(frame)
    }
}

pub struct VideoSession {
    pub sampler: FrameSampler,
    pub pb: ProgressBar,
    pub start_time: Instant,
    pub processed_frames: usize,
}

impl VideoSession {
    pub fn new(sampler: FrameSampler, label: &str) -> Result<Self> {
        let pb = match sampler.expected_samples() {
            Some(samples) => ProgressBar::new(samples as u64),
            None => ProgressBar::no_length(),
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow}, {eta})")?
                .progress_chars("#>-"),
        );
        pb.set_message(label.to_string());

        Ok(Self {
            sampler,
            pb,
            start_time: Instant::now(),
            processed_frames: 0,
        })
    }
}

/// Drive every sampled frame of the session through `processor`.
pub fn process_video<P>(mut session: VideoSession, mut processor: P) -> Result<ProcessingStats>
where
    P: FrameProcessor,
{
    for frame in session.sampler.by_ref() {
        processor.process(frame)?;
        session.processed_frames += 1;
        session.pb.inc(1);
    }

    session.pb.finish_with_message("Done");

    Ok(ProcessingStats {
        processed_frames: session.processed_frames,
        duration: session.start_time.elapsed(),
    })
}
