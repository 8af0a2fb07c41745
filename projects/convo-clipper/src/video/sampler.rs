// Fixed-rate frame sampling over the native frame stream
//
// The sampler walks every decoded frame once and keeps those whose index is a
// multiple of the sampling interval. Timestamps are derived from the native
// frame index, so long videos do not accumulate drift from the sampling rate.

use super::{open_reader, Backend, VideoReader};
use opencv::core::Mat;
use std::path::Path;

/// A frame selected for analysis.
pub struct SampledFrame {
    pub index: usize,
    pub timestamp: f64,
    pub image: Mat,
}

/// Number of native frames between two samples: `floor(fps / rate)`, at least 1.
pub fn sampling_interval(source_fps: f64, sampling_rate: f64) -> usize {
    let interval = (source_fps / sampling_rate).floor();
    if interval.is_finite() && interval >= 1.0 {
        interval as usize
    } else {
        1
    }
}

/// Sample count used for progress reporting: `floor(total / interval) + 1`,
/// or 0 for an empty source.
///
/// When `total` is an exact multiple of `interval` the sampler yields one
/// frame fewer than this, so the progress bar can overshoot by one.
pub fn expected_sample_count(total_frames: usize, interval: usize) -> usize {
    if total_frames == 0 {
        0
    } else {
        total_frames / interval.max(1) + 1
    }
}

/// Lazy, single-pass iterator of sampled frames.
pub struct FrameSampler {
    reader: Option<Box<dyn VideoReader>>,
    source_fps: f64,
    interval: usize,
    total_frames: Option<usize>,
    next_index: usize,
}

impl FrameSampler {
    /// Open `path` with the given backend. A source that cannot be opened or
    /// reports no frames yields an empty sampler instead of an error. A source
    /// whose frame count is unknown is decoded until end of stream.
    pub fn open(path: &Path, backend: Backend, sampling_rate: f64) -> Self {
        match open_reader(path, backend) {
            Ok(reader) => Self::from_reader(reader, sampling_rate),
            Err(e) => {
                tracing::warn!(
                    "Could not open {} with {} backend: {:#}",
                    path.display(),
                    backend.as_str(),
                    e
                );
                Self::empty()
            }
        }
    }

    pub fn from_reader(reader: Box<dyn VideoReader>, sampling_rate: f64) -> Self {
        let source_fps = reader.source_fps();
        let total_frames = reader.frame_count();
        let interval = sampling_interval(source_fps, sampling_rate);

        match total_frames {
            Some(0) => {
                tracing::warn!("Video reports zero frames, nothing to sample");
                return Self::empty();
            }
            None => tracing::warn!("Video frame count unknown, decoding until end of stream"),
            Some(_) => {}
        }

        tracing::info!(
            "Sampling every {} frame(s) ({:.2} fps source, {:.2} samples/s requested)",
            interval,
            source_fps,
            sampling_rate
        );

        Self {
            reader: Some(reader),
            source_fps,
            interval,
            total_frames,
            next_index: 0,
        }
    }

    fn empty() -> Self {
        Self {
            reader: None,
            source_fps: 0.0,
            interval: 1,
            total_frames: Some(0),
            next_index: 0,
        }
    }

    /// `None` when the source did not report a frame count.
    pub fn expected_samples(&self) -> Option<usize> {
        self.total_frames
            .map(|total| expected_sample_count(total, self.interval))
    }
}

impl Iterator for FrameSampler {
    type Item = SampledFrame;

    fn next(&mut self) -> Option<SampledFrame> {
        loop {
            let reader = self.reader.as_mut()?;
            let frame = match reader.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    // Release the decoder as soon as the stream ends.
                    self.reader = None;
                    return None;
                }
                Err(e) => {
                    tracing::warn!("Stopped reading at frame {}: {:#}", self.next_index, e);
                    self.reader = None;
                    return None;
                }
            };

            let index = self.next_index;
            self.next_index += 1;

            if index % self.interval == 0 {
                return Some(SampledFrame {
                    index,
                    timestamp: index as f64 / self.source_fps,
                    image: frame,
                });
            }
        }
    }
}
