// Analysis orchestrator: sampling -> classification -> segmentation
//
// Classification runs on the sampling thread, or on a crossbeam worker pool
// when more than one worker is configured. Either way the records are put back
// in index order before segmentation.

use crate::pipeline::classifier::{ConversationPolicy, FaceDetector, FrameClassifier};
use crate::pipeline::segmenter::build_segments;
use crate::pipeline::types::{AnalysisConfig, FrameRecord, Segment};
use crate::run_artifacts::write_frame_log;
use crate::video::processor::{process_video, VideoSession};
use crate::video::sampler::{FrameSampler, SampledFrame};
use anyhow::{anyhow, Context, Result};
use crossbeam::channel::{self, Receiver, Sender};
use opencv::core::Vector;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub struct AnalysisReport {
    pub frames: Vec<FrameRecord>,
    pub segments: Vec<Segment>,
    /// Frames whose face detection failed and were scored as empty.
    pub classification_failures: usize,
    pub duration: Duration,
}

impl AnalysisReport {
    pub fn conversation_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.is_conversation).count()
    }
}

/// Analyse every sampled frame and build the conversation segments.
///
/// `make_detector` is called once per classification thread, on that thread.
/// Failing to persist frame images or the frame log is logged and does not
/// discard the analysis.
pub fn analyze<D, F>(
    sampler: FrameSampler,
    config: &AnalysisConfig,
    frames_dir: &Path,
    make_detector: F,
) -> Result<AnalysisReport>
where
    D: FaceDetector,
    F: Fn() -> Result<D> + Sync,
{
    let frames_dir_ready = match fs::create_dir_all(frames_dir) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                "Failed to create frames dir {}, frame images and log will not be written: {}",
                frames_dir.display(),
                e
            );
            false
        }
    };

    let policy = ConversationPolicy {
        min_faces: config.min_faces,
    };
    let session = VideoSession::new(sampler, "Analyzing frames")?;
    let image_dir = (config.save_frame_images && frames_dir_ready).then_some(frames_dir);

    let (frames, classification_failures, duration) = if config.workers > 1 {
        classify_parallel(session, config.workers, policy, image_dir, &make_detector)?
    } else {
        classify_sequential(session, policy, image_dir, &make_detector)?
    };

    tracing::info!(
        "Classified {} frames in {:.1}s ({} detection failures)",
        frames.len(),
        duration.as_secs_f64(),
        classification_failures
    );

    if frames_dir_ready {
        match write_frame_log(frames_dir, &frames) {
            Ok(path) => tracing::debug!("Frame log written to {}", path.display()),
            Err(e) => tracing::warn!("Could not write frame log: {:#}", e),
        }
    }

    let segments = build_segments(&frames, config.min_duration);
    tracing::info!("Found {} conversation segments", segments.len());

    Ok(AnalysisReport {
        frames,
        segments,
        classification_failures,
        duration,
    })
}

fn classify_sequential<D, F>(
    session: VideoSession,
    policy: ConversationPolicy,
    image_dir: Option<&Path>,
    make_detector: &F,
) -> Result<(Vec<FrameRecord>, usize, Duration)>
where
    D: FaceDetector,
    F: Fn() -> Result<D>,
{
    let detector = make_detector().context("Failed to create face detector")?;
    let mut classifier = FrameClassifier::new(detector, policy);
    let mut frames = Vec::new();

    let stats = process_video(session, |frame: SampledFrame| {
        if let Some(dir) = image_dir {
            save_frame_image(dir, &frame);
        }
        frames.push(classifier.classify(frame.index, frame.timestamp, &frame.image));
        Ok(())
    })?;
    tracing::debug!("Classified {} frames on the sampling thread", stats.processed_frames);

    Ok((frames, classifier.failures(), stats.duration))
}

fn classify_parallel<D, F>(
    session: VideoSession,
    workers: usize,
    policy: ConversationPolicy,
    image_dir: Option<&Path>,
    make_detector: &F,
) -> Result<(Vec<FrameRecord>, usize, Duration)>
where
    D: FaceDetector,
    F: Fn() -> Result<D> + Sync,
{
    // Two frames in flight per worker bounds decoded-frame memory.
    let (frame_tx, frame_rx) = channel::bounded::<SampledFrame>(workers * 2);
    let (result_tx, result_rx) = channel::unbounded::<FrameRecord>();

    let outcome = crossbeam::scope(|s| -> Result<(usize, Duration)> {
        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let rx = frame_rx.clone();
                let tx = result_tx.clone();
                s.spawn(move |_| classification_worker(worker_id, rx, tx, make_detector, policy))
            })
            .collect();
        drop(frame_rx);
        drop(result_tx);

        let fed = process_video(session, |frame: SampledFrame| {
            if let Some(dir) = image_dir {
                save_frame_image(dir, &frame);
            }
            frame_tx
                .send(frame)
                .map_err(|_| anyhow!("All classification workers stopped"))
        });
        drop(frame_tx);

        let mut failures = 0;
        let mut worker_error = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(count)) => failures += count,
                Ok(Err(e)) => worker_error = Some(e),
                Err(_) => worker_error = Some(anyhow!("Classification worker panicked")),
            }
        }
        // A worker that failed to start explains a closed channel better.
        if let Some(e) = worker_error {
            return Err(e);
        }
        let stats = fed?;
        tracing::debug!(
            "Fed {} frames to {} classification workers",
            stats.processed_frames,
            workers
        );
        Ok((failures, stats.duration))
    })
    .map_err(|_| anyhow!("Classification thread scope panicked"))?;

    let (failures, duration) = outcome?;

    // Workers finish out of order; restore sampling order.
    let ordered: BTreeMap<usize, FrameRecord> = result_rx.iter().map(|r| (r.index, r)).collect();
    Ok((ordered.into_values().collect(), failures, duration))
}

fn classification_worker<D, F>(
    worker_id: usize,
    rx: Receiver<SampledFrame>,
    tx: Sender<FrameRecord>,
    make_detector: &F,
    policy: ConversationPolicy,
) -> Result<usize>
where
    D: FaceDetector,
    F: Fn() -> Result<D>,
{
    let detector = make_detector()
        .with_context(|| format!("Worker {} failed to create face detector", worker_id))?;
    let mut classifier = FrameClassifier::new(detector, policy);
    tracing::debug!("Classification worker {} started", worker_id);

    for frame in rx {
        let record = classifier.classify(frame.index, frame.timestamp, &frame.image);
        if tx.send(record).is_err() {
            break;
        }
    }

    tracing::debug!("Classification worker {} finished", worker_id);
    Ok(classifier.failures())
}

fn save_frame_image(dir: &Path, frame: &SampledFrame) {
    let path = dir.join(format!("frame_{}.jpg", frame.index));
    match opencv::imgcodecs::imwrite(&path.to_string_lossy(), &frame.image, &Vector::new()) {
        Ok(true) => {}
        Ok(false) => tracing::warn!("OpenCV refused to write {}", path.display()),
        Err(e) => tracing::warn!("Failed to write frame image {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::VideoReader;
    use opencv::core::{Mat, Scalar, CV_32SC1};
    use opencv::prelude::*;

    /// Reader whose frames are 1x1 images holding their own index.
    struct IndexedReader {
        fps: f64,
        total: usize,
        read: usize,
    }

    impl VideoReader for IndexedReader {
        fn frame_count(&self) -> Option<usize> {
            Some(self.total)
        }

        fn source_fps(&self) -> f64 {
            self.fps
        }

        fn next_frame(&mut self) -> Result<Option<Mat>> {
            if self.read >= self.total {
                return Ok(None);
            }
            let mat =
                Mat::new_rows_cols_with_default(1, 1, CV_32SC1, Scalar::all(self.read as f64))?;
            self.read += 1;
            Ok(Some(mat))
        }
    }

    /// Detector whose face count is a function of the frame index.
    struct PatternDetector {
        faces: fn(usize) -> Option<usize>,
    }

    impl FaceDetector for PatternDetector {
        fn count_faces(&mut self, image: &Mat) -> Result<usize> {
            let index = *image.at::<i32>(0)? as usize;
            (self.faces)(index).ok_or_else(|| anyhow!("no detection for frame {}", index))
        }
    }

    /// 10 fps source sampled at 1/s: conversation between 10s and 24s and
    /// from 40s to the end, a detector failure at 30s.
    fn faces_by_index(index: usize) -> Option<usize> {
        match index {
            300 => None,
            100..=240 => Some(2),
            400.. => Some(3),
            _ => Some(1),
        }
    }

    fn sampler(total: usize) -> FrameSampler {
        let reader = IndexedReader {
            fps: 10.0,
            total,
            read: 0,
        };
        FrameSampler::from_reader(Box::new(reader), 1.0)
    }

    fn config(workers: usize) -> AnalysisConfig {
        AnalysisConfig {
            sampling_rate: 1.0,
            min_duration: 3.0,
            min_faces: 2,
            workers,
            save_frame_images: false,
        }
    }

    fn run(workers: usize) -> AnalysisReport {
        let dir = tempfile::tempdir().unwrap();
        analyze(sampler(451), &config(workers), dir.path(), || {
            Ok(PatternDetector {
                faces: faces_by_index,
            })
        })
        .unwrap()
    }

    #[test]
    fn test_sequential_analysis() {
        let report = run(1);

        assert_eq!(report.frames.len(), 46);
        assert_eq!(report.classification_failures, 1);
        assert_eq!(report.frames[30].face_count, 0);

        assert_eq!(report.segments.len(), 2);
        assert_eq!(report.segments[0].start_time, 10.0);
        assert_eq!(report.segments[0].end_time, 24.0);
        // Trailing conversation is closed at the last sampled frame
        assert_eq!(report.segments[1].start_time, 40.0);
        assert_eq!(report.segments[1].end_time, 45.0);
        assert_eq!(report.segments[1].end_index, 450);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = run(1);
        let parallel = run(4);

        assert_eq!(parallel.frames, sequential.frames);
        assert_eq!(parallel.segments, sequential.segments);
        assert_eq!(parallel.classification_failures, 1);
    }

    #[test]
    fn test_empty_source_yields_no_segments() {
        let dir = tempfile::tempdir().unwrap();
        let report = analyze(sampler(0), &config(1), dir.path(), || {
            Ok(PatternDetector {
                faces: faces_by_index,
            })
        })
        .unwrap();

        assert!(report.frames.is_empty());
        assert!(report.segments.is_empty());
        assert!(dir.path().join("frames.csv").exists());
    }

    #[test]
    fn test_unwritable_frames_dir_keeps_segments() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("frames");
        fs::write(&not_a_dir, b"").unwrap();

        let mut config = config(1);
        config.save_frame_images = true;
        let report = analyze(sampler(451), &config, &not_a_dir, || {
            Ok(PatternDetector {
                faces: faces_by_index,
            })
        })
        .unwrap();

        assert_eq!(report.frames.len(), 46);
        assert_eq!(report.segments.len(), 2);
        assert!(not_a_dir.is_file());
    }

    #[test]
    fn test_detector_setup_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        for workers in [1, 3] {
            let result = analyze(sampler(50), &config(workers), dir.path(), || {
                Err::<PatternDetector, _>(anyhow!("no cascade"))
            });
            assert!(result.is_err());
        }
    }
}
