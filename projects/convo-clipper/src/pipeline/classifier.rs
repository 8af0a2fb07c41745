use crate::pipeline::types::FrameRecord;
use anyhow::{anyhow, Context, Result};
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use std::path::Path;

/// Default OpenCV frontal face cascade, looked up through OpenCV's data path
/// when it is not found as a plain file.
pub const DEFAULT_CASCADE: &str = "haarcascade_frontalface_default.xml";

/// Anything that can count faces in a BGR frame.
pub trait FaceDetector {
    fn count_faces(&mut self, image: &Mat) -> Result<usize>;
}

/// Haar cascade face detector, tuned the same way as the classic
/// `detectMultiScale(gray, 1.1, 4)` call.
pub struct HaarFaceDetector {
    classifier: CascadeClassifier,
    scale_factor: f64,
    min_neighbors: i32,
}

impl HaarFaceDetector {
    pub fn new(cascade: &str) -> Result<Self> {
        let path = resolve_cascade(cascade)?;
        let classifier = CascadeClassifier::new(&path)
            .with_context(|| format!("Failed to load face cascade from '{}'", path))?;
        if classifier.empty()? {
            return Err(anyhow!("Face cascade '{}' is empty", path));
        }
        tracing::info!("Loaded face cascade from {}", path);

        Ok(Self {
            classifier,
            scale_factor: 1.1,
            min_neighbors: 4,
        })
    }
}

impl FaceDetector for HaarFaceDetector {
    fn count_faces(&mut self, image: &Mat) -> Result<usize> {
        if image.empty() {
            return Err(anyhow!("Empty frame"));
        }

        let mut gray = Mat::default();
        opencv::imgproc::cvt_color_def(image, &mut gray, opencv::imgproc::COLOR_BGR2GRAY)?;

        let mut faces = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            &gray,
            &mut faces,
            self.scale_factor,
            self.min_neighbors,
            0,
            Size::new(0, 0),
            Size::new(0, 0),
        )?;

        Ok(faces.len())
    }
}

fn resolve_cascade(cascade: &str) -> Result<String> {
    if Path::new(cascade).is_file() {
        return Ok(cascade.to_string());
    }

    let file_name = Path::new(cascade)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(DEFAULT_CASCADE);
    for candidate in [format!("haarcascades/{}", file_name), file_name.to_string()] {
        if let Ok(found) = opencv::core::find_file(&candidate, false, true) {
            if !found.is_empty() {
                return Ok(found);
            }
        }
    }

    Err(anyhow!(
        "Face cascade '{}' not found; pass --cascade with a path to the XML file",
        cascade
    ))
}

/// Policy deciding whether a face count makes a conversation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationPolicy {
    pub min_faces: usize,
}

impl Default for ConversationPolicy {
    fn default() -> Self {
        Self { min_faces: 2 }
    }
}

impl ConversationPolicy {
    pub fn is_conversation(&self, face_count: usize) -> bool {
        face_count >= self.min_faces
    }
}

/// Turns sampled frames into [`FrameRecord`]s.
///
/// Detector failures never abort the run: the frame is scored as having no
/// faces and the failure is logged.
pub struct FrameClassifier<D> {
    detector: D,
    policy: ConversationPolicy,
    failures: usize,
}

impl<D: FaceDetector> FrameClassifier<D> {
    pub fn new(detector: D, policy: ConversationPolicy) -> Self {
        Self {
            detector,
            policy,
            failures: 0,
        }
    }

    pub fn classify(&mut self, index: usize, timestamp: f64, image: &Mat) -> FrameRecord {
        let face_count = match self.detector.count_faces(image) {
            Ok(count) => count,
            Err(e) => {
                self.failures += 1;
                tracing::warn!("Face detection failed on frame {}: {:#}", index, e);
                0
            }
        };

        FrameRecord {
            index,
            timestamp,
            face_count,
            is_conversation: self.policy.is_conversation(face_count),
        }
    }

    /// Number of frames whose detection failed so far.
    pub fn failures(&self) -> usize {
        self.failures
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Detector that replays scripted outcomes, `None` meaning a failure.
    pub(crate) struct ScriptedDetector {
        pub outcomes: VecDeque<Option<usize>>,
    }

    impl ScriptedDetector {
        pub(crate) fn new(outcomes: &[Option<usize>]) -> Self {
            Self {
                outcomes: outcomes.iter().copied().collect(),
            }
        }
    }

    impl FaceDetector for ScriptedDetector {
        fn count_faces(&mut self, _image: &Mat) -> Result<usize> {
            match self.outcomes.pop_front().flatten() {
                Some(count) => Ok(count),
                None => Err(anyhow!("scripted failure")),
            }
        }
    }

    #[test]
    fn test_policy_threshold() {
        let policy = ConversationPolicy::default();
        assert!(!policy.is_conversation(0));
        assert!(!policy.is_conversation(1));
        assert!(policy.is_conversation(2));
        assert!(policy.is_conversation(5));

        let strict = ConversationPolicy { min_faces: 3 };
        assert!(!strict.is_conversation(2));
        assert!(strict.is_conversation(3));
    }

    #[test]
    fn test_classify_records_counts() {
        let detector = ScriptedDetector::new(&[Some(1), Some(2), Some(3)]);
        let mut classifier = FrameClassifier::new(detector, ConversationPolicy::default());
        let image = Mat::default();

        let records: Vec<FrameRecord> = (0..3)
            .map(|i| classifier.classify(i * 15, i as f64 * 0.5, &image))
            .collect();

        assert_eq!(records[0].face_count, 1);
        assert!(!records[0].is_conversation);
        assert_eq!(records[1].index, 15);
        assert_eq!(records[1].timestamp, 0.5);
        assert!(records[1].is_conversation);
        assert!(records[2].is_conversation);
        assert_eq!(classifier.failures(), 0);
    }

    #[test]
    fn test_detector_failure_scores_zero() {
        let detector = ScriptedDetector::new(&[Some(4), None, Some(2)]);
        let mut classifier = FrameClassifier::new(detector, ConversationPolicy::default());
        let image = Mat::default();

        let records: Vec<FrameRecord> = (0..3)
            .map(|i| classifier.classify(i, i as f64, &image))
            .collect();

        assert!(records[0].is_conversation);
        assert_eq!(records[1].face_count, 0);
        assert!(!records[1].is_conversation);
        assert!(records[2].is_conversation);
        assert_eq!(classifier.failures(), 1);
    }

    #[test]
    fn test_missing_cascade_is_an_error() {
        assert!(HaarFaceDetector::new("/nonexistent/not_a_cascade_file.xml").is_err());
    }
}
