// Conversation detection pipeline: classification, segmentation and the
// orchestrator tying them to the frame sampler.

pub mod analyzer;
pub mod classifier;
pub mod segmenter;
pub mod types;
