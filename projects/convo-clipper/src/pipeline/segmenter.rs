// Groups classified frames into conversation segments
//
// Segmentation is a single left-to-right fold over the frame records. The
// accumulator is an explicit `SegmentState`; a segment ends at the last
// conversation frame before a non-conversation frame, or at the last frame of
// the sequence when the video ends mid-conversation.

use crate::pipeline::types::{FrameRecord, Segment};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentState {
    NoSegment,
    OpenSegment {
        start_time: f64,
        start_index: usize,
        last_time: f64,
        last_index: usize,
    },
    ClosedSegment(Segment),
}

impl SegmentState {
    /// Advance the state machine by one frame.
    pub fn advance(self, frame: &FrameRecord) -> SegmentState {
        match (self, frame.is_conversation) {
            (SegmentState::NoSegment | SegmentState::ClosedSegment(_), true) => {
                SegmentState::OpenSegment {
                    start_time: frame.timestamp,
                    start_index: frame.index,
                    last_time: frame.timestamp,
                    last_index: frame.index,
                }
            }
            (SegmentState::NoSegment | SegmentState::ClosedSegment(_), false) => {
                SegmentState::NoSegment
            }
            (
                SegmentState::OpenSegment {
                    start_time,
                    start_index,
                    ..
                },
                true,
            ) => SegmentState::OpenSegment {
                start_time,
                start_index,
                last_time: frame.timestamp,
                last_index: frame.index,
            },
            (open @ SegmentState::OpenSegment { .. }, false) => open.close(),
        }
    }

    /// Close an open segment at its last conversation frame. Other states are
    /// returned unchanged.
    pub fn close(self) -> SegmentState {
        match self {
            SegmentState::OpenSegment {
                start_time,
                start_index,
                last_time,
                last_index,
            } => SegmentState::ClosedSegment(Segment::new(
                start_time,
                start_index,
                last_time,
                last_index,
            )),
            other => other,
        }
    }
}

/// Build the segments whose duration is at least `min_duration` seconds.
///
/// Frames must be in increasing index order.
pub fn build_segments<'a, I>(frames: I, min_duration: f64) -> Vec<Segment>
where
    I: IntoIterator<Item = &'a FrameRecord>,
{
    let keep = |segments: &mut Vec<Segment>, state: SegmentState| {
        if let SegmentState::ClosedSegment(segment) = state {
            if segment.duration >= min_duration {
                segments.push(segment);
            } else {
                tracing::debug!(
                    "Dropping segment {:.2}s-{:.2}s ({:.2}s < {:.2}s)",
                    segment.start_time,
                    segment.end_time,
                    segment.duration,
                    min_duration
                );
            }
        }
    };

    let (mut segments, last_state) = frames.into_iter().fold(
        (Vec::new(), SegmentState::NoSegment),
        |(mut segments, state), frame| {
            let next = state.advance(frame);
            keep(&mut segments, next);
            (segments, next)
        },
    );

    // A video ending mid-conversation has no trailing frame to close it.
    if let SegmentState::OpenSegment { .. } = last_state {
        keep(&mut segments, last_state.close());
    }

    segments
}
