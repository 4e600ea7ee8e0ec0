//! Drives a batch of frames of one slice through the tracker.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    checkpoint::Checkpoint,
    config::{FailurePolicy, TrackerConfig},
    detection::{Detection, FrameDetection, Thumbnail},
    error::Result,
    features::{FrameDims, extract_frame_features},
    resilient::ResilientScorer,
    scorer::AffinityScorer,
    tracker::ConsensusTracker,
};

/// One decoded frame as handed over by the host framework.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// Appearance crop of each detection, same order as `detections`.
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

impl FrameInput {
    pub fn dims(&self) -> FrameDims {
        FrameDims {
            width: self.width,
            height: self.height,
        }
    }
}

/// Output of one batch.
#[derive(Clone, Debug)]
pub struct BatchOutput {
    /// Usable detections of each frame, annotated with their track id.
    pub detections: Vec<Vec<Detection>>,
    pub checkpoint: Checkpoint,
    /// Frames emitted without track ids because the scorer failed.
    pub skipped_frames: Vec<usize>,
}

pub struct Orchestrator<S> {
    tracker: ConsensusTracker<ResilientScorer<S>>,
    on_failure: FailurePolicy,
}

impl<S: AffinityScorer> Orchestrator<S> {
    pub fn new(scorer: S, config: TrackerConfig) -> Result<Self> {
        let on_failure = config.scorer.on_failure;
        let scorer = ResilientScorer::new(scorer, &config.scorer, config.hidden_size);
        Ok(Self {
            tracker: ConsensusTracker::new(scorer, config)?,
            on_failure,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        self.tracker.config()
    }

    pub fn scorer(&self) -> &ResilientScorer<S> {
        self.tracker.scorer()
    }

    /// Tracks `frames` in order, starting from `checkpoint`.
    ///
    /// Frames are strictly sequential. With [`FailurePolicy::AbortJob`] the
    /// first scorer failure fails the batch and no output is produced.
    pub fn process_batch(
        &self,
        checkpoint: Checkpoint,
        frames: &[FrameInput],
    ) -> Result<BatchOutput> {
        let mut checkpoint = checkpoint;
        let skip_failed = self.on_failure == FailurePolicy::SkipFrame;
        let mut detections = Vec::with_capacity(frames.len());
        let mut skipped_frames = Vec::new();

        for (index, frame) in frames.iter().enumerate() {
            let usable = extract_frame_features(
                &frame.detections,
                &frame.thumbnails,
                frame.dims(),
                self.config(),
            );

            match self.tracker.step(&checkpoint, &usable) {
                Ok(outcome) => {
                    detections.push(annotate(usable, &outcome.track_ids));
                    checkpoint = outcome.checkpoint;
                }
                Err(error) if skip_failed && error.is_scorer_failure() => {
                    warn!(frame = index, %error, "skipping frame after scorer failure");
                    detections.push(usable.into_iter().map(|d| d.detection).collect());
                    checkpoint = checkpoint.reset();
                    skipped_frames.push(index);
                }
                Err(error) => return Err(error),
            }
        }

        info!(
            frames = frames.len(),
            skipped = skipped_frames.len(),
            active = checkpoint.tracks.len(),
            next_track_id = checkpoint.next_track_id,
            "batch complete"
        );

        Ok(BatchOutput {
            detections,
            checkpoint,
            skipped_frames,
        })
    }
}

fn annotate(usable: Vec<FrameDetection>, track_ids: &[u64]) -> Vec<Detection> {
    usable
        .into_iter()
        .zip(track_ids)
        .map(|(usable, &id)| Detection {
            track_id: Some(id),
            ..usable.detection
        })
        .collect()
}
