use itertools::izip;
use tracing::{debug, info};

use crate::{
    associate::associate_detections_to_tracks,
    checkpoint::Checkpoint,
    config::TrackerConfig,
    detection::FrameDetection,
    error::Result,
    scorer::AffinityScorer,
    track::Track,
    track_store::TrackStore,
};

/// Result of tracking one frame.
#[derive(Clone, Debug)]
pub struct FrameOutcome {
    pub checkpoint: Checkpoint,
    /// Track id of each usable detection, in input order.
    pub track_ids: Vec<u64>,
}

/// Frame-by-frame association engine.
///
/// Holds no per-slice state: every call takes the slice's checkpoint and
/// returns the next one.
pub struct ConsensusTracker<S> {
    scorer: S,
    config: TrackerConfig,
}

impl<S: AffinityScorer> ConsensusTracker<S> {
    pub fn new(scorer: S, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { scorer, config })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Tracks one frame of usable detections.
    ///
    /// A frame without usable detections resets the slice: every track is
    /// dropped and the next frame starts over. On a scorer failure the
    /// error is returned and `checkpoint` remains the slice's latest state.
    pub fn step(
        &self,
        checkpoint: &Checkpoint,
        detections: &[FrameDetection],
    ) -> Result<FrameOutcome> {
        if detections.is_empty() {
            if !checkpoint.tracks.is_empty() {
                info!(
                    dropped = checkpoint.tracks.len(),
                    "frame without usable detections, resetting tracks"
                );
            }
            return Ok(FrameOutcome {
                checkpoint: checkpoint.clone().reset(),
                track_ids: Vec::new(),
            });
        }

        let previous = checkpoint.previous.as_deref().unwrap_or_default();
        // without a previous frame there is nothing to match against
        let unmatchable = TrackStore::new();
        let tracks = if previous.is_empty() {
            &unmatchable
        } else {
            &checkpoint.tracks
        };

        let association = associate_detections_to_tracks(
            tracks,
            previous,
            detections,
            &self.scorer,
            &self.config,
        )?;

        let mut next = Checkpoint {
            next_track_id: checkpoint.next_track_id,
            ..Checkpoint::default()
        };
        let mut track_ids: Vec<Option<u64>> = vec![None; detections.len()];
        let mut active = Vec::with_capacity(tracks.len() + detections.len());
        let mut pruned = 0;

        let outcomes = izip!(tracks.tracks(), association.matches, association.hidden);
        for (track, column, hidden) in outcomes {
            match (column, hidden) {
                (Some(column), Some(hidden)) => {
                    track_ids[column] = Some(track.id);
                    active.push(track.clone().matched(
                        column,
                        hidden,
                        detections[column].thumbnail.clone(),
                    ));
                }
                _ => match track.clone().unmatched(self.config.max_age) {
                    Some(track) => active.push(track),
                    None => pruned += 1,
                },
            }
        }

        let mut created = 0;
        for (slot, detection) in detections.iter().enumerate() {
            if track_ids[slot].is_some() {
                continue;
            }
            let id = next.allocate_track_id();
            active.push(Track::new(
                id,
                slot,
                self.config.hidden_size,
                detection.thumbnail.clone(),
                self.config.history_capacity(),
            ));
            track_ids[slot] = Some(id);
            created += 1;
        }

        debug!(active = active.len(), created, pruned, "updated tracks");

        next.tracks.replace(active);
        next.previous = Some(detections.to_vec());

        Ok(FrameOutcome {
            checkpoint: next,
            track_ids: track_ids.into_iter().flatten().collect(),
        })
    }
}
