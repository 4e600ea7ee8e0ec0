use serde::{Deserialize, Serialize};

use crate::{
    detection::FrameDetection,
    error::{Error, Result},
    track_store::TrackStore,
};

/// Everything carried from one batch of a slice to the next.
///
/// Each frame reads the previous checkpoint and returns the next one, so
/// independent slices never share state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub tracks: TrackStore,
    /// Id of the next track to create. Ids are never reused within a slice.
    pub next_track_id: u64,
    /// Usable detections of the last frame, `None` after a reset.
    pub previous: Option<Vec<FrameDetection>>,
}

impl Checkpoint {
    /// The state of a fresh slice.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every track and the previous frame, keeping the id counter.
    pub fn reset(mut self) -> Self {
        self.tracks.clear();
        self.previous = None;
        self
    }

    pub fn allocate_track_id(&mut self) -> u64 {
        let id = self.next_track_id;
        self.next_track_id += 1;
        id
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let checkpoint: Checkpoint = serde_json::from_str(contents)?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Rejects checkpoints that could make the tracker reuse an id or index
    /// past the previous frame.
    pub fn validate(&self) -> Result<()> {
        let previous = self.previous.as_ref().map_or(0, Vec::len);
        for track in self.tracks.tracks() {
            if track.id >= self.next_track_id {
                return Err(Error::InvalidCheckpoint(format!(
                    "track id {} not below counter {}",
                    track.id, self.next_track_id
                )));
            }
            if let Some(slot) = track.slot {
                if slot >= previous {
                    return Err(Error::InvalidCheckpoint(format!(
                        "track {} slot {} out of range for {} previous detections",
                        track.id, slot, previous
                    )));
                }
            }
            if track.history.is_empty() {
                return Err(Error::InvalidCheckpoint(format!(
                    "track {} has no history",
                    track.id
                )));
            }
        }
        Ok(())
    }
}
