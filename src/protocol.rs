//! Control packets of the host streaming framework and the per-slice state
//! table that sits behind them. Binary framing is left to the host.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    checkpoint::Checkpoint,
    detection::Detection,
    error::{Error, Result},
    orchestrator::{FrameInput, Orchestrator},
    scorer::AffinityScorer,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type", rename_all = "lowercase")]
pub enum Packet {
    /// A slice is about to stream jobs.
    Init {
        #[serde(rename = "ID")]
        id: u32,
    },
    /// Frames `range.0..range.1` of a slice follow.
    Job {
        #[serde(rename = "SliceIdx")]
        slice_idx: u32,
        #[serde(rename = "Range")]
        range: (u32, u32),
    },
    /// The slice is done, its state can go.
    Finish {
        #[serde(rename = "ID")]
        id: u32,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    pub slice_idx: u32,
    pub range: (u32, u32),
    pub detections: Vec<Vec<Detection>>,
}

/// Checkpoints of the slices currently streaming.
///
/// Each slice's checkpoint is moved into the orchestrator for the job and
/// the returned one stored back, so slices never observe each other.
#[derive(Debug, Default)]
pub struct SliceRegistry {
    states: HashMap<u32, Checkpoint>,
}

impl SliceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn checkpoint(&self, slice_idx: u32) -> Option<&Checkpoint> {
        self.states.get(&slice_idx)
    }

    /// Applies one control packet. Only `Job` packets produce output;
    /// `frames` is ignored for the others.
    pub fn handle<S: AffinityScorer>(
        &mut self,
        orchestrator: &Orchestrator<S>,
        packet: &Packet,
        frames: &[FrameInput],
    ) -> Result<Option<JobOutput>> {
        match *packet {
            Packet::Init { id } => {
                debug!(slice = id, "slice started");
                self.states.insert(id, Checkpoint::new());
                Ok(None)
            }
            Packet::Job { slice_idx, range } => {
                let expected = range.1.checked_sub(range.0).ok_or_else(|| {
                    Error::InvalidJob(format!("inverted frame range {range:?}"))
                })?;
                if frames.len() != expected as usize {
                    return Err(Error::InvalidJob(format!(
                        "range {range:?} spans {expected} frames, got {}",
                        frames.len()
                    )));
                }
                let checkpoint = self.states.remove(&slice_idx).ok_or_else(|| {
                    Error::InvalidJob(format!("job for unknown slice {slice_idx}"))
                })?;
                // on failure the slice keeps its last good checkpoint
                let output = match orchestrator.process_batch(checkpoint.clone(), frames) {
                    Ok(output) => output,
                    Err(error) => {
                        self.states.insert(slice_idx, checkpoint);
                        return Err(error);
                    }
                };
                self.states.insert(slice_idx, output.checkpoint);
                Ok(Some(JobOutput {
                    slice_idx,
                    range,
                    detections: output.detections,
                }))
            }
            Packet::Finish { id } => {
                if self.states.remove(&id).is_none() {
                    return Err(Error::InvalidJob(format!("finish for unknown slice {id}")));
                }
                debug!(slice = id, "slice finished");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TrackerConfig, heuristic::CenterDistanceScorer};

    fn frame(x: i32) -> FrameInput {
        FrameInput {
            width: 640,
            height: 480,
            detections: vec![Detection::new(x, 10, x + 40, 50)],
            thumbnails: Vec::new(),
        }
    }

    fn orchestrator() -> Orchestrator<CenterDistanceScorer> {
        Orchestrator::new(CenterDistanceScorer::default(), TrackerConfig::default()).unwrap()
    }

    #[test]
    fn test_packets_parse_from_host_json() {
        let json = r#"{"Type": "job", "SliceIdx": 3, "Range": [30, 60]}"#;

        let packet: Packet = serde_json::from_str(json).unwrap();

        assert_eq!(
            packet,
            Packet::Job {
                slice_idx: 3,
                range: (30, 60)
            }
        );
        assert_eq!(
            serde_json::from_str::<Packet>(r#"{"Type": "finish", "ID": 3}"#).unwrap(),
            Packet::Finish { id: 3 }
        );
    }

    #[test]
    fn test_slices_keep_independent_state() {
        let orchestrator = orchestrator();
        let mut registry = SliceRegistry::new();
        registry.handle(&orchestrator, &Packet::Init { id: 0 }, &[]).unwrap();
        registry.handle(&orchestrator, &Packet::Init { id: 1 }, &[]).unwrap();

        let job = |slice_idx, start| Packet::Job {
            slice_idx,
            range: (start, start + 2),
        };
        let a = registry
            .handle(&orchestrator, &job(0, 0), &[frame(100), frame(102)])
            .unwrap()
            .unwrap();
        let b = registry
            .handle(&orchestrator, &job(1, 0), &[frame(300), frame(301)])
            .unwrap()
            .unwrap();
        let a2 = registry
            .handle(&orchestrator, &job(0, 2), &[frame(104), frame(106)])
            .unwrap()
            .unwrap();

        assert_eq!(a.detections[1][0].track_id, Some(0));
        assert_eq!(b.detections[1][0].track_id, Some(0));
        assert_eq!(a2.detections[1][0].track_id, Some(0));
        assert_eq!(registry.checkpoint(0).unwrap().next_track_id, 1);

        registry.handle(&orchestrator, &Packet::Finish { id: 0 }, &[]).unwrap();
        assert!(registry.checkpoint(0).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_job_for_unknown_slice_is_rejected() {
        let mut registry = SliceRegistry::new();

        let result = registry.handle(
            &orchestrator(),
            &Packet::Job {
                slice_idx: 9,
                range: (0, 1),
            },
            &[frame(0)],
        );

        assert!(matches!(result, Err(Error::InvalidJob(_))));
    }

    #[test]
    fn test_frame_count_must_match_range() {
        let orchestrator = orchestrator();
        let mut registry = SliceRegistry::new();
        registry.handle(&orchestrator, &Packet::Init { id: 0 }, &[]).unwrap();

        let result = registry.handle(
            &orchestrator,
            &Packet::Job {
                slice_idx: 0,
                range: (0, 3),
            },
            &[frame(0)],
        );

        assert!(matches!(result, Err(Error::InvalidJob(_))));
        assert!(registry.checkpoint(0).is_some());
    }
}
