mod associate;
mod bbox;
mod checkpoint;
mod config;
mod consensus;
mod detection;
mod error;
mod features;
mod heuristic;
mod orchestrator;
mod protocol;
mod resilient;
mod scorer;
mod track;
mod track_store;
mod tracker;

#[cfg(feature = "python")]
mod python_api;

pub use associate::{Association, Vote, associate_detections_to_tracks};
pub use bbox::{BBox, BoxFeature};
pub use checkpoint::Checkpoint;
pub use config::{FailurePolicy, ScorerPolicy, TrackerConfig};
pub use consensus::{VETO_SCORE, consensus_scores, doubly_normalized};
pub use detection::{Detection, FrameDetection, Thumbnail};
pub use error::{Error, Result};
pub use features::{FrameDims, extract_frame_features};
pub use heuristic::CenterDistanceScorer;
pub use orchestrator::{BatchOutput, FrameInput, Orchestrator};
pub use protocol::{JobOutput, Packet, SliceRegistry};
pub use resilient::{CircuitBreaker, CircuitState, ResilientScorer};
pub use scorer::{
    AffinityScorer, HiddenState, ScoreQuery, ScoreRequest, ScoreResponse, ScoringContext,
};
pub use track::{Track, TrackHistory};
pub use track_store::TrackStore;
pub use tracker::{ConsensusTracker, FrameOutcome};

#[cfg(feature = "python")]
use pyo3::{
    Bound, PyResult, pymodule,
    types::{PyModule, PyModuleMethods},
};

#[cfg(feature = "python")]
use crate::python_api::{PyTrack, PyTracker};

#[cfg(feature = "python")]
#[pymodule]
fn consensus_track(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTracker>()?;
    m.add_class::<PyTrack>()?;

    Ok(())
}
