use pyo3::{Py, PyAny, PyResult, pyclass, pymethods};

use crate::{
    checkpoint::Checkpoint,
    config::TrackerConfig,
    detection::Thumbnail,
    error::Error,
    orchestrator::{FrameInput, Orchestrator},
    python_api::{PyCallableScorer, PyTrack},
};

#[pyclass(name = "Tracker")]
pub struct PyTracker {
    inner: Orchestrator<PyCallableScorer>,
}

#[pymethods]
impl PyTracker {
    #[new]
    #[pyo3(signature = (scorer, config_json=None))]
    pub fn new(scorer: Py<PyAny>, config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => TrackerConfig::from_json(json)?,
            None => TrackerConfig::default(),
        };
        Ok(Self {
            inner: Orchestrator::new(PyCallableScorer::new(scorer), config)?,
        })
    }

    /// Tracks a batch of frames.
    ///
    /// `frames_json` is a list of `{"width", "height", "detections"}`,
    /// `thumbnails[f][d]` the crop bytes of detection `d` of frame `f`.
    /// Returns the annotated detections and the next checkpoint, both JSON.
    #[pyo3(signature = (frames_json, thumbnails, checkpoint=None))]
    pub fn process_job(
        &self,
        frames_json: &str,
        thumbnails: Vec<Vec<Vec<u8>>>,
        checkpoint: Option<&str>,
    ) -> PyResult<(String, String)> {
        let mut frames: Vec<FrameInput> = serde_json::from_str(frames_json).map_err(Error::from)?;
        if thumbnails.len() > frames.len() {
            return Err(Error::InvalidJob(format!(
                "{} thumbnail lists for {} frames",
                thumbnails.len(),
                frames.len()
            ))
            .into());
        }
        for (frame, crops) in frames.iter_mut().zip(thumbnails) {
            frame.thumbnails = crops.into_iter().map(Thumbnail::from).collect();
        }

        let checkpoint = match checkpoint {
            Some(json) => Checkpoint::from_json(json)?,
            None => Checkpoint::new(),
        };
        let output = self.inner.process_batch(checkpoint, &frames)?;

        Ok((
            serde_json::to_string(&output.detections).map_err(Error::from)?,
            output.checkpoint.to_json()?,
        ))
    }

    pub fn active_tracks(&self, checkpoint: &str) -> PyResult<Vec<PyTrack>> {
        let checkpoint = Checkpoint::from_json(checkpoint)?;
        Ok(checkpoint.tracks.tracks().iter().map(PyTrack::from).collect())
    }
}
