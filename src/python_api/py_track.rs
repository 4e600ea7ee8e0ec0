use pyo3::pyclass;

use crate::track::Track;

#[pyclass(name = "Track")]
pub struct PyTrack {
    #[pyo3(get)]
    pub id: u64,
    #[pyo3(get)]
    pub age: u32,
    #[pyo3(get)]
    pub slot: Option<usize>,
    #[pyo3(get)]
    pub history_len: usize,
}

impl From<&Track> for PyTrack {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            age: track.age,
            slot: track.slot,
            history_len: track.history.len(),
        }
    }
}
