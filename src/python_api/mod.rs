mod py_scorer;
mod py_track;
mod py_tracker;

pub use py_scorer::PyCallableScorer;
pub use py_track::PyTrack;
pub use py_tracker::PyTracker;

use pyo3::{
    PyErr,
    exceptions::{PyRuntimeError, PyValueError},
};

use crate::error::Error;

impl From<Error> for PyErr {
    fn from(error: Error) -> Self {
        match error {
            Error::InvalidConfig(_)
            | Error::InvalidCheckpoint(_)
            | Error::InvalidJob(_)
            | Error::Json(_) => PyValueError::new_err(error.to_string()),
            _ => PyRuntimeError::new_err(error.to_string()),
        }
    }
}
