use nalgebra::DMatrix;
use pyo3::{Py, PyAny, Python, types::PyBytes};

use crate::{
    error::{Error, Result},
    scorer::{AffinityScorer, HiddenState, ScoreRequest, ScoreResponse},
};

/// Adapts a Python callable to the scorer contract.
///
/// The callable is invoked as
/// `scorer(context, prev_boxes, prev_thumbnails, prev_hidden, next_boxes, next_thumbnails)`
/// and must return `(logits, hidden)`, shaped `[P][N+1]` and `[P][N+1][H]`.
pub struct PyCallableScorer {
    callable: Py<PyAny>,
}

impl PyCallableScorer {
    pub fn new(callable: Py<PyAny>) -> Self {
        Self { callable }
    }
}

type PyScores = (Vec<Vec<f32>>, Vec<Vec<Vec<f32>>>);

impl AffinityScorer for PyCallableScorer {
    fn score(&self, request: &ScoreRequest<'_>) -> Result<ScoreResponse> {
        let context = request.context;

        let (logits, hidden): PyScores = Python::with_gil(|py| {
            let prev_boxes: Vec<Vec<f32>> = request
                .previous
                .iter()
                .map(|query| query.feature.iter().copied().collect())
                .collect();
            let prev_thumbnails: Vec<_> = request
                .previous
                .iter()
                .map(|query| PyBytes::new(py, &query.thumbnail[..]))
                .collect();
            let prev_hidden: Vec<Vec<f32>> = request
                .previous
                .iter()
                .map(|query| query.hidden.iter().copied().collect())
                .collect();
            let next_boxes: Vec<Vec<f32>> = request
                .next
                .iter()
                .map(|detection| detection.feature.iter().copied().collect())
                .collect();
            let next_thumbnails: Vec<_> = request
                .next
                .iter()
                .map(|detection| PyBytes::new(py, &detection.thumbnail[..]))
                .collect();

            self.callable
                .call1(
                    py,
                    (
                        context.as_str(),
                        prev_boxes,
                        prev_thumbnails,
                        prev_hidden,
                        next_boxes,
                        next_thumbnails,
                    ),
                )
                .and_then(|result| result.extract::<PyScores>(py))
        })
        .map_err(|error| Error::ScorerUnavailable {
            context,
            reason: error.to_string(),
        })?;

        let rows = logits.len();
        let columns = logits.first().map_or(request.columns(), Vec::len);
        if logits.iter().any(|row| row.len() != columns) {
            return Err(Error::InvalidScorerOutput {
                context,
                reason: "ragged logit rows".into(),
            });
        }

        Ok(ScoreResponse::new(
            DMatrix::from_fn(rows, columns, |i, j| logits[i][j]),
            hidden
                .into_iter()
                .flatten()
                .map(HiddenState::from_vec)
                .collect(),
        ))
    }
}
