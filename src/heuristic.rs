use nalgebra::DMatrix;

use crate::{
    error::Result,
    scorer::{AffinityScorer, ScoreRequest, ScoreResponse, ScoringContext},
};

/// A model-free scorer working on box features alone.
///
/// The spatial context scores centre distance, the appearance context box
/// extent; both map a perfect fit to `1.0` and cross zero at their
/// tolerance. The null column always scores `0.0` and the hidden state is
/// passed through unchanged.
#[derive(Clone, Debug)]
pub struct CenterDistanceScorer {
    /// Centre distance (normalised units) at which a pair is rejected.
    pub distance_tolerance: f32,
    /// Summed width and height difference at which a pair is rejected.
    pub extent_tolerance: f32,
}

impl Default for CenterDistanceScorer {
    fn default() -> Self {
        Self {
            distance_tolerance: 0.05,
            extent_tolerance: 0.05,
        }
    }
}

impl AffinityScorer for CenterDistanceScorer {
    fn score(&self, request: &ScoreRequest<'_>) -> Result<ScoreResponse> {
        let (rows, columns) = (request.rows(), request.columns());
        let null_column = columns - 1;

        let logits = DMatrix::from_fn(rows, columns, |i, j| {
            if j == null_column {
                return 0.0;
            }
            let a = &request.previous[i].feature;
            let b = &request.next[j].feature;
            match request.context {
                ScoringContext::FineSpatial => {
                    let distance = (a.fixed_rows::<2>(0) - b.fixed_rows::<2>(0)).norm();
                    1.0 - distance / self.distance_tolerance
                }
                ScoringContext::LongTermAppearance => {
                    let extent = (a[2] - b[2]).abs() + (a[3] - b[3]).abs();
                    1.0 - extent / self.extent_tolerance
                }
            }
        });

        let hidden = request
            .previous
            .iter()
            .flat_map(|query| std::iter::repeat_n(query.hidden.clone(), columns))
            .collect();

        Ok(ScoreResponse::new(logits, hidden))
    }
}
