//! The affinity scorer boundary.
//!
//! The engine never runs a model itself. It hands the scorer the queried
//! features of the previous tracks and the detections of the current frame,
//! once per [`ScoringContext`], and receives a `[P][N+1]` logit table plus a
//! hidden-state update per cell. Column `N` is the null column.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{
    bbox::BoxFeature,
    detection::{FrameDetection, Thumbnail},
    error::{Error, Result},
};

/// Recurrent state the scorer keeps per track.
pub type HiddenState = DVector<f32>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoringContext {
    /// Long-term appearance.
    #[serde(rename = "longim")]
    LongTermAppearance,
    /// Fine-grained spatial.
    #[serde(rename = "finesp")]
    FineSpatial,
}

impl ScoringContext {
    pub const ALL: [ScoringContext; 2] = [
        ScoringContext::LongTermAppearance,
        ScoringContext::FineSpatial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringContext::LongTermAppearance => "longim",
            ScoringContext::FineSpatial => "finesp",
        }
    }
}

impl fmt::Display for ScoringContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a scorer request: a track seen through one history lag.
#[derive(Clone, Debug)]
pub struct ScoreQuery<'a> {
    pub feature: BoxFeature,
    pub thumbnail: &'a Thumbnail,
    pub hidden: &'a HiddenState,
}

#[derive(Clone, Debug)]
pub struct ScoreRequest<'a> {
    pub context: ScoringContext,
    pub previous: &'a [ScoreQuery<'a>],
    pub next: &'a [FrameDetection],
}

impl ScoreRequest<'_> {
    pub fn rows(&self) -> usize {
        self.previous.len()
    }

    /// Detections plus the null column.
    pub fn columns(&self) -> usize {
        self.next.len() + 1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoreResponse {
    pub logits: DMatrix<f32>,
    /// Row-major, `rows * columns` entries.
    pub hidden: Vec<HiddenState>,
}

impl ScoreResponse {
    pub fn new(logits: DMatrix<f32>, hidden: Vec<HiddenState>) -> Self {
        Self { logits, hidden }
    }

    pub fn hidden_at(&self, row: usize, column: usize) -> &HiddenState {
        &self.hidden[row * self.logits.ncols() + column]
    }

    /// Checks the response against the shape the request implies.
    pub fn validate(&self, request: &ScoreRequest<'_>, hidden_size: usize) -> Result<()> {
        let invalid = |reason: String| Error::InvalidScorerOutput {
            context: request.context,
            reason,
        };

        let expected = (request.rows(), request.columns());
        if self.logits.shape() != expected {
            return Err(invalid(format!(
                "logits shape {:?}, expected {:?}",
                self.logits.shape(),
                expected
            )));
        }
        if self.hidden.len() != expected.0 * expected.1 {
            return Err(invalid(format!(
                "{} hidden updates, expected {}",
                self.hidden.len(),
                expected.0 * expected.1
            )));
        }
        if let Some(bad) = self.hidden.iter().find(|h| h.len() != hidden_size) {
            return Err(invalid(format!(
                "hidden update of width {}, expected {}",
                bad.len(),
                hidden_size
            )));
        }
        if self.logits.iter().any(|logit| logit.is_nan()) {
            return Err(invalid("logits contain NaN".into()));
        }
        Ok(())
    }
}

/// Pairwise compatibility between previous tracks and current detections.
pub trait AffinityScorer {
    fn score(&self, request: &ScoreRequest<'_>) -> Result<ScoreResponse>;
}

impl<T: AffinityScorer + ?Sized> AffinityScorer for &T {
    fn score(&self, request: &ScoreRequest<'_>) -> Result<ScoreResponse> {
        (**self).score(request)
    }
}

impl<T: AffinityScorer + ?Sized> AffinityScorer for Box<T> {
    fn score(&self, request: &ScoreRequest<'_>) -> Result<ScoreResponse> {
        (**self).score(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(queries: &'a [ScoreQuery<'a>], next: &'a [FrameDetection]) -> ScoreRequest<'a> {
        ScoreRequest {
            context: ScoringContext::FineSpatial,
            previous: queries,
            next,
        }
    }

    #[test]
    fn test_context_names_match_the_scorer_contract() {
        assert_eq!(ScoringContext::LongTermAppearance.to_string(), "longim");
        assert_eq!(
            serde_json::to_string(&ScoringContext::FineSpatial).unwrap(),
            "\"finesp\""
        );
    }

    #[test]
    fn test_validate_rejects_wrong_logit_shape() {
        let thumbnail: Thumbnail = vec![0u8].into();
        let hidden = HiddenState::zeros(2);
        let queries = [ScoreQuery {
            feature: BoxFeature::zeros(),
            thumbnail: &thumbnail,
            hidden: &hidden,
        }];
        let response = ScoreResponse::new(DMatrix::zeros(1, 3), vec![HiddenState::zeros(2); 3]);

        let result = response.validate(&request(&queries, &[]), 2);

        assert!(matches!(result, Err(Error::InvalidScorerOutput { .. })));
    }

    #[test]
    fn test_validate_rejects_wrong_hidden_width() {
        let thumbnail: Thumbnail = vec![0u8].into();
        let hidden = HiddenState::zeros(2);
        let queries = [ScoreQuery {
            feature: BoxFeature::zeros(),
            thumbnail: &thumbnail,
            hidden: &hidden,
        }];
        let response = ScoreResponse::new(DMatrix::zeros(1, 1), vec![HiddenState::zeros(3)]);

        assert!(response.validate(&request(&queries, &[]), 2).is_err());
        assert!(
            ScoreResponse::new(DMatrix::zeros(1, 1), vec![HiddenState::zeros(2)])
                .validate(&request(&queries, &[]), 2)
                .is_ok()
        );
    }
}
