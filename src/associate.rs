use std::ops::Range;

use itertools::Itertools;
use nalgebra::DMatrix;
use tracing::debug;

use crate::{
    bbox::BoxFeature,
    config::TrackerConfig,
    consensus::consensus_scores,
    detection::FrameDetection,
    error::Result,
    scorer::{AffinityScorer, HiddenState, ScoreQuery, ScoreRequest, ScoreResponse, ScoringContext},
    track_store::TrackStore,
};

/// A track's preferred column. `column == None` is the null column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vote {
    pub score: f32,
    pub column: Option<usize>,
}

/// Outcome of associating one frame's detections to the active tracks.
#[derive(Clone, Debug)]
pub struct Association {
    /// Detection won by each track, indexed like the input tracks.
    pub matches: Vec<Option<usize>>,
    /// Scorer hidden update for each winning track.
    pub hidden: Vec<Option<HiddenState>>,
    pub votes: Vec<Vote>,
    /// Combined `[tracks][detections + 1]` score table.
    pub scores: DMatrix<f32>,
}

impl Association {
    fn empty() -> Self {
        Self {
            matches: Vec::new(),
            hidden: Vec::new(),
            votes: Vec::new(),
            scores: DMatrix::zeros(0, 0),
        }
    }

    /// Detections claimed by some track.
    pub fn claimed(&self, detections: usize) -> Vec<bool> {
        let mut claimed = vec![false; detections];
        for &column in self.matches.iter().flatten() {
            claimed[column] = true;
        }
        claimed
    }
}

/// Associates the current frame's detections to the given tracks.
///
/// ## Args
///  - tracks: The active tracks, in active-set order.
///  - previous: The usable detections of the previous frame, which the
///    tracks' slots index into.
///  - detections: The usable detections of the current frame.
///  - scorer: Queried once per scoring context.
///  - config: Query lags and hidden width.
///
/// Each track is queried through every history lag it can serve. Its rows
/// are folded into one per context, both contexts are combined into a
/// consensus table, and tracks vote for their best column. A detection goes
/// to the highest-scoring track that voted for it; the other voters get
/// nothing this frame.
pub fn associate_detections_to_tracks<S: AffinityScorer>(
    tracks: &TrackStore,
    previous: &[FrameDetection],
    detections: &[FrameDetection],
    scorer: &S,
    config: &TrackerConfig,
) -> Result<Association> {
    if tracks.is_empty() {
        return Ok(Association::empty());
    }

    let (queries, rows) = build_queries(tracks, previous, &config.lags);

    let mut responses = Vec::with_capacity(ScoringContext::ALL.len());
    for context in ScoringContext::ALL {
        let request = ScoreRequest {
            context,
            previous: &queries,
            next: detections,
        };
        let response = scorer.score(&request)?;
        response.validate(&request, config.hidden_size)?;
        responses.push(response);
    }
    let (longim, finesp) = (&responses[0], &responses[1]);

    let longim_logits = aggregate_lag_rows(&longim.logits, &rows);
    let finesp_logits = aggregate_lag_rows(&finesp.logits, &rows);
    let scores = consensus_scores(&longim_logits, &finesp_logits);

    let votes = vote(&scores);
    let matches = calculate_matching(&votes, detections.len());
    let hidden = collect_hidden(longim, &rows, &matches);

    debug!(
        tracks = tracks.len(),
        queries = queries.len(),
        detections = detections.len(),
        matched = matches.iter().flatten().count(),
        "associated frame"
    );

    Ok(Association {
        matches,
        hidden,
        votes,
        scores,
    })
}

/// Flattens the tracks into scorer queries, one per available history lag.
///
/// Returns the queries and, per track, the range of rows it occupies. The
/// box feature of a query is that of the track's detection in the previous
/// frame, or zeros if it had none.
pub fn build_queries<'a>(
    tracks: &'a TrackStore,
    previous: &[FrameDetection],
    lags: &[usize],
) -> (Vec<ScoreQuery<'a>>, Vec<Range<usize>>) {
    let mut queries = Vec::new();
    let mut rows = Vec::with_capacity(tracks.len());

    for (track, lagged) in tracks.lagged_history(lags) {
        let feature = track
            .slot
            .and_then(|slot| previous.get(slot))
            .map(|detection| detection.feature)
            .unwrap_or_else(BoxFeature::zeros);

        let start = queries.len();
        queries.extend(lagged.into_iter().map(|(_, thumbnail)| ScoreQuery {
            feature,
            thumbnail,
            hidden: &track.hidden,
        }));
        rows.push(start..queries.len());
    }

    (queries, rows)
}

/// Folds each track's lag rows into one row: the mean logit over detection
/// columns, the minimum over the null column.
pub fn aggregate_lag_rows(logits: &DMatrix<f32>, rows: &[Range<usize>]) -> DMatrix<f32> {
    let columns = logits.ncols();
    let null_column = columns - 1;

    let mut out = DMatrix::zeros(rows.len(), columns);
    for (i, range) in rows.iter().enumerate() {
        let lag_rows = logits.rows_range(range.clone());
        let count = lag_rows.nrows() as f32;
        for j in 0..null_column {
            out[(i, j)] = lag_rows.column(j).sum() / count;
        }
        out[(i, null_column)] = lag_rows
            .column(null_column)
            .iter()
            .copied()
            .fold(f32::INFINITY, f32::min);
    }
    out
}

/// Each track's best column. Ties go to the lowest column index.
pub fn vote(scores: &DMatrix<f32>) -> Vec<Vote> {
    let null_column = scores.ncols() - 1;

    scores
        .row_iter()
        .map(|row| {
            let mut best = (row[0], 0);
            for (j, &score) in row.iter().enumerate().skip(1) {
                if score > best.0 {
                    best = (score, j);
                }
            }
            Vote {
                score: best.0,
                column: (best.1 != null_column).then_some(best.1),
            }
        })
        .collect_vec()
}

/// Resolves column collisions between votes.
///
/// The strictly highest vote for a detection wins it, ties going to the
/// lowest track index. Losing voters are not moved to another column.
pub fn calculate_matching(votes: &[Vote], detections: usize) -> Vec<Option<usize>> {
    let mut winners: Vec<Option<(f32, usize)>> = vec![None; detections];

    for (track, vote) in votes.iter().enumerate() {
        let Some(column) = vote.column else {
            continue;
        };
        match winners[column] {
            Some((score, _)) if vote.score <= score => {}
            _ => winners[column] = Some((vote.score, track)),
        }
    }

    let mut matches = vec![None; votes.len()];
    for (column, winner) in winners.iter().enumerate() {
        if let Some((_, track)) = winner {
            matches[*track] = Some(column);
        }
    }
    matches
}

fn collect_hidden(
    response: &ScoreResponse,
    rows: &[Range<usize>],
    matches: &[Option<usize>],
) -> Vec<Option<HiddenState>> {
    rows.iter()
        .zip(matches)
        .map(|(range, column)| column.map(|column| response.hidden_at(range.start, column).clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use approx::assert_relative_eq;

    use super::*;
    use crate::{bbox::BBox, detection::Detection, detection::Thumbnail, track::Track};

    /// Answers every request with a fixed per-track table, repeated for each
    /// of the track's lag rows. Records the requests it sees.
    struct TableScorer {
        longim: Vec<Vec<f32>>,
        finesp: Vec<Vec<f32>>,
        rows: Vec<usize>,
        seen: RefCell<Vec<(ScoringContext, usize, usize)>>,
    }

    impl AffinityScorer for TableScorer {
        fn score(&self, request: &ScoreRequest<'_>) -> Result<ScoreResponse> {
            self.seen
                .borrow_mut()
                .push((request.context, request.rows(), request.columns()));
            let table = match request.context {
                ScoringContext::LongTermAppearance => &self.longim,
                ScoringContext::FineSpatial => &self.finesp,
            };
            let flat: Vec<f32> = table
                .iter()
                .zip(&self.rows)
                .flat_map(|(row, &count)| std::iter::repeat_n(row.clone(), count))
                .flatten()
                .collect();
            let logits = DMatrix::from_row_slice(request.rows(), request.columns(), &flat);
            let hidden = (0..request.rows() * request.columns())
                .map(|k| HiddenState::from_element(2, k as f32))
                .collect();
            Ok(ScoreResponse::new(logits, hidden))
        }
    }

    fn thumb() -> Thumbnail {
        vec![0u8].into()
    }

    fn frame_detection(x: i32) -> FrameDetection {
        let bbox = BBox::new(x, 0, x + 10, 10);
        FrameDetection {
            detection: Detection::new(x, 0, x + 10, 10),
            feature: bbox.to_feature(1000.0),
            thumbnail: thumb(),
        }
    }

    fn config() -> TrackerConfig {
        TrackerConfig {
            hidden_size: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_vote_breaks_ties_on_lowest_column() {
        let scores = DMatrix::from_row_slice(2, 3, &[0.5, 0.5, 0.1, 0.1, 0.2, 0.2]);

        let votes = vote(&scores);

        assert_eq!(votes[0].column, Some(0));
        assert_eq!(votes[1].column, Some(1));
    }

    #[test]
    fn test_vote_for_null_column_has_no_target() {
        let scores = DMatrix::from_row_slice(1, 3, &[0.1, 0.2, 0.6]);

        assert_eq!(
            vote(&scores),
            vec![Vote {
                score: 0.6,
                column: None
            }]
        );
    }

    #[test]
    fn test_column_collision_goes_to_higher_score_without_fallback() {
        let votes = vec![
            Vote {
                score: 0.9,
                column: Some(0),
            },
            Vote {
                score: 0.95,
                column: Some(0),
            },
        ];

        assert_eq!(calculate_matching(&votes, 2), vec![None, Some(0)]);
    }

    #[test]
    fn test_column_collision_tie_goes_to_lower_track() {
        let votes = vec![
            Vote {
                score: 0.5,
                column: Some(1),
            },
            Vote {
                score: 0.5,
                column: Some(1),
            },
        ];

        assert_eq!(calculate_matching(&votes, 2), vec![Some(1), None]);
    }

    #[test]
    fn test_aggregate_takes_mean_of_detections_and_min_of_null() {
        let logits = DMatrix::from_row_slice(
            3,
            3,
            &[
                1.0, 4.0, 0.5, //
                3.0, 2.0, -1.0, //
                7.0, 7.0, 7.0,
            ],
        );

        let out = aggregate_lag_rows(&logits, &[0..2, 2..3]);

        assert_relative_eq!(out[(0, 0)], 2.0);
        assert_relative_eq!(out[(0, 1)], 3.0);
        assert_relative_eq!(out[(0, 2)], -1.0);
        assert_relative_eq!(out[(1, 2)], 7.0);
    }

    #[test]
    fn test_queries_use_previous_box_or_zeros() {
        let previous = vec![frame_detection(0), frame_detection(100)];
        let mut matched = Track::new(0, 1, 2, thumb(), 16);
        matched.history.push(thumb());
        let mut unmatched = Track::new(1, 0, 2, thumb(), 16);
        unmatched.slot = None;
        let tracks = TrackStore::from_tracks(vec![matched, unmatched]);

        let (queries, rows) = build_queries(&tracks, &previous, &[1, 2, 4, 8, 16]);

        assert_eq!(rows, vec![0..2, 2..3]);
        assert_eq!(queries[0].feature, previous[1].feature);
        assert_eq!(queries[2].feature, BoxFeature::zeros());
    }

    #[test]
    fn test_long_history_is_queried_at_five_lags_only() {
        let mut track = Track::new(0, 0, 2, thumb(), 16);
        for _ in 0..19 {
            track.history.push(thumb());
        }
        let tracks = TrackStore::from_tracks(vec![track]);
        let previous = vec![frame_detection(0)];
        let detections = vec![frame_detection(0)];
        let scorer = TableScorer {
            longim: vec![vec![1.0, 0.0]],
            finesp: vec![vec![1.0, 0.0]],
            rows: vec![5],
            seen: RefCell::new(Vec::new()),
        };

        associate_detections_to_tracks(&tracks, &previous, &detections, &scorer, &config())
            .unwrap();

        assert_eq!(
            *scorer.seen.borrow(),
            vec![
                (ScoringContext::LongTermAppearance, 5, 2),
                (ScoringContext::FineSpatial, 5, 2)
            ]
        );
    }

    #[test]
    fn test_contested_detection_goes_to_stronger_track() {
        let tracks = TrackStore::from_tracks(vec![
            Track::new(0, 0, 2, thumb(), 16),
            Track::new(1, 1, 2, thumb(), 16),
        ]);
        let previous = vec![frame_detection(0), frame_detection(50)];
        let detections = vec![frame_detection(0), frame_detection(50)];
        // both tracks prefer detection 0, track 1 much more strongly
        let table = vec![vec![3.0, -1.0, -1.0], vec![6.0, 1.0, 0.0]];
        let scorer = TableScorer {
            longim: table.clone(),
            finesp: table,
            rows: vec![1, 1],
            seen: RefCell::new(Vec::new()),
        };

        let association =
            associate_detections_to_tracks(&tracks, &previous, &detections, &scorer, &config())
                .unwrap();

        assert_eq!(association.votes[0].column, Some(0));
        assert_eq!(association.matches, vec![None, Some(0)]);
        assert_eq!(association.claimed(2), vec![true, false]);
        // hidden update of row 1, column 0 in a 3-column table
        assert_eq!(
            association.hidden[1],
            Some(HiddenState::from_element(2, 3.0))
        );
        assert_eq!(association.hidden[0], None);
    }

    #[test]
    fn test_no_tracks_skips_the_scorer() {
        let scorer = TableScorer {
            longim: vec![],
            finesp: vec![],
            rows: vec![],
            seen: RefCell::new(Vec::new()),
        };

        let association = associate_detections_to_tracks(
            &TrackStore::new(),
            &[],
            &[frame_detection(0)],
            &scorer,
            &config(),
        )
        .unwrap();

        assert!(association.matches.is_empty());
        assert!(scorer.seen.borrow().is_empty());
    }
}
