//! Turns the logit tables of both scoring contexts into one score table.
//!
//! A cell is confident only when it is the preferred choice of its row and
//! of its column, in both contexts.

use nalgebra::DMatrix;

/// Softmax over each column.
pub fn softmax_columns(logits: &DMatrix<f32>) -> DMatrix<f32> {
    let mut out = logits.clone();
    for j in 0..logits.ncols() {
        let column = logits.column(j);
        let max = column.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exp = column.map(|x| (x - max).exp());
        let sum = exp.sum();
        out.set_column(j, &(exp / sum));
    }
    out
}

/// Softmax over each row.
pub fn softmax_rows(logits: &DMatrix<f32>) -> DMatrix<f32> {
    softmax_columns(&logits.transpose()).transpose()
}

/// Elementwise minimum of the row-wise and column-wise softmax.
pub fn doubly_normalized(logits: &DMatrix<f32>) -> DMatrix<f32> {
    softmax_rows(logits).zip_map(&softmax_columns(logits), f32::min)
}

/// Score of a pairing that either context rejects. Below every softmax
/// output, so a vetoed cell never outranks the null column.
pub const VETO_SCORE: f32 = -100.0;

/// Combined score table of both contexts, `[tracks][detections + 1]`.
///
/// Every non-null cell that either context scored below zero is forced to
/// [`VETO_SCORE`].
pub fn consensus_scores(
    longim_logits: &DMatrix<f32>,
    finesp_logits: &DMatrix<f32>,
) -> DMatrix<f32> {
    debug_assert_eq!(longim_logits.shape(), finesp_logits.shape());

    let mut scores =
        doubly_normalized(longim_logits).zip_map(&doubly_normalized(finesp_logits), f32::min);

    let null_column = scores.ncols().saturating_sub(1);
    for i in 0..scores.nrows() {
        for j in 0..null_column {
            if longim_logits[(i, j)] < 0.0 || finesp_logits[(i, j)] < 0.0 {
                scores[(i, j)] = VETO_SCORE;
            }
        }
    }
    scores
}
