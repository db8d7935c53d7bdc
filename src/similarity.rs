//! Content score: how central an item is within the current candidate pool.
//!
//! The score is the mean cosine similarity between the item's row and every row
//! of the matrix, the item itself included. It is not a nearest-neighbour
//! score and does not depend on who is asking.

use crate::numeric::{clamp_to, ratio};
use crate::vectorizer::TfIdfMatrix;

/// Precomputed centroid so each item costs one sparse dot product instead of
/// `n` of them. Build once per request.
#[derive(Debug, Clone)]
pub struct ContentScorer<'m> {
    matrix: &'m TfIdfMatrix,
    column_sum: Vec<f64>,
}

impl<'m> ContentScorer<'m> {
    pub fn new(matrix: &'m TfIdfMatrix) -> Self {
        Self {
            matrix,
            column_sum: matrix.column_sum(),
        }
    }

    /// Mean cosine similarity of row `index` against all rows, in `[0, 1]`.
    ///
    /// A one-row matrix, a zero row or an out-of-range index score 0.
    pub fn score(&self, index: usize) -> f64 {
        let n = self.matrix.n_rows();
        if n < 2 {
            return 0.0;
        }
        let Some(row) = self.matrix.row(index) else {
            return 0.0;
        };
        if row.is_empty() {
            return 0.0;
        }
        let total: f64 = row
            .iter()
            .map(|&(col, w)| w * self.column_sum[col])
            .sum();
        clamp_to(ratio(total, n as f64), 0.0, 1.0)
    }
}

/// Convenience wrapper for a single lookup; prefer `ContentScorer` in loops.
pub fn content_score(index: usize, matrix: &TfIdfMatrix) -> f64 {
    ContentScorer::new(matrix).score(index)
}
