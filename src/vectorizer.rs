//! TF-IDF vectorizer over item tag lists.
//!
//! The vocabulary is built from the current candidate set only, so a matrix is
//! valid for exactly one request. Tags are already tokens: no splitting, no
//! lowercasing, no stop words.
//!
//! Weighting follows the smoothed variant:
//! `tfidf(t, d) = count(t, d) * (ln((1 + n) / (1 + df(t))) + 1)`,
//! after which every non-zero row is scaled to unit length. Cosine similarity
//! between two rows is then a plain dot product.

use std::collections::HashMap;

/// One sparse row: `(column, weight)` pairs sorted by column.
pub type SparseRow = Vec<(usize, f64)>;

/// Row-per-document TF-IDF matrix with L2-normalised rows.
#[derive(Debug, Clone)]
pub struct TfIdfMatrix {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    rows: Vec<SparseRow>,
}

impl TfIdfMatrix {
    /// Fit on `documents` (row `i` ↔ document `i`).
    ///
    /// Returns `None` when the vocabulary is empty, i.e. every document has no
    /// tags (or there are no documents at all).
    pub fn fit<D: AsRef<[String]>>(documents: &[D]) -> Option<Self> {
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();
        let mut counts: Vec<HashMap<usize, f64>> = Vec::with_capacity(documents.len());

        for doc in documents {
            let mut tf: HashMap<usize, f64> = HashMap::new();
            for tag in doc.as_ref() {
                let col = match vocabulary.get(tag) {
                    Some(&c) => c,
                    None => {
                        let c = vocabulary.len();
                        vocabulary.insert(tag.clone(), c);
                        doc_freq.push(0);
                        c
                    }
                };
                *tf.entry(col).or_insert(0.0) += 1.0;
            }
            for &col in tf.keys() {
                doc_freq[col] += 1;
            }
            counts.push(tf);
        }

        if vocabulary.is_empty() {
            return None;
        }

        let n = documents.len() as f64;
        let idf: Vec<f64> = doc_freq
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let rows = counts
            .into_iter()
            .map(|tf| {
                let mut row: SparseRow = tf
                    .into_iter()
                    .map(|(col, count)| (col, count * idf[col]))
                    .collect();
                row.sort_by_key(|&(col, _)| col);
                normalize(&mut row);
                row
            })
            .collect();

        Some(Self {
            vocabulary,
            idf,
            rows,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Column index of a tag, if it is part of this request's vocabulary.
    pub fn column_of(&self, tag: &str) -> Option<usize> {
        self.vocabulary.get(tag).copied()
    }

    pub fn idf(&self, column: usize) -> Option<f64> {
        self.idf.get(column).copied()
    }

    pub fn row(&self, index: usize) -> Option<&SparseRow> {
        self.rows.get(index)
    }

    /// Cosine similarity of rows `a` and `b` (0 for out-of-range or zero rows).
    pub fn cosine(&self, a: usize, b: usize) -> f64 {
        match (self.rows.get(a), self.rows.get(b)) {
            (Some(ra), Some(rb)) => sparse_dot(ra, rb),
            _ => 0.0,
        }
    }

    /// Dense sum of all rows. `dot(row_i, column_sum) / n` is the mean cosine of
    /// row `i` against every row.
    pub fn column_sum(&self) -> Vec<f64> {
        let mut sum = vec![0.0; self.vocabulary.len()];
        for row in &self.rows {
            for &(col, w) in row {
                sum[col] += w;
            }
        }
        sum
    }
}

/// Dot product of two column-sorted sparse rows.
fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut acc = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                acc += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    acc
}

fn normalize(row: &mut SparseRow) {
    let norm = row.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, w) in row.iter_mut() {
            *w /= norm;
        }
    }
}
