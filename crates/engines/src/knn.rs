//! Exact brute-force k-nearest-neighbor index with cosine distance.
//!
//! The catalogs this serves are small and rebuilt wholesale at training
//! time, so an exhaustive scan is both exact and fast enough; there is no
//! approximate index to go stale.

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestNeighbors {
    n_neighbors: usize,
    vectors: Array2<f32>,
    norms: Vec<f32>,
}

impl NearestNeighbors {
    /// Fit the index over row vectors. The effective neighbor count is
    /// clamped to the number of rows.
    pub fn fit(vectors: Array2<f32>, n_neighbors: usize) -> Self {
        let norms = vectors
            .rows()
            .into_iter()
            .map(|row| row.dot(&row).sqrt())
            .collect();
        Self {
            n_neighbors: n_neighbors.min(vectors.nrows()).max(1),
            vectors,
            norms,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Nearest rows to `query`, as (row_index, cosine_distance) in ascending
    /// distance order. Ties keep row order (stable sort). Includes the query
    /// row itself when the query is one of the fitted vectors.
    pub fn kneighbors(&self, query: ArrayView1<'_, f32>) -> Vec<(usize, f32)> {
        let query_norm = query.dot(&query).sqrt();
        let mut scored: Vec<(usize, f32)> = (0..self.vectors.nrows())
            .into_par_iter()
            .map(|i| {
                let dist = cosine_distance(query, query_norm, self.vectors.row(i), self.norms[i]);
                (i, dist)
            })
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.n_neighbors);
        scored
    }
}

/// Cosine distance, defined as 1 for zero-norm vectors.
fn cosine_distance(a: ArrayView1<'_, f32>, a_norm: f32, b: ArrayView1<'_, f32>, b_norm: f32) -> f32 {
    if a_norm <= f32::EPSILON || b_norm <= f32::EPSILON {
        return 1.0;
    }
    1.0 - a.dot(&b) / (a_norm * b_norm)
}
