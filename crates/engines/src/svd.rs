//! Matrix factorization via truncated SVD.
//!
//! ## Algorithm
//!
//! Decomposes the user-item matrix A (m x n) into k latent factors with
//! seeded block subspace iteration: iterate X <- A^T (A X) over an n x k
//! block, re-orthonormalizing with modified Gram-Schmidt each round, until
//! the block converges to the top right-singular vectors V. Then
//! user_features = A V (users in latent space, scaled by the singular
//! values) and item_features = V, so a predicted affinity is the dot
//! product of a user row and an item row. Factors are ordered by singular
//! value, largest first.
//!
//! k is clamped to min(n_factors, min(m, n) - 1); a clamp to zero means
//! the matrix is too small to factorize and training fails.

use crate::error::{EngineError, Result};
use crate::matrix::UserItemMatrix;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use store::ProductId;
use tracing::{debug, instrument};

const ENGINE: &str = "matrix factorization";
const SUBSPACE_ITERATIONS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Factorization {
    /// m x k, rows aligned with matrix user order.
    user_features: Array2<f32>,
    /// n x k, rows aligned with matrix product order.
    item_features: Array2<f32>,
    singular_values: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixFactorizationEngine {
    n_factors: usize,
    seed: u64,
    matrix: Option<UserItemMatrix>,
    factorization: Option<Factorization>,
    trained_at: Option<DateTime<Utc>>,
}

impl MatrixFactorizationEngine {
    pub fn new(n_factors: usize) -> Self {
        Self {
            n_factors,
            seed: 42,
            matrix: None,
            factorization: None,
            trained_at: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn is_trained(&self) -> bool {
        self.factorization.is_some()
    }

    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.trained_at
    }

    /// Latent factor count actually used after clamping, once trained.
    pub fn effective_factors(&self) -> Option<usize> {
        self.factorization
            .as_ref()
            .map(|f| f.singular_values.len())
    }

    #[instrument(skip_all, fields(users = matrix.n_users(), products = matrix.n_products()))]
    pub fn train(&mut self, matrix: &UserItemMatrix) -> Result<()> {
        let (m, n) = (matrix.n_users(), matrix.n_products());
        let max_rank = m.min(n).saturating_sub(1);
        let k = self.n_factors.min(max_rank);
        if k == 0 {
            return Err(EngineError::invalid_config(format!(
                "matrix of {m} users x {n} products is too small to factorize"
            )));
        }

        let values = matrix.values();
        let mut block = random_block(n, k, self.seed);
        orthonormalize(&mut block);
        for _ in 0..SUBSPACE_ITERATIONS {
            // X <- A^T (A X), keeping the block in the row space of A.
            let projected = values.dot(&block);
            block = values.t().dot(&projected);
            orthonormalize(&mut block);
        }

        // Singular values and descending-order permutation.
        let projected = values.dot(&block);
        let mut sigma: Vec<(usize, f32)> = (0..k)
            .map(|j| {
                let col = projected.column(j);
                (j, col.dot(&col).sqrt())
            })
            .collect();
        sigma.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut user_features = Array2::<f32>::zeros((m, k));
        let mut item_features = Array2::<f32>::zeros((n, k));
        let mut singular_values = Vec::with_capacity(k);
        for (dest, &(src, value)) in sigma.iter().enumerate() {
            user_features.column_mut(dest).assign(&projected.column(src));
            item_features.column_mut(dest).assign(&block.column(src));
            singular_values.push(value);
        }

        debug!(factors = k, "Fitted truncated SVD");
        self.factorization = Some(Factorization {
            user_features,
            item_features,
            singular_values,
        });
        self.matrix = Some(matrix.clone());
        self.trained_at = Some(Utc::now());
        Ok(())
    }

    /// Reconstructed rating for a (user, product) pair. Unknown entities
    /// and an untrained model predict 0.
    pub fn predict_rating(&self, user_id: &str, product_id: &str) -> f32 {
        let (Some(factorization), Some(matrix)) = (&self.factorization, &self.matrix) else {
            return 0.0;
        };
        let (Some(u), Some(p)) = (matrix.user_index(user_id), matrix.product_index(product_id))
        else {
            return 0.0;
        };
        factorization
            .user_features
            .row(u)
            .dot(&factorization.item_features.row(p))
    }

    /// Top-n products for a user by reconstructed rating. With
    /// `exclude_interacted`, anything the user already rated is masked to
    /// -infinity so it can never surface.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn recommend(
        &self,
        user_id: &str,
        n: usize,
        exclude_interacted: bool,
    ) -> Result<Vec<(ProductId, f32)>> {
        let factorization = self
            .factorization
            .as_ref()
            .ok_or(EngineError::not_trained(ENGINE))?;
        let matrix = self
            .matrix
            .as_ref()
            .ok_or(EngineError::not_trained(ENGINE))?;

        let Some(user_idx) = matrix.user_index(user_id) else {
            return Ok(Vec::new());
        };

        let user_row = factorization.user_features.row(user_idx);
        let mut scores: Array1<f32> = factorization.item_features.dot(&user_row);
        if exclude_interacted {
            let interacted = matrix.user_row(user_idx);
            for (j, score) in scores.iter_mut().enumerate() {
                if interacted[j] > 0.0 {
                    *score = f32::NEG_INFINITY;
                }
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .enumerate()
            .filter(|&(_, score)| score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked
            .into_iter()
            .take(n)
            .map(|(j, score)| (matrix.product_ids()[j].clone(), score))
            .collect())
    }

    /// Products closest to `product_id` in latent space, by cosine
    /// similarity over item factor rows. Excludes the product itself.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn similar_items(&self, product_id: &str, n: usize) -> Result<Vec<(ProductId, f32)>> {
        let factorization = self
            .factorization
            .as_ref()
            .ok_or(EngineError::not_trained(ENGINE))?;
        let matrix = self
            .matrix
            .as_ref()
            .ok_or(EngineError::not_trained(ENGINE))?;

        let Some(product_idx) = matrix.product_index(product_id) else {
            return Ok(Vec::new());
        };

        let target = factorization.item_features.row(product_idx);
        let target_norm = target.dot(&target).sqrt();
        if target_norm <= f32::EPSILON {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = (0..matrix.n_products())
            .filter(|&j| j != product_idx)
            .map(|j| {
                let row = factorization.item_features.row(j);
                let norm = row.dot(&row).sqrt();
                let sim = if norm <= f32::EPSILON {
                    0.0
                } else {
                    target.dot(&row) / (target_norm * norm)
                };
                (j, sim)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(n)
            .map(|(j, sim)| (matrix.product_ids()[j].clone(), sim))
            .collect())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn random_block(rows: usize, cols: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, cols), |_| rng.random::<f32>() - 0.5)
}

/// Modified Gram-Schmidt, in place. Columns that collapse to zero norm
/// (rank deficiency) are left as zeros.
fn orthonormalize(block: &mut Array2<f32>) {
    let cols = block.ncols();
    for j in 0..cols {
        for i in 0..j {
            let proj = block.column(i).dot(&block.column(j));
            let prev = block.column(i).to_owned();
            block
                .column_mut(j)
                .zip_mut_with(&prev, |x, &p| *x -= proj * p);
        }
        let norm = block.column(j).dot(&block.column(j)).sqrt();
        if norm > f32::EPSILON {
            block.column_mut(j).mapv_inplace(|x| x / norm);
        } else {
            block.column_mut(j).fill(0.0);
        }
    }
}
