//! User-item matrix builder.
//!
//! Pivots weighted interactions into a dense users x products matrix. Cell
//! (u, p) holds the arithmetic mean of all weighted interactions for that
//! pair; unobserved pairs are 0. Row order is the first-seen order of user
//! IDs, column order the first-seen order of product IDs, and every engine
//! that operates on the matrix must map indices back through these same
//! orderings — get that wrong and recommendations silently point at the
//! wrong product.

use crate::weighting::weighted_value;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use store::{Interaction, ProductId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserItemMatrix {
    values: Array2<f32>,
    user_ids: Vec<UserId>,
    product_ids: Vec<ProductId>,
    user_index: HashMap<UserId, usize>,
    product_index: HashMap<ProductId, usize>,
}

impl UserItemMatrix {
    /// Build the matrix from raw interactions.
    pub fn from_interactions(interactions: &[Interaction]) -> Self {
        let mut user_ids: Vec<UserId> = Vec::new();
        let mut product_ids: Vec<ProductId> = Vec::new();
        let mut user_index: HashMap<UserId, usize> = HashMap::new();
        let mut product_index: HashMap<ProductId, usize> = HashMap::new();

        // First pass: assign indices in first-seen order.
        for interaction in interactions {
            if !user_index.contains_key(&interaction.user_id) {
                user_index.insert(interaction.user_id.clone(), user_ids.len());
                user_ids.push(interaction.user_id.clone());
            }
            if !product_index.contains_key(&interaction.product_id) {
                product_index.insert(interaction.product_id.clone(), product_ids.len());
                product_ids.push(interaction.product_id.clone());
            }
        }

        // Second pass: accumulate sums and counts, then take means.
        let mut sums = Array2::<f32>::zeros((user_ids.len(), product_ids.len()));
        let mut counts = Array2::<u32>::zeros((user_ids.len(), product_ids.len()));
        for interaction in interactions {
            let u = user_index[&interaction.user_id];
            let p = product_index[&interaction.product_id];
            sums[(u, p)] += weighted_value(interaction);
            counts[(u, p)] += 1;
        }

        let mut values = sums;
        for ((u, p), count) in counts.indexed_iter() {
            if *count > 1 {
                values[(u, p)] /= *count as f32;
            }
        }

        Self {
            values,
            user_ids,
            product_ids,
            user_index,
            product_index,
        }
    }

    pub fn n_users(&self) -> usize {
        self.user_ids.len()
    }

    pub fn n_products(&self) -> usize {
        self.product_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty() || self.product_ids.is_empty()
    }

    /// Matrix index of a user, if present at training time.
    pub fn user_index(&self, user_id: &str) -> Option<usize> {
        self.user_index.get(user_id).copied()
    }

    /// Matrix index of a product, if present at training time.
    pub fn product_index(&self, product_id: &str) -> Option<usize> {
        self.product_index.get(product_id).copied()
    }

    /// User IDs in row order.
    pub fn user_ids(&self) -> &[UserId] {
        &self.user_ids
    }

    /// Product IDs in column order.
    pub fn product_ids(&self) -> &[ProductId] {
        &self.product_ids
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn user_row(&self, user_idx: usize) -> ArrayView1<'_, f32> {
        self.values.row(user_idx)
    }

    pub fn product_column(&self, product_idx: usize) -> ArrayView1<'_, f32> {
        self.values.column(product_idx)
    }

    /// Owned transpose: products x users, for item-based fitting.
    pub fn transposed(&self) -> Array2<f32> {
        self.values.t().to_owned()
    }
}
