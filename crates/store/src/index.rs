//! In-memory data store with lookup indices.
//!
//! The store holds the product catalog and the append-only interaction log,
//! plus secondary indices for per-user, per-product, and per-category
//! queries. From the recommendation subsystem's perspective it is read-only:
//! interactions are appended by the surrounding application and consumed
//! wholesale at training time.

use crate::error::{Result, StoreError};
use crate::types::{Dataset, Interaction, Product, ProductId, UserId};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Main data structure holding catalog and interaction data.
#[derive(Debug, Default)]
pub struct DataStore {
    pub(crate) products: HashMap<ProductId, Product>,
    /// First-seen catalog order, used for deterministic iteration.
    pub(crate) product_order: Vec<ProductId>,

    /// Append-only interaction log.
    pub(crate) interactions: Vec<Interaction>,

    // Secondary indices into the log
    pub(crate) user_interactions: HashMap<UserId, Vec<usize>>,
    pub(crate) product_interactions: HashMap<ProductId, Vec<usize>>,
    pub(crate) category_index: HashMap<String, Vec<ProductId>>,
}

impl DataStore {
    /// Creates a new, empty DataStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a dataset from a JSON file and build all indices.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|_| StoreError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let dataset: Dataset = serde_json::from_str(&raw)?;
        let store = Self::from_dataset(dataset);
        let (products, users, interactions) = store.counts();
        info!(
            "Loaded dataset: {} products, {} users, {} interactions",
            products, users, interactions
        );
        Ok(store)
    }

    /// Build a store from an in-memory dataset.
    pub fn from_dataset(dataset: Dataset) -> Self {
        let mut store = Self::new();
        for product in dataset.products {
            store.insert_product(product);
        }
        for interaction in dataset.interactions {
            store.record_interaction(interaction);
        }
        store
    }

    /// Write the store's contents back out as a dataset file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let dataset = Dataset {
            products: self
                .product_order
                .iter()
                .filter_map(|id| self.products.get(id).cloned())
                .collect(),
            interactions: self.interactions.clone(),
        };
        let raw = serde_json::to_string_pretty(&dataset)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    // Getters - these return references or slices, never owned copies

    /// Get a product by ID.
    pub fn get_product(&self, id: &str) -> Option<&Product> {
        self.products.get(id)
    }

    /// All products in first-seen catalog order.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.product_order
            .iter()
            .filter_map(|id| self.products.get(id))
    }

    /// Product IDs in first-seen catalog order.
    pub fn product_ids(&self) -> &[ProductId] {
        &self.product_order
    }

    /// The full interaction log, in append order.
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// All interactions recorded for a user, in append order.
    pub fn interactions_for_user(&self, user_id: &str) -> Vec<&Interaction> {
        self.user_interactions
            .get(user_id)
            .map(|idxs| idxs.iter().map(|&i| &self.interactions[i]).collect())
            .unwrap_or_default()
    }

    /// All interactions recorded for a product, in append order.
    pub fn interactions_for_product(&self, product_id: &str) -> Vec<&Interaction> {
        self.product_interactions
            .get(product_id)
            .map(|idxs| idxs.iter().map(|&i| &self.interactions[i]).collect())
            .unwrap_or_default()
    }

    /// All product IDs in a category.
    pub fn products_in_category(&self, category: &str) -> &[ProductId] {
        self.category_index
            .get(category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    // Mutators - used while building the store

    /// Insert a product into the catalog.
    pub fn insert_product(&mut self, product: Product) {
        if !self.products.contains_key(&product.id) {
            self.product_order.push(product.id.clone());
            self.category_index
                .entry(product.category.clone())
                .or_default()
                .push(product.id.clone());
        }
        self.products.insert(product.id.clone(), product);
    }

    /// Append an interaction to the log and update indices.
    pub fn record_interaction(&mut self, interaction: Interaction) {
        let idx = self.interactions.len();
        self.user_interactions
            .entry(interaction.user_id.clone())
            .or_default()
            .push(idx);
        self.product_interactions
            .entry(interaction.product_id.clone())
            .or_default()
            .push(idx);
        self.interactions.push(interaction);
    }

    /// Check referential integrity and value ranges.
    ///
    /// Interactions may reference products missing from the catalog only if
    /// the catalog is empty (interaction-only datasets are allowed for
    /// training the collaborative engines).
    pub fn validate(&self) -> Result<()> {
        for interaction in &self.interactions {
            if let Some(rating) = interaction.rating {
                if !(1.0..=5.0).contains(&rating) {
                    return Err(StoreError::InvalidValue {
                        field: "rating".to_string(),
                        value: rating.to_string(),
                    });
                }
            }
            if !self.products.is_empty() && !self.products.contains_key(&interaction.product_id) {
                return Err(StoreError::MissingReference {
                    entity: "Product".to_string(),
                    id: interaction.product_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// (products, distinct users, interactions) for logging/validation.
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.products.len(),
            self.user_interactions.len(),
            self.interactions.len(),
        )
    }
}
