//! # Store Crate
//!
//! Typed domain records and the in-memory data store the recommendation
//! engines read from.
//!
//! ## Components
//! - `types`: Interaction, Product, and the dataset container
//! - `index`: DataStore with per-user / per-product / per-category indices
//! - `demo`: seeded synthetic dataset generation for the CLI and benches
//! - `error`: StoreError and the crate Result alias
//!
//! The store is read-only from the engines' perspective: interactions are
//! appended by the surrounding application and consumed wholesale at
//! training time.

pub mod demo;
pub mod error;
pub mod index;
pub mod types;

pub use error::{Result, StoreError};
pub use index::DataStore;
pub use types::{Dataset, Interaction, InteractionType, Product, ProductId, UserId};
