//! Immutable bundle of trained models.
//!
//! Training builds a complete snapshot off to the side and the orchestrator
//! publishes it with a single `Arc` swap, so readers either see the previous
//! generation or the new one, never a half-trained mix.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use engines::{CollaborativeFilteringEngine, HybridEngine, MatrixFactorizationEngine};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const CF_FILE: &str = "collaborative.json";
const MF_FILE: &str = "matrix_factorization.json";
const HYBRID_FILE: &str = "hybrid.json";
const META_FILE: &str = "snapshot.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotMeta {
    version: u64,
    trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    pub cf: CollaborativeFilteringEngine,
    pub mf: MatrixFactorizationEngine,
    pub hybrid: HybridEngine,
    pub version: u64,
    pub trained_at: DateTime<Utc>,
}

impl ModelSnapshot {
    /// Persist all models plus metadata into a directory.
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating model directory {}", dir.display()))?;
        self.cf
            .save_to(&dir.join(CF_FILE))
            .context("saving collaborative model")?;
        self.mf
            .save_to(&dir.join(MF_FILE))
            .context("saving matrix factorization model")?;
        self.hybrid
            .save_to(&dir.join(HYBRID_FILE))
            .context("saving hybrid model")?;
        let meta = SnapshotMeta {
            version: self.version,
            trained_at: self.trained_at,
        };
        std::fs::write(dir.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;
        info!(version = self.version, dir = %dir.display(), "Saved model snapshot");
        Ok(())
    }

    /// Load a previously saved snapshot. Fails if any model file is
    /// missing or unreadable; partial snapshots are not loadable.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let meta: SnapshotMeta = serde_json::from_str(
            &std::fs::read_to_string(dir.join(META_FILE))
                .with_context(|| format!("reading snapshot metadata in {}", dir.display()))?,
        )?;
        let snapshot = Self {
            cf: CollaborativeFilteringEngine::load_from(&dir.join(CF_FILE))
                .context("loading collaborative model")?,
            mf: MatrixFactorizationEngine::load_from(&dir.join(MF_FILE))
                .context("loading matrix factorization model")?,
            hybrid: HybridEngine::load_from(&dir.join(HYBRID_FILE))
                .context("loading hybrid model")?,
            version: meta.version,
            trained_at: meta.trained_at,
        };
        info!(version = snapshot.version, dir = %dir.display(), "Loaded model snapshot");
        Ok(snapshot)
    }
}
