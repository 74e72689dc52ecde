//! Dataset files handed over by the ingestion and classification layer.

use std::path::Path;

use anyhow::{Context, Result};
use labuse_core::{Area, AreaRegistry, NormalizedBatch, RawSession, normalize_all};
use serde::Deserialize;

/// Classified areas and raw session rows, as read from disk.
#[derive(Debug, Clone, Deserialize)]
pub struct Dataset {
    pub areas: Vec<Area>,
    #[serde(default)]
    pub sessions: Vec<RawSession>,
}

/// A dataset after registry construction and record normalization.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub registry: AreaRegistry,
    pub batch: NormalizedBatch,
}

impl Dataset {
    /// Reads a JSON dataset file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dataset {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse dataset {}", path.display()))
    }

    /// Builds the registry and normalizes every session row.
    ///
    /// Malformed rows are collected in the batch, not returned as errors.
    pub fn prepare(self) -> Result<Prepared> {
        let registry = AreaRegistry::new(self.areas).context("invalid area list")?;
        let batch = normalize_all(&self.sessions);
        Ok(Prepared { registry, batch })
    }
}

/// Loads and prepares a dataset, reporting rejected rows on stderr.
pub fn load_prepared(path: &Path) -> Result<Prepared> {
    let prepared = Dataset::load(path)?.prepare()?;

    let rejected = &prepared.batch.rejected;
    if !rejected.is_empty() {
        eprintln!("Warning: {} record(s) rejected:", rejected.len());
        for record in rejected {
            eprintln!("  {record}");
        }
    }

    Ok(prepared)
}
