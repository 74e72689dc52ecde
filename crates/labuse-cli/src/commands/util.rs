//! Shared utilities for CLI commands.

use anyhow::{Context, Result};
use labuse_core::{Timeline, build_timeline_with};
use labuse_db::{Database, fingerprint};

use crate::Config;
use crate::dataset::Prepared;

/// Builds the timeline for a prepared dataset, going through the result cache
/// when enabled.
///
/// Any cache problem is logged and falls back to recomputation; engine errors
/// (unknown areas, oversized grids) are returned.
pub fn compute_timeline(prepared: &Prepared, config: &Config, use_cache: bool) -> Result<Timeline> {
    let sessions = &prepared.batch.sessions;
    let build = || {
        build_timeline_with(sessions, &prepared.registry, &config.timeline_config())
            .context("failed to build occupancy timeline")
    };

    if !(use_cache && config.cache_enabled) {
        return build();
    }

    let mut db = match open_cache(config) {
        Ok(db) => db,
        Err(e) => {
            tracing::warn!(error = %e, "result cache unavailable; recomputing");
            return build();
        }
    };

    let key = match fingerprint(sessions, &prepared.registry, None) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(error = %e, "failed to fingerprint input; recomputing");
            return build();
        }
    };

    match db.get_timeline(&key) {
        Ok(Some(timeline)) => return Ok(timeline),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "failed to read result cache; recomputing");
            return build();
        }
    }

    let timeline = build()?;
    if let Err(e) = db.put_timeline(&key, &timeline, sessions.len()) {
        tracing::warn!(error = %e, "failed to store timeline in cache");
        return Ok(timeline);
    }
    if config.cache_max_entries > 0 {
        if let Err(e) = db.prune(config.cache_max_entries) {
            tracing::warn!(error = %e, "failed to prune result cache");
        }
    }
    Ok(timeline)
}

/// Opens the cache database, creating its directory if needed.
pub fn open_cache(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create cache directory")?;
    }
    Database::open(&config.database_path).with_context(|| {
        format!(
            "failed to open cache {}",
            config.database_path.display()
        )
    })
}

/// Formats minutes as "Xh Ym" if >= 1 hour, "Xm" otherwise.
pub fn format_minutes(minutes: u64) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours >= 1 {
        format!("{hours}h {rest}m")
    } else {
        format!("{rest}m")
    }
}
