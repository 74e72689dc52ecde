//! Cache command: inspect or clear stored timelines.

use std::io::Write;

use anyhow::Result;

use crate::Config;
use crate::commands::util::open_cache;

/// Prints cache location, entry count, and age range.
pub fn stats<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    writeln!(writer, "Cache: {}", config.database_path.display())?;
    if !config.cache_enabled {
        writeln!(writer, "Caching is disabled.")?;
    }
    if !config.database_path.exists() {
        writeln!(writer, "No cached timelines.")?;
        return Ok(());
    }

    let stats = open_cache(config)?.stats()?;
    if stats.entries == 0 {
        writeln!(writer, "No cached timelines.")?;
        return Ok(());
    }

    writeln!(writer, "Entries: {}", stats.entries)?;
    writeln!(writer, "Payload: {} bytes", stats.payload_bytes)?;
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        writeln!(writer, "Oldest:  {}", oldest.to_rfc3339())?;
        writeln!(writer, "Newest:  {}", newest.to_rfc3339())?;
    }

    Ok(())
}

/// Removes every cached timeline.
pub fn clear<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    if !config.database_path.exists() {
        writeln!(writer, "Cache is already empty.")?;
        return Ok(());
    }

    let removed = open_cache(config)?.clear()?;
    tracing::info!(removed, "cleared result cache");
    writeln!(writer, "Removed {removed} cached timeline(s).")?;
    Ok(())
}
