//! Cross-run dedup cache: a campaign-scoped, append-only store of addresses
//! already returned to a caller.
//!
//! One newline-delimited file per `(topic, session_id)` pair. Loaded fully
//! into memory at run start; appended to only after a run completes. Losing
//! the store degrades to in-memory-only dedup, never a failed run — callers
//! log `CacheIo` errors and carry on.

use crate::core::error::{AppError, Result};

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Separator between topic and session when deriving the campaign key.
/// A control character cannot occur in either input, so distinct
/// `(topic, session)` pairs can never collide by concatenation.
const KEY_SEPARATOR: char = '\u{1f}';

/// Derives the deterministic campaign key for a topic and optional session.
///
/// The same topic under different sessions gets independent dedup history,
/// which is what allows parallel campaigns on one topic.
pub fn campaign_key(topic: &str, session_id: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(topic.trim().to_lowercase().as_bytes());
    if let Some(session) = session_id {
        hasher.update([KEY_SEPARATOR as u8]);
        hasher.update(session.trim().as_bytes());
    }
    hex::encode(hasher.finalize())[..16].to_string()
}

/// Campaign-scoped persistent set of already-returned addresses.
pub struct DedupCache {
    path: PathBuf,
}

impl DedupCache {
    /// Opens (without creating) the store for one campaign.
    pub fn for_campaign(cache_dir: &Path, topic: &str, session_id: Option<&str>) -> Self {
        let key = campaign_key(topic, session_id);
        Self {
            path: cache_dir.join(format!("returned-{}.txt", key)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every previously returned address into a set.
    /// A missing store file is an empty campaign, not an error.
    pub fn load(&self) -> Result<HashSet<String>> {
        if !self.path.exists() {
            tracing::debug!(target: "cache_task",
                "No dedup store at {}; starting empty.", self.path.display());
            return Ok(HashSet::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| AppError::CacheIo(format!("reading {}: {}", self.path.display(), e)))?;
        let set: HashSet<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.to_lowercase())
            .collect();
        tracing::debug!(target: "cache_task",
            "Loaded {} previously returned addresses from {}.",
            set.len(),
            self.path.display()
        );
        Ok(set)
    }

    /// Appends newly returned addresses, one per line.
    ///
    /// Append-only by construction: a crash mid-write can lose this run's
    /// tail but never rewrites entries from prior successful runs.
    pub fn append(&self, new_emails: &[String]) -> Result<()> {
        if new_emails.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::CacheIo(format!("creating {}: {}", parent.display(), e))
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::CacheIo(format!("opening {}: {}", self.path.display(), e)))?;

        let mut block = String::with_capacity(new_emails.len() * 32);
        for email in new_emails {
            block.push_str(&email.to_lowercase());
            block.push('\n');
        }
        file.write_all(block.as_bytes())
            .map_err(|e| AppError::CacheIo(format!("appending {}: {}", self.path.display(), e)))?;

        tracing::debug!(target: "cache_task",
            "Appended {} addresses to {}.", new_emails.len(), self.path.display());
        Ok(())
    }
}
