//! Pending artifact store changes
//!
//! Filters that move content into the [`ArtifactStore`] do not touch the
//! store themselves. They queue the work on the [`ValueTable`] being saved
//! and the caller applies it around the backend write: content is stored
//! before the object record names it, and names the record dropped are
//! released only after the write went through.
//!
//! [`ArtifactStore`]: crate::traits::ArtifactStore
//! [`ValueTable`]: crate::table::ValueTable

use crate::env::Collaborators;
use crate::error::Result;
use crate::search::{Query, UUID};
use crate::value::Value;
use tracing::debug;

/// Artifact writes and releases queued during one save
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArtifactPlan {
    puts: Vec<(String, Vec<u8>)>,
    releases: Vec<(String, String)>,
}

impl ArtifactPlan {
    /// Empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `content` under `name`
    pub fn put(&mut self, name: impl Into<String>, content: Vec<u8>) {
        let name = name.into();
        if !self.puts.iter().any(|(queued, _)| *queued == name) {
            self.puts.push((name, content));
        }
    }

    /// Queue the release of `name`, last referenced through `attribute`
    pub fn release(&mut self, attribute: impl Into<String>, name: impl Into<String>) {
        let entry = (attribute.into(), name.into());
        if !self.releases.contains(&entry) {
            self.releases.push(entry);
        }
    }

    /// Names queued for storing
    pub fn puts(&self) -> impl Iterator<Item = &str> {
        self.puts.iter().map(|(name, _)| name.as_str())
    }

    /// Names queued for release
    pub fn releases(&self) -> impl Iterator<Item = &str> {
        self.releases.iter().map(|(_, name)| name.as_str())
    }

    /// Nothing queued
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.releases.is_empty()
    }

    /// Write the queued content that is not stored yet
    ///
    /// Returns the number of artifacts written.
    pub fn store(&self, env: &Collaborators) -> Result<usize> {
        let mut written = 0;
        for (name, content) in &self.puts {
            if env.artifacts.exists(name)? {
                continue;
            }
            env.artifacts.put(name, content)?;
            debug!(artifact = %name, bytes = content.len(), "stored artifact");
            written += 1;
        }
        Ok(written)
    }

    /// Remove queued names that no object other than `owner` still references
    ///
    /// Returns the number of artifacts removed.
    pub fn release_unreferenced(&self, env: &Collaborators, owner: &str) -> Result<usize> {
        let mut removed = 0;
        for (attribute, name) in &self.releases {
            let references = env
                .search
                .search(&Query::new().eq(attribute.as_str(), name.as_str()), &[UUID])?
                .into_iter()
                .filter(|hit| {
                    hit.get(UUID)
                        .and_then(|v| v.first())
                        .and_then(Value::as_str)
                        .map_or(true, |uuid| uuid != owner)
                })
                .count();
            if references == 0 && env.artifacts.remove(name)? {
                debug!(attribute = %attribute, artifact = %name, "removed orphaned artifact");
                removed += 1;
            }
        }
        Ok(removed)
    }
}
