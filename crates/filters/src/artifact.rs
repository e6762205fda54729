//! Content-addressed side artifacts
//!
//! `StoreArtifact` moves value content (images, certificates, ...) into the
//! artifact store and keeps only the artifact name on the object. Names are
//! the hex SHA-256 of the content, so storing unchanged content is a no-op.
//!
//! The filter only queues the store changes on the table
//! ([`ValueTable::artifacts_mut`]). Whoever writes the object applies them:
//! puts before the backend write, releases after it.

use attrflow_core::{Result, Value, ValueTable};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::filter::{text, Filter, FilterContext};

/// Artifact name of some content
pub fn artifact_name(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

fn content_of(filter: &str, value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        other => Ok(text(filter, other)?.into_bytes()),
    }
}

/// Store the values of `key` as artifacts and replace them by their names
///
/// Untouched attributes are skipped. Names dropped by this write are queued
/// for release; they leave the store once no other object references them.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreArtifact;

impl Filter for StoreArtifact {
    fn name(&self) -> &'static str {
        "StoreArtifact"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, _params: &[String]) -> Result<String> {
        let slot = table.require(key)?;
        if !slot.is_modified() {
            trace!(attribute = key, "artifact source unchanged");
            return Ok(key.to_string());
        }

        let mut names = Vec::with_capacity(slot.current.len());
        let mut contents = Vec::with_capacity(slot.current.len());
        for value in &slot.current {
            let content = content_of(self.name(), value)?;
            names.push(artifact_name(&content));
            contents.push(content);
        }
        let dropped = slot
            .original
            .iter()
            .map(|previous| text(self.name(), previous))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|previous| !names.contains(previous))
            .collect::<Vec<_>>();

        let plan = table.artifacts_mut();
        for (name, content) in names.iter().zip(contents) {
            plan.put(name.as_str(), content);
        }
        for previous in dropped {
            plan.release(key, previous);
        }
        trace!(attribute = key, queued = names.len(), "artifact changes queued");

        table.set_values(key, names.into_iter().map(Value::from).collect())?;
        Ok(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::Harness;
    use attrflow_core::{ArtifactStore, AttributeValue, MemoryArtifacts, MemoryDirectory, Record};
    use std::sync::Arc;

    const PHOTO: &[u8] = b"\x89PNG fake image";

    fn harness(directory: Arc<MemoryDirectory>, artifacts: Arc<MemoryArtifacts>) -> Harness {
        let mut h = Harness::with_directory(directory);
        h.env = h.env.clone().with_artifacts(artifacts);
        h
    }

    #[test]
    fn test_store_replaces_content_with_name() {
        let artifacts = Arc::new(MemoryArtifacts::new());
        let mut h = harness(Arc::new(MemoryDirectory::new()), artifacts.clone());
        h.set("jpegPhoto", "Binary", vec![Value::Bytes(PHOTO.to_vec())]);
        h.run(&StoreArtifact, "jpegPhoto", &[]).unwrap();

        let name = artifact_name(PHOTO);
        assert_eq!(name.len(), 64);
        assert_eq!(h.values("jpegPhoto"), vec![Value::from(name.as_str())]);
        assert_eq!(h.table.artifacts().puts().collect::<Vec<_>>(), vec![name.as_str()]);
        assert!(artifacts.get(&name).is_none(), "filter must not write the store");

        h.table.take_artifacts().store(&h.env).unwrap();
        assert_eq!(artifacts.get(&name), Some(PHOTO.to_vec()));
    }

    #[test]
    fn test_unchanged_source_is_noop() {
        let artifacts = Arc::new(MemoryArtifacts::new());
        let mut h = harness(Arc::new(MemoryDirectory::new()), artifacts.clone());
        let name = artifact_name(PHOTO);
        h.table.insert(
            "jpegPhoto",
            AttributeValue::loaded(vec![Value::from(name.as_str())], "Binary", "Binary"),
        );
        h.run(&StoreArtifact, "jpegPhoto", &[]).unwrap();
        assert_eq!(h.values("jpegPhoto"), vec![Value::from(name.as_str())]);
        assert!(h.table.artifacts().is_empty());
        assert!(artifacts.names().is_empty());
    }

    #[test]
    fn test_replaced_name_is_queued_not_removed() {
        let artifacts = Arc::new(MemoryArtifacts::new());
        let old = artifact_name(b"old");
        artifacts.put(&old, b"old").unwrap();

        let mut h = harness(Arc::new(MemoryDirectory::new()), artifacts.clone());
        h.table.insert(
            "jpegPhoto",
            AttributeValue::loaded(vec![Value::from(old.as_str())], "Binary", "Binary")
                .with_values(vec![Value::Bytes(b"new".to_vec())]),
        );
        h.run(&StoreArtifact, "jpegPhoto", &[]).unwrap();
        assert!(artifacts.get(&old).is_some());
        assert_eq!(h.table.artifacts().releases().collect::<Vec<_>>(), vec![old.as_str()]);
    }

    #[test]
    fn test_orphaned_artifact_released_only_without_references() {
        let artifacts = Arc::new(MemoryArtifacts::new());
        let old = artifact_name(b"old");
        artifacts.put(&old, b"old").unwrap();

        let directory = Arc::new(MemoryDirectory::new());
        let mut h = harness(directory.clone(), artifacts.clone());
        h.table.insert(
            "jpegPhoto",
            AttributeValue::loaded(vec![Value::from(old.as_str())], "Binary", "Binary")
                .with_values(vec![Value::Bytes(b"new".to_vec())]),
        );

        let mut other = Record::new();
        other.insert("jpegPhoto".into(), vec![Value::from(old.as_str())]);
        directory.insert("User", "u-2", None, other);
        h.run(&StoreArtifact, "jpegPhoto", &[]).unwrap();
        let plan = h.table.take_artifacts();
        plan.store(&h.env).unwrap();
        plan.release_unreferenced(&h.env, &h.object.uuid).unwrap();
        assert!(artifacts.get(&old).is_some(), "still referenced by u-2");

        directory.insert("User", "u-2", None, Record::new());
        h.table.insert(
            "jpegPhoto",
            AttributeValue::loaded(vec![Value::from(old.as_str())], "Binary", "Binary")
                .with_values(vec![Value::Bytes(b"newer".to_vec())]),
        );
        h.run(&StoreArtifact, "jpegPhoto", &[]).unwrap();
        let plan = h.table.take_artifacts();
        plan.store(&h.env).unwrap();
        plan.release_unreferenced(&h.env, &h.object.uuid).unwrap();
        assert!(artifacts.get(&old).is_none());
        assert!(artifacts.get(&artifact_name(b"newer")).is_some());
    }
}
