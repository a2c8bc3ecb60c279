//! In-memory storage engine for testing and ephemeral use

use crate::{ObjectMeta, RangeVisitor, Result, StorageEngine, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;

/// An in-memory storage engine
///
/// Backed by a sharded concurrent map. Every value is a complete,
/// immutable [`Bytes`] buffer, so a reader observes either the previous or
/// the next object, never a partial one. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryEngine {
    objects: Arc<DashMap<String, StoredObject>>,
}

impl MemoryEngine {
    /// Create a new empty engine
    pub fn new() -> Self {
        Self {
            objects: Arc::new(DashMap::new()),
        }
    }

    /// Get the number of objects stored
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the engine is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Get total size of all objects
    pub fn total_size(&self) -> u64 {
        self.objects.iter().map(|entry| entry.value().meta.size).sum()
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, path: &str) -> Result<Option<StoredObject>> {
        Ok(self.objects.get(path).map(|entry| entry.value().clone()))
    }

    async fn store(&self, path: &str, data: Bytes) -> Result<()> {
        self.objects.insert(path.to_string(), StoredObject::new(data));
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.remove(path);
        Ok(())
    }

    async fn range(&self, prefix: &str, visit: &mut RangeVisitor<'_>) -> Result<()> {
        // Snapshot first so no shard lock is held while the visitor runs.
        let snapshot: Vec<(String, ObjectMeta)> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().meta.clone()))
            .collect();

        for (path, meta) in &snapshot {
            if !visit(path, meta) {
                break;
            }
        }
        Ok(())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        Ok(self.objects.get(path).map(|entry| entry.value().meta.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;

    #[tokio::test]
    async fn test_store_then_load() {
        let engine = MemoryEngine::new();

        engine.store("a/b", Bytes::from_static(b"Hello, World!")).await.unwrap();

        let object = engine.load("a/b").await.unwrap().unwrap();
        assert_eq!(object.data.as_ref(), b"Hello, World!");
        assert_eq!(object.meta.size, 13);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let engine = MemoryEngine::new();
        assert!(engine.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let engine = MemoryEngine::new();

        engine.store("x", Bytes::from_static(b"1")).await.unwrap();
        engine.delete("x").await.unwrap();
        engine.delete("x").await.unwrap();

        assert!(engine.load("x").await.unwrap().is_none());
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_object() {
        let engine = MemoryEngine::new();

        engine.store("k", Bytes::from_static(b"long first value")).await.unwrap();
        engine.store("k", Bytes::from_static(b"short")).await.unwrap();

        let object = engine.load("k").await.unwrap().unwrap();
        assert_eq!(object.data.as_ref(), b"short");
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.total_size(), 5);
    }

    #[tokio::test]
    async fn test_range_prefix_and_early_stop() {
        let engine = MemoryEngine::new();
        for key in ["a/1", "a/2", "a/3", "ab/1", "b/1"] {
            engine.store(key, Bytes::from_static(b"v")).await.unwrap();
        }

        let mut seen = Vec::new();
        engine
            .range("a/", &mut |path, _| {
                seen.push(path.to_string());
                true
            })
            .await
            .unwrap();
        seen.sort();
        assert_eq!(seen, vec!["a/1", "a/2", "a/3"]);

        let mut count = 0;
        engine
            .range("", &mut |_, _| {
                count += 1;
                count < 2
            })
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_copy_default_impl() {
        let engine = MemoryEngine::new();
        engine.store("src", Bytes::from_static(b"payload")).await.unwrap();

        engine.copy("src", "dst").await.unwrap();
        assert_eq!(engine.load("dst").await.unwrap().unwrap().data.as_ref(), b"payload");

        let missing = engine.copy("missing", "dst2").await;
        assert!(matches!(missing, Err(StorageError::ObjectNotFound(_))));
    }

    #[test_log::test(tokio::test)]
    async fn test_range_tolerates_concurrent_mutation() {
        let engine = MemoryEngine::new();
        for i in 0..200 {
            engine.store(&format!("k/{}", i), Bytes::from(vec![1u8; 16])).await.unwrap();
        }

        let writer = {
            let engine = engine.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    engine.delete(&format!("k/{}", i)).await.unwrap();
                    engine.store(&format!("k/{}", i + 200), Bytes::from(vec![2u8; 16])).await.unwrap();
                }
            })
        };

        for _ in 0..10 {
            engine
                .range("k/", &mut |_, meta| {
                    assert_eq!(meta.size, 16);
                    true
                })
                .await
                .unwrap();
        }
        writer.await.unwrap();
        assert_eq!(engine.len(), 200);
    }
}
