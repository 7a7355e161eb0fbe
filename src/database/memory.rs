// In-process vector index with exact scoring, used for offline runs and tests

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{CreateOutcome, Distance, IndexedPoint, ScoredPoint, VectorIndex};
use crate::{ChatError, Result};

#[derive(Debug)]
struct Collection {
    dimension: usize,
    distance: Distance,
    points: Vec<IndexedPoint>,
}

/// Brute-force index held in memory; contents are lost with the process
#[derive(Debug, Default)]
pub struct MemoryIndex {
    collections: Mutex<HashMap<String, Collection>>,
}

impl MemoryIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of collections currently held
    #[inline]
    pub fn collection_count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .lock()
            .map_err(|_| ChatError::Database("Memory index lock poisoned".to_string()))
    }
}

fn missing(collection: &str) -> ChatError {
    ChatError::Database(format!("Collection '{}' does not exist", collection))
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(collection))
    }

    async fn create_collection(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<CreateOutcome> {
        let mut collections = self.lock()?;
        if collections.contains_key(collection) {
            return Ok(CreateOutcome::AlreadyExists);
        }

        collections.insert(
            collection.to_string(),
            Collection {
                dimension,
                distance,
                points: Vec::new(),
            },
        );
        debug!("Created in-memory collection {}", collection);
        Ok(CreateOutcome::Created)
    }

    async fn upload_points(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()> {
        let mut collections = self.lock()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != target.dimension) {
            return Err(ChatError::Database(format!(
                "Point {} has {} dimensions, collection '{}' expects {}",
                bad.id,
                bad.vector.len(),
                collection,
                target.dimension
            )));
        }

        for point in points {
            // Upsert by id, as Qdrant does
            target.points.retain(|existing| existing.id != point.id);
            target.points.push(point);
        }
        Ok(())
    }

    async fn query_points(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.lock()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| missing(collection))?;

        if vector.len() != target.dimension {
            return Err(ChatError::Database(format!(
                "Query has {} dimensions, collection '{}' expects {}",
                vector.len(),
                collection,
                target.dimension
            )));
        }

        let mut hits: Vec<ScoredPoint> = target
            .points
            .iter()
            .map(|point| ScoredPoint {
                id: point.id,
                score: target.distance.similarity(vector, &point.vector),
                payload: point.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count_points(&self, collection: &str) -> Result<u64> {
        let collections = self.lock()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| missing(collection))?;
        Ok(target.points.len() as u64)
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.lock()?.remove(collection);
        Ok(())
    }
}
