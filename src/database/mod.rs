// Vector index module
// One trait over the Qdrant server, the embedded LanceDB store and an
// in-process index

pub mod lancedb;
pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::Result;
use crate::config::{Config, VectorBackend};
use crate::documents::Document;

pub use self::lancedb::LanceIndex;
pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;

/// Similarity metric a collection is created with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl fmt::Display for Distance {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cosine => "Cosine",
            Self::Dot => "Dot",
            Self::Euclid => "Euclid",
        };
        f.write_str(name)
    }
}

impl Distance {
    /// Similarity of two equal-length vectors under this metric, higher is
    /// closer. Euclid is negated so ordering matches the other metrics.
    #[inline]
    pub fn similarity(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => {
                let dot = dot(a, b);
                let norms = dot_self(a).sqrt() * dot_self(b).sqrt();
                if norms == 0.0 { 0.0 } else { dot / norms }
            }
            Self::Dot => dot(a, b),
            Self::Euclid => -a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn dot_self(a: &[f32]) -> f32 {
    dot(a, a)
}

/// A document stored in the index together with its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPoint {
    /// Zero-based position of the document in the loaded sequence
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: Document,
}

/// A query hit; higher `score` is better for every metric
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    pub payload: Document,
}

/// Result of asking the index to create a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Operations the chatbot needs from a vector database
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Create an empty collection. Reports [`CreateOutcome::AlreadyExists`]
    /// instead of failing when another writer created it first.
    async fn create_collection(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<CreateOutcome>;

    async fn upload_points(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()>;

    /// Up to `limit` hits ordered best first
    async fn query_points(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;

    async fn count_points(&self, collection: &str) -> Result<u64>;

    async fn delete_collection(&self, collection: &str) -> Result<()>;
}

/// Open the index selected by the configured vector database URL
#[inline]
pub async fn open_index(config: &Config) -> Result<Box<dyn VectorIndex>> {
    match config.vector_backend()? {
        VectorBackend::Qdrant(url) => {
            info!("Using Qdrant vector database at {}", url);
            let api_key = config.vector_db.api_key.clone().unwrap_or_default();
            let index = QdrantIndex::new(url, api_key)
                .with_timeout(Duration::from_secs(config.vector_db.timeout_seconds))
                .with_upload_batch_size(config.vector_db.upload_batch_size as usize);
            Ok(Box::new(index))
        }
        VectorBackend::Lance(path) => {
            info!("Using local LanceDB store at {}", path.display());
            Ok(Box::new(LanceIndex::open(&path).await?))
        }
    }
}
