// Indexer module
// One-shot population of the vector collection from the loaded documents


use tracing::{debug, error, info, warn};

use crate::database::{CreateOutcome, Distance, IndexedPoint, VectorIndex};
use crate::documents::Document;
use crate::embeddings::Embedder;
use crate::{ChatError, Result};

/// What [`ensure_indexed`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The collection already existed, nothing was written
    AlreadyIndexed,
    /// The collection was created and filled with this many points
    Indexed { points: usize },
}

/// Make sure `collection` exists and holds one point per document.
///
/// An existing collection is trusted as-is; there is no freshness check.
/// On a fresh collection every document is embedded and uploaded with its
/// position as id. If embedding or upload fails, the collection is dropped
/// again so the next start re-indexes from scratch rather than serving a
/// partial collection. Two instances racing on an empty database may both
/// upload; ids are positional, so the second upload overwrites the first.
#[inline]
pub async fn ensure_indexed(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    collection: &str,
    distance: Distance,
    documents: &[Document],
) -> Result<BootstrapOutcome> {
    if index.collection_exists(collection).await? {
        info!("Collection {} already exists, skipping indexing", collection);
        return Ok(BootstrapOutcome::AlreadyIndexed);
    }

    let dimension = embedder.dimension();
    match index
        .create_collection(collection, dimension, distance)
        .await?
    {
        CreateOutcome::Created => {}
        CreateOutcome::AlreadyExists => {
            info!(
                "Collection {} was created by another instance, skipping indexing",
                collection
            );
            return Ok(BootstrapOutcome::AlreadyIndexed);
        }
    }

    match populate(index, embedder, collection, documents).await {
        Ok(points) => {
            info!("Indexed {} documents into {}", points, collection);
            Ok(BootstrapOutcome::Indexed { points })
        }
        Err(e) => {
            error!(
                "Indexing {} failed ({:?}): {}",
                collection,
                e.kind(),
                e
            );
            if let Err(cleanup) = index.delete_collection(collection).await {
                warn!(
                    "Failed to drop partially indexed collection {}: {}",
                    collection, cleanup
                );
            }
            Err(e)
        }
    }
}

async fn populate(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    collection: &str,
    documents: &[Document],
) -> Result<usize> {
    if documents.is_empty() {
        warn!("No documents to index into {}", collection);
        return Ok(0);
    }

    let contents: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
    let vectors = embedder.embed_batch(&contents)?;

    if vectors.len() != documents.len() {
        return Err(ChatError::Embedding(format!(
            "Expected {} embeddings, got {}",
            documents.len(),
            vectors.len()
        )));
    }

    let dimension = embedder.dimension();
    let points = documents
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(position, (document, vector))| {
            if vector.len() == dimension {
                Ok(IndexedPoint {
                    id: position as u64,
                    vector,
                    payload: document.clone(),
                })
            } else {
                Err(ChatError::Embedding(format!(
                    "Embedding for {} has {} dimensions, expected {}",
                    document.name,
                    vector.len(),
                    dimension
                )))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let count = points.len();
    debug!("Uploading {} points to {}", count, collection);
    index.upload_points(collection, points).await?;
    Ok(count)
}
