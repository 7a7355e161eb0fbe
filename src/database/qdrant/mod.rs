
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{CreateOutcome, Distance, IndexedPoint, ScoredPoint, VectorIndex};
use crate::documents::Document;
use crate::http::{JsonMethod, RequestError, RetryingAgent};
use crate::{ChatError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_UPLOAD_BATCH_SIZE: usize = 64;

/// Vector index backed by a Qdrant server's REST API
#[derive(Debug, Clone)]
pub struct QdrantIndex {
    base_url: Url,
    api_key: String,
    upload_batch_size: usize,
    http: RetryingAgent,
}

/// Every Qdrant response wraps its payload in `result`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    points: Vec<QdrantHit>,
}

#[derive(Debug, Deserialize)]
struct QdrantHit {
    id: u64,
    score: f32,
    payload: Option<Document>,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: usize,
    distance: Distance,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    points: Vec<PointStruct<'a>>,
}

#[derive(Debug, Serialize)]
struct PointStruct<'a> {
    id: u64,
    vector: &'a [f32],
    payload: &'a Document,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Serialize)]
struct CountRequest {
    exact: bool,
}

impl QdrantIndex {
    #[inline]
    pub fn new(base_url: Url, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            upload_batch_size: DEFAULT_UPLOAD_BATCH_SIZE,
            http: RetryingAgent::new(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.http = self.http.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.http = self.http.with_backoff(backoff);
        self
    }

    #[inline]
    pub fn with_upload_batch_size(mut self, batch_size: usize) -> Self {
        self.upload_batch_size = batch_size.max(1);
        self
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ChatError::Config(format!("Failed to build Qdrant URL: {}", e)))
    }

    fn collection_url(&self, collection: &str, suffix: &str) -> Result<Url> {
        let mut url = self.url("/collections")?;
        url.path_segments_mut()
            .map_err(|()| ChatError::Config("Qdrant URL cannot be a base".to_string()))?
            .push(collection)
            .extend(suffix.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    fn headers(&self) -> [(&str, &str); 1] {
        [("api-key", self.api_key.as_str())]
    }

    fn decode<T: for<'de> Deserialize<'de>>(body: &str, what: &str) -> Result<T> {
        serde_json::from_str::<Envelope<T>>(body)
            .map(|envelope| envelope.result)
            .map_err(|e| ChatError::Database(format!("Failed to parse {} response: {}", what, e)))
    }

    fn encode<T: Serialize>(value: &T, what: &str) -> Result<String> {
        serde_json::to_string(value)
            .map_err(|e| ChatError::Database(format!("Failed to serialize {} request: {}", what, e)))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let url = self.collection_url(collection, "exists")?;
        let body = self.http.get(url.as_str(), &self.headers())?;
        let result: ExistsResult = Self::decode(&body, "collection exists")?;
        debug!("Collection {} exists: {}", collection, result.exists);
        Ok(result.exists)
    }

    async fn create_collection(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<CreateOutcome> {
        let url = self.collection_url(collection, "")?;
        let request = CreateCollectionRequest {
            vectors: VectorParams {
                size: dimension,
                distance,
            },
        };
        let body = Self::encode(&request, "create collection")?;

        match self
            .http
            .send_json(JsonMethod::Put, url.as_str(), &self.headers(), &body)
        {
            Ok(_) => {
                info!(
                    "Created collection {} ({} dimensions, {})",
                    collection, dimension, distance
                );
                Ok(CreateOutcome::Created)
            }
            Err(RequestError::Status(409)) => {
                info!("Collection {} was created concurrently", collection);
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upload_points(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()> {
        if points.is_empty() {
            debug!("No points to upload");
            return Ok(());
        }

        let mut url = self.collection_url(collection, "points")?;
        url.set_query(Some("wait=true"));

        for batch in points.chunks(self.upload_batch_size) {
            let request = UpsertRequest {
                points: batch
                    .iter()
                    .map(|point| PointStruct {
                        id: point.id,
                        vector: &point.vector,
                        payload: &point.payload,
                    })
                    .collect(),
            };
            let body = Self::encode(&request, "upsert points")?;
            self.http
                .send_json(JsonMethod::Put, url.as_str(), &self.headers(), &body)?;
            debug!("Uploaded batch of {} points", batch.len());
        }

        info!("Uploaded {} points to {}", points.len(), collection);
        Ok(())
    }

    async fn query_points(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let url = self.collection_url(collection, "points/query")?;
        let request = QueryRequest {
            query: vector,
            limit,
            with_payload: true,
        };
        let body = Self::encode(&request, "query points")?;
        let response = self
            .http
            .send_json(JsonMethod::Post, url.as_str(), &self.headers(), &body)?;
        let result: QueryResult = Self::decode(&response, "query points")?;

        result
            .points
            .into_iter()
            .map(|hit| {
                let payload = hit.payload.ok_or_else(|| {
                    ChatError::Database(format!("Point {} has no document payload", hit.id))
                })?;
                Ok(ScoredPoint {
                    id: hit.id,
                    score: hit.score,
                    payload,
                })
            })
            .collect()
    }

    async fn count_points(&self, collection: &str) -> Result<u64> {
        let url = self.collection_url(collection, "points/count")?;
        let body = Self::encode(&CountRequest { exact: true }, "count points")?;
        let response = self
            .http
            .send_json(JsonMethod::Post, url.as_str(), &self.headers(), &body)?;
        let result: CountResult = Self::decode(&response, "count points")?;
        Ok(result.count)
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let url = self.collection_url(collection, "")?;
        self.http.delete(url.as_str(), &self.headers())?;
        info!("Deleted collection {}", collection);
        Ok(())
    }
}
