// Embedded LanceDB vector index
// One table per collection, stored under a local directory


use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use super::{CreateOutcome, Distance, IndexedPoint, ScoredPoint, VectorIndex};
use crate::documents::Document;
use crate::{ChatError, Result};

const DISTANCE_METADATA_KEY: &str = "distance";

/// Vector index stored in a local LanceDB directory
pub struct LanceIndex {
    connection: Connection,
    db_path: PathBuf,
    /// Metric per collection created or opened by this handle
    distances: Mutex<HashMap<String, Distance>>,
}

impl LanceIndex {
    /// Open (creating if needed) the LanceDB directory at `db_path`
    #[inline]
    pub async fn open(db_path: &Path) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            ChatError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt") || error_msg.contains("malformed") {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        ChatError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(ChatError::Database(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        info!("Vector store opened at {}", db_path.display());
        Ok(Self {
            connection,
            db_path: db_path.to_path_buf(),
            distances: Mutex::new(HashMap::new()),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Move an unreadable database aside so a fresh one can be created
    fn attempt_corruption_recovery(db_path: &Path) -> Result<()> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
                std::fs::remove_dir_all(db_path).map_err(|e| {
                    ChatError::Database(format!("Failed to remove corrupted database: {}", e))
                })?;
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        std::fs::create_dir_all(db_path).map_err(|e| {
            ChatError::Database(format!("Failed to recreate vector database directory: {}", e))
        })?;
        Ok(())
    }

    fn create_schema(vector_dim: usize, distance: Distance) -> Arc<Schema> {
        let metadata = HashMap::from([(DISTANCE_METADATA_KEY.to_string(), distance.to_string())]);
        Arc::new(Schema::new_with_metadata(
            vec![
                Field::new("id", DataType::UInt64, false),
                Field::new(
                    "vector",
                    DataType::FixedSizeList(
                        Arc::new(Field::new("item", DataType::Float32, true)),
                        vector_dim as i32,
                    ),
                    false,
                ),
                Field::new("name", DataType::Utf8, false),
                Field::new("content", DataType::Utf8, false),
            ],
            metadata,
        ))
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| ChatError::Database(format!("Failed to list tables: {}", e)))
    }

    async fn open_table(&self, collection: &str) -> Result<lancedb::Table> {
        self.connection
            .open_table(collection)
            .execute()
            .await
            .map_err(|e| {
                ChatError::Database(format!("Failed to open table {}: {}", collection, e))
            })
    }

    /// Dimension and metric of an existing table, read from its schema
    async fn table_layout(&self, table: &lancedb::Table) -> Result<(usize, Distance)> {
        let schema = table
            .schema()
            .await
            .map_err(|e| ChatError::Database(format!("Failed to get table schema: {}", e)))?;

        let dimension = schema
            .fields()
            .iter()
            .find_map(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) if field.name() == "vector" => {
                    Some(*size as usize)
                }
                _ => None,
            })
            .ok_or_else(|| {
                ChatError::Database(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })?;

        let cached = self
            .distances
            .lock()
            .ok()
            .and_then(|map| map.get(table.name()).copied());
        let distance = cached
            .or_else(|| {
                schema
                    .metadata()
                    .get(DISTANCE_METADATA_KEY)
                    .and_then(|name| parse_distance(name))
            })
            .unwrap_or_default();

        Ok((dimension, distance))
    }

    fn create_record_batch(
        points: &[IndexedPoint],
        vector_dim: usize,
        distance: Distance,
    ) -> Result<RecordBatch> {
        let len = points.len();

        let mut ids = Vec::with_capacity(len);
        let mut names = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for point in points {
            if point.vector.len() != vector_dim {
                return Err(ChatError::Database(format!(
                    "Point {} has {} dimensions, table expects {}",
                    point.id,
                    point.vector.len(),
                    vector_dim
                )));
            }
            ids.push(point.id);
            names.push(point.payload.name.as_str());
            contents.push(point.payload.content.as_str());
            flat_values.extend_from_slice(&point.vector);
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    ChatError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(UInt64Array::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(names)),
            Arc::new(StringArray::from(contents)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim, distance), arrays)
            .map_err(|e| ChatError::Database(format!("Failed to create record batch: {}", e)))
    }

    fn parse_search_batch(batch: &RecordBatch, distance: Distance) -> Result<Vec<ScoredPoint>> {
        let ids = batch
            .column_by_name("id")
            .ok_or_else(|| ChatError::Database("Missing id column".to_string()))?
            .as_any()
            .downcast_ref::<UInt64Array>()
            .ok_or_else(|| ChatError::Database("Invalid id column type".to_string()))?;

        let names = batch
            .column_by_name("name")
            .ok_or_else(|| ChatError::Database("Missing name column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| ChatError::Database("Invalid name column type".to_string()))?;

        let contents = batch
            .column_by_name("content")
            .ok_or_else(|| ChatError::Database("Missing content column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| ChatError::Database("Invalid content column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let hits = (0..batch.num_rows())
            .map(|row| {
                let raw = distances
                    .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });
                ScoredPoint {
                    id: ids.value(row),
                    score: distance_to_score(distance, raw),
                    payload: Document {
                        name: names.value(row).to_string(),
                        content: contents.value(row).to_string(),
                    },
                }
            })
            .collect();

        Ok(hits)
    }
}

fn parse_distance(name: &str) -> Option<Distance> {
    match name {
        "Cosine" => Some(Distance::Cosine),
        "Dot" => Some(Distance::Dot),
        "Euclid" => Some(Distance::Euclid),
        _ => None,
    }
}

fn distance_type(distance: Distance) -> DistanceType {
    match distance {
        Distance::Cosine => DistanceType::Cosine,
        Distance::Dot => DistanceType::Dot,
        Distance::Euclid => DistanceType::L2,
    }
}

/// LanceDB reports distances (lower is closer); turn them into scores
fn distance_to_score(distance: Distance, raw: f32) -> f32 {
    match distance {
        Distance::Cosine | Distance::Dot => 1.0 - raw,
        // L2 distances come back squared
        Distance::Euclid => -raw.max(0.0).sqrt(),
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.table_names().await?.iter().any(|name| name == collection))
    }

    async fn create_collection(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<CreateOutcome> {
        if self.collection_exists(collection).await? {
            return Ok(CreateOutcome::AlreadyExists);
        }

        let schema = Self::create_schema(dimension, distance);
        match self
            .connection
            .create_empty_table(collection, schema)
            .execute()
            .await
        {
            Ok(_) => {}
            Err(lancedb::Error::TableAlreadyExists { .. }) => {
                return Ok(CreateOutcome::AlreadyExists);
            }
            Err(e) => {
                return Err(ChatError::Database(format!("Failed to create table: {}", e)));
            }
        }

        if let Ok(mut map) = self.distances.lock() {
            map.insert(collection.to_string(), distance);
        }

        info!(
            "Created table {} with {} dimensions ({})",
            collection, dimension, distance
        );
        Ok(CreateOutcome::Created)
    }

    async fn upload_points(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()> {
        if points.is_empty() {
            debug!("No points to store");
            return Ok(());
        }

        let table = self.open_table(collection).await?;
        let (dimension, distance) = self.table_layout(&table).await?;
        let record_batch = Self::create_record_batch(&points, dimension, distance)?;

        // Upsert by id: drop rows that are about to be rewritten
        let ids = points
            .iter()
            .map(|point| point.id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        table
            .delete(&format!("id IN ({})", ids))
            .await
            .map_err(|e| ChatError::Database(format!("Failed to replace points: {}", e)))?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| ChatError::Database(format!("Failed to insert points: {}", e)))?;

        info!("Stored {} points in {}", points.len(), collection);
        Ok(())
    }

    async fn query_points(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let table = self.open_table(collection).await?;

        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| ChatError::Database(format!("Failed to count rows: {}", e)))?;
        if rows == 0 {
            debug!("Table {} is empty, skipping search", collection);
            return Ok(Vec::new());
        }

        let (dimension, distance) = self.table_layout(&table).await?;
        if vector.len() != dimension {
            return Err(ChatError::Database(format!(
                "Query has {} dimensions, table {} expects {}",
                vector.len(),
                collection,
                dimension
            )));
        }

        let mut results = table
            .vector_search(vector)
            .map_err(|e| ChatError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(distance_type(distance))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| ChatError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| ChatError::Database(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(Self::parse_search_batch(&batch, distance)?);
        }

        // Brute-force search returns distance order; make equal scores deterministic
        hits.sort_by(|a: &ScoredPoint, b: &ScoredPoint| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });

        debug!("Search in {} returned {} hits", collection, hits.len());
        Ok(hits)
    }

    async fn count_points(&self, collection: &str) -> Result<u64> {
        let table = self.open_table(collection).await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| ChatError::Database(format!("Failed to count rows: {}", e)))?;
        Ok(count as u64)
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        if !self.collection_exists(collection).await? {
            return Ok(());
        }

        self.connection
            .drop_table(collection)
            .await
            .map_err(|e| ChatError::Database(format!("Failed to drop table: {}", e)))?;

        if let Ok(mut map) = self.distances.lock() {
            map.remove(collection);
        }

        info!("Dropped table {}", collection);
        Ok(())
    }
}
