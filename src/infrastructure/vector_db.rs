use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind as QdrantValueKind, Condition, CountPointsBuilder, CreateCollectionBuilder,
    Distance, Filter, PointId, PointStruct, ScrollPointsBuilder, SearchPoints, VectorParams,
    Vectors, WithPayloadSelector, WithVectorsSelector,
};
use qdrant_client::qdrant::UpsertPointsBuilder;
use qdrant_client::{Payload, Qdrant};
use uuid::Uuid;

use crate::domain::chunk::{Chunk, IndexStats, SearchResult};
use crate::domain::error::Error;
use crate::domain::vector_repository::VectorRepository;

/// Hard ceiling on search result count; requested `k` is clamped into
/// [1, MAX_K] rather than rejected.
pub const MAX_K: usize = 100;

const SCROLL_PAGE_SIZE: u32 = 256;

/// Qdrant-backed vector index. Owns chunk persistence exclusively: vectors
/// plus the full chunk record as point payload, keyed by a deterministic
/// UUIDv5 of the chunk `id` so re-uploads overwrite in place.
pub struct QdrantVectorIndex {
    client: Qdrant,
    collection_name: String,
    vector_size: u64,
}

impl QdrantVectorIndex {
    pub fn new(client: Qdrant, collection_name: String, vector_size: u64) -> Result<Self, Error> {
        if collection_name.is_empty() {
            return Err(Error::StoreUnavailable(
                "collection name cannot be empty".to_string(),
            ));
        }
        if vector_size == 0 {
            return Err(Error::StoreUnavailable(
                "vector size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            client,
            collection_name,
            vector_size,
        })
    }

    /// Creates the collection if it does not exist yet. Distance is Euclid;
    /// scores are derived from it on the way out.
    pub async fn initialize_collection(&self) -> Result<(), Error> {
        match self.client.collection_info(&self.collection_name).await {
            Ok(_) => {
                log::info!("Collection '{}' already exists.", self.collection_name);
                Ok(())
            }
            Err(e) => {
                log::warn!(
                    "Collection '{}' not found ({}). Creating...",
                    self.collection_name,
                    e
                );
                self.create_collection().await
            }
        }
    }

    async fn create_collection(&self) -> Result<(), Error> {
        let vector_params = VectorParams {
            size: self.vector_size,
            distance: Distance::Euclid.into(),
            hnsw_config: None,
            quantization_config: None,
            on_disk: None,
            multivector_config: None,
            datatype: None,
            memory: None,
        };
        let create = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(vector_params);

        self.client.create_collection(create).await.map_err(|e| {
            Error::StoreUnavailable(format!(
                "failed to create collection '{}': {}",
                self.collection_name, e
            ))
        })?;
        log::info!(
            "Created collection '{}' (dim {}, Euclid).",
            self.collection_name,
            self.vector_size
        );
        Ok(())
    }

    /// Stable point id for a chunk: UUIDv5 of the chunk id, so the same
    /// chunk id always maps to the same point and last write wins.
    fn point_id_for(chunk_id: &str) -> PointId {
        PointId::from(Uuid::new_v5(&Uuid::NAMESPACE_URL, chunk_id.as_bytes()).to_string())
    }
}

#[async_trait]
impl VectorRepository for QdrantVectorIndex {
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), Error> {
        if chunks.len() != vectors.len() {
            return Err(Error::BadRequest(format!(
                "got {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if chunks.is_empty() {
            log::info!("No chunks provided for upsert.");
            return Ok(());
        }

        let mut points = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            if vector.len() as u64 != self.vector_size {
                return Err(Error::DimensionMismatch {
                    expected: self.vector_size as usize,
                    actual: vector.len(),
                });
            }
            let payload_value = serde_json::to_value(chunk)
                .map_err(|e| Error::StoreUnavailable(format!("payload serialization: {}", e)))?;
            let payload = Payload::try_from(payload_value)
                .map_err(|e| Error::StoreUnavailable(format!("payload conversion: {}", e)))?;
            points.push(PointStruct {
                id: Some(Self::point_id_for(&chunk.id)),
                vectors: Some(Vectors::from(vector.clone())),
                payload: payload.into(),
            });
        }

        log::info!(
            "Upserting {} points into collection '{}'...",
            points.len(),
            self.collection_name
        );
        let upsert = UpsertPointsBuilder::new(self.collection_name.clone(), points).wait(true);
        self.client.upsert_points(upsert).await.map_err(|e| {
            Error::StoreUnavailable(format!(
                "upsert into '{}' failed: {}",
                self.collection_name, e
            ))
        })?;
        Ok(())
    }

    async fn query(
        &self,
        query_vector: Vec<f32>,
        k: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>, Error> {
        if query_vector.len() as u64 != self.vector_size {
            return Err(Error::DimensionMismatch {
                expected: self.vector_size as usize,
                actual: query_vector.len(),
            });
        }

        let k = clamp_k(k);
        let search_request = SearchPoints {
            collection_name: self.collection_name.clone(),
            vector: query_vector,
            limit: k as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(
                    qdrant_client::qdrant::with_payload_selector::SelectorOptions::Enable(true),
                ),
            }),
            with_vectors: Some(WithVectorsSelector {
                selector_options: Some(
                    qdrant_client::qdrant::with_vectors_selector::SelectorOptions::Enable(false),
                ),
            }),
            ..Default::default()
        };

        let response = self.client.search_points(search_request).await.map_err(|e| {
            Error::StoreUnavailable(format!(
                "search in '{}' failed: {}",
                self.collection_name, e
            ))
        })?;

        let mut results: Vec<SearchResult> = response
            .result
            .into_iter()
            .filter_map(|scored| {
                let chunk = payload_to_chunk(scored.payload)?;
                // With Euclid distance the raw score is the distance itself.
                Some(SearchResult {
                    chunk,
                    score: normalize_score(scored.score),
                })
            })
            .collect();

        rank_results(&mut results, k, min_score);
        Ok(results)
    }

    async fn get_by_document(&self, source_doc_id: &str) -> Result<Vec<Chunk>, Error> {
        let filter = Filter::must([Condition::matches(
            "source_doc_id",
            source_doc_id.to_string(),
        )]);

        let mut chunks = Vec::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut scroll = ScrollPointsBuilder::new(self.collection_name.clone())
                .filter(filter.clone())
                .limit(SCROLL_PAGE_SIZE)
                .with_payload(true)
                .with_vectors(false);
            if let Some(next) = offset.take() {
                scroll = scroll.offset(next);
            }

            let response = self.client.scroll(scroll).await.map_err(|e| {
                Error::StoreUnavailable(format!(
                    "scroll in '{}' failed: {}",
                    self.collection_name, e
                ))
            })?;

            for point in response.result {
                if let Some(chunk) = payload_to_chunk(point.payload) {
                    chunks.push(chunk);
                } else {
                    log::warn!("Skipping point with undecodable payload: {:?}", point.id);
                }
            }

            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        chunks.sort_by(|a, b| a.chunk_index.cmp(&b.chunk_index));
        Ok(chunks)
    }

    async fn stats(&self) -> Result<IndexStats, Error> {
        let response = self
            .client
            .count(CountPointsBuilder::new(self.collection_name.clone()).exact(true))
            .await
            .map_err(|e| {
                Error::StoreUnavailable(format!(
                    "count in '{}' failed: {}",
                    self.collection_name, e
                ))
            })?;
        Ok(IndexStats {
            total_chunks: response.result.map(|r| r.count).unwrap_or(0),
            collection_name: self.collection_name.clone(),
        })
    }
}

/// Clamps a requested result count into [1, MAX_K]. Out-of-range requests
/// are permissive, not errors.
pub fn clamp_k(k: usize) -> usize {
    k.clamp(1, MAX_K)
}

/// Euclidean distance → similarity score in [0,1]: distance 0 maps to 1.0
/// and the mapping decreases monotonically, never going negative.
pub fn normalize_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Applies the public ordering contract: `min_score` filter, descending
/// score with ties broken by ascending chunk id, truncated to `k`.
pub fn rank_results(results: &mut Vec<SearchResult>, k: usize, min_score: f32) {
    results.retain(|r| r.score >= min_score);
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    results.truncate(k);
}

/// Rebuilds the chunk record from a Qdrant point payload. Returns None when
/// the payload does not decode; callers log and skip such points.
fn payload_to_chunk(payload: HashMap<String, qdrant_client::qdrant::Value>) -> Option<Chunk> {
    if payload.is_empty() {
        return None;
    }
    let json = serde_json::Value::Object(
        payload
            .into_iter()
            .map(|(key, value)| (key, qdrant_value_to_json(value)))
            .collect(),
    );
    serde_json::from_value(json).ok()
}

fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    match value.kind {
        Some(QdrantValueKind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(QdrantValueKind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(QdrantValueKind::IntegerValue(i)) => serde_json::Value::Number(i.into()),
        Some(QdrantValueKind::StringValue(s)) => serde_json::Value::String(s),
        Some(QdrantValueKind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(qdrant_value_to_json).collect())
        }
        Some(QdrantValueKind::StructValue(fields)) => serde_json::Value::Object(
            fields
                .fields
                .into_iter()
                .map(|(key, value)| (key, qdrant_value_to_json(value)))
                .collect(),
        ),
        Some(QdrantValueKind::NullValue(_)) | None => serde_json::Value::Null,
    }
}
