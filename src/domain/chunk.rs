use serde::{Deserialize, Serialize};

/// The atomic retrievable unit: a fragment of scientific-document text plus
/// its bibliographic metadata.
///
/// `id` is globally unique and keys the vector store; re-uploading the same
/// `id` overwrites the stored record. The embedding vector is derived from
/// `text` alone and is recomputed whenever the chunk is re-ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_doc_id: String,
    pub chunk_index: i64,
    pub section_heading: String,
    pub journal: String,
    pub publish_year: i64,
    /// Informational seed value from the publisher; distinct from the live
    /// counters kept by the usage tracker.
    pub usage_count: i64,
    pub attributes: Vec<String>,
    pub link: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

/// A chunk returned from similarity search, with its normalized score.
/// Score is in [0,1]; 1.0 means the query vector matched exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub score: f32,
}

/// Response for a similarity search: the hits plus an echo of the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    pub query: String,
}

/// Metadata for a virtual document, derived from its first chunk and the
/// member count. No separate document record is stored anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source_doc_id: String,
    pub journal: String,
    pub publish_year: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    pub total_chunks: usize,
}

/// The set of all chunks sharing a `source_doc_id`, in `chunk_index` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source_doc_id: String,
    pub journal: String,
    pub publish_year: i64,
    pub total_chunks: usize,
    pub chunks: Vec<Chunk>,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Builds the virtual aggregate from a non-empty, `chunk_index`-ordered
    /// chunk list. Returns None for an empty list; the caller decides
    /// whether that is a not-found condition.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Option<Self> {
        let first = chunks.first()?;
        let metadata = DocumentMetadata {
            source_doc_id: first.source_doc_id.clone(),
            journal: first.journal.clone(),
            publish_year: first.publish_year,
            doi: first.doi.clone(),
            total_chunks: chunks.len(),
        };
        Some(Self {
            source_doc_id: first.source_doc_id.clone(),
            journal: first.journal.clone(),
            publish_year: first.publish_year,
            total_chunks: chunks.len(),
            chunks,
            metadata,
        })
    }
}

/// Acknowledgement returned as soon as an ingestion request is accepted.
/// Embedding and indexing continue in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub message: String,
    pub chunks_accepted: usize,
    pub status: String,
}

impl IngestReceipt {
    pub fn accepted(chunks_accepted: usize) -> Self {
        Self {
            message: "chunks accepted for processing".to_string(),
            chunks_accepted,
            status: "accepted".to_string(),
        }
    }
}

/// Aggregate statistics for the vector collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_chunks: u64,
    pub collection_name: String,
}

/// One side of a comparison: the document's identity plus its generated
/// summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperSummary {
    pub source_doc_id: String,
    pub journal: String,
    pub publish_year: i64,
    pub summary: String,
}

/// Echo of a comparison request and the model that served it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRequestInfo {
    pub source_doc_id_1: String,
    pub source_doc_id_2: String,
    pub model_used: String,
}

/// Full result of the cross-document comparison workflow. Either every field
/// is populated or the whole call failed; there is no half-filled variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub paper1_summary: PaperSummary,
    pub paper2_summary: PaperSummary,
    pub comparison: String,
    pub request_info: ComparisonRequestInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, doc: &str, index: i64) -> Chunk {
        Chunk {
            id: id.to_string(),
            source_doc_id: doc.to_string(),
            chunk_index: index,
            section_heading: "Introduction".to_string(),
            journal: "Journal of Tests".to_string(),
            publish_year: 2021,
            usage_count: 0,
            attributes: vec!["agronomy".to_string()],
            link: "https://example.org/paper".to_string(),
            text: "velvet bean is a legume".to_string(),
            doi: None,
        }
    }

    #[test]
    fn document_metadata_comes_from_first_chunk() {
        let mut c0 = chunk("c0", "docA", 0);
        c0.doi = Some("10.1000/xyz".to_string());
        let doc = Document::from_chunks(vec![c0, chunk("c1", "docA", 1)]).unwrap();
        assert_eq!(doc.total_chunks, 2);
        assert_eq!(doc.metadata.doi.as_deref(), Some("10.1000/xyz"));
        assert_eq!(doc.metadata.total_chunks, 2);
        assert_eq!(doc.source_doc_id, "docA");
    }

    #[test]
    fn document_from_empty_is_none() {
        assert!(Document::from_chunks(Vec::new()).is_none());
    }

    #[test]
    fn chunk_serde_roundtrip_omits_absent_doi() {
        let c = chunk("c0", "docA", 0);
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("doi").is_none());
        let back: Chunk = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn search_result_flattens_chunk_fields() {
        let r = SearchResult {
            chunk: chunk("c0", "docA", 0),
            score: 0.83,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["id"], "c0");
        assert!((json["score"].as_f64().unwrap() - 0.83).abs() < 1e-6);
    }
}
