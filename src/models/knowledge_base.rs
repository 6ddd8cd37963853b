use serde::{Deserialize, Serialize};

pub const DEFAULT_INDEX_DESCRIPTION: &str = "File indexed for search and retrieval";
pub const FALLBACK_CONTENT_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingParams {
    pub embedding_model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkerParams {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub chunker_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingParams {
    pub ocr: bool,
    pub unstructured: bool,
    pub embedding_params: EmbeddingParams,
    pub chunker_params: ChunkerParams,
}

impl Default for IndexingParams {
    fn default() -> Self {
        Self {
            ocr: false,
            unstructured: true,
            embedding_params: EmbeddingParams {
                embedding_model: "text-embedding-ada-002".to_string(),
            },
            chunker_params: ChunkerParams {
                chunk_size: 1500,
                chunk_overlap: 500,
                chunker_type: "sentence".to_string(),
            },
        }
    }
}

/// Arguments of a create-or-extend call against the indexing service.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRequest {
    pub connection_id: String,
    pub resource_ids: Vec<String>,
    pub name: String,
    pub description: String,
    pub org_id: String,
    pub content_mime: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateKnowledgeBaseBody<'a> {
    pub connection_id: &'a str,
    pub connection_source_ids: &'a [String],
    pub name: &'a str,
    pub description: &'a str,
    pub org_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_mime: Option<&'a str>,
    pub indexing_params: &'a IndexingParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseRef {
    pub knowledge_base_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    pub name: String,
}
