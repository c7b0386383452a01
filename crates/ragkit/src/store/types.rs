use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key-value attributes attached to a document for later filtering
pub type Attributes = HashMap<String, String>;

/// Opaque vector store identifier assigned by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(pub String);

/// Opaque uploaded-file identifier assigned by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(StoreId);
string_id!(FileId);

/// Parameters for creating a vector store
#[derive(Debug, Clone, Serialize)]
pub struct NewStore {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub embedding_model: String,
    pub embedding_dimension: usize,
}

impl NewStore {
    /// Generate a unique store name with the given prefix
    pub fn unique_name(prefix: &str) -> String {
        const ALPHABET: &[char] = &[
            '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j',
            'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
        ];
        format!("{}-{}", prefix, nanoid::nanoid!(10, ALPHABET))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("document '{0}' has no content")]
    Empty(String),

    #[error("document filename must not be empty")]
    MissingFilename,
}

/// Raw document content plus the filename it is uploaded under.
///
/// A `Document` never holds zero bytes; empty sources are rejected when the
/// document is built, before anything reaches the upload path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    filename: String,
    content: Vec<u8>,
}

impl Document {
    pub fn new(
        filename: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Result<Self, DocumentError> {
        let filename = filename.into();
        let content = content.into();
        if filename.trim().is_empty() {
            return Err(DocumentError::MissingFilename);
        }
        if content.is_empty() {
            return Err(DocumentError::Empty(filename));
        }
        Ok(Self { filename, content })
    }

    /// Build a document from inline UTF-8 text
    pub fn from_text(filename: impl Into<String>, text: &str) -> Result<Self, DocumentError> {
        Self::new(filename, text.as_bytes().to_vec())
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkingError {
    #[error("max_chunk_size_tokens must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk_overlap_tokens ({overlap}) must be smaller than max_chunk_size_tokens ({max})")]
    OverlapTooLarge { max: u32, overlap: u32 },
}

#[derive(Deserialize)]
struct RawChunkingConfig {
    max_chunk_size_tokens: u32,
    chunk_overlap_tokens: u32,
}

/// Static chunking parameters, validated on construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChunkingConfig")]
pub struct ChunkingConfig {
    max_chunk_size_tokens: u32,
    chunk_overlap_tokens: u32,
}

impl ChunkingConfig {
    pub fn new(max_chunk_size_tokens: u32, chunk_overlap_tokens: u32) -> Result<Self, ChunkingError> {
        if max_chunk_size_tokens == 0 {
            return Err(ChunkingError::ZeroChunkSize);
        }
        if chunk_overlap_tokens >= max_chunk_size_tokens {
            return Err(ChunkingError::OverlapTooLarge {
                max: max_chunk_size_tokens,
                overlap: chunk_overlap_tokens,
            });
        }
        Ok(Self {
            max_chunk_size_tokens,
            chunk_overlap_tokens,
        })
    }

    pub fn max_chunk_size_tokens(&self) -> u32 {
        self.max_chunk_size_tokens
    }

    pub fn chunk_overlap_tokens(&self) -> u32 {
        self.chunk_overlap_tokens
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size_tokens: 512,
            chunk_overlap_tokens: 64,
        }
    }
}

impl TryFrom<RawChunkingConfig> for ChunkingConfig {
    type Error = ChunkingError;

    fn try_from(raw: RawChunkingConfig) -> Result<Self, Self::Error> {
        Self::new(raw.max_chunk_size_tokens, raw.chunk_overlap_tokens)
    }
}

/// Lifecycle of a document attachment, driven by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl AttachmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttachmentStatus::Completed | AttachmentStatus::Failed | AttachmentStatus::Cancelled
        )
    }
}

impl std::fmt::Display for AttachmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttachmentStatus::Pending => "pending",
            AttachmentStatus::InProgress => "in_progress",
            AttachmentStatus::Completed => "completed",
            AttachmentStatus::Failed => "failed",
            AttachmentStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Attachment state as reported by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentState {
    pub status: AttachmentStatus,
    #[serde(default)]
    pub last_error: Option<AttachmentError>,
}

impl AttachmentState {
    pub fn new(status: AttachmentStatus) -> Self {
        Self {
            status,
            last_error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: AttachmentStatus::Failed,
            last_error: Some(AttachmentError {
                code: None,
                message: message.into(),
            }),
        }
    }
}

/// Equality filter on document attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub key: String,
    pub value: String,
}

/// A semantic query against a single store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub max_num_results: usize,
    pub filters: Vec<AttributeFilter>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, max_num_results: usize) -> Self {
        Self {
            query: query.into(),
            max_num_results,
            filters: Vec::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(AttributeFilter {
            key: key.into(),
            value: value.into(),
        });
        self
    }
}

/// One piece of matched content within a search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFragment {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ContentFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
        }
    }
}

/// A single search result entry, in the order the service ranked it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub file_id: String,
    pub filename: String,
    pub score: f64,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub content: Vec<ContentFragment>,
}

impl SearchHit {
    /// Non-empty text fragments, trimmed and joined with a single space
    pub fn snippet(&self) -> String {
        self.content
            .iter()
            .filter_map(|fragment| fragment.text.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
