use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Server health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    pub status: String,
}

/// Kind of model served by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Llm,
    Embedding,
    #[serde(untagged)]
    Other(String),
}

impl ModelType {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "llm" => Some(ModelType::Llm),
            "embedding" => Some(ModelType::Embedding),
            "" | "model" => None,
            other => Some(ModelType::Other(other.to_string())),
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::Llm => write!(f, "llm"),
            ModelType::Embedding => write!(f, "embedding"),
            ModelType::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Wire shape of a catalog entry. Servers disagree on field names, so every
/// known spelling is accepted here and folded into [`ModelInfo`].
#[derive(Deserialize)]
struct WireModel {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    model_type: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    provider_id: Option<String>,
    #[serde(default)]
    custom_metadata: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    metadata: Option<HashMap<String, serde_json::Value>>,
}

/// A model in the platform catalog.
///
/// `identifier` is required and read from `identifier`, `id` or `model_id`,
/// first match wins. `model_type` is read from `model_type`, then
/// `custom_metadata.model_type`, then `metadata.model_type`, then `type`
/// (ignoring the generic object kind `"model"`); a model that declares none of
/// these is treated as an LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireModelValue")]
pub struct ModelInfo {
    pub identifier: String,
    pub model_type: ModelType,
    pub provider_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct WireModelValue(serde_json::Value);

impl TryFrom<WireModelValue> for ModelInfo {
    type Error = String;

    fn try_from(value: WireModelValue) -> Result<Self, Self::Error> {
        let wire: WireModel = serde_json::from_value(value.0).map_err(|e| e.to_string())?;

        let identifier = wire
            .identifier
            .or(wire.id)
            .or(wire.model_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "model entry has no identifier".to_string())?;

        let metadata_type = |map: &Option<HashMap<String, serde_json::Value>>| {
            map.as_ref()
                .and_then(|m| m.get("model_type").or_else(|| m.get("type")))
                .and_then(|v| v.as_str())
                .and_then(ModelType::parse)
        };

        let model_type = wire
            .model_type
            .as_deref()
            .and_then(ModelType::parse)
            .or_else(|| metadata_type(&wire.custom_metadata))
            .or_else(|| metadata_type(&wire.metadata))
            .or_else(|| wire.kind.as_deref().and_then(ModelType::parse))
            .unwrap_or(ModelType::Llm);

        let provider_id = wire.provider_id.or_else(|| {
            wire.custom_metadata
                .as_ref()
                .and_then(|m| m.get("provider_id"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });

        Ok(Self {
            identifier,
            model_type,
            provider_id,
        })
    }
}

impl ModelInfo {
    /// Decode one catalog entry
    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        Self::try_from(WireModelValue(value))
    }

    pub fn is_llm(&self) -> bool {
        self.model_type == ModelType::Llm
    }

    /// LLMs usable for chat; safety-guard models are excluded
    pub fn is_chat_candidate(&self) -> bool {
        self.is_llm() && !self.identifier.contains("guard")
    }

    pub fn is_embedding(&self) -> bool {
        let id = self.identifier.to_lowercase();
        self.model_type == ModelType::Embedding || id.contains("embed")
    }
}

/// A provider registered with the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub api: String,
    pub provider_id: String,
    #[serde(default)]
    pub provider_type: String,
}

impl ProviderInfo {
    pub fn is_vector_io(&self) -> bool {
        self.api == "vector_io"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: String,
    pub choices: Vec<ChatChoice>,
}

impl ChatCompletion {
    /// Content of the first choice, if any
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod model_info {
        use super::*;

        #[test]
        fn reads_identifier_and_model_type() {
            let model = ModelInfo::from_value(json!({
                "identifier": "llama3.2:3b",
                "provider_id": "ollama",
                "type": "model",
                "model_type": "llm"
            }))
            .unwrap();
            assert_eq!(model.identifier, "llama3.2:3b");
            assert_eq!(model.model_type, ModelType::Llm);
            assert_eq!(model.provider_id.as_deref(), Some("ollama"));
        }

        #[test]
        fn falls_back_to_id_and_custom_metadata() {
            let model = ModelInfo::from_value(json!({
                "id": "sentence-transformers/all-MiniLM-L6-v2",
                "object": "model",
                "custom_metadata": {
                    "model_type": "embedding",
                    "provider_id": "sentence-transformers"
                }
            }))
            .unwrap();
            assert_eq!(model.identifier, "sentence-transformers/all-MiniLM-L6-v2");
            assert_eq!(model.model_type, ModelType::Embedding);
            assert_eq!(
                model.provider_id.as_deref(),
                Some("sentence-transformers")
            );
        }

        #[test]
        fn generic_object_type_is_not_a_model_type() {
            let model = ModelInfo::from_value(json!({"identifier": "m", "type": "model"})).unwrap();
            assert_eq!(model.model_type, ModelType::Llm);
        }

        #[test]
        fn missing_type_defaults_to_llm() {
            let model = ModelInfo::from_value(json!({"model_id": "plain"})).unwrap();
            assert_eq!(model.identifier, "plain");
            assert!(model.is_llm());
        }

        #[test]
        fn unknown_type_is_preserved() {
            let model =
                ModelInfo::from_value(json!({"id": "reranker", "model_type": "rerank"})).unwrap();
            assert_eq!(model.model_type, ModelType::Other("rerank".to_string()));
            assert!(!model.is_llm());
        }

        #[test]
        fn missing_identifier_is_rejected() {
            let err = ModelInfo::from_value(json!({"model_type": "llm"})).unwrap_err();
            assert!(err.contains("no identifier"));
        }

        #[test]
        fn guard_models_are_not_chat_candidates() {
            let model =
                ModelInfo::from_value(json!({"id": "llama-guard-3", "model_type": "llm"})).unwrap();
            assert!(model.is_llm());
            assert!(!model.is_chat_candidate());
        }

        #[test]
        fn embedding_detected_by_name() {
            let model =
                ModelInfo::from_value(json!({"id": "nomic-embed-text", "model_type": "llm"}))
                    .unwrap();
            assert!(model.is_embedding());
        }
    }

    #[test]
    fn chat_request_omits_defaults() {
        let request = ChatRequest::new("m", vec![ChatMessage::user("hi")]);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({"model": "m", "messages": [{"role": "user", "content": "hi"}]})
        );
    }

    #[test]
    fn chat_request_includes_stream_and_max_tokens() {
        let mut request = ChatRequest::new("m", vec![ChatMessage::system("be brief")])
            .with_max_tokens(1);
        request.stream = true;
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["stream"], json!(true));
        assert_eq!(body["max_tokens"], json!(1));
        assert_eq!(body["messages"][0]["role"], json!("system"));
    }

    #[test]
    fn null_message_content_decodes_as_empty() {
        let message: ChatMessage =
            serde_json::from_value(json!({"role": "assistant", "content": null})).unwrap();
        assert_eq!(message.content, "");
    }

    #[test]
    fn completion_content_reads_first_choice() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello"}}]
        }))
        .unwrap();
        assert_eq!(completion.content(), Some("Hello"));
    }
}
