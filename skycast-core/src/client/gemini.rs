use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    client::{FunctionCall, GenerateReply, GenerateRequest, ModelClient},
    error::WeatherError,
    model::SourceRef,
};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Model used for every call unless overridden in config.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// [`ModelClient`] implementation over the Gemini `generateContent` REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    http: Client,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL.to_string())
    }

    pub fn with_model(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            http: Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{GEMINI_API_BASE}/{}:generateContent", self.model)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateReply, WeatherError> {
        let body = GeminiRequest::from(request);

        let res = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| WeatherError::FetchFailed(format!("request to Gemini failed: {e}")))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| WeatherError::FetchFailed(format!("failed to read Gemini response: {e}")))?;

        if !status.is_success() {
            return Err(WeatherError::from_status(status.as_u16(), &text));
        }

        let parsed: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| WeatherError::ParseFailed(format!("Gemini response envelope: {e}")))?;

        let reply = parsed.into_reply();
        debug!(
            model = %self.model,
            text_len = reply.text.len(),
            sources = reply.sources.len(),
            function_calls = reply.function_calls.len(),
            "gemini call succeeded"
        );

        Ok(reply)
    }
}

// --- Request wire types ---------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_declarations: Option<Vec<WireFunctionDecl>>,
}

#[derive(Debug, Serialize)]
struct WireFunctionDecl {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

impl From<&GenerateRequest> for GeminiRequest {
    fn from(request: &GenerateRequest) -> Self {
        let contents = request
            .messages
            .iter()
            .map(|m| Content {
                role: Some(m.role.as_str().to_string()),
                parts: vec![Part {
                    text: Some(m.text.clone()),
                    ..Part::default()
                }],
            })
            .collect();

        let system_instruction = request.system.as_ref().map(|s| Content {
            role: None,
            parts: vec![Part {
                text: Some(s.clone()),
                ..Part::default()
            }],
        });

        let mut tools = Vec::new();
        if request.search_grounding {
            tools.push(Tool {
                google_search: Some(serde_json::json!({})),
                function_declarations: None,
            });
        }
        if !request.functions.is_empty() {
            tools.push(Tool {
                google_search: None,
                function_declarations: Some(
                    request
                        .functions
                        .iter()
                        .map(|f| WireFunctionDecl {
                            name: f.name.clone(),
                            description: f.description.clone(),
                            parameters: f.parameters.clone(),
                        })
                        .collect(),
                ),
            });
        }

        let generation_config = request.json_response.then_some(GenerationConfig {
            response_mime_type: "application/json",
        });

        Self {
            contents,
            system_instruction,
            tools,
            generation_config,
        }
    }
}

// --- Response wire types --------------------------------------------------

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

impl GeminiResponse {
    fn into_reply(self) -> GenerateReply {
        let mut reply = GenerateReply::default();

        let Some(candidate) = self.candidates.into_iter().next() else {
            return reply;
        };

        if let Some(content) = candidate.content {
            for part in content.parts {
                if let Some(text) = part.text {
                    reply.text.push_str(&text);
                }
                if let Some(call) = part.function_call {
                    reply.function_calls.push(FunctionCall {
                        name: call.name,
                        args: call.args,
                    });
                }
            }
        }

        if let Some(grounding) = candidate.grounding_metadata {
            reply.sources = grounding
                .grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .map(|web| SourceRef {
                    uri: web.uri,
                    title: web.title,
                })
                .collect();
        }

        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FunctionDecl, PromptMessage};

    #[test]
    fn request_serializes_tools_and_mime_type() {
        let request = GenerateRequest {
            messages: vec![PromptMessage::user("weather please")],
            system: Some("be terse".into()),
            json_response: true,
            search_grounding: true,
            functions: vec![],
        };

        let wire = GeminiRequest::from(&request);
        let json = serde_json::to_value(&wire).expect("serialize");

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "weather please");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be terse");
        assert!(json["tools"][0]["googleSearch"].is_object());
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn request_serializes_function_declarations() {
        let request = GenerateRequest {
            messages: vec![PromptMessage::user("hi")],
            functions: vec![FunctionDecl {
                name: "update_city_dashboard".into(),
                description: "switch city".into(),
                parameters: serde_json::json!({ "type": "object" }),
            }],
            ..GenerateRequest::default()
        };

        let json = serde_json::to_value(GeminiRequest::from(&request)).expect("serialize");
        assert_eq!(
            json["tools"][0]["functionDeclarations"][0]["name"],
            "update_city_dashboard"
        );
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn response_maps_text_sources_and_calls() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "{\"city\":\"Paris\"}" },
                        { "functionCall": { "name": "update_city_dashboard", "args": { "city": "Lyon" } } }
                    ]
                },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://example.com", "title": "Example" } },
                        { }
                    ]
                }
            }]
        });

        let parsed: GeminiResponse = serde_json::from_value(raw).expect("parse");
        let reply = parsed.into_reply();

        assert_eq!(reply.text, "{\"city\":\"Paris\"}");
        assert_eq!(reply.sources.len(), 1);
        assert_eq!(reply.sources[0].uri, "https://example.com");
        assert_eq!(reply.function_calls.len(), 1);
        assert_eq!(reply.function_calls[0].arg_str("city"), Some("Lyon"));
    }

    #[test]
    fn empty_candidates_yield_empty_reply() {
        let parsed: GeminiResponse =
            serde_json::from_str("{}").expect("empty envelope should parse");
        let reply = parsed.into_reply();
        assert!(reply.text.is_empty());
        assert!(reply.sources.is_empty());
        assert!(reply.function_calls.is_empty());
    }
}
