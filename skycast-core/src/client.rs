use crate::{error::WeatherError, model::SourceRef};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod gemini;

/// Role of a message sent to the generative model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    User,
    Model,
}

impl PromptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptRole::User => "user",
            PromptRole::Model => "model",
        }
    }
}

/// One turn of the conversation handed to the model.
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub text: String,
}

impl PromptMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Model,
            text: text.into(),
        }
    }
}

/// Tool the model may invoke instead of (or alongside) answering in text.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool arguments.
    pub parameters: serde_json::Value,
}

/// A structured tool invocation returned by the model.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub args: serde_json::Value,
}

impl FunctionCall {
    /// String argument by name, if present.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }
}

/// A single request to the generative model.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub messages: Vec<PromptMessage>,
    pub system: Option<String>,
    /// Ask the model to reply with a JSON body.
    pub json_response: bool,
    /// Enable search grounding; mutually exclusive with `functions` on the
    /// Gemini API, the caller picks one.
    pub search_grounding: bool,
    pub functions: Vec<FunctionDecl>,
}

impl GenerateRequest {
    /// Single-turn request from one user prompt.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![PromptMessage::user(prompt)],
            ..Self::default()
        }
    }
}

/// What came back from the model: text, grounding citations, tool calls.
#[derive(Debug, Clone, Default)]
pub struct GenerateReply {
    pub text: String,
    pub sources: Vec<SourceRef>,
    pub function_calls: Vec<FunctionCall>,
}

/// Seam between the orchestration core and the external generative model.
///
/// Production code uses [`gemini::GeminiClient`]; tests substitute scripted
/// implementations.
#[async_trait]
pub trait ModelClient: Send + Sync + Debug {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateReply, WeatherError>;
}
