use std::sync::Arc;

use tracing::warn;

use crate::{
    client::ModelClient,
    error::WeatherError,
    model::{AssistantReply, ChatMessage, WeatherSnapshot},
    prompts,
    retry::{call_with_resilience, RetryPolicy},
};

/// User-facing reply when the rate-limit budget is exhausted.
pub const HEAVY_TRAFFIC_REPLY: &str =
    "I'm experiencing heavy traffic (API Quota Reached). Please wait a moment before asking again.";

const GENERIC_ERROR_REPLY: &str = "I encountered an error. Please try again later.";

/// Conversational weather assistant.
///
/// Never fails: every error collapses into a user-facing reply, with the
/// rate-limit case getting its own message. A model tool call requesting a
/// different city surfaces as `city_to_update` for the dashboard to act on.
#[derive(Debug, Clone)]
pub struct Assistant {
    client: Arc<dyn ModelClient>,
    retry: RetryPolicy,
}

impl Assistant {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::bounded(),
        }
    }

    /// Override the retry budget, mainly for tests.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn reply(
        &self,
        history: &[ChatMessage],
        weather: Option<&WeatherSnapshot>,
    ) -> AssistantReply {
        let request = prompts::assistant_request(history, weather);

        let result = call_with_resilience(&self.retry, || self.client.generate(&request)).await;

        match result {
            Ok(reply) => {
                let city_to_update = reply
                    .function_calls
                    .iter()
                    .find(|call| call.name == prompts::UPDATE_CITY_TOOL)
                    .and_then(|call| call.arg_str("city"))
                    .map(str::to_string);

                let text = if !reply.text.is_empty() {
                    reply.text
                } else if let Some(city) = &city_to_update {
                    format!("Searching for {city}...")
                } else {
                    "I'm analyzing the data...".to_string()
                };

                AssistantReply {
                    text,
                    sources: reply.sources,
                    city_to_update,
                }
            }
            Err(WeatherError::RateLimited { .. }) => AssistantReply {
                text: HEAVY_TRAFFIC_REPLY.to_string(),
                sources: Vec::new(),
                city_to_update: None,
            },
            Err(err) => {
                warn!(%err, "assistant call failed");
                AssistantReply {
                    text: GENERIC_ERROR_REPLY.to_string(),
                    sources: Vec::new(),
                    city_to_update: None,
                }
            }
        }
    }
}
