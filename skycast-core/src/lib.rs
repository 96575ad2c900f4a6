//! Core library for the SkyCast weather dashboard.
//!
//! SkyCast has no weather API behind it: every number is synthesized by a
//! generative model. What this crate actually owns is the request
//! orchestration around that model:
//! - A persistent snapshot cache with a stale-while-revalidate policy
//! - In-flight deduplication of concurrent fetches for the same city
//! - Resilient invocation with exponential backoff against rate limits
//! - Normalization of the model's loose JSON into a typed weather model
//! - Historical/prediction series fetchers and the conversational assistant
//!
//! It is used by `skycast-cli`, but can also be reused by other front ends.

pub mod cache;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod inflight;
pub mod model;
pub mod normalize;
pub mod prompts;
pub mod retry;
pub mod service;

pub use cache::{FileStore, KeyValueStore, MemoryStore, SnapshotCache};
pub use chat::Assistant;
pub use client::gemini::GeminiClient;
pub use client::{GenerateReply, GenerateRequest, ModelClient};
pub use config::Config;
pub use error::WeatherError;
pub use inflight::InflightRegistry;
pub use model::{
    AnalysisParameter, AnalysisPoint, AssistantReply, CacheEntry, ChatMessage, ChatRole,
    ForecastDay, HourlyForecast, Resolution, SourceRef, WeatherSnapshot,
};
pub use retry::RetryPolicy;
pub use service::WeatherService;
