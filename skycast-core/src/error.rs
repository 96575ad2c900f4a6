use thiserror::Error;

/// Error taxonomy for the fetch/cache/retry core.
///
/// Cloneable on purpose: the in-flight registry broadcasts a fetch outcome to
/// every caller that joined the same request, so both arms of the `Result`
/// must be `Clone`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WeatherError {
    /// Empty or whitespace-only city name, rejected before any I/O.
    #[error("city name is required")]
    InvalidInput,

    /// The model service replied HTTP 429.
    #[error("model service rate limited (HTTP {status})")]
    RateLimited { status: u16 },

    /// The model service replied HTTP 500/503.
    #[error("model service overloaded (HTTP {status})")]
    ServiceUnavailable { status: u16 },

    /// Transport failure, non-retryable status, or a transient failure that
    /// survived the full retry budget.
    #[error("weather fetch failed: {0}")]
    FetchFailed(String),

    /// The model's response body did not match the expected structure.
    #[error("could not parse model response: {0}")]
    ParseFailed(String),
}

impl WeatherError {
    /// Classify an HTTP status from the model service.
    ///
    /// Everything outside 429/500/503 is treated as non-retryable.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 => WeatherError::RateLimited { status },
            500 | 503 => WeatherError::ServiceUnavailable { status },
            _ => WeatherError::FetchFailed(format!(
                "model request failed with status {status}: {}",
                truncate_body(body)
            )),
        }
    }

    /// Whether the retry wrapper may re-attempt after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WeatherError::RateLimited { .. } | WeatherError::ServiceUnavailable { .. }
        )
    }

    /// Collapse a retry-exhausted transient error into the category the
    /// orchestrator surfaces, keeping the cause in the message.
    pub(crate) fn into_exhausted(self) -> Self {
        if self.is_transient() {
            WeatherError::FetchFailed(self.to_string())
        } else {
            self
        }
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    // Walk back to a char boundary so multi-byte bodies don't split mid-char.
    let cut = (0..=MAX).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
    format!("{}...", &body[..cut])
}
