use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};

use crate::{
    cache::{KeyValueStore, SnapshotCache},
    client::{GenerateRequest, ModelClient},
    error::WeatherError,
    inflight::{await_outcome, InflightRegistry, Ticket},
    model::{AnalysisParameter, AnalysisPoint, CacheEntry, Resolution, WeatherSnapshot},
    normalize,
    prompts,
    retry::{call_with_resilience, RetryPolicy},
};

/// Orchestrates weather fetches: cache policy, in-flight deduplication,
/// retry, normalization and persistence.
///
/// Cheap to clone; clones share the cache and the registry.
#[derive(Debug, Clone)]
pub struct WeatherService {
    client: Arc<dyn ModelClient>,
    cache: SnapshotCache,
    inflight: Arc<InflightRegistry>,
    fetch_retry: RetryPolicy,
    analysis_retry: RetryPolicy,
}

impl WeatherService {
    pub fn new(client: Arc<dyn ModelClient>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            client,
            cache: SnapshotCache::new(store),
            inflight: Arc::new(InflightRegistry::new()),
            fetch_retry: RetryPolicy::extended(),
            analysis_retry: RetryPolicy::bounded(),
        }
    }

    /// Override the retry budgets, mainly for tests.
    pub fn with_retry_policies(mut self, fetch: RetryPolicy, analysis: RetryPolicy) -> Self {
        self.fetch_retry = fetch;
        self.analysis_retry = analysis;
        self
    }

    /// Weather for `city`, per the stale-while-revalidate policy:
    ///
    /// 1. a fetch for the same key is already in flight: join it;
    /// 2. fresh cache entry: return it without any external call;
    /// 3. stale cache entry: return it immediately and revalidate in the
    ///    background;
    /// 4. no entry: fetch, blocking this caller.
    ///
    /// The cache/registry key is the trimmed, lowercased city name; the
    /// snapshot's own city field is whatever the model echoed back.
    pub async fn fetch(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        let display = city.trim();
        if display.is_empty() {
            return Err(WeatherError::InvalidInput);
        }
        let key = display.to_lowercase();

        if let Some(rx) = self.inflight.subscribe(&key) {
            debug!(key, "joining in-flight fetch");
            return await_outcome(rx).await;
        }

        if let Some(entry) = self.cache.load(&key) {
            if entry.is_fresh(now_ms()) {
                debug!(key, "serving fresh cache entry");
                return Ok(entry.data);
            }

            debug!(key, "serving stale cache entry, revalidating in background");
            self.refresh_in_background(display);
            return Ok(entry.data);
        }

        match self.inflight.begin(&key) {
            Ticket::Leader => {
                let outcome = self.fetch_remote(display, &key).await;
                // Entry must clear on success and failure alike, or the key
                // would deduplicate into a result that never arrives.
                self.inflight.complete(&key, outcome.clone());
                outcome
            }
            // Lost a race between subscribe and begin.
            Ticket::Follower(rx) => await_outcome(rx).await,
        }
    }

    /// Detached revalidation for `city`: the result goes to the cache write
    /// only, never to any pending caller, and failures are swallowed.
    ///
    /// Skips spawning work when a fetch for the key is already in flight.
    pub fn refresh_in_background(&self, city: &str) {
        let service = self.clone();
        let display = city.trim().to_string();

        tokio::spawn(async move {
            let key = display.to_lowercase();
            match service.inflight.begin(&key) {
                Ticket::Leader => {
                    let outcome = service.fetch_remote(&display, &key).await;
                    if let Err(err) = &outcome {
                        debug!(key, %err, "background refresh failed");
                    }
                    service.inflight.complete(&key, outcome);
                }
                Ticket::Follower(_) => {
                    debug!(key, "refresh already in flight");
                }
            }
        });
    }

    /// One full external round-trip: prompt, retry, normalize, persist.
    async fn fetch_remote(
        &self,
        display: &str,
        key: &str,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let request = prompts::weather_request(display);

        let reply = call_with_resilience(&self.fetch_retry, || self.client.generate(&request))
            .await
            .map_err(WeatherError::into_exhausted)?;

        let snapshot = normalize::snapshot_from_reply(&reply)?;

        self.cache.save(
            key,
            &CacheEntry {
                data: snapshot.clone(),
                timestamp: now_ms(),
            },
        );

        Ok(snapshot)
    }

    /// Synthesized historical series for one parameter. Failures of any kind
    /// come back as an empty series; callers treat "no data" and an empty
    /// range identically.
    pub async fn fetch_historical(
        &self,
        city: &str,
        parameter: AnalysisParameter,
        start: NaiveDate,
        end: NaiveDate,
        resolution: Resolution,
    ) -> Vec<AnalysisPoint> {
        let request = prompts::historical_request(
            city,
            parameter,
            &start.to_string(),
            &end.to_string(),
            resolution,
        );
        self.analysis_series(request, "historical").await
    }

    /// Synthesized prediction series for one parameter. Same empty-on-failure
    /// contract as [`Self::fetch_historical`].
    pub async fn fetch_predicted(
        &self,
        city: &str,
        parameter: AnalysisParameter,
        start: NaiveDate,
        end: NaiveDate,
        resolution: Resolution,
    ) -> Vec<AnalysisPoint> {
        let request = prompts::prediction_request(
            city,
            parameter,
            &start.to_string(),
            &end.to_string(),
            resolution,
        );
        self.analysis_series(request, "predicted").await
    }

    async fn analysis_series(&self, request: GenerateRequest, kind: &str) -> Vec<AnalysisPoint> {
        let result =
            call_with_resilience(&self.analysis_retry, || self.client.generate(&request)).await;

        match result {
            Ok(reply) => {
                match serde_json::from_str(normalize::strip_json_fences(&reply.text)) {
                    Ok(points) => points,
                    Err(e) => {
                        warn!(kind, error = %e, "discarding unparseable analysis series");
                        Vec::new()
                    }
                }
            }
            Err(err) => {
                warn!(kind, %err, "analysis fetch failed");
                Vec::new()
            }
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryStore,
        client::GenerateReply,
        normalize::test_support::sample_snapshot_for,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Model client fake: pops scripted outcomes, counts calls, optionally
    /// delays so tests can race callers against each other.
    #[derive(Debug)]
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<GenerateReply, WeatherError>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<GenerateReply, WeatherError>>) -> Arc<Self> {
            Self::with_delay(replies, Duration::ZERO)
        }

        fn with_delay(
            replies: Vec<Result<GenerateReply, WeatherError>>,
            delay: Duration,
        ) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn generate(
            &self,
            _request: &GenerateRequest,
        ) -> Result<GenerateReply, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.replies
                .lock()
                .pop_front()
                .unwrap_or(Err(WeatherError::FetchFailed("script exhausted".into())))
        }
    }

    fn weather_reply(city: &str) -> Result<GenerateReply, WeatherError> {
        Ok(GenerateReply {
            text: serde_json::to_string(&sample_snapshot_for(city)).expect("serialize"),
            ..GenerateReply::default()
        })
    }

    fn service_with(client: Arc<ScriptedClient>) -> WeatherService {
        WeatherService::new(client, Arc::new(MemoryStore::new())).with_retry_policies(
            RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(10),
                growth: 2.0,
                max_delay: None,
                jitter: Duration::ZERO,
            },
            RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(10),
                growth: 2.0,
                max_delay: None,
                jitter: Duration::ZERO,
            },
        )
    }

    fn stale_entry(city: &str) -> CacheEntry {
        CacheEntry {
            data: sample_snapshot_for(city),
            timestamp: now_ms() - CacheEntry::FRESH_TTL_MS - 60_000,
        }
    }

    #[tokio::test]
    async fn empty_and_whitespace_city_rejected_without_io() {
        let client = ScriptedClient::new(vec![]);
        let service = service_with(client.clone());

        assert_eq!(service.fetch("").await, Err(WeatherError::InvalidInput));
        assert_eq!(service.fetch("   ").await, Err(WeatherError::InvalidInput));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn absent_cache_blocks_on_fetch_and_persists() {
        let client = ScriptedClient::new(vec![weather_reply("Paris")]);
        let service = service_with(client.clone());

        let snapshot = service.fetch("  PARIS  ").await.expect("fetch succeeds");

        // Display casing comes from the model, the key from the input.
        assert_eq!(snapshot.city, "Paris");
        assert_eq!(client.calls(), 1);
        assert!(!service.inflight.is_pending("paris"));

        let cached = service.cache.load("paris").expect("entry persisted");
        assert_eq!(cached.data, snapshot);
    }

    #[tokio::test]
    async fn fresh_cache_entry_skips_the_external_call() {
        let client = ScriptedClient::new(vec![]);
        let service = service_with(client.clone());

        let entry = CacheEntry {
            data: sample_snapshot_for("Paris"),
            timestamp: now_ms(),
        };
        service.cache.save("paris", &entry);

        let snapshot = service.fetch("Paris").await.expect("served from cache");
        assert_eq!(snapshot, entry.data);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_is_served_then_revalidated_once() {
        let client = ScriptedClient::with_delay(
            vec![weather_reply("Paris Fresh")],
            Duration::from_millis(100),
        );
        let service = service_with(client.clone());
        service.cache.save("paris", &stale_entry("Paris Stale"));

        let snapshot = service.fetch("Paris").await.expect("stale served");
        assert_eq!(snapshot.city, "Paris Stale");

        // The background refresh lands in the cache without any caller.
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Some(entry) = service.cache.load("paris") {
                    if entry.data.city == "Paris Fresh" {
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("background refresh completes");

        assert_eq!(client.calls(), 1);
        assert!(!service.inflight.is_pending("paris"));

        // The refreshed entry is fresh now, so no further call.
        let snapshot = service.fetch("Paris").await.expect("refreshed served");
        assert_eq!(snapshot.city, "Paris Fresh");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_fetches_share_one_external_call() {
        let client =
            ScriptedClient::with_delay(vec![weather_reply("Paris")], Duration::from_millis(100));
        let service = service_with(client.clone());

        let (a, b) = tokio::join!(service.fetch("Paris"), service.fetch("Paris"));

        let a = a.expect("first caller succeeds");
        let b = b.expect("second caller succeeds");
        assert_eq!(a, b);
        assert_eq!(client.calls(), 1);
        assert!(!service.inflight.is_pending("paris"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_failure_reaches_every_caller_and_clears_the_registry() {
        let client = ScriptedClient::with_delay(
            vec![
                Err(WeatherError::FetchFailed("upstream broke".into())),
            ],
            Duration::from_millis(100),
        );
        let service = service_with(client.clone());

        let (a, b) = tokio::join!(service.fetch("Paris"), service.fetch("Paris"));

        assert!(matches!(a, Err(WeatherError::FetchFailed(_))));
        assert!(matches!(b, Err(WeatherError::FetchFailed(_))));
        assert_eq!(client.calls(), 1);
        assert!(!service.inflight.is_pending("paris"));

        // The key is usable again afterwards.
        let client2 = ScriptedClient::new(vec![weather_reply("Paris")]);
        let service2 = WeatherService {
            client: client2.clone(),
            ..service.clone()
        };
        let snapshot = service2.fetch("Paris").await.expect("retryable afterwards");
        assert_eq!(snapshot.city, "Paris");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_transient_retries_surface_as_fetch_failed() {
        let client = ScriptedClient::new(vec![
            Err(WeatherError::RateLimited { status: 429 }),
            Err(WeatherError::RateLimited { status: 429 }),
        ]);
        let service = service_with(client.clone());

        let result = service.fetch("Paris").await;

        assert!(matches!(result, Err(WeatherError::FetchFailed(_))));
        // 1 attempt + 1 retry per the test policy.
        assert_eq!(client.calls(), 2);
        assert!(!service.inflight.is_pending("paris"));
    }

    #[tokio::test]
    async fn unparseable_body_is_parse_failed_and_clears_the_registry() {
        let client = ScriptedClient::new(vec![Ok(GenerateReply {
            text: "no json here".into(),
            ..GenerateReply::default()
        })]);
        let service = service_with(client.clone());

        let result = service.fetch("Paris").await;

        assert!(matches!(result, Err(WeatherError::ParseFailed(_))));
        assert!(!service.inflight.is_pending("paris"));
        assert!(service.cache.load("paris").is_none());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_prior_cache_entry_intact() {
        let client = ScriptedClient::new(vec![Ok(GenerateReply {
            text: "garbage".into(),
            ..GenerateReply::default()
        })]);
        let service = service_with(client.clone());

        // An old entry exists; a direct remote fetch fails to parse.
        service.cache.save("paris", &stale_entry("Paris Stale"));
        let result = service.fetch_remote("Paris", "paris").await;

        assert!(matches!(result, Err(WeatherError::ParseFailed(_))));
        let entry = service.cache.load("paris").expect("old entry kept");
        assert_eq!(entry.data.city, "Paris Stale");
    }

    #[tokio::test]
    async fn historical_series_parses_labelled_points() {
        let client = ScriptedClient::new(vec![Ok(GenerateReply {
            text: r#"[{"label":"Jan","value":3.5},{"label":"Feb","value":4.0}]"#.into(),
            ..GenerateReply::default()
        })]);
        let service = service_with(client.clone());

        let points = service
            .fetch_historical(
                "Paris",
                AnalysisParameter::Temp,
                NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date"),
                NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date"),
                Resolution::Monthly,
            )
            .await;

        assert_eq!(
            points,
            vec![
                AnalysisPoint {
                    label: "Jan".into(),
                    value: 3.5
                },
                AnalysisPoint {
                    label: "Feb".into(),
                    value: 4.0
                },
            ]
        );
    }

    #[tokio::test]
    async fn analysis_failures_become_empty_series() {
        let client = ScriptedClient::new(vec![
            Ok(GenerateReply {
                text: "not an array".into(),
                ..GenerateReply::default()
            }),
            Err(WeatherError::FetchFailed("down".into())),
        ]);
        let service = service_with(client.clone());

        let start = NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date");
        let end = NaiveDate::from_ymd_opt(2026, 2, 1).expect("valid date");

        let points = service
            .fetch_predicted("Paris", AnalysisParameter::Aqi, start, end, Resolution::Daily)
            .await;
        assert!(points.is_empty());

        let points = service
            .fetch_historical("Paris", AnalysisParameter::Aqi, start, end, Resolution::Daily)
            .await;
        assert!(points.is_empty());
    }
}
