use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tracing::{info, info_span, warn, Instrument, Span};

use crate::adapter::{AdapterError, AdapterErrorKind, AdapterRequest, CarrierAdapter, SecondaryAggregator};
use crate::adapters::{self, sort_newest_first, Kuaidi100Aggregator};
use crate::credential::{CarrierCredential, CredentialStore, StaticCredentialStore};
use crate::eta::estimate_delivery;
use crate::http_client::{HttpClient, ReqwestHttpClient, DEFAULT_TIMEOUT_MS};
use crate::{
    detect_carrier, BuildError, CanonicalStatus, CarrierCode, NormalizedTraceEvent, ResolveFailure,
    SourceProvider, TrackingQuery, TrackingResult, ValidationError,
};

/// Wall clock used for "today" in delivery estimates.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Default cap on concurrent resolutions in a batch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Tunables applied to every resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Simultaneous resolutions allowed in [`Tracker::resolve_batch`].
    pub max_concurrency: usize,
    /// Timeout of each individual outbound call.
    pub request_timeout: Duration,
    /// Overall deadline for one query, covering the primary and fallback hop.
    pub query_deadline: Option<Duration>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            query_deadline: None,
        }
    }
}

/// Builder for [`Tracker`].
///
/// # Environment Variables
///
/// [`with_env_config`](Self::with_env_config) reads:
///
/// | Variable | Meaning |
/// |----------|---------|
/// | `PARCELTRACE_<CODE>_<KEY>` | one credential key, e.g. `PARCELTRACE_SF_CHECK_WORD` |
/// | `PARCELTRACE_<CODE>_ENV` | `sandbox` or `production` |
/// | `PARCELTRACE_<CODE>_ENABLED` | `false` disables the carrier's credential |
/// | `PARCELTRACE_KUAIDI100_CUSTOMER` | aggregator customer id |
/// | `PARCELTRACE_KUAIDI100_KEY` | aggregator signing key |
///
/// # Example
///
/// ```rust,ignore
/// use parceltrace_core::{TrackerBuilder, TrackingQuery};
///
/// let tracker = TrackerBuilder::new().with_env_config().build()?;
/// let result = tracker.resolve(TrackingQuery::new("SF1234567890123")?).await;
/// println!("{}", result.status_text);
/// ```
pub struct TrackerBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    aggregator: Option<Arc<dyn SecondaryAggregator>>,
    aggregator_from_env: bool,
    default_adapters: bool,
    adapters: Vec<(CarrierCode, Arc<dyn CarrierAdapter>)>,
    config: TrackerConfig,
    clock: Option<Clock>,
    config_error: Option<ValidationError>,
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerBuilder {
    pub fn new() -> Self {
        Self {
            http_client: None,
            credentials: None,
            aggregator: None,
            aggregator_from_env: false,
            default_adapters: true,
            adapters: Vec::new(),
            config: TrackerConfig::default(),
            clock: None,
            config_error: None,
        }
    }

    /// Loads carrier credentials and the aggregator from the environment.
    ///
    /// A malformed variable surfaces from [`build`](Self::build).
    pub fn with_env_config(self) -> Self {
        self.with_loaded_credentials(StaticCredentialStore::from_env(adapters::required_keys))
    }

    fn with_loaded_credentials(
        mut self,
        loaded: Result<StaticCredentialStore, ValidationError>,
    ) -> Self {
        match loaded {
            Ok(store) => self.credentials = Some(Arc::new(store)),
            Err(error) => self.config_error = Some(error),
        }
        self.aggregator_from_env = true;
        self
    }

    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn with_aggregator(mut self, aggregator: Arc<dyn SecondaryAggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// Transport shared by the built-in adapters and the env-configured aggregator.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Registers `adapter` for `carrier`, replacing the built-in one.
    pub fn with_adapter(mut self, carrier: CarrierCode, adapter: Arc<dyn CarrierAdapter>) -> Self {
        self.adapters.push((carrier, adapter));
        self
    }

    /// Skips the built-in adapters; every carrier must then be registered
    /// through [`with_adapter`](Self::with_adapter).
    pub fn without_default_adapters(mut self) -> Self {
        self.default_adapters = false;
        self
    }

    pub fn build(self) -> Result<Tracker, BuildError> {
        if let Some(error) = self.config_error {
            return Err(error.into());
        }
        if self.config.max_concurrency == 0 {
            return Err(BuildError::ZeroConcurrency);
        }

        let timeout_ms = u64::try_from(self.config.request_timeout.as_millis()).unwrap_or(u64::MAX);
        let http_client = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));

        let mut registry = HashMap::new();
        if self.default_adapters {
            for adapter in adapters::default_adapters(http_client.clone(), timeout_ms) {
                registry.insert(adapter.carrier(), adapter);
            }
        }
        for (carrier, adapter) in self.adapters {
            let reported = adapter.carrier();
            if reported != carrier {
                return Err(BuildError::MismatchedAdapter {
                    registered: carrier,
                    reported,
                });
            }
            registry.insert(carrier, adapter);
        }
        if let Some(carrier) = CarrierCode::ALL
            .into_iter()
            .find(|carrier| !registry.contains_key(carrier))
        {
            return Err(BuildError::MissingAdapter { carrier });
        }

        let aggregator = self.aggregator.or_else(|| {
            if !self.aggregator_from_env {
                return None;
            }
            Kuaidi100Aggregator::from_env(http_client)
                .map(|aggregator| Arc::new(aggregator.with_timeout_ms(timeout_ms)) as Arc<dyn SecondaryAggregator>)
        });

        Ok(Tracker {
            inner: Arc::new(TrackerInner {
                adapters: registry,
                credentials: self
                    .credentials
                    .unwrap_or_else(|| Arc::new(StaticCredentialStore::default())),
                aggregator,
                clock: self.clock.unwrap_or_else(|| Arc::new(OffsetDateTime::now_utc)),
                config: self.config,
            }),
        })
    }
}

/// Resolves tracking numbers into [`TrackingResult`]s.
///
/// Cheap to clone; clones share the same immutable registry. Resolution
/// never panics or returns an error: every operational failure is carried
/// on the result.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    adapters: HashMap<CarrierCode, Arc<dyn CarrierAdapter>>,
    credentials: Arc<dyn CredentialStore>,
    aggregator: Option<Arc<dyn SecondaryAggregator>>,
    clock: Clock,
    config: TrackerConfig,
}

/// Successful end of the cascade.
struct Resolved {
    carrier: CarrierCode,
    traces: Vec<NormalizedTraceEvent>,
    source: SourceProvider,
    fallback_label: Option<&'static str>,
}

/// Failed end of the cascade, tagged with the last source consulted.
struct Unresolved {
    failure: ResolveFailure,
    source: SourceProvider,
}

impl From<ResolveFailure> for Unresolved {
    fn from(failure: ResolveFailure) -> Self {
        Self {
            failure,
            source: SourceProvider::Primary,
        }
    }
}

/// How the primary adapter missed.
enum PrimaryMiss {
    Empty,
    Failed(AdapterError),
    DigitsRejected(AdapterError),
}

impl Tracker {
    pub fn builder() -> TrackerBuilder {
        TrackerBuilder::new()
    }

    pub fn config(&self) -> TrackerConfig {
        self.inner.config
    }

    pub fn has_aggregator(&self) -> bool {
        self.inner.aggregator.is_some()
    }

    /// Resolves one query, honoring [`TrackerConfig::query_deadline`].
    pub async fn resolve(&self, query: TrackingQuery) -> TrackingResult {
        match self.inner.config.query_deadline {
            Some(deadline) => self.resolve_with_deadline(query, deadline).await,
            None => self.resolve_instrumented(&query).await,
        }
    }

    /// Resolves one query, abandoning in-flight calls once `deadline` passes.
    pub async fn resolve_with_deadline(
        &self,
        query: TrackingQuery,
        deadline: Duration,
    ) -> TrackingResult {
        match tokio::time::timeout(deadline, self.resolve_instrumented(&query)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    tracking_number = query.tracking_number(),
                    deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                    "query deadline elapsed"
                );
                let failure = match self.resolve_carrier(&query) {
                    Ok(carrier) => ResolveFailure::Transport {
                        carrier,
                        provider: carrier.as_str().to_ascii_lowercase(),
                        message: format!(
                            "query deadline of {} ms elapsed",
                            deadline.as_millis()
                        ),
                        timed_out: true,
                    },
                    Err(failure) => failure,
                };
                TrackingResult::failed(query.tracking_number(), failure, SourceProvider::Primary)
            }
        }
    }

    /// Resolves every query concurrently, at most
    /// [`TrackerConfig::max_concurrency`] at a time.
    ///
    /// The output has one result per input, in input order. A resolution
    /// that panics yields an `internal` failure for its own slot only.
    pub async fn resolve_batch(&self, queries: Vec<TrackingQuery>) -> Vec<TrackingResult> {
        let semaphore = Arc::new(Semaphore::new(self.inner.config.max_concurrency));

        let handles = queries
            .into_iter()
            .map(|query| {
                let tracker = self.clone();
                let semaphore = Arc::clone(&semaphore);
                let tracking_number = query.tracking_number().to_owned();
                let handle = tokio::spawn(async move {
                    let permit = semaphore.acquire_owned().await;
                    let result = tracker.resolve(query).await;
                    drop(permit);
                    result
                });
                (tracking_number, handle)
            })
            .collect::<Vec<_>>();

        let mut results = Vec::with_capacity(handles.len());
        for (tracking_number, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(error) => {
                    warn!(tracking_number = %tracking_number, error = %error, "resolution task failed");
                    TrackingResult::failed(
                        tracking_number,
                        ResolveFailure::Internal {
                            message: format!("resolution task failed: {error}"),
                        },
                        SourceProvider::Primary,
                    )
                }
            };
            results.push(result);
        }
        results
    }

    async fn resolve_instrumented(&self, query: &TrackingQuery) -> TrackingResult {
        let span = info_span!(
            "resolve",
            tracking_number = query.tracking_number(),
            carrier = tracing::field::Empty
        );

        async {
            let outcome = self.cascade(query).await;
            self.finish(query.tracking_number(), outcome)
        }
        .instrument(span)
        .await
    }

    async fn cascade(&self, query: &TrackingQuery) -> Result<Resolved, Unresolved> {
        let carrier = self.resolve_carrier(query)?;
        Span::current().record("carrier", carrier.as_str());

        let adapter = self
            .inner
            .adapters
            .get(&carrier)
            .ok_or_else(|| ResolveFailure::Internal {
                message: format!("no adapter is registered for carrier {carrier}"),
            })?;
        let credential = self.checked_credential(carrier, adapter.as_ref()).await?;
        let digits = query.verification_digits();

        let primary = adapter
            .query(AdapterRequest {
                tracking_number: query.tracking_number(),
                credential: &credential,
                verification_digits: digits,
            })
            .await;

        let miss = match primary {
            Ok(traces) if !traces.is_empty() => {
                return Ok(Resolved {
                    carrier,
                    traces,
                    source: SourceProvider::Primary,
                    fallback_label: None,
                });
            }
            Ok(_) => PrimaryMiss::Empty,
            Err(error) if error.kind() == AdapterErrorKind::NeedsVerification => {
                if digits.is_none() {
                    return Err(ResolveFailure::VerificationRequired { carrier }.into());
                }
                warn!(error = %error, "primary adapter rejected verification digits");
                PrimaryMiss::DigitsRejected(error)
            }
            Err(error) => {
                warn!(kind = ?error.kind(), error = %error, "primary adapter failed");
                PrimaryMiss::Failed(error)
            }
        };

        let Some(aggregator) = &self.inner.aggregator else {
            return Err(primary_failure(carrier, miss).into());
        };

        info!(aggregator = aggregator.name(), "falling back to secondary aggregator");
        match aggregator
            .query(carrier, query.tracking_number(), digits)
            .await
        {
            Ok(traces) if !traces.is_empty() => Ok(Resolved {
                carrier,
                traces,
                source: SourceProvider::Secondary,
                fallback_label: Some(aggregator.name()),
            }),
            Ok(_) => Err(Unresolved {
                failure: primary_failure(carrier, miss),
                source: SourceProvider::Secondary,
            }),
            Err(error) => {
                warn!(kind = ?error.kind(), error = %error, "secondary aggregator failed");
                let failure = if error.kind() == AdapterErrorKind::NeedsVerification && digits.is_none() {
                    ResolveFailure::VerificationRequired { carrier }
                } else {
                    primary_failure(carrier, miss)
                };
                Err(Unresolved {
                    failure,
                    source: SourceProvider::Secondary,
                })
            }
        }
    }

    /// An explicit carrier name wins over detection; an unknown name is
    /// reported rather than replaced by a detected guess.
    fn resolve_carrier(&self, query: &TrackingQuery) -> Result<CarrierCode, ResolveFailure> {
        match query.carrier() {
            Some(name) => CarrierCode::from_code_or_name(name).ok_or_else(|| {
                ResolveFailure::CarrierUnresolved {
                    input: name.to_owned(),
                }
            }),
            None => detect_carrier(query.tracking_number()).ok_or_else(|| {
                ResolveFailure::CarrierUnresolved {
                    input: query.tracking_number().to_owned(),
                }
            }),
        }
    }

    async fn checked_credential(
        &self,
        carrier: CarrierCode,
        adapter: &dyn CarrierAdapter,
    ) -> Result<CarrierCredential, ResolveFailure> {
        let credential = self
            .inner
            .credentials
            .credential(carrier)
            .await
            .ok_or(ResolveFailure::CredentialMissing { carrier })?;

        if !credential.enabled {
            return Err(ResolveFailure::CredentialDisabled { carrier });
        }

        let missing = credential.missing_keys(adapter.required_keys());
        if !missing.is_empty() {
            return Err(ResolveFailure::CredentialIncomplete { carrier, missing });
        }

        Ok(credential)
    }

    fn finish(&self, tracking_number: &str, outcome: Result<Resolved, Unresolved>) -> TrackingResult {
        match outcome {
            Ok(Resolved {
                carrier,
                mut traces,
                source,
                fallback_label,
            }) => {
                sort_newest_first(&mut traces);
                let status = traces
                    .first()
                    .map_or(CanonicalStatus::Unknown, |event| event.status);
                let eta = estimate_delivery(carrier, status, &traces, (self.inner.clock)());
                let result = TrackingResult::tracked(
                    tracking_number,
                    carrier,
                    traces,
                    eta,
                    source,
                    fallback_label,
                );
                info!(
                    source = %result.source_provider,
                    status = %result.status,
                    traces = result.traces.len(),
                    "resolution succeeded"
                );
                result
            }
            Err(Unresolved { failure, source }) => {
                info!(
                    source = %source,
                    category = ?failure.category(),
                    "resolution failed: {failure}"
                );
                TrackingResult::failed(tracking_number, failure, source)
            }
        }
    }
}

/// Failure reported when neither source produced traces.
fn primary_failure(carrier: CarrierCode, miss: PrimaryMiss) -> ResolveFailure {
    let error = match miss {
        PrimaryMiss::Empty => return ResolveFailure::NoDataYet { carrier },
        PrimaryMiss::DigitsRejected(error) => {
            return ResolveFailure::ProviderBusiness {
                carrier,
                provider: provider_name(carrier),
                code: error.provider_code().map(str::to_owned),
                message: format!("verification digits rejected: {}", error.message()),
            };
        }
        PrimaryMiss::Failed(error) => error,
    };

    match error.kind() {
        AdapterErrorKind::Business | AdapterErrorKind::NeedsVerification => {
            ResolveFailure::ProviderBusiness {
                carrier,
                provider: provider_name(carrier),
                code: error.provider_code().map(str::to_owned),
                message: error.message().to_owned(),
            }
        }
        AdapterErrorKind::Transport | AdapterErrorKind::Malformed => ResolveFailure::Transport {
            carrier,
            provider: provider_name(carrier),
            message: error.message().to_owned(),
            timed_out: error.is_timeout(),
        },
    }
}

fn provider_name(carrier: CarrierCode) -> String {
    carrier.as_str().to_ascii_lowercase()
}
