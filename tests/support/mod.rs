#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parceltrace_core::{
    required_keys, CarrierCode, CarrierCredential, CredentialEnvironment, HttpClient, HttpError,
    HttpFuture, HttpRequest, HttpResponse, Kuaidi100Aggregator, StaticCredentialStore, Tracker,
    TrackerBuilder, TrackerConfig,
};
use time::macros::datetime;
use time::OffsetDateTime;

pub const SF_HOST: &str = "sfapi-sbox.sf-express.com";
pub const ZTO_HOST: &str = "japi-test.zto.com";
pub const YTO_HOST: &str = "yto56test.com";
pub const STO_HOST: &str = "linkgatewaytest.sto.cn";
pub const JD_HOST: &str = "api-dev.jd.com";
pub const KUAIDI100_HOST: &str = "poll.kuaidi100.com";

/// 2024-05-03 10:00 in UTC+8.
pub const NOW: OffsetDateTime = datetime!(2024-05-03 02:00 UTC);

struct Route {
    fragment: String,
    response: Result<HttpResponse, HttpError>,
    delay: Duration,
}

/// Fake transport answering by the first route whose fragment appears in the
/// request URL or body.
///
/// A route delayed beyond the request's own timeout answers with a timeout
/// error once that timeout has elapsed.
#[derive(Default)]
pub struct ScriptedHttpClient {
    routes: Vec<Route>,
    requests: Mutex<Vec<HttpRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route_json(self, fragment: &str, body: impl Into<String>) -> Self {
        self.route(fragment, Ok(HttpResponse::ok_json(body)), Duration::ZERO)
    }

    pub fn route_delayed_json(self, fragment: &str, body: impl Into<String>, delay: Duration) -> Self {
        self.route(fragment, Ok(HttpResponse::ok_json(body)), delay)
    }

    pub fn route_status(self, fragment: &str, status: u16) -> Self {
        self.route(
            fragment,
            Ok(HttpResponse {
                status,
                body: String::new(),
            }),
            Duration::ZERO,
        )
    }

    pub fn route_error(self, fragment: &str, error: HttpError) -> Self {
        self.route(fragment, Err(error), Duration::ZERO)
    }

    fn route(
        mut self,
        fragment: &str,
        response: Result<HttpResponse, HttpError>,
        delay: Duration,
    ) -> Self {
        self.routes.push(Route {
            fragment: fragment.to_owned(),
            response,
            delay,
        });
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .clone()
    }

    pub fn requests_to(&self, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.url.contains(fragment))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            self.requests
                .lock()
                .expect("request log should not be poisoned")
                .push(request.clone());

            let body = request.body.as_deref().unwrap_or_default();
            let Some(route) = self
                .routes
                .iter()
                .find(|route| request.url.contains(&route.fragment) || body.contains(&route.fragment))
            else {
                return Err(HttpError::new(format!("no scripted route for {}", request.url)));
            };

            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            let timeout = Duration::from_millis(request.timeout_ms);
            let outcome = if route.delay > timeout {
                tokio::time::sleep(timeout).await;
                Err(HttpError::timeout("request timeout"))
            } else {
                tokio::time::sleep(route.delay).await;
                route.response.clone()
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        })
    }
}

/// Sandbox credentials carrying every key each carrier requires.
pub fn complete_credential(carrier: CarrierCode) -> CarrierCredential {
    required_keys(carrier).iter().fold(
        CarrierCredential::new(carrier, CredentialEnvironment::Sandbox),
        |credential, key| credential.with_key(*key, format!("test-{key}")),
    )
}

pub fn complete_credentials() -> StaticCredentialStore {
    StaticCredentialStore::new(CarrierCode::ALL.map(complete_credential))
}

pub fn builder(client: Arc<ScriptedHttpClient>) -> TrackerBuilder {
    TrackerBuilder::new()
        .with_http_client(client)
        .with_credential_store(Arc::new(complete_credentials()))
        .with_clock(Arc::new(|| NOW))
}

pub fn tracker(client: Arc<ScriptedHttpClient>) -> Tracker {
    builder(client).build().expect("tracker builds")
}

pub fn tracker_with_fallback(client: Arc<ScriptedHttpClient>) -> Tracker {
    let aggregator = Kuaidi100Aggregator::new("TESTCUSTOMER", "test-key", client.clone());
    builder(client)
        .with_aggregator(Arc::new(aggregator))
        .build()
        .expect("tracker builds")
}

pub fn tracker_with_config(client: Arc<ScriptedHttpClient>, config: TrackerConfig) -> Tracker {
    builder(client)
        .with_config(config)
        .build()
        .expect("tracker builds")
}

/// SF envelope wrapping a string-encoded route payload.
pub fn sf_routes(tracking_number: &str, routes: serde_json::Value) -> String {
    let inner = serde_json::json!({
        "success": true,
        "errorCode": "S0000",
        "msgData": {"routeResps": [{"mailNo": tracking_number, "routes": routes}]}
    });
    serde_json::json!({
        "apiResultCode": "A1000",
        "apiResultData": inner.to_string(),
    })
    .to_string()
}

pub fn kuaidi100_events(events: serde_json::Value) -> String {
    serde_json::json!({"message": "ok", "state": "0", "status": "200", "data": events}).to_string()
}
