use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    business_error, credential_key, normalize_events, parse_body, scalar_text, send, Endpoints,
    RawEvent,
};
use crate::adapter::{AdapterError, AdapterFuture, AdapterRequest, CarrierAdapter};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient, DEFAULT_TIMEOUT_MS};
use crate::signing::md5_base64;
use crate::status::StatusCodeTable;
use crate::{CanonicalStatus, CarrierCode, NormalizedTraceEvent};

const PROVIDER: &str = "zto";

pub(crate) const REQUIRED_KEYS: &[&str] = &["app_key", "app_secret"];

const ENDPOINTS: Endpoints = Endpoints {
    sandbox: "https://japi-test.zto.com/zto.merchant.waybill.track.query",
    production: "https://japi.zto.com/zto.merchant.waybill.track.query",
};

const STATUS_CODES: StatusCodeTable = StatusCodeTable(&[
    ("收件", CanonicalStatus::PickedUp),
    ("GOT", CanonicalStatus::PickedUp),
    ("发件", CanonicalStatus::InTransit),
    ("DEPARTURE", CanonicalStatus::InTransit),
    ("到件", CanonicalStatus::InTransit),
    ("ARRIVAL", CanonicalStatus::InTransit),
    ("派件", CanonicalStatus::OutForDelivery),
    ("DISPATCH", CanonicalStatus::OutForDelivery),
    ("签收", CanonicalStatus::Delivered),
    ("SIGNED", CanonicalStatus::Delivered),
    ("退件", CanonicalStatus::Returned),
    ("RETURN", CanonicalStatus::Returned),
    ("问题件", CanonicalStatus::Exception),
    ("PROBLEM", CanonicalStatus::Exception),
]);

const ERRORS: &[(&str, &str)] = &[
    ("S201", "the app key is not registered with ZTO"),
    ("S202", "x-dataDigest was rejected; check the configured app_secret"),
    ("S208", "the app key is not authorized for track queries"),
    ("S211", "too many requests; try again later"),
];

const VERIFICATION_CODE: &str = "S212";

/// ZTO merchant waybill track query.
#[derive(Clone)]
pub struct ZtoAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl Default for ZtoAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl ZtoAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn build_request(&self, request: &AdapterRequest<'_>) -> Result<HttpRequest, AdapterError> {
        let app_key = credential_key(request.credential, "app_key")?;
        let app_secret = credential_key(request.credential, "app_secret")?;

        let mut body = json!({ "billCode": request.tracking_number });
        if let Some(digits) = request.verification_digits {
            body["mobilePhone"] = Value::from(digits);
        }
        let body = body.to_string();
        let digest = md5_base64(&format!("{body}{app_secret}"));

        Ok(
            HttpRequest::post(ENDPOINTS.for_env(request.credential.environment))
                .with_header("x-appKey", app_key)
                .with_header("x-dataDigest", digest)
                .with_json_body(body)
                .with_timeout_ms(self.timeout_ms),
        )
    }
}

impl CarrierAdapter for ZtoAdapter {
    fn carrier(&self) -> CarrierCode {
        CarrierCode::Zto
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn query<'a>(&'a self, request: AdapterRequest<'a>) -> AdapterFuture<'a> {
        Box::pin(async move {
            let http_request = self.build_request(&request)?;
            let response = send(self.http_client.as_ref(), http_request, PROVIDER).await?;
            parse_traces(&response.body)
        })
    }
}

fn parse_traces(body: &str) -> Result<Vec<NormalizedTraceEvent>, AdapterError> {
    let envelope: ZtoEnvelope = parse_body(PROVIDER, body)?;

    if !envelope.status {
        let code = envelope.status_code.as_ref().and_then(scalar_text);
        if code.as_deref() == Some(VERIFICATION_CODE) {
            return Err(AdapterError::needs_verification(
                "zto requires the last 4 digits of the recipient phone",
            ));
        }
        return Err(business_error(
            ERRORS,
            code.as_deref(),
            envelope.message.as_deref(),
        ));
    }

    let traces = envelope.result.or(envelope.data).unwrap_or_default();
    let raw = traces.into_iter().map(|trace| RawEvent {
        time: trace.scan_date,
        location: trace
            .scan_site
            .and_then(|site| site.name)
            .or(trace.site_name),
        description: trace.desc.unwrap_or_default(),
        code: trace.scan_type,
    });

    Ok(normalize_events(PROVIDER, &STATUS_CODES, raw))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZtoEnvelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    status_code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<Vec<ZtoTrace>>,
    #[serde(default)]
    data: Option<Vec<ZtoTrace>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZtoTrace {
    #[serde(default, alias = "scanTime", alias = "time")]
    scan_date: Value,
    #[serde(default, alias = "action")]
    scan_type: Option<String>,
    #[serde(default, alias = "description", alias = "remark")]
    desc: Option<String>,
    #[serde(default)]
    scan_site: Option<ZtoSite>,
    #[serde(default)]
    site_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZtoSite {
    #[serde(default)]
    name: Option<String>,
}
