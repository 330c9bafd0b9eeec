use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    business_error, credential_key, normalize_events, now_millis, parse_body, scalar_text, send,
    Endpoints, RawEvent,
};
use crate::adapter::{AdapterError, AdapterFuture, AdapterRequest, CarrierAdapter};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient, DEFAULT_TIMEOUT_MS};
use crate::signing::md5_hex_lower;
use crate::status::StatusCodeTable;
use crate::{CanonicalStatus, CarrierCode, NormalizedTraceEvent};

const PROVIDER: &str = "yto";

pub(crate) const REQUIRED_KEYS: &[&str] = &["user_id", "app_secret"];

/// The user id is appended as the final path segment.
const ENDPOINTS: Endpoints = Endpoints {
    sandbox: "https://openuat.yto56test.com:6443/open/track_query_adapter/v1/",
    production: "https://openapi.yto.net.cn:11443/open/track_query_adapter/v1/",
};

const STATUS_CODES: StatusCodeTable = StatusCodeTable(&[
    ("GOT", CanonicalStatus::PickedUp),
    ("ARRIVAL", CanonicalStatus::InTransit),
    ("DEPARTURE", CanonicalStatus::InTransit),
    ("INBOUND", CanonicalStatus::InTransit),
    ("SENT_SCAN", CanonicalStatus::OutForDelivery),
    ("SIGNED", CanonicalStatus::Delivered),
    ("FAILED", CanonicalStatus::Exception),
    ("RETURN", CanonicalStatus::Returned),
    ("TMS_RETURN", CanonicalStatus::Returned),
    ("ORDER", CanonicalStatus::Pending),
]);

const ERRORS: &[(&str, &str)] = &[
    ("1002", "the YTO sign was rejected; check the configured app_secret"),
    ("1003", "the YTO user id is not authorized for track queries"),
    ("1004", "too many requests; try again later"),
];

const NO_TRACE_CODE: &str = "1001";

/// YTO open-platform track query.
#[derive(Clone)]
pub struct YtoAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl Default for YtoAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl YtoAdapter {
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

    fn build_request(
        &self,
        request: &AdapterRequest<'_>,
        timestamp_ms: i128,
    ) -> Result<HttpRequest, AdapterError> {
        let user_id = credential_key(request.credential, "user_id")?;
        let app_secret = credential_key(request.credential, "app_secret")?;

        let mut param = json!({ "NUMBER": request.tracking_number });
        if let Some(digits) = request.verification_digits {
            param["MOBILE"] = Value::from(digits);
        }
        let param = param.to_string();
        let timestamp = timestamp_ms.to_string();
        let sign = md5_hex_lower(&format!("{param}{app_secret}{timestamp}"));

        let url = format!(
            "{}{}",
            ENDPOINTS.for_env(request.credential.environment),
            urlencoding::encode(user_id)
        );
        let body = json!({
            "timestamp": timestamp,
            "param": param,
            "format": "JSON",
            "sign": sign,
        });

        Ok(HttpRequest::post(url)
            .with_json_body(body.to_string())
            .with_timeout_ms(self.timeout_ms))
    }
}

impl CarrierAdapter for YtoAdapter {
    fn carrier(&self) -> CarrierCode {
        CarrierCode::Yto
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn query<'a>(&'a self, request: AdapterRequest<'a>) -> AdapterFuture<'a> {
        Box::pin(async move {
            let http_request = self.build_request(&request, now_millis())?;
            let response = send(self.http_client.as_ref(), http_request, PROVIDER).await?;
            parse_traces(&response.body)
        })
    }
}

fn parse_traces(body: &str) -> Result<Vec<NormalizedTraceEvent>, AdapterError> {
    let traces = match parse_body::<YtoResponse>(PROVIDER, body)? {
        YtoResponse::Traces(traces) | YtoResponse::Wrapped { data: traces } => traces,
        YtoResponse::Failure { code, message } => {
            let code = scalar_text(&code);
            if code.as_deref() == Some(NO_TRACE_CODE) {
                return Ok(Vec::new());
            }
            return Err(business_error(ERRORS, code.as_deref(), message.as_deref()));
        }
    };

    let raw = traces.into_iter().map(|trace| RawEvent {
        time: trace.upload_time,
        location: trace.city,
        description: trace.process_info.unwrap_or_default(),
        code: trace.info_content,
    });

    Ok(normalize_events(PROVIDER, &STATUS_CODES, raw))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YtoResponse {
    Traces(Vec<YtoTrace>),
    Wrapped {
        data: Vec<YtoTrace>,
    },
    Failure {
        code: Value,
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct YtoTrace {
    #[serde(default, rename = "upload_Time", alias = "uploadTime")]
    upload_time: Value,
    #[serde(default, rename = "infoContent", alias = "status_code")]
    info_content: Option<String>,
    #[serde(default, rename = "processInfo", alias = "desc")]
    process_info: Option<String>,
    #[serde(default)]
    city: Option<String>,
}
