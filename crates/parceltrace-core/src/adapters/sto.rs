use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    business_error, credential_key, normalize_events, parse_body, send, Endpoints, RawEvent,
};
use crate::adapter::{AdapterError, AdapterFuture, AdapterRequest, CarrierAdapter};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient, DEFAULT_TIMEOUT_MS};
use crate::signing::md5_base64;
use crate::status::StatusCodeTable;
use crate::{CanonicalStatus, CarrierCode, NormalizedTraceEvent};

const PROVIDER: &str = "sto";
const API_NAME: &str = "STO_TRACE_QUERY_COMMON";
const TO_APPKEY: &str = "sto_trace_query";
const TO_CODE: &str = "sto_trace_query";

pub(crate) const REQUIRED_KEYS: &[&str] = &["from_app_key", "from_code", "secret_key"];

const ENDPOINTS: Endpoints = Endpoints {
    sandbox: "http://cloudinter-linkgatewaytest.sto.cn/gateway/link.do",
    production: "https://cloudinter-linkgateway.sto.cn/gateway/link.do",
};

const STATUS_CODES: StatusCodeTable = StatusCodeTable(&[
    ("收件", CanonicalStatus::PickedUp),
    ("发件", CanonicalStatus::InTransit),
    ("到件", CanonicalStatus::InTransit),
    ("派件", CanonicalStatus::OutForDelivery),
    ("签收", CanonicalStatus::Delivered),
    ("退回", CanonicalStatus::Returned),
    ("问题件", CanonicalStatus::Exception),
    ("留仓", CanonicalStatus::Exception),
]);

const ERRORS: &[(&str, &str)] = &[
    ("S01", "the STO request is missing a required parameter"),
    ("S07", "data_digest was rejected; check the configured secret_key"),
    ("S08", "the from_app_key is not authorized for trace queries"),
    ("S13", "too many requests; try again later"),
];

/// STO link-gateway common trace query.
#[derive(Clone)]
pub struct StoAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl Default for StoAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl StoAdapter {
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

    /// STO has no phone check; verification digits are not sent.
    fn build_request(&self, request: &AdapterRequest<'_>) -> Result<HttpRequest, AdapterError> {
        let from_app_key = credential_key(request.credential, "from_app_key")?;
        let from_code = credential_key(request.credential, "from_code")?;
        let secret_key = credential_key(request.credential, "secret_key")?;

        let content = json!({
            "order": "",
            "waybillNoList": [request.tracking_number],
        })
        .to_string();
        let digest = md5_base64(&format!("{content}{secret_key}"));

        Ok(
            HttpRequest::post(ENDPOINTS.for_env(request.credential.environment))
                .with_form(&[
                    ("api_name", API_NAME),
                    ("from_appkey", from_app_key),
                    ("from_code", from_code),
                    ("to_appkey", TO_APPKEY),
                    ("to_code", TO_CODE),
                    ("content", &content),
                    ("data_digest", &digest),
                ])
                .with_timeout_ms(self.timeout_ms),
        )
    }
}

impl CarrierAdapter for StoAdapter {
    fn carrier(&self) -> CarrierCode {
        CarrierCode::Sto
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn query<'a>(&'a self, request: AdapterRequest<'a>) -> AdapterFuture<'a> {
        Box::pin(async move {
            let http_request = self.build_request(&request)?;
            let response = send(self.http_client.as_ref(), http_request, PROVIDER).await?;
            parse_traces(&response.body, request.tracking_number)
        })
    }
}

fn parse_traces(
    body: &str,
    tracking_number: &str,
) -> Result<Vec<NormalizedTraceEvent>, AdapterError> {
    let envelope: StoEnvelope = parse_body(PROVIDER, body)?;

    if !is_truthy(&envelope.success) {
        return Err(business_error(
            ERRORS,
            envelope.error_code.as_deref(),
            envelope.error_msg.as_deref(),
        ));
    }

    let mut data = envelope.data.unwrap_or_default();
    let traces = data
        .remove(tracking_number)
        .or_else(|| {
            let key = data
                .keys()
                .find(|key| key.eq_ignore_ascii_case(tracking_number))
                .cloned()?;
            data.remove(&key)
        })
        .unwrap_or_default();

    let raw = traces.into_iter().map(|trace| RawEvent {
        time: trace.op_time,
        location: trace.op_org_name,
        description: trace.memo.unwrap_or_default(),
        code: trace.scan_type,
    });

    Ok(normalize_events(PROVIDER, &STATUS_CODES, raw))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoEnvelope {
    #[serde(default)]
    success: Value,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_msg: Option<String>,
    #[serde(default)]
    data: Option<HashMap<String, Vec<StoTrace>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoTrace {
    #[serde(default, alias = "scanTime")]
    op_time: Value,
    #[serde(default)]
    scan_type: Option<String>,
    #[serde(default, alias = "desc")]
    memo: Option<String>,
    #[serde(default, alias = "opOrgCityName")]
    op_org_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterErrorKind;
    use crate::adapters::test_support::{block_on, credential, form_field, RecordingHttpClient};

    fn sto_credential() -> crate::CarrierCredential {
        credential(
            CarrierCode::Sto,
            &[
                ("from_app_key", "CAKey"),
                ("from_code", "CACode"),
                ("secret_key", "sto-secret"),
            ],
        )
    }

    fn query(body: &str) -> Result<Vec<NormalizedTraceEvent>, AdapterError> {
        let adapter = StoAdapter::with_http_client(Arc::new(RecordingHttpClient::json(body)));
        let credential = sto_credential();
        block_on(adapter.query(AdapterRequest {
            tracking_number: "7730123456789",
            credential: &credential,
            verification_digits: None,
        }))
    }

    #[test]
    fn data_digest_signs_content_with_secret() {
        let client = Arc::new(RecordingHttpClient::json(r#"{"success":"true","data":{}}"#));
        let adapter = StoAdapter::with_http_client(client.clone());
        let credential = sto_credential();

        let events = block_on(adapter.query(AdapterRequest {
            tracking_number: "7730123456789",
            credential: &credential,
            verification_digits: Some("9876"),
        }))
        .expect("empty data is ok");
        assert!(events.is_empty());

        let requests = client.recorded_requests();
        let body = requests[0].body.as_deref().expect("form body");
        let content = form_field(body, "content");
        assert!(content.contains("7730123456789"));
        assert!(!content.contains("9876"));
        assert_eq!(
            form_field(body, "data_digest"),
            md5_base64(&format!("{content}sto-secret"))
        );
        assert_eq!(form_field(body, "api_name"), API_NAME);
        assert_eq!(form_field(body, "from_appkey"), "CAKey");
        assert!(requests[0].url.starts_with("http://cloudinter-linkgatewaytest"));
    }

    #[test]
    fn parses_events_keyed_by_waybill() {
        let body = json!({
            "success": true,
            "data": {"7730123456789": [
                {"opTime": "2024-05-01 18:00:00", "scanType": "收件", "memo": "快件已揽收", "opOrgName": "广州白云"},
                {"scanTime": "2024-05-02 06:00:00", "scanType": "到件", "desc": "到达广州转运中心", "opOrgCityName": "广州市"},
                {"opTime": "2024-05-04 10:00:00", "scanType": "签收", "memo": "已签收"}
            ]}
        })
        .to_string();

        let events = query(&body).expect("events parse");
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].status, CanonicalStatus::Delivered);
        assert_eq!(events[1].location.as_deref(), Some("广州市"));
        assert_eq!(events[2].status, CanonicalStatus::PickedUp);
    }

    #[test]
    fn string_false_is_business_error() {
        let error = query(r#"{"success":"false","errorCode":"S07","errorMsg":"digest error"}"#)
            .expect_err("must fail");
        assert_eq!(error.kind(), AdapterErrorKind::Business);
        assert_eq!(error.provider_code(), Some("S07"));
        assert!(error.message().contains("secret_key"));
    }
}
