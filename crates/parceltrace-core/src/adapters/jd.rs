use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use time::OffsetDateTime;

use super::{
    business_error, credential_key, normalize_events, parse_body, scalar_text, send, Endpoints,
    RawEvent,
};
use crate::adapter::{AdapterError, AdapterFuture, AdapterRequest, CarrierAdapter};
use crate::http_client::{
    encode_pairs, HttpClient, HttpRequest, ReqwestHttpClient, DEFAULT_TIMEOUT_MS,
};
use crate::signing::md5_hex_upper;
use crate::status::StatusCodeTable;
use crate::{CanonicalStatus, CarrierCode, NormalizedTraceEvent, SHIPPING_OFFSET};

const PROVIDER: &str = "jd";
const METHOD: &str = "jingdong.ldop.receive.trace.get";
const API_VERSION: &str = "2.0";
const SUCCESS_CODE: &str = "100";

pub(crate) const REQUIRED_KEYS: &[&str] = &["app_key", "app_secret", "access_token", "customer_code"];

const ENDPOINTS: Endpoints = Endpoints {
    sandbox: "https://api-dev.jd.com/routerjson",
    production: "https://api.jd.com/routerjson",
};

const STATUS_CODES: StatusCodeTable = StatusCodeTable(&[
    ("揽收", CanonicalStatus::PickedUp),
    ("配送员收货", CanonicalStatus::PickedUp),
    ("分拣中心验货", CanonicalStatus::InTransit),
    ("分拣中心发货", CanonicalStatus::InTransit),
    ("站点验货", CanonicalStatus::InTransit),
    ("配送员开始配送", CanonicalStatus::OutForDelivery),
    ("妥投", CanonicalStatus::Delivered),
    ("拒收", CanonicalStatus::Rejected),
    ("退货", CanonicalStatus::Returned),
]);

const ERRORS: &[(&str, &str)] = &[
    ("19", "the JD access_token is invalid or expired"),
    ("25", "the JD sign was rejected; check the configured app_secret"),
    ("67", "the app is not authorized for trace queries"),
];

/// JD Logistics `jingdong.ldop.receive.trace.get`.
#[derive(Clone)]
pub struct JdAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl Default for JdAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl JdAdapter {
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

    /// JD has no phone check; verification digits are not sent.
    fn build_request(
        &self,
        request: &AdapterRequest<'_>,
        timestamp: &str,
    ) -> Result<HttpRequest, AdapterError> {
        let app_key = credential_key(request.credential, "app_key")?;
        let app_secret = credential_key(request.credential, "app_secret")?;
        let access_token = credential_key(request.credential, "access_token")?;
        let customer_code = credential_key(request.credential, "customer_code")?;

        let param_json = json!({
            "customerCode": customer_code,
            "waybillCode": request.tracking_number,
        })
        .to_string();

        let params = BTreeMap::from([
            ("access_token", access_token),
            ("app_key", app_key),
            ("method", METHOD),
            ("param_json", param_json.as_str()),
            ("timestamp", timestamp),
            ("v", API_VERSION),
        ]);
        let sign = sign_params(&params, app_secret);

        let mut pairs = params.into_iter().collect::<Vec<_>>();
        pairs.push(("sign", sign.as_str()));

        let url = format!(
            "{}?{}",
            ENDPOINTS.for_env(request.credential.environment),
            encode_pairs(&pairs)
        );
        Ok(HttpRequest::get(url).with_timeout_ms(self.timeout_ms))
    }
}

impl CarrierAdapter for JdAdapter {
    fn carrier(&self) -> CarrierCode {
        CarrierCode::Jd
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn query<'a>(&'a self, request: AdapterRequest<'a>) -> AdapterFuture<'a> {
        Box::pin(async move {
            let timestamp = local_timestamp(OffsetDateTime::now_utc());
            let http_request = self.build_request(&request, &timestamp)?;
            let response = send(self.http_client.as_ref(), http_request, PROVIDER).await?;
            parse_traces(&response.body)
        })
    }
}

/// `HEX(MD5(secret + k1v1 + k2v2 + ... + secret))` over key-sorted parameters.
fn sign_params(params: &BTreeMap<&str, &str>, app_secret: &str) -> String {
    let mut joined = String::from(app_secret);
    for (name, value) in params {
        joined.push_str(name);
        joined.push_str(value);
    }
    joined.push_str(app_secret);
    md5_hex_upper(&joined)
}

/// `yyyy-MM-dd HH:mm:ss` wall clock in the shipping offset.
fn local_timestamp(now: OffsetDateTime) -> String {
    let local = now.to_offset(SHIPPING_OFFSET);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        local.year(),
        u8::from(local.month()),
        local.day(),
        local.hour(),
        local.minute(),
        local.second()
    )
}

fn parse_traces(body: &str) -> Result<Vec<NormalizedTraceEvent>, AdapterError> {
    let envelope: JdEnvelope = parse_body(PROVIDER, body)?;

    if let Some(error) = envelope.error_response {
        let code = error.code.as_ref().and_then(scalar_text);
        return Err(business_error(
            ERRORS,
            code.as_deref(),
            error.zh_desc.or(error.en_desc).as_deref(),
        ));
    }

    let result = envelope
        .response
        .and_then(|response| response.querytrace_result)
        .ok_or_else(|| AdapterError::malformed("jd response has no querytrace_result"))?;

    let code = result.code.as_ref().and_then(scalar_text);
    if code.as_deref() != Some(SUCCESS_CODE) {
        return Err(business_error(ERRORS, code.as_deref(), result.message.as_deref()));
    }

    let raw = result.data.unwrap_or_default().into_iter().map(|trace| RawEvent {
        time: trace.ope_time,
        location: trace.ope_name,
        description: trace.ope_remark.unwrap_or_default(),
        code: trace.ope_title,
    });

    Ok(normalize_events(PROVIDER, &STATUS_CODES, raw))
}

#[derive(Debug, Deserialize)]
struct JdEnvelope {
    #[serde(
        default,
        rename = "jingdong_ldop_receive_trace_get_responce",
        alias = "jingdong_ldop_receive_trace_get_response"
    )]
    response: Option<JdResponse>,
    #[serde(default)]
    error_response: Option<JdErrorResponse>,
}

#[derive(Debug, Deserialize)]
struct JdResponse {
    #[serde(default)]
    querytrace_result: Option<JdQueryResult>,
}

#[derive(Debug, Deserialize)]
struct JdQueryResult {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default, rename = "messsage", alias = "message")]
    message: Option<String>,
    #[serde(default)]
    data: Option<Vec<JdTrace>>,
}

#[derive(Debug, Deserialize)]
struct JdErrorResponse {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    zh_desc: Option<String>,
    #[serde(default)]
    en_desc: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JdTrace {
    #[serde(default)]
    ope_time: Value,
    #[serde(default)]
    ope_title: Option<String>,
    #[serde(default)]
    ope_remark: Option<String>,
    #[serde(default)]
    ope_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterErrorKind;
    use crate::adapters::test_support::{block_on, credential, form_fields, RecordingHttpClient};
    use time::macros::datetime;

    fn jd_credential() -> crate::CarrierCredential {
        credential(
            CarrierCode::Jd,
            &[
                ("app_key", "jd-app"),
                ("app_secret", "jd-secret"),
                ("access_token", "jd-token"),
                ("customer_code", "010K000001"),
            ],
        )
    }

    fn query(body: &str) -> Result<Vec<NormalizedTraceEvent>, AdapterError> {
        let adapter = JdAdapter::with_http_client(Arc::new(RecordingHttpClient::json(body)));
        let credential = jd_credential();
        block_on(adapter.query(AdapterRequest {
            tracking_number: "JDVA00000000001",
            credential: &credential,
            verification_digits: None,
        }))
    }

    #[test]
    fn sign_covers_sorted_parameters_wrapped_in_secret() {
        let adapter = JdAdapter::with_http_client(Arc::new(RecordingHttpClient::json("{}")));
        let credential = jd_credential();
        let request = AdapterRequest {
            tracking_number: "JDVA00000000001",
            credential: &credential,
            verification_digits: None,
        };

        let http_request = adapter
            .build_request(&request, "2024-05-01 10:30:00")
            .expect("request builds");
        let (base, query) = http_request.url.split_once('?').expect("query string");
        assert_eq!(base, "https://api-dev.jd.com/routerjson");

        let fields = form_fields(query);
        let value = |name: &str| {
            fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
                .expect("field present")
        };

        let expected = md5_hex_upper(&format!(
            "jd-secretaccess_tokenjd-tokenapp_keyjd-appmethod{METHOD}param_json{}timestamp2024-05-01 10:30:00v2.0jd-secret",
            value("param_json")
        ));
        assert_eq!(value("sign"), expected);
        assert!(value("param_json").contains("\"waybillCode\":\"JDVA00000000001\""));
    }

    #[test]
    fn timestamp_uses_shipping_offset() {
        assert_eq!(
            local_timestamp(datetime!(2024-05-01 02:30:05 UTC)),
            "2024-05-01 10:30:05"
        );
    }

    #[test]
    fn parses_misspelled_wrapper() {
        let body = json!({"jingdong_ldop_receive_trace_get_responce": {
            "code": "0",
            "querytrace_result": {"code": 100, "messsage": "成功", "data": [
                {"opeTime": "2024/05/01 10:00:00", "opeTitle": "揽收", "opeRemark": "您的快件已由配送员揽收", "opeName": "北京亦庄站"},
                {"opeTime": "2024/05/02 11:00:00", "opeTitle": "妥投", "opeRemark": "您的快件已签收"}
            ]}
        }})
        .to_string();

        let events = query(&body).expect("traces parse");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, CanonicalStatus::Delivered);
        assert_eq!(events[1].location.as_deref(), Some("北京亦庄站"));
    }

    #[test]
    fn correctly_spelled_wrapper_is_accepted() {
        let body = json!({"jingdong_ldop_receive_trace_get_response": {
            "querytrace_result": {"code": "100", "message": "ok", "data": []}
        }})
        .to_string();
        assert!(query(&body).expect("empty").is_empty());
    }

    #[test]
    fn error_response_is_business_error() {
        let body = r#"{"error_response":{"code":"19","zh_desc":"无效的access_token","en_desc":"Invalid access_token"}}"#;
        let error = query(body).expect_err("must fail");
        assert_eq!(error.kind(), AdapterErrorKind::Business);
        assert_eq!(error.provider_code(), Some("19"));
        assert!(error.message().contains("access_token"));
    }

    #[test]
    fn non_success_result_code_is_business_error() {
        let body = json!({"jingdong_ldop_receive_trace_get_responce": {
            "querytrace_result": {"code": 101, "messsage": "运单不存在"}
        }})
        .to_string();
        let error = query(&body).expect_err("must fail");
        assert_eq!(error.provider_code(), Some("101"));
        assert_eq!(error.message(), "运单不存在");
    }
}
