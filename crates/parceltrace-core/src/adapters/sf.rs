use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{
    business_error, credential_key, normalize_events, now_millis, parse_body, scalar_text, send,
    Endpoints, RawEvent,
};
use crate::adapter::{AdapterError, AdapterFuture, AdapterRequest, CarrierAdapter};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient, DEFAULT_TIMEOUT_MS};
use crate::signing::md5_base64;
use crate::status::StatusCodeTable;
use crate::{CanonicalStatus, CarrierCode, NormalizedTraceEvent};

const PROVIDER: &str = "sf";
const SERVICE_CODE: &str = "EXP_RECE_SEARCH_ROUTES";
const SUCCESS_CODE: &str = "A1000";

pub(crate) const REQUIRED_KEYS: &[&str] = &["partner_id", "check_word"];

const ENDPOINTS: Endpoints = Endpoints {
    sandbox: "https://sfapi-sbox.sf-express.com/std/service",
    production: "https://sfapi.sf-express.com/std/service",
};

const STATUS_CODES: StatusCodeTable = StatusCodeTable(&[
    ("50", CanonicalStatus::PickedUp),
    ("51", CanonicalStatus::PickedUp),
    ("54", CanonicalStatus::PickedUp),
    ("30", CanonicalStatus::InTransit),
    ("31", CanonicalStatus::InTransit),
    ("36", CanonicalStatus::InTransit),
    ("310", CanonicalStatus::InTransit),
    ("44", CanonicalStatus::OutForDelivery),
    ("204", CanonicalStatus::OutForDelivery),
    ("80", CanonicalStatus::Delivered),
    ("8000", CanonicalStatus::Delivered),
    ("33", CanonicalStatus::Exception),
    ("70", CanonicalStatus::Exception),
    ("99", CanonicalStatus::Returned),
    ("648", CanonicalStatus::Returned),
]);

/// Gateway-level `apiResultCode` values.
const API_ERRORS: &[(&str, &str)] = &[
    ("A1001", "a required request parameter is missing"),
    ("A1002", "the SF gateway timed out"),
    ("A1003", "the calling IP address is not whitelisted"),
    ("A1004", "the partner is not authorized for route queries"),
    ("A1006", "msgDigest was rejected; check the configured check_word"),
    ("A1009", "the SF route service failed"),
];

/// Route-service `errorCode` values.
const ROUTE_ERRORS: &[(&str, &str)] = &[
    ("8150", "the waybill does not belong to this partner"),
    ("8151", "the tracking number format is invalid"),
    ("8153", "too many queries for this waybill; try again later"),
];

const VERIFICATION_CODE: &str = "8152";

/// SF Express route query (`EXP_RECE_SEARCH_ROUTES`).
#[derive(Clone)]
pub struct SfAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl Default for SfAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl SfAdapter {
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
        request_id: &str,
    ) -> Result<HttpRequest, AdapterError> {
        let partner_id = credential_key(request.credential, "partner_id")?;
        let check_word = credential_key(request.credential, "check_word")?;

        let mut msg_data = json!({
            "language": "0",
            "trackingType": "1",
            "trackingNumber": [request.tracking_number],
            "methodType": "1",
        });
        if let Some(digits) = request.verification_digits {
            msg_data["checkPhoneNo"] = Value::from(digits);
        }
        let msg_data = msg_data.to_string();
        let timestamp = timestamp_ms.to_string();
        let digest = msg_digest(&msg_data, &timestamp, check_word);

        Ok(
            HttpRequest::post(ENDPOINTS.for_env(request.credential.environment))
                .with_form(&[
                    ("partnerID", partner_id),
                    ("requestID", request_id),
                    ("serviceCode", SERVICE_CODE),
                    ("timestamp", &timestamp),
                    ("msgData", &msg_data),
                    ("msgDigest", &digest),
                ])
                .with_timeout_ms(self.timeout_ms),
        )
    }
}

impl CarrierAdapter for SfAdapter {
    fn carrier(&self) -> CarrierCode {
        CarrierCode::Sf
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn query<'a>(&'a self, request: AdapterRequest<'a>) -> AdapterFuture<'a> {
        Box::pin(async move {
            let request_id = Uuid::new_v4().simple().to_string();
            let http_request = self.build_request(&request, now_millis(), &request_id)?;
            let response = send(self.http_client.as_ref(), http_request, PROVIDER).await?;
            parse_routes(&response.body, request.tracking_number)
        })
    }
}

/// `Base64(MD5(urlencode(msgData + timestamp + checkWord)))`.
fn msg_digest(msg_data: &str, timestamp: &str, check_word: &str) -> String {
    let joined = format!("{msg_data}{timestamp}{check_word}");
    md5_base64(&urlencoding::encode(&joined))
}

fn parse_routes(
    body: &str,
    tracking_number: &str,
) -> Result<Vec<NormalizedTraceEvent>, AdapterError> {
    let envelope: SfEnvelope = parse_body(PROVIDER, body)?;
    if envelope.api_result_code != SUCCESS_CODE {
        return Err(business_error(
            API_ERRORS,
            Some(envelope.api_result_code.as_str()),
            envelope.api_error_msg.as_deref(),
        ));
    }

    let data: SfResultData = match envelope.api_result_data {
        Some(Value::String(text)) => parse_body(PROVIDER, &text)?,
        Some(value @ Value::Object(_)) => serde_json::from_value(value).map_err(|error| {
            AdapterError::malformed(format!("failed to parse sf apiResultData: {error}"))
        })?,
        _ => return Err(AdapterError::malformed("sf response has no apiResultData")),
    };

    if !data.success {
        let message = data.error_msg.unwrap_or_default();
        if data.error_code.as_deref() == Some(VERIFICATION_CODE)
            || message.contains("手机")
            || message.contains("checkPhoneNo")
        {
            return Err(AdapterError::needs_verification(
                "sf requires the last 4 digits of the sender or recipient phone",
            ));
        }
        return Err(business_error(
            ROUTE_ERRORS,
            data.error_code.as_deref(),
            Some(message.as_str()),
        ));
    }

    let routes = data
        .msg_data
        .map(|msg_data| msg_data.route_resps)
        .unwrap_or_default()
        .into_iter()
        .filter(|resp| {
            resp.mail_no
                .as_deref()
                .map_or(true, |mail_no| mail_no.eq_ignore_ascii_case(tracking_number))
        })
        .flat_map(|resp| resp.routes)
        .map(|route| RawEvent {
            time: route.accept_time,
            location: route.accept_address,
            description: route.remark.unwrap_or_default(),
            code: route.op_code.as_ref().and_then(scalar_text),
        });

    Ok(normalize_events(PROVIDER, &STATUS_CODES, routes))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SfEnvelope {
    api_result_code: String,
    #[serde(default)]
    api_error_msg: Option<String>,
    #[serde(default)]
    api_result_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SfResultData {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_msg: Option<String>,
    #[serde(default)]
    msg_data: Option<SfMsgData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SfMsgData {
    #[serde(default)]
    route_resps: Vec<SfRouteResp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SfRouteResp {
    #[serde(default)]
    mail_no: Option<String>,
    #[serde(default)]
    routes: Vec<SfRoute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SfRoute {
    #[serde(default, alias = "accept_time")]
    accept_time: Value,
    #[serde(default, alias = "accept_address")]
    accept_address: Option<String>,
    #[serde(default, alias = "description")]
    remark: Option<String>,
    #[serde(default, alias = "opcode", alias = "op_code")]
    op_code: Option<Value>,
}
