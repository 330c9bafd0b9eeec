use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{business_error, normalize_events, non_blank, parse_body, scalar_text, send, RawEvent};
use crate::adapter::{AdapterError, AdapterFuture, SecondaryAggregator};
use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::signing::md5_hex_upper;
use crate::status::StatusCodeTable;
use crate::{CanonicalStatus, CarrierCode, NormalizedTraceEvent};

const PROVIDER: &str = "kuaidi100";
const ENDPOINT: &str = "https://poll.kuaidi100.com/poll/query.do";

pub const CUSTOMER_ENV: &str = "PARCELTRACE_KUAIDI100_CUSTOMER";
pub const KEY_ENV: &str = "PARCELTRACE_KUAIDI100_KEY";

const STATUS_CODES: StatusCodeTable = StatusCodeTable(&[
    ("在途", CanonicalStatus::InTransit),
    ("0", CanonicalStatus::InTransit),
    ("揽收", CanonicalStatus::PickedUp),
    ("1", CanonicalStatus::PickedUp),
    ("疑难", CanonicalStatus::Exception),
    ("2", CanonicalStatus::Exception),
    ("签收", CanonicalStatus::Delivered),
    ("3", CanonicalStatus::Delivered),
    ("退签", CanonicalStatus::Returned),
    ("4", CanonicalStatus::Returned),
    ("派件", CanonicalStatus::OutForDelivery),
    ("5", CanonicalStatus::OutForDelivery),
    ("退回", CanonicalStatus::Returned),
    ("6", CanonicalStatus::Returned),
    ("转投", CanonicalStatus::InTransit),
    ("7", CanonicalStatus::InTransit),
    ("拒签", CanonicalStatus::Rejected),
    ("14", CanonicalStatus::Rejected),
    ("清关", CanonicalStatus::InTransit),
    ("下单", CanonicalStatus::Pending),
]);

const ERRORS: &[(&str, &str)] = &[
    ("400", "kuaidi100 rejected the request parameters"),
    ("501", "kuaidi100 is temporarily unavailable"),
    ("502", "kuaidi100 query quota exceeded"),
    ("503", "kuaidi100 rejected the sign; check customer and key"),
    ("601", "the kuaidi100 key has expired or has no remaining balance"),
];

const NO_DATA_CODE: &str = "500";
const VERIFICATION_CODE: &str = "408";

/// Kuaidi100 company code for a carrier.
pub const fn aggregator_carrier_code(carrier: CarrierCode) -> &'static str {
    match carrier {
        CarrierCode::Sf => "shunfeng",
        CarrierCode::Zto => "zhongtong",
        CarrierCode::Yto => "yuantong",
        CarrierCode::Sto => "shentong",
        CarrierCode::Jd => "jd",
    }
}

/// Kuaidi100 real-time query, used as the secondary source.
#[derive(Clone)]
pub struct Kuaidi100Aggregator {
    customer: String,
    key: String,
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl std::fmt::Debug for Kuaidi100Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kuaidi100Aggregator")
            .field("customer", &self.customer)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

impl Kuaidi100Aggregator {
    pub fn new(
        customer: impl Into<String>,
        key: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            customer: customer.into(),
            key: key.into(),
            http_client,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Reads `PARCELTRACE_KUAIDI100_CUSTOMER` and `PARCELTRACE_KUAIDI100_KEY`;
    /// `None` unless both are set and non-blank.
    pub fn from_env(http_client: Arc<dyn HttpClient>) -> Option<Self> {
        Self::from_lookup(http_client, |name| std::env::var(name).ok())
    }

    pub fn from_lookup(
        http_client: Arc<dyn HttpClient>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<Self> {
        let customer = non_blank(lookup(CUSTOMER_ENV))?;
        let key = non_blank(lookup(KEY_ENV))?;
        Some(Self::new(customer, key, http_client))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn build_request(
        &self,
        carrier: CarrierCode,
        tracking_number: &str,
        verification_digits: Option<&str>,
    ) -> HttpRequest {
        let mut param = json!({
            "com": aggregator_carrier_code(carrier),
            "num": tracking_number,
            "resultv2": "1",
        });
        if let Some(digits) = verification_digits {
            param["phone"] = Value::from(digits);
        }
        let param = param.to_string();
        let sign = md5_hex_upper(&format!("{param}{}{}", self.key, self.customer));

        HttpRequest::post(ENDPOINT)
            .with_form(&[
                ("customer", self.customer.as_str()),
                ("sign", &sign),
                ("param", &param),
            ])
            .with_timeout_ms(self.timeout_ms)
    }
}

impl SecondaryAggregator for Kuaidi100Aggregator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn query<'a>(
        &'a self,
        carrier: CarrierCode,
        tracking_number: &'a str,
        verification_digits: Option<&'a str>,
    ) -> AdapterFuture<'a> {
        Box::pin(async move {
            let http_request = self.build_request(carrier, tracking_number, verification_digits);
            let response = send(self.http_client.as_ref(), http_request, PROVIDER).await?;
            parse_events(&response.body)
        })
    }
}

fn parse_events(body: &str) -> Result<Vec<NormalizedTraceEvent>, AdapterError> {
    let response: Kuaidi100Response = parse_body(PROVIDER, body)?;

    // Successful queries carry `data` and omit `returnCode` or set `result: true`.
    if let Some(code) = response.return_code.as_ref().and_then(scalar_text) {
        if response.data.is_none() || response.result == Some(false) {
            return match code.as_str() {
                NO_DATA_CODE => Ok(Vec::new()),
                VERIFICATION_CODE => Err(AdapterError::needs_verification(
                    "kuaidi100 requires the last 4 digits of the phone number",
                )),
                _ => Err(business_error(
                    ERRORS,
                    Some(code.as_str()),
                    response.message.as_deref(),
                )),
            };
        }
    }

    // resultv2 responses repeat fields under both names; the first non-empty wins.
    let raw = response.data.unwrap_or_default().into_iter().map(|event| RawEvent {
        time: if event.time.is_null() { event.ftime } else { event.time },
        location: non_blank(event.location).or(event.area_name),
        description: event.context.unwrap_or_default(),
        code: event
            .status
            .as_ref()
            .and_then(scalar_text)
            .or_else(|| event.status_code.as_ref().and_then(scalar_text)),
    });

    Ok(normalize_events(PROVIDER, &STATUS_CODES, raw))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Kuaidi100Response {
    #[serde(default)]
    result: Option<bool>,
    #[serde(default)]
    return_code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Vec<Kuaidi100Event>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Kuaidi100Event {
    #[serde(default)]
    time: Value,
    #[serde(default)]
    ftime: Value,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    area_name: Option<String>,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    status_code: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterErrorKind;
    use crate::adapters::test_support::{block_on, form_field, RecordingHttpClient};
    use std::collections::HashMap;

    fn aggregator_answering(body: &str) -> (Kuaidi100Aggregator, Arc<RecordingHttpClient>) {
        let client = Arc::new(RecordingHttpClient::json(body));
        (
            Kuaidi100Aggregator::new("CUSTOMER01", "kd-key", client.clone()),
            client,
        )
    }

    #[test]
    fn sign_is_upper_hex_over_param_key_customer() {
        let (aggregator, client) = aggregator_answering(r#"{"message":"ok","state":"0","data":[]}"#);

        let events = block_on(aggregator.query(CarrierCode::Zto, "73100000000001", Some("4321")))
            .expect("empty data is ok");
        assert!(events.is_empty());

        let requests = client.recorded_requests();
        let body = requests[0].body.as_deref().expect("form body");
        let param = form_field(body, "param");
        assert!(param.contains("\"com\":\"zhongtong\""));
        assert!(param.contains("\"phone\":\"4321\""));
        assert_eq!(
            form_field(body, "sign"),
            md5_hex_upper(&format!("{param}kd-keyCUSTOMER01"))
        );
        assert_eq!(requests[0].url, ENDPOINT);
    }

    #[test]
    fn parses_events_with_numeric_and_named_status() {
        let body = json!({
            "message": "ok",
            "state": "3",
            "data": [
                {"time": "2024-05-03 14:00:00", "ftime": "2024-05-03 14:00:00", "context": "已签收", "areaName": "杭州市", "status": "签收"},
                {"ftime": "2024-05-02 09:00:00", "context": "快件离开转运中心", "statusCode": "0"}
            ]
        })
        .to_string();
        let (aggregator, _) = aggregator_answering(&body);

        let events = block_on(aggregator.query(CarrierCode::Sf, "SF1234567890123", None))
            .expect("events parse");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, CanonicalStatus::Delivered);
        assert_eq!(events[0].location.as_deref(), Some("杭州市"));
        assert_eq!(events[1].status, CanonicalStatus::InTransit);
    }

    #[test]
    fn return_codes_map_to_outcomes() {
        let (aggregator, _) =
            aggregator_answering(r#"{"result":false,"returnCode":"500","message":"查询无结果"}"#);
        let events =
            block_on(aggregator.query(CarrierCode::Yto, "YT1234567890123", None)).expect("no data");
        assert!(events.is_empty());

        let (aggregator, _) =
            aggregator_answering(r#"{"result":false,"returnCode":"408","message":"需要手机号"}"#);
        let error = block_on(aggregator.query(CarrierCode::Sf, "SF1234567890123", None))
            .expect_err("needs verification");
        assert_eq!(error.kind(), AdapterErrorKind::NeedsVerification);

        let (aggregator, _) = aggregator_answering(r#"{"result":false,"returnCode":503,"message":"sign"}"#);
        let error = block_on(aggregator.query(CarrierCode::Sf, "SF1234567890123", None))
            .expect_err("bad sign");
        assert_eq!(error.kind(), AdapterErrorKind::Business);
        assert_eq!(error.provider_code(), Some("503"));
    }

    #[test]
    fn lookup_requires_customer_and_key() {
        let client: Arc<dyn HttpClient> = Arc::new(RecordingHttpClient::json("{}"));
        let vars = HashMap::from([(CUSTOMER_ENV, "CUSTOMER01"), (KEY_ENV, " ")]);

        let configured = Kuaidi100Aggregator::from_lookup(client.clone(), |name| {
            vars.get(name).map(|value| value.to_string())
        });
        assert!(configured.is_none());

        let configured = Kuaidi100Aggregator::from_lookup(client, |name| match name {
            CUSTOMER_ENV => Some(String::from("CUSTOMER01")),
            KEY_ENV => Some(String::from("kd-key")),
            _ => None,
        });
        assert!(configured.is_some());
    }

    #[test]
    fn every_carrier_has_an_aggregator_code() {
        for carrier in CarrierCode::ALL {
            assert!(!aggregator_carrier_code(carrier).is_empty());
        }
    }
}
