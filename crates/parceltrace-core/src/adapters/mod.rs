//! Carrier adapters and the fallback aggregator.
//!
//! | Adapter | Carrier | Signing scheme |
//! |---------|---------|----------------|
//! | [`SfAdapter`] | SF | Base64(MD5(urlencode(msgData + timestamp + check_word))) form field |
//! | [`ZtoAdapter`] | ZTO | Base64(MD5(body + app_secret)) in `x-dataDigest` header |
//! | [`YtoAdapter`] | YTO | hex MD5(param + app_secret + timestamp) body field |
//! | [`StoAdapter`] | STO | Base64(MD5(content + secret_key)) form field |
//! | [`JdAdapter`] | JD | HEX MD5(secret + sorted k/v + secret) query parameter |
//! | [`Kuaidi100Aggregator`] | any | HEX MD5(param + key + customer) form field |

mod jd;
mod kuaidi100;
mod sf;
mod sto;
mod yto;
mod zto;

pub use jd::JdAdapter;
pub use kuaidi100::{aggregator_carrier_code, Kuaidi100Aggregator};
pub use sf::SfAdapter;
pub use sto::StoAdapter;
pub use yto::YtoAdapter;
pub use zto::ZtoAdapter;

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::adapter::{AdapterError, CarrierAdapter};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::status::{normalize_status, StatusCodeTable};
use crate::{CarrierCode, CarrierCredential, CredentialEnvironment, NormalizedTraceEvent, TraceTime};

/// Credential key names each built-in adapter requires.
pub fn required_keys(carrier: CarrierCode) -> &'static [&'static str] {
    match carrier {
        CarrierCode::Sf => sf::REQUIRED_KEYS,
        CarrierCode::Zto => zto::REQUIRED_KEYS,
        CarrierCode::Yto => yto::REQUIRED_KEYS,
        CarrierCode::Sto => sto::REQUIRED_KEYS,
        CarrierCode::Jd => jd::REQUIRED_KEYS,
    }
}

/// One adapter per carrier, sharing a transport.
pub fn default_adapters(
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
) -> Vec<Arc<dyn CarrierAdapter>> {
    vec![
        Arc::new(SfAdapter::with_http_client(http_client.clone()).with_timeout_ms(timeout_ms)),
        Arc::new(JdAdapter::with_http_client(http_client.clone()).with_timeout_ms(timeout_ms)),
        Arc::new(YtoAdapter::with_http_client(http_client.clone()).with_timeout_ms(timeout_ms)),
        Arc::new(StoAdapter::with_http_client(http_client.clone()).with_timeout_ms(timeout_ms)),
        Arc::new(ZtoAdapter::with_http_client(http_client).with_timeout_ms(timeout_ms)),
    ]
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Endpoints {
    pub sandbox: &'static str,
    pub production: &'static str,
}

impl Endpoints {
    pub(crate) const fn for_env(self, environment: CredentialEnvironment) -> &'static str {
        match environment {
            CredentialEnvironment::Sandbox => self.sandbox,
            CredentialEnvironment::Production => self.production,
        }
    }
}

/// Provider checkpoint before normalization.
pub(crate) struct RawEvent {
    pub time: Value,
    pub location: Option<String>,
    pub description: String,
    pub code: Option<String>,
}

/// Executes the single outbound call of an adapter invocation.
pub(crate) async fn send(
    http_client: &dyn HttpClient,
    request: HttpRequest,
    provider: &str,
) -> Result<HttpResponse, AdapterError> {
    debug!(provider, host = request.host(), "sending provider request");

    let response = http_client.execute(request).await.map_err(|error| {
        warn!(provider, timed_out = error.timed_out(), "provider transport failure");
        AdapterError::transport(provider, &error)
    })?;

    if !response.is_success() {
        warn!(provider, status = response.status, "provider returned non-success status");
        return Err(AdapterError::http_status(provider, response.status));
    }

    Ok(response)
}

pub(crate) fn credential_key<'a>(
    credential: &'a CarrierCredential,
    name: &str,
) -> Result<&'a str, AdapterError> {
    credential
        .key(name)
        .ok_or_else(|| AdapterError::business(None, format!("credential key '{name}' is not set")))
}

pub(crate) fn parse_body<T>(provider: &str, body: &str) -> Result<T, AdapterError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(body).map_err(|error| {
        AdapterError::malformed(format!("failed to parse {provider} response: {error}"))
    })
}

pub(crate) fn friendly_message(table: &[(&str, &'static str)], code: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, message)| *message)
}

/// Builds a business error, preferring the friendly text for known codes.
pub(crate) fn business_error(
    table: &[(&str, &'static str)],
    code: Option<&str>,
    provider_message: Option<&str>,
) -> AdapterError {
    let message = code
        .and_then(|code| friendly_message(table, code))
        .map(str::to_owned)
        .or_else(|| {
            provider_message
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| String::from("provider reported an unspecified error"));

    AdapterError::business(code, message)
}

/// Renders a JSON scalar as text; strings stay as-is, numbers and bools are formatted.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// Normalizes raw checkpoints and orders them newest first.
///
/// Events without a parseable timestamp are dropped.
pub(crate) fn normalize_events(
    provider: &str,
    table: &StatusCodeTable,
    raw_events: impl IntoIterator<Item = RawEvent>,
) -> Vec<NormalizedTraceEvent> {
    let mut events = raw_events
        .into_iter()
        .filter_map(|raw| {
            let Some(timestamp) = TraceTime::from_json(&raw.time) else {
                debug!(provider, time = %raw.time, "dropping event with unparseable timestamp");
                return None;
            };
            let code = non_blank(raw.code);
            let description = raw.description.trim().to_owned();
            let status = normalize_status(table, code.as_deref(), &description);

            Some(NormalizedTraceEvent {
                timestamp,
                location: non_blank(raw.location),
                description,
                raw_status: code,
                status,
            })
        })
        .collect::<Vec<_>>();

    sort_newest_first(&mut events);
    events
}

pub(crate) fn sort_newest_first(events: &mut [NormalizedTraceEvent]) {
    events.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
}

pub(crate) fn now_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::CanonicalStatus;

    const TABLE: StatusCodeTable = StatusCodeTable(&[("80", CanonicalStatus::Delivered)]);

    #[test]
    fn events_are_sorted_newest_first_and_bad_times_dropped() {
        let raw = vec![
            RawEvent {
                time: Value::from("2024-05-01 08:00:00"),
                location: Some(String::from("深圳")),
                description: String::from("顺丰速运 已收取快件"),
                code: Some(String::from("50")),
            },
            RawEvent {
                time: Value::from("not a time"),
                location: None,
                description: String::from("ignored"),
                code: None,
            },
            RawEvent {
                time: Value::from("2024-05-02 09:00:00"),
                location: Some(String::from("  ")),
                description: String::from("包裹已签收"),
                code: Some(String::from("80")),
            },
        ];

        let events = normalize_events("test", &TABLE, raw);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, CanonicalStatus::Delivered);
        assert_eq!(events[0].location, None);
        assert_eq!(events[1].status, CanonicalStatus::PickedUp);
    }

    #[test]
    fn business_error_prefers_friendly_text() {
        let table = [("E1", "friendly text")];
        let error = business_error(&table, Some("E1"), Some("raw text"));
        assert_eq!(error.message(), "friendly text");
        assert_eq!(error.provider_code(), Some("E1"));

        let error = business_error(&table, Some("E9"), Some("raw text"));
        assert_eq!(error.message(), "raw text");
    }

    #[test]
    fn every_carrier_declares_required_keys() {
        for carrier in CarrierCode::ALL {
            assert!(!required_keys(carrier).is_empty(), "{carrier}");
        }
    }
}
