use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::CliError;

/// Metadata attached to every command output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeMeta {
    pub request_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub latency_ms: u64,
}

/// `{meta, data}` wrapper printed on stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub meta: EnvelopeMeta,
    pub data: Value,
}

impl Envelope {
    pub fn new(data: Value, latency_ms: u64) -> Self {
        Self {
            meta: EnvelopeMeta {
                request_id: Uuid::new_v4(),
                generated_at: OffsetDateTime::now_utc(),
                latency_ms,
            },
            data,
        }
    }
}

pub fn render(envelope: &Envelope, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_serializes_meta_then_data() {
        let envelope = Envelope::new(json!({"carrier": "SF"}), 12);
        let value = serde_json::to_value(&envelope).expect("serializable");

        assert_eq!(value["meta"]["latency_ms"], 12);
        assert_eq!(value["data"]["carrier"], "SF");
        let request_id = value["meta"]["request_id"].as_str().expect("string id");
        assert_eq!(request_id.len(), 36);
        assert!(value["meta"]["generated_at"]
            .as_str()
            .is_some_and(|stamp| stamp.ends_with('Z')));
    }
}
