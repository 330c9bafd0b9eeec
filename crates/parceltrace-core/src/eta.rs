//! Best-effort delivery estimation.
//!
//! The estimate is a heuristic: a nominal per-carrier transit time minus the
//! days already spent in the network, nudged by the wording of the latest
//! checkpoint. Only the delivered and out-for-delivery cases are exact.

use time::{Date, Duration, OffsetDateTime};

use crate::status::contains_any;
use crate::{CanonicalStatus, CarrierCode, EtaEstimate, NormalizedTraceEvent, SHIPPING_OFFSET};

const DEPOT_ARRIVAL_MARKER: &str = "到达";
const DEPOT_KEYWORDS: &[&str] = &["营业部", "网点", "派送站", "营业点", "站点"];
const DEPOT_PHRASES: &[&str] = &["arrived at destination", "arrived at delivery station"];
const TRANSFER_KEYWORDS: &[&str] = &["转运", "中转", "发往", "运输中", "in transit", "departed"];
const DELAY_KEYWORDS: &[&str] = &["异常", "滞留", "延误", "问题件", "exception", "delay"];

/// Nominal door-to-door transit time in days.
pub const fn sla_days(carrier: CarrierCode) -> i64 {
    match carrier {
        CarrierCode::Sf | CarrierCode::Jd => 2,
        CarrierCode::Zto | CarrierCode::Yto => 3,
        CarrierCode::Sto => 4,
    }
}

/// Estimates delivery from traces ordered newest first.
///
/// `now` is converted to [`SHIPPING_OFFSET`] before "today" is taken.
/// Returned or rejected shipments and empty trace lists yield `None`.
pub fn estimate_delivery(
    carrier: CarrierCode,
    status: CanonicalStatus,
    traces: &[NormalizedTraceEvent],
    now: OffsetDateTime,
) -> Option<EtaEstimate> {
    let latest = traces.first()?;
    let today = now.to_offset(SHIPPING_OFFSET).date();

    match status {
        CanonicalStatus::Delivered => {
            let delivered = traces
                .iter()
                .find(|event| event.status == CanonicalStatus::Delivered)
                .unwrap_or(latest);
            Some(EtaEstimate::AlreadyDelivered {
                at: delivered.timestamp,
            })
        }
        CanonicalStatus::Returned | CanonicalStatus::Rejected => None,
        CanonicalStatus::OutForDelivery => expected(today, 0),
        _ if arrived_at_destination_depot(&latest.description) => expected(today, 1),
        _ => {
            let start = transit_start(traces).unwrap_or(today);
            let elapsed = (today - start).whole_days().max(0);
            let remaining = (sla_days(carrier) - elapsed).max(1);
            let nudged = (remaining + keyword_nudge(&latest.description)).max(1);
            expected(today, nudged)
        }
    }
}

fn expected(today: Date, days: i64) -> Option<EtaEstimate> {
    today
        .checked_add(Duration::days(days))
        .map(|date| EtaEstimate::Expected { date })
}

/// Date of the earliest pickup-like event, or of the oldest event.
fn transit_start(traces: &[NormalizedTraceEvent]) -> Option<Date> {
    traces
        .iter()
        .rev()
        .find(|event| event.status == CanonicalStatus::PickedUp)
        .or_else(|| traces.last())
        .map(|event| event.timestamp.date())
}

fn arrived_at_destination_depot(description: &str) -> bool {
    let text = description.to_lowercase();
    (text.contains(DEPOT_ARRIVAL_MARKER) && contains_any(&text, DEPOT_KEYWORDS))
        || contains_any(&text, DEPOT_PHRASES)
}

fn keyword_nudge(description: &str) -> i64 {
    let text = description.to_lowercase();
    if contains_any(&text, DELAY_KEYWORDS) {
        1
    } else if contains_any(&text, TRANSFER_KEYWORDS) {
        -1
    } else {
        0
    }
}
