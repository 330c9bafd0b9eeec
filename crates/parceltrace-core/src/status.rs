//! Canonical shipment status and provider-dialect normalization.
//!
//! Adapters hand each trace event to [`normalize_status`] together with their
//! own [`StatusCodeTable`]. A provider status code wins when the table knows
//! it; otherwise the free-text description is scanned for keywords in a fixed
//! priority order.

use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed set of normalized statuses shared by every carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    Pending,
    PickedUp,
    InTransit,
    OutForDelivery,
    Delivered,
    Rejected,
    Returned,
    Exception,
    Unknown,
}

impl CanonicalStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PickedUp => "picked_up",
            Self::InTransit => "in_transit",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
            Self::Exception => "exception",
            Self::Unknown => "unknown",
        }
    }

    /// Display-ready label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Awaiting pickup",
            Self::PickedUp => "Picked up",
            Self::InTransit => "In transit",
            Self::OutForDelivery => "Out for delivery",
            Self::Delivered => "Delivered",
            Self::Rejected => "Rejected by recipient",
            Self::Returned => "Returned to sender",
            Self::Exception => "Delivery exception",
            Self::Unknown => "Unknown",
        }
    }
}

impl Display for CanonicalStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider status-code dialect; codes match case-insensitively.
#[derive(Debug, Clone, Copy)]
pub struct StatusCodeTable(pub &'static [(&'static str, CanonicalStatus)]);

impl StatusCodeTable {
    pub fn lookup(&self, code: &str) -> Option<CanonicalStatus> {
        let code = code.trim();
        self.0
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(code))
            .map(|(_, status)| *status)
    }
}

const NOT_DELIVERED_KEYWORDS: &[&str] = &[
    "未妥投",
    "undelivered",
    "undeliverable",
    "not delivered",
    "not be delivered",
    "not yet delivered",
    "not signed for",
];
const DELIVERED_KEYWORDS: &[&str] = &[
    "已签收",
    "签收成功",
    "本人签收",
    "代签收",
    "妥投",
    "已送达",
    "delivered",
    "signed for",
    "signed by",
];
const OUT_FOR_DELIVERY_KEYWORDS: &[&str] = &[
    "派送中",
    "派件中",
    "正在派送",
    "开始派送",
    "开始配送",
    "派件",
    "out for delivery",
    "with courier",
];
const PICKED_UP_KEYWORDS: &[&str] = &[
    "揽收",
    "揽件",
    "已收件",
    "已收取",
    "收寄",
    "picked up",
    "collected",
];
const REJECTED_KEYWORDS: &[&str] = &["拒收", "拒签", "拒绝签收", "rejected", "refused"];
const RETURNED_KEYWORDS: &[&str] = &["退回", "退件", "退签", "返回寄件", "returned", "return to sender"];
const EXCEPTION_KEYWORDS: &[&str] = &[
    "异常",
    "问题件",
    "滞留",
    "延误",
    "无法派送",
    "失败",
    "exception",
    "delayed",
    "failed",
];

/// Keyword groups in priority order; the first group with a hit decides.
/// Negated delivery phrases come first so they never read as `Delivered`.
const KEYWORD_PRIORITY: &[(&[&str], CanonicalStatus)] = &[
    (NOT_DELIVERED_KEYWORDS, CanonicalStatus::Exception),
    (DELIVERED_KEYWORDS, CanonicalStatus::Delivered),
    (OUT_FOR_DELIVERY_KEYWORDS, CanonicalStatus::OutForDelivery),
    (PICKED_UP_KEYWORDS, CanonicalStatus::PickedUp),
    (REJECTED_KEYWORDS, CanonicalStatus::Rejected),
    (RETURNED_KEYWORDS, CanonicalStatus::Returned),
    (EXCEPTION_KEYWORDS, CanonicalStatus::Exception),
];

/// Maps a provider code and/or description into a [`CanonicalStatus`].
pub fn normalize_status(
    table: &StatusCodeTable,
    code: Option<&str>,
    description: &str,
) -> CanonicalStatus {
    if let Some(status) = code.and_then(|code| table.lookup(code)) {
        return status;
    }

    let code_is_blank = code.map_or(true, |code| code.trim().is_empty());
    if description.trim().is_empty() && code_is_blank {
        return CanonicalStatus::Unknown;
    }

    classify_description(description)
}

static KEYWORD_MATCHERS: LazyLock<Vec<(Regex, CanonicalStatus)>> = LazyLock::new(|| {
    KEYWORD_PRIORITY
        .iter()
        .filter_map(|(keywords, status)| keyword_pattern(keywords).map(|regex| (regex, *status)))
        .collect()
});

/// English keywords only match whole words; Chinese ones match anywhere.
fn keyword_pattern(keywords: &[&str]) -> Option<Regex> {
    let alternation = keywords
        .iter()
        .map(|keyword| {
            if keyword.is_ascii() {
                format!(r"\b{}\b", regex::escape(keyword))
            } else {
                regex::escape(keyword)
            }
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).ok()
}

/// Keyword scan over free text; defaults to `InTransit`.
pub fn classify_description(description: &str) -> CanonicalStatus {
    let haystack = description.to_lowercase();
    KEYWORD_MATCHERS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&haystack))
        .map(|(_, status)| *status)
        .unwrap_or(CanonicalStatus::InTransit)
}

pub(crate) fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
