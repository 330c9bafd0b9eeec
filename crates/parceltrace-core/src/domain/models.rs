use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize, Serializer};
use time::Date;

use crate::{CanonicalStatus, CarrierCode, ResolveFailure, TraceTime, ValidationError};

const MAX_TRACKING_NUMBER_LEN: usize = 40;

/// Caller input for a single resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingQuery {
    tracking_number: String,
    carrier: Option<String>,
    verification_digits: Option<String>,
}

impl TrackingQuery {
    pub fn new(tracking_number: impl Into<String>) -> Result<Self, ValidationError> {
        let tracking_number = tracking_number.into().trim().to_owned();
        if tracking_number.is_empty() {
            return Err(ValidationError::EmptyTrackingNumber);
        }

        if tracking_number.len() > MAX_TRACKING_NUMBER_LEN {
            return Err(ValidationError::TrackingNumberTooLong {
                len: tracking_number.len(),
                max: MAX_TRACKING_NUMBER_LEN,
            });
        }

        if let Some((index, ch)) = tracking_number
            .char_indices()
            .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || *ch == '-'))
        {
            return Err(ValidationError::TrackingNumberInvalidChar { ch, index });
        }

        Ok(Self {
            tracking_number,
            carrier: None,
            verification_digits: None,
        })
    }

    /// Accepts a carrier code or display name; blank input is ignored.
    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        let carrier = carrier.into().trim().to_owned();
        self.carrier = (!carrier.is_empty()).then_some(carrier);
        self
    }

    pub fn with_verification_digits(
        mut self,
        digits: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let digits = digits.into().trim().to_owned();
        if digits.len() != 4 || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(ValidationError::InvalidVerificationDigits { value: digits });
        }

        self.verification_digits = Some(digits);
        Ok(self)
    }

    pub fn tracking_number(&self) -> &str {
        &self.tracking_number
    }

    pub fn carrier(&self) -> Option<&str> {
        self.carrier.as_deref()
    }

    pub fn verification_digits(&self) -> Option<&str> {
        self.verification_digits.as_deref()
    }
}

/// One provider checkpoint after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTraceEvent {
    pub timestamp: TraceTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_status: Option<String>,
    pub status: CanonicalStatus,
}

/// Which data source produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceProvider {
    Primary,
    Secondary,
}

impl SourceProvider {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl Display for SourceProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort delivery estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EtaEstimate {
    AlreadyDelivered { at: TraceTime },
    Expected { date: Date },
}

/// Machine-checkable status: a canonical status, or the marker asking the
/// caller for verification digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultStatus {
    Tracked(CanonicalStatus),
    NeedPhoneVerify,
}

impl ResultStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tracked(status) => status.as_str(),
            Self::NeedPhoneVerify => "need_phone_verify",
        }
    }
}

impl Display for ResultStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResultStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Outcome of one resolution. Built once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingResult {
    pub tracking_number: String,
    pub carrier_code: Option<CarrierCode>,
    pub carrier_name: Option<String>,
    pub status: ResultStatus,
    pub canonical_status: CanonicalStatus,
    pub status_text: String,
    /// Newest first.
    pub traces: Vec<NormalizedTraceEvent>,
    pub estimated_delivery: Option<EtaEstimate>,
    pub source_provider: SourceProvider,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ResolveFailure>,
}

impl TrackingResult {
    /// Successful result; `traces` must already be ordered newest first.
    pub fn tracked(
        tracking_number: impl Into<String>,
        carrier: CarrierCode,
        traces: Vec<NormalizedTraceEvent>,
        estimated_delivery: Option<EtaEstimate>,
        source_provider: SourceProvider,
        fallback_label: Option<&str>,
    ) -> Self {
        let canonical_status = traces
            .first()
            .map(|event| event.status)
            .unwrap_or(CanonicalStatus::Unknown);
        let status_text = match fallback_label {
            Some(label) => format!("{} (fallback: {label})", canonical_status.label()),
            None => canonical_status.label().to_owned(),
        };

        Self {
            tracking_number: tracking_number.into(),
            carrier_code: Some(carrier),
            carrier_name: Some(carrier.display_name().to_owned()),
            status: ResultStatus::Tracked(canonical_status),
            canonical_status,
            status_text,
            traces,
            estimated_delivery,
            source_provider,
            success: true,
            failure: None,
        }
    }

    /// Failed result; traces are always empty.
    pub fn failed(
        tracking_number: impl Into<String>,
        failure: ResolveFailure,
        source_provider: SourceProvider,
    ) -> Self {
        let carrier = failure.carrier();
        let status = match failure {
            ResolveFailure::VerificationRequired { .. } => ResultStatus::NeedPhoneVerify,
            _ => ResultStatus::Tracked(CanonicalStatus::Unknown),
        };

        Self {
            tracking_number: tracking_number.into(),
            carrier_code: carrier,
            carrier_name: carrier.map(|carrier| carrier.display_name().to_owned()),
            status,
            canonical_status: CanonicalStatus::Unknown,
            status_text: failure.to_string(),
            traces: Vec::new(),
            estimated_delivery: None,
            source_provider,
            success: false,
            failure: Some(failure),
        }
    }

    pub fn needs_verification(&self) -> bool {
        self.status == ResultStatus::NeedPhoneVerify
    }
}
