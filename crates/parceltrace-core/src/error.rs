use serde::Serialize;
use thiserror::Error;

use crate::CarrierCode;

/// Validation errors raised while building queries, credentials and configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("tracking number cannot be empty")]
    EmptyTrackingNumber,
    #[error("tracking number length {len} exceeds max {max}")]
    TrackingNumberTooLong { len: usize, max: usize },
    #[error("tracking number contains invalid character '{ch}' at index {index}")]
    TrackingNumberInvalidChar { ch: char, index: usize },

    #[error("verification digits must be exactly 4 ASCII digits: '{value}'")]
    InvalidVerificationDigits { value: String },

    #[error("invalid carrier '{value}', expected a code (SF, ZTO, YTO, STO, JD) or a known name")]
    InvalidCarrier { value: String },

    #[error("invalid environment '{value}', expected sandbox or production")]
    InvalidEnvironment { value: String },

    #[error("timestamp '{value}' is not in a recognized provider format")]
    InvalidTimestamp { value: String },
}

/// Coarse classification of a failed resolution, used by callers for branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Configuration,
    CarrierUnresolved,
    Transport,
    ProviderBusiness,
    VerificationRequired,
    NoDataYet,
    Internal,
}

/// Why a resolution did not produce trace events.
///
/// Every variant is recovered by the tracker and surfaced on the returned
/// [`TrackingResult`](crate::TrackingResult); none of them escape as a panic.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveFailure {
    #[error("carrier unknown for '{input}'; supply a carrier code or name")]
    CarrierUnresolved { input: String },

    #[error("no credential is configured for {carrier}")]
    CredentialMissing { carrier: CarrierCode },

    #[error("the credential for {carrier} is disabled")]
    CredentialDisabled { carrier: CarrierCode },

    #[error("the credential for {carrier} is incomplete; missing {}", .missing.join(", "))]
    CredentialIncomplete {
        carrier: CarrierCode,
        missing: Vec<String>,
    },

    #[error("{provider} could not be reached: {message}")]
    Transport {
        carrier: CarrierCode,
        provider: String,
        message: String,
        timed_out: bool,
    },

    #[error("{provider} rejected the query: {message}")]
    ProviderBusiness {
        carrier: CarrierCode,
        provider: String,
        code: Option<String>,
        message: String,
    },

    #[error("{carrier} requires the last 4 digits of the recipient phone number")]
    VerificationRequired { carrier: CarrierCode },

    #[error("{carrier} has no trace data yet; the shipment may have just been created")]
    NoDataYet { carrier: CarrierCode },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ResolveFailure {
    pub const fn category(&self) -> FailureCategory {
        match self {
            Self::CarrierUnresolved { .. } => FailureCategory::CarrierUnresolved,
            Self::CredentialMissing { .. }
            | Self::CredentialDisabled { .. }
            | Self::CredentialIncomplete { .. } => FailureCategory::Configuration,
            Self::Transport { .. } => FailureCategory::Transport,
            Self::ProviderBusiness { .. } => FailureCategory::ProviderBusiness,
            Self::VerificationRequired { .. } => FailureCategory::VerificationRequired,
            Self::NoDataYet { .. } => FailureCategory::NoDataYet,
            Self::Internal { .. } => FailureCategory::Internal,
        }
    }

    pub const fn carrier(&self) -> Option<CarrierCode> {
        match self {
            Self::CredentialMissing { carrier }
            | Self::CredentialDisabled { carrier }
            | Self::CredentialIncomplete { carrier, .. }
            | Self::Transport { carrier, .. }
            | Self::ProviderBusiness { carrier, .. }
            | Self::VerificationRequired { carrier }
            | Self::NoDataYet { carrier } => Some(*carrier),
            Self::CarrierUnresolved { .. } | Self::Internal { .. } => None,
        }
    }
}

/// Contract violations detected while assembling a [`Tracker`](crate::Tracker).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("no adapter is registered for carrier {carrier}")]
    MissingAdapter { carrier: CarrierCode },

    #[error("adapter registered under {registered} reports carrier {reported}")]
    MismatchedAdapter {
        registered: CarrierCode,
        reported: CarrierCode,
    },

    #[error("max_concurrency must be greater than zero")]
    ZeroConcurrency,

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
}
