//! Carrier adapter contract and adapter-level errors.
//!
//! Every carrier integration implements [`CarrierAdapter`]; the fallback
//! aggregator implements [`SecondaryAggregator`]. Both make exactly one
//! outbound call per invocation and never retry; the tracker decides what
//! happens next.
//!
//! # Example Implementation
//!
//! ```rust,ignore
//! use parceltrace_core::{AdapterFuture, AdapterRequest, CarrierAdapter, CarrierCode};
//!
//! struct MyCarrier;
//!
//! impl CarrierAdapter for MyCarrier {
//!     fn carrier(&self) -> CarrierCode {
//!         CarrierCode::Sf
//!     }
//!
//!     fn required_keys(&self) -> &'static [&'static str] {
//!         &["api_key"]
//!     }
//!
//!     fn query<'a>(&'a self, request: AdapterRequest<'a>) -> AdapterFuture<'a> {
//!         Box::pin(async move { Ok(Vec::new()) })
//!     }
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::http_client::HttpError;
use crate::{CarrierCode, CarrierCredential, NormalizedTraceEvent};

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorKind {
    Transport,
    Business,
    Malformed,
    NeedsVerification,
}

/// Soft failure reported by an adapter; the tracker maps it onto the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterError {
    kind: AdapterErrorKind,
    message: String,
    provider_code: Option<String>,
    timed_out: bool,
}

impl AdapterError {
    pub fn transport(provider: &str, error: &HttpError) -> Self {
        Self {
            kind: AdapterErrorKind::Transport,
            message: format!("{provider} transport error: {}", error.message()),
            provider_code: None,
            timed_out: error.timed_out(),
        }
    }

    pub fn http_status(provider: &str, status: u16) -> Self {
        Self {
            kind: AdapterErrorKind::Transport,
            message: format!("{provider} upstream returned status {status}"),
            provider_code: None,
            timed_out: false,
        }
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Transport,
            message: message.into(),
            provider_code: None,
            timed_out: true,
        }
    }

    pub fn business(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Business,
            message: message.into(),
            provider_code: code.map(str::to_owned),
            timed_out: false,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Malformed,
            message: message.into(),
            provider_code: None,
            timed_out: false,
        }
    }

    pub fn needs_verification(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::NeedsVerification,
            message: message.into(),
            provider_code: None,
            timed_out: false,
        }
    }

    pub const fn kind(&self) -> AdapterErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider_code(&self) -> Option<&str> {
        self.provider_code.as_deref()
    }

    pub const fn is_timeout(&self) -> bool {
        self.timed_out
    }
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.provider_code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Arguments for one carrier query.
#[derive(Debug, Clone, Copy)]
pub struct AdapterRequest<'a> {
    pub tracking_number: &'a str,
    pub credential: &'a CarrierCredential,
    pub verification_digits: Option<&'a str>,
}

pub type AdapterFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<NormalizedTraceEvent>, AdapterError>> + Send + 'a>>;

/// Primary carrier integration.
///
/// An `Ok` with an empty list means the provider answered but has no events
/// yet. Implementations must be `Send + Sync`; they are shared across tasks.
pub trait CarrierAdapter: Send + Sync {
    fn carrier(&self) -> CarrierCode;

    /// Credential key names this adapter cannot sign without.
    fn required_keys(&self) -> &'static [&'static str];

    fn query<'a>(&'a self, request: AdapterRequest<'a>) -> AdapterFuture<'a>;
}

/// Fallback data source queried when a primary adapter fails or is silent.
pub trait SecondaryAggregator: Send + Sync {
    /// Name used for logging and the fallback marker in `status_text`.
    fn name(&self) -> &'static str;

    fn query<'a>(
        &'a self,
        carrier: CarrierCode,
        tracking_number: &'a str,
        verification_digits: Option<&'a str>,
    ) -> AdapterFuture<'a>;
}
