//! # Parceltrace Core
//!
//! Multi-carrier shipment tracking: carrier detection, signed provider
//! queries, status normalization, fallback to an aggregator, and delivery
//! estimation.
//!
//! ## Overview
//!
//! - **Carrier detection** from tracking-number formats
//! - **Carrier adapters** for SF, JD, YTO, STO and ZTO, each with its own signing scheme
//! - **Status normalization** of provider codes and free text into one closed enum
//! - **Fallback** to the Kuaidi100 aggregator when the carrier API fails or is silent
//! - **Delivery estimation** from traces and per-carrier transit times
//! - **Batch resolution** with a concurrency cap and per-query deadlines
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapter`] | Adapter and aggregator traits, adapter errors |
//! | [`adapters`] | Provider implementations |
//! | [`carrier`] | Carrier codes, names and aliases |
//! | [`credential`] | Credential model and read-only store |
//! | [`detect`] | Carrier detection |
//! | [`domain`] | Queries, trace events and results |
//! | [`error`] | Validation errors and the failure taxonomy |
//! | [`eta`] | Delivery estimation |
//! | [`http_client`] | HTTP client abstraction |
//! | [`signing`] | Digest helpers |
//! | [`status`] | Canonical status and normalization |
//! | [`tracker`] | Resolution cascade and batch execution |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parceltrace_core::{TrackerBuilder, TrackingQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tracker = TrackerBuilder::new().with_env_config().build()?;
//!
//!     let query = TrackingQuery::new("SF1234567890123")?.with_verification_digits("5678")?;
//!     let result = tracker.resolve(query).await;
//!
//!     if result.needs_verification() {
//!         println!("ask the user for the last 4 phone digits");
//!     } else {
//!         println!("{}: {}", result.tracking_number, result.status_text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │    Tracker      │────▶│ Credential Store │
//! └────────┬────────┘     └──────────────────┘
//!          │ primary            │ fallback
//!          ▼                    ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Carrier Adapter │     │ Kuaidi100        │
//! └────────┬────────┘     └────────┬─────────┘
//!          └──────────┬────────────┘
//!                     ▼
//!          ┌──────────────────┐
//!          │ HTTP Client      │
//!          └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Resolution never fails at the type level; failures are carried on the
//! result:
//!
//! ```rust
//! use parceltrace_core::{FailureCategory, TrackingResult};
//!
//! fn guidance(result: &TrackingResult) -> &'static str {
//!     match result.failure.as_ref().map(|failure| failure.category()) {
//!         None => "ok",
//!         Some(FailureCategory::Configuration) => "fix the carrier credential",
//!         Some(FailureCategory::VerificationRequired) => "ask for phone digits",
//!         Some(FailureCategory::NoDataYet) => "try again later",
//!         Some(_) => "report the error",
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - Credential values are never logged and are redacted from `Debug` output
//! - Request logging records the provider host only, never query strings or digests

pub mod adapter;
pub mod adapters;
pub mod carrier;
pub mod credential;
pub mod detect;
pub mod domain;
pub mod error;
pub mod eta;
pub mod http_client;
pub mod signing;
pub mod status;
pub mod tracker;

// Adapter contract
pub use adapter::{
    AdapterError, AdapterErrorKind, AdapterFuture, AdapterRequest, CarrierAdapter,
    SecondaryAggregator,
};

// Provider implementations
pub use adapters::{
    aggregator_carrier_code, default_adapters, required_keys, JdAdapter, Kuaidi100Aggregator,
    SfAdapter, StoAdapter, YtoAdapter, ZtoAdapter,
};

// Carriers and detection
pub use carrier::CarrierCode;
pub use detect::detect_carrier;

// Credentials
pub use credential::{
    CarrierCredential, CredentialEnvironment, CredentialFuture, CredentialStore,
    StaticCredentialStore,
};

// Domain models
pub use domain::{
    EtaEstimate, NormalizedTraceEvent, ResultStatus, SourceProvider, TraceTime, TrackingQuery,
    TrackingResult, SHIPPING_OFFSET,
};

// Error types
pub use error::{BuildError, FailureCategory, ResolveFailure, ValidationError};

// Estimation
pub use eta::{estimate_delivery, sla_days};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpFuture, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Status normalization
pub use status::{classify_description, normalize_status, CanonicalStatus, StatusCodeTable};

// Tracker
pub use tracker::{Clock, Tracker, TrackerBuilder, TrackerConfig, DEFAULT_MAX_CONCURRENCY};
