//! Domain models for tracking queries and results.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TrackingQuery`] | Validated caller input |
//! | [`NormalizedTraceEvent`] | One checkpoint with a canonical status |
//! | [`TrackingResult`] | Immutable, provenance-tagged outcome |
//! | [`TraceTime`] | Provider timestamp pinned to the shipping offset |
//! | [`EtaEstimate`] | Delivered marker or expected delivery date |

mod models;
mod timestamp;

pub use models::{
    EtaEstimate, NormalizedTraceEvent, ResultStatus, SourceProvider, TrackingQuery,
    TrackingResult,
};
pub use timestamp::{TraceTime, SHIPPING_OFFSET};
