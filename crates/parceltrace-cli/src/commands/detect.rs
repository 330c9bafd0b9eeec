use parceltrace_core::{detect_carrier, CarrierCode, TrackingQuery};
use serde::Serialize;

use crate::cli::DetectArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct DetectResponseData {
    tracking_number: String,
    carrier_code: Option<CarrierCode>,
    carrier_name: Option<&'static str>,
}

pub fn run(args: &DetectArgs) -> Result<CommandResult, CliError> {
    let query = TrackingQuery::new(args.number.as_str())?;
    let carrier = detect_carrier(query.tracking_number());

    let data = serde_json::to_value(DetectResponseData {
        tracking_number: query.tracking_number().to_owned(),
        carrier_code: carrier,
        carrier_name: carrier.map(CarrierCode::display_name),
    })?;

    Ok(CommandResult::ok(data).with_counts(1, usize::from(carrier.is_none())))
}
