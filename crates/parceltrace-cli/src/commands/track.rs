use parceltrace_core::{Tracker, TrackingQuery};

use crate::cli::TrackArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(args: &TrackArgs, tracker: &Tracker) -> Result<CommandResult, CliError> {
    let mut query = TrackingQuery::new(args.number.as_str())?;
    if let Some(carrier) = &args.carrier {
        query = query.with_carrier(carrier.as_str());
    }
    if let Some(phone) = &args.phone {
        query = query.with_verification_digits(phone.as_str())?;
    }

    let result = tracker.resolve(query).await;
    let failed = usize::from(!result.success);
    let data = serde_json::to_value(&result)?;

    Ok(CommandResult::ok(data).with_counts(1, failed))
}
