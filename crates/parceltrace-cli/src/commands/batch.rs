use std::io;
use std::path::Path;

use parceltrace_core::{Tracker, TrackingQuery, TrackingResult};
use serde::Serialize;

use crate::cli::BatchArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct BatchResponseData {
    total: usize,
    succeeded: usize,
    failed: usize,
    results: Vec<TrackingResult>,
}

pub async fn run(args: &BatchArgs, tracker: &Tracker) -> Result<CommandResult, CliError> {
    let queries = read_queries(&args.input)?;
    let results = tracker.resolve_batch(queries).await;

    let total = results.len();
    let succeeded = results.iter().filter(|result| result.success).count();
    let failed = total - succeeded;
    let data = serde_json::to_value(BatchResponseData {
        total,
        succeeded,
        failed,
        results,
    })?;

    Ok(CommandResult::ok(data).with_counts(total, failed))
}

fn read_queries(input: &Path) -> Result<Vec<TrackingQuery>, CliError> {
    let text = if input.as_os_str() == "-" {
        io::read_to_string(io::stdin())?
    } else {
        std::fs::read_to_string(input)?
    };
    parse_queries(&text)
}

/// Parses `number[,carrier[,digits]]` lines, skipping blanks and `#` comments.
fn parse_queries(text: &str) -> Result<Vec<TrackingQuery>, CliError> {
    let mut queries = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let at_line = |error: parceltrace_core::ValidationError| CliError::Input {
            line: index + 1,
            message: error.to_string(),
        };

        let mut fields = line.split(',').map(str::trim);
        let number = fields.next().unwrap_or_default();
        let mut query = TrackingQuery::new(number).map_err(at_line)?;

        if let Some(carrier) = fields.next().filter(|carrier| !carrier.is_empty()) {
            query = query.with_carrier(carrier);
        }
        if let Some(digits) = fields.next().filter(|digits| !digits.is_empty()) {
            query = query.with_verification_digits(digits).map_err(at_line)?;
        }
        if fields.next().is_some() {
            return Err(CliError::Input {
                line: index + 1,
                message: String::from("expected at most 3 fields: number,carrier,digits"),
            });
        }

        queries.push(query);
    }

    Ok(queries)
}
