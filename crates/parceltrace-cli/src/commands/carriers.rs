use parceltrace_core::{aggregator_carrier_code, required_keys, sla_days, CarrierCode};
use serde::Serialize;

use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct CarrierInfo {
    code: CarrierCode,
    name: &'static str,
    aliases: &'static [&'static str],
    sla_days: i64,
    required_keys: &'static [&'static str],
    aggregator_code: &'static str,
}

#[derive(Debug, Serialize)]
struct CarriersResponseData {
    carriers: Vec<CarrierInfo>,
}

pub fn run() -> Result<CommandResult, CliError> {
    let carriers = CarrierCode::ALL
        .into_iter()
        .map(|code| CarrierInfo {
            code,
            name: code.display_name(),
            aliases: code.aliases(),
            sla_days: sla_days(code),
            required_keys: required_keys(code),
            aggregator_code: aggregator_carrier_code(code),
        })
        .collect::<Vec<_>>();

    let data = serde_json::to_value(CarriersResponseData { carriers })?;
    Ok(CommandResult::ok(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_carrier() {
        let result = run().expect("carriers list");
        let carriers = result.data["carriers"].as_array().expect("array");

        assert_eq!(carriers.len(), CarrierCode::ALL.len());
        assert_eq!(carriers[0]["code"], "SF");
        assert_eq!(carriers[0]["required_keys"][1], "check_word");
        assert_eq!(result.failed, 0);
    }
}
