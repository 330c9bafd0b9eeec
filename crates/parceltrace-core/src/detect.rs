//! Carrier inference from tracking-number formats.

use std::sync::LazyLock;

use regex::Regex;

use crate::CarrierCode;

/// Format patterns in priority order; the first match wins.
static PATTERNS: LazyLock<Vec<(CarrierCode, Regex)>> = LazyLock::new(|| {
    [
        (CarrierCode::Sf, r"^SF\d{12,13}$"),
        (CarrierCode::Jd, r"^JD[A-Z0-9]{11,13}$"),
        (CarrierCode::Yto, r"^YT\d{13}$"),
        (CarrierCode::Sto, r"^(77|88|66|55|99)\d{11}$"),
        (CarrierCode::Zto, r"^(7[0-9]|5[0-9]|6[0-9])\d{10}$"),
    ]
    .into_iter()
    .filter_map(|(carrier, pattern)| Regex::new(pattern).ok().map(|regex| (carrier, regex)))
    .collect()
});

/// Infers a carrier from a tracking number.
///
/// Returns `None` when no pattern matches; callers must then supply the
/// carrier explicitly rather than guess.
pub fn detect_carrier(tracking_number: &str) -> Option<CarrierCode> {
    let normalized = tracking_number.trim().to_ascii_uppercase();
    PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(&normalized))
        .map(|(carrier, _)| *carrier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_each_carrier_format() {
        assert_eq!(detect_carrier("SF1234567890123"), Some(CarrierCode::Sf));
        assert_eq!(detect_carrier("sf123456789012"), Some(CarrierCode::Sf));
        assert_eq!(detect_carrier("JDVA12345678901"), Some(CarrierCode::Jd));
        assert_eq!(detect_carrier("YT1234567890123"), Some(CarrierCode::Yto));
        assert_eq!(detect_carrier("7712345678901"), Some(CarrierCode::Sto));
        assert_eq!(detect_carrier("731234567890"), Some(CarrierCode::Zto));
    }

    #[test]
    fn thirteen_digit_sto_prefix_wins_over_zto() {
        assert_eq!(detect_carrier("7700000000001"), Some(CarrierCode::Sto));
        assert_eq!(detect_carrier("770000000001"), Some(CarrierCode::Zto));
    }

    #[test]
    fn unknown_format_is_unresolved() {
        assert_eq!(detect_carrier("1Z999AA10123456784"), None);
        assert_eq!(detect_carrier(""), None);
        assert_eq!(detect_carrier("SF12"), None);
    }

    #[test]
    fn detection_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(detect_carrier("YT9876543210987"), Some(CarrierCode::Yto));
        }
    }
}
