use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical carrier identifiers used in queries, credentials and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CarrierCode {
    Sf,
    Jd,
    Yto,
    Sto,
    Zto,
}

impl CarrierCode {
    pub const ALL: [Self; 5] = [Self::Sf, Self::Jd, Self::Yto, Self::Sto, Self::Zto];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sf => "SF",
            Self::Jd => "JD",
            Self::Yto => "YTO",
            Self::Sto => "STO",
            Self::Zto => "ZTO",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Sf => "SF Express",
            Self::Jd => "JD Logistics",
            Self::Yto => "YTO Express",
            Self::Sto => "STO Express",
            Self::Zto => "ZTO Express",
        }
    }

    /// Names accepted in place of the code, matched case-insensitively.
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Sf => &["sf express", "顺丰", "顺丰速运", "shunfeng"],
            Self::Jd => &["jd logistics", "京东", "京东物流", "京东快递", "jingdong"],
            Self::Yto => &["yto express", "圆通", "圆通速递", "yuantong"],
            Self::Sto => &["sto express", "申通", "申通快递", "shentong"],
            Self::Zto => &["zto express", "中通", "中通快递", "zhongtong"],
        }
    }

    /// Resolves a code or display name back to its carrier.
    pub fn from_code_or_name(value: &str) -> Option<Self> {
        let needle = value.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        Self::ALL.into_iter().find(|carrier| {
            carrier.as_str().eq_ignore_ascii_case(&needle)
                || carrier.aliases().iter().any(|alias| *alias == needle)
        })
    }
}

impl Display for CarrierCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CarrierCode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_code_or_name(value).ok_or_else(|| ValidationError::InvalidCarrier {
            value: value.trim().to_owned(),
        })
    }
}
