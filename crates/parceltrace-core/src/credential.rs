//! Carrier credentials and the read-only store they are fetched from.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CarrierCode, ValidationError};

/// Which provider deployment a credential targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialEnvironment {
    Sandbox,
    #[default]
    Production,
}

impl FromStr for CredentialEnvironment {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "test" => Ok(Self::Sandbox),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ValidationError::InvalidEnvironment {
                value: other.to_owned(),
            }),
        }
    }
}

/// Auth material for one carrier. Key names are provider specific.
#[derive(Clone, PartialEq, Eq)]
pub struct CarrierCredential {
    pub carrier: CarrierCode,
    pub keys: BTreeMap<String, String>,
    pub environment: CredentialEnvironment,
    pub enabled: bool,
}

impl CarrierCredential {
    pub fn new(carrier: CarrierCode, environment: CredentialEnvironment) -> Self {
        Self {
            carrier,
            keys: BTreeMap::new(),
            environment,
            enabled: true,
        }
    }

    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(name.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Returns a non-blank key value.
    pub fn key(&self, name: &str) -> Option<&str> {
        self.keys
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Required key names that are absent or blank.
    pub fn missing_keys(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.key(name).is_none())
            .map(|name| (*name).to_owned())
            .collect()
    }
}

// Key values never reach logs.
impl Debug for CarrierCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierCredential")
            .field("carrier", &self.carrier)
            .field("keys", &self.keys.keys().collect::<Vec<_>>())
            .field("environment", &self.environment)
            .field("enabled", &self.enabled)
            .finish()
    }
}

pub type CredentialFuture<'a> =
    Pin<Box<dyn Future<Output = Option<CarrierCredential>> + Send + 'a>>;

/// Read-only credential lookup keyed by carrier.
///
/// Implementations wrap whatever persistence the host application uses; the
/// tracker only ever reads from it.
pub trait CredentialStore: Send + Sync {
    fn credential<'a>(&'a self, carrier: CarrierCode) -> CredentialFuture<'a>;
}

/// In-memory credential store.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    credentials: HashMap<CarrierCode, CarrierCredential>,
}

impl StaticCredentialStore {
    pub fn new(credentials: impl IntoIterator<Item = CarrierCredential>) -> Self {
        Self {
            credentials: credentials
                .into_iter()
                .map(|credential| (credential.carrier, credential))
                .collect(),
        }
    }

    /// Loads credentials from `PARCELTRACE_<CODE>_<KEY>` variables.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `PARCELTRACE_SF_PARTNER_ID` | one auth key (upper-cased key name) |
    /// | `PARCELTRACE_SF_ENV` | `sandbox` or `production` (default) |
    /// | `PARCELTRACE_SF_ENABLED` | `false`/`0` disables the credential |
    ///
    /// A carrier with none of its key variables set is left out entirely.
    /// An unrecognized `_ENV` value is an error rather than a silent default.
    pub fn from_env(
        key_names: impl Fn(CarrierCode) -> &'static [&'static str],
    ) -> Result<Self, ValidationError> {
        Self::from_lookup(key_names, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        key_names: impl Fn(CarrierCode) -> &'static [&'static str],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ValidationError> {
        let mut credentials = Vec::new();

        for carrier in CarrierCode::ALL {
            let prefix = format!("PARCELTRACE_{}", carrier.as_str());
            let keys = key_names(carrier)
                .iter()
                .filter_map(|name| {
                    lookup(&format!("{prefix}_{}", name.to_ascii_uppercase()))
                        .map(|value| ((*name).to_owned(), value))
                })
                .collect::<BTreeMap<_, _>>();

            if keys.is_empty() {
                continue;
            }

            let environment = lookup(&format!("{prefix}_ENV"))
                .map(|value| value.parse::<CredentialEnvironment>())
                .transpose()?
                .unwrap_or_default();
            let enabled = lookup(&format!("{prefix}_ENABLED"))
                .map(|value| !matches!(value.trim(), "false" | "0" | "no"))
                .unwrap_or(true);

            credentials.push(CarrierCredential {
                carrier,
                keys,
                environment,
                enabled,
            });
        }

        Ok(Self::new(credentials))
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl CredentialStore for StaticCredentialStore {
    fn credential<'a>(&'a self, carrier: CarrierCode) -> CredentialFuture<'a> {
        let credential = self.credentials.get(&carrier).cloned();
        Box::pin(async move { credential })
    }
}
