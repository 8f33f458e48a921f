pub mod activation;
pub mod entitlement;
pub mod envelope;
pub mod issuance;
pub mod keys;
pub mod verification;

#[cfg(test)]
mod test_support;

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Version tag stamped on licenses minted by the convenience constructors.
pub const LICENSE_VERSION: &str = "1.0";

/// The signed payload of a license key.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct License {
    pub company_name: String,
    pub email: String,
    pub max_users: u32,
    pub expiry_date: DateTime<Utc>,
    /// `"*"` or the deployment domain the grant is meant for. Not enforced
    /// unless the application opts into [`entitlement::check_with_domain`].
    pub domain: String,
    pub version: String,
    pub issue_date: DateTime<Utc>,
    pub license_type: LicenseType,
}

/// License class. Values other than `trial` and `permanent` are carried
/// through untouched.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum LicenseType {
    Trial,
    Permanent,
    Other(String),
}

impl LicenseType {
    pub fn as_str(&self) -> &str {
        match self {
            LicenseType::Trial => "trial",
            LicenseType::Permanent => "permanent",
            LicenseType::Other(value) => value,
        }
    }
}

impl From<String> for LicenseType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "trial" => LicenseType::Trial,
            "permanent" => LicenseType::Permanent,
            _ => LicenseType::Other(value),
        }
    }
}

impl From<LicenseType> for String {
    fn from(value: LicenseType) -> Self {
        match value {
            LicenseType::Other(value) => value,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
