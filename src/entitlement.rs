//! Business rules applied to an already verified license.
//!
//! Nothing here touches keys or signatures. Every function is a pure
//! function of its inputs, the clock included.

use crate::{License, LicenseType};
use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntitlementError {
    #[error("license expired on {}", .expired_on.format("%B %-d, %Y"))]
    Expired { expired_on: DateTime<Utc> },
    #[error("seat limit exceeded: {current} active users, {max} licensed")]
    SeatLimitExceeded { current: u32, max: u32 },
    #[error("license is restricted to domain {licensed}, not {actual}")]
    DomainMismatch { licensed: String, actual: String },
}

/// What an administrator sees for a verified license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Trial,
    Expired,
}

/// Checks expiry and, when a live count is available, the seat quota.
///
/// A license whose expiry equals `now` is still valid. `current_users: None`
/// skips the seat check.
pub fn check(
    license: &License,
    now: DateTime<Utc>,
    current_users: Option<u32>,
) -> Result<(), EntitlementError> {
    if now > license.expiry_date {
        return Err(EntitlementError::Expired {
            expired_on: license.expiry_date,
        });
    }

    if let Some(current) = current_users {
        if current > license.max_users {
            tracing::warn!(
                company = %license.company_name,
                current,
                max = license.max_users,
                "license seat limit exceeded"
            );
            return Err(EntitlementError::SeatLimitExceeded {
                current,
                max: license.max_users,
            });
        }
    }

    Ok(())
}

/// [`check`], followed by matching the licensed domain against the
/// deployment's domain. `"*"` matches everything; comparison ignores ASCII
/// case.
pub fn check_with_domain(
    license: &License,
    now: DateTime<Utc>,
    current_users: Option<u32>,
    deployment_domain: &str,
) -> Result<(), EntitlementError> {
    check(license, now, current_users)?;

    if license.domain != "*" && !license.domain.eq_ignore_ascii_case(deployment_domain) {
        return Err(EntitlementError::DomainMismatch {
            licensed: license.domain.clone(),
            actual: deployment_domain.to_owned(),
        });
    }

    Ok(())
}

pub fn status(license: &License, now: DateTime<Utc>) -> LicenseStatus {
    if now > license.expiry_date {
        LicenseStatus::Expired
    } else if license.license_type == LicenseType::Trial {
        LicenseStatus::Trial
    } else {
        LicenseStatus::Active
    }
}

/// Whole days until expiry, truncated toward zero. Negative once expired.
pub fn days_remaining(license: &License, now: DateTime<Utc>) -> i64 {
    (license.expiry_date - now).num_days()
}
