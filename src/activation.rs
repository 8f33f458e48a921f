//! The application side: which license key is active and what it allows.
//!
//! The key is configured once through [`LICENSE_KEY_ENV`] and can be replaced
//! at runtime by [`LicenseManager::activate`], which only accepts keys that
//! verify. Failures are reported as values so the application can fall back
//! to a restricted mode instead of refusing to start.

use crate::entitlement::{self, EntitlementError, LicenseStatus};
use crate::verification::{LicenseVerificationError, LicenseVerifier};
use crate::License;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Environment variable holding the deployment's license key.
pub const LICENSE_KEY_ENV: &str = "AFCB_LICENSE_KEY";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActivationError {
    #[error("no license key configured")]
    NotConfigured,
    #[error(transparent)]
    Verification(#[from] LicenseVerificationError),
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LicenseState {
    /// No key configured.
    Unlicensed,
    /// A key is configured but does not verify.
    Invalid(LicenseVerificationError),
    Licensed {
        license: License,
        status: LicenseStatus,
        days_remaining: i64,
    },
}

impl LicenseState {
    pub fn allows_full_features(&self) -> bool {
        matches!(
            self,
            LicenseState::Licensed {
                status: LicenseStatus::Active | LicenseStatus::Trial,
                ..
            }
        )
    }
}

pub struct LicenseManager {
    verifier: LicenseVerifier,
    license_key: Option<String>,
}

impl LicenseManager {
    pub fn new(verifier: LicenseVerifier) -> Self {
        Self {
            verifier,
            license_key: None,
        }
    }

    /// Reads the license key from [`LICENSE_KEY_ENV`].
    pub fn load_from_env(verifier: LicenseVerifier) -> Self {
        Self::load_from_env_var(verifier, LICENSE_KEY_ENV)
    }

    pub fn load_from_env_var(verifier: LicenseVerifier, variable: &str) -> Self {
        let license_key = std::env::var(variable)
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        if license_key.is_none() {
            tracing::info!(variable, "no license key configured");
        }

        Self {
            verifier,
            license_key,
        }
    }

    pub fn with_license_key(mut self, license_key: &str) -> Self {
        let license_key = license_key.trim();
        self.license_key = (!license_key.is_empty()).then(|| license_key.to_owned());
        self
    }

    pub fn license_key(&self) -> Option<&str> {
        self.license_key.as_deref()
    }

    pub fn validate(&self, license_key: &str) -> Result<License, LicenseVerificationError> {
        self.verifier.verify(license_key).inspect_err(|e| {
            tracing::warn!(error = %e, "license key rejected");
        })
    }

    /// Replaces the active key with `license_key` if it verifies and has not
    /// expired at `now`. On failure the previous key stays active.
    pub fn activate(
        &mut self,
        license_key: &str,
        now: DateTime<Utc>,
    ) -> Result<License, ActivationError> {
        let license = self.validate(license_key)?;
        entitlement::check(&license, now, None)?;

        tracing::info!(
            company = %license.company_name,
            license_type = %license.license_type,
            expires = %license.expiry_date,
            "license activated"
        );
        self.license_key = Some(license_key.trim().to_owned());
        Ok(license)
    }

    /// Verifies the configured key and applies expiry and seat rules.
    pub fn check_requirements(
        &self,
        now: DateTime<Utc>,
        current_users: Option<u32>,
    ) -> Result<License, ActivationError> {
        let license_key = self
            .license_key
            .as_deref()
            .ok_or(ActivationError::NotConfigured)?;
        let license = self.validate(license_key)?;
        entitlement::check(&license, now, current_users)?;
        Ok(license)
    }

    pub fn state(&self, now: DateTime<Utc>) -> LicenseState {
        let Some(license_key) = self.license_key.as_deref() else {
            return LicenseState::Unlicensed;
        };
        match self.validate(license_key) {
            Ok(license) => LicenseState::Licensed {
                status: entitlement::status(&license, now),
                days_remaining: entitlement::days_remaining(&license, now),
                license,
            },
            Err(e) => LicenseState::Invalid(e),
        }
    }
}
