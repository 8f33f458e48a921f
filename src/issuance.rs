use crate::envelope::{self, SignedEnvelope};
use crate::keys::IssuerKey;
use crate::{License, LicenseType, LICENSE_VERSION};
use chrono::{DateTime, Duration, Months, Utc};
use rsa::pkcs1v15::SigningKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use thiserror::Error;

/// Seat quota of every trial license.
pub const TRIAL_MAX_USERS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IssueError {
    #[error("invalid license record: {0}")]
    InvalidRecord(String),
    #[error("license serialization failed: {0}")]
    Serialization(String),
    #[error("license signing failed")]
    Signing,
}

/// Mints license keys with the issuer's private key.
///
/// Licenses are signed with RSASSA-PKCS1-v1_5 over SHA-256 of the exact
/// JSON bytes that travel inside the envelope.
pub struct LicenseIssuer {
    signing_key: SigningKey<Sha256>,
}

impl LicenseIssuer {
    pub fn new(key: IssuerKey) -> Self {
        Self {
            signing_key: SigningKey::<Sha256>::new(key.into_rsa_private_key()),
        }
    }

    pub fn issue(&self, license: &License) -> Result<String, IssueError> {
        validate(license)?;

        let data =
            serde_json::to_vec(license).map_err(|e| IssueError::Serialization(e.to_string()))?;
        let signature = self
            .signing_key
            .try_sign(&data)
            .map_err(|_| IssueError::Signing)?;

        tracing::info!(
            company = %license.company_name,
            license_type = %license.license_type,
            issued = %license.issue_date,
            expires = %license.expiry_date,
            "issued license"
        );

        Ok(envelope::encode(&SignedEnvelope {
            data,
            signature: signature.to_vec(),
        }))
    }

    pub fn issue_trial(
        &self,
        company_name: &str,
        email: &str,
        duration_days: u32,
    ) -> Result<String, IssueError> {
        self.issue_trial_at(company_name, email, duration_days, Utc::now())
    }

    pub fn issue_trial_at(
        &self,
        company_name: &str,
        email: &str,
        duration_days: u32,
        now: DateTime<Utc>,
    ) -> Result<String, IssueError> {
        self.issue(&trial_license(company_name, email, duration_days, now)?)
    }

    pub fn issue_permanent(
        &self,
        company_name: &str,
        email: &str,
        domain: &str,
        max_users: u32,
        months: u32,
    ) -> Result<String, IssueError> {
        self.issue_permanent_at(company_name, email, domain, max_users, months, Utc::now())
    }

    pub fn issue_permanent_at(
        &self,
        company_name: &str,
        email: &str,
        domain: &str,
        max_users: u32,
        months: u32,
        now: DateTime<Utc>,
    ) -> Result<String, IssueError> {
        self.issue(&permanent_license(
            company_name,
            email,
            domain,
            max_users,
            months,
            now,
        )?)
    }
}

/// A trial grant: three seats, any domain, expiring `duration_days` after `now`.
pub fn trial_license(
    company_name: &str,
    email: &str,
    duration_days: u32,
    now: DateTime<Utc>,
) -> Result<License, IssueError> {
    let expiry_date = now
        .checked_add_signed(Duration::days(i64::from(duration_days)))
        .ok_or_else(|| IssueError::InvalidRecord("expiry date out of range".to_owned()))?;

    Ok(License {
        company_name: company_name.to_owned(),
        email: email.to_owned(),
        max_users: TRIAL_MAX_USERS,
        expiry_date,
        domain: "*".to_owned(),
        version: LICENSE_VERSION.to_owned(),
        issue_date: now,
        license_type: LicenseType::Trial,
    })
}

/// A permanent grant expiring `months` calendar months after `now`.
///
/// A day that does not exist in the target month is clamped to the month's
/// last day.
pub fn permanent_license(
    company_name: &str,
    email: &str,
    domain: &str,
    max_users: u32,
    months: u32,
    now: DateTime<Utc>,
) -> Result<License, IssueError> {
    let expiry_date = now
        .checked_add_months(Months::new(months))
        .ok_or_else(|| IssueError::InvalidRecord("expiry date out of range".to_owned()))?;

    Ok(License {
        company_name: company_name.to_owned(),
        email: email.to_owned(),
        max_users,
        expiry_date,
        domain: domain.to_owned(),
        version: LICENSE_VERSION.to_owned(),
        issue_date: now,
        license_type: LicenseType::Permanent,
    })
}

fn validate(license: &License) -> Result<(), IssueError> {
    if license.company_name.trim().is_empty() {
        return Err(IssueError::InvalidRecord("company name is required".to_owned()));
    }
    if license.email.trim().is_empty() {
        return Err(IssueError::InvalidRecord("email is required".to_owned()));
    }
    if license.max_users == 0 {
        return Err(IssueError::InvalidRecord(
            "at least one user must be licensed".to_owned(),
        ));
    }
    Ok(())
}
