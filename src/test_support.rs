//! Fixed key material and records shared by the unit tests.

use crate::keys::{public_key_pem, IssuerKey};
use crate::{License, LicenseType};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;

pub const ISSUER_A_PEM: &str = include_str!("../testdata/issuer_a.pem");
pub const ISSUER_B_PEM: &str = include_str!("../testdata/issuer_b.pem");
pub const WEAK_KEY_PEM: &str = include_str!("../testdata/weak_1024.pem");

lazy_static! {
    pub static ref ISSUER_A: IssuerKey = IssuerKey::from_pem(ISSUER_A_PEM).unwrap();
    pub static ref ISSUER_B: IssuerKey = IssuerKey::from_pem(ISSUER_B_PEM).unwrap();
    pub static ref PUBLIC_KEY_A: String = public_key_pem(&ISSUER_A).unwrap();
    pub static ref PUBLIC_KEY_B: String = public_key_pem(&ISSUER_B).unwrap();
}

pub fn at(timestamp: &str) -> DateTime<Utc> {
    timestamp.parse().unwrap()
}

pub fn sample_license() -> License {
    License {
        company_name: "Acme".to_owned(),
        email: "ops@acme.test".to_owned(),
        max_users: 10,
        expiry_date: at("2027-10-16T09:30:00.250Z"),
        domain: "acme.test".to_owned(),
        version: "1.0".to_owned(),
        issue_date: at("2026-10-16T09:30:00.250Z"),
        license_type: LicenseType::Permanent,
    }
}
