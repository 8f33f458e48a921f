use crate::envelope::{self, EnvelopeError};
use crate::keys::KEY_BITS;
use crate::License;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::sha2::Sha256;
use rsa::signature::Verifier;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LicenseVerificationError {
    #[error("invalid license format")]
    InvalidEncoding,
    #[error("invalid license format: malformed envelope")]
    InvalidStructure,
    #[error("invalid or tampered license")]
    BadSignature,
    #[error("incompatible license version")]
    InvalidPayload,
}

impl From<EnvelopeError> for LicenseVerificationError {
    fn from(error: EnvelopeError) -> Self {
        match error {
            EnvelopeError::InvalidEncoding => LicenseVerificationError::InvalidEncoding,
            EnvelopeError::InvalidStructure => LicenseVerificationError::InvalidStructure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LicenseVerifierError {
    #[error("public key is not a PEM encoded RSA public key")]
    KeyIsNotPem,
    #[error("public key type is not supported")]
    KeyTypeNotSupported,
}

/// Offline verifier holding only the issuer's public key.
pub struct LicenseVerifier {
    verifying_key: VerifyingKey<Sha256>,
}

impl LicenseVerifier {
    /// Builds a verifier from a SubjectPublicKeyInfo PEM (`PUBLIC KEY`).
    /// A PKCS#1 `RSA PUBLIC KEY` block is accepted as well.
    pub fn new(public_key_pem: &str) -> Result<Self, LicenseVerifierError> {
        let rsa_key = RsaPublicKey::from_public_key_pem(public_key_pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(public_key_pem))
            .map_err(|_| LicenseVerifierError::KeyIsNotPem)?;

        Self::from_public_key(rsa_key)
    }

    pub fn from_public_key(rsa_key: RsaPublicKey) -> Result<Self, LicenseVerifierError> {
        if rsa_key.size() * 8 < KEY_BITS {
            return Err(LicenseVerifierError::KeyTypeNotSupported);
        }

        Ok(Self {
            verifying_key: VerifyingKey::<Sha256>::new(rsa_key),
        })
    }

    /// Authenticates `license_key` and returns the license it carries.
    ///
    /// The payload is only parsed once its signature has been checked.
    pub fn verify(&self, license_key: &str) -> Result<License, LicenseVerificationError> {
        let signed = envelope::decode(license_key)?;

        let rsa_signature = Signature::try_from(signed.signature.as_slice())
            .map_err(|_| LicenseVerificationError::BadSignature)?;
        self.verifying_key
            .verify(&signed.data, &rsa_signature)
            .map_err(|_| LicenseVerificationError::BadSignature)?;

        serde_json::from_slice(&signed.data).map_err(|_| LicenseVerificationError::InvalidPayload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::SignedEnvelope;
    use crate::issuance::LicenseIssuer;
    use crate::keys::public_key_pem;
    use crate::test_support::{
        sample_license, ISSUER_A, ISSUER_B, PUBLIC_KEY_A, PUBLIC_KEY_B, WEAK_KEY_PEM,
    };
    use crate::LicenseType;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use rsa::pkcs1::EncodeRsaPublicKey;
    use rsa::pkcs8::LineEnding;

    fn verifier_a() -> LicenseVerifier {
        LicenseVerifier::new(&PUBLIC_KEY_A).expect("Verifier instantiation must work")
    }

    fn issue_with_a(license: &License) -> String {
        LicenseIssuer::new(ISSUER_A.clone())
            .issue(license)
            .expect("Issuing should work")
    }

    #[test]
    fn verifier_round_trip() {
        let license = sample_license();
        let license_key = issue_with_a(&license);

        let verified_license = verifier_a()
            .verify(&license_key)
            .expect("Verification should succeed");

        assert_eq!(verified_license, license);
    }

    #[test]
    fn verifier_preserves_unknown_license_type() {
        let mut license = sample_license();
        license.license_type = LicenseType::Other("educational".to_owned());
        let license_key = issue_with_a(&license);

        let verified_license = verifier_a().verify(&license_key).unwrap();

        assert_eq!(
            verified_license.license_type,
            LicenseType::Other("educational".to_owned())
        );
    }

    #[test]
    fn verifier_with_non_pem_key() {
        let Err(error) = LicenseVerifier::new("not a key at all") else {
            panic!("An error was expected")
        };
        assert_eq!(error, LicenseVerifierError::KeyIsNotPem);
    }

    #[test]
    fn verifier_with_small_rsa_key() {
        let weak_public_key = public_key_pem_unchecked(WEAK_KEY_PEM);

        let Err(error) = LicenseVerifier::new(&weak_public_key) else {
            panic!("An error was expected")
        };
        assert_eq!(error, LicenseVerifierError::KeyTypeNotSupported);
    }

    #[test]
    fn verifier_accepts_pkcs1_public_key() {
        let pkcs1_pem = ISSUER_A.public_key().to_pkcs1_pem(LineEnding::LF).unwrap();
        let verifier = LicenseVerifier::new(&pkcs1_pem).expect("PKCS#1 key should work");

        let license_key = issue_with_a(&sample_license());
        assert!(verifier.verify(&license_key).is_ok());
    }

    #[test]
    fn license_verification_with_non_base64_input() {
        let Err(error) = verifier_a().verify("%%% definitely not base64 %%%") else {
            panic!("An error was expected")
        };
        assert_eq!(error, LicenseVerificationError::InvalidEncoding);
    }

    #[test]
    fn license_verification_with_random_bytes() {
        let mut state: u32 = 0x1234_5678;
        for length in [1usize, 7, 32, 300, 1024] {
            let bytes: Vec<u8> = (0..length)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    state as u8
                })
                .collect();

            let result = verifier_a().verify(&STANDARD.encode(&bytes));

            assert!(
                matches!(
                    result,
                    Err(LicenseVerificationError::InvalidEncoding)
                        | Err(LicenseVerificationError::InvalidStructure)
                ),
                "unexpected result for {length} random bytes: {result:?}"
            );
        }
    }

    #[test]
    fn license_verification_with_tampered_data() {
        let license_key = issue_with_a(&sample_license());
        let signed = envelope::decode(&license_key).unwrap();
        let verifier = verifier_a();

        for index in 0..signed.data.len() {
            let mut tampered = signed.clone();
            tampered.data[index] ^= 0x01;

            let result = verifier.verify(&envelope::encode(&tampered));
            assert_eq!(
                result,
                Err(LicenseVerificationError::BadSignature),
                "flipping payload byte {index} was not detected"
            );
        }
    }

    #[test]
    fn license_verification_with_tampered_signature() {
        let license_key = issue_with_a(&sample_license());
        let mut signed = envelope::decode(&license_key).unwrap();
        signed.signature[17] ^= 0x80;

        let Err(error) = verifier_a().verify(&envelope::encode(&signed)) else {
            panic!("An error was expected")
        };
        assert_eq!(error, LicenseVerificationError::BadSignature);
    }

    #[test]
    fn license_verification_with_substituted_signature() {
        let original = envelope::decode(&issue_with_a(&sample_license())).unwrap();
        let mut other_license = sample_license();
        other_license.max_users = 1000;
        let other = envelope::decode(&issue_with_a(&other_license)).unwrap();

        let forged = SignedEnvelope {
            data: original.data,
            signature: other.signature,
        };

        let Err(error) = verifier_a().verify(&envelope::encode(&forged)) else {
            panic!("An error was expected")
        };
        assert_eq!(error, LicenseVerificationError::BadSignature);
    }

    #[test]
    fn license_verification_with_truncated_signature() {
        let mut signed = envelope::decode(&issue_with_a(&sample_license())).unwrap();
        signed.signature.truncate(100);

        let Err(error) = verifier_a().verify(&envelope::encode(&signed)) else {
            panic!("An error was expected")
        };
        assert_eq!(error, LicenseVerificationError::BadSignature);
    }

    #[test]
    fn license_verification_with_wrong_key() {
        let license_key = issue_with_a(&sample_license());
        let verifier_b = LicenseVerifier::new(&PUBLIC_KEY_B).unwrap();

        let Err(error) = verifier_b.verify(&license_key) else {
            panic!("An error was expected")
        };
        assert_eq!(error, LicenseVerificationError::BadSignature);
    }

    #[test]
    fn license_verification_with_signed_garbage_payload() {
        // Correctly signed, but not a license.
        let data = br#"{"schema":2,"owner":"Acme"}"#.to_vec();
        let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(
            ISSUER_B.clone().into_rsa_private_key(),
        );
        let signature = rsa::signature::Signer::sign(&signing_key, &data);
        let license_key = envelope::encode(&SignedEnvelope {
            data,
            signature: rsa::signature::SignatureEncoding::to_vec(&signature),
        });

        let Err(error) = LicenseVerifier::new(&PUBLIC_KEY_B).unwrap().verify(&license_key) else {
            panic!("An error was expected")
        };
        assert_eq!(error, LicenseVerificationError::InvalidPayload);
    }

    #[test]
    fn license_verification_of_legacy_key_layout() {
        // Hand-built key in the layout of the previous generator: Go-style
        // RFC 3339 timestamps with offsets and a non-canonical field order.
        let data = br#"{"company_name":"Legacy GmbH","email":"it@legacy.test","max_users":25,"expiry_date":"2027-03-01T10:00:00.123456789+01:00","domain":"*","version":"1.0","issue_date":"2026-03-01T10:00:00+01:00","license_type":"permanent"}"#.to_vec();
        let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(
            ISSUER_A.clone().into_rsa_private_key(),
        );
        let signature = rsa::signature::Signer::sign(&signing_key, &data);
        let envelope_json = format!(
            r#"{{"data":"{}","signature":"{}"}}"#,
            STANDARD.encode(&data),
            STANDARD.encode(rsa::signature::SignatureEncoding::to_vec(&signature))
        );
        let license_key = STANDARD.encode(envelope_json);

        let license = verifier_a().verify(&license_key).expect("Legacy key should verify");

        assert_eq!(license.company_name, "Legacy GmbH");
        assert_eq!(license.max_users, 25);
        assert_eq!(license.expiry_date.to_rfc3339(), "2027-03-01T09:00:00.123456789+00:00");
    }

    #[test]
    fn verifier_can_be_shared_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LicenseVerifier>();
    }

    fn public_key_pem_unchecked(private_pem: &str) -> String {
        use rsa::pkcs1::DecodeRsaPrivateKey;
        use rsa::pkcs8::EncodePublicKey;

        rsa::RsaPrivateKey::from_pkcs1_pem(private_pem)
            .unwrap()
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap()
    }

    #[test]
    fn verifier_accepts_key_manager_export() {
        let pem = public_key_pem(&ISSUER_B).unwrap();
        assert!(LicenseVerifier::new(&pem).is_ok());
    }
}
