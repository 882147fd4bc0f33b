use der::Encode;
use ecdsa::{signature::Verifier, Signature, VerifyingKey};
use p256::NistP256;
use x509_cert::Certificate;

use crate::util::public_key;

/// Check that the purported issuer certificate signed the subject
/// certificate.
pub fn issuer_signed_subject(subject: &Certificate, issuer: &Certificate) -> bool {
    let tbs = match subject.tbs_certificate.to_der() {
        Ok(tbs) => tbs,
        Err(e) => {
            tracing::error!("unable to encode TBS certificate: {e:?}");
            return false;
        }
    };

    verify_signed_data(issuer, subject.signature.raw_bytes(), &tbs)
}

/// Verify a DER-encoded ECDSA signature over `message` against the signer
/// certificate's public key.
// TODO: Support curves other than P-256.
pub fn verify_signed_data(signer: &Certificate, signature: &[u8], message: &[u8]) -> bool {
    let verifying_key: VerifyingKey<NistP256> = match public_key(signer) {
        Ok(key) => key,
        Err(e) => {
            tracing::error!("unable to decode signer public key: {e:?}");
            return false;
        }
    };

    let signature: Signature<NistP256> = match Signature::from_der(signature) {
        Ok(signature) => signature,
        Err(e) => {
            tracing::error!("unable to parse signature: {e:?}");
            return false;
        }
    };

    match verifying_key.verify(message, &signature) {
        Ok(()) => true,
        Err(e) => {
            tracing::info!("signature could not be verified: {e:?}");
            false
        }
    }
}
