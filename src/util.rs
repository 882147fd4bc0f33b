use anyhow::{anyhow, Context, Error};
use const_oid::db::rfc4519::COMMON_NAME;
use der::{
    asn1::{Ia5StringRef, PrintableStringRef, TeletexStringRef, Utf8StringRef},
    referenced::OwnedToRef,
    Decode, Tag, Tagged,
};
use ecdsa::{PrimeCurve, VerifyingKey};
use elliptic_curve::{
    sec1::{FromEncodedPoint, ToEncodedPoint},
    AffinePoint, CurveArithmetic, FieldBytesSize, PublicKey,
};
use sec1::point::ModulusSize;
use x509_cert::{attr::AttributeValue, Certificate};

/// Extract a certificate's public key for signature verification.
pub(crate) fn public_key<C>(certificate: &Certificate) -> Result<VerifyingKey<C>, Error>
where
    C: PrimeCurve + CurveArithmetic + const_oid::AssociatedOid,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    certificate
        .tbs_certificate
        .subject_public_key_info
        .owned_to_ref()
        .try_into()
        .map(|key: PublicKey<C>| key.into())
        .context("failed to decode subject public key")
}

/// Parse a single PEM-encoded certificate.
pub(crate) fn certificate_from_pem(bytes: &[u8]) -> Result<Certificate, Error> {
    let der_bytes = pem_rfc7468::decode_vec(bytes)
        .map_err(|e| anyhow!("unable to parse certificate from PEM encoding: {e}"))?
        .1;
    Certificate::from_der(&der_bytes).context("unable to parse certificate from DER encoding")
}

/// The certificate's common name, or "unknown" when the subject has none.
/// For log and error messages only; matching always uses the full name.
pub(crate) fn common_name_or_unknown(certificate: &Certificate) -> &str {
    certificate
        .tbs_certificate
        .subject
        .0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|attribute| attribute.oid == COMMON_NAME)
        .and_then(|attribute| attribute_value_to_str(&attribute.value))
        .unwrap_or("unknown")
}

fn attribute_value_to_str(value: &AttributeValue) -> Option<&str> {
    match value.tag() {
        Tag::PrintableString => PrintableStringRef::try_from(value)
            .ok()
            .map(|s| s.as_str()),
        Tag::Utf8String => Utf8StringRef::try_from(value).ok().map(|s| s.as_str()),
        Tag::Ia5String => Ia5StringRef::try_from(value).ok().map(|s| s.as_str()),
        Tag::TeletexString => TeletexStringRef::try_from(value).ok().map(|s| s.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::test_ca;

    #[test]
    fn common_name_is_extracted() {
        let ca = test_ca("CN=Example Root CA,O=Example");
        assert_eq!(common_name_or_unknown(&ca.certificate), "Example Root CA");
    }

    #[test]
    fn missing_common_name_falls_back() {
        let ca = test_ca("O=Example,C=US");
        assert_eq!(common_name_or_unknown(&ca.certificate), "unknown");
    }
}
