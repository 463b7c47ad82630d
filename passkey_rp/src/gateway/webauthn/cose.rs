use ciborium::value::{Integer, Value as CborValue};
use ring::signature::{self, RsaPublicKeyComponents, UnparsedPublicKey};

use crate::gateway::GatewayError;

pub(super) const ES256: i64 = -7;
pub(super) const EDDSA: i64 = -8;
pub(super) const RS256: i64 = -257;

/// Algorithms offered in `pubKeyCredParams`, in order of preference.
pub(super) const SUPPORTED_ALGORITHMS: [i64; 3] = [ES256, EDDSA, RS256];

const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;
const CRV_P256: i64 = 1;
const CRV_ED25519: i64 = 6;

/// A credential public key decoded from its COSE_Key form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum CoseKey {
    Es256 { x: Vec<u8>, y: Vec<u8> },
    EdDsa { x: Vec<u8> },
    Rs256 { n: Vec<u8>, e: Vec<u8> },
}

impl CoseKey {
    pub(super) fn from_bytes(bytes: &[u8]) -> Result<Self, GatewayError> {
        let value: CborValue = ciborium::de::from_reader(bytes)
            .map_err(|e| GatewayError::Malformed(format!("Invalid public key CBOR: {e}")))?;
        Self::from_cbor(&value)
    }

    pub(super) fn from_cbor(value: &CborValue) -> Result<Self, GatewayError> {
        let CborValue::Map(entries) = value else {
            return Err(GatewayError::Malformed(
                "COSE key is not a CBOR map".to_string(),
            ));
        };

        let int_param = |label: i64| {
            entries.iter().find_map(|(k, v)| match (k, v) {
                (CborValue::Integer(k), CborValue::Integer(v)) if *k == Integer::from(label) => {
                    i64::try_from(*v).ok()
                }
                _ => None,
            })
        };
        let bytes_param = |label: i64| {
            entries.iter().find_map(|(k, v)| match (k, v) {
                (CborValue::Integer(k), CborValue::Bytes(v)) if *k == Integer::from(label) => {
                    Some(v.clone())
                }
                _ => None,
            })
        };
        let missing = |what: &str| GatewayError::Malformed(format!("COSE key is missing {what}"));

        let kty = int_param(1).ok_or_else(|| missing("kty"))?;
        let alg = int_param(3).ok_or_else(|| missing("alg"))?;

        match (kty, alg) {
            (KTY_EC2, ES256) => {
                if int_param(-1) != Some(CRV_P256) {
                    return Err(GatewayError::VerificationFailed(
                        "ES256 key is not on P-256".to_string(),
                    ));
                }
                let x = bytes_param(-2).ok_or_else(|| missing("x"))?;
                let y = bytes_param(-3).ok_or_else(|| missing("y"))?;
                if x.len() != 32 || y.len() != 32 {
                    return Err(GatewayError::Malformed(
                        "Invalid P-256 coordinate length".to_string(),
                    ));
                }
                Ok(Self::Es256 { x, y })
            }
            (KTY_OKP, EDDSA) => {
                if int_param(-1) != Some(CRV_ED25519) {
                    return Err(GatewayError::VerificationFailed(
                        "EdDSA key is not Ed25519".to_string(),
                    ));
                }
                let x = bytes_param(-2).ok_or_else(|| missing("x"))?;
                if x.len() != 32 {
                    return Err(GatewayError::Malformed(
                        "Invalid Ed25519 key length".to_string(),
                    ));
                }
                Ok(Self::EdDsa { x })
            }
            (KTY_RSA, RS256) => {
                let n = bytes_param(-1).ok_or_else(|| missing("n"))?;
                let e = bytes_param(-2).ok_or_else(|| missing("e"))?;
                Ok(Self::Rs256 { n, e })
            }
            (kty, alg) => Err(GatewayError::VerificationFailed(format!(
                "Unsupported public key (kty {kty}, alg {alg})"
            ))),
        }
    }

    pub(super) fn algorithm(&self) -> i64 {
        match self {
            Self::Es256 { .. } => ES256,
            Self::EdDsa { .. } => EDDSA,
            Self::Rs256 { .. } => RS256,
        }
    }

    /// Verifies `signature` over `message` with this key.
    pub(super) fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), GatewayError> {
        let result = match self {
            Self::Es256 { x, y } => {
                let mut point = Vec::with_capacity(65);
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, &point)
                    .verify(message, signature)
            }
            Self::EdDsa { x } => {
                UnparsedPublicKey::new(&signature::ED25519, x).verify(message, signature)
            }
            Self::Rs256 { n, e } => RsaPublicKeyComponents { n, e }.verify(
                &signature::RSA_PKCS1_2048_8192_SHA256,
                message,
                signature,
            ),
        };

        result.map_err(|_| {
            GatewayError::VerificationFailed("Signature verification failed".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;
    use ring::signature::{EcdsaKeyPair, Ed25519KeyPair, KeyPair};

    fn es256_cose(public_key: &[u8]) -> CborValue {
        CborValue::Map(vec![
            (CborValue::Integer(1.into()), CborValue::Integer(2.into())),
            (CborValue::Integer(3.into()), CborValue::Integer((-7).into())),
            (CborValue::Integer((-1).into()), CborValue::Integer(1.into())),
            (
                CborValue::Integer((-2).into()),
                CborValue::Bytes(public_key[1..33].to_vec()),
            ),
            (
                CborValue::Integer((-3).into()),
                CborValue::Bytes(public_key[33..65].to_vec()),
            ),
        ])
    }

    #[test]
    fn test_es256_round_trip_signature() {
        let rng = SystemRandom::new();
        let pkcs8 =
            EcdsaKeyPair::generate_pkcs8(&signature::ECDSA_P256_SHA256_ASN1_SIGNING, &rng).unwrap();
        let key_pair = EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            pkcs8.as_ref(),
            &rng,
        )
        .unwrap();

        let key = CoseKey::from_cbor(&es256_cose(key_pair.public_key().as_ref())).unwrap();
        assert_eq!(key.algorithm(), ES256);

        let sig = key_pair.sign(&rng, b"message").unwrap();
        assert!(key.verify(b"message", sig.as_ref()).is_ok());
        assert!(key.verify(b"tampered", sig.as_ref()).is_err());
    }

    #[test]
    fn test_eddsa_signature() {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();

        let cose = CborValue::Map(vec![
            (CborValue::Integer(1.into()), CborValue::Integer(1.into())),
            (CborValue::Integer(3.into()), CborValue::Integer((-8).into())),
            (CborValue::Integer((-1).into()), CborValue::Integer(6.into())),
            (
                CborValue::Integer((-2).into()),
                CborValue::Bytes(key_pair.public_key().as_ref().to_vec()),
            ),
        ]);
        let key = CoseKey::from_cbor(&cose).unwrap();

        let sig = key_pair.sign(b"message");
        assert!(key.verify(b"message", sig.as_ref()).is_ok());
        assert!(key.verify(b"other", sig.as_ref()).is_err());
    }

    #[test]
    fn test_from_bytes_matches_from_cbor() {
        let cose = es256_cose(&[0x04; 65]);
        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&cose, &mut encoded).unwrap();

        assert_eq!(
            CoseKey::from_bytes(&encoded).unwrap(),
            CoseKey::from_cbor(&cose).unwrap()
        );
    }

    #[test]
    fn test_unsupported_and_incomplete_keys() {
        let wrong_curve = CborValue::Map(vec![
            (CborValue::Integer(1.into()), CborValue::Integer(2.into())),
            (CborValue::Integer(3.into()), CborValue::Integer((-7).into())),
            (CborValue::Integer((-1).into()), CborValue::Integer(2.into())),
        ]);
        assert!(CoseKey::from_cbor(&wrong_curve).is_err());

        let unknown_alg = CborValue::Map(vec![
            (CborValue::Integer(1.into()), CborValue::Integer(2.into())),
            (CborValue::Integer(3.into()), CborValue::Integer((-35).into())),
        ]);
        assert!(matches!(
            CoseKey::from_cbor(&unknown_alg),
            Err(GatewayError::VerificationFailed(_))
        ));

        let no_alg = CborValue::Map(vec![(
            CborValue::Integer(1.into()),
            CborValue::Integer(2.into()),
        )]);
        assert!(matches!(
            CoseKey::from_cbor(&no_alg),
            Err(GatewayError::Malformed(_))
        ));

        assert!(CoseKey::from_cbor(&CborValue::Text("key".into())).is_err());
    }
}
