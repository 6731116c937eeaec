//! Conversions between key encodings and raw Ed25519 key bytes.
//!
//! DER handling is minimal: only short-form lengths and
//! low tag numbers are accepted, which covers every Ed25519 PKCS#8 and
//! SubjectPublicKeyInfo structure. Anything else is a malformed key.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::PublicKey;

const TAG_SEQUENCE: u8 = 0x30;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_BIT_STRING: u8 = 0x03;

/// DER encoding of the Ed25519 algorithm OID (1.3.101.112).
const ED25519_OID: [u8; 5] = [0x06, 0x03, 0x2b, 0x65, 0x70];

const PKCS8_ED25519_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];
const SPKI_ED25519_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Multicodec prefix for an Ed25519 public key.
pub const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Raw key bytes recovered from an encoded key.
pub enum RawKey {
    Public([u8; 32]),
    Private(Zeroizing<[u8; 32]>),
}

impl std::fmt::Debug for RawKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public(bytes) => f.debug_tuple("Public").field(&hex::encode(bytes)).finish(),
            Self::Private(_) => f.write_str("Private(..)"),
        }
    }
}

/// A JSON Web Key. Only OKP/Ed25519 keys are usable; other key types
/// deserialize but are rejected on conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
}

/// Public key material as carried by a verification method. Exactly one
/// encoding is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyMaterial {
    #[serde(rename = "publicKeyPem")]
    Pem(String),
    #[serde(rename = "publicKeyJwk")]
    Jwk(Jwk),
    #[serde(rename = "publicKeyMultibase")]
    Multibase(String),
}

impl KeyMaterial {
    /// Decode the material into a verification key.
    pub fn public_key(&self) -> Result<PublicKey, CryptoError> {
        let raw = match self {
            Self::Pem(pem) => pem_to_key_material(pem)?,
            Self::Jwk(jwk) => jwk_to_key_material(jwk)?,
            Self::Multibase(value) => multibase_to_key_material(value)?,
        };
        match raw {
            RawKey::Public(bytes) => PublicKey::from_bytes(&bytes),
            RawKey::Private(_) => Err(CryptoError::MalformedKey(
                "verification method carries a private key".into(),
            )),
        }
    }
}

/// Walk a sequence of DER tag-length-value triples and return the contents
/// of the element at `index`, which must carry `tag`.
fn find_der(mut data: &[u8], mut index: usize, tag: u8) -> Result<&[u8], CryptoError> {
    loop {
        if data.len() < 2 {
            return Err(CryptoError::MalformedKey("unexpected end of DER input".into()));
        }
        let (found, length) = (data[0], data[1]);
        data = &data[2..];
        if found & 0x1f == 0x1f {
            return Err(CryptoError::MalformedKey(
                "high tag number form is not supported".into(),
            ));
        }
        if length >> 7 != 0 {
            return Err(CryptoError::MalformedKey(
                "long form length is not supported".into(),
            ));
        }
        let length = usize::from(length);
        if data.len() < length {
            return Err(CryptoError::MalformedKey(format!(
                "declared length {} exceeds remaining {} bytes",
                length,
                data.len()
            )));
        }
        if index == 0 {
            if found != tag {
                return Err(CryptoError::MalformedKey(format!(
                    "unexpected tag 0x{:02x}, expected 0x{:02x}",
                    found, tag
                )));
            }
            return Ok(&data[..length]);
        }
        index -= 1;
        data = &data[length..];
    }
}

/// Extract the raw private key from a PKCS#8 `PrivateKeyInfo`.
///
/// SEQUENCE (PrivateKeyInfo) → OCTET STRING at index 2 (PrivateKey) →
/// OCTET STRING at index 0 (CurvePrivateKey).
pub fn strip_private_key_to_raw(der: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let info = find_der(der, 0, TAG_SEQUENCE)?;
    let private_key = find_der(info, 2, TAG_OCTET_STRING)?;
    let curve_key = find_der(private_key, 0, TAG_OCTET_STRING)?;
    Ok(curve_key.to_vec())
}

/// Extract the raw public key from a `SubjectPublicKeyInfo`.
///
/// SEQUENCE → BIT STRING at index 1, minus its unused-bits octet.
pub fn strip_public_key_to_raw(der: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let info = find_der(der, 0, TAG_SEQUENCE)?;
    let bits = find_der(info, 1, TAG_BIT_STRING)?;
    match bits.split_first() {
        Some((&0, key)) => Ok(key.to_vec()),
        Some((unused, _)) => Err(CryptoError::MalformedKey(format!(
            "bit string has {} unused bits",
            unused
        ))),
        None => Err(CryptoError::MalformedKey("empty bit string".into())),
    }
}

pub(crate) fn private_key_to_pkcs8_der(secret: &[u8; 32]) -> Zeroizing<Vec<u8>> {
    let mut der = Zeroizing::new(Vec::with_capacity(PKCS8_ED25519_PREFIX.len() + 32));
    der.extend_from_slice(&PKCS8_ED25519_PREFIX);
    der.extend_from_slice(secret);
    der
}

pub(crate) fn public_key_to_spki_der(key: &[u8; 32]) -> Vec<u8> {
    let mut der = Vec::with_capacity(SPKI_ED25519_PREFIX.len() + 32);
    der.extend_from_slice(&SPKI_ED25519_PREFIX);
    der.extend_from_slice(key);
    der
}

pub(crate) fn der_to_pem(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {}-----\n", label);
    for line in body.as_bytes().chunks(64) {
        // base64 output is ASCII
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {}-----\n", label));
    pem
}

fn raw_32(bytes: &[u8]) -> Result<[u8; 32], CryptoError> {
    bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
        expected: 32,
        actual: bytes.len(),
    })
}

/// Decode a PEM `PUBLIC KEY` or `PRIVATE KEY` block holding an Ed25519 key.
pub fn pem_to_key_material(pem: &str) -> Result<RawKey, CryptoError> {
    let pem = pem.trim();
    let label = pem
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("-----BEGIN "))
        .and_then(|line| line.strip_suffix("-----"))
        .ok_or_else(|| CryptoError::MalformedKey("missing PEM header".into()))?;

    let body: String = pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .map(str::trim)
        .collect();
    let der = Zeroizing::new(
        STANDARD
            .decode(body)
            .map_err(|e| CryptoError::MalformedKey(format!("invalid PEM body: {}", e)))?,
    );

    if !der.windows(ED25519_OID.len()).any(|w| w == ED25519_OID) {
        return Err(CryptoError::UnsupportedKeyFormat(format!(
            "{} is not an Ed25519 key",
            label
        )));
    }

    match label {
        "PUBLIC KEY" => Ok(RawKey::Public(raw_32(&strip_public_key_to_raw(&der)?)?)),
        "PRIVATE KEY" => {
            let raw = Zeroizing::new(strip_private_key_to_raw(&der)?);
            Ok(RawKey::Private(Zeroizing::new(raw_32(&raw)?)))
        }
        other => Err(CryptoError::UnsupportedKeyFormat(format!(
            "unsupported PEM label: {}",
            other
        ))),
    }
}

/// Decode an OKP/Ed25519 JWK.
pub fn jwk_to_key_material(jwk: &Jwk) -> Result<RawKey, CryptoError> {
    if jwk.kty != "OKP" {
        return Err(CryptoError::UnsupportedKeyFormat(format!(
            "unsupported JWK key type: {}",
            jwk.kty
        )));
    }
    match jwk.crv.as_deref() {
        Some("Ed25519") => {}
        Some(other) => {
            return Err(CryptoError::UnsupportedKeyFormat(format!(
                "unsupported JWK curve: {}",
                other
            )))
        }
        None => return Err(CryptoError::MalformedKey("JWK is missing crv".into())),
    }
    let x = jwk
        .x
        .as_deref()
        .ok_or_else(|| CryptoError::MalformedKey("JWK is missing x".into()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(x)
        .map_err(|e| CryptoError::MalformedKey(format!("invalid JWK x: {}", e)))?;
    Ok(RawKey::Public(raw_32(&bytes)?))
}

/// Encode an Ed25519 public key as an OKP JWK.
pub fn public_key_to_jwk(key: &PublicKey) -> Jwk {
    Jwk {
        kty: "OKP".into(),
        crv: Some("Ed25519".into()),
        x: Some(URL_SAFE_NO_PAD.encode(key.as_bytes())),
    }
}

/// Decode a multibase multicodec Ed25519 public key.
pub fn multibase_to_key_material(value: &str) -> Result<RawKey, CryptoError> {
    let (_, bytes) = multibase::decode(value)
        .map_err(|e| CryptoError::MalformedKey(format!("invalid multibase: {}", e)))?;
    match bytes.strip_prefix(&ED25519_MULTICODEC[..]) {
        Some(key) => Ok(RawKey::Public(raw_32(key)?)),
        None => Err(CryptoError::UnsupportedKeyFormat(
            "multicodec prefix is not Ed25519".into(),
        )),
    }
}

pub(crate) fn public_key_to_multibase(key: &[u8; 32]) -> String {
    let mut bytes = Vec::with_capacity(ED25519_MULTICODEC.len() + key.len());
    bytes.extend_from_slice(&ED25519_MULTICODEC);
    bytes.extend_from_slice(key);
    multibase::encode(multibase::Base::Base58Btc, bytes)
}
