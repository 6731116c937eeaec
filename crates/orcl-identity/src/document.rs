use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use orcl_crypto::{CryptoError, KeyMaterial, PublicKey};

use crate::error::IdentityError;

/// Base context of every DID document.
pub const DID_CONTEXT_V1: &str = "https://www.w3.org/ns/did/v1";

/// The kind of key a verification method publishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VerificationMethodType {
    Ed25519VerificationKey2018,
    Ed25519VerificationKey2020,
    JsonWebKey2020,
    Other(String),
}

impl VerificationMethodType {
    /// Security suite context for documents built around this method type.
    pub fn context_url(&self) -> Option<&'static str> {
        match self {
            Self::Ed25519VerificationKey2018 => {
                Some("https://w3id.org/security/suites/ed25519-2018/v1")
            }
            Self::Ed25519VerificationKey2020 => {
                Some("https://w3id.org/security/suites/ed25519-2020/v1")
            }
            Self::JsonWebKey2020 => Some("https://w3id.org/security/suites/jws-2020/v1"),
            Self::Other(_) => None,
        }
    }

    /// The proof type signed with keys of this method type.
    pub fn proof_type(&self) -> Option<&'static str> {
        match self {
            Self::Ed25519VerificationKey2018 => Some("Ed25519Signature2018"),
            Self::Ed25519VerificationKey2020 => Some("Ed25519Signature2020"),
            Self::JsonWebKey2020 => Some("JsonWebSignature2020"),
            Self::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ed25519VerificationKey2018 => "Ed25519VerificationKey2018",
            Self::Ed25519VerificationKey2020 => "Ed25519VerificationKey2020",
            Self::JsonWebKey2020 => "JsonWebKey2020",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for VerificationMethodType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Ed25519VerificationKey2018" => Self::Ed25519VerificationKey2018,
            "Ed25519VerificationKey2020" => Self::Ed25519VerificationKey2020,
            "JsonWebKey2020" => Self::JsonWebKey2020,
            _ => Self::Other(value),
        }
    }
}

impl From<VerificationMethodType> for String {
    fn from(value: VerificationMethodType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for VerificationMethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a proof was made, and so which verification relationship must list
/// the signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProofPurpose {
    AssertionMethod,
    Authentication,
}

impl ProofPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssertionMethod => "assertionMethod",
            Self::Authentication => "authentication",
        }
    }
}

impl fmt::Display for ProofPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProofPurpose {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assertionMethod" => Ok(Self::AssertionMethod),
            "authentication" => Ok(Self::Authentication),
            other => Err(IdentityError::InvalidDocument(format!(
                "unknown proof purpose: {}",
                other
            ))),
        }
    }
}

/// A verification method within a DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationMethod {
    /// Absolute (`did#frag`) or relative (`#frag`) identifier.
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: VerificationMethodType,
    pub controller: String,
    #[serde(flatten)]
    pub key: KeyMaterial,
}

impl VerificationMethod {
    /// Decode the published verification key.
    pub fn public_key(&self) -> Result<PublicKey, CryptoError> {
        self.key.public_key()
    }

    /// Whether this method accepts proofs of `proof_type`.
    pub fn supports_proof_type(&self, proof_type: &str) -> bool {
        self.method_type.proof_type() == Some(proof_type)
    }
}

/// An entry of a verification relationship: a reference to a method listed
/// in `verificationMethod`, or a method embedded in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerificationRelationship {
    Reference(String),
    Embedded(VerificationMethod),
}

impl VerificationRelationship {
    pub fn id(&self) -> &str {
        match self {
            Self::Reference(id) => id,
            Self::Embedded(method) => &method.id,
        }
    }
}

/// W3C DID document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authentication: Vec<VerificationRelationship>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_method: Vec<VerificationRelationship>,
    /// Members this crate does not interpret (services, other relationships).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DidDocument {
    /// A document with no verification methods.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            context: vec![DID_CONTEXT_V1.to_string()],
            id: id.into(),
            controller: None,
            verification_method: Vec::new(),
            authentication: Vec::new(),
            assertion_method: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn from_value(value: Value) -> Result<Self, IdentityError> {
        serde_json::from_value(value).map_err(|e| IdentityError::InvalidDocument(e.to_string()))
    }

    /// The controlling DID; a document without one controls itself.
    pub fn controller(&self) -> &str {
        self.controller.as_deref().unwrap_or(&self.id)
    }

    /// Expand a relative method id against this document's DID.
    pub fn absolute_id(&self, id: &str) -> String {
        if id.starts_with('#') {
            format!("{}{}", self.id, id)
        } else {
            id.to_string()
        }
    }

    fn same_id(&self, a: &str, b: &str) -> bool {
        self.absolute_id(a) == self.absolute_id(b)
    }

    /// Look up a verification method by id, including methods embedded in
    /// relationships.
    pub fn find_method(&self, reference: &str) -> Option<&VerificationMethod> {
        self.verification_method
            .iter()
            .chain(
                self.authentication
                    .iter()
                    .chain(self.assertion_method.iter())
                    .filter_map(|entry| match entry {
                        VerificationRelationship::Embedded(method) => Some(method),
                        VerificationRelationship::Reference(_) => None,
                    }),
            )
            .find(|method| self.same_id(&method.id, reference))
    }

    fn relationship(&self, purpose: ProofPurpose) -> &[VerificationRelationship] {
        match purpose {
            ProofPurpose::AssertionMethod => &self.assertion_method,
            ProofPurpose::Authentication => &self.authentication,
        }
    }

    /// Whether `method_id` may make proofs for `purpose`.
    ///
    /// A document that lists no relationship at all for the purpose
    /// authorizes every method in `verificationMethod`.
    pub fn authorizes(&self, purpose: ProofPurpose, method_id: &str) -> bool {
        let entries = self.relationship(purpose);
        if entries.is_empty() {
            return self
                .verification_method
                .iter()
                .any(|method| self.same_id(&method.id, method_id));
        }
        entries
            .iter()
            .any(|entry| self.same_id(entry.id(), method_id))
    }

    /// The first method whose key type produces `proof_type` proofs.
    pub fn first_method_for_proof_type(&self, proof_type: &str) -> Option<&VerificationMethod> {
        self.verification_method
            .iter()
            .find(|method| method.supports_proof_type(proof_type))
    }
}
