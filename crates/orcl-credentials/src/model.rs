//! W3C verifiable credential and presentation documents.
//!
//! Every document keeps members it does not model in an open `extra` map so
//! that a credential survives a parse/serialize cycle byte-for-byte under
//! canonicalization, and its proof stays valid.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use orcl_identity::ProofPurpose;

use crate::error::CredentialError;

pub const CREDENTIALS_CONTEXT_V1: &str = "https://www.w3.org/2018/credentials/v1";
pub const VERIFIABLE_CREDENTIAL: &str = "VerifiableCredential";
pub const VERIFIABLE_PRESENTATION: &str = "VerifiablePresentation";

pub const ED25519_SIGNATURE_2018: &str = "Ed25519Signature2018";
pub const ED25519_SIGNATURE_2020: &str = "Ed25519Signature2020";

/// Proof types this engine can produce and check.
pub const SUPPORTED_PROOF_TYPES: [&str; 2] = [ED25519_SIGNATURE_2018, ED25519_SIGNATURE_2020];

pub fn ensure_supported_proof_type(proof_type: &str) -> Result<(), CredentialError> {
    if SUPPORTED_PROOF_TYPES.contains(&proof_type) {
        Ok(())
    } else {
        Err(CredentialError::UnsupportedProofType(proof_type.to_string()))
    }
}

/// Current time in the form stamped into credentials and proofs.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CredentialError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CredentialError::InvalidCredential(format!("bad timestamp {}: {}", value, e)))
}

/// The signature block of a credential or presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub created: String,
    pub proof_purpose: ProofPurpose,
    pub verification_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Base64 signature. Absent while the proof is being built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jws: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Proof {
    pub fn new(
        proof_type: impl Into<String>,
        proof_purpose: ProofPurpose,
        verification_method: impl Into<String>,
    ) -> Self {
        Self {
            proof_type: proof_type.into(),
            created: timestamp(Utc::now()),
            proof_purpose,
            verification_method: verification_method.into(),
            challenge: None,
            domain: None,
            nonce: None,
            jws: None,
            extra: Map::new(),
        }
    }
}

/// Claims about the subject. `holderId` (or `id`) names the subject's DID;
/// everything else is carried as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "holderId", default, skip_serializing_if = "Option::is_none")]
    pub holder_id: Option<String>,
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl CredentialSubject {
    /// A subject bound to `holder_did` with the given claims.
    pub fn for_holder(holder_did: impl Into<String>, claims: Map<String, Value>) -> Self {
        Self {
            id: None,
            holder_id: Some(holder_did.into()),
            claims,
        }
    }

    pub fn from_value(value: Value) -> Result<Self, CredentialError> {
        Ok(serde_json::from_value(value)?)
    }

    /// The DID the credential is about.
    pub fn subject_did(&self) -> Option<&str> {
        self.holder_id.as_deref().or(self.id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableCredential {
    #[serde(rename = "@context")]
    pub context: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub issuer: String,
    pub issuance_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    pub credential_subject: CredentialSubject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VerifiableCredential {
    /// An unsigned credential issued now.
    pub fn new(
        issuer: impl Into<String>,
        credential_types: Vec<String>,
        credential_subject: CredentialSubject,
    ) -> Self {
        let mut types = vec![VERIFIABLE_CREDENTIAL.to_string()];
        types.extend(
            credential_types
                .into_iter()
                .filter(|t| t != VERIFIABLE_CREDENTIAL),
        );
        Self {
            context: vec![Value::String(CREDENTIALS_CONTEXT_V1.into())],
            id: Some(format!("urn:uuid:{}", Uuid::now_v7())),
            types,
            issuer: issuer.into(),
            issuance_date: timestamp(Utc::now()),
            expiration_date: None,
            credential_subject,
            proof: None,
            extra: Map::new(),
        }
    }

    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration_date = Some(timestamp(expiration));
        self
    }

    pub fn is_signed(&self) -> bool {
        self.proof.as_ref().is_some_and(|p| p.jws.is_some())
    }

    pub fn has_type(&self, credential_type: &str) -> bool {
        self.types.iter().any(|t| t == credential_type)
    }

    pub fn subject_did(&self) -> Option<&str> {
        self.credential_subject.subject_did()
    }

    pub fn expires_at(&self) -> Result<Option<DateTime<Utc>>, CredentialError> {
        self.expiration_date
            .as_deref()
            .map(parse_timestamp)
            .transpose()
    }

    /// Structural checks every credential must pass before its proof is
    /// looked at.
    pub fn validate(&self) -> Result<(), CredentialError> {
        if !self.has_type(VERIFIABLE_CREDENTIAL) {
            return Err(CredentialError::InvalidCredential(
                "type must include VerifiableCredential".into(),
            ));
        }
        if self.issuer.is_empty() {
            return Err(CredentialError::InvalidCredential("issuer is empty".into()));
        }
        parse_timestamp(&self.issuance_date)?;
        self.expires_at()?;
        Ok(())
    }

    pub fn to_value(&self) -> Result<Value, CredentialError> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiablePresentation {
    #[serde(rename = "@context")]
    pub context: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub holder: String,
    #[serde(default)]
    pub verifiable_credential: Vec<VerifiableCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VerifiablePresentation {
    pub fn new(holder: impl Into<String>, credentials: Vec<VerifiableCredential>) -> Self {
        Self {
            context: vec![Value::String(CREDENTIALS_CONTEXT_V1.into())],
            id: Some(format!("urn:uuid:{}", Uuid::new_v4())),
            types: vec![VERIFIABLE_PRESENTATION.to_string()],
            holder: holder.into(),
            verifiable_credential: credentials,
            proof: None,
            extra: Map::new(),
        }
    }

    /// The presentation as JSON without its proof.
    pub fn unsecured_value(&self) -> Result<Value, CredentialError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("proof");
        }
        Ok(value)
    }
}
