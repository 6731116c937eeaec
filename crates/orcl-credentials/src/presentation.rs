use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use orcl_core::PresentationConfig;
use orcl_crypto::PublicKey;
use orcl_identity::{ProofPurpose, TrustStore};

use crate::credential::{check_proof, controller_of, proof_input, CredentialService};
use crate::error::CredentialError;
use crate::model::{
    ensure_supported_proof_type, timestamp, Proof, VerifiableCredential, VerifiablePresentation,
};
use crate::wallet::WalletKey;

/// Proof options a verifier asks for, or a holder proposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofDetailOptions {
    pub proof_type: String,
    pub proof_purpose: ProofPurpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
}

/// A presentation proposal or request: the presentation to sign and the
/// options its proof must carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofDetail {
    pub presentation: VerifiablePresentation,
    pub options: ProofDetailOptions,
}

/// Options for the holder's proof over a presentation.
#[derive(Debug, Clone, Default)]
pub struct PresentationProofOptions {
    /// Defaults to the key's own proof type.
    pub proof_type: Option<String>,
    /// Defaults to the configured presentation purpose.
    pub proof_purpose: Option<ProofPurpose>,
    pub challenge: Option<String>,
    pub domain: Option<String>,
    /// Defaults to the signing time.
    pub created: Option<String>,
}

impl PresentationProofOptions {
    /// Options that satisfy `request` field for field.
    pub fn from_request(request: &ProofDetailOptions) -> Self {
        Self {
            proof_type: Some(request.proof_type.clone()),
            proof_purpose: Some(request.proof_purpose),
            challenge: request.challenge.clone(),
            domain: request.domain.clone(),
            created: request.created.clone(),
        }
    }
}

/// Which signature layer of a presentation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationLayer {
    /// The holder's proof over the envelope.
    Presentation,
    /// The issuer proof of the embedded credential at `index`.
    Credential { index: usize },
}

impl fmt::Display for VerificationLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Presentation => write!(f, "presentation"),
            Self::Credential { index } => write!(f, "credential[{}]", index),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationFailure {
    pub layer: VerificationLayer,
    /// DID whose key was involved.
    pub did: String,
    pub error: CredentialError,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.layer, self.did, self.error)
    }
}

/// Outcome of verifying a presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    pub is_valid: bool,
    pub error: Option<VerificationFailure>,
}

impl VerificationResult {
    fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    fn invalid(layer: VerificationLayer, did: &str, error: CredentialError) -> Self {
        Self {
            is_valid: false,
            error: Some(VerificationFailure {
                layer,
                did: did.to_string(),
                error,
            }),
        }
    }
}

/// Builds, signs and verifies verifiable presentations.
#[derive(Clone)]
pub struct PresentationService {
    credentials: CredentialService,
    trust: TrustStore,
    config: PresentationConfig,
}

impl PresentationService {
    pub fn new(credentials: CredentialService, trust: TrustStore, config: PresentationConfig) -> Self {
        Self {
            credentials,
            trust,
            config,
        }
    }

    /// Proof purpose used for holder proofs unless a request says otherwise.
    pub fn default_proof_purpose(&self) -> ProofPurpose {
        self.config
            .proof_purpose
            .parse()
            .unwrap_or(ProofPurpose::Authentication)
    }

    pub fn strict_structure(&self) -> bool {
        self.config.strict_structure
    }

    /// An unsigned presentation of `credentials` by `holder_did`.
    pub fn create_presentation(
        &self,
        credentials: Vec<VerifiableCredential>,
        holder_did: &str,
    ) -> VerifiablePresentation {
        VerifiablePresentation::new(holder_did, credentials)
    }

    /// Sign `presentation` with the holder's `key`. A challenge from the
    /// options is copied into the proof verbatim.
    pub async fn sign_presentation(
        &self,
        mut presentation: VerifiablePresentation,
        key: &WalletKey,
        options: PresentationProofOptions,
    ) -> Result<VerifiablePresentation, CredentialError> {
        if controller_of(key.method_id()).as_deref() != Some(presentation.holder.as_str()) {
            return Err(CredentialError::InvalidCredential(format!(
                "key {} does not belong to holder {}",
                key.method_id(),
                presentation.holder
            )));
        }
        let proof_type = options
            .proof_type
            .unwrap_or_else(|| key.default_proof_type().to_string());
        ensure_supported_proof_type(&proof_type)?;

        presentation.proof = None;
        let mut proof = Proof::new(
            proof_type,
            options
                .proof_purpose
                .unwrap_or_else(|| self.default_proof_purpose()),
            key.method_id(),
        );
        proof.created = options.created.unwrap_or_else(|| timestamp(Utc::now()));
        proof.challenge = options.challenge;
        proof.domain = options.domain;

        let input = proof_input(&presentation, &proof)?;
        proof.jws = Some(key.sign(&input).await.to_base64());
        presentation.proof = Some(proof);

        tracing::debug!(
            holder = %presentation.holder,
            credentials = presentation.verifiable_credential.len(),
            "presentation signed"
        );
        Ok(presentation)
    }

    /// Resolve the holder key from the ledger and verify both signature
    /// layers.
    pub async fn verify_presentation(
        &self,
        presentation: &VerifiablePresentation,
        expected_challenge: Option<&str>,
    ) -> VerificationResult {
        let holder = presentation.holder.as_str();
        let proof = match envelope_proof(presentation, expected_challenge) {
            Ok(proof) => proof,
            Err(e) => return VerificationResult::invalid(VerificationLayer::Presentation, holder, e),
        };
        if controller_of(&proof.verification_method).as_deref() != Some(holder) {
            return VerificationResult::invalid(
                VerificationLayer::Presentation,
                holder,
                CredentialError::InvalidCredential(format!(
                    "proof method {} is not controlled by the holder",
                    proof.verification_method
                )),
            );
        }
        match self
            .trust
            .resolve_key(&proof.verification_method, proof.proof_purpose)
            .await
        {
            Ok(trusted) => {
                self.verify_presentation_with_key(presentation, &trusted.public_key, expected_challenge)
                    .await
            }
            Err(e) => VerificationResult::invalid(VerificationLayer::Presentation, holder, e.into()),
        }
    }

    /// Verify the holder proof with `holder_key`, then every embedded
    /// credential against its issuer's ledger key. Each credential must be
    /// about the presenting holder. Stops at the first failure.
    pub async fn verify_presentation_with_key(
        &self,
        presentation: &VerifiablePresentation,
        holder_key: &PublicKey,
        expected_challenge: Option<&str>,
    ) -> VerificationResult {
        let holder = presentation.holder.as_str();
        let envelope = envelope_proof(presentation, expected_challenge)
            .and_then(|proof| check_proof(presentation, proof, holder_key, holder));
        if let Err(e) = envelope {
            tracing::warn!(holder = %holder, error = %e, "presentation proof rejected");
            return VerificationResult::invalid(VerificationLayer::Presentation, holder, e);
        }
        if presentation.verifiable_credential.is_empty() {
            return VerificationResult::invalid(
                VerificationLayer::Presentation,
                holder,
                CredentialError::InvalidCredential("presentation carries no credentials".into()),
            );
        }

        for (index, credential) in presentation.verifiable_credential.iter().enumerate() {
            if let Err(e) = self.credentials.verify(credential).await {
                tracing::warn!(
                    holder = %holder,
                    issuer = %credential.issuer,
                    index,
                    error = %e,
                    "embedded credential rejected"
                );
                return VerificationResult::invalid(
                    VerificationLayer::Credential { index },
                    &credential.issuer,
                    e,
                );
            }
            let subject = credential.subject_did().unwrap_or_default();
            if subject != holder {
                tracing::warn!(holder = %holder, subject = %subject, index, "credential presented by another DID");
                return VerificationResult::invalid(
                    VerificationLayer::Credential { index },
                    holder,
                    CredentialError::HolderMismatch {
                        holder: holder.to_string(),
                        subject: subject.to_string(),
                    },
                );
            }
        }

        tracing::info!(
            holder = %holder,
            credentials = presentation.verifiable_credential.len(),
            "presentation verified"
        );
        VerificationResult::valid()
    }

    /// Check a received presentation against the request it answers: proof
    /// options field by field, then (when strict) the presentation body.
    pub fn verify_received_presentation_matches_request(
        &self,
        presentation: &VerifiablePresentation,
        request: &ProofDetail,
    ) -> Result<(), CredentialError> {
        let proof = presentation.proof.as_ref().ok_or(CredentialError::MissingProof)?;
        let options = &request.options;
        let mismatch = |field: &str| CredentialError::PresentationMismatch {
            field: field.to_string(),
        };

        if options.created.as_ref().is_some_and(|created| *created != proof.created) {
            return Err(mismatch("created"));
        }
        if proof.domain != options.domain {
            return Err(mismatch("domain"));
        }
        if proof.challenge != options.challenge {
            return Err(mismatch("challenge"));
        }
        if proof.proof_type != options.proof_type {
            return Err(mismatch("type"));
        }
        if proof.proof_purpose != options.proof_purpose {
            return Err(mismatch("proofPurpose"));
        }

        if self.config.strict_structure {
            let mut received = presentation.unsecured_value()?;
            let mut requested = request.presentation.unsecured_value()?;
            // an empty credential list leaves selection to the holder
            if request.presentation.verifiable_credential.is_empty() {
                for value in [&mut received, &mut requested] {
                    if let Some(map) = value.as_object_mut() {
                        map.remove("verifiableCredential");
                    }
                }
            }
            if received != requested {
                return Err(mismatch("presentation"));
            }
        }
        Ok(())
    }
}

fn envelope_proof<'a>(
    presentation: &'a VerifiablePresentation,
    expected_challenge: Option<&str>,
) -> Result<&'a Proof, CredentialError> {
    let proof = presentation.proof.as_ref().ok_or(CredentialError::MissingProof)?;
    if let Some(expected) = expected_challenge {
        if proof.challenge.as_deref() != Some(expected) {
            return Err(CredentialError::PresentationMismatch {
                field: "challenge".into(),
            });
        }
    }
    Ok(proof)
}
