use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use orcl_core::{parse_did, CredentialConfig, ExpiryPolicy};
use orcl_crypto::{signing_input, verify, PublicKey, Signature};
use orcl_identity::{ProofPurpose, TrustStore};

use crate::error::CredentialError;
use crate::model::{
    ensure_supported_proof_type, timestamp, CredentialSubject, Proof, VerifiableCredential,
};
use crate::wallet::WalletKey;

/// Bytes a proof signs over `document`.
pub(crate) fn proof_input<T: Serialize>(document: &T, proof: &Proof) -> Result<Vec<u8>, CredentialError> {
    let document = serde_json::to_value(document)?;
    let options = serde_json::to_value(proof)?;
    Ok(signing_input(&options, &document)?)
}

/// Check `proof` over `document` against `public_key`. `did` names the
/// signer in the error.
pub(crate) fn check_proof<T: Serialize>(
    document: &T,
    proof: &Proof,
    public_key: &PublicKey,
    did: &str,
) -> Result<(), CredentialError> {
    ensure_supported_proof_type(&proof.proof_type)?;
    let encoded = proof.jws.as_deref().ok_or(CredentialError::MissingProof)?;
    let failed = || CredentialError::SignatureVerificationFailed {
        did: did.to_string(),
    };
    let signature = Signature::from_base64(encoded).map_err(|_| failed())?;
    let input = proof_input(document, proof)?;
    verify(&input, &signature, public_key).map_err(|_| failed())
}

/// The DID part of a verification method reference.
pub(crate) fn controller_of(verification_method: &str) -> Option<String> {
    parse_did(verification_method).map(|parsed| parsed.did)
}

/// Issues and verifies verifiable credentials.
#[derive(Clone)]
pub struct CredentialService {
    trust: TrustStore,
    config: CredentialConfig,
}

impl CredentialService {
    pub fn new(trust: TrustStore, config: CredentialConfig) -> Self {
        Self { trust, config }
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        self.config.expiry_policy
    }

    /// Build and sign a credential about `subject`, issued by `issuer_did`
    /// with `key`. Expires after the configured validity window.
    pub async fn sign(
        &self,
        subject: CredentialSubject,
        credential_types: Vec<String>,
        issuer_did: &str,
        key: &WalletKey,
        purpose: ProofPurpose,
    ) -> Result<VerifiableCredential, CredentialError> {
        let credential = VerifiableCredential::new(issuer_did, credential_types, subject);
        self.sign_credential(credential, key, purpose).await
    }

    /// Sign an already built credential. Any previous proof is replaced. A
    /// credential without an expiration date gets the configured validity
    /// window.
    pub async fn sign_credential(
        &self,
        mut credential: VerifiableCredential,
        key: &WalletKey,
        purpose: ProofPurpose,
    ) -> Result<VerifiableCredential, CredentialError> {
        credential.validate()?;
        if controller_of(key.method_id()).as_deref() != Some(credential.issuer.as_str()) {
            return Err(CredentialError::InvalidCredential(format!(
                "key {} does not belong to issuer {}",
                key.method_id(),
                credential.issuer
            )));
        }

        let now = Utc::now();
        if credential.expiration_date.is_none() {
            if let Some(expiry) = self.valid_until(now)? {
                credential = credential.with_expiration(expiry);
            }
        }
        credential.issuance_date = timestamp(now);
        credential.proof = None;
        let mut proof = Proof::new(key.default_proof_type(), purpose, key.method_id());
        proof.created = credential.issuance_date.clone();

        let input = proof_input(&credential, &proof)?;
        proof.jws = Some(key.sign(&input).await.to_base64());
        credential.proof = Some(proof);

        tracing::info!(
            issuer = %credential.issuer,
            subject = credential.subject_did().unwrap_or("-"),
            credential_id = credential.id.as_deref().unwrap_or("-"),
            "credential issued"
        );
        Ok(credential)
    }

    /// Verify `credential` against an already resolved issuer key.
    pub fn verify_with_key(
        &self,
        credential: &VerifiableCredential,
        issuer_key: &PublicKey,
    ) -> Result<(), CredentialError> {
        credential.validate()?;
        let proof = credential.proof.as_ref().ok_or(CredentialError::MissingProof)?;
        check_proof(credential, proof, issuer_key, &credential.issuer)?;
        self.check_expiry(credential)
    }

    /// Resolve the issuer's key through the ledger and verify `credential`.
    pub async fn verify(&self, credential: &VerifiableCredential) -> Result<(), CredentialError> {
        credential.validate()?;
        let proof = credential.proof.as_ref().ok_or(CredentialError::MissingProof)?;
        ensure_supported_proof_type(&proof.proof_type)?;

        let missing = |reason: String| CredentialError::MissingIssuerKey {
            did: credential.issuer.clone(),
            reason,
        };
        if controller_of(&proof.verification_method).as_deref() != Some(credential.issuer.as_str()) {
            return Err(missing(format!(
                "proof method {} is not controlled by the issuer",
                proof.verification_method
            )));
        }
        let trusted = self
            .trust
            .resolve_key(&proof.verification_method, proof.proof_purpose)
            .await
            .map_err(|e| missing(e.to_string()))?;

        let result = self.verify_with_key(credential, &trusted.public_key);
        match &result {
            Ok(()) => tracing::debug!(issuer = %credential.issuer, "credential verified"),
            Err(e) => tracing::warn!(issuer = %credential.issuer, error = %e, "credential rejected"),
        }
        result
    }

    /// End of the validity window for a credential issued at `issued`.
    /// `None` when credentials do not expire.
    fn valid_until(&self, issued: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, CredentialError> {
        let days = self.config.validity_days;
        if days <= 0 {
            return Ok(None);
        }
        Duration::try_days(days)
            .and_then(|window| issued.checked_add_signed(window))
            .map(Some)
            .ok_or_else(|| {
                CredentialError::InvalidCredential(format!("validity window of {} days is out of range", days))
            })
    }

    fn check_expiry(&self, credential: &VerifiableCredential) -> Result<(), CredentialError> {
        if self.config.expiry_policy == ExpiryPolicy::Ignore {
            return Ok(());
        }
        match credential.expires_at()? {
            Some(expiry) if Utc::now() > expiry => Err(CredentialError::ExpiredCredential {
                expired_at: timestamp(expiry),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp;
    use crate::wallet::Wallet;
    use orcl_crypto::KeyPair;
    use orcl_identity::{OrclDidResolver, VerificationMethodType};
    use orcl_ledger::{InMemoryLedger, LedgerService};
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct Issuer {
        did: String,
        key: WalletKey,
        service: CredentialService,
    }

    async fn issuer_with(config: CredentialConfig) -> Issuer {
        let ledger = Arc::new(InMemoryLedger::new());
        let keypair = KeyPair::generate();
        let doc = ledger.create(&keypair.public_key().to_pem()).await.unwrap();
        let did = doc["id"].as_str().unwrap().to_string();

        let wallet = Wallet::new();
        let key = wallet.insert(
            format!("{}#keys-1", did),
            VerificationMethodType::Ed25519VerificationKey2018,
            keypair,
        );
        let resolver = Arc::new(OrclDidResolver::new(ledger, std::time::Duration::from_secs(60)));
        let service = CredentialService::new(TrustStore::new(resolver), config);
        Issuer { did, key, service }
    }

    async fn issuer() -> Issuer {
        issuer_with(CredentialConfig::default()).await
    }

    fn subject() -> CredentialSubject {
        CredentialSubject::from_value(json!({
            "holderId": "did:orcl:aa11bb22-cc33-4d44-8e55-ff6677889900",
            "loyaltyProgram": [{"lpId": "LP1", "lpPoints": "3000"}],
        }))
        .unwrap()
    }

    async fn signed(issuer: &Issuer) -> VerifiableCredential {
        issuer
            .service
            .sign(
                subject(),
                vec!["LoyaltyCredential".into()],
                &issuer.did,
                &issuer.key,
                ProofPurpose::AssertionMethod,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sign_then_verify() {
        let issuer = issuer().await;
        let vc = signed(&issuer).await;
        assert!(vc.is_signed());
        assert!(vc.expiration_date.is_some());
        let proof = vc.proof.as_ref().unwrap();
        assert_eq!(proof.created, vc.issuance_date);
        assert_eq!(proof.verification_method, format!("{}#keys-1", issuer.did));

        issuer.service.verify(&vc).await.unwrap();
        issuer
            .service
            .verify_with_key(&vc, issuer.key.public_key())
            .unwrap();
    }

    #[tokio::test]
    async fn test_verify_after_wire_round_trip() {
        let issuer = issuer().await;
        let vc = signed(&issuer).await;
        let text = serde_json::to_string(&vc).unwrap();
        let received: VerifiableCredential = serde_json::from_str(&text).unwrap();
        issuer.service.verify(&received).await.unwrap();
    }

    #[tokio::test]
    async fn test_tampered_subject_rejected() {
        let issuer = issuer().await;
        let vc = signed(&issuer).await;

        let mut tampered = vc.clone();
        tampered
            .credential_subject
            .claims
            .insert("loyaltyProgram".into(), json!([{"lpId": "LP1", "lpPoints": "9000"}]));
        assert!(matches!(
            issuer.service.verify(&tampered).await,
            Err(CredentialError::SignatureVerificationFailed { .. })
        ));

        let mut extra = vc.clone();
        extra.extra.insert("evidence".into(), Value::Bool(true));
        assert!(issuer.service.verify(&extra).await.is_err());

        let mut reissued = vc;
        reissued.issuance_date = "2020-01-01T00:00:00Z".into();
        assert!(issuer.service.verify(&reissued).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let issuer = issuer().await;
        let vc = signed(&issuer).await;
        let other = KeyPair::generate().public_key();
        assert_eq!(
            issuer.service.verify_with_key(&vc, &other),
            Err(CredentialError::SignatureVerificationFailed {
                did: issuer.did.clone()
            })
        );
    }

    #[tokio::test]
    async fn test_unresolvable_issuer() {
        let issuer = issuer().await;
        let mut vc = signed(&issuer).await;
        let stranger = "did:orcl:00000000-0000-4000-8000-000000000000";
        vc.issuer = stranger.into();
        vc.proof.as_mut().unwrap().verification_method = format!("{}#keys-1", stranger);
        assert!(matches!(
            issuer.service.verify(&vc).await,
            Err(CredentialError::MissingIssuerKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_proof_method_must_belong_to_issuer() {
        let issuer = issuer().await;
        let mut vc = signed(&issuer).await;
        vc.issuer = "did:orcl:00000000-0000-4000-8000-000000000000".into();
        assert!(matches!(
            issuer.service.verify(&vc).await,
            Err(CredentialError::MissingIssuerKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_expiry_policy() {
        let issuer = issuer().await;
        let expired = VerifiableCredential::new(&issuer.did, vec![], subject())
            .with_expiration(Utc::now() - Duration::hours(1));
        let vc = issuer
            .service
            .sign_credential(expired, &issuer.key, ProofPurpose::AssertionMethod)
            .await
            .unwrap();
        assert!(matches!(
            issuer.service.verify(&vc).await,
            Err(CredentialError::ExpiredCredential { .. })
        ));

        let lenient = issuer_with(CredentialConfig {
            expiry_policy: ExpiryPolicy::Ignore,
            ..CredentialConfig::default()
        })
        .await;
        let expired = VerifiableCredential::new(&lenient.did, vec![], subject())
            .with_expiration(Utc::now() - Duration::hours(1));
        let vc = lenient
            .service
            .sign_credential(expired, &lenient.key, ProofPurpose::AssertionMethod)
            .await
            .unwrap();
        lenient.service.verify(&vc).await.unwrap();
    }

    #[tokio::test]
    async fn test_validity_window() {
        let issuer = issuer().await;
        let preview = VerifiableCredential::new(&issuer.did, vec![], subject());
        let vc = issuer
            .service
            .sign_credential(preview, &issuer.key, ProofPurpose::AssertionMethod)
            .await
            .unwrap();
        let issued = parse_timestamp(&vc.issuance_date).unwrap();
        assert_eq!(vc.expires_at().unwrap(), Some(issued + Duration::days(365)));

        let forever = issuer_with(CredentialConfig {
            validity_days: 0,
            ..CredentialConfig::default()
        })
        .await;
        let vc = forever
            .service
            .sign(subject(), vec![], &forever.did, &forever.key, ProofPurpose::AssertionMethod)
            .await
            .unwrap();
        assert!(vc.expiration_date.is_none());
    }

    #[tokio::test]
    async fn test_validity_window_overflow_is_an_error() {
        let issuer = issuer_with(CredentialConfig {
            validity_days: 200_000_000,
            ..CredentialConfig::default()
        })
        .await;
        let result = issuer
            .service
            .sign(subject(), vec![], &issuer.did, &issuer.key, ProofPurpose::AssertionMethod)
            .await;
        assert!(matches!(result, Err(CredentialError::InvalidCredential(_))));

        let unbounded = issuer_with(CredentialConfig {
            validity_days: i64::MAX,
            ..CredentialConfig::default()
        })
        .await;
        let preview = VerifiableCredential::new(&unbounded.did, vec![], subject());
        let result = unbounded
            .service
            .sign_credential(preview, &unbounded.key, ProofPurpose::AssertionMethod)
            .await;
        assert!(matches!(result, Err(CredentialError::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn test_unsupported_proof_type() {
        let issuer = issuer().await;
        let mut vc = signed(&issuer).await;
        vc.proof.as_mut().unwrap().proof_type = "RSA-SHA256".into();
        assert_eq!(
            issuer.service.verify(&vc).await,
            Err(CredentialError::UnsupportedProofType("RSA-SHA256".into()))
        );
    }

    #[tokio::test]
    async fn test_foreign_key_cannot_sign_for_issuer() {
        let issuer = issuer().await;
        let vc = VerifiableCredential::new("did:orcl:00000000-0000-4000-8000-000000000000", vec![], subject());
        assert!(matches!(
            issuer
                .service
                .sign_credential(vc, &issuer.key, ProofPurpose::AssertionMethod)
                .await,
            Err(CredentialError::InvalidCredential(_))
        ));
    }
}
