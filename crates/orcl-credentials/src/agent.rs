//! The agent context: one value owning every service an Orcl party needs.

use std::sync::Arc;
use std::time::Duration;

use orcl_core::AgentConfig;
use orcl_crypto::KeyPair;
use orcl_identity::{
    DidCreateOptions, DidRecordStore, DidRegistrar, NewVerificationMethod, OrclDidResolver,
    TrustStore, VerificationMethodType,
};
use orcl_ledger::LedgerService;

use crate::credential::CredentialService;
use crate::error::{CredentialError, ExchangeError};
use crate::exchange::{AgentMessage, CredentialExchangeService, ProofExchangeService, Protocol};
use crate::presentation::PresentationService;
use crate::repository::{CredentialRepository, InMemoryCredentialRepository};
use crate::wallet::Wallet;

/// An issuer, holder or verifier. Everything is reached through this value;
/// nothing is process-global.
pub struct Agent {
    config: AgentConfig,
    ledger: Arc<dyn LedgerService>,
    resolver: Arc<OrclDidResolver>,
    registrar: DidRegistrar,
    wallet: Arc<Wallet>,
    repository: Arc<dyn CredentialRepository>,
    credentials: CredentialService,
    presentations: PresentationService,
    proofs: ProofExchangeService,
    issuance: CredentialExchangeService,
}

impl Agent {
    pub fn new(config: AgentConfig, ledger: Arc<dyn LedgerService>) -> Self {
        Self::with_repository(config, ledger, Arc::new(InMemoryCredentialRepository::new()))
    }

    pub fn with_repository(
        config: AgentConfig,
        ledger: Arc<dyn LedgerService>,
        repository: Arc<dyn CredentialRepository>,
    ) -> Self {
        let resolver = Arc::new(OrclDidResolver::new(
            ledger.clone(),
            Duration::from_secs(config.resolver.cache_ttl_secs),
        ));
        let registrar = DidRegistrar::new(
            ledger.clone(),
            Arc::new(DidRecordStore::new()),
            resolver.clone(),
        );
        let trust = TrustStore::new(resolver.clone());
        let wallet = Arc::new(Wallet::new());
        let credentials = CredentialService::new(trust.clone(), config.credentials.clone());
        let presentations =
            PresentationService::new(credentials.clone(), trust.clone(), config.presentation.clone());
        let proofs = ProofExchangeService::new(
            presentations.clone(),
            trust,
            wallet.clone(),
            repository.clone(),
        );
        let issuance =
            CredentialExchangeService::new(credentials.clone(), wallet.clone(), repository.clone());

        tracing::info!(label = %config.label, "agent initialized");
        Self {
            config,
            ledger,
            resolver,
            registrar,
            wallet,
            repository,
            credentials,
            presentations,
            proofs,
            issuance,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerService> {
        &self.ledger
    }

    pub fn resolver(&self) -> &Arc<OrclDidResolver> {
        &self.resolver
    }

    pub fn registrar(&self) -> &DidRegistrar {
        &self.registrar
    }

    pub fn wallet(&self) -> &Arc<Wallet> {
        &self.wallet
    }

    pub fn repository(&self) -> &Arc<dyn CredentialRepository> {
        &self.repository
    }

    pub fn credentials(&self) -> &CredentialService {
        &self.credentials
    }

    pub fn presentations(&self) -> &PresentationService {
        &self.presentations
    }

    pub fn proofs(&self) -> &ProofExchangeService {
        &self.proofs
    }

    pub fn issuance(&self) -> &CredentialExchangeService {
        &self.issuance
    }

    /// Register a DID for a fresh key and keep the key in the wallet.
    pub async fn create_did(&self, method_type: VerificationMethodType) -> Result<String, CredentialError> {
        self.create_did_with_key(KeyPair::generate(), method_type).await
    }

    /// Register a DID for `keypair` and keep the key in the wallet.
    pub async fn create_did_with_key(
        &self,
        keypair: KeyPair,
        method_type: VerificationMethodType,
    ) -> Result<String, CredentialError> {
        let public_key = keypair.public_key();
        let method = match method_type {
            VerificationMethodType::Ed25519VerificationKey2020 => {
                NewVerificationMethod::ed25519_2020(public_key.clone())
            }
            _ => NewVerificationMethod::ed25519_2018(public_key.clone()),
        };
        let result = self
            .registrar
            .create(DidCreateOptions {
                verification_method: Some(method),
                ..DidCreateOptions::default()
            })
            .await;
        let document = match result.document() {
            Some(document) if result.is_finished() => document,
            _ => {
                return Err(CredentialError::Registration(
                    result.reason().unwrap_or("unknownError").to_string(),
                ))
            }
        };

        let registered = document
            .verification_method
            .iter()
            .find(|vm| vm.public_key().map_or(false, |key| key == public_key))
            .ok_or_else(|| {
                CredentialError::Registration(format!(
                    "ledger document {} does not carry the registered key",
                    document.id
                ))
            })?;
        let method_id = document.absolute_id(&registered.id);
        self.wallet
            .insert(method_id.clone(), registered.method_type.clone(), keypair);

        tracing::info!(agent = %self.config.label, did = %document.id, method = %method_id, "DID created");
        Ok(document.id.clone())
    }

    /// Route an inbound message to its exchange and return what must be sent
    /// back. Messages that break the protocol are logged and dropped.
    pub async fn receive(&self, message: AgentMessage) -> Vec<AgentMessage> {
        let message_id = message.id.clone();
        let kind = message.body.kind();
        let handled = match message.body.protocol() {
            Some(Protocol::PresentProof) => self.proofs.receive(message).await.map(|o| o.outbound),
            Some(Protocol::IssueCredential) => {
                self.issuance.receive(message).await.map(|o| o.outbound)
            }
            None => self.receive_problem_report(message).await,
        };
        match handled {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::warn!(
                    agent = %self.config.label,
                    message_id = %message_id,
                    kind = %kind,
                    error = %e,
                    "inbound message dropped"
                );
                Vec::new()
            }
        }
    }

    async fn receive_problem_report(
        &self,
        message: AgentMessage,
    ) -> Result<Vec<AgentMessage>, ExchangeError> {
        if self.proofs.has_thread(&message.thread_id) {
            return self.proofs.receive(message).await.map(|o| o.outbound);
        }
        if self.issuance.has_thread(&message.thread_id) {
            return self.issuance.receive(message).await.map(|o| o.outbound);
        }
        Err(ExchangeError::RecordNotFound(message.thread_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MessageBody;
    use crate::model::{CredentialSubject, VerifiableCredential};
    use orcl_core::ProofExchangeState;
    use orcl_ledger::InMemoryLedger;
    use serde_json::Map;

    fn agent(label: &str, ledger: &Arc<InMemoryLedger>) -> Agent {
        let config = AgentConfig {
            label: label.into(),
            ..AgentConfig::default()
        };
        Agent::new(config, ledger.clone())
    }

    #[tokio::test]
    async fn test_create_did_stores_key() {
        let ledger = Arc::new(InMemoryLedger::new());
        let issuer = agent("issuer", &ledger);
        let did = issuer
            .create_did(VerificationMethodType::Ed25519VerificationKey2018)
            .await
            .unwrap();
        assert!(did.starts_with("did:orcl:"));
        let key = issuer.wallet().key_for_did(&did).unwrap();
        assert_eq!(key.method_id(), format!("{}#keys-1", did));
        assert!(issuer.registrar().records().find_created(&did).is_some());
    }

    #[tokio::test]
    async fn test_create_did_reports_ledger_failure() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_offline(true);
        let issuer = agent("issuer", &ledger);
        assert!(matches!(
            issuer
                .create_did(VerificationMethodType::Ed25519VerificationKey2018)
                .await,
            Err(CredentialError::Registration(reason)) if reason.starts_with("unknownError")
        ));
        assert!(issuer.wallet().is_empty());
    }

    #[tokio::test]
    async fn test_receive_drops_out_of_order_messages() {
        let ledger = Arc::new(InMemoryLedger::new());
        let verifier = agent("verifier", &ledger);
        let ack = AgentMessage::new("no-such-thread", "conn", MessageBody::PresentationAck);
        assert!(verifier.receive(ack).await.is_empty());
        let report = AgentMessage::new(
            "no-such-thread",
            "conn",
            MessageBody::ProblemReport {
                description: "gone".into(),
            },
        );
        assert!(verifier.receive(report).await.is_empty());
    }

    #[tokio::test]
    async fn test_problem_report_reaches_proof_thread() {
        let ledger = Arc::new(InMemoryLedger::new());
        let holder = agent("holder", &ledger);
        let did = holder
            .create_did(VerificationMethodType::Ed25519VerificationKey2018)
            .await
            .unwrap();
        let proposal = crate::presentation::ProofDetail {
            presentation: holder.presentations().create_presentation(
                vec![VerifiableCredential::new(
                    &did,
                    vec![],
                    CredentialSubject::for_holder(&did, Map::new()),
                )],
                &did,
            ),
            options: crate::presentation::ProofDetailOptions {
                proof_type: crate::model::ED25519_SIGNATURE_2018.into(),
                proof_purpose: orcl_identity::ProofPurpose::Authentication,
                created: None,
                domain: None,
                challenge: None,
            },
        };
        let started = holder.proofs().propose_presentation("conn", proposal).unwrap();
        let report = AgentMessage::new(
            &started.record.thread_id,
            "conn",
            MessageBody::ProblemReport {
                description: "not interested".into(),
            },
        );
        assert!(holder.receive(report).await.is_empty());
        let record = holder.proofs().record(&started.record.id).await.unwrap();
        assert_eq!(record.state, ProofExchangeState::Abandoned);
        assert_eq!(record.error_message.as_deref(), Some("not interested"));
    }
}
