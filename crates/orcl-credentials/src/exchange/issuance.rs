use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orcl_core::{IssuanceEffect, IssuanceEvent, IssuanceState, IssuanceStateMachine, IssuanceTransition, Role};
use orcl_identity::ProofPurpose;

use crate::credential::CredentialService;
use crate::error::{CredentialError, ExchangeError};
use crate::exchange::message::{AgentMessage, MessageBody, Protocol};
use crate::exchange::{ExchangeOutcome, RecordStore};
use crate::model::VerifiableCredential;
use crate::repository::{CredentialRecord, CredentialRepository};
use crate::wallet::Wallet;

/// State of one issue-credential exchange, as seen by one party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialExchangeRecord {
    pub id: String,
    pub thread_id: String,
    pub connection_id: String,
    pub role: Role,
    pub state: IssuanceState,
    /// The unsigned credential the issuer offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<VerifiableCredential>,
    /// The signed credential, once issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<VerifiableCredential>,
    /// Holder side: outcome of checking the received credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    processed_messages: HashSet<String>,
}

impl CredentialExchangeRecord {
    fn new(thread_id: Option<&str>, connection_id: &str, role: Role, state: IssuanceState) -> Self {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        Self {
            thread_id: thread_id.map_or_else(|| id.clone(), str::to_string),
            id,
            connection_id: connection_id.to_string(),
            role,
            state,
            offer: None,
            credential: None,
            is_verified: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            processed_messages: HashSet::new(),
        }
    }

    fn commit(&mut self, transition: &IssuanceTransition) {
        if !transition.replayed {
            self.state = transition.to;
            self.updated_at = Utc::now();
        }
    }

    fn missing(&self, attachment: &'static str) -> ExchangeError {
        ExchangeError::MissingAttachment {
            record: self.id.clone(),
            attachment,
        }
    }

    fn messages_for(&self, transition: &IssuanceTransition) -> Result<Vec<AgentMessage>, ExchangeError> {
        let mut messages = Vec::with_capacity(transition.effects.len());
        for effect in &transition.effects {
            let body = match effect {
                IssuanceEffect::SendOffer => MessageBody::OfferCredential {
                    credential: self.offer.clone().ok_or_else(|| self.missing("offer"))?,
                },
                IssuanceEffect::SendRequest => MessageBody::RequestCredential {
                    credential: self.offer.clone().ok_or_else(|| self.missing("offer"))?,
                },
                IssuanceEffect::SendCredential => MessageBody::IssueCredential {
                    credential: self
                        .credential
                        .clone()
                        .ok_or_else(|| self.missing("credential"))?,
                },
                IssuanceEffect::SendAck => MessageBody::CredentialAck,
                IssuanceEffect::SendProblemReport => MessageBody::ProblemReport {
                    description: self
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "exchange abandoned".into()),
                },
            };
            messages.push(AgentMessage::new(&self.thread_id, &self.connection_id, body));
        }
        Ok(messages)
    }
}

type IssuanceOutcome = ExchangeOutcome<CredentialExchangeRecord>;

/// Runs issue-credential exchanges for one agent, as issuer or holder.
pub struct CredentialExchangeService {
    credentials: CredentialService,
    wallet: Arc<Wallet>,
    repository: Arc<dyn CredentialRepository>,
    records: RecordStore<CredentialExchangeRecord>,
}

impl CredentialExchangeService {
    pub fn new(
        credentials: CredentialService,
        wallet: Arc<Wallet>,
        repository: Arc<dyn CredentialRepository>,
    ) -> Self {
        Self {
            credentials,
            wallet,
            repository,
            records: RecordStore::new(),
        }
    }

    pub async fn record(&self, id: &str) -> Result<CredentialExchangeRecord, ExchangeError> {
        Ok(self.records.get(id)?.lock().await.clone())
    }

    pub fn has_thread(&self, thread_id: &str) -> bool {
        self.records.by_thread(thread_id).is_ok()
    }

    pub async fn records(&self) -> Vec<CredentialExchangeRecord> {
        let mut records = Vec::new();
        for handle in self.records.handles() {
            records.push(handle.lock().await.clone());
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.len() == 0
    }

    /// Issuer: offer `preview` to the holder on `connection_id`. The preview
    /// is signed only once the holder asks for it.
    pub fn offer_credential(
        &self,
        connection_id: &str,
        preview: VerifiableCredential,
    ) -> Result<IssuanceOutcome, ExchangeError> {
        preview.validate()?;
        if self.wallet.key_for_did(&preview.issuer).is_none() {
            return Err(CredentialError::KeyNotInWallet(preview.issuer.clone()).into());
        }
        let transition = IssuanceStateMachine::transition(None, IssuanceEvent::OfferCredential)?;
        let mut record = CredentialExchangeRecord::new(None, connection_id, Role::Issuer, transition.to);
        record.offer = Some(preview);
        let outbound = record.messages_for(&transition)?;
        self.records.insert(&record.id, &record.thread_id, record.clone());
        tracing::info!(exchange_id = %record.id, state = %record.state, "credential offered");
        Ok(ExchangeOutcome::new(record, outbound))
    }

    /// Holder: ask for the offered credential.
    pub async fn accept_offer(&self, record_id: &str) -> Result<IssuanceOutcome, ExchangeError> {
        let handle = self.records.get(record_id)?;
        let mut record = handle.lock().await;
        let transition =
            IssuanceStateMachine::transition(Some(record.state), IssuanceEvent::RequestCredential)?;
        record.commit(&transition);
        let outbound = record.messages_for(&transition)?;
        tracing::info!(exchange_id = %record.id, "credential offer accepted");
        Ok(ExchangeOutcome::new(record.clone(), outbound))
    }

    /// Issuer: sign the offered credential with the issuer's wallet key and
    /// send it. The signed credential is kept in the repository.
    pub async fn issue_credential(&self, record_id: &str) -> Result<IssuanceOutcome, ExchangeError> {
        let handle = self.records.get(record_id)?;
        let mut record = handle.lock().await;
        let transition =
            IssuanceStateMachine::transition(Some(record.state), IssuanceEvent::IssueCredential)?;
        let offer = record.offer.clone().ok_or_else(|| record.missing("offer"))?;
        let key = self
            .wallet
            .key_for_did(&offer.issuer)
            .ok_or_else(|| CredentialError::KeyNotInWallet(offer.issuer.clone()))?;

        let credential = self
            .credentials
            .sign_credential(offer, &key, ProofPurpose::AssertionMethod)
            .await?;
        self.repository
            .save(CredentialRecord::new(credential.clone()))
            .await?;

        record.credential = Some(credential);
        record.commit(&transition);
        let outbound = record.messages_for(&transition)?;
        Ok(ExchangeOutcome::new(record.clone(), outbound))
    }

    /// Holder: store a verified credential and acknowledge it.
    pub async fn accept_credential(&self, record_id: &str) -> Result<IssuanceOutcome, ExchangeError> {
        let handle = self.records.get(record_id)?;
        let mut record = handle.lock().await;
        let transition =
            IssuanceStateMachine::transition(Some(record.state), IssuanceEvent::AcceptCredential)?;
        if record.is_verified != Some(true) {
            return Err(ExchangeError::NotVerified(record.id.clone()));
        }
        let credential = record
            .credential
            .clone()
            .ok_or_else(|| record.missing("credential"))?;
        let stored = CredentialRecord::new(credential);
        let stored_id = stored.id.clone();
        self.repository.save(stored).await?;

        record.commit(&transition);
        let outbound = record.messages_for(&transition)?;
        tracing::info!(exchange_id = %record.id, record_id = %stored_id, "credential stored");
        Ok(ExchangeOutcome::new(record.clone(), outbound))
    }

    pub async fn abandon(&self, record_id: &str, reason: &str) -> Result<IssuanceOutcome, ExchangeError> {
        let handle = self.records.get(record_id)?;
        let mut record = handle.lock().await;
        let transition = IssuanceStateMachine::transition(Some(record.state), IssuanceEvent::Abandon)?;
        record.error_message = Some(reason.to_string());
        record.commit(&transition);
        let outbound = record.messages_for(&transition)?;
        tracing::info!(exchange_id = %record.id, reason = %reason, "issuance abandoned");
        Ok(ExchangeOutcome::new(record.clone(), outbound))
    }

    /// Process one inbound issue-credential message.
    pub async fn receive(&self, message: AgentMessage) -> Result<IssuanceOutcome, ExchangeError> {
        let event = match &message.body {
            MessageBody::OfferCredential { .. } => IssuanceEvent::ReceiveOffer,
            MessageBody::RequestCredential { .. } => IssuanceEvent::ReceiveRequest,
            MessageBody::IssueCredential { .. } => IssuanceEvent::ReceiveCredential,
            MessageBody::CredentialAck => IssuanceEvent::ReceiveAck,
            MessageBody::ProblemReport { .. } => IssuanceEvent::ReceiveProblemReport,
            other => {
                return Err(ExchangeError::UnexpectedMessage {
                    message: other.kind().to_string(),
                    protocol: Protocol::IssueCredential.name(),
                })
            }
        };

        let (handle, created) = self.records.get_or_create(&message.thread_id, || {
            if event != IssuanceEvent::ReceiveOffer {
                return Err(ExchangeError::RecordNotFound(message.thread_id.clone()));
            }
            let transition = IssuanceStateMachine::transition(None, event)?;
            let mut record = CredentialExchangeRecord::new(
                Some(&message.thread_id),
                &message.connection_id,
                Role::Holder,
                transition.to,
            );
            attach(&mut record, &message.body);
            record.processed_messages.insert(message.id.clone());
            Ok((record.id.clone(), record))
        })?;

        let mut record = handle.lock().await;
        if created {
            tracing::info!(exchange_id = %record.id, thread_id = %record.thread_id, "credential offer received");
            return Ok(ExchangeOutcome::new(record.clone(), Vec::new()));
        }
        if record.connection_id != message.connection_id {
            tracing::warn!(
                exchange_id = %record.id,
                expected = %record.connection_id,
                received = %message.connection_id,
                "message from another connection"
            );
            return Err(ExchangeError::UnexpectedMessage {
                message: format!("{} on connection {}", message.body.kind(), message.connection_id),
                protocol: Protocol::IssueCredential.name(),
            });
        }
        if record.processed_messages.contains(&message.id) {
            tracing::debug!(exchange_id = %record.id, message_id = %message.id, "duplicate message ignored");
            return Ok(ExchangeOutcome::replayed(record.clone()));
        }

        let transition = IssuanceStateMachine::transition(Some(record.state), event)?;
        record.processed_messages.insert(message.id.clone());
        if transition.replayed {
            return Ok(ExchangeOutcome::replayed(record.clone()));
        }
        attach(&mut record, &message.body);
        record.commit(&transition);

        if event == IssuanceEvent::ReceiveCredential {
            return self.verify_received(&mut record).await;
        }
        let outbound = record.messages_for(&transition)?;
        Ok(ExchangeOutcome::new(record.clone(), outbound))
    }

    /// Holder: the credential must verify against the issuer's ledger key
    /// and carry what was offered.
    async fn verify_received(
        &self,
        record: &mut CredentialExchangeRecord,
    ) -> Result<IssuanceOutcome, ExchangeError> {
        let offer = record.offer.clone().ok_or_else(|| record.missing("offer"))?;
        let credential = record
            .credential
            .clone()
            .ok_or_else(|| record.missing("credential"))?;

        let checked = if credential.issuer != offer.issuer {
            Err(CredentialError::InvalidCredential(format!(
                "issued by {} but offered by {}",
                credential.issuer, offer.issuer
            )))
        } else if credential.credential_subject != offer.credential_subject {
            Err(CredentialError::InvalidCredential(
                "credential subject differs from the offer".into(),
            ))
        } else {
            self.credentials.verify(&credential).await
        };

        match checked {
            Ok(()) => {
                record.is_verified = Some(true);
                tracing::info!(exchange_id = %record.id, issuer = %credential.issuer, "issued credential verified");
                Ok(ExchangeOutcome::new(record.clone(), Vec::new()))
            }
            Err(error) => {
                tracing::warn!(exchange_id = %record.id, error = %error, "issued credential rejected");
                record.is_verified = Some(false);
                record.error_message = Some(error.to_string());
                let transition =
                    IssuanceStateMachine::transition(Some(record.state), IssuanceEvent::Abandon)?;
                record.commit(&transition);
                let mut outcome =
                    ExchangeOutcome::new(record.clone(), record.messages_for(&transition)?);
                outcome.failure = Some(error);
                Ok(outcome)
            }
        }
    }
}

fn attach(record: &mut CredentialExchangeRecord, body: &MessageBody) {
    match body {
        MessageBody::OfferCredential { credential } => record.offer = Some(credential.clone()),
        MessageBody::IssueCredential { credential } => record.credential = Some(credential.clone()),
        MessageBody::ProblemReport { description } => {
            record.error_message = Some(description.clone())
        }
        _ => {}
    }
}
