use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orcl_core::{ProofEffect, ProofEvent, ProofExchangeState, ProofStateMachine, ProofTransition, Role};
use orcl_crypto::generate_nonce;
use orcl_identity::{IdentityError, TrustStore};

use crate::error::{CredentialError, ExchangeError};
use crate::exchange::message::{AgentMessage, MessageBody, Protocol};
use crate::exchange::{ExchangeOutcome, RecordStore};
use crate::model::{VerifiableCredential, VerifiablePresentation};
use crate::presentation::{PresentationProofOptions, PresentationService, ProofDetail};
use crate::repository::CredentialRepository;
use crate::wallet::Wallet;

/// State of one presentation exchange, as seen by one party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofExchangeRecord {
    pub id: String,
    pub thread_id: String,
    pub connection_id: String,
    pub role: Role,
    pub state: ProofExchangeState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal: Option<ProofDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ProofDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<VerifiablePresentation>,
    /// Verifier side: outcome of checking the received presentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    processed_messages: HashSet<String>,
}

impl ProofExchangeRecord {
    fn new(thread_id: Option<&str>, connection_id: &str, role: Role, state: ProofExchangeState) -> Self {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        Self {
            thread_id: thread_id.map_or_else(|| id.clone(), str::to_string),
            id,
            connection_id: connection_id.to_string(),
            role,
            state,
            proposal: None,
            request: None,
            presentation: None,
            is_verified: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            processed_messages: HashSet::new(),
        }
    }

    fn commit(&mut self, transition: &ProofTransition) {
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

    /// The message that carries out `effect`.
    fn message_for(&self, effect: ProofEffect) -> Result<AgentMessage, ExchangeError> {
        let body = match effect {
            ProofEffect::SendProposal => MessageBody::ProposePresentation {
                proposal: self.proposal.clone().ok_or_else(|| self.missing("proposal"))?,
            },
            ProofEffect::SendRequest => MessageBody::RequestPresentation {
                request: self.request.clone().ok_or_else(|| self.missing("request"))?,
            },
            ProofEffect::SendPresentation => MessageBody::Presentation {
                presentation: self
                    .presentation
                    .clone()
                    .ok_or_else(|| self.missing("presentation"))?,
            },
            ProofEffect::SendAck => MessageBody::PresentationAck,
            ProofEffect::SendProblemReport => MessageBody::ProblemReport {
                description: self
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "exchange abandoned".into()),
            },
        };
        Ok(AgentMessage::new(&self.thread_id, &self.connection_id, body))
    }

    fn messages_for(&self, transition: &ProofTransition) -> Result<Vec<AgentMessage>, ExchangeError> {
        transition
            .effects
            .iter()
            .map(|effect| self.message_for(*effect))
            .collect()
    }
}

type ProofOutcome = ExchangeOutcome<ProofExchangeRecord>;

/// Runs present-proof exchanges for one agent, as holder or verifier.
pub struct ProofExchangeService {
    presentations: PresentationService,
    trust: TrustStore,
    wallet: Arc<Wallet>,
    repository: Arc<dyn CredentialRepository>,
    records: RecordStore<ProofExchangeRecord>,
}

impl ProofExchangeService {
    pub fn new(
        presentations: PresentationService,
        trust: TrustStore,
        wallet: Arc<Wallet>,
        repository: Arc<dyn CredentialRepository>,
    ) -> Self {
        Self {
            presentations,
            trust,
            wallet,
            repository,
            records: RecordStore::new(),
        }
    }

    pub async fn record(&self, id: &str) -> Result<ProofExchangeRecord, ExchangeError> {
        Ok(self.records.get(id)?.lock().await.clone())
    }

    pub async fn record_by_thread(&self, thread_id: &str) -> Result<ProofExchangeRecord, ExchangeError> {
        Ok(self.records.by_thread(thread_id)?.lock().await.clone())
    }

    pub fn has_thread(&self, thread_id: &str) -> bool {
        self.records.by_thread(thread_id).is_ok()
    }

    pub async fn records(&self) -> Vec<ProofExchangeRecord> {
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

    fn start(
        &self,
        connection_id: &str,
        role: Role,
        event: ProofEvent,
        attach: impl FnOnce(&mut ProofExchangeRecord),
    ) -> Result<ProofOutcome, ExchangeError> {
        let transition = ProofStateMachine::transition(None, event)?;
        let mut record = ProofExchangeRecord::new(None, connection_id, role, transition.to);
        attach(&mut record);
        let outbound = record.messages_for(&transition)?;
        self.records.insert(&record.id, &record.thread_id, record.clone());
        tracing::info!(
            exchange_id = %record.id,
            role = %role,
            state = %record.state,
            "proof exchange started"
        );
        Ok(ExchangeOutcome::new(record, outbound))
    }

    /// Holder: propose a presentation to a verifier.
    pub fn propose_presentation(
        &self,
        connection_id: &str,
        proposal: ProofDetail,
    ) -> Result<ProofOutcome, ExchangeError> {
        self.start(connection_id, Role::Holder, ProofEvent::ProposePresentation, |record| {
            record.proposal = Some(proposal);
        })
    }

    /// Verifier: request a presentation without a prior proposal. A fresh
    /// challenge is generated when the request carries none.
    pub fn request_presentation(
        &self,
        connection_id: &str,
        mut request: ProofDetail,
    ) -> Result<ProofOutcome, ExchangeError> {
        if request.options.challenge.is_none() {
            request.options.challenge = Some(generate_nonce());
        }
        self.start(connection_id, Role::Verifier, ProofEvent::RequestPresentation, |record| {
            record.request = Some(request);
        })
    }

    /// Verifier: answer a received proposal with a request for it. The
    /// request always carries a newly generated challenge.
    pub async fn accept_proposal(&self, record_id: &str) -> Result<ProofOutcome, ExchangeError> {
        let handle = self.records.get(record_id)?;
        let mut record = handle.lock().await;
        let transition =
            ProofStateMachine::transition(Some(record.state), ProofEvent::RequestPresentation)?;

        let mut request = record.proposal.clone().ok_or_else(|| record.missing("proposal"))?;
        request.options.challenge = Some(generate_nonce());
        record.request = Some(request);
        record.commit(&transition);

        let outbound = record.messages_for(&transition)?;
        tracing::info!(exchange_id = %record.id, "proposal accepted");
        Ok(ExchangeOutcome::new(record.clone(), outbound))
    }

    /// Holder: sign the requested presentation and send it.
    ///
    /// Without an explicit `verification_method` the holder's DID is
    /// resolved and its first method matching the requested proof type is
    /// used. A request whose presentation lists no credentials is filled
    /// with every stored credential about the holder.
    pub async fn accept_request(
        &self,
        record_id: &str,
        verification_method: Option<String>,
    ) -> Result<ProofOutcome, ExchangeError> {
        let handle = self.records.get(record_id)?;
        let mut record = handle.lock().await;
        let transition =
            ProofStateMachine::transition(Some(record.state), ProofEvent::SendPresentation)?;
        let request = record.request.clone().ok_or_else(|| record.missing("request"))?;
        let holder = request.presentation.holder.clone();

        let method = match verification_method {
            Some(method) => method,
            None => {
                self.derive_verification_method(&holder, &request.options.proof_type)
                    .await?
            }
        };
        let key = self.wallet.key(&method)?;

        let mut presentation = request.presentation.clone();
        if presentation.verifiable_credential.is_empty() {
            presentation.verifiable_credential = self.select_credentials(&holder, None).await?;
        }
        let signed = self
            .presentations
            .sign_presentation(
                presentation,
                &key,
                PresentationProofOptions::from_request(&request.options),
            )
            .await?;

        record.presentation = Some(signed);
        record.commit(&transition);
        let outbound = record.messages_for(&transition)?;
        tracing::info!(exchange_id = %record.id, method = %method, "presentation sent");
        Ok(ExchangeOutcome::new(record.clone(), outbound))
    }

    /// Verifier: accept a verified presentation and acknowledge it.
    pub async fn accept_presentation(&self, record_id: &str) -> Result<ProofOutcome, ExchangeError> {
        let handle = self.records.get(record_id)?;
        let mut record = handle.lock().await;
        let transition =
            ProofStateMachine::transition(Some(record.state), ProofEvent::AcceptPresentation)?;
        if record.is_verified != Some(true) {
            return Err(ExchangeError::NotVerified(record.id.clone()));
        }
        record.commit(&transition);
        let outbound = record.messages_for(&transition)?;
        tracing::info!(exchange_id = %record.id, "presentation accepted");
        Ok(ExchangeOutcome::new(record.clone(), outbound))
    }

    /// Either party: give up on the exchange. The problem report is
    /// advisory; nothing waits for the peer.
    pub async fn abandon(&self, record_id: &str, reason: &str) -> Result<ProofOutcome, ExchangeError> {
        let handle = self.records.get(record_id)?;
        let mut record = handle.lock().await;
        let transition = ProofStateMachine::transition(Some(record.state), ProofEvent::Abandon)?;
        record.error_message = Some(reason.to_string());
        record.commit(&transition);
        let outbound = record.messages_for(&transition)?;
        tracing::info!(exchange_id = %record.id, reason = %reason, "proof exchange abandoned");
        Ok(ExchangeOutcome::new(record.clone(), outbound))
    }

    /// Process one inbound message.
    ///
    /// A message id seen before is a no-op, as is a message the exchange has
    /// already moved past. A known thread only accepts messages from the
    /// connection it started on.
    pub async fn receive(&self, message: AgentMessage) -> Result<ProofOutcome, ExchangeError> {
        let event = match &message.body {
            MessageBody::ProposePresentation { .. } => ProofEvent::ReceiveProposal,
            MessageBody::RequestPresentation { .. } => ProofEvent::ReceiveRequest,
            MessageBody::Presentation { .. } => ProofEvent::ReceivePresentation,
            MessageBody::PresentationAck => ProofEvent::ReceiveAck,
            MessageBody::ProblemReport { .. } => ProofEvent::ReceiveProblemReport,
            other => {
                return Err(ExchangeError::UnexpectedMessage {
                    message: other.kind().to_string(),
                    protocol: Protocol::PresentProof.name(),
                })
            }
        };

        let (handle, created) = self.records.get_or_create(&message.thread_id, || {
            let role = match event {
                ProofEvent::ReceiveProposal => Role::Verifier,
                ProofEvent::ReceiveRequest => Role::Holder,
                _ => return Err(ExchangeError::RecordNotFound(message.thread_id.clone())),
            };
            let transition = ProofStateMachine::transition(None, event)?;
            let mut record = ProofExchangeRecord::new(
                Some(&message.thread_id),
                &message.connection_id,
                role,
                transition.to,
            );
            attach(&mut record, &message.body);
            record.processed_messages.insert(message.id.clone());
            Ok((record.id.clone(), record))
        })?;

        let mut record = handle.lock().await;
        if created {
            tracing::info!(
                exchange_id = %record.id,
                thread_id = %record.thread_id,
                state = %record.state,
                "proof exchange received"
            );
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
                protocol: Protocol::PresentProof.name(),
            });
        }
        if record.processed_messages.contains(&message.id) {
            tracing::debug!(exchange_id = %record.id, message_id = %message.id, "duplicate message ignored");
            return Ok(ExchangeOutcome::replayed(record.clone()));
        }

        let transition = ProofStateMachine::transition(Some(record.state), event)?;
        record.processed_messages.insert(message.id.clone());
        if transition.replayed {
            return Ok(ExchangeOutcome::replayed(record.clone()));
        }
        attach(&mut record, &message.body);
        record.commit(&transition);
        let mut outcome = ExchangeOutcome::new(record.clone(), record.messages_for(&transition)?);

        if event == ProofEvent::ReceivePresentation {
            outcome = self.verify_received(&mut record).await?;
        }
        Ok(outcome)
    }

    /// Verifier: check a received presentation against the request and the
    /// ledger. Any failure abandons the exchange.
    async fn verify_received(&self, record: &mut ProofExchangeRecord) -> Result<ProofOutcome, ExchangeError> {
        let request = record.request.clone().ok_or_else(|| record.missing("request"))?;
        let presentation = record
            .presentation
            .clone()
            .ok_or_else(|| record.missing("presentation"))?;

        let checked = match self
            .presentations
            .verify_received_presentation_matches_request(&presentation, &request)
        {
            Err(e) => Err(e),
            Ok(()) => {
                let result = self
                    .presentations
                    .verify_presentation(&presentation, request.options.challenge.as_deref())
                    .await;
                match result.error {
                    Some(failure) => Err(failure.error),
                    None => Ok(()),
                }
            }
        };

        match checked {
            Ok(()) => {
                record.is_verified = Some(true);
                tracing::info!(exchange_id = %record.id, holder = %presentation.holder, "presentation verified");
                Ok(ExchangeOutcome::new(record.clone(), Vec::new()))
            }
            Err(error) => {
                tracing::warn!(exchange_id = %record.id, error = %error, "presentation rejected");
                record.is_verified = Some(false);
                record.error_message = Some(error.to_string());
                let transition =
                    ProofStateMachine::transition(Some(record.state), ProofEvent::Abandon)?;
                record.commit(&transition);
                let mut outcome =
                    ExchangeOutcome::new(record.clone(), record.messages_for(&transition)?);
                outcome.failure = Some(error);
                Ok(outcome)
            }
        }
    }

    /// Stored credentials about `holder`, optionally of one type.
    pub async fn select_credentials(
        &self,
        holder: &str,
        credential_type: Option<&str>,
    ) -> Result<Vec<VerifiableCredential>, CredentialError> {
        let selected: Vec<VerifiableCredential> = self
            .repository
            .find_by_holder(holder)
            .await?
            .into_iter()
            .map(|record| record.credential)
            .filter(|credential| credential_type.map_or(true, |t| credential.has_type(t)))
            .collect();
        if selected.is_empty() {
            return Err(CredentialError::CredentialNotFound(format!(
                "no credential held by {}",
                holder
            )));
        }
        Ok(selected)
    }

    /// The holder's first verification method able to make `proof_type`
    /// proofs.
    async fn derive_verification_method(
        &self,
        holder: &str,
        proof_type: &str,
    ) -> Result<String, CredentialError> {
        let (document, _) = self.trust.document(holder).await?;
        let method = document
            .first_method_for_proof_type(proof_type)
            .ok_or_else(|| IdentityError::KeyNotFound {
                did: holder.to_string(),
                method: format!("any {} method", proof_type),
            })?;
        Ok(document.absolute_id(&method.id))
    }
}

fn attach(record: &mut ProofExchangeRecord, body: &MessageBody) {
    match body {
        MessageBody::ProposePresentation { proposal } => record.proposal = Some(proposal.clone()),
        MessageBody::RequestPresentation { request } => record.request = Some(request.clone()),
        MessageBody::Presentation { presentation } => {
            record.presentation = Some(presentation.clone())
        }
        MessageBody::ProblemReport { description } => {
            record.error_message = Some(description.clone())
        }
        _ => {}
    }
}
