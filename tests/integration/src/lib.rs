//! Shared fixtures for the cross-crate scenarios in `tests/`.

use std::sync::Arc;

use serde_json::json;

use orcl_core::AgentConfig;
use orcl_credentials::{
    Agent, AgentMessage, CredentialSubject, ProofDetail, ProofDetailOptions, VerifiableCredential,
    ED25519_SIGNATURE_2018,
};
use orcl_identity::{ProofPurpose, VerificationMethodType};
use orcl_ledger::InMemoryLedger;

/// Route test logs through the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Issuer, holder and verifier agents with a DID each on one ledger.
pub struct Parties {
    pub ledger: Arc<InMemoryLedger>,
    pub issuer: Agent,
    pub holder: Agent,
    pub verifier: Agent,
    pub issuer_did: String,
    pub holder_did: String,
    pub verifier_did: String,
}

pub async fn parties() -> Parties {
    parties_with(AgentConfig::default()).await
}

pub async fn parties_with(config: AgentConfig) -> Parties {
    init_tracing();
    let ledger = Arc::new(InMemoryLedger::new());
    let agent = |label: &str| {
        let mut config = config.clone();
        config.label = label.to_string();
        Agent::new(config, ledger.clone())
    };
    let (issuer, holder, verifier) = (agent("issuer"), agent("holder"), agent("verifier"));

    let method = VerificationMethodType::Ed25519VerificationKey2018;
    let issuer_did = issuer.create_did(method.clone()).await.expect("issuer DID");
    let holder_did = holder.create_did(method.clone()).await.expect("holder DID");
    let verifier_did = verifier.create_did(method).await.expect("verifier DID");

    Parties {
        ledger,
        issuer,
        holder,
        verifier,
        issuer_did,
        holder_did,
        verifier_did,
    }
}

pub fn loyalty_subject(holder_did: &str, points: &str) -> CredentialSubject {
    CredentialSubject::from_value(json!({
        "holderId": holder_did,
        "loyaltyProgram": [{"lpId": "LP1", "lpPoints": points}],
    }))
    .expect("subject")
}

/// Deliver every message to `to` and collect its replies.
pub async fn deliver(to: &Agent, messages: Vec<AgentMessage>) -> Vec<AgentMessage> {
    let mut replies = Vec::new();
    for message in messages {
        replies.extend(to.receive(message).await);
    }
    replies
}

/// Run a full issue-credential exchange from the issuer to the holder and
/// return the credential the holder stored.
pub async fn issue_loyalty(p: &Parties, points: &str) -> VerifiableCredential {
    let preview = VerifiableCredential::new(
        &p.issuer_did,
        vec!["LoyaltyCredential".into()],
        loyalty_subject(&p.holder_did, points),
    );
    let offered = p
        .issuer
        .issuance()
        .offer_credential("issuer-holder", preview)
        .expect("offer");
    assert!(deliver(&p.holder, offered.outbound).await.is_empty());

    let holder_record = p
        .holder
        .issuance()
        .records()
        .await
        .into_iter()
        .find(|record| record.thread_id == offered.record.thread_id)
        .expect("holder record");
    let requested = p
        .holder
        .issuance()
        .accept_offer(&holder_record.id)
        .await
        .expect("request");
    deliver(&p.issuer, requested.outbound).await;

    let issued = p
        .issuer
        .issuance()
        .issue_credential(&offered.record.id)
        .await
        .expect("issue");
    deliver(&p.holder, issued.outbound).await;

    let accepted = p
        .holder
        .issuance()
        .accept_credential(&holder_record.id)
        .await
        .expect("accept");
    deliver(&p.issuer, accepted.outbound).await;

    accepted.record.credential.expect("credential")
}

/// A request for a presentation by `holder_did`. An empty credential list
/// lets the holder choose.
pub fn proof_request(holder_did: &str, credentials: Vec<VerifiableCredential>) -> ProofDetail {
    ProofDetail {
        presentation: orcl_credentials::VerifiablePresentation::new(holder_did, credentials),
        options: ProofDetailOptions {
            proof_type: ED25519_SIGNATURE_2018.into(),
            proof_purpose: ProofPurpose::Authentication,
            created: None,
            domain: None,
            challenge: None,
        },
    }
}
