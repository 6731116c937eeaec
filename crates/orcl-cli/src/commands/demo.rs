//! `orcl demo`: issuer, holder and verifier agents sharing an in-memory
//! ledger run one issuance and one proof exchange end to end.

use clap::Args;
use serde_json::json;
use std::sync::Arc;

use orcl_core::AgentConfig;
use orcl_credentials::{
    Agent, AgentMessage, CredentialSubject, ProofDetail, ProofDetailOptions, VerifiableCredential,
    ED25519_SIGNATURE_2018,
};
use orcl_identity::{ProofPurpose, VerificationMethodType};
use orcl_ledger::InMemoryLedger;

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Loyalty points stamped into the demo credential.
    #[arg(long, default_value = "3000")]
    pub points: String,
}

fn agent(label: &str, config: &AgentConfig, ledger: &Arc<InMemoryLedger>) -> Agent {
    let mut config = config.clone();
    config.label = label.to_string();
    Agent::new(config, ledger.clone())
}

/// Deliver `messages` to `to`, returning its replies.
async fn deliver(to: &Agent, messages: Vec<AgentMessage>) -> Vec<AgentMessage> {
    let mut replies = Vec::new();
    for message in messages {
        println!("  {:>8} <- {}", to.label(), message.body.kind());
        replies.extend(to.receive(message).await);
    }
    replies
}

pub async fn run(args: &DemoArgs, config: &AgentConfig) -> anyhow::Result<()> {
    let ledger = Arc::new(InMemoryLedger::new());
    let issuer = agent("issuer", config, &ledger);
    let holder = agent("holder", config, &ledger);
    let verifier = agent("verifier", config, &ledger);

    let method = VerificationMethodType::Ed25519VerificationKey2018;
    let issuer_did = issuer.create_did(method.clone()).await?;
    let holder_did = holder.create_did(method.clone()).await?;
    let verifier_did = verifier.create_did(method).await?;
    println!("Issuer:   {}", issuer_did);
    println!("Holder:   {}", holder_did);
    println!("Verifier: {}", verifier_did);

    println!();
    println!("Issue credential");
    let subject = CredentialSubject::from_value(json!({
        "holderId": holder_did,
        "loyaltyProgram": [{"lpId": "LP1", "lpPoints": args.points}],
    }))?;
    let preview = VerifiableCredential::new(&issuer_did, vec!["LoyaltyCredential".into()], subject);
    let offered = issuer.issuance().offer_credential("issuer-holder", preview)?;
    deliver(&holder, offered.outbound).await;

    let offer_record = holder.issuance().records().await;
    let offer_id = offer_record
        .first()
        .map(|record| record.id.clone())
        .ok_or_else(|| anyhow::anyhow!("holder did not record the offer"))?;
    let requested = holder.issuance().accept_offer(&offer_id).await?;
    deliver(&issuer, requested.outbound).await;

    let issued = issuer.issuance().issue_credential(&offered.record.id).await?;
    deliver(&holder, issued.outbound).await;
    let accepted = holder.issuance().accept_credential(&offer_id).await?;
    deliver(&issuer, accepted.outbound).await;
    println!(
        "  issuer: {}, holder: {}",
        issuer.issuance().record(&offered.record.id).await?.state,
        holder.issuance().record(&offer_id).await?.state
    );

    println!();
    println!("Present proof");
    let request = ProofDetail {
        presentation: verifier.presentations().create_presentation(Vec::new(), &holder_did),
        options: ProofDetailOptions {
            proof_type: ED25519_SIGNATURE_2018.into(),
            proof_purpose: ProofPurpose::Authentication,
            created: None,
            domain: None,
            challenge: None,
        },
    };
    let started = verifier
        .proofs()
        .request_presentation("verifier-holder", request)?;
    deliver(&holder, started.outbound).await;

    let holder_record = holder.proofs().record_by_thread(&started.record.thread_id).await?;
    let sent = holder.proofs().accept_request(&holder_record.id, None).await?;
    deliver(&verifier, sent.outbound).await;

    let received = verifier.proofs().record(&started.record.id).await?;
    if received.is_verified != Some(true) {
        anyhow::bail!(
            "presentation rejected: {}",
            received.error_message.unwrap_or_default()
        );
    }
    let done = verifier.proofs().accept_presentation(&started.record.id).await?;
    deliver(&holder, done.outbound).await;
    println!(
        "  verifier: {}, holder: {}",
        verifier.proofs().record(&started.record.id).await?.state,
        holder.proofs().record(&holder_record.id).await?.state
    );
    Ok(())
}
