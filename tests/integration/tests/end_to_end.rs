//! Issuer → holder → verifier over one `did:orcl` ledger.

use orcl_core::{parse_orcl_did, IssuanceState, ProofExchangeState, Role};
use orcl_credentials::{CredentialRepository, MessageBody};
use orcl_integration_tests::{deliver, issue_loyalty, parties, proof_request};

#[tokio::test]
async fn test_loyalty_credential_issue_present_verify() {
    let p = parties().await;
    for did in [&p.issuer_did, &p.holder_did, &p.verifier_did] {
        assert!(parse_orcl_did(did).is_some(), "{} is not a did:orcl DID", did);
    }

    let credential = issue_loyalty(&p, "3000").await;
    assert_eq!(credential.issuer, p.issuer_did);
    assert_eq!(credential.subject_did(), Some(p.holder_did.as_str()));
    assert_eq!(
        credential.credential_subject.claims["loyaltyProgram"][0]["lpPoints"],
        "3000"
    );
    // issued through the exchange, the credential still carries the
    // configured validity window
    let issued = chrono::DateTime::parse_from_rfc3339(&credential.issuance_date)
        .unwrap()
        .with_timezone(&chrono::Utc);
    let expires = credential.expires_at().unwrap().expect("expiration date");
    assert_eq!(expires, issued + chrono::Duration::days(365));
    let issuer_records = p.issuer.issuance().records().await;
    assert_eq!(issuer_records[0].state, IssuanceState::Done);
    assert_eq!(
        p.holder
            .repository()
            .find_by_holder(&p.holder_did)
            .await
            .unwrap()
            .len(),
        1
    );

    // verifier asks, holder picks its credentials and signs
    let started = p
        .verifier
        .proofs()
        .request_presentation("verifier-holder", proof_request(&p.holder_did, vec![]))
        .unwrap();
    let challenge = started.record.request.as_ref().unwrap().options.challenge.clone();
    assert!(challenge.is_some());
    assert!(deliver(&p.holder, started.outbound).await.is_empty());

    let holder_record = p
        .holder
        .proofs()
        .record_by_thread(&started.record.thread_id)
        .await
        .unwrap();
    assert_eq!(holder_record.role, Role::Holder);
    assert_eq!(holder_record.state, ProofExchangeState::RequestReceived);

    let sent = p
        .holder
        .proofs()
        .accept_request(&holder_record.id, None)
        .await
        .unwrap();
    let presentation = sent.record.presentation.clone().unwrap();
    assert_eq!(presentation.verifiable_credential, vec![credential]);
    assert_eq!(presentation.proof.as_ref().unwrap().challenge, challenge);

    assert!(deliver(&p.verifier, sent.outbound).await.is_empty());
    let checked = p.verifier.proofs().record(&started.record.id).await.unwrap();
    assert_eq!(checked.state, ProofExchangeState::PresentationReceived);
    assert_eq!(checked.is_verified, Some(true));

    let done = p
        .verifier
        .proofs()
        .accept_presentation(&started.record.id)
        .await
        .unwrap();
    assert!(matches!(done.outbound[0].body, MessageBody::PresentationAck));
    deliver(&p.holder, done.outbound).await;

    assert_eq!(
        p.verifier.proofs().record(&started.record.id).await.unwrap().state,
        ProofExchangeState::Done
    );
    assert_eq!(
        p.holder.proofs().record(&holder_record.id).await.unwrap().state,
        ProofExchangeState::Done
    );
}

#[tokio::test]
async fn test_proposal_then_request() {
    let p = parties().await;
    let credential = issue_loyalty(&p, "1200").await;

    let proposed = p
        .holder
        .proofs()
        .propose_presentation("holder-verifier", proof_request(&p.holder_did, vec![credential]))
        .unwrap();
    assert_eq!(proposed.record.state, ProofExchangeState::ProposalSent);

    let request = deliver(&p.verifier, proposed.outbound).await;
    assert!(request.is_empty());
    let verifier_record = p
        .verifier
        .proofs()
        .record_by_thread(&proposed.record.thread_id)
        .await
        .unwrap();
    assert_eq!(verifier_record.state, ProofExchangeState::ProposalReceived);

    let requested = p
        .verifier
        .proofs()
        .accept_proposal(&verifier_record.id)
        .await
        .unwrap();
    deliver(&p.holder, requested.outbound).await;

    let sent = p
        .holder
        .proofs()
        .accept_request(&proposed.record.id, None)
        .await
        .unwrap();
    deliver(&p.verifier, sent.outbound).await;

    let done = p
        .verifier
        .proofs()
        .accept_presentation(&verifier_record.id)
        .await
        .unwrap();
    deliver(&p.holder, done.outbound).await;
    assert_eq!(
        p.holder.proofs().record(&proposed.record.id).await.unwrap().state,
        ProofExchangeState::Done
    );
}
