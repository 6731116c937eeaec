//! Duplicate delivery and concurrent exchanges.

use std::sync::Arc;

use orcl_core::{AgentConfig, CredentialConfig, ExpiryPolicy, ProofExchangeState};
use orcl_credentials::CredentialError;
use orcl_identity::ProofPurpose;
use orcl_integration_tests::{deliver, issue_loyalty, parties, parties_with, proof_request};

#[tokio::test]
async fn test_redelivered_messages_are_noops() {
    let p = parties().await;
    issue_loyalty(&p, "3000").await;

    let started = p
        .verifier
        .proofs()
        .request_presentation("verifier-holder", proof_request(&p.holder_did, vec![]))
        .unwrap();
    let request = started.outbound[0].clone();
    deliver(&p.holder, vec![request.clone()]).await;
    deliver(&p.holder, vec![request.clone()]).await;
    assert_eq!(p.holder.proofs().len(), 1);

    let holder_record = p
        .holder
        .proofs()
        .record_by_thread(&started.record.thread_id)
        .await
        .unwrap();
    let sent = p
        .holder
        .proofs()
        .accept_request(&holder_record.id, None)
        .await
        .unwrap();
    let presentation = sent.outbound[0].clone();

    // late copy of the request after the holder moved on
    let late = p.holder.proofs().receive(request).await.unwrap();
    assert!(late.replayed);
    assert_eq!(late.record.state, ProofExchangeState::PresentationSent);

    let first = p.verifier.proofs().receive(presentation.clone()).await.unwrap();
    assert_eq!(first.record.is_verified, Some(true));
    let second = p.verifier.proofs().receive(presentation).await.unwrap();
    assert!(second.replayed);
    assert!(second.outbound.is_empty());
    assert_eq!(second.record.state, ProofExchangeState::PresentationReceived);
}

#[tokio::test]
async fn test_concurrent_exchanges_with_one_holder() {
    let p = Arc::new(parties().await);
    issue_loyalty(&p, "3000").await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let p = p.clone();
        tasks.push(tokio::spawn(async move {
            let connection = format!("verifier-holder-{}", i);
            let started = p
                .verifier
                .proofs()
                .request_presentation(&connection, proof_request(&p.holder_did, vec![]))
                .unwrap();
            deliver(&p.holder, started.outbound).await;
            let record = p
                .holder
                .proofs()
                .record_by_thread(&started.record.thread_id)
                .await
                .unwrap();
            let sent = p
                .holder
                .proofs()
                .accept_request(&record.id, None)
                .await
                .unwrap();
            deliver(&p.verifier, sent.outbound).await;
            p.verifier
                .proofs()
                .record(&started.record.id)
                .await
                .unwrap()
        }));
    }

    for task in tasks {
        let record = task.await.unwrap();
        assert_eq!(record.state, ProofExchangeState::PresentationReceived);
        assert_eq!(record.is_verified, Some(true), "{:?}", record.error_message);
    }
    assert_eq!(p.holder.proofs().len(), 8);
}

#[tokio::test]
async fn test_expiry_policy() {
    for (policy, accepted) in [(ExpiryPolicy::Reject, false), (ExpiryPolicy::Ignore, true)] {
        let p = parties_with(AgentConfig {
            credentials: CredentialConfig {
                expiry_policy: policy,
                ..CredentialConfig::default()
            },
            ..AgentConfig::default()
        })
        .await;
        let mut credential = issue_loyalty(&p, "3000").await;
        p.verifier.credentials().verify(&credential).await.unwrap();

        credential.expiration_date = Some("2001-01-01T00:00:00Z".into());
        let key = p.issuer.wallet().key_for_did(&p.issuer_did).unwrap();
        let expired = p
            .issuer
            .credentials()
            .sign_credential(credential, &key, ProofPurpose::AssertionMethod)
            .await
            .unwrap();
        let result = p.verifier.credentials().verify(&expired).await;
        if accepted {
            result.unwrap();
        } else {
            assert!(matches!(result, Err(CredentialError::ExpiredCredential { .. })));
        }
    }
}
