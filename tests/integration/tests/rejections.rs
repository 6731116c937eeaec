//! Scenarios where verification must fail and the exchange must end.

use serde_json::json;

use orcl_core::ProofExchangeState;
use orcl_credentials::{
    CredentialError, MessageBody, PresentationProofOptions, VerificationLayer,
};
use orcl_crypto::KeyPair;
use orcl_integration_tests::{deliver, issue_loyalty, parties, proof_request};

#[tokio::test]
async fn test_challenge_mismatch_abandons_exchange() {
    let p = parties().await;
    let credential = issue_loyalty(&p, "3000").await;

    let started = p
        .verifier
        .proofs()
        .request_presentation("verifier-holder", proof_request(&p.holder_did, vec![]))
        .unwrap();
    deliver(&p.holder, started.outbound).await;

    // the holder answers with a presentation signed for another challenge
    let key = p.holder.wallet().key_for_did(&p.holder_did).unwrap();
    let mut template = started.record.request.clone().unwrap();
    template.presentation.verifiable_credential = vec![credential];
    let mut options = PresentationProofOptions::from_request(&template.options);
    options.challenge = Some("a-stale-challenge".into());
    let forged = p
        .holder
        .presentations()
        .sign_presentation(template.presentation, &key, options)
        .await
        .unwrap();
    let message = orcl_credentials::AgentMessage::new(
        &started.record.thread_id,
        "verifier-holder",
        MessageBody::Presentation {
            presentation: forged,
        },
    );

    let outcome = p.verifier.proofs().receive(message).await.unwrap();
    assert_eq!(
        outcome.failure,
        Some(CredentialError::PresentationMismatch {
            field: "challenge".into()
        })
    );
    assert_eq!(outcome.record.state, ProofExchangeState::Abandoned);
    assert_eq!(outcome.record.is_verified, Some(false));
    assert!(matches!(
        outcome.outbound[0].body,
        MessageBody::ProblemReport { .. }
    ));

    // abandonment is final
    assert!(p
        .verifier
        .proofs()
        .accept_presentation(&started.record.id)
        .await
        .is_err());
    let holder_record = p
        .holder
        .proofs()
        .record_by_thread(&started.record.thread_id)
        .await
        .unwrap();
    deliver(&p.holder, outcome.outbound).await;
    assert_eq!(
        p.holder.proofs().record(&holder_record.id).await.unwrap().state,
        ProofExchangeState::Abandoned
    );
}

#[tokio::test]
async fn test_tampered_credential_in_presentation() {
    let p = parties().await;
    let mut credential = issue_loyalty(&p, "3000").await;
    credential
        .credential_subject
        .claims
        .insert("loyaltyProgram".into(), json!([{"lpId": "LP1", "lpPoints": "90000"}]));

    let started = p
        .verifier
        .proofs()
        .request_presentation(
            "verifier-holder",
            proof_request(&p.holder_did, vec![credential]),
        )
        .unwrap();
    deliver(&p.holder, started.outbound).await;
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

    let outcome = p
        .verifier
        .proofs()
        .receive(sent.outbound[0].clone())
        .await
        .unwrap();
    assert_eq!(outcome.record.state, ProofExchangeState::Abandoned);
    assert!(matches!(
        outcome.failure,
        Some(CredentialError::SignatureVerificationFailed { ref did }) if *did == p.issuer_did
    ));
}

#[tokio::test]
async fn test_holder_key_mismatch_names_presentation_layer() {
    let p = parties().await;
    let credential = issue_loyalty(&p, "3000").await;
    let key = p.holder.wallet().key_for_did(&p.holder_did).unwrap();
    let vp = p
        .holder
        .presentations()
        .create_presentation(vec![credential], &p.holder_did);
    let vp = p
        .holder
        .presentations()
        .sign_presentation(
            vp,
            &key,
            PresentationProofOptions {
                challenge: Some("c1".into()),
                ..PresentationProofOptions::default()
            },
        )
        .await
        .unwrap();

    let good = p.verifier.presentations().verify_presentation(&vp, Some("c1")).await;
    assert!(good.is_valid, "{:?}", good.error);

    let stranger = KeyPair::generate().public_key();
    let result = p
        .verifier
        .presentations()
        .verify_presentation_with_key(&vp, &stranger, Some("c1"))
        .await;
    assert!(!result.is_valid);
    let failure = result.error.unwrap();
    assert_eq!(failure.layer, VerificationLayer::Presentation);
    assert_eq!(failure.did, p.holder_did);
}

#[tokio::test]
async fn test_credential_from_unknown_issuer() {
    let p = parties().await;
    let mut credential = issue_loyalty(&p, "3000").await;
    credential.issuer = "did:orcl:00000000-0000-4000-8000-000000000000".into();
    assert!(matches!(
        p.verifier.credentials().verify(&credential).await,
        Err(CredentialError::MissingIssuerKey { .. })
    ));
}

#[tokio::test]
async fn test_presenting_another_holders_credential_abandons_exchange() {
    let p = parties().await;
    let credential = issue_loyalty(&p, "3000").await;

    // the verifier asks the issuer, who answers with the holder's credential
    let started = p
        .verifier
        .proofs()
        .request_presentation("verifier-issuer", proof_request(&p.issuer_did, vec![]))
        .unwrap();
    let key = p.issuer.wallet().key_for_did(&p.issuer_did).unwrap();
    let mut template = started.record.request.clone().unwrap();
    template.presentation.verifiable_credential = vec![credential];
    let options = PresentationProofOptions::from_request(&template.options);
    let borrowed = p
        .issuer
        .presentations()
        .sign_presentation(template.presentation, &key, options)
        .await
        .unwrap();
    let message = orcl_credentials::AgentMessage::new(
        &started.record.thread_id,
        "verifier-issuer",
        MessageBody::Presentation {
            presentation: borrowed,
        },
    );

    let outcome = p.verifier.proofs().receive(message).await.unwrap();
    assert_eq!(
        outcome.failure,
        Some(CredentialError::HolderMismatch {
            holder: p.issuer_did.clone(),
            subject: p.holder_did.clone(),
        })
    );
    assert_eq!(outcome.record.state, ProofExchangeState::Abandoned);
    assert_eq!(outcome.record.is_verified, Some(false));
    assert!(matches!(
        outcome.outbound[0].body,
        MessageBody::ProblemReport { .. }
    ));
}
