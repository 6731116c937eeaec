//! DID syntax, registration, update and deactivation against the ledger.

use orcl_core::parse_did;
use orcl_credentials::CredentialError;
use orcl_identity::{
    DidDeactivateOptions, DidResolver, DidUpdateOptions, ProofPurpose, ERROR_NOT_FOUND,
};
use orcl_integration_tests::{issue_loyalty, parties};
use orcl_ledger::Modification;

#[test]
fn test_did_parse_properties() {
    for bad in ["", "not-a-did", "did:wrong:!!"] {
        assert!(parse_did(bad).is_none(), "{:?} parsed", bad);
    }
    let parsed = parse_did("did:orcl:3f9a2c1e-7b4d-4e8a-9c10-5d2f6a8b1e3c#keys-1").unwrap();
    assert_eq!(parsed.method, "orcl");
    assert_eq!(parsed.fragment.as_deref(), Some("keys-1"));
    // parsing what was parsed gives the same DID
    let again = parse_did(&parsed.did).unwrap();
    assert_eq!(again.did, parsed.did);
    assert_eq!(again.id, parsed.id);
}

#[tokio::test]
async fn test_deactivated_issuer_is_final() {
    let p = parties().await;
    let credential = issue_loyalty(&p, "3000").await;
    p.verifier.credentials().verify(&credential).await.unwrap();

    let result = p
        .issuer
        .registrar()
        .deactivate(DidDeactivateOptions {
            did: p.issuer_did.clone(),
        })
        .await;
    assert!(result.is_finished(), "{:?}", result.reason());

    let resolved = p.issuer.resolver().resolve(&p.issuer_did).await;
    assert!(resolved.is_deactivated());

    // the issuer's own agent no longer trusts the key
    assert!(matches!(
        p.issuer.credentials().verify(&credential).await,
        Err(CredentialError::MissingIssuerKey { .. })
    ));

    // a second deactivation, or an update, finds nothing to change
    let again = p
        .issuer
        .registrar()
        .deactivate(DidDeactivateOptions {
            did: p.issuer_did.clone(),
        })
        .await;
    assert_eq!(again.reason(), Some("Did not found"));
    let update = p
        .issuer
        .registrar()
        .update(DidUpdateOptions {
            did: p.issuer_did.clone(),
            modification: Modification::AddMethod {
                relationship: "assertionMethod".into(),
                method_id: "#keys-1".into(),
            },
        })
        .await;
    assert!(!update.is_finished());
}

#[tokio::test]
async fn test_only_the_creator_may_deactivate() {
    let p = parties().await;
    let result = p
        .verifier
        .registrar()
        .deactivate(DidDeactivateOptions {
            did: p.holder_did.clone(),
        })
        .await;
    assert_eq!(result.reason(), Some("Did not found"));
    assert!(!p.verifier.resolver().resolve(&p.holder_did).await.is_deactivated());
}

#[tokio::test]
async fn test_resolution_of_unknown_did() {
    let p = parties().await;
    let result = p
        .verifier
        .resolver()
        .resolve("did:orcl:00000000-0000-4000-8000-000000000000")
        .await;
    assert!(!result.is_found());
    assert_eq!(
        result.did_resolution_metadata.error.as_deref(),
        Some(ERROR_NOT_FOUND)
    );
}

#[tokio::test]
async fn test_created_document_authorizes_both_purposes() {
    let p = parties().await;
    let resolved = p.holder.resolver().resolve(&p.holder_did).await;
    let document = resolved.did_document.unwrap();
    let key = p.holder.wallet().key_for_did(&p.holder_did).unwrap();
    for purpose in [ProofPurpose::Authentication, ProofPurpose::AssertionMethod] {
        assert!(document.authorizes(purpose, key.method_id()));
    }
}
