//! Integration tests for proof-chain validation.
//!
//! These tests use real Ed25519 cryptography to build delegation chains
//! and drive the `access` validator end to end: self-issued invocations,
//! delegated invocations, escalations, re-delegation expansion, archive
//! transport and the failure taxonomy.

use causeway_capability::{
    Access, AccessError, CapabilityValue, Cause, Descriptor, DidOwnership, EscalationError,
    NeverResolve, access, capability, scheme,
};
use causeway_ucan::{Capability, Delegation, Proof, Timestamp, extract};
use causeway_varsig::{
    Did, Ed25519Signature, Principal,
    ed25519::{Ed25519KeyResolver, Ed25519Signer},
};
use tokio_util::sync::CancellationToken;

/// Create a test signer from a seed byte (for deterministic tests).
fn test_signer(seed: u8) -> Ed25519Signer {
    Ed25519Signer::import(&[seed; 32])
}

/// The `store/add` capability on a `did:` resource.
fn store_add() -> Descriptor {
    Descriptor::new("store/add")
        .expect("valid ability")
        .with_parser(causeway_capability::did_uri())
}

/// The `file/link` capability: `file:` resources, a claim must stay
/// under the delegated path prefix.
fn file_link() -> Descriptor {
    Descriptor::new("file/link")
        .expect("valid ability")
        .with_parser(scheme("file"))
        .derives(|claimed, delegated| {
            let claimed_uri = claimed.with.to_string();
            let delegated_uri = delegated.with.to_string();
            if claimed_uri.starts_with(&delegated_uri) {
                Ok(())
            } else {
                Err(EscalationError::new(format!(
                    "{claimed_uri} is not contained in {delegated_uri}"
                )))
            }
        })
}

/// Whether the cause tree contains an `EscalatedCapability` anywhere.
fn contains_escalation(causes: &[Cause]) -> bool {
    causes.iter().any(|cause| match cause {
        Cause::EscalatedCapability { .. } => true,
        Cause::Session { causes, .. } => contains_escalation(causes),
        _ => false,
    })
}

/// Whether the cause tree contains the given predicate anywhere.
fn contains(causes: &[Cause], predicate: &dyn Fn(&Cause) -> bool) -> bool {
    causes.iter().any(|cause| {
        predicate(cause)
            || match cause {
                Cause::Session { causes, .. } => contains(causes, predicate),
                _ => false,
            }
    })
}

// =============================================================================
// Granted claims
// =============================================================================

#[tokio::test]
async fn self_issued_invocation_succeeds_without_proofs() {
    let alice = test_signer(1);
    let w3store = test_signer(2);

    // alice invokes store/add on her own resource, no proofs attached
    let invocation = Delegation::<Ed25519Signature>::builder()
        .issuer(alice.clone())
        .audience(&w3store)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .delegate()
        .await
        .expect("delegate should succeed");

    let claim = capability(store_add());
    let trace = access(
        &invocation,
        Access {
            claim: &claim,
            authority: &DidOwnership,
            now: Timestamp::now(),
            resolver: &Ed25519KeyResolver,
            proofs: &NeverResolve,
            cancel: CancellationToken::new(),
        },
    )
    .await
    .expect("self-issued claim should be granted");

    assert_eq!(trace.path, vec![invocation.link()]);
    assert_eq!(trace.capabilities.len(), 1);
    assert_eq!(trace.capabilities[0].can.as_str(), "store/add");
}

#[tokio::test]
async fn delegated_invocation_builds_a_two_step_trace() {
    let alice = test_signer(3);
    let bob = test_signer(4);
    let w3store = test_signer(5);

    // alice -> bob: store/add on alice's resource
    let proof = Delegation::<Ed25519Signature>::builder()
        .issuer(alice.clone())
        .audience(&bob)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .delegate()
        .await
        .expect("delegate should succeed");

    // bob invokes with alice's proof
    let invocation = Delegation::builder()
        .issuer(bob.clone())
        .audience(&w3store)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .proof(proof.clone())
        .delegate()
        .await
        .expect("delegate should succeed");

    let claim = capability(store_add());
    let trace = access(
        &invocation,
        Access {
            claim: &claim,
            authority: &DidOwnership,
            now: Timestamp::now(),
            resolver: &Ed25519KeyResolver,
            proofs: &NeverResolve,
            cancel: CancellationToken::new(),
        },
    )
    .await
    .expect("delegated claim should be granted");

    assert_eq!(trace.path, vec![invocation.link(), proof.link()]);
}

#[tokio::test]
async fn redelegation_expansion_makes_embedded_capabilities_visible() {
    let carol = test_signer(6);
    let alice = test_signer(7);
    let bob = test_signer(8);
    let w3store = test_signer(9);

    // carol -> alice: store/add on alice's resource
    let inner = Delegation::<Ed25519Signature>::builder()
        .issuer(carol.clone())
        .audience(&alice)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .delegate()
        .await
        .expect("delegate should succeed");

    // alice -> bob: everything alice holds, narrowed to store/*
    let outer = Delegation::builder()
        .issuer(alice.clone())
        .audience(&bob)
        .capability(Capability::new("store/*", "ucan:*"))
        .lifetime(3600)
        .proof(inner)
        .delegate()
        .await
        .expect("delegate should succeed");

    // bob invokes store/add on alice's resource with the outer proof
    // only; the inner proof travels embedded in it
    let invocation = Delegation::builder()
        .issuer(bob.clone())
        .audience(&w3store)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .proof(outer.clone())
        .delegate()
        .await
        .expect("delegate should succeed");

    let claim = capability(store_add());
    let trace = access(
        &invocation,
        Access {
            claim: &claim,
            authority: &DidOwnership,
            now: Timestamp::now(),
            resolver: &Ed25519KeyResolver,
            proofs: &NeverResolve,
            cancel: CancellationToken::new(),
        },
    )
    .await
    .expect("expanded claim should be granted");

    // The chain terminates at alice, who owns the resource
    assert_eq!(trace.path, vec![invocation.link(), outer.link()]);
}

#[tokio::test]
async fn archived_delegation_validates_identically_after_transport() {
    let carol = test_signer(10);
    let alice = test_signer(11);
    let bob = test_signer(12);
    let w3store = test_signer(13);

    // Depth-3 chain: carol owns the resource, delegates to alice, alice
    // to bob, bob invokes
    let first = Delegation::<Ed25519Signature>::builder()
        .issuer(carol.clone())
        .audience(&alice)
        .capability(Capability::new("store/add", carol.did().to_string()))
        .lifetime(3600)
        .delegate()
        .await
        .expect("delegate should succeed");
    let second = Delegation::builder()
        .issuer(alice.clone())
        .audience(&bob)
        .capability(Capability::new("store/add", carol.did().to_string()))
        .lifetime(3600)
        .proof(first)
        .delegate()
        .await
        .expect("delegate should succeed");
    let invocation = Delegation::builder()
        .issuer(bob.clone())
        .audience(&w3store)
        .capability(Capability::new("store/add", carol.did().to_string()))
        .lifetime(3600)
        .proof(second)
        .delegate()
        .await
        .expect("delegate should succeed");

    // Transmit over an arbitrary byte channel
    let bytes: Vec<u8> = invocation.archive().expect("archive should succeed");
    let received: Delegation<Ed25519Signature> = extract(&bytes).expect("extract should succeed");
    assert_eq!(received.cid(), invocation.cid());

    let claim = capability(store_add());
    let validate = |delegation: Delegation<Ed25519Signature>, now: Timestamp| {
        let claim = claim.clone();
        async move {
            access(
                &delegation,
                Access {
                    claim: &claim,
                    authority: &DidOwnership,
                    now,
                    resolver: &Ed25519KeyResolver,
                    proofs: &NeverResolve,
                    cancel: CancellationToken::new(),
                },
            )
            .await
        }
    };

    let now = Timestamp::now();
    let original = validate(invocation.clone(), now)
        .await
        .expect("original should validate");
    let transported = validate(received, now)
        .await
        .expect("transported should validate");

    assert_eq!(original.path, transported.path);
    assert_eq!(original.path.len(), 3);
}

// =============================================================================
// Rejected claims
// =============================================================================

#[tokio::test]
async fn escalating_the_resource_path_is_rejected() {
    let alice = test_signer(20);
    let bob = test_signer(21);
    let service = test_signer(22);
    let alice_did = alice.did();

    // alice -> bob: file/link under alice's friends/bob directory
    let proof = Delegation::<Ed25519Signature>::builder()
        .issuer(alice.clone())
        .audience(&bob)
        .capability(Capability::new("file/link", "file://alice/friends/bob/"))
        .lifetime(3600)
        .delegate()
        .await
        .expect("delegate should succeed");

    // bob claims a path outside the delegated prefix
    let invocation = Delegation::builder()
        .issuer(bob.clone())
        .audience(&service)
        .capability(Capability::new(
            "file/link",
            "file://alice/friends/mallory/about",
        ))
        .lifetime(3600)
        .proof(proof)
        .delegate()
        .await
        .expect("delegate should succeed");

    // alice owns every file: resource in this scenario
    let authority =
        move |_capability: &CapabilityValue, issuer: &Did| issuer == &alice_did;

    let claim = capability(file_link());
    let error = access(
        &invocation,
        Access {
            claim: &claim,
            authority: &authority,
            now: Timestamp::now(),
            resolver: &Ed25519KeyResolver,
            proofs: &NeverResolve,
            cancel: CancellationToken::new(),
        },
    )
    .await
    .expect_err("escalated claim should be rejected");

    let AccessError::InvalidClaim(invalid) = error else {
        panic!("expected InvalidClaim, got {error:?}");
    };
    assert!(
        contains_escalation(&invalid.causes),
        "cause tree should contain an escalation:\n{}",
        invalid.render()
    );
}

#[tokio::test]
async fn staying_within_the_delegated_path_is_granted() {
    let alice = test_signer(23);
    let bob = test_signer(24);
    let service = test_signer(25);
    let alice_did = alice.did();

    let proof = Delegation::<Ed25519Signature>::builder()
        .issuer(alice.clone())
        .audience(&bob)
        .capability(Capability::new("file/link", "file://alice/friends/bob/"))
        .lifetime(3600)
        .delegate()
        .await
        .expect("delegate should succeed");

    let invocation = Delegation::builder()
        .issuer(bob.clone())
        .audience(&service)
        .capability(Capability::new(
            "file/link",
            "file://alice/friends/bob/photo",
        ))
        .lifetime(3600)
        .proof(proof.clone())
        .delegate()
        .await
        .expect("delegate should succeed");

    let authority =
        move |_capability: &CapabilityValue, issuer: &Did| issuer == &alice_did;

    let claim = capability(file_link());
    let trace = access(
        &invocation,
        Access {
            claim: &claim,
            authority: &authority,
            now: Timestamp::now(),
            resolver: &Ed25519KeyResolver,
            proofs: &NeverResolve,
            cancel: CancellationToken::new(),
        },
    )
    .await
    .expect("claim within the delegated prefix should be granted");

    assert_eq!(trace.path, vec![invocation.link(), proof.link()]);
}

#[tokio::test]
async fn audience_chain_violation_is_rejected() {
    let alice = test_signer(30);
    let bob = test_signer(31);
    let mallory = test_signer(32);
    let service = test_signer(33);

    // alice -> bob, but mallory tries to use the proof
    let proof = Delegation::<Ed25519Signature>::builder()
        .issuer(alice.clone())
        .audience(&bob)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .delegate()
        .await
        .expect("delegate should succeed");

    let invocation = Delegation::builder()
        .issuer(mallory.clone())
        .audience(&service)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .proof(proof)
        .delegate()
        .await
        .expect("delegate should succeed");

    let claim = capability(store_add());
    let error = access(
        &invocation,
        Access {
            claim: &claim,
            authority: &DidOwnership,
            now: Timestamp::now(),
            resolver: &Ed25519KeyResolver,
            proofs: &NeverResolve,
            cancel: CancellationToken::new(),
        },
    )
    .await
    .expect_err("claim with a broken audience chain should be rejected");

    let AccessError::InvalidClaim(invalid) = error else {
        panic!("expected InvalidClaim, got {error:?}");
    };
    assert!(contains(&invalid.causes, &|cause| matches!(
        cause,
        Cause::InvalidAudience { .. }
    )));
}

#[tokio::test]
async fn expired_proof_is_rejected() {
    let alice = test_signer(40);
    let bob = test_signer(41);
    let service = test_signer(42);

    let now = Timestamp::now();
    let proof = Delegation::<Ed25519Signature>::builder()
        .issuer(alice.clone())
        .audience(&bob)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .expiration(Timestamp::from_unix(now.to_unix() - 60))
        .delegate()
        .await
        .expect("delegate should succeed");

    let invocation = Delegation::builder()
        .issuer(bob.clone())
        .audience(&service)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .proof(proof)
        .delegate()
        .await
        .expect("delegate should succeed");

    let claim = capability(store_add());
    let error = access(
        &invocation,
        Access {
            claim: &claim,
            authority: &DidOwnership,
            now,
            resolver: &Ed25519KeyResolver,
            proofs: &NeverResolve,
            cancel: CancellationToken::new(),
        },
    )
    .await
    .expect_err("claim backed by an expired proof should be rejected");

    let AccessError::InvalidClaim(invalid) = error else {
        panic!("expected InvalidClaim, got {error:?}");
    };
    assert!(contains(&invalid.causes, &|cause| matches!(
        cause,
        Cause::Expired { .. }
    )));
}

#[tokio::test]
async fn not_yet_valid_proof_is_rejected() {
    let alice = test_signer(43);
    let bob = test_signer(44);
    let service = test_signer(45);

    let now = Timestamp::now();
    let proof = Delegation::<Ed25519Signature>::builder()
        .issuer(alice.clone())
        .audience(&bob)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .not_before(Timestamp::from_unix(now.to_unix() + 3600))
        .lifetime(7200)
        .delegate()
        .await
        .expect("delegate should succeed");

    let invocation = Delegation::builder()
        .issuer(bob.clone())
        .audience(&service)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .proof(proof)
        .delegate()
        .await
        .expect("delegate should succeed");

    let claim = capability(store_add());
    let error = access(
        &invocation,
        Access {
            claim: &claim,
            authority: &DidOwnership,
            now,
            resolver: &Ed25519KeyResolver,
            proofs: &NeverResolve,
            cancel: CancellationToken::new(),
        },
    )
    .await
    .expect_err("claim backed by a not-yet-valid proof should be rejected");

    let AccessError::InvalidClaim(invalid) = error else {
        panic!("expected InvalidClaim, got {error:?}");
    };
    assert!(contains(&invalid.causes, &|cause| matches!(
        cause,
        Cause::NotValidYet { .. }
    )));
}

#[tokio::test]
async fn unresolved_proof_link_is_reported() {
    let alice = test_signer(50);
    let bob = test_signer(51);
    let service = test_signer(52);

    let proof = Delegation::<Ed25519Signature>::builder()
        .issuer(alice.clone())
        .audience(&bob)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .delegate()
        .await
        .expect("delegate should succeed");

    // Reference the proof by link only; its block never travels
    let invocation = Delegation::builder()
        .issuer(bob.clone())
        .audience(&service)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .proof(Proof::Link(proof.link()))
        .delegate()
        .await
        .expect("delegate should succeed");

    let claim = capability(store_add());
    let error = access(
        &invocation,
        Access {
            claim: &claim,
            authority: &DidOwnership,
            now: Timestamp::now(),
            resolver: &Ed25519KeyResolver,
            proofs: &NeverResolve,
            cancel: CancellationToken::new(),
        },
    )
    .await
    .expect_err("claim with an unresolvable proof should be rejected");

    let AccessError::InvalidClaim(invalid) = error else {
        panic!("expected InvalidClaim, got {error:?}");
    };
    assert!(contains(&invalid.causes, &|cause| matches!(
        cause,
        Cause::UnresolvedProof { .. }
    )));
}

#[tokio::test]
async fn cancelled_validation_returns_cancelled() {
    let alice = test_signer(60);
    let service = test_signer(61);

    let invocation = Delegation::<Ed25519Signature>::builder()
        .issuer(alice.clone())
        .audience(&service)
        .capability(Capability::new("store/add", alice.did().to_string()))
        .lifetime(3600)
        .delegate()
        .await
        .expect("delegate should succeed");

    let cancel = CancellationToken::new();
    cancel.cancel();

    let claim = capability(store_add());
    let error = access(
        &invocation,
        Access {
            claim: &claim,
            authority: &DidOwnership,
            now: Timestamp::now(),
            resolver: &Ed25519KeyResolver,
            proofs: &NeverResolve,
            cancel,
        },
    )
    .await
    .expect_err("cancelled validation should not produce a result");

    assert!(matches!(error, AccessError::Cancelled));
}

#[tokio::test]
async fn unknown_claim_shape_is_rejected_at_selection() {
    let alice = test_signer(70);
    let service = test_signer(71);

    let invocation = Delegation::<Ed25519Signature>::builder()
        .issuer(alice.clone())
        .audience(&service)
        .capability(Capability::new("upload/add", alice.did().to_string()))
        .lifetime(3600)
        .delegate()
        .await
        .expect("delegate should succeed");

    let claim = capability(store_add());
    let error = access(
        &invocation,
        Access {
            claim: &claim,
            authority: &DidOwnership,
            now: Timestamp::now(),
            resolver: &Ed25519KeyResolver,
            proofs: &NeverResolve,
            cancel: CancellationToken::new(),
        },
    )
    .await
    .expect_err("claim absent from the invocation should be rejected");

    let AccessError::InvalidClaim(invalid) = error else {
        panic!("expected InvalidClaim, got {error:?}");
    };
    assert!(matches!(
        invalid.causes.as_slice(),
        [Cause::UnknownCapability { .. }]
    ));
}
