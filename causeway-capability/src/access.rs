//! The proof-chain validator.
//!
//! Given an invoked capability claim and a delegation carrying proofs,
//! decide whether a valid delegation path exists from a self-issued
//! capability (by the resource's owner) down to the claim. Exploration
//! is deterministic: proofs in declared order, capabilities in declared
//! order, first successful trace wins.

use crate::{
    Ability, Resource,
    descriptor::CapabilityValue,
    error::{AccessError, Cause, InvalidClaim},
    selector::{Match, SelectResult, Selector},
};
use causeway_common::ConditionalSend;
use causeway_ucan::{Capability, Delegation, Proof, Timestamp};
use causeway_varsig::{Did, Resolver, Signature};
use futures::{FutureExt, future::LocalBoxFuture};
use ipld_core::cid::Cid;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Host oracle: may `issuer` self-issue capabilities on a resource?
pub trait IssuePolicy {
    /// Whether `issuer` owns the resource `capability` names.
    fn can_issue(&self, capability: &CapabilityValue, issuer: &Did) -> bool;
}

impl<F> IssuePolicy for F
where
    F: Fn(&CapabilityValue, &Did) -> bool,
{
    fn can_issue(&self, capability: &CapabilityValue, issuer: &Did) -> bool {
        self(capability, issuer)
    }
}

/// The default issue policy: a principal owns its own DID resource and
/// everything under it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DidOwnership;

impl IssuePolicy for DidOwnership {
    fn can_issue(&self, capability: &CapabilityValue, issuer: &Did) -> bool {
        match &capability.with {
            Resource::Ucan => false,
            Resource::Uri(url) => {
                url.as_str() == issuer.as_str()
                    || url.as_str().starts_with(&format!("{}/", issuer.as_str()))
            }
        }
    }
}

/// Failure to resolve a proof link to a delegation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct ResolveError {
    /// Why resolution failed.
    pub reason: String,
}

impl ResolveError {
    /// Create a resolve error with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Callback for proof links not materialized in the block store.
pub trait ProofResolver<S: Signature> {
    /// Resolve `link` to a delegation.
    fn resolve(
        &self,
        link: &Cid,
    ) -> impl Future<Output = Result<Delegation<S>, ResolveError>> + ConditionalSend;
}

/// The default proof resolver: every link fails with `UnresolvedProof`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverResolve;

impl<S: Signature> ProofResolver<S> for NeverResolve {
    async fn resolve(&self, _link: &Cid) -> Result<Delegation<S>, ResolveError> {
        Err(ResolveError::new("proof resolution is not configured"))
    }
}

/// Options for [`access`].
pub struct Access<'a, A, R, P> {
    /// The capability shape being claimed.
    pub claim: &'a Selector,

    /// Oracle deciding self-issue authority.
    pub authority: &'a A,

    /// Current time for expiration and not-before bounds.
    pub now: Timestamp,

    /// Resolves issuer DIDs to signature verifiers.
    pub resolver: &'a R,

    /// Resolves proof links absent from the block store.
    pub proofs: &'a P,

    /// Cancel token, checked before each recursive step and each
    /// awaited operation.
    pub cancel: CancellationToken,
}

/// A successful validation: the granted capability values and the
/// delegation path that granted them, outermost invocation first.
#[derive(Debug, Clone)]
pub struct ProofTrace {
    /// The parsed claim that was granted (one value per selector leaf).
    pub capabilities: Vec<CapabilityValue>,

    /// Links of the delegations along the authorizing chain.
    pub path: Vec<Cid>,
}

enum Failure {
    Cancelled,
    Rejected(Vec<Cause>),
}

/// Validate a claim against an invocation and its bundled proofs.
///
/// # Errors
///
/// Returns [`AccessError::InvalidClaim`] with the accumulated cause tree
/// when no delegation path derives the claim, and
/// [`AccessError::Cancelled`] when the cancel token fires.
pub async fn access<S, A, R, P>(
    invocation: &Delegation<S>,
    options: Access<'_, A, R, P>,
) -> Result<ProofTrace, AccessError>
where
    S: Signature,
    A: IssuePolicy,
    R: Resolver<S>,
    P: ProofResolver<S>,
{
    let selection = options.claim.select(invocation.capabilities());
    if selection.matches.is_empty() {
        debug!(claim = %options.claim, "no invoked capability matches the claim");
        return Err(InvalidClaim {
            claim: options.claim.to_string(),
            causes: selection_causes(selection),
        }
        .into());
    }

    let mut causes = Vec::new();
    for claim in selection.matches {
        match validate(claim.clone(), invocation.clone(), &options).await {
            Ok(path) => {
                debug!(claim = %options.claim, depth = path.len(), "claim authorized");
                return Ok(ProofTrace {
                    capabilities: claim.values,
                    path,
                });
            }
            Err(Failure::Cancelled) => return Err(AccessError::Cancelled),
            Err(Failure::Rejected(claim_causes)) => causes.extend(claim_causes),
        }
    }

    debug!(claim = %options.claim, causes = causes.len(), "claim rejected");
    Err(InvalidClaim {
        claim: options.claim.to_string(),
        causes,
    }
    .into())
}

/// Causes for a claim that failed at selection time. Malformed outcomes
/// are more informative than unknown ones and are listed first.
fn selection_causes(selection: SelectResult) -> Vec<Cause> {
    let mut causes: Vec<Cause> = selection
        .malformed
        .into_iter()
        .map(|(capability, cause)| Cause::MalformedCapability { capability, cause })
        .collect();
    causes.extend(
        selection
            .unknown
            .into_iter()
            .map(|capability| Cause::UnknownCapability { capability }),
    );
    causes
}

/// Recursive chain search. `claim` was matched from `delegation`'s own
/// capabilities; decide whether `delegation` is entitled to it.
fn validate<'a, S, A, R, P>(
    claim: Match,
    delegation: Delegation<S>,
    options: &'a Access<'a, A, R, P>,
) -> LocalBoxFuture<'a, Result<Vec<Cid>, Failure>>
where
    S: Signature + 'a,
    A: IssuePolicy,
    R: Resolver<S>,
    P: ProofResolver<S>,
{
    async move {
        if options.cancel.is_cancelled() {
            return Err(Failure::Cancelled);
        }

        // Self-issue short-circuit: the issuer owns every claimed
        // resource, and the raw sources are among its capabilities by
        // construction of the match.
        if claim
            .values
            .iter()
            .all(|value| options.authority.can_issue(value, delegation.issuer()))
        {
            trace!(issuer = %delegation.issuer(), "claim is self-issued");
            return Ok(vec![delegation.link()]);
        }

        let mut causes = Vec::new();
        for proof in delegation.proofs() {
            let proof_delegation = match proof {
                Proof::Delegation(resolved) => resolved.clone(),
                Proof::Link(cid) => {
                    if options.cancel.is_cancelled() {
                        return Err(Failure::Cancelled);
                    }
                    match options.proofs.resolve(cid).await {
                        Ok(resolved) => resolved,
                        Err(error) => {
                            causes.push(Cause::UnresolvedProof {
                                link: *cid,
                                reason: error.to_string(),
                            });
                            continue;
                        }
                    }
                }
            };

            // Audience chaining: the proof must be addressed to the
            // delegation's issuer.
            if proof_delegation.audience() != delegation.issuer() {
                causes.push(Cause::InvalidAudience {
                    delegation: proof_delegation.link(),
                    expected: delegation.issuer().clone(),
                    actual: proof_delegation.audience().clone(),
                });
                continue;
            }

            // Time bounds.
            if proof_delegation.expiration() <= options.now {
                causes.push(Cause::Expired {
                    delegation: proof_delegation.link(),
                    expired_at: proof_delegation.expiration(),
                    now: options.now,
                });
                continue;
            }
            if let Some(active_at) = proof_delegation.not_before() {
                if active_at > options.now {
                    causes.push(Cause::NotValidYet {
                        delegation: proof_delegation.link(),
                        active_at,
                        now: options.now,
                    });
                    continue;
                }
            }

            // Signature; verification is cached on the delegation.
            if options.cancel.is_cancelled() {
                return Err(Failure::Cancelled);
            }
            if proof_delegation
                .verify_signature(options.resolver)
                .await
                .is_err()
            {
                causes.push(Cause::InvalidSignature {
                    delegation: proof_delegation.link(),
                });
                continue;
            }

            // Capability expansion, then derivation matching.
            let expanded = expand_capabilities(&proof_delegation);
            let (candidates, step_causes) = step(&claim, &expanded);
            let mut session = step_causes;

            for candidate in candidates {
                match validate(candidate, proof_delegation.clone(), options).await {
                    Ok(sub_path) => {
                        let mut path = vec![delegation.link()];
                        path.extend(sub_path);
                        return Ok(path);
                    }
                    Err(Failure::Cancelled) => return Err(Failure::Cancelled),
                    Err(Failure::Rejected(sub_causes)) => session.extend(sub_causes),
                }
            }

            if !session.is_empty() {
                causes.push(Cause::Session {
                    delegation: proof_delegation.link(),
                    causes: session,
                });
            }
        }

        Err(Failure::Rejected(causes))
    }
    .boxed_local()
}

/// Candidate parent matches for `claim` among a proof's (expanded)
/// capabilities, plus the rejections encountered on the way.
fn step(claim: &Match, capabilities: &[Capability]) -> (Vec<Match>, Vec<Cause>) {
    let mut candidates = Vec::new();
    let mut causes = Vec::new();

    match &claim.selector {
        Selector::Direct(descriptor) => {
            let selected = claim.selector.select(capabilities);
            push_malformed(&mut causes, &selected);
            for parent in selected.matches {
                match descriptor.check_derives(claim.value(), parent.value()) {
                    Ok(()) => candidates.push(parent),
                    Err(cause) => causes.push(Cause::EscalatedCapability {
                        claimed: claim.value().clone(),
                        delegated: parent.value().clone(),
                        cause,
                    }),
                }
            }
            if candidates.is_empty() && causes.is_empty() {
                causes.extend(
                    selected
                        .unknown
                        .into_iter()
                        .map(|capability| Cause::UnknownCapability { capability }),
                );
            }
        }

        Selector::Derive { to, from, derives } => {
            // Same-shape re-delegation of the derived capability.
            let selected = claim.selector.select(capabilities);
            push_malformed(&mut causes, &selected);
            let mut to_unknown = selected.unknown;
            for parent in selected.matches {
                match to.check_derives(claim.value(), parent.value()) {
                    Ok(()) => candidates.push(parent),
                    Err(cause) => causes.push(Cause::EscalatedCapability {
                        claimed: claim.value().clone(),
                        delegated: parent.value().clone(),
                        cause,
                    }),
                }
            }

            // Derivation edge into the `from` shape.
            let from_selected = from.select(capabilities);
            push_malformed(&mut causes, &from_selected);
            to_unknown.retain(|capability| from_selected.unknown.contains(capability));
            for parent in from_selected.matches {
                match derives(claim.value(), &parent.values) {
                    Ok(()) => candidates.push(parent),
                    Err(cause) => causes.push(Cause::EscalatedCapability {
                        claimed: claim.value().clone(),
                        delegated: parent.value().clone(),
                        cause,
                    }),
                }
            }

            if candidates.is_empty() && causes.is_empty() {
                causes.extend(
                    to_unknown
                        .into_iter()
                        .map(|capability| Cause::UnknownCapability { capability }),
                );
            }
        }

        Selector::And(members) => {
            // Decompose the group claim, step each member, recombine.
            let mut offset = 0;
            let mut member_candidates: Vec<Vec<Match>> = Vec::new();
            for member in members {
                let count = member.leaf_count();
                let member_claim = Match {
                    selector: member.clone(),
                    values: claim.values[offset..offset + count].to_vec(),
                    sources: claim.sources[offset..offset + count].to_vec(),
                };
                let (member_cands, member_causes) = step(&member_claim, capabilities);
                causes.extend(member_causes);
                member_candidates.push(member_cands);
                offset += count;
            }

            if member_candidates.iter().all(|cands| !cands.is_empty()) {
                type Group = (Vec<Selector>, Vec<CapabilityValue>, Vec<Capability>);
                let mut groups: Vec<Group> = vec![(Vec::new(), Vec::new(), Vec::new())];
                for member_cands in &member_candidates {
                    let mut next = Vec::new();
                    for (selectors, values, sources) in &groups {
                        for candidate in member_cands {
                            let mut selectors = selectors.clone();
                            selectors.push(candidate.selector.clone());
                            let mut values = values.clone();
                            values.extend(candidate.values.iter().cloned());
                            let mut sources = sources.clone();
                            sources.extend(candidate.sources.iter().cloned());
                            next.push((selectors, values, sources));
                        }
                    }
                    groups = next;
                }
                candidates.extend(groups.into_iter().map(|(selectors, values, sources)| {
                    Match {
                        selector: Selector::And(selectors),
                        values,
                        sources,
                    }
                }));
            }
        }

        Selector::Or(left, right) => {
            // Disjunction claims are branch-resolved at selection time;
            // if one reaches here, try both branches.
            for branch in [left, right] {
                let branch_claim = Match {
                    selector: (**branch).clone(),
                    values: claim.values.clone(),
                    sources: claim.sources.clone(),
                };
                let (branch_cands, branch_causes) = step(&branch_claim, capabilities);
                candidates.extend(branch_cands);
                causes.extend(branch_causes);
            }
        }
    }

    (candidates, causes)
}

fn push_malformed(causes: &mut Vec<Cause>, selected: &SelectResult) {
    for (capability, cause) in &selected.malformed {
        causes.push(Cause::MalformedCapability {
            capability: capability.clone(),
            cause: cause.clone(),
        });
    }
}

/// Expand a proof's capabilities per the `ucan:*` re-delegation rules.
///
/// A capability on the `ucan:*` meta-resource stands for everything the
/// issuer holds proofs for. It expands to the same ability over the
/// issuer's own DID, followed by every capability of each included proof
/// whose ability is compatible, rewritten to the more specific ability
/// and with the delegator's caveats overlaid key-by-key onto the
/// child's. The overlay is a conservative widening; the derivation
/// predicate stays the source of truth.
fn expand_capabilities<S: Signature>(delegation: &Delegation<S>) -> Vec<Capability> {
    let mut expanded = Vec::new();
    for capability in delegation.capabilities() {
        if !capability.is_redelegation() {
            expanded.push(capability.clone());
            continue;
        }

        expanded.push(Capability {
            can: capability.can.clone(),
            with: delegation.issuer().to_string(),
            nb: capability.nb.clone(),
        });

        let Ok(own) = Ability::parse(&capability.can) else {
            trace!(can = %capability.can, "skipping redelegation with unparseable ability");
            continue;
        };
        for proof in delegation.proofs() {
            let Some(inner) = proof.delegation() else {
                continue;
            };
            for inner_capability in inner.capabilities() {
                let Ok(provided) = Ability::parse(&inner_capability.can) else {
                    continue;
                };
                let Some(can) = Ability::intersect(&provided, &own) else {
                    continue;
                };
                let mut nb = inner_capability.caveats().clone();
                for (key, value) in capability.caveats() {
                    nb.insert(key.clone(), value.clone());
                }
                expanded.push(Capability {
                    can: can.as_str().to_string(),
                    with: inner_capability.with.clone(),
                    nb: if nb.is_empty() { None } else { Some(nb) },
                });
            }
        }
    }
    expanded
}
