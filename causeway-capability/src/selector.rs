//! The delegation algebra: direct, disjunction, conjunction and
//! derivation combinators over capability descriptors.

use crate::{
    descriptor::{CapabilityValue, Descriptor, GroupDerivesFn, MatchOutcome},
    error::{EscalationError, ParseError},
};
use causeway_ucan::Capability;
use std::{fmt, sync::Arc};

/// A capability matcher: a tagged combinator tree over [`Descriptor`]s.
///
/// Selectors are both matchers (applied to a single source) and
/// selectors (applied to a capability list during proof-chain search).
#[derive(Clone)]
pub enum Selector {
    /// Matches one capability shape.
    Direct(Arc<Descriptor>),

    /// Matches the left side, or failing that, the right side.
    Or(Box<Selector>, Box<Selector>),

    /// Matches every member against the source list; selection yields
    /// cartesian-product groups, one member match per selector.
    And(Vec<Selector>),

    /// Matches `to` directly; a match additionally carries the `from`
    /// selector and a transition predicate used to validate derivations
    /// during proof-chain search.
    Derive {
        /// The capability shape being derived.
        to: Arc<Descriptor>,

        /// The shape it derives from.
        from: Box<Selector>,

        /// Whether a `to` claim stays within a `from` match group.
        derives: GroupDerivesFn,
    },
}

/// Matcher for a single capability shape.
#[must_use]
pub fn capability(descriptor: Descriptor) -> Selector {
    Selector::Direct(Arc::new(descriptor))
}

/// Disjunction: match `left`, or failing that, `right`.
#[must_use]
pub fn or(left: Selector, right: Selector) -> Selector {
    Selector::Or(Box::new(left), Box::new(right))
}

/// Conjunction: every member must match.
#[must_use]
pub fn and(members: impl IntoIterator<Item = Selector>) -> Selector {
    Selector::And(members.into_iter().collect())
}

/// Derivation: `to` may be claimed out of a `from` match when `derives`
/// accepts the transition.
#[must_use]
pub fn derive(
    to: Descriptor,
    from: Selector,
    derives: impl Fn(&CapabilityValue, &[CapabilityValue]) -> Result<(), EscalationError>
    + Send
    + Sync
    + 'static,
) -> Selector {
    Selector::Derive {
        to: Arc::new(to),
        from: Box::new(from),
        derives: Arc::new(derives),
    }
}

/// A successful selection: parsed values plus the (branch-resolved)
/// selector that produced them, used as the node type in proof-chain
/// exploration.
#[derive(Debug, Clone)]
pub struct Match {
    /// The selector that produced this match, with disjunctions resolved
    /// to the branch that matched.
    pub selector: Selector,

    /// One parsed value per selector leaf (a single value unless the
    /// selector is a conjunction).
    pub values: Vec<CapabilityValue>,

    /// The raw sources the values were parsed from.
    pub sources: Vec<Capability>,
}

impl Match {
    /// The first (for non-conjunctions, the only) parsed value.
    #[must_use]
    pub fn value(&self) -> &CapabilityValue {
        &self.values[0]
    }
}

/// Outcome of selecting over a capability list: every match in
/// deterministic declared order, plus structured non-match diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SelectResult {
    /// Every surviving match.
    pub matches: Vec<Match>,

    /// Sources no descriptor recognized.
    pub unknown: Vec<Capability>,

    /// Sources that matched an ability but failed to parse.
    pub malformed: Vec<(Capability, ParseError)>,
}

impl Selector {
    /// Apply this selector to a capability list.
    ///
    /// Sources are tried in declared order; matches preserve that order.
    #[must_use]
    pub fn select(&self, sources: &[Capability]) -> SelectResult {
        match self {
            Selector::Direct(descriptor) | Selector::Derive { to: descriptor, .. } => {
                select_descriptor(self, descriptor.as_ref(), sources)
            }
            Selector::Or(left, right) => {
                let mut result = left.select(sources);
                let right = right.select(sources);
                result.matches.extend(right.matches);
                // A source is unknown only when both branches reject it;
                // malformed outcomes from either branch are kept (the
                // more informative failure wins over unknown).
                result.unknown.retain(|cap| right.unknown.contains(cap));
                result.malformed.extend(right.malformed);
                result
            }
            Selector::And(members) => {
                let selected: Vec<SelectResult> =
                    members.iter().map(|member| member.select(sources)).collect();

                let mut result = SelectResult::default();
                for (index, member) in selected.iter().enumerate() {
                    if index == 0 {
                        result.unknown = member.unknown.clone();
                    } else {
                        result.unknown.retain(|cap| member.unknown.contains(cap));
                    }
                    result.malformed.extend(member.malformed.iter().cloned());
                }

                // Cartesian product of per-member matches, declared order
                type Group = (Vec<Selector>, Vec<CapabilityValue>, Vec<Capability>);
                let mut groups: Vec<Group> = vec![(Vec::new(), Vec::new(), Vec::new())];
                for member in &selected {
                    let mut next = Vec::new();
                    for (selectors, values, group_sources) in &groups {
                        for matched in &member.matches {
                            let mut selectors = selectors.clone();
                            selectors.push(matched.selector.clone());
                            let mut values = values.clone();
                            values.extend(matched.values.iter().cloned());
                            let mut group_sources = group_sources.clone();
                            group_sources.extend(matched.sources.iter().cloned());
                            next.push((selectors, values, group_sources));
                        }
                    }
                    groups = next;
                }
                result.matches = groups
                    .into_iter()
                    .map(|(selectors, values, sources)| Match {
                        selector: Selector::And(selectors),
                        values,
                        sources,
                    })
                    .collect();
                result
            }
        }
    }

    /// How many leaf values a match of this selector carries.
    pub(crate) fn leaf_count(&self) -> usize {
        match self {
            Selector::Direct(_) | Selector::Derive { .. } => 1,
            Selector::And(members) => members.iter().map(Selector::leaf_count).sum(),
            Selector::Or(left, _) => left.leaf_count(),
        }
    }
}

fn select_descriptor(
    selector: &Selector,
    descriptor: &Descriptor,
    sources: &[Capability],
) -> SelectResult {
    let mut result = SelectResult::default();
    for source in sources {
        match descriptor.match_source(source) {
            MatchOutcome::Match(value) => result.matches.push(Match {
                selector: selector.clone(),
                values: vec![value],
                sources: vec![source.clone()],
            }),
            MatchOutcome::Unknown(capability) => result.unknown.push(capability),
            MatchOutcome::Malformed(capability, cause) => {
                result.malformed.push((capability, cause));
            }
        }
    }
    result
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({self})")
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Direct(descriptor) => write!(f, "{}", descriptor.can()),
            Selector::Or(left, right) => write!(f, "{left}|{right}"),
            Selector::And(members) => {
                let rendered: Vec<String> =
                    members.iter().map(|member| member.to_string()).collect();
                write!(f, "{}", rendered.join("&"))
            }
            Selector::Derive { to, .. } => write!(f, "{}", to.can()),
        }
    }
}
