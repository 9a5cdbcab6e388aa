//! Graph-pattern unification
//!
//! A [`Match`] records how the triples of one graph pattern line up with the
//! triples of another, together with the occurrence-site mapping that the
//! alignment induces. [`matches`] computes every consistent combination of
//! per-triple alignments, filtered by a [`MatchStrategy`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::term::{GraphPattern, NodeMapping, TripleNode, TriplePattern};

// ============================================================================
// Match strategy
// ============================================================================

/// Which combinations [`matches`] returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MatchStrategy {
    /// Every consistent combination, maximal or not
    #[serde(rename = "all")]
    FindAllMatches,
    /// Only the maximal combinations
    #[default]
    #[serde(rename = "biggest")]
    FindOnlyBiggestMatches,
    /// Only combinations covering every triple of the first pattern
    #[serde(rename = "full")]
    FindOnlyFullMatches,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::FindAllMatches => "all",
            MatchStrategy::FindOnlyBiggestMatches => "biggest",
            MatchStrategy::FindOnlyFullMatches => "full",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all" | "find_all_matches" => Some(MatchStrategy::FindAllMatches),
            "biggest" | "find_only_biggest_matches" => Some(MatchStrategy::FindOnlyBiggestMatches),
            "full" | "find_only_full_matches" => Some(MatchStrategy::FindOnlyFullMatches),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Match
// ============================================================================

/// A unification record between two graph patterns
///
/// Identity (equality, ordering, hashing) is the triple-to-triple map; the
/// site mapping is fully determined by it.
#[derive(Clone)]
pub struct Match {
    patterns: BTreeMap<TriplePattern, TriplePattern>,
    mappings: NodeMapping,
}

impl Match {
    /// A match between two single triples
    pub fn new(from: TriplePattern, to: TriplePattern, mappings: NodeMapping) -> Self {
        let mut patterns = BTreeMap::new();
        patterns.insert(from, to);
        Match { patterns, mappings }
    }

    /// Unify two triples into a single-pair match
    pub fn between(from: &TriplePattern, to: &TriplePattern) -> Option<Self> {
        from.find_matches(to)
            .map(|mappings| Match::new(from.clone(), to.clone(), mappings))
    }

    /// Triple-to-triple map
    pub fn patterns(&self) -> &BTreeMap<TriplePattern, TriplePattern> {
        &self.patterns
    }

    /// Site-to-site map
    pub fn mappings(&self) -> &NodeMapping {
        &self.mappings
    }

    /// Number of triple pairs in this match
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Triples of the first pattern covered by this match
    pub fn sources(&self) -> impl Iterator<Item = &TriplePattern> {
        self.patterns.keys()
    }

    /// Triples of the second pattern covered by this match
    pub fn targets(&self) -> impl Iterator<Item = &TriplePattern> {
        self.patterns.values()
    }

    /// The same match seen from the other side
    pub fn inverse(&self) -> Match {
        Match {
            patterns: self.patterns.iter().map(|(k, v)| (v.clone(), k.clone())).collect(),
            mappings: self.mappings.iter().map(|(k, v)| (v.clone(), k.clone())).collect(),
        }
    }

    /// True when every triple pair and site pair of `self` also appears,
    /// identically mapped, in `other`
    pub fn is_sub_match(&self, other: &Match) -> bool {
        self.patterns
            .iter()
            .all(|(k, v)| other.patterns.get(k) == Some(v))
            && self
                .mappings
                .iter()
                .all(|(k, v)| other.mappings.get(k).map_or(false, |ov| same_site(ov, v)))
    }

    /// Combine two matches if they are consistent.
    ///
    /// Fails when a triple on either side is already aligned, when a term
    /// would be mapped to two different terms, or when two different terms
    /// would be mapped onto the same term. Merging is commutative.
    pub fn merge(&self, other: &Match) -> Option<Match> {
        let patterns = merge_patterns(&self.patterns, &other.patterns)?;
        let mappings = merge_mappings(&self.mappings, &other.mappings)?;
        Some(Match { patterns, mappings })
    }
}

fn same_site(a: &TripleNode, b: &TripleNode) -> bool {
    a == b && a.term() == b.term()
}

fn merge_patterns(
    ours: &BTreeMap<TriplePattern, TriplePattern>,
    theirs: &BTreeMap<TriplePattern, TriplePattern>,
) -> Option<BTreeMap<TriplePattern, TriplePattern>> {
    let taken: BTreeSet<&TriplePattern> = ours.values().collect();
    let mut merged = ours.clone();
    for (k, v) in theirs {
        if ours.contains_key(k) || taken.contains(v) {
            return None;
        }
        merged.insert(k.clone(), v.clone());
    }
    Some(merged)
}

fn merge_mappings(ours: &NodeMapping, theirs: &NodeMapping) -> Option<NodeMapping> {
    for (k, v) in theirs {
        for (ok, ov) in ours {
            // one term, two images
            if k.term() == ok.term() && v.term() != ov.term() {
                return None;
            }
            // two terms, one image
            if v.term() == ov.term() && k.term() != ok.term() {
                return None;
            }
        }
    }
    let mut merged = ours.clone();
    merged.extend(theirs.iter().map(|(k, v)| (k.clone(), v.clone())));
    Some(merged)
}

impl PartialEq for Match {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

impl Eq for Match {}

impl Hash for Match {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.patterns.hash(state);
    }
}

impl PartialOrd for Match {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Match {
    fn cmp(&self, other: &Self) -> Ordering {
        self.patterns.cmp(&other.patterns)
    }
}

impl fmt::Debug for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.patterns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[{}]=[{}]", k, v)?;
        }
        write!(f, "}}")
    }
}

/// Invert every match in a set
pub fn invert_all(matches: &BTreeSet<Match>) -> BTreeSet<Match> {
    matches.iter().map(Match::inverse).collect()
}

// ============================================================================
// Graph-pattern matching
// ============================================================================

/// All single-triple matches of `triple` against the triples of `pattern`
fn find_matches(triple: &TriplePattern, pattern: &GraphPattern) -> Vec<Match> {
    pattern
        .iter()
        .filter_map(|candidate| Match::between(triple, candidate))
        .collect()
}

/// Compute the matches between two graph patterns.
///
/// Every triple of `first` is unified with every triple of `second`; the
/// per-triple results are then folded into combinations, keeping the largest
/// consistent merges in a "biggest" list and their strict parts in a
/// "smaller" list. Which of those are returned depends on `strategy`.
pub fn matches(first: &GraphPattern, second: &GraphPattern, strategy: MatchStrategy) -> BTreeSet<Match> {
    if first.is_empty() || second.is_empty() {
        return BTreeSet::new();
    }

    let full_only = strategy == MatchStrategy::FindOnlyFullMatches;

    let mut per_triple: Vec<Vec<Match>> = Vec::new();
    for triple in first {
        let found = find_matches(triple, second);
        if found.is_empty() {
            if full_only {
                return BTreeSet::new();
            }
            continue;
        }
        per_triple.push(found);
    }

    let mut rounds = per_triple.into_iter();
    let mut biggest: Vec<Match> = match rounds.next() {
        Some(first_round) => first_round,
        None => return BTreeSet::new(),
    };
    let mut smaller: Vec<Match> = Vec::new();

    for candidates in rounds {
        let mut to_biggest: Vec<Match> = Vec::new();
        let mut to_smaller: Vec<Match> = Vec::new();
        let mut demoted: BTreeSet<usize> = BTreeSet::new();

        for m1 in candidates {
            let mut has_merged = false;

            for (i, m2) in biggest.iter().enumerate() {
                if let Some(merged) = m2.merge(&m1) {
                    has_merged = true;
                    to_biggest.push(merged);
                    demoted.insert(i);
                } else if full_only {
                    demoted.insert(i);
                }
            }

            if !full_only {
                for m2 in &smaller {
                    if let Some(merged) = m2.merge(&m1) {
                        if !has_merged {
                            has_merged = true;
                            to_biggest.push(merged);
                        } else if to_biggest.iter().any(|m| m2.is_sub_match(m)) {
                            to_smaller.push(merged);
                        } else {
                            to_biggest.push(merged);
                        }
                    }
                }
            }

            if !has_merged && !full_only {
                to_biggest.push(m1);
            } else {
                to_smaller.push(m1);
            }
        }

        for i in demoted.into_iter().rev() {
            smaller.push(biggest.remove(i));
        }
        biggest.extend(to_biggest);
        smaller.extend(to_smaller);
    }

    trace!(
        biggest = biggest.len(),
        smaller = smaller.len(),
        strategy = %strategy,
        "graph pattern matching finished"
    );

    let mut result: BTreeSet<Match> = biggest.into_iter().collect();
    if strategy == MatchStrategy::FindAllMatches {
        result.extend(smaller);
    }
    result
}
