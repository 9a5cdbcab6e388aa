//! Triple patterns and variable occurrence sites

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::{Term, Variable};

/// Position of a term within a triple pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Position {
    Subject,
    Predicate,
    Object,
}

impl Position {
    pub const ALL: [Position; 3] = [Position::Subject, Position::Predicate, Position::Object];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Subject => "subject",
            Position::Predicate => "predicate",
            Position::Object => "object",
        }
    }
}

/// A (subject, predicate, object) pattern where any position may be a variable
///
/// Equality is structural: two patterns with the same three terms are the
/// same pattern, regardless of which rule they came from.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriplePattern {
    subject: Term,
    predicate: Term,
    object: Term,
}

/// A set of triple patterns, read conjunctively
pub type GraphPattern = BTreeSet<TriplePattern>;

/// Site-to-site mapping induced by unifying two triple patterns
pub type NodeMapping = BTreeMap<TripleNode, TripleNode>;

impl TriplePattern {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        TriplePattern { subject, predicate, object }
    }

    pub fn subject(&self) -> &Term {
        &self.subject
    }

    pub fn predicate(&self) -> &Term {
        &self.predicate
    }

    pub fn object(&self) -> &Term {
        &self.object
    }

    /// Get the term at a position
    pub fn get(&self, position: Position) -> &Term {
        match position {
            Position::Subject => &self.subject,
            Position::Predicate => &self.predicate,
            Position::Object => &self.object,
        }
    }

    /// Iterate over (position, term) pairs
    pub fn terms(&self) -> impl Iterator<Item = (Position, &Term)> {
        Position::ALL.into_iter().map(move |p| (p, self.get(p)))
    }

    /// Check if this pattern contains any variables
    pub fn has_variables(&self) -> bool {
        self.terms().any(|(_, t)| t.is_variable())
    }

    /// All variables occurring in this pattern
    pub fn variables(&self) -> BTreeSet<Variable> {
        self.terms()
            .filter_map(|(_, t)| t.as_variable().cloned())
            .collect()
    }

    /// The occurrence site of the term at `position`
    pub fn node(&self, position: Position) -> TripleNode {
        TripleNode::new(self.clone(), self.get(position).clone(), position)
    }

    /// Occurrence sites of every variable in this pattern
    pub fn var_nodes(&self) -> Vec<TripleNode> {
        self.terms()
            .filter(|(_, t)| t.is_variable())
            .map(|(p, _)| self.node(p))
            .collect()
    }

    /// Unify this pattern with `other`, position by position.
    ///
    /// Wherever either side holds a variable the two occurrence sites are
    /// paired up. Constants facing constants must be equal. A variable that
    /// appears more than once must face the same constant everywhere.
    /// Returns `None` when the patterns cannot describe the same triple.
    pub fn find_matches(&self, other: &TriplePattern) -> Option<NodeMapping> {
        let mut mapping = NodeMapping::new();
        let mut ours: BTreeMap<&Variable, &Term> = BTreeMap::new();
        let mut theirs: BTreeMap<&Variable, &Term> = BTreeMap::new();

        for position in Position::ALL {
            let mine = self.get(position);
            let other_term = other.get(position);

            match (mine, other_term) {
                (Term::Variable(v), t) | (t, Term::Variable(v)) if t.is_ground() => {
                    let seen = if mine.is_variable() { &mut ours } else { &mut theirs };
                    if let Some(previous) = seen.insert(v, t) {
                        if previous != t {
                            return None;
                        }
                    }
                }
                (Term::Variable(_), Term::Variable(_)) => {}
                (a, b) => {
                    if a != b {
                        return None;
                    }
                    continue;
                }
            }

            mapping.insert(self.node(position), other.node(position));
        }

        Some(mapping)
    }
}

impl fmt::Debug for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// One occurrence site of a term: a triple pattern plus a position in it.
///
/// Identity is (pattern, position); the term is carried along for
/// convenience and is always the term found at that position.
#[derive(Clone)]
pub struct TripleNode {
    pattern: TriplePattern,
    term: Term,
    position: Position,
}

impl TripleNode {
    pub fn new(pattern: TriplePattern, term: Term, position: Position) -> Self {
        TripleNode { pattern, term, position }
    }

    pub fn pattern(&self) -> &TriplePattern {
        &self.pattern
    }

    pub fn term(&self) -> &Term {
        &self.term
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// The variable at this site, if any
    pub fn variable(&self) -> Option<&Variable> {
        self.term.as_variable()
    }
}

impl PartialEq for TripleNode {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position && self.pattern == other.pattern
    }
}

impl Eq for TripleNode {}

impl Hash for TripleNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
        self.position.hash(state);
    }
}

impl PartialOrd for TripleNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TripleNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pattern
            .cmp(&other.pattern)
            .then(self.position.cmp(&other.position))
    }
}

impl fmt::Debug for TripleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@[{}]", self.term, self.pattern)
    }
}

impl fmt::Display for TripleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.term)
    }
}

/// All variables of a graph pattern
pub fn graph_pattern_variables(pattern: &GraphPattern) -> BTreeSet<Variable> {
    pattern.iter().flat_map(|tp| tp.variables()).collect()
}

/// All variable occurrence sites of a graph pattern
pub fn graph_pattern_var_nodes(pattern: &GraphPattern) -> BTreeSet<TripleNode> {
    pattern.iter().flat_map(|tp| tp.var_nodes()).collect()
}

/// Render a graph pattern as ` . ` separated triples
pub fn format_graph_pattern(pattern: &GraphPattern) -> String {
    pattern
        .iter()
        .map(|tp| tp.to_string())
        .collect::<Vec<_>>()
        .join(" . ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tp(s: Term, p: &str, o: Term) -> TriplePattern {
        TriplePattern::new(s, Term::uri(p), o)
    }

    #[test]
    fn test_variables() {
        let t = tp(Term::var("s"), "type", Term::var("t"));
        assert_eq!(t.variables().len(), 2);
        assert_eq!(t.var_nodes().len(), 2);
        assert!(t.has_variables());
    }

    #[test]
    fn test_find_matches_var_to_const() {
        let a = tp(Term::var("p"), "type", Term::var("t"));
        let b = tp(Term::var("s"), "type", Term::uri("Sensor"));

        let mapping = a.find_matches(&b).unwrap();
        assert_eq!(mapping.len(), 2);

        let object = mapping.get(&a.node(Position::Object)).unwrap();
        assert_eq!(object.term(), &Term::uri("Sensor"));
    }

    #[test]
    fn test_find_matches_constant_mismatch() {
        let a = tp(Term::var("p"), "type", Term::uri("Device"));
        let b = tp(Term::var("s"), "type", Term::uri("Sensor"));
        assert!(a.find_matches(&b).is_none());

        let c = tp(Term::var("p"), "hasValInC", Term::var("q"));
        assert!(a.find_matches(&c).is_none());
    }

    #[test]
    fn test_find_matches_repeated_variable_must_be_consistent() {
        let a = tp(Term::var("x"), "knows", Term::var("x"));
        let b = tp(Term::uri("barry"), "knows", Term::uri("fenna"));
        assert!(a.find_matches(&b).is_none());

        let c = tp(Term::uri("barry"), "knows", Term::uri("barry"));
        assert!(a.find_matches(&c).is_some());
    }

    #[test]
    fn test_triple_node_identity_ignores_term() {
        let t = tp(Term::var("s"), "type", Term::var("t"));
        let n1 = TripleNode::new(t.clone(), Term::var("s"), Position::Subject);
        let n2 = TripleNode::new(t, Term::uri("other"), Position::Subject);
        assert_eq!(n1, n2);
    }

    #[test]
    fn test_graph_pattern_helpers() {
        let mut gp = GraphPattern::new();
        gp.insert(tp(Term::var("a"), "type", Term::uri("Sensor")));
        gp.insert(tp(Term::var("a"), "hasValInC", Term::var("b")));

        assert_eq!(graph_pattern_variables(&gp).len(), 2);
        assert_eq!(graph_pattern_var_nodes(&gp).len(), 3);
        assert!(format_graph_pattern(&gp).contains(" . "));
    }
}
