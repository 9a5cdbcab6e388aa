//! Bindings keyed by variable occurrence site

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{trace, warn};

use super::{Binding, BindingSet};
use crate::matching::Match;
use crate::term::{
    graph_pattern_var_nodes, GraphPattern, Position, Term, TripleNode, TriplePattern, Variable,
};

/// Cross products larger than this are logged as a warning
pub const DEFAULT_LARGE_BINDING_SET_WARNING: usize = 300_000;

// ============================================================================
// TripleVarBinding
// ============================================================================

/// A binding whose keys are occurrence sites (triple + position) instead of
/// bare variable names.
///
/// All sites of one variable carry the same value; the per-variable view is
/// kept alongside so conflicts can be detected by name.
#[derive(Clone, Default)]
pub struct TripleVarBinding {
    sites: BTreeMap<TripleNode, Term>,
    vars: BTreeMap<Variable, Term>,
}

impl TripleVarBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spread a name-keyed binding over every site of `pattern` whose
    /// variable it binds
    pub fn from_binding(pattern: &GraphPattern, binding: &Binding) -> Self {
        let mut result = Self::new();
        for triple in pattern {
            for node in triple.var_nodes() {
                let value = node.variable().and_then(|var| binding.get(var)).cloned();
                if let Some(value) = value {
                    result.put(node, value);
                }
            }
        }
        result
    }

    /// Bind a variable site. Sites holding constants are ignored.
    pub fn put(&mut self, node: TripleNode, term: Term) {
        if let Some(var) = node.variable() {
            debug_assert!(self.vars.get(var).map_or(true, |v| v == &term));
            self.vars.insert(var.clone(), term.clone());
            self.sites.insert(node, term);
        }
    }

    pub fn get(&self, node: &TripleNode) -> Option<&Term> {
        self.sites.get(node)
    }

    pub fn contains_node(&self, node: &TripleNode) -> bool {
        self.sites.contains_key(node)
    }

    /// Value of a variable at any of its sites
    pub fn var_value(&self, var: &Variable) -> Option<&Term> {
        self.vars.get(var)
    }

    pub fn contains_var(&self, var: &Variable) -> bool {
        self.vars.contains_key(var)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn sites(&self) -> impl Iterator<Item = (&TripleNode, &Term)> {
        self.sites.iter()
    }

    /// Triples that have at least one bound site
    pub fn patterns(&self) -> BTreeSet<&TriplePattern> {
        self.sites.keys().map(|n| n.pattern()).collect()
    }

    /// True when a variable is bound to different terms in the two bindings
    pub fn is_conflicting(&self, other: &TripleVarBinding) -> bool {
        let (small, large) = if self.vars.len() <= other.vars.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .vars
            .iter()
            .any(|(var, term)| large.vars.get(var).map_or(false, |t| t != term))
    }

    /// Union of two non-conflicting bindings
    pub fn merge(&self, other: &TripleVarBinding) -> TripleVarBinding {
        let mut merged = self.clone();
        for (node, term) in other.sites() {
            merged.put(node.clone(), term.clone());
        }
        merged
    }

    /// Every site of `other` is bound here to the same term
    pub fn incorporates(&self, other: &TripleVarBinding) -> bool {
        other.sites().all(|(node, term)| self.sites.get(node) == Some(term))
    }

    /// Keep only the sites that belong to `patterns`
    pub fn restrict_to(&self, patterns: &BTreeSet<&TriplePattern>) -> TripleVarBinding {
        let mut result = TripleVarBinding::new();
        for (node, term) in self.sites() {
            if patterns.contains(node.pattern()) {
                result.put(node.clone(), term.clone());
            }
        }
        result
    }

    /// Collapse sites to variable names
    pub fn to_binding(&self) -> Binding {
        self.vars.iter().map(|(v, t)| (v.clone(), t.clone())).collect()
    }
}

impl PartialEq for TripleVarBinding {
    fn eq(&self, other: &Self) -> bool {
        self.sites == other.sites
    }
}

impl Eq for TripleVarBinding {}

impl Hash for TripleVarBinding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sites.hash(state);
    }
}

impl fmt::Debug for TripleVarBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.sites.iter()).finish()
    }
}

// ============================================================================
// TripleVarBindingSet
// ============================================================================

/// A set of site-keyed bindings interpreted against one graph pattern
#[derive(Clone)]
pub struct TripleVarBindingSet {
    pattern: Arc<GraphPattern>,
    var_nodes: Arc<BTreeSet<TripleNode>>,
    bindings: IndexSet<TripleVarBinding>,
    large_warning: usize,
}

impl TripleVarBindingSet {
    pub fn new(pattern: impl Into<Arc<GraphPattern>>) -> Self {
        let pattern = pattern.into();
        let var_nodes = Arc::new(graph_pattern_var_nodes(&pattern));
        TripleVarBindingSet {
            pattern,
            var_nodes,
            bindings: IndexSet::new(),
            large_warning: DEFAULT_LARGE_BINDING_SET_WARNING,
        }
    }

    /// Interpret a name-keyed binding set against `pattern`
    pub fn from_binding_set(pattern: impl Into<Arc<GraphPattern>>, bindings: &BindingSet) -> Self {
        let mut set = Self::new(pattern);
        for binding in bindings {
            let tvb = TripleVarBinding::from_binding(&set.pattern, binding);
            set.add(tvb);
        }
        set
    }

    /// Set the cross-product size above which `combine` warns
    pub fn with_large_warning(mut self, threshold: usize) -> Self {
        self.large_warning = threshold;
        self
    }

    /// An empty set over the same pattern
    pub fn empty_like(&self) -> Self {
        TripleVarBindingSet {
            pattern: Arc::clone(&self.pattern),
            var_nodes: Arc::clone(&self.var_nodes),
            bindings: IndexSet::new(),
            large_warning: self.large_warning,
        }
    }

    pub fn pattern(&self) -> &Arc<GraphPattern> {
        &self.pattern
    }

    /// Every variable site of the pattern
    pub fn var_nodes(&self) -> &BTreeSet<TripleNode> {
        &self.var_nodes
    }

    pub fn add(&mut self, binding: TripleVarBinding) {
        self.bindings.insert(binding);
    }

    pub fn extend(&mut self, other: &TripleVarBindingSet) {
        self.bindings.extend(other.bindings.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TripleVarBinding> {
        self.bindings.iter()
    }

    pub fn contains(&self, binding: &TripleVarBinding) -> bool {
        self.bindings.contains(binding)
    }

    pub fn to_binding_set(&self) -> BindingSet {
        self.iter().map(TripleVarBinding::to_binding).collect()
    }

    /// A binding is full when it binds every variable site of the pattern
    pub fn is_full(&self, binding: &TripleVarBinding) -> bool {
        self.var_nodes.iter().all(|n| binding.contains_node(n))
    }

    /// Only the full bindings
    pub fn full_binding_set(&self) -> Self {
        self.filtered(|b| self.is_full(b))
    }

    /// Only the bindings that miss at least one site
    pub fn partial_binding_set(&self) -> Self {
        self.filtered(|b| !self.is_full(b))
    }

    fn filtered(&self, mut keep: impl FnMut(&TripleVarBinding) -> bool) -> Self {
        let mut result = self.empty_like();
        for b in self.iter() {
            if keep(b) {
                result.add(b.clone());
            }
        }
        result
    }

    /// Cross product of non-conflicting pairs. An empty `self` yields `other`.
    pub fn combine(&self, other: &TripleVarBindingSet) -> Self {
        let mut result = self.empty_like();
        if self.is_empty() {
            result.extend(other);
            return result;
        }

        let total = self.len().saturating_mul(other.len());
        if total > self.large_warning {
            warn!(
                left = self.len(),
                right = other.len(),
                total,
                "combining very large binding sets"
            );
        }

        for a in self.iter() {
            for b in other.iter() {
                if !a.is_conflicting(b) {
                    result.add(a.merge(b));
                }
            }
        }
        result
    }

    /// `combine(other)` plus every binding of `other` and of `self`
    pub fn merge(&self, other: &TripleVarBindingSet) -> Self {
        let mut result = self.combine(other);
        result.extend(other);
        result.extend(self);
        result
    }

    /// Re-express this set against `target` through every match in
    /// `matches`, whose keys are triples of this set's pattern and whose
    /// values are triples of `target`. The per-match results are unioned.
    pub fn translate<'m>(
        &self,
        target: impl Into<Arc<GraphPattern>>,
        matches: impl IntoIterator<Item = &'m Match>,
    ) -> Self {
        let mut result = TripleVarBindingSet::new(target).with_large_warning(self.large_warning);
        for m in matches {
            self.translate_into(m, &mut result);
        }
        trace!(from = self.len(), to = result.len(), "translated binding set");
        result
    }

    /// Translate through a single match
    pub fn translate_match(&self, target: impl Into<Arc<GraphPattern>>, m: &Match) -> Self {
        self.translate(target, std::iter::once(m))
    }

    fn translate_into(&self, m: &Match, into: &mut TripleVarBindingSet) {
        for from_b in self.iter() {
            if let Some(to_b) = translate_binding(from_b, m) {
                into.add(to_b);
            }
        }
    }

    /// Keep bindings that do not conflict with at least one binding of
    /// `other`. An empty `other`, or an empty binding in it, keeps all.
    pub fn keep_compatible(&self, other: &TripleVarBindingSet) -> Self {
        if other.is_empty() || other.iter().any(TripleVarBinding::is_empty) {
            return self.clone();
        }
        self.filtered(|b| other.iter().any(|o| !b.is_conflicting(o)))
    }

    /// Full bindings that incorporate at least one of `triggers`
    pub fn keep_full_incorporating(&self, triggers: &TripleVarBindingSet) -> Self {
        self.filtered(|b| self.is_full(b) && triggers.iter().any(|t| b.incorporates(t)))
    }

    /// Add, for every binding, its restriction to each non-empty subset of
    /// the triples it touches.
    ///
    /// This lets a consumer that only matched part of a producer's pattern
    /// find a compatible partial binding.
    pub fn with_partial_bindings(&self) -> Self {
        let mut result = self.clone();
        for b in self.iter() {
            let triples: Vec<&TriplePattern> = b.patterns().into_iter().collect();
            for subset in subsets(&triples) {
                if subset.is_empty() {
                    continue;
                }
                let restricted = b.restrict_to(&subset);
                if !restricted.is_empty() {
                    result.add(restricted);
                }
            }
        }
        result
    }

    /// Restrict every binding to each subset of `patterns`, the empty subset
    /// included.
    pub fn restrictions_over(&self, patterns: &BTreeSet<&TriplePattern>) -> Self {
        let triples: Vec<&TriplePattern> = patterns.iter().copied().collect();
        let all = subsets(&triples);
        let mut result = self.empty_like();
        for b in self.iter() {
            for subset in &all {
                result.add(b.restrict_to(subset));
            }
        }
        result
    }

    /// Markdown table with one column per binding and one row per triple
    pub fn debug_table(&self) -> String {
        let bindings: Vec<&TripleVarBinding> = self.iter().collect();
        let mut table = String::from("| Graph Pattern |");
        for i in 0..bindings.len() {
            table.push_str(&format!(" Binding-{} |", i));
        }
        table.push('\n');
        table.push('|');
        for _ in 0..=bindings.len() {
            table.push_str("-------|");
        }
        table.push('\n');

        for triple in self.pattern.iter() {
            table.push_str(&format!("| {} |", triple));
            for b in &bindings {
                if b.patterns().contains(triple) {
                    let cells: Vec<String> = Position::ALL
                        .iter()
                        .map(|p| {
                            b.get(&triple.node(*p))
                                .map(|t| t.to_string())
                                .unwrap_or_else(|| triple.get(*p).to_string())
                        })
                        .collect();
                    table.push_str(&format!(" {} |", cells.join(" ")));
                } else {
                    table.push_str("  |");
                }
            }
            table.push('\n');
        }
        table
    }
}

/// Map one binding through one match; `None` when the binding contradicts
/// a constant or a previously translated value.
fn translate_binding(from_b: &TripleVarBinding, m: &Match) -> Option<TripleVarBinding> {
    let mut to_b = TripleVarBinding::new();

    for (from_triple, to_triple) in m.patterns() {
        let mapping = match from_triple.find_matches(to_triple) {
            Some(mapping) => mapping,
            None => continue,
        };

        for (from_node, to_node) in &mapping {
            match (from_node.variable(), to_node.variable()) {
                (Some(_), Some(to_var)) => {
                    if let Some(value) = from_b.get(from_node) {
                        let current = to_b.var_value(to_var);
                        if !to_b.contains_node(to_node) && current.map_or(true, |c| c == value) {
                            to_b.put(to_node.clone(), value.clone());
                        } else if current.map_or(false, |c| c != value) {
                            return None;
                        }
                    }
                }
                (Some(_), None) => {
                    if let Some(value) = from_b.get(from_node) {
                        if value != to_node.term() {
                            return None;
                        }
                    }
                }
                (None, Some(to_var)) => {
                    if let Some(current) = to_b.var_value(to_var) {
                        if current != from_node.term() {
                            return None;
                        }
                    }
                    to_b.put(to_node.clone(), from_node.term().clone());
                }
                (None, None) => {}
            }
        }
    }

    Some(to_b)
}

/// Every subset of `items`, the empty one first
fn subsets<'a>(items: &[&'a TriplePattern]) -> Vec<BTreeSet<&'a TriplePattern>> {
    let mut result = vec![BTreeSet::new()];
    for item in items {
        let extended: Vec<BTreeSet<&TriplePattern>> = result
            .iter()
            .map(|s| {
                let mut s = s.clone();
                s.insert(*item);
                s
            })
            .collect();
        result.extend(extended);
    }
    result
}

impl PartialEq for TripleVarBindingSet {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.bindings == other.bindings
    }
}

impl fmt::Debug for TripleVarBindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.bindings.iter()).finish()
    }
}

impl fmt::Display for TripleVarBindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binding_set())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{matches, MatchStrategy};
    use crate::parser::{parse_binding_set, parse_graph_pattern, ParserState};

    fn gp(text: &str) -> GraphPattern {
        parse_graph_pattern(text, &ParserState::new()).unwrap()
    }

    fn bs(text: &str) -> BindingSet {
        parse_binding_set(text, &ParserState::new()).unwrap()
    }

    #[test]
    fn test_from_binding_set_fills_every_site() {
        let pattern = gp("?a <type> <Sensor> . ?a <hasValInC> ?b");
        let set = TripleVarBindingSet::from_binding_set(pattern, &bs("a=<sensor1>,b=\"22\""));

        assert_eq!(set.var_nodes().len(), 3);
        let binding = set.iter().next().unwrap();
        assert_eq!(binding.len(), 3);
        assert!(set.is_full(binding));
    }

    #[test]
    fn test_empty_binding_stays_empty() {
        let pattern = gp("?x <isAncestorOf> ?y");
        let set = TripleVarBindingSet::from_binding_set(pattern, &BindingSet::singleton(Binding::new()));
        assert_eq!(set.len(), 1);
        assert!(set.iter().next().unwrap().is_empty());
        assert!(set.full_binding_set().is_empty());
        assert_eq!(set.partial_binding_set().len(), 1);
    }

    #[test]
    fn test_merge_cross_product_skips_conflicts() {
        let pattern = gp("?x <isParentOf> ?y . ?y <isParentOf> ?z");
        let left = TripleVarBindingSet::from_binding_set(pattern.clone(), &bs("x=<janny>,y=<barry>"));
        let right = TripleVarBindingSet::from_binding_set(
            pattern,
            &bs("y=<barry>,z=<fenna> | y=<fenna>,z=<benno>"),
        );

        let combined = left.combine(&right);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined.full_binding_set().len(), 1);

        // combine + both inputs
        let merged = left.merge(&right);
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn test_combine_with_empty_self_yields_other() {
        let pattern = gp("?x <p> ?y");
        let empty = TripleVarBindingSet::new(pattern.clone());
        let other = TripleVarBindingSet::from_binding_set(pattern, &bs("x=<a>,y=<b>"));
        assert_eq!(empty.combine(&other).len(), 1);
    }

    #[test]
    fn test_translate_with_identity_match_is_idempotent() {
        let pattern = gp("?a <type> <Sensor> . ?a <hasValInC> ?b");
        let set = TripleVarBindingSet::from_binding_set(
            pattern.clone(),
            &bs("a=<sensor1>,b=\"22\" | a=<sensor2>,b=\"21\""),
        );
        let identity = matches(&pattern, &pattern, MatchStrategy::FindOnlyFullMatches);
        assert_eq!(identity.len(), 1);

        let translated = set.translate(pattern, &identity);
        assert_eq!(translated, set);
    }

    #[test]
    fn test_translate_renames_variables() {
        let goal = gp("?p <type> <Sensor> . ?p <hasValInC> ?q");
        let data = gp("?a <type> <Sensor> . ?a <hasValInC> ?b");
        let found = matches(&data, &goal, MatchStrategy::FindOnlyBiggestMatches);

        let set = TripleVarBindingSet::from_binding_set(data, &bs("a=<sensor1>,b=\"22\""));
        let translated = set.translate(goal, &found).to_binding_set();

        let binding = translated.iter().next().unwrap();
        assert_eq!(binding.get_by_name("p"), Some(&Term::uri("sensor1")));
        assert_eq!(binding.get_by_name("q"), Some(&Term::literal("22")));
    }

    #[test]
    fn test_translate_drops_bindings_contradicting_constants() {
        let consumer = gp("<barry> <isGrandParentOf> ?z");
        let producer = gp("?x <isGrandParentOf> ?z");
        let found = matches(&producer, &consumer, MatchStrategy::FindOnlyBiggestMatches);

        let set = TripleVarBindingSet::from_binding_set(
            producer,
            &bs("x=<fenna>,z=<loes> | x=<barry>,z=<benno>"),
        );
        let translated = set.translate(consumer, &found).to_binding_set();
        assert_eq!(translated.len(), 1);
        assert_eq!(translated.iter().next().unwrap().get_by_name("z"), Some(&Term::uri("benno")));
    }

    #[test]
    fn test_translate_fills_in_constants() {
        let producer = gp("?s <type> <Sensor>");
        let consumer = gp("?x <type> ?t");
        let found = matches(&producer, &consumer, MatchStrategy::FindOnlyBiggestMatches);

        let set = TripleVarBindingSet::from_binding_set(producer, &bs("s=<sensor1>"));
        let translated = set.translate(consumer, &found).to_binding_set();
        let binding = translated.iter().next().unwrap();
        assert_eq!(binding.get_by_name("t"), Some(&Term::uri("Sensor")));
    }

    #[test]
    fn test_keep_compatible() {
        let pattern = gp("?x <p> ?y");
        let set = TripleVarBindingSet::from_binding_set(pattern.clone(), &bs("x=<a>,y=<b> | x=<c>,y=<d>"));
        let filter = TripleVarBindingSet::from_binding_set(pattern.clone(), &bs("x=<a>"));
        assert_eq!(set.keep_compatible(&filter).len(), 1);

        let empty = TripleVarBindingSet::new(pattern.clone());
        assert_eq!(set.keep_compatible(&empty).len(), 2);

        let anything = TripleVarBindingSet::from_binding_set(pattern, &BindingSet::singleton(Binding::new()));
        assert_eq!(set.keep_compatible(&anything).len(), 2);
    }

    #[test]
    fn test_partial_bindings_cover_every_subset() {
        let pattern = gp("?s <isIn> ?z . ?s <hasV> ?v");
        let set = TripleVarBindingSet::from_binding_set(pattern, &bs("s=<sensor1>,z=<douche>,v=\"21\""));

        // the full binding plus one restriction per single triple
        let enriched = set.with_partial_bindings();
        assert_eq!(enriched.len(), 3);
        assert_eq!(enriched.full_binding_set().len(), 1);
    }

    #[test]
    fn test_restrictions_include_empty_binding() {
        let pattern = gp("?s <isIn> ?z . ?s <hasV> ?v");
        let set = TripleVarBindingSet::from_binding_set(pattern.clone(), &bs("z=<badkamer>"));
        let triples: BTreeSet<&TriplePattern> = pattern.iter().collect();

        let relaxed = set.restrictions_over(&triples);
        assert_eq!(relaxed.len(), 2);
        assert!(relaxed.iter().any(|b| b.is_empty()));
    }

    #[test]
    fn test_keep_full_incorporating() {
        let pattern = gp("?x <isParentOf> ?y . ?y <isParentOf> ?z");
        let full = TripleVarBindingSet::from_binding_set(
            pattern.clone(),
            &bs("x=<janny>,y=<barry>,z=<fenna> | x=<barry>,y=<fenna>,z=<benno>"),
        );
        let trigger = TripleVarBindingSet::from_binding_set(pattern, &bs("x=<janny>,y=<barry>"));

        let kept = full.keep_full_incorporating(&trigger);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_debug_table_lists_triples() {
        let pattern = gp("?x <p> ?y");
        let set = TripleVarBindingSet::from_binding_set(pattern, &bs("x=<a>,y=<b>"));
        let table = set.debug_table();
        assert!(table.contains("Binding-0"));
        assert!(table.contains("<a> <p> <b>"));
    }
}
