//! Bindings and binding sets
//!
//! A [`Binding`] assigns terms to variables by name; a [`BindingSet`] is a
//! deterministic, insertion-ordered set of them. This is the currency that
//! flows in and out of rule handlers.
//!
//! The reasoner itself works on [`TripleVarBindingSet`], which keys every
//! value by its occurrence site in a graph pattern so that two triples
//! sharing a variable name can be checked against each other.

mod triple_var;

pub use triple_var::{
    TripleVarBinding, TripleVarBindingSet, DEFAULT_LARGE_BINDING_SET_WARNING,
};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexSet;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::term::{Term, Variable};

/// One assignment of terms to variables
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Binding {
    values: BTreeMap<Variable, Term>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for literals in code and tests
    pub fn with(mut self, name: &str, term: Term) -> Self {
        self.insert(Variable::new(name), term);
        self
    }

    pub fn insert(&mut self, var: Variable, term: Term) -> Option<Term> {
        self.values.insert(var, term)
    }

    pub fn get(&self, var: &Variable) -> Option<&Term> {
        self.values.get(var)
    }

    /// Look up a variable by name
    pub fn get_by_name(&self, name: &str) -> Option<&Term> {
        self.values.get(&Variable::new(name))
    }

    pub fn contains(&self, var: &Variable) -> bool {
        self.values.contains_key(var)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.values.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.values.keys()
    }

    /// True when no shared variable is bound to two different terms
    pub fn is_compatible(&self, other: &Binding) -> bool {
        let (small, large) = if self.len() <= other.len() { (self, other) } else { (other, self) };
        small
            .iter()
            .all(|(var, term)| large.get(var).map_or(true, |t| t == term))
    }

    /// Union of two compatible bindings; `None` on conflict
    pub fn merge(&self, other: &Binding) -> Option<Binding> {
        if !self.is_compatible(other) {
            return None;
        }
        let mut merged = self.clone();
        for (var, term) in other.iter() {
            merged.values.entry(var.clone()).or_insert_with(|| term.clone());
        }
        Some(merged)
    }

    /// Keep only the given variables
    pub fn restrict_to(&self, vars: &BTreeSet<Variable>) -> Binding {
        self.values
            .iter()
            .filter(|(var, _)| vars.contains(*var))
            .map(|(var, term)| (var.clone(), term.clone()))
            .collect()
    }
}

impl FromIterator<(Variable, Term)> for Binding {
    fn from_iter<I: IntoIterator<Item = (Variable, Term)>>(iter: I) -> Self {
        Binding { values: iter.into_iter().collect() }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, term)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", var, term)?;
        }
        write!(f, "}}")
    }
}

impl Serialize for Binding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (var, term) in &self.values {
            map.serialize_entry(var.name(), &term.to_string())?;
        }
        map.end()
    }
}

/// A set of bindings with deterministic iteration order
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BindingSet {
    bindings: IndexSet<Binding>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding exactly one binding
    pub fn singleton(binding: Binding) -> Self {
        let mut set = Self::new();
        set.insert(binding);
        set
    }

    /// Returns false if the binding was already present
    pub fn insert(&mut self, binding: Binding) -> bool {
        self.bindings.insert(binding)
    }

    pub fn contains(&self, binding: &Binding) -> bool {
        self.bindings.contains(binding)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    /// Add every binding of `other`
    pub fn union_with(&mut self, other: &BindingSet) {
        self.bindings.extend(other.iter().cloned());
    }

    /// Bindings in `self` that are not in `other`
    pub fn difference(&self, other: &BindingSet) -> BindingSet {
        self.iter().filter(|b| !other.contains(b)).cloned().collect()
    }

    /// Conjunctive cross product: every compatible pair merged
    pub fn merge(&self, other: &BindingSet) -> BindingSet {
        let mut result = BindingSet::new();
        for a in self.iter() {
            for b in other.iter() {
                if let Some(merged) = a.merge(b) {
                    result.insert(merged);
                }
            }
        }
        result
    }

    pub fn retain(&mut self, keep: impl FnMut(&Binding) -> bool) {
        self.bindings.retain(keep);
    }

    /// Bindings compatible with at least one binding of `filter`. An empty
    /// filter, or one holding the empty binding, keeps everything.
    pub fn keep_compatible(&self, filter: &BindingSet) -> BindingSet {
        if filter.is_empty() || filter.iter().any(Binding::is_empty) {
            return self.clone();
        }
        self.iter()
            .filter(|b| filter.iter().any(|f| b.is_compatible(f)))
            .cloned()
            .collect()
    }

    /// Bindings sorted by their terms, for stable output
    pub fn sorted(&self) -> Vec<&Binding> {
        let mut sorted: Vec<&Binding> = self.iter().collect();
        sorted.sort();
        sorted
    }

    /// Convert to a JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "[]".to_string())
    }
}

impl FromIterator<Binding> for BindingSet {
    fn from_iter<I: IntoIterator<Item = Binding>>(iter: I) -> Self {
        BindingSet { bindings: iter.into_iter().collect() }
    }
}

impl Extend<Binding> for BindingSet {
    fn extend<I: IntoIterator<Item = Binding>>(&mut self, iter: I) {
        self.bindings.extend(iter);
    }
}

impl IntoIterator for BindingSet {
    type Item = Binding;
    type IntoIter = indexmap::set::IntoIter<Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.into_iter()
    }
}

impl<'a> IntoIterator for &'a BindingSet {
    type Item = &'a Binding;
    type IntoIter = indexmap::set::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

impl fmt::Debug for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.bindings.iter()).finish()
    }
}

impl fmt::Display for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for binding in self.sorted() {
            writeln!(f, "{}", binding)?;
        }
        Ok(())
    }
}

impl Serialize for BindingSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.bindings.len()))?;
        for binding in self.sorted() {
            seq.serialize_element(binding)?;
        }
        seq.end()
    }
}
