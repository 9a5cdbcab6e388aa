//! RDF terms and triple patterns
//!
//! This module defines the data types the reasoner unifies and binds:
//! - IRIs (named nodes)
//! - Literals (with optional datatype or language tag)
//! - Variables
//! - Triple patterns, their variable occurrence sites and graph patterns

use std::fmt;
use std::sync::Arc;

pub mod uri;
mod literal;
mod variable;
mod pattern;

pub use uri::Uri;
pub use literal::{Literal, Datatype};
pub use variable::Variable;
pub use pattern::{
    GraphPattern, Position, TripleNode, TriplePattern, NodeMapping,
    graph_pattern_variables, graph_pattern_var_nodes, format_graph_pattern,
};

/// A term in a triple pattern
///
/// Terms are totally ordered so that patterns and bindings iterate
/// deterministically.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// An IRI reference (named node)
    Uri(Arc<Uri>),
    /// A literal value
    Literal(Arc<Literal>),
    /// A variable
    Variable(Variable),
}

impl Term {
    /// Create an IRI term
    pub fn uri(s: impl Into<String>) -> Self {
        Term::Uri(Arc::new(Uri::new(s.into())))
    }

    /// Create a plain literal
    pub fn literal(s: impl Into<String>) -> Self {
        Term::Literal(Arc::new(Literal::plain(s.into())))
    }

    /// Create a typed literal
    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal(Arc::new(Literal::typed(value.into(), datatype.into())))
    }

    /// Create a language-tagged literal
    pub fn lang_literal(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Term::Literal(Arc::new(Literal::with_language(value.into(), lang.into())))
    }

    /// Create an `xsd:float` literal
    pub fn float(value: f64) -> Self {
        Term::Literal(Arc::new(Literal::float(value)))
    }

    /// Create a variable
    pub fn var(name: impl AsRef<str>) -> Self {
        Term::Variable(Variable::new(name))
    }

    /// Check if this term is a variable
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Check if this term is ground (not a variable)
    pub fn is_ground(&self) -> bool {
        !self.is_variable()
    }

    /// Get the variable if this is a variable term
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Get the IRI if this is an IRI term
    pub fn as_uri(&self) -> Option<&Uri> {
        match self {
            Term::Uri(u) => Some(u),
            _ => None,
        }
    }

    /// Get the literal if this is a literal term
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(l) => Some(l),
            _ => None,
        }
    }
}

impl From<Variable> for Term {
    fn from(v: Variable) -> Self {
        Term::Variable(v)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uri(u) => write!(f, "{}", u),
            Term::Literal(l) => write!(f, "{}", l),
            Term::Variable(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_creation() {
        let uri = Term::uri("http://example.org/sensor1");
        assert!(matches!(uri, Term::Uri(_)));
        assert!(uri.is_ground());

        let lit = Term::literal("hello");
        assert!(matches!(lit, Term::Literal(_)));

        let var = Term::var("x");
        assert!(var.is_variable());
        assert_eq!(var.as_variable().map(|v| v.name()), Some("x"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Term::uri("type").to_string(), "<type>");
        assert_eq!(Term::var("p").to_string(), "?p");
        assert_eq!(
            Term::typed_literal("22.0", uri::ns::XSD_FLOAT).to_string(),
            "\"22.0\"^^<http://www.w3.org/2001/XMLSchema#float>"
        );
    }

    #[test]
    fn test_terms_are_ordered() {
        let mut terms = vec![Term::var("a"), Term::literal("x"), Term::uri("b")];
        terms.sort();
        assert!(matches!(terms[0], Term::Uri(_)));
        assert!(matches!(terms[2], Term::Variable(_)));
    }
}
