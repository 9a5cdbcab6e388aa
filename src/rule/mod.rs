//! Rules: an antecedent graph pattern, a consequent graph pattern and the
//! handler that maps bindings of one onto bindings of the other.

mod handler;

pub use handler::{
    BindingSetHandler, CollectingSinkHandler, SinkBindingSetHandler, Table, TableBindingSetHandler,
    TransformBindingSetHandler, TrivialBindingSetHandler,
};

use std::fmt;
use std::sync::Arc;

use crate::binding::BindingSet;
use crate::error::{ErrorCode, ReasonerError, ReasonerResult};
use crate::term::{format_graph_pattern, GraphPattern, Term, TriplePattern};

/// How a rule's bindings are produced
#[derive(Clone)]
pub enum Handler {
    /// Antecedent bindings in, consequent bindings out
    Transform(Arc<dyn BindingSetHandler>),
    /// Antecedent bindings in, nothing out
    Sink(Arc<dyn SinkBindingSetHandler>),
}

/// Whether a rule starts a reasoning process or takes part in one
#[derive(Clone)]
pub enum RuleKind {
    /// The goal or premise of a plan. Has no handler of its own.
    Proactive,
    Standard(Handler),
}

/// An immutable rule
#[derive(Clone)]
pub struct Rule {
    name: Option<String>,
    antecedent: Arc<GraphPattern>,
    consequent: Arc<GraphPattern>,
    kind: RuleKind,
}

impl Rule {
    /// A rule whose consequent variables are copied from the antecedent
    pub fn new(antecedent: GraphPattern, consequent: GraphPattern) -> ReasonerResult<Self> {
        let handler = TrivialBindingSetHandler::new(&consequent);
        Self::with_handler(antecedent, consequent, handler)
    }

    /// A rule with a custom transform handler
    pub fn with_handler(
        antecedent: GraphPattern,
        consequent: GraphPattern,
        handler: impl BindingSetHandler + 'static,
    ) -> ReasonerResult<Self> {
        Self::with_shared_handler(antecedent, consequent, Arc::new(handler))
    }

    /// Like [`Rule::with_handler`] for a handler shared between rules
    pub fn with_shared_handler(
        antecedent: GraphPattern,
        consequent: GraphPattern,
        handler: Arc<dyn BindingSetHandler>,
    ) -> ReasonerResult<Self> {
        check_not_empty(&antecedent, &consequent)?;
        if consequent.is_empty() {
            return Err(ReasonerError::new(
                ErrorCode::MissingHandler,
                "A rule without a consequent needs a sink handler",
            )
            .with_context("antecedent", format_graph_pattern(&antecedent)));
        }
        Ok(Self::build(antecedent, consequent, RuleKind::Standard(Handler::Transform(handler))))
    }

    /// A rule with no consequent whose handler receives the antecedent bindings
    pub fn sink(
        antecedent: GraphPattern,
        handler: impl SinkBindingSetHandler + 'static,
    ) -> ReasonerResult<Self> {
        Self::shared_sink(antecedent, Arc::new(handler))
    }

    pub fn shared_sink(
        antecedent: GraphPattern,
        handler: Arc<dyn SinkBindingSetHandler>,
    ) -> ReasonerResult<Self> {
        check_not_empty(&antecedent, &GraphPattern::new())?;
        Ok(Self::build(antecedent, GraphPattern::new(), RuleKind::Standard(Handler::Sink(handler))))
    }

    /// The start rule of a plan: a goal (antecedent only) or a premise
    /// (consequent only)
    pub fn proactive(antecedent: GraphPattern, consequent: GraphPattern) -> ReasonerResult<Self> {
        check_not_empty(&antecedent, &consequent)?;
        Ok(Self::build(antecedent, consequent, RuleKind::Proactive))
    }

    fn build(antecedent: GraphPattern, consequent: GraphPattern, kind: RuleKind) -> Self {
        Rule {
            name: None,
            antecedent: Arc::new(antecedent),
            consequent: Arc::new(consequent),
            kind,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The explicit name, or a short one generated from the patterns
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => generate_name(self),
        }
    }

    pub fn antecedent(&self) -> &Arc<GraphPattern> {
        &self.antecedent
    }

    pub fn consequent(&self) -> &Arc<GraphPattern> {
        &self.consequent
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    pub fn is_proactive(&self) -> bool {
        matches!(self.kind, RuleKind::Proactive)
    }

    pub fn is_sink(&self) -> bool {
        matches!(self.kind, RuleKind::Standard(Handler::Sink(_)))
    }

    /// Run the rule's handler. Sinks yield an empty binding set.
    pub async fn invoke(&self, bindings: BindingSet) -> ReasonerResult<BindingSet> {
        match &self.kind {
            RuleKind::Proactive => Err(ReasonerError::new(
                ErrorCode::UnexpectedState,
                "Proactive rules have no handler to invoke",
            )
            .with_context("rule", self.display_name())),
            RuleKind::Standard(Handler::Transform(handler)) => handler.handle(bindings).await,
            RuleKind::Standard(Handler::Sink(handler)) => {
                handler.handle(bindings).await?;
                Ok(BindingSet::new())
            }
        }
    }
}

fn check_not_empty(antecedent: &GraphPattern, consequent: &GraphPattern) -> ReasonerResult<()> {
    if antecedent.is_empty() && consequent.is_empty() {
        return Err(ReasonerError::empty_rule());
    }
    Ok(())
}

/// Short, recognisable name: the class of `type` triples, otherwise the
/// constant parts of each triple.
pub fn generate_name(rule: &Rule) -> String {
    let side = |pattern: &GraphPattern| {
        pattern
            .iter()
            .map(triple_name)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let antecedent = side(&rule.antecedent);
    let consequent = side(&rule.consequent);
    match (antecedent.is_empty(), consequent.is_empty()) {
        (true, _) => format!("-> {}", consequent),
        (_, true) => format!("{} ->", antecedent),
        _ => format!("{} -> {}", antecedent, consequent),
    }
}

fn triple_name(triple: &TriplePattern) -> String {
    let is_type = triple
        .predicate()
        .as_uri()
        .map_or(false, |u| u.as_str().contains("type"));
    if is_type && !triple.object().is_variable() {
        return short_term(triple.object());
    }

    let parts: Vec<String> = [triple.subject(), triple.predicate(), triple.object()]
        .into_iter()
        .filter(|t| !t.is_variable())
        .map(short_term)
        .collect();
    if parts.is_empty() {
        "unknown".to_string()
    } else {
        parts.join(" ")
    }
}

fn short_term(term: &Term) -> String {
    match term {
        Term::Uri(uri) => uri.local_name().to_string(),
        other => other.to_string(),
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            RuleKind::Proactive => "proactive",
            RuleKind::Standard(Handler::Transform(_)) => "transform",
            RuleKind::Standard(Handler::Sink(_)) => "sink",
        };
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("antecedent", &format_graph_pattern(&self.antecedent))
            .field("consequent", &format_graph_pattern(&self.consequent))
            .finish()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            format_graph_pattern(&self.antecedent),
            format_graph_pattern(&self.consequent)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::parser::{parse_graph_pattern, ParserState};

    fn gp(text: &str) -> GraphPattern {
        parse_graph_pattern(text, &ParserState::new()).unwrap()
    }

    #[test]
    fn test_empty_rule_rejected() {
        let err = Rule::new(GraphPattern::new(), GraphPattern::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyRule);

        let err = Rule::proactive(GraphPattern::new(), GraphPattern::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyRule);
    }

    #[test]
    fn test_missing_consequent_needs_sink() {
        let err = Rule::new(gp("?x <p> ?y"), GraphPattern::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingHandler);

        let rule = Rule::sink(gp("?x <p> ?y"), CollectingSinkHandler::new()).unwrap();
        assert!(rule.is_sink());
        assert!(rule.consequent().is_empty());
    }

    #[test]
    fn test_generated_names() {
        let rule = Rule::new(gp("?s <type> <Sensor>"), gp("?s <type> <Device>")).unwrap();
        assert_eq!(rule.display_name(), "Sensor -> Device");

        let data = Rule::proactive(GraphPattern::new(), gp("?x <isParentOf> ?y")).unwrap();
        assert_eq!(data.display_name(), "-> isParentOf");

        let named = Rule::new(gp("?a <p> ?b"), gp("?b <q> ?a")).unwrap().named("swap");
        assert_eq!(named.display_name(), "swap");
        assert_eq!(named.name(), Some("swap"));
    }

    #[tokio::test]
    async fn test_invoke_dispatches_on_kind() {
        let rule = Rule::new(gp("?x <isParentOf> ?y"), gp("?x <isAncestorOf> ?y")).unwrap();
        let input = BindingSet::singleton(
            Binding::new().with("x", Term::uri("barry")).with("y", Term::uri("fenna")),
        );
        let out = rule.invoke(input.clone()).await.unwrap();
        assert_eq!(out, input);

        let sink = CollectingSinkHandler::new();
        let rule = Rule::sink(gp("?x <isParentOf> ?y"), sink.clone()).unwrap();
        assert!(rule.invoke(input.clone()).await.unwrap().is_empty());
        assert_eq!(sink.received().await, vec![input.clone()]);

        let goal = Rule::proactive(gp("?x <isParentOf> ?y"), GraphPattern::new()).unwrap();
        assert!(goal.invoke(input).await.is_err());
    }
}
