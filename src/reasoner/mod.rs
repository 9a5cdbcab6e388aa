//! Backward and forward chaining over rule graph patterns
//!
//! [`Reasoner`] owns the rule store and builds plans:
//! - [`Reasoner::backward_plan`] answers a goal pattern by working back
//!   through the rules that can produce it;
//! - [`Reasoner::forward_plan`] pushes premise bindings through every rule
//!   that can consume them, ending in sink handlers.
//!
//! ```ignore
//! let mut reasoner = Reasoner::new();
//! reasoner.load_rules(RULES)?;
//! let goal = reasoner.parse_pattern("?x <isAncestorOf> ?y")?;
//! let answers = reasoner.query(goal, &BindingSet::new()).await?;
//! ```

mod node;
mod plan;
mod taskboard;

pub use node::{Direction, NeighborMap, NodeId, NodeState, ReasoningNode};
pub use plan::{PlanOptions, ReasonerPlan};
pub use taskboard::{Task, TaskBoard, TaskOutcome};

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::binding::BindingSet;
use crate::config::ReasonerConfig;
use crate::error::{ErrorCode, ReasonerResult};
use crate::parser::{parse_binding_set, parse_graph_pattern, ParserState};
use crate::reasoner_ensure;
use crate::rule::Rule;
use crate::store::{RuleId, RuleStore};
use crate::term::GraphPattern;

/// Entry point: a rule store plus the settings plans are built with
#[derive(Debug)]
pub struct Reasoner {
    store: RuleStore,
    config: ReasonerConfig,
    parser_state: ParserState,
}

impl Default for Reasoner {
    fn default() -> Self {
        Self::new()
    }
}

impl Reasoner {
    pub fn new() -> Self {
        Self::with_config(ReasonerConfig::default())
    }

    pub fn with_config(config: ReasonerConfig) -> Self {
        let parser_state = config.parser_state();
        Reasoner {
            store: RuleStore::new(),
            config,
            parser_state,
        }
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    pub fn add_rule(&mut self, rule: Rule) -> RuleId {
        self.store.add_rule(rule)
    }

    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Rule>) -> Vec<RuleId> {
        self.store.add_rules(rules)
    }

    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Arc<Rule>)> {
        self.store.rules()
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RuleStore {
        &mut self.store
    }

    /// Add the rules of a rule file, resolving prefixes from the config
    pub fn load_rules(&mut self, text: &str) -> ReasonerResult<Vec<RuleId>> {
        self.store.load_rules(text, &self.parser_state)
    }

    pub fn load_rules_from_file(&mut self, path: impl AsRef<Path>) -> ReasonerResult<Vec<RuleId>> {
        self.store.load_rules_from_file(path, &self.parser_state)
    }

    pub fn parse_pattern(&self, text: &str) -> ReasonerResult<GraphPattern> {
        Ok(parse_graph_pattern(text, &self.parser_state)?)
    }

    pub fn parse_bindings(&self, text: &str) -> ReasonerResult<BindingSet> {
        Ok(parse_binding_set(text, &self.parser_state)?)
    }

    /// Plan that collects the bindings of `goal`
    pub fn backward_plan(&mut self, goal: GraphPattern) -> ReasonerResult<ReasonerPlan> {
        reasoner_ensure!(!goal.is_empty(), ErrorCode::EmptyInput, "A goal needs at least one triple pattern");
        let start = self.store.add_rule(Rule::proactive(goal, GraphPattern::new())?.named("goal"));
        ReasonerPlan::new(&mut self.store, start, self.config.plan_options())
    }

    /// Plan that pushes bindings of `premise` to every rule that can use them
    pub fn forward_plan(&mut self, premise: GraphPattern) -> ReasonerResult<ReasonerPlan> {
        reasoner_ensure!(!premise.is_empty(), ErrorCode::EmptyInput, "A premise needs at least one triple pattern");
        let start = self.store.add_rule(Rule::proactive(GraphPattern::new(), premise)?.named("premise"));
        ReasonerPlan::new(&mut self.store, start, self.config.plan_options())
    }

    /// Build a backward plan for `goal`, run it to completion and return
    /// its results
    pub async fn query(&mut self, goal: GraphPattern, bindings: &BindingSet) -> ReasonerResult<BindingSet> {
        let mut plan = self.backward_plan(goal)?;
        plan.run(bindings).await?;
        let results = plan.get_results()?;
        info!(nodes = plan.len(), results = results.len(), "query finished");
        Ok(results)
    }

    /// Build a forward plan for `premise` and run it to completion
    pub async fn publish(&mut self, premise: GraphPattern, bindings: &BindingSet) -> ReasonerResult<ReasonerPlan> {
        let mut plan = self.forward_plan(premise)?;
        plan.run(bindings).await?;
        info!(nodes = plan.len(), "forward chaining finished");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::error::ReasonerError;
    use crate::rule::{CollectingSinkHandler, Table, TableBindingSetHandler, TransformBindingSetHandler};
    use crate::term::{Literal, Term};

    const FAMILY: [&str; 5] = [
        "<barry>,<fenna>",
        "<janny>,<barry>",
        "<fenna>,<benno>",
        "<benno>,<loes>",
        "<loes>,<hendrik>",
    ];

    fn gp(text: &str) -> GraphPattern {
        parse_graph_pattern(text, &ParserState::new()).unwrap()
    }

    fn bindings(text: &str) -> BindingSet {
        parse_binding_set(text, &ParserState::new()).unwrap()
    }

    fn data(pattern: &str, columns: &[&str], rows: &[&str]) -> Rule {
        let table = Table::new(columns, rows).unwrap();
        Rule::with_handler(GraphPattern::new(), gp(pattern), TableBindingSetHandler::new(table)).unwrap()
    }

    fn celsius_sensors() -> Rule {
        data(
            "?a <type> <Sensor> . ?a <hasValInC> ?b",
            &["a", "b"],
            &["<sensor1>,\"22.0\"^^xsd:float", "<sensor2>,\"21.0\"^^xsd:float"],
        )
    }

    fn fahrenheit_to_celsius() -> Rule {
        let convert = TransformBindingSetHandler::new(|input: BindingSet| {
            let mut output = BindingSet::new();
            for binding in &input {
                let x = binding
                    .get_by_name("x")
                    .cloned()
                    .ok_or_else(|| ReasonerError::missing_variable("x"))?;
                let f = binding
                    .get_by_name("y")
                    .and_then(Term::as_literal)
                    .and_then(Literal::as_float)
                    .ok_or_else(|| ReasonerError::missing_variable("y"))?;
                output.insert(Binding::new().with("x", x).with("z", Term::float((f - 32.0) * 5.0 / 9.0)));
            }
            Ok(output)
        });
        Rule::with_handler(gp("?x <hasValInF> ?y"), gp("?x <hasValInC> ?z"), convert).unwrap()
    }

    fn celsius_of(results: &BindingSet, sensor: &str) -> Option<f64> {
        results
            .iter()
            .find(|b| b.get_by_name("p") == Some(&Term::uri(sensor)))
            .and_then(|b| b.get_by_name("q"))
            .and_then(Term::as_literal)
            .and_then(Literal::as_float)
    }

    fn transitivity() -> Rule {
        Rule::new(
            gp("?x <isAncestorOf> ?y . ?y <isAncestorOf> ?z"),
            gp("?x <isAncestorOf> ?z"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_data_only() {
        let mut reasoner = Reasoner::new();
        reasoner.add_rule(celsius_sensors());

        let goal = gp("?p <type> <Sensor> . ?p <hasValInC> ?q");
        let results = reasoner.query(goal, &BindingSet::new()).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(celsius_of(&results, "sensor1"), Some(22.0));
    }

    #[tokio::test]
    async fn test_converted_values_join_the_answer() {
        let mut reasoner = Reasoner::new();
        reasoner.add_rules([
            celsius_sensors(),
            data(
                "?e <type> <Sensor> . ?e <hasValInF> ?f",
                &["e", "f"],
                &["<sensor3>,\"69.0\"^^xsd:float", "<sensor4>,\"71.0\"^^xsd:float"],
            ),
            fahrenheit_to_celsius(),
        ]);

        let goal = gp("?p <type> <Sensor> . ?p <hasValInC> ?q");
        let results = reasoner.query(goal, &BindingSet::new()).await.unwrap();

        assert_eq!(results.len(), 4);
        let sensor3 = celsius_of(&results, "sensor3").unwrap();
        let sensor4 = celsius_of(&results, "sensor4").unwrap();
        assert!((sensor3 - 20.5556).abs() < 1e-3);
        assert!((sensor4 - 21.6667).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_transitive_closure() {
        let mut reasoner = Reasoner::new();
        reasoner.add_rules([transitivity(), data("?a <isAncestorOf> ?b", &["a", "b"], &FAMILY)]);

        let results = reasoner
            .query(gp("?x <isAncestorOf> ?y"), &BindingSet::new())
            .await
            .unwrap();

        // every ordered pair along janny, barry, fenna, benno, loes, hendrik
        assert_eq!(results.len(), 15);
        assert!(results.contains(&Binding::new().with("x", Term::uri("janny")).with("y", Term::uri("hendrik"))));
    }

    #[tokio::test]
    async fn test_transitive_closure_with_bound_subject() {
        let mut reasoner = Reasoner::new();
        reasoner.add_rules([transitivity(), data("?a <isAncestorOf> ?b", &["a", "b"], &FAMILY)]);

        let results = reasoner
            .query(gp("?x <isAncestorOf> ?y"), &bindings("x=<benno>"))
            .await
            .unwrap();

        // loes and hendrik
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_loop_through_three_rules_inline() {
        let mut config = ReasonerConfig::new();
        config.apply_profile("debug").unwrap();
        assert!(!config.plan_options().use_task_board);

        let mut reasoner = Reasoner::with_config(config);
        reasoner.add_rules([
            Rule::new(
                gp("?x <isAncestorOf> ?y . ?y <isAncestorOf> ?z"),
                gp("?x <isSmurfOf> ?z"),
            )
            .unwrap(),
            Rule::new(gp("?x <isSmurfOf> ?y"), gp("?x <isSnorkelOf> ?y")).unwrap(),
            Rule::new(gp("?x <isSnorkelOf> ?y"), gp("?x <isAncestorOf> ?y")).unwrap(),
            data("?a <isSnorkelOf> ?b", &["a", "b"], &FAMILY),
        ]);

        let mut plan = reasoner.backward_plan(gp("?x <isAncestorOf> ?y")).unwrap();
        // handlers run inline, so nothing is ever queued
        assert!(!plan.execute(&BindingSet::new()).unwrap());
        assert!(plan.is_done());
        assert_eq!(plan.get_results().unwrap().len(), 15);
    }

    #[tokio::test]
    async fn test_partial_matches_recombine_across_producers() {
        let mut reasoner = Reasoner::new();
        reasoner.add_rules([
            data(
                "?s <isIn> ?z . ?s <hasV> ?v",
                &["s", "z", "v"],
                &[
                    "<sensor1>,<douche>,\"21.0\"^^xsd:float",
                    "<sensor2>,<glasbak>,\"15.0\"^^xsd:float",
                ],
            ),
            data("?s <isIn> ?z", &["s", "z"], &["<sensor1>,<badkamer>"]),
        ]);

        let goal = gp("?sensor <isIn> ?room . ?sensor <hasV> ?value");
        let results = reasoner.query(goal, &bindings("room=<badkamer>")).await.unwrap();

        assert_eq!(results.len(), 1);
        let answer = results.iter().next().unwrap();
        assert_eq!(answer.get_by_name("sensor"), Some(&Term::uri("sensor1")));
        assert_eq!(answer.get_by_name("room"), Some(&Term::uri("badkamer")));
    }

    #[tokio::test]
    async fn test_request_non_existing_data() {
        let mut reasoner = Reasoner::new();
        reasoner.add_rules([
            celsius_sensors(),
            Rule::new(gp("?x <type> <Sensor>"), gp("?x <type> <Device>")).unwrap(),
        ]);

        let goal = gp("?p <type> <Device> . ?p <hasValInC> ?q");
        let results = reasoner
            .query(goal, &bindings("p=<sensor1>,q=\"21\""))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_knowledge_gap_in_goal_gives_no_answers() {
        let mut reasoner = Reasoner::new();
        reasoner.add_rule(celsius_sensors());

        let mut plan = reasoner
            .backward_plan(gp("?p <type> <Sensor> . ?p <hasOwner> ?o"))
            .unwrap();
        plan.run(&BindingSet::new()).await.unwrap();

        assert!(plan.start_node().has_knowledge_gap());
        assert!(plan.get_results().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_knowledge_gap_below_goal_keeps_other_routes() {
        let mut reasoner = Reasoner::new();
        reasoner.add_rule(celsius_sensors());
        let orphan = reasoner.add_rule(
            Rule::new(
                gp("?s <hasOwner> ?o . ?s <hasRawValue> ?v"),
                gp("?s <hasValInC> ?v"),
            )
            .unwrap(),
        );

        let mut plan = reasoner
            .backward_plan(gp("?p <type> <Sensor> . ?p <hasValInC> ?q"))
            .unwrap();
        plan.run(&BindingSet::new()).await.unwrap();

        let node = plan.node_for_rule(orphan).unwrap();
        assert!(node.has_knowledge_gap());
        assert!(node.output().is_empty());
        assert_eq!(plan.get_results().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_handler_stalls_the_plan() {
        let mut reasoner = Reasoner::new();
        reasoner.add_rule(
            Rule::with_handler(
                GraphPattern::new(),
                gp("?a <isAncestorOf> ?b"),
                TransformBindingSetHandler::new(|_| Err(ReasonerError::handler("source offline"))),
            )
            .unwrap(),
        );

        let mut plan = reasoner.backward_plan(gp("?x <isAncestorOf> ?y")).unwrap();
        plan.run(&BindingSet::new()).await.unwrap();

        assert!(!plan.is_done());
        assert!(plan.nodes().any(ReasoningNode::has_failed));
        assert_eq!(plan.get_results().unwrap_err().code, ErrorCode::PlanStalled);
    }

    #[tokio::test]
    async fn test_forward_chaining_reaches_sink() {
        let sink = CollectingSinkHandler::new();
        let mut reasoner = Reasoner::new();
        reasoner.add_rules([
            Rule::new(
                gp("?x <isParentOf> ?y . ?y <isParentOf> ?z"),
                gp("?x <isGrandParentOf> ?z"),
            )
            .unwrap(),
            Rule::sink(gp("?x <isGrandParentOf> ?z"), sink.clone()).unwrap(),
        ]);

        let premise = bindings(
            "x=<janny>,y=<barry>|x=<barry>,y=<fenna>|x=<fenna>,y=<benno>|x=<benno>,y=<loes>",
        );
        let plan = reasoner
            .publish(gp("?x <isParentOf> ?y"), &premise)
            .await
            .unwrap();

        assert!(!plan.is_backward());
        assert!(plan.is_done());
        assert_eq!(plan.get_results().unwrap_err().code, ErrorCode::NotBackwardPlan);

        let received = sink.all_bindings().await;
        assert_eq!(received.len(), 3);
        assert!(received.contains(&Binding::new().with("x", Term::uri("janny")).with("z", Term::uri("fenna"))));
    }

    #[tokio::test]
    async fn test_forward_transitive_closure_reaches_sink() {
        let sink = CollectingSinkHandler::new();
        let mut reasoner = Reasoner::new();
        reasoner.add_rules([
            transitivity(),
            Rule::sink(gp("?a <isAncestorOf> ?b"), sink.clone()).unwrap(),
        ]);

        let premise = FAMILY
            .iter()
            .map(|row| {
                let (x, y) = row.split_once(',').unwrap();
                format!("x={},y={}", x, y)
            })
            .collect::<Vec<_>>()
            .join("|");
        let plan = reasoner
            .publish(gp("?x <isAncestorOf> ?y"), &bindings(&premise))
            .await
            .unwrap();

        assert!(plan.is_done());
        let received = sink.all_bindings().await;
        assert_eq!(received.len(), 15);
        assert!(received.contains(&Binding::new().with("a", Term::uri("janny")).with("b", Term::uri("hendrik"))));
    }

    #[tokio::test]
    async fn test_forward_sink_with_constant_filters_bindings() {
        let sink = CollectingSinkHandler::new();
        let mut reasoner = Reasoner::new();
        reasoner.add_rules([
            Rule::new(
                gp("?x <isParentOf> ?y . ?y <isParentOf> ?z"),
                gp("?x <isGrandParentOf> ?z"),
            )
            .unwrap(),
            Rule::sink(gp("<barry> <isGrandParentOf> ?z"), sink.clone()).unwrap(),
        ]);

        let premise = bindings("x=<fenna>,y=<benno>|x=<benno>,y=<loes>");
        let plan = reasoner
            .publish(gp("?x <isParentOf> ?y"), &premise)
            .await
            .unwrap();

        assert!(plan.is_done());
        assert!(sink.received().await.is_empty());
    }

    #[tokio::test]
    async fn test_rules_from_text() {
        let mut reasoner = Reasoner::new();
        let ids = reasoner
            .load_rules(
                "?x <isAncestorOf> ?y .\n?y <isAncestorOf> ?z .\n->\n?x <isAncestorOf> ?z .\n",
            )
            .unwrap();
        assert_eq!(ids.len(), 1);
        reasoner.add_rule(data("?a <isAncestorOf> ?b", &["a", "b"], &FAMILY[..2]));

        let goal = reasoner.parse_pattern("?p <isAncestorOf> ?q").unwrap();
        let results = reasoner.query(goal, &BindingSet::new()).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_empty_goal_rejected() {
        let mut reasoner = Reasoner::new();
        let err = reasoner.backward_plan(GraphPattern::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyInput);
    }
}
