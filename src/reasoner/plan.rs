//! Reasoner plans
//!
//! A plan is built once from a rule store and a start rule:
//! - a *goal* (antecedent only) gives a backward plan that collects the
//!   bindings satisfying the goal;
//! - a *premise* (consequent only) gives a forward plan that pushes the
//!   premise bindings to every rule that can consume them.
//!
//! Nodes are created once per rule and linked to their producers and
//! consumers. An edge that would close a cycle is recorded as a loop edge
//! instead; data still flows over it, but nobody waits on it.
//!
//! Execution alternates between [`ReasonerPlan::execute`], which walks the
//! nodes in dependency order and schedules handler invocations, and
//! [`ReasonerPlan::execute_scheduled_tasks`], which runs them. Nodes only ever
//! hand bindings they have not handled before to their handler, so the loop
//! reaches a fixpoint.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use fnv::FnvHashMap;
use tracing::{debug, error, trace, warn};

use super::node::{Direction, NodeId, NodeState, ReasoningNode};
use super::taskboard::{TaskBoard, TaskOutcome};
use crate::binding::{Binding, BindingSet, TripleVarBindingSet, DEFAULT_LARGE_BINDING_SET_WARNING};
use crate::error::{ErrorCode, ReasonerError, ReasonerResult};
use crate::matching::{invert_all, Match, MatchStrategy};
use crate::reasoner_ensure;
use crate::store::{RuleId, RuleStore};
use crate::term::{graph_pattern_variables, TriplePattern};

/// Tunables for building and running a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub strategy: MatchStrategy,
    /// Queue handler calls on the task board; otherwise run them inline
    pub use_task_board: bool,
    pub large_binding_set_warning: usize,
}

impl Default for PlanOptions {
    fn default() -> Self {
        PlanOptions {
            strategy: MatchStrategy::FindOnlyBiggestMatches,
            use_task_board: true,
            large_binding_set_warning: DEFAULT_LARGE_BINDING_SET_WARNING,
        }
    }
}

/// A reasoning graph rooted at a start rule, plus its execution state
pub struct ReasonerPlan {
    nodes: Vec<ReasoningNode>,
    by_rule: FnvHashMap<RuleId, NodeId>,
    start: NodeId,
    backward: bool,
    /// Producers before consumers, over non-loop edges
    order: Vec<NodeId>,
    options: PlanOptions,
    task_board: TaskBoard,
    input: Option<BindingSet>,
}

impl ReasonerPlan {
    /// Build the reasoning graph for `start`
    pub fn new(store: &mut RuleStore, start: RuleId, options: PlanOptions) -> ReasonerResult<Self> {
        let rule = Arc::clone(store.get(start)?);
        let backward = rule.consequent().is_empty();
        reasoner_ensure!(
            backward || rule.antecedent().is_empty(),
            ErrorCode::InvalidValue,
            "A start rule needs either an antecedent (goal) or a consequent (premise), not both"
        );

        let mut plan = ReasonerPlan {
            nodes: Vec::new(),
            by_rule: FnvHashMap::default(),
            start: NodeId(0),
            backward,
            order: Vec::new(),
            options,
            task_board: TaskBoard::new(),
            input: None,
        };

        let direction = if backward { Direction::Backward } else { Direction::Forward };
        let root = plan.create_node(store, start, direction)?;
        plan.start = root;

        let mut chain = vec![root];
        if backward {
            plan.expand_backward(store, root, &mut chain, None)?;
        } else {
            plan.expand_forward(store, root, &mut chain)?;
        }

        plan.mark_knowledge_gaps();
        plan.order = plan.topological_order();

        debug!(
            rule = %rule.display_name(),
            nodes = plan.nodes.len(),
            backward,
            strategy = options.strategy.as_str(),
            "plan built"
        );
        Ok(plan)
    }

    // ========================================================================
    // Graph construction
    // ========================================================================

    fn create_node(&mut self, store: &RuleStore, rule_id: RuleId, direction: Direction) -> ReasonerResult<NodeId> {
        let rule = Arc::clone(store.get(rule_id)?);
        let id = NodeId(self.nodes.len());
        trace!(node = id.0, rule = %rule.display_name(), ?direction, "creating node");
        self.nodes.push(ReasoningNode::new(id, rule_id, rule, direction));
        self.by_rule.insert(rule_id, id);
        Ok(id)
    }

    /// Discover the producers of `id`, recursively
    fn expand_backward(
        &mut self,
        store: &mut RuleStore,
        id: NodeId,
        chain: &mut Vec<NodeId>,
        skip: Option<RuleId>,
    ) -> ReasonerResult<()> {
        if self.nodes[id.0].expanded_backward {
            return Ok(());
        }
        self.nodes[id.0].expanded_backward = true;

        let rule_id = self.nodes[id.0].rule_id;
        let producers = store.antecedent_neighbors(rule_id, self.options.strategy)?;

        for (producer_rule, found) in producers.iter() {
            if Some(*producer_rule) == skip {
                continue;
            }
            match self.by_rule.get(producer_rule).copied() {
                Some(existing) => {
                    let cyclic = chain.contains(&existing) || self.flows_to(id, existing);
                    self.link(existing, id, found.clone(), cyclic, false);
                }
                None => {
                    let producer = self.create_node(store, *producer_rule, Direction::Backward)?;
                    self.link(producer, id, found.clone(), false, false);
                    chain.push(producer);
                    self.expand_backward(store, producer, chain, None)?;
                    chain.pop();
                }
            }
        }
        Ok(())
    }

    /// Discover the consumers of `id`, recursively. A consumer whose
    /// antecedent is not fully covered by any single match also gets its
    /// other producers, so the missing triples can be fetched.
    fn expand_forward(&mut self, store: &mut RuleStore, id: NodeId, chain: &mut Vec<NodeId>) -> ReasonerResult<()> {
        if self.nodes[id.0].expanded_forward {
            return Ok(());
        }
        self.nodes[id.0].expanded_forward = true;

        let rule_id = self.nodes[id.0].rule_id;
        let consumers = store.consequent_neighbors(rule_id, self.options.strategy)?;

        for (consumer_rule, found) in consumers.iter() {
            let consumer_keyed = invert_all(found);
            match self.by_rule.get(consumer_rule).copied() {
                Some(existing) => {
                    let cyclic = chain.contains(&existing) || self.flows_to(existing, id);
                    self.link(id, existing, consumer_keyed, cyclic, true);
                }
                None => {
                    let consumer = self.create_node(store, *consumer_rule, Direction::Forward)?;
                    self.link(id, consumer, consumer_keyed, false, true);

                    let antecedent_size = self.nodes[consumer.0].rule.antecedent().len();
                    if !found.iter().any(|m| m.len() == antecedent_size) {
                        let mut helpers = vec![consumer];
                        self.expand_backward(store, consumer, &mut helpers, Some(rule_id))?;
                    }

                    chain.push(consumer);
                    self.expand_forward(store, consumer, chain)?;
                    chain.pop();
                }
            }
        }
        Ok(())
    }

    /// Record that `producer` feeds `consumer`. `consumer_keyed` maps the
    /// consumer's antecedent triples to the producer's consequent triples.
    fn link(&mut self, producer: NodeId, consumer: NodeId, consumer_keyed: BTreeSet<Match>, cyclic: bool, trigger: bool) {
        let producer_keyed = invert_all(&consumer_keyed);
        trace!(producer = producer.0, consumer = consumer.0, cyclic, matches = consumer_keyed.len(), "linking nodes");

        let c = &mut self.nodes[consumer.0];
        let towards_producer = if cyclic { &mut c.antecedent_loops } else { &mut c.antecedent_neighbors };
        towards_producer.entry(producer).or_default().extend(consumer_keyed);
        if trigger {
            c.forward_parents.insert(producer);
        }

        let p = &mut self.nodes[producer.0];
        let towards_consumer = if cyclic { &mut p.consequent_loops } else { &mut p.consequent_neighbors };
        towards_consumer.entry(consumer).or_default().extend(producer_keyed);
    }

    /// True when data already flows from `from` to `to` over non-loop edges
    fn flows_to(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.nodes[current.0].consequent_neighbors.keys().copied());
            }
        }
        false
    }

    fn mark_knowledge_gaps(&mut self) {
        for node in &mut self.nodes {
            let gap = {
                let covered: BTreeSet<&TriplePattern> = node
                    .all_producers()
                    .flat_map(|(_, found)| found.iter().flat_map(Match::sources))
                    .collect();
                node.rule.antecedent().iter().any(|t| !covered.contains(t))
            };
            if gap {
                debug!(node = node.id.0, rule = %node.rule.display_name(), "knowledge gap");
            }
            node.knowledge_gap = gap;
        }
    }

    fn topological_order(&self) -> Vec<NodeId> {
        let mut waiting: Vec<usize> = self.nodes.iter().map(|n| n.antecedent_neighbors.len()).collect();
        let mut ready: VecDeque<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.antecedent_neighbors.is_empty())
            .map(|n| n.id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_front() {
            order.push(id);
            for consumer in self.nodes[id.0].consequent_neighbors.keys() {
                waiting[consumer.0] -= 1;
                if waiting[consumer.0] == 0 {
                    ready.push_back(*consumer);
                }
            }
        }

        if order.len() < self.nodes.len() {
            warn!("reasoning graph has a cycle outside its loop edges");
            for node in &self.nodes {
                if !order.contains(&node.id) {
                    order.push(node.id);
                }
            }
        }
        order
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Advance the plan as far as possible without running queued tasks.
    ///
    /// `bindings` constrains the goal (backward) or holds the premise data
    /// (forward); an empty set stands for one empty binding. Returns `true`
    /// when tasks are waiting on the task board, in which case the caller
    /// runs [`execute_scheduled_tasks`](Self::execute_scheduled_tasks) and
    /// calls `execute` again.
    pub fn execute(&mut self, bindings: &BindingSet) -> ReasonerResult<bool> {
        let bindings = if bindings.is_empty() {
            BindingSet::singleton(Binding::new())
        } else {
            bindings.clone()
        };

        if self.input.as_ref() != Some(&bindings) {
            self.check_input(&bindings)?;
            self.compute_demand(&bindings);
            self.input = Some(bindings);
        }

        loop {
            let progress = self.advance();
            if self.task_board.has_tasks() {
                return Ok(true);
            }
            if !progress {
                return Ok(false);
            }
        }
    }

    /// Run every queued task and apply the results. Returns the number of
    /// tasks that ran.
    pub async fn execute_scheduled_tasks(&mut self) -> usize {
        let outcomes = self.task_board.execute_scheduled_tasks().await;
        let count = outcomes.len();
        self.apply_outcomes(outcomes);
        count
    }

    pub fn apply_outcomes(&mut self, outcomes: Vec<TaskOutcome>) {
        for outcome in outcomes {
            trace!(node = outcome.node.0, elapsed_ms = outcome.elapsed.as_millis() as u64, "task finished");
            self.set_binding_set(outcome.node, outcome.result);
        }
    }

    /// Alternate `execute` and `execute_scheduled_tasks` until nothing is left
    pub async fn run(&mut self, bindings: &BindingSet) -> ReasonerResult<()> {
        while self.execute(bindings)? {
            self.execute_scheduled_tasks().await;
        }
        Ok(())
    }

    /// Write a handler result back into its node
    pub fn set_binding_set(&mut self, id: NodeId, result: ReasonerResult<BindingSet>) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            warn!(node = id.0, "result for an unknown node");
            return;
        };

        let direction = if node.bc_state == NodeState::Requested {
            Direction::Backward
        } else if node.fc_state == NodeState::Requested {
            Direction::Forward
        } else {
            warn!(node = id.0, rule = %node.rule.display_name(), "result for a node that requested nothing");
            return;
        };

        match result {
            Ok(bindings) => {
                trace!(node = id.0, bindings = bindings.len(), ?direction, "handler result");
                node.output.union_with(&bindings);
                node.set_state(direction, NodeState::Available);
            }
            Err(err) => {
                error!(node = id.0, rule = %node.rule.display_name(), error = %err, "binding set handler failed");
                node.failed = true;
            }
        }
    }

    fn check_input(&self, bindings: &BindingSet) -> ReasonerResult<()> {
        let rule = &self.nodes[self.start.0].rule;
        let pattern = if self.backward { rule.antecedent() } else { rule.consequent() };
        let known = graph_pattern_variables(pattern);
        for binding in bindings {
            if let Some(unknown) = binding.variables().find(|v| !known.contains(*v)) {
                return Err(ReasonerError::new(
                    ErrorCode::InvalidValue,
                    format!("Variable {} does not occur in the start pattern", unknown),
                )
                .with_context("binding", binding.to_string()));
            }
        }
        Ok(())
    }

    /// Push the constraints of the start node down to every producer.
    ///
    /// Forward plans have no constraints: every node gets one empty binding.
    fn compute_demand(&mut self, bindings: &BindingSet) {
        let unconstrained = BindingSet::singleton(Binding::new());
        for node in &mut self.nodes {
            node.demand = if self.backward { BindingSet::new() } else { unconstrained.clone() };
        }
        if !self.backward {
            return;
        }
        self.nodes[self.start.0].demand = bindings.clone();

        let biggest = self.options.strategy == MatchStrategy::FindOnlyBiggestMatches;
        let mut changed = true;
        while changed {
            changed = false;
            for index in 0..self.nodes.len() {
                let contributions = {
                    let consumer = &self.nodes[index];
                    if consumer.demand.is_empty() || consumer.rule.antecedent().is_empty() {
                        continue;
                    }
                    let source = TripleVarBindingSet::from_binding_set(
                        Arc::clone(consumer.rule.antecedent()),
                        &consumer.demand,
                    );
                    consumer
                        .all_producers()
                        .map(|(producer, found)| {
                            let target = self.nodes[producer.0].rule.consequent();
                            let mut wanted = BindingSet::new();
                            for m in found {
                                let mut translated = source.translate_match(Arc::clone(target), m);
                                if biggest && m.len() > 1 {
                                    // the producer may only ever be asked for part of its pattern
                                    let covered: BTreeSet<&TriplePattern> = m.targets().collect();
                                    translated = translated.restrictions_over(&covered);
                                }
                                wanted.union_with(&translated.to_binding_set());
                            }
                            (*producer, wanted)
                        })
                        .collect::<Vec<_>>()
                };

                for (producer, wanted) in contributions {
                    let demand = &mut self.nodes[producer.0].demand;
                    let before = demand.len();
                    demand.union_with(&wanted);
                    changed |= demand.len() != before;
                }
            }
        }
    }

    /// One pass over all nodes in dependency order. Returns whether anything
    /// changed.
    fn advance(&mut self) -> bool {
        let mut progress = false;
        for index in 0..self.order.len() {
            let id = self.order[index];
            progress |= if id == self.start {
                self.advance_start()
            } else {
                self.advance_node(id)
            };
        }
        progress
    }

    fn advance_start(&mut self) -> bool {
        let id = self.start;
        if self.backward {
            if !self.producers_available(id) {
                return false;
            }
            let result = if self.nodes[id.0].knowledge_gap {
                BindingSet::new()
            } else {
                self.node_input(id)
            };
            let node = &mut self.nodes[id.0];
            let changed = node.output != result || node.bc_state != NodeState::Available;
            if changed {
                trace!(results = result.len(), "goal bindings updated");
                node.output = result;
                node.bc_state = NodeState::Available;
            }
            changed
        } else {
            let premise = self.input.clone().unwrap_or_default();
            let node = &mut self.nodes[id.0];
            let changed = node.output != premise || node.fc_state != NodeState::Available;
            node.output = premise;
            node.fc_state = NodeState::Available;
            changed
        }
    }

    fn advance_node(&mut self, id: NodeId) -> bool {
        {
            let node = &self.nodes[id.0];
            if node.is_pending() || node.failed {
                return false;
            }
        }
        if !self.producers_available(id) {
            return false;
        }

        let primary = self.nodes[id.0].direction;
        let first = self.nodes[id.0].state(primary) == NodeState::NotRequested;

        if self.nodes[id.0].knowledge_gap {
            if first {
                self.nodes[id.0].set_state(primary, NodeState::Available);
                return true;
            }
            return false;
        }

        let input = self.node_input(id);
        let node = &self.nodes[id.0];
        let delta = input.difference(&node.handled);

        if first {
            if node.rule.antecedent().is_empty() || !delta.is_empty() {
                self.dispatch(id, primary, delta);
            } else {
                trace!(node = id.0, "nothing to handle");
                self.nodes[id.0].set_state(primary, NodeState::Available);
            }
            return true;
        }

        if delta.is_empty() {
            return false;
        }
        // new input after the first round comes in through a loop
        self.dispatch(id, primary.opposite(), delta);
        true
    }

    fn producers_available(&self, id: NodeId) -> bool {
        self.nodes[id.0]
            .antecedent_neighbors
            .keys()
            .all(|p| self.nodes[p.0].is_available())
    }

    fn dispatch(&mut self, id: NodeId, direction: Direction, delta: BindingSet) {
        let node = &mut self.nodes[id.0];
        node.handled.union_with(&delta);
        node.set_state(direction, NodeState::Requested);
        let rule = Arc::clone(&node.rule);

        if self.options.use_task_board {
            self.task_board.add_task(id, rule, delta);
        } else {
            debug!(node = id.0, rule = %rule.display_name(), bindings = delta.len(), "invoking handler inline");
            let result = futures::executor::block_on(rule.invoke(delta));
            self.set_binding_set(id, result);
        }
    }

    /// Antecedent bindings for a node, assembled from its producers' outputs
    fn node_input(&self, id: NodeId) -> BindingSet {
        let node = &self.nodes[id.0];
        let antecedent = Arc::clone(node.rule.antecedent());
        if antecedent.is_empty() {
            return node.demand.clone();
        }

        let biggest = self.options.strategy == MatchStrategy::FindOnlyBiggestMatches;
        let warning = self.options.large_binding_set_warning;
        let mut combined = TripleVarBindingSet::new(Arc::clone(&antecedent)).with_large_warning(warning);
        let mut trigger = combined.empty_like();

        for (producer_id, _) in node.all_producers() {
            let producer = &self.nodes[producer_id.0];
            if producer.output.is_empty() {
                continue;
            }
            let Some(found) = producer.matches_to_consumer(id) else {
                continue;
            };

            let produced = TripleVarBindingSet::from_binding_set(Arc::clone(producer.rule.consequent()), &producer.output)
                .with_large_warning(warning);
            for m in found {
                let mut translated = produced.translate_match(Arc::clone(&antecedent), m);
                if biggest {
                    translated = translated.with_partial_bindings();
                }
                if node.forward_parents.contains(producer_id) {
                    trigger.extend(&translated);
                }
                combined = combined.merge(&translated);
            }
        }

        let full = combined.full_binding_set();
        if node.forward_parents.is_empty() {
            full.to_binding_set().keep_compatible(&node.demand)
        } else {
            full.keep_full_incorporating(&trigger).to_binding_set()
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// The goal bindings of a finished backward plan
    pub fn get_results(&self) -> ReasonerResult<BindingSet> {
        if !self.backward {
            return Err(ReasonerError::new(
                ErrorCode::NotBackwardPlan,
                "Results are only collected by backward plans",
            )
            .with_hint("Read the node outputs or sink handlers of a forward plan instead"));
        }
        if let Some(failed) = self.nodes.iter().find(|n| n.failed) {
            return Err(ReasonerError::new(
                ErrorCode::PlanStalled,
                "A binding set handler failed, so the plan cannot complete",
            )
            .with_context("rule", failed.rule.display_name()));
        }
        if !self.is_done() {
            return Err(ReasonerError::new(ErrorCode::PlanNotFinished, "The plan has not finished")
                .with_hint("Call execute until it returns false, draining the task board in between"));
        }
        Ok(self.nodes[self.start.0].output.clone())
    }

    /// No tasks waiting or running and the start node is available
    pub fn is_done(&self) -> bool {
        !self.task_board.has_tasks()
            && !self.nodes.iter().any(ReasoningNode::is_pending)
            && self.nodes[self.start.0].is_available()
    }

    pub fn is_backward(&self) -> bool {
        self.backward
    }

    pub fn options(&self) -> &PlanOptions {
        &self.options
    }

    pub fn start_node(&self) -> &ReasoningNode {
        &self.nodes[self.start.0]
    }

    pub fn node(&self, id: NodeId) -> Option<&ReasoningNode> {
        self.nodes.get(id.0)
    }

    pub fn node_for_rule(&self, rule: RuleId) -> Option<&ReasoningNode> {
        self.by_rule.get(&rule).map(|id| &self.nodes[id.0])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ReasoningNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn task_board(&self) -> &TaskBoard {
        &self.task_board
    }

    pub fn task_board_mut(&mut self) -> &mut TaskBoard {
        &mut self.task_board
    }

    fn fmt_node(
        &self,
        f: &mut fmt::Formatter<'_>,
        id: NodeId,
        depth: usize,
        prefix: &str,
        seen: &mut BTreeSet<NodeId>,
    ) -> fmt::Result {
        let node = &self.nodes[id.0];
        write!(
            f,
            "{:indent$}{}[{}{}] {} ({})",
            "",
            prefix,
            node.bc_state.glyph(),
            node.fc_state.glyph(),
            node.rule.display_name(),
            id,
            indent = depth * 2
        )?;
        if node.knowledge_gap {
            write!(f, " gap")?;
        }
        if node.failed {
            write!(f, " failed")?;
        }
        if !seen.insert(id) {
            return writeln!(f, " ...");
        }
        writeln!(f)?;

        let (children, loops) = match node.direction {
            Direction::Backward => (&node.antecedent_neighbors, &node.antecedent_loops),
            Direction::Forward => (&node.consequent_neighbors, &node.consequent_loops),
        };
        for child in children.keys() {
            self.fmt_node(f, *child, depth + 1, "", seen)?;
        }
        if node.direction == Direction::Forward {
            for helper in node.antecedent_neighbors.keys().filter(|p| !node.forward_parents.contains(p)) {
                self.fmt_node(f, *helper, depth + 1, "<- ", seen)?;
            }
        }
        for looped in loops.keys() {
            let target = &self.nodes[looped.0];
            writeln!(
                f,
                "{:indent$}loop -> {} ({})",
                "",
                target.rule.display_name(),
                looped,
                indent = (depth + 1) * 2
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ReasonerPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = BTreeSet::new();
        self.fmt_node(f, self.start, 0, "", &mut seen)
    }
}

impl fmt::Debug for ReasonerPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReasonerPlan")
            .field("nodes", &self.nodes.len())
            .field("backward", &self.backward)
            .field("options", &self.options)
            .field("tasks", &self.task_board.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_binding_set, parse_graph_pattern, ParserState};
    use crate::rule::{Rule, Table, TableBindingSetHandler};
    use crate::term::GraphPattern;

    fn gp(text: &str) -> GraphPattern {
        parse_graph_pattern(text, &ParserState::new()).unwrap()
    }

    fn family() -> (RuleStore, RuleId, RuleId) {
        let mut store = RuleStore::new();
        let transitive = store.add_rule(
            Rule::new(
                gp("?x <isAncestorOf> ?y . ?y <isAncestorOf> ?z"),
                gp("?x <isAncestorOf> ?z"),
            )
            .unwrap(),
        );
        let table = Table::new(&["a", "b"], &["<barry>,<fenna>", "<janny>,<barry>"]).unwrap();
        let data = store.add_rule(
            Rule::with_handler(GraphPattern::new(), gp("?a <isAncestorOf> ?b"), TableBindingSetHandler::new(table))
                .unwrap(),
        );
        (store, transitive, data)
    }

    #[test]
    fn test_self_dependency_becomes_loop_edge() {
        let (mut store, transitive, data) = family();
        let goal = store.add_rule(Rule::proactive(gp("?p <isAncestorOf> ?q"), GraphPattern::new()).unwrap());
        let plan = ReasonerPlan::new(&mut store, goal, PlanOptions::default()).unwrap();

        assert!(plan.is_backward());
        assert_eq!(plan.len(), 3);

        let t = plan.node_for_rule(transitive).unwrap();
        assert!(t.antecedent_loops().contains_key(&t.id()));
        assert!(t.antecedent_neighbors().contains_key(&plan.node_for_rule(data).unwrap().id()));
        assert!(!t.has_knowledge_gap());

        // producers come first
        let position = |id: NodeId| plan.order.iter().position(|n| *n == id).unwrap();
        assert!(position(plan.node_for_rule(data).unwrap().id()) < position(t.id()));
        assert_eq!(*plan.order.last().unwrap(), plan.start_node().id());
    }

    #[test]
    fn test_start_rule_with_both_sides_rejected() {
        let (mut store, transitive, _) = family();
        let err = ReasonerPlan::new(&mut store, transitive, PlanOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }

    #[test]
    fn test_knowledge_gap_marked() {
        let (mut store, _, _) = family();
        let goal = store.add_rule(
            Rule::proactive(gp("?p <isAncestorOf> ?q . ?p <hasOwner> ?o"), GraphPattern::new()).unwrap(),
        );
        let plan = ReasonerPlan::new(&mut store, goal, PlanOptions::default()).unwrap();
        assert!(plan.start_node().has_knowledge_gap());
    }

    #[test]
    fn test_results_before_execution_are_an_error() {
        let (mut store, _, _) = family();
        let goal = store.add_rule(Rule::proactive(gp("?p <isAncestorOf> ?q"), GraphPattern::new()).unwrap());
        let plan = ReasonerPlan::new(&mut store, goal, PlanOptions::default()).unwrap();
        assert_eq!(plan.get_results().unwrap_err().code, ErrorCode::PlanNotFinished);
    }

    #[test]
    fn test_unknown_input_variable_rejected() {
        let (mut store, _, _) = family();
        let goal = store.add_rule(Rule::proactive(gp("?p <isAncestorOf> ?q"), GraphPattern::new()).unwrap());
        let mut plan = ReasonerPlan::new(&mut store, goal, PlanOptions::default()).unwrap();
        let input = parse_binding_set("zzz=<barry>", &ParserState::new()).unwrap();
        assert_eq!(plan.execute(&input).unwrap_err().code, ErrorCode::InvalidValue);
    }

    #[tokio::test]
    async fn test_task_board_round_trip() {
        let (mut store, _, _) = family();
        let goal = store.add_rule(Rule::proactive(gp("?p <isAncestorOf> ?q"), GraphPattern::new()).unwrap());
        let mut plan = ReasonerPlan::new(&mut store, goal, PlanOptions::default()).unwrap();

        // the data rule is the only node that can start
        assert!(plan.execute(&BindingSet::new()).unwrap());
        assert_eq!(plan.task_board().len(), 1);
        assert!(!plan.is_done());

        assert_eq!(plan.execute_scheduled_tasks().await, 1);
        plan.run(&BindingSet::new()).await.unwrap();

        assert!(plan.is_done());
        // barry->fenna, janny->barry and the derived janny->fenna
        assert_eq!(plan.get_results().unwrap().len(), 3);
    }

    #[test]
    fn test_display_shows_tree_and_loops() {
        let (mut store, _, _) = family();
        let goal = store.add_rule(
            Rule::proactive(gp("?p <isAncestorOf> ?q"), GraphPattern::new()).unwrap().named("goal"),
        );
        let plan = ReasonerPlan::new(&mut store, goal, PlanOptions::default()).unwrap();
        let rendered = plan.to_string();
        assert!(rendered.starts_with("[..] goal (n0)"));
        assert!(rendered.contains("loop -> "));
    }

    #[test]
    fn test_failed_write_back_to_idle_node_is_ignored() {
        let (mut store, _, data) = family();
        let goal = store.add_rule(Rule::proactive(gp("?p <isAncestorOf> ?q"), GraphPattern::new()).unwrap());
        let mut plan = ReasonerPlan::new(&mut store, goal, PlanOptions::default()).unwrap();
        let id = plan.node_for_rule(data).unwrap().id();

        plan.set_binding_set(id, Ok(BindingSet::singleton(Binding::new())));
        assert!(plan.node(id).unwrap().output().is_empty());
    }
}
