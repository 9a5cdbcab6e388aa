//! Reasoning nodes
//!
//! A plan owns its nodes in an arena and refers to them by [`NodeId`]. Each
//! node wraps one rule and records, per neighbour, the matches that connect
//! the two rules' graph patterns.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::binding::BindingSet;
use crate::matching::Match;
use crate::rule::Rule;
use crate::store::RuleId;

/// Index of a node in its plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Progress of one chaining direction of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    #[default]
    NotRequested,
    /// A handler invocation is outstanding
    Requested,
    Available,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::NotRequested => "not-requested",
            NodeState::Requested => "requested",
            NodeState::Available => "available",
        }
    }

    pub fn glyph(&self) -> char {
        match self {
            NodeState::NotRequested => '.',
            NodeState::Requested => '~',
            NodeState::Available => '+',
        }
    }
}

/// Chaining direction a node was created in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Backward => Direction::Forward,
            Direction::Forward => Direction::Backward,
        }
    }
}

/// Matches to a neighbour, keyed from this node's pattern
pub type NeighborMap = BTreeMap<NodeId, BTreeSet<Match>>;

/// One rule inside a plan
#[derive(Debug, Clone)]
pub struct ReasoningNode {
    pub(crate) id: NodeId,
    pub(crate) rule_id: RuleId,
    pub(crate) rule: Arc<Rule>,
    pub(crate) direction: Direction,

    /// Producers: matches from our antecedent to their consequent
    pub(crate) antecedent_neighbors: NeighborMap,
    /// Consumers: matches from our consequent to their antecedent
    pub(crate) consequent_neighbors: NeighborMap,
    /// Producers reached through a cycle
    pub(crate) antecedent_loops: NeighborMap,
    /// Consumers reached through a cycle
    pub(crate) consequent_loops: NeighborMap,
    /// Producers that trigger this node in forward chaining
    pub(crate) forward_parents: BTreeSet<NodeId>,

    pub(crate) expanded_backward: bool,
    pub(crate) expanded_forward: bool,
    /// Some antecedent triple has no producer at all
    pub(crate) knowledge_gap: bool,

    pub(crate) bc_state: NodeState,
    pub(crate) fc_state: NodeState,
    pub(crate) failed: bool,

    /// Constraints pushed down from consumers, in this rule's variables
    pub(crate) demand: BindingSet,
    /// Antecedent bindings already handed to the handler
    pub(crate) handled: BindingSet,
    /// Everything the handler has produced so far
    pub(crate) output: BindingSet,
}

impl ReasoningNode {
    pub(crate) fn new(id: NodeId, rule_id: RuleId, rule: Arc<Rule>, direction: Direction) -> Self {
        ReasoningNode {
            id,
            rule_id,
            rule,
            direction,
            antecedent_neighbors: NeighborMap::new(),
            consequent_neighbors: NeighborMap::new(),
            antecedent_loops: NeighborMap::new(),
            consequent_loops: NeighborMap::new(),
            forward_parents: BTreeSet::new(),
            expanded_backward: false,
            expanded_forward: false,
            knowledge_gap: false,
            bc_state: NodeState::NotRequested,
            fc_state: NodeState::NotRequested,
            failed: false,
            demand: BindingSet::new(),
            handled: BindingSet::new(),
            output: BindingSet::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn rule_id(&self) -> RuleId {
        self.rule_id
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn antecedent_neighbors(&self) -> &NeighborMap {
        &self.antecedent_neighbors
    }

    pub fn consequent_neighbors(&self) -> &NeighborMap {
        &self.consequent_neighbors
    }

    pub fn antecedent_loops(&self) -> &NeighborMap {
        &self.antecedent_loops
    }

    pub fn consequent_loops(&self) -> &NeighborMap {
        &self.consequent_loops
    }

    pub fn bc_state(&self) -> NodeState {
        self.bc_state
    }

    pub fn fc_state(&self) -> NodeState {
        self.fc_state
    }

    pub fn has_knowledge_gap(&self) -> bool {
        self.knowledge_gap
    }

    /// True when a handler invocation failed; the node never completes
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Bindings this node has produced
    pub fn output(&self) -> &BindingSet {
        &self.output
    }

    pub fn demand(&self) -> &BindingSet {
        &self.demand
    }

    /// State of the direction the node was created in
    pub(crate) fn primary_state(&self) -> NodeState {
        self.state(self.direction)
    }

    pub(crate) fn state(&self, direction: Direction) -> NodeState {
        match direction {
            Direction::Backward => self.bc_state,
            Direction::Forward => self.fc_state,
        }
    }

    pub(crate) fn set_state(&mut self, direction: Direction, state: NodeState) {
        match direction {
            Direction::Backward => self.bc_state = state,
            Direction::Forward => self.fc_state = state,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.bc_state == NodeState::Requested || self.fc_state == NodeState::Requested
    }

    /// Done with its first evaluation and nothing outstanding
    pub fn is_available(&self) -> bool {
        self.primary_state() == NodeState::Available && !self.is_pending()
    }

    /// Every producer, cyclic ones included
    pub(crate) fn all_producers(&self) -> impl Iterator<Item = (&NodeId, &BTreeSet<Match>)> {
        self.antecedent_neighbors.iter().chain(self.antecedent_loops.iter())
    }

    /// Matches towards `consumer`, keyed from our consequent
    pub(crate) fn matches_to_consumer(&self, consumer: NodeId) -> Option<&BTreeSet<Match>> {
        self.consequent_neighbors
            .get(&consumer)
            .or_else(|| self.consequent_loops.get(&consumer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_graph_pattern, ParserState};

    fn node() -> ReasoningNode {
        let state = ParserState::new();
        let rule = Rule::new(
            parse_graph_pattern("?x <isParentOf> ?y", &state).unwrap(),
            parse_graph_pattern("?x <isAncestorOf> ?y", &state).unwrap(),
        )
        .unwrap();
        ReasoningNode::new(NodeId(0), RuleId(0), Arc::new(rule), Direction::Backward)
    }

    #[test]
    fn test_availability_follows_both_directions() {
        let mut n = node();
        assert!(!n.is_available());

        n.set_state(Direction::Backward, NodeState::Available);
        assert!(n.is_available());

        // a later forward continuation makes it pending again
        n.set_state(Direction::Forward, NodeState::Requested);
        assert!(n.is_pending());
        assert!(!n.is_available());

        n.set_state(Direction::Forward, NodeState::Available);
        assert!(n.is_available());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(NodeState::Requested.as_str(), "requested");
        assert_eq!(NodeState::Available.glyph(), '+');
        assert_eq!(Direction::Backward.opposite(), Direction::Forward);
    }
}
