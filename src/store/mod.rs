//! Rule store
//!
//! An unordered pool of rules. The plan builder asks it which rules can feed
//! a rule's antecedent (antecedent neighbours) or consume its consequent
//! (consequent neighbours); both lookups are cached per rule and strategy.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use fnv::FnvHashMap;
use tracing::{debug, info};

use crate::error::{ReasonerError, ReasonerResult};
use crate::matching::{matches, Match, MatchStrategy};
use crate::parser::{parse_rules, ParserState};
use crate::rule::{generate_name, Rule};

/// Stable index of a rule in its store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub usize);

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Neighbouring rules with the matches that connect them
pub type Neighbors = Arc<Vec<(RuleId, BTreeSet<Match>)>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Side {
    Antecedent,
    Consequent,
}

/// A pool of rules with cached neighbour lookups
#[derive(Debug, Default)]
pub struct RuleStore {
    rules: Vec<Arc<Rule>>,
    neighbors: FnvHashMap<(RuleId, MatchStrategy, Side), Neighbors>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule and return its id
    pub fn add_rule(&mut self, rule: Rule) -> RuleId {
        let id = RuleId(self.rules.len());
        debug!(rule = %rule.display_name(), id = id.0, "adding rule");
        // proactive rules are never neighbours
        if !rule.is_proactive() {
            self.neighbors.clear();
        }
        self.rules.push(Arc::new(rule));
        id
    }

    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Rule>) -> Vec<RuleId> {
        rules.into_iter().map(|r| self.add_rule(r)).collect()
    }

    pub fn get(&self, id: RuleId) -> ReasonerResult<&Arc<Rule>> {
        self.rules
            .get(id.0)
            .ok_or_else(|| ReasonerError::unknown_rule(id.0))
    }

    /// All rules with their ids, in insertion order
    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Arc<Rule>)> {
        self.rules.iter().enumerate().map(|(i, r)| (RuleId(i), r))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Forget every cached neighbour lookup
    pub fn reset(&mut self) {
        self.neighbors.clear();
    }

    /// Rules whose consequent can feed the antecedent of `id`.
    ///
    /// Matches are keyed from `id`'s antecedent triples to the neighbour's
    /// consequent triples.
    pub fn antecedent_neighbors(&mut self, id: RuleId, strategy: MatchStrategy) -> ReasonerResult<Neighbors> {
        self.neighbors_on(id, strategy, Side::Antecedent)
    }

    /// Rules whose antecedent can consume the consequent of `id`.
    ///
    /// Matches are keyed from `id`'s consequent triples to the neighbour's
    /// antecedent triples.
    pub fn consequent_neighbors(&mut self, id: RuleId, strategy: MatchStrategy) -> ReasonerResult<Neighbors> {
        self.neighbors_on(id, strategy, Side::Consequent)
    }

    fn neighbors_on(&mut self, id: RuleId, strategy: MatchStrategy, side: Side) -> ReasonerResult<Neighbors> {
        if let Some(cached) = self.neighbors.get(&(id, strategy, side)) {
            return Ok(Arc::clone(cached));
        }

        let me = Arc::clone(self.get(id)?);
        let mut found = Vec::new();
        for (other_id, other) in self.rules() {
            // proactive rules only ever start a plan
            if other.is_proactive() {
                continue;
            }
            let result = match side {
                Side::Antecedent => matches(me.antecedent(), other.consequent(), strategy),
                Side::Consequent => matches(me.consequent(), other.antecedent(), strategy),
            };
            if !result.is_empty() {
                found.push((other_id, result));
            }
        }

        debug!(
            rule = %me.display_name(),
            ?side,
            strategy = strategy.as_str(),
            neighbors = found.len(),
            "computed neighbours"
        );
        let found = Arc::new(found);
        self.neighbors.insert((id, strategy, side), Arc::clone(&found));
        Ok(found)
    }

    /// Render the rules and their antecedent-neighbour edges as GraphViz
    pub fn to_graphviz(&mut self, strategy: MatchStrategy) -> ReasonerResult<String> {
        let mut out = String::from("digraph {\n");
        let ids: Vec<RuleId> = self.rules().map(|(id, _)| id).collect();

        for id in &ids {
            let rule = self.get(*id)?;
            let _ = writeln!(
                out,
                "  r{} [label=\"{}\" tooltip=\"{}\"]",
                id.0,
                escape(&generate_name(rule)),
                escape(&rule.to_string())
            );
        }

        for id in ids {
            for (neighbor, _) in self.antecedent_neighbors(id, strategy)?.iter() {
                let _ = writeln!(out, "  r{} -> r{}", neighbor.0, id.0);
            }
        }

        out.push('}');
        Ok(out)
    }

    /// Add the rules of a rule file. Returns the new ids.
    pub fn load_rules(&mut self, text: &str, state: &ParserState) -> ReasonerResult<Vec<RuleId>> {
        let parsed = parse_rules(text, state)?;
        let mut ids = Vec::with_capacity(parsed.rules.len());
        for source in parsed.rules {
            let rule = Rule::new(source.antecedent, source.consequent)
                .map_err(|e| e.with_context("line", source.line.to_string()))?;
            ids.push(self.add_rule(rule));
        }
        info!(rules = ids.len(), "loaded rules");
        Ok(ids)
    }

    pub fn load_rules_from_file(&mut self, path: impl AsRef<Path>, state: &ParserState) -> ReasonerResult<Vec<RuleId>> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ReasonerError::from(e).with_context("path", path.display().to_string()))?;
        self.load_rules(&text, state)
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
