//! ke-reasoner - rule-based reasoning over RDF triple patterns
//!
//! Rules are pairs of graph patterns (antecedent and consequent) with a
//! handler that turns antecedent bindings into consequent bindings. The
//! reasoner finds out which rules can feed which by unifying their
//! patterns and then chains them:
//!
//! - backward, from a goal pattern down to the rules that produce it;
//! - forward, from premise data up to every rule that can consume it.
//!
//! # Architecture
//!
//! - [`term`] - IRIs, literals, variables and triple/graph patterns
//! - [`parser`] - patterns, binding sets and rule files
//! - [`matching`] - unification of graph patterns ([`Match`], [`matches`])
//! - [`binding`] - binding sets and their per-occurrence-site algebra
//! - [`rule`] - rules and binding set handlers
//! - [`store`] - the rule pool with neighbour discovery
//! - [`reasoner`] - reasoning graphs, task board and plan execution
//!
//! # Example
//!
//! ```rust,ignore
//! use ke_reasoner::{BindingSet, Reasoner, Rule, Table, TableBindingSetHandler};
//!
//! let mut reasoner = Reasoner::new();
//! reasoner.load_rules("?x <isAncestorOf> ?y .\n?y <isAncestorOf> ?z .\n->\n?x <isAncestorOf> ?z .\n")?;
//!
//! let table = Table::new(&["a", "b"], &["<barry>,<fenna>", "<janny>,<barry>"])?;
//! let facts = reasoner.parse_pattern("?a <isAncestorOf> ?b")?;
//! reasoner.add_rule(Rule::with_handler(Default::default(), facts, TableBindingSetHandler::new(table))?);
//!
//! let goal = reasoner.parse_pattern("?x <isAncestorOf> ?y")?;
//! let answers = reasoner.query(goal, &BindingSet::new()).await?;
//! assert_eq!(answers.len(), 3);
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod logging;
pub mod matching;
pub mod parser;
pub mod reasoner;
pub mod rule;
pub mod store;
pub mod term;

// Re-export term types
pub use term::{Datatype, GraphPattern, Literal, Position, Term, TripleNode, TriplePattern, Uri, Variable};

// Re-export parser types
pub use parser::{
    parse_binding, parse_binding_set, parse_graph_pattern, parse_rules, parse_term, parse_triple_pattern,
    ParseError, ParserState,
};

// Re-export matching and binding types
pub use matching::{matches, Match, MatchStrategy};
pub use binding::{Binding, BindingSet, TripleVarBinding, TripleVarBindingSet};

// Re-export rule types
pub use rule::{
    BindingSetHandler, CollectingSinkHandler, Handler, Rule, RuleKind, SinkBindingSetHandler, Table,
    TableBindingSetHandler, TransformBindingSetHandler, TrivialBindingSetHandler,
};

// Re-export store and reasoner types
pub use store::{RuleId, RuleStore};
pub use reasoner::{NodeId, NodeState, PlanOptions, Reasoner, ReasonerPlan, ReasoningNode, TaskBoard};

// Re-export configuration types
pub use config::{ConfigError, GeneralConfig, LogLevel, OutputFormat, ProfileConfig, ReasonerConfig, ReasoningConfig, ReasoningProfile};

// Re-export error types
pub use error::{ErrorCode, ErrorContext, ReasonerError, ReasonerResult};
