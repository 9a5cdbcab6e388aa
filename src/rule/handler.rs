//! Binding-set handlers attached to rules
//!
//! A handler turns the bindings that satisfy one side of a rule into the
//! bindings that satisfy the other side. Handlers are asynchronous so they can
//! be backed by remote peers; the reasoner only awaits their results when the
//! task board is drained.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::binding::{Binding, BindingSet};
use crate::error::{ErrorCode, ReasonerError, ReasonerResult};
use crate::parser::{parse_term, ParserState};
use crate::term::{graph_pattern_variables, GraphPattern, Variable};

/// Produces consequent bindings from antecedent bindings
#[async_trait]
pub trait BindingSetHandler: Send + Sync {
    async fn handle(&self, bindings: BindingSet) -> ReasonerResult<BindingSet>;
}

/// Consumes bindings without producing any, for rules with no consequent
#[async_trait]
pub trait SinkBindingSetHandler: Send + Sync {
    async fn handle(&self, bindings: BindingSet) -> ReasonerResult<()>;
}

// ============================================================================
// Trivial handler
// ============================================================================

/// Copies the consequent's variables out of each antecedent binding
#[derive(Debug, Clone)]
pub struct TrivialBindingSetHandler {
    variables: BTreeSet<Variable>,
}

impl TrivialBindingSetHandler {
    pub fn new(consequent: &GraphPattern) -> Self {
        TrivialBindingSetHandler {
            variables: graph_pattern_variables(consequent),
        }
    }
}

#[async_trait]
impl BindingSetHandler for TrivialBindingSetHandler {
    async fn handle(&self, bindings: BindingSet) -> ReasonerResult<BindingSet> {
        let mut result = BindingSet::new();
        for binding in &bindings {
            let mut out = Binding::new();
            for var in &self.variables {
                let term = binding
                    .get(var)
                    .ok_or_else(|| ReasonerError::missing_variable(var.name()))?;
                out.insert(var.clone(), term.clone());
            }
            result.insert(out);
        }
        Ok(result)
    }
}

// ============================================================================
// Table handler
// ============================================================================

/// A fixed table of bindings, one row per binding
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Variable>,
    rows: BindingSet,
}

impl Table {
    /// Build a table from column names and comma separated rows of terms,
    /// e.g. `["a", "b"]` with `["<sensor1>,\"22.0\"^^xsd:float"]`.
    pub fn new(columns: &[&str], rows: &[&str]) -> ReasonerResult<Self> {
        Self::with_state(columns, rows, &ParserState::new())
    }

    /// Like [`Table::new`], resolving prefixed names against `state`
    pub fn with_state(columns: &[&str], rows: &[&str], state: &ParserState) -> ReasonerResult<Self> {
        if columns.is_empty() {
            return Err(ReasonerError::new(ErrorCode::InvalidTable, "A table needs at least one column"));
        }
        let columns: Vec<Variable> = columns.iter().map(Variable::new).collect();

        let mut table = BindingSet::new();
        for (index, row) in rows.iter().enumerate() {
            let cells: Vec<&str> = row.split(',').map(str::trim).collect();
            if cells.len() != columns.len() {
                return Err(ReasonerError::new(
                    ErrorCode::InvalidTable,
                    format!(
                        "Row {} has {} values but the table has {} columns",
                        index,
                        cells.len(),
                        columns.len()
                    ),
                ));
            }

            let mut binding = Binding::new();
            for (var, cell) in columns.iter().zip(cells) {
                let term = parse_term(cell, state).map_err(|e| {
                    ReasonerError::from(e)
                        .with_code(ErrorCode::InvalidTable)
                        .with_context("row", index.to_string())
                })?;
                binding.insert(var.clone(), term);
            }
            table.insert(binding);
        }

        Ok(Table { columns, rows: table })
    }

    /// A table whose rows are the given bindings
    pub fn from_bindings(bindings: BindingSet) -> Self {
        let columns: BTreeSet<Variable> = bindings
            .iter()
            .flat_map(|b| b.variables().cloned())
            .collect();
        Table {
            columns: columns.into_iter().collect(),
            rows: bindings,
        }
    }

    pub fn columns(&self) -> &[Variable] {
        &self.columns
    }

    pub fn rows(&self) -> &BindingSet {
        &self.rows
    }

    /// Rows that agree with `query` on every column it binds.
    /// Variables outside the table's columns are ignored.
    pub fn query(&self, query: &Binding) -> BindingSet {
        self.rows
            .iter()
            .filter(|row| row.is_compatible(query))
            .cloned()
            .collect()
    }
}

/// Answers from a static [`Table`]
#[derive(Debug, Clone)]
pub struct TableBindingSetHandler {
    table: Table,
}

impl TableBindingSetHandler {
    pub fn new(table: Table) -> Self {
        TableBindingSetHandler { table }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

#[async_trait]
impl BindingSetHandler for TableBindingSetHandler {
    async fn handle(&self, bindings: BindingSet) -> ReasonerResult<BindingSet> {
        if bindings.is_empty() {
            return Ok(self.table.rows().clone());
        }

        let mut result = BindingSet::new();
        for binding in &bindings {
            result.union_with(&self.table.query(binding));
        }
        trace!(incoming = bindings.len(), rows = result.len(), "table lookup");
        Ok(result)
    }
}

// ============================================================================
// Closure handlers
// ============================================================================

/// Wraps a synchronous function over binding sets
pub struct TransformBindingSetHandler<F> {
    transform: F,
}

impl<F> TransformBindingSetHandler<F>
where
    F: Fn(BindingSet) -> ReasonerResult<BindingSet> + Send + Sync,
{
    pub fn new(transform: F) -> Self {
        TransformBindingSetHandler { transform }
    }
}

#[async_trait]
impl<F> BindingSetHandler for TransformBindingSetHandler<F>
where
    F: Fn(BindingSet) -> ReasonerResult<BindingSet> + Send + Sync,
{
    async fn handle(&self, bindings: BindingSet) -> ReasonerResult<BindingSet> {
        (self.transform)(bindings)
    }
}

/// A sink that remembers every binding set it receives
#[derive(Debug, Clone, Default)]
pub struct CollectingSinkHandler {
    received: Arc<Mutex<Vec<BindingSet>>>,
}

impl CollectingSinkHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// All binding sets received so far, in arrival order
    pub async fn received(&self) -> Vec<BindingSet> {
        self.received.lock().await.clone()
    }

    /// Union of everything received so far
    pub async fn all_bindings(&self) -> BindingSet {
        let mut all = BindingSet::new();
        for set in self.received.lock().await.iter() {
            all.union_with(set);
        }
        all
    }
}

#[async_trait]
impl SinkBindingSetHandler for CollectingSinkHandler {
    async fn handle(&self, bindings: BindingSet) -> ReasonerResult<()> {
        self.received.lock().await.push(bindings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_binding_set, parse_graph_pattern};
    use crate::term::Term;

    fn bs(text: &str) -> BindingSet {
        parse_binding_set(text, &ParserState::new()).unwrap()
    }

    #[tokio::test]
    async fn test_trivial_handler_copies_consequent_variables() {
        let consequent = parse_graph_pattern("?x <isAncestorOf> ?y", &ParserState::new()).unwrap();
        let handler = TrivialBindingSetHandler::new(&consequent);

        let out = handler.handle(bs("x=<barry>,y=<fenna>,z=<loes>")).await.unwrap();
        let binding = out.iter().next().unwrap();
        assert_eq!(binding.len(), 2);
        assert_eq!(binding.get_by_name("y"), Some(&Term::uri("fenna")));
    }

    #[tokio::test]
    async fn test_trivial_handler_rejects_missing_variable() {
        let consequent = parse_graph_pattern("?x <hasValInC> ?z", &ParserState::new()).unwrap();
        let handler = TrivialBindingSetHandler::new(&consequent);

        let err = handler.handle(bs("x=<sensor1>,y=\"70\"")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingVariable);
    }

    #[test]
    fn test_table_rejects_ragged_rows() {
        let err = Table::new(&["a", "b"], &["<sensor1>"]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTable);
    }

    #[tokio::test]
    async fn test_table_handler_selects_compatible_rows() {
        let table = Table::new(
            &["a", "b"],
            &[
                "<sensor1>,\"22.0\"^^<http://www.w3.org/2001/XMLSchema#float>",
                "<sensor2>,\"21.0\"^^<http://www.w3.org/2001/XMLSchema#float>",
            ],
        )
        .unwrap();
        let handler = TableBindingSetHandler::new(table);

        let all = handler.handle(BindingSet::singleton(Binding::new())).await.unwrap();
        assert_eq!(all.len(), 2);

        let one = handler.handle(bs("a=<sensor2>,unrelated=<x>")).await.unwrap();
        assert_eq!(one.len(), 1);
        assert!(one.iter().all(|b| b.get_by_name("a") == Some(&Term::uri("sensor2"))));

        let none = handler.handle(bs("a=<sensor9>")).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_transform_handler_runs_closure() {
        let handler = TransformBindingSetHandler::new(|input: BindingSet| {
            Ok(input
                .iter()
                .map(|b| b.clone().with("seen", Term::literal("yes")))
                .collect())
        });
        let out = handler.handle(bs("a=<x>")).await.unwrap();
        assert_eq!(out.iter().next().unwrap().get_by_name("seen"), Some(&Term::literal("yes")));
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingSinkHandler::new();
        sink.handle(bs("a=<x>")).await.unwrap();
        sink.handle(bs("a=<y> | a=<x>")).await.unwrap();
        assert_eq!(sink.received().await.len(), 2);
        assert_eq!(sink.all_bindings().await.len(), 2);
    }
}
