//! Triple-pattern parser
//!
//! This module implements a small nom-based parser for the textual forms the
//! reasoner consumes:
//! - terms: `<iri>`, `prefix:local`, `?var`, `"literal"@lang`, `"1.0"^^xsd:float`, numbers, booleans
//! - triple patterns and graph patterns (`.` separated)
//! - binding sets: `a=<x>,b="1" | a=<y>,b="2"`
//! - rule files: triple lines, `->` between antecedent and consequent,
//!   a blank line between rules, `@prefix` lines and `#` comments

use std::sync::Arc;

use nom::{
    IResult,
    bytes::complete::{tag, take_while, take_while1, take_until},
    character::complete::{char, multispace1, digit1},
    combinator::{opt, map, value, recognize, peek},
    sequence::{delimited, preceded, pair, tuple},
    branch::alt,
    multi::many0,
};

use indexmap::IndexMap;

use crate::binding::{Binding, BindingSet};
use crate::term::{GraphPattern, Literal, Term, TriplePattern, Uri, Variable};
use crate::term::uri::ns;

/// Parser error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Undefined prefix: {prefix}")]
    UndefinedPrefix { prefix: String },

    #[error("Invalid rule on line {line}: {message}")]
    InvalidRule { line: usize, message: String },

    #[error("Unexpected end of input")]
    UnexpectedEof,
}

/// Parser state holding prefix mappings
#[derive(Debug, Clone, Default)]
pub struct ParserState {
    /// Prefix to namespace mappings
    prefixes: IndexMap<String, String>,
}

impl ParserState {
    pub fn new() -> Self {
        let mut state = Self::default();
        state.add_prefix("rdf", ns::RDF);
        state.add_prefix("rdfs", ns::RDFS);
        state.add_prefix("xsd", ns::XSD);
        state.add_prefix("owl", ns::OWL);
        state
    }

    /// Create a state with the standard prefixes plus `extra`
    pub fn with_prefixes<'a>(extra: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let mut state = Self::new();
        for (prefix, namespace) in extra {
            state.add_prefix(prefix, namespace);
        }
        state
    }

    pub fn add_prefix(&mut self, prefix: &str, namespace: &str) {
        self.prefixes.insert(prefix.to_string(), namespace.to_string());
    }

    pub fn resolve_prefix(&self, prefix: &str, local: &str) -> Result<Uri, ParseError> {
        if let Some(ns) = self.prefixes.get(prefix) {
            Ok(Uri::new(format!("{}{}", ns, local)))
        } else {
            Err(ParseError::UndefinedPrefix { prefix: prefix.to_string() })
        }
    }

    pub fn prefixes(&self) -> &IndexMap<String, String> {
        &self.prefixes
    }
}

// ============================================================================
// Lexical combinators
// ============================================================================

/// Parse whitespace and comments
fn ws(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), preceded(char('#'), take_while(|c| c != '\n'))),
        )))
    )(input)
}

/// Parse inline whitespace only (no newlines, no comments)
fn inline_ws(input: &str) -> IResult<&str, &str> {
    take_while(|c| c == ' ' || c == '\t')(input)
}

/// Parse an IRI reference <...>
fn iri_ref(input: &str) -> IResult<&str, &str> {
    delimited(
        char('<'),
        take_while(|c| c != '>' && c != ' ' && c != '\n' && c != '\r'),
        char('>'),
    )(input)
}

/// Parse a prefixed name (prefix:local)
///
/// A trailing `.` is left in the input: it terminates the triple.
fn prefixed_name(input: &str) -> IResult<&str, (&str, &str)> {
    let pn_chars = |c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.';

    let (rest, prefix) = take_while(|c: char| c.is_alphanumeric() || c == '_')(input)?;
    let (rest, _) = char(':')(rest)?;
    let (_, local) = take_while(pn_chars)(rest)?;

    let local = local.trim_end_matches('.');
    Ok((&rest[local.len()..], (prefix, local)))
}

/// Parse a string literal with possible escape sequences
fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        // Long string """..."""
        map(
            delimited(
                tag("\"\"\""),
                take_until("\"\"\""),
                tag("\"\"\""),
            ),
            unescape_string
        ),
        // Short string "..."
        map(
            delimited(
                char('"'),
                recognize(many0(alt((
                    take_while1(|c| c != '"' && c != '\\' && c != '\n'),
                    recognize(pair(char('\\'), escaped_char)),
                )))),
                char('"'),
            ),
            unescape_string
        ),
        // Single-quoted string '...'
        map(
            delimited(
                char('\''),
                take_while(|c| c != '\'' && c != '\n'),
                char('\''),
            ),
            unescape_string
        ),
    ))(input)
}

/// Consume exactly one character after a backslash
fn escaped_char(input: &str) -> IResult<&str, &str> {
    nom::bytes::complete::take(1usize)(input)
}

/// Unescape common escape sequences
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Parse a variable ?name
fn variable(input: &str) -> IResult<&str, Variable> {
    let (input, _) = char('?')(input)?;
    let (input, name) = take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)?;
    Ok((input, Variable::new(name)))
}

/// Parse a numeric literal
fn numeric_literal(input: &str) -> IResult<&str, Literal> {
    let (input, sign) = opt(alt((char('-'), char('+'))))(input)?;
    let (input, digits) = digit1(input)?;
    let (input, decimal) = opt(pair(char('.'), digit1))(input)?;
    let (input, exp) = opt(tuple((alt((char('e'), char('E'))), opt(alt((char('+'), char('-')))), digit1)))(input)?;

    let mut value = String::new();
    if sign == Some('-') {
        value.push('-');
    }
    value.push_str(digits);

    let datatype = if exp.is_some() {
        if let Some((_, frac)) = decimal {
            value.push('.');
            value.push_str(frac);
        }
        if let Some((e, sign, exp_digits)) = exp {
            value.push(e);
            if let Some(s) = sign {
                value.push(s);
            }
            value.push_str(exp_digits);
        }
        ns::XSD_DOUBLE
    } else if let Some((_, frac)) = decimal {
        value.push('.');
        value.push_str(frac);
        ns::XSD_DECIMAL
    } else {
        ns::XSD_INTEGER
    };

    Ok((input, Literal::typed(value, datatype.to_string())))
}

/// Parse a boolean literal
fn boolean_literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(tag("true"), |_| Literal::typed("true".to_string(), ns::XSD_BOOLEAN.to_string())),
        map(tag("false"), |_| Literal::typed("false".to_string(), ns::XSD_BOOLEAN.to_string())),
    ))(input)
}

/// Parse 'a' as rdf:type
fn rdf_type_shorthand(input: &str) -> IResult<&str, ()> {
    let (input, _) = char('a')(input)?;
    // Make sure 'a' is not part of a longer word
    let (input, _) = peek(alt((
        value((), multispace1),
        value((), char('<')),
        value((), char('?')),
    )))(input)?;
    Ok((input, ()))
}

/// Parse a binding variable name, with or without the leading `?`
fn binding_name(input: &str) -> IResult<&str, Variable> {
    let (input, _) = opt(char('?'))(input)?;
    let (input, name) = take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)?;
    Ok((input, Variable::new(name)))
}

fn syntax_error(original: &str, remaining: &str, message: impl Into<String>) -> ParseError {
    ParseError::Syntax {
        position: original.len() - remaining.len(),
        message: message.into(),
    }
}

// ============================================================================
// Pattern parser
// ============================================================================

/// Parser for terms, triple patterns and binding sets
///
/// The parser borrows a `ParserState` for prefix resolution; rule files
/// extend their own state with `@prefix` lines.
pub struct PatternParser<'s> {
    state: &'s ParserState,
}

impl<'s> PatternParser<'s> {
    pub fn new(state: &'s ParserState) -> Self {
        PatternParser { state }
    }

    /// Parse a term
    fn parse_term<'a>(&self, input: &'a str) -> Result<(&'a str, Term), ParseError> {
        // Try IRI
        if let Ok((rest, uri)) = iri_ref(input) {
            return Ok((rest, Term::uri(uri)));
        }

        // Try variable
        if let Ok((rest, var)) = variable(input) {
            return Ok((rest, Term::Variable(var)));
        }

        // Try literal
        if input.starts_with('"') || input.starts_with('\'') {
            return self.parse_literal(input);
        }

        // Try numeric literal
        if input.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+') {
            if let Ok((rest, lit)) = numeric_literal(input) {
                return Ok((rest, Term::Literal(Arc::new(lit))));
            }
        }

        // Try boolean
        if let Ok((rest, lit)) = boolean_literal(input) {
            if !rest.starts_with(|c: char| c.is_alphanumeric() || c == ':') {
                return Ok((rest, Term::Literal(Arc::new(lit))));
            }
        }

        // Try 'a' shorthand
        if let Ok((rest, ())) = rdf_type_shorthand(input) {
            return Ok((rest, Term::uri(ns::rdf_type())));
        }

        // Try prefixed name
        if let Ok((rest, (prefix, local))) = prefixed_name(input) {
            let uri = self.state.resolve_prefix(prefix, local)?;
            return Ok((rest, Term::Uri(Arc::new(uri))));
        }

        Err(ParseError::Syntax {
            position: 0,
            message: format!("Cannot parse term starting with: {}", &input[..input.len().min(20)]),
        })
    }

    /// Parse a literal with optional datatype or language tag
    fn parse_literal<'a>(&self, input: &'a str) -> Result<(&'a str, Term), ParseError> {
        let (input, value) = string_literal(input)
            .map_err(|_| ParseError::Syntax { position: 0, message: "Invalid string literal".to_string() })?;

        // Check for language tag
        if let Ok((rest, _)) = char::<&str, nom::error::Error<&str>>('@')(input) {
            let (rest, lang) = take_while1(|c: char| c.is_alphanumeric() || c == '-')(rest)
                .map_err(|_: nom::Err<nom::error::Error<&str>>| ParseError::Syntax { position: 0, message: "Invalid language tag".to_string() })?;
            return Ok((rest, Term::lang_literal(value, lang)));
        }

        // Check for datatype
        if let Some(input) = input.strip_prefix("^^") {
            // IRI datatype
            if let Ok((rest, dt_uri)) = iri_ref(input) {
                return Ok((rest, Term::typed_literal(value, dt_uri)));
            }

            // Prefixed datatype
            if let Ok((rest, (prefix, local))) = prefixed_name(input) {
                let uri = self.state.resolve_prefix(prefix, local)?;
                return Ok((rest, Term::typed_literal(value, uri.as_str())));
            }

            return Err(ParseError::Syntax { position: 0, message: "Invalid datatype".to_string() });
        }

        // Plain literal
        Ok((input, Term::literal(value)))
    }

    /// Parse `subject predicate object`, leaving any terminating `.` in place
    fn parse_triple<'a>(&self, input: &'a str) -> Result<(&'a str, TriplePattern), ParseError> {
        let (input, subject) = self.parse_term(input)?;
        let (input, _) = ws(input).map_err(|_| ParseError::UnexpectedEof)?;
        let (input, predicate) = self.parse_term(input)?;
        let (input, _) = ws(input).map_err(|_| ParseError::UnexpectedEof)?;
        let (input, object) = self.parse_term(input)?;
        Ok((input, TriplePattern::new(subject, predicate, object)))
    }

    /// Parse a `.` separated sequence of triple patterns
    fn parse_graph<'a>(&self, original: &'a str) -> Result<GraphPattern, ParseError> {
        let mut pattern = GraphPattern::new();
        let (mut remaining, _) = ws(original).map_err(|_| ParseError::UnexpectedEof)?;

        while !remaining.is_empty() {
            let (rest, triple) = self
                .parse_triple(remaining)
                .map_err(|e| relocate(e, original, remaining))?;
            pattern.insert(triple);

            let (rest, _) = ws(rest).map_err(|_| ParseError::UnexpectedEof)?;
            let rest = match rest.strip_prefix('.') {
                Some(after) => after,
                None if rest.is_empty() => rest,
                None => return Err(syntax_error(original, rest, "Expected '.' between triple patterns")),
            };
            let (rest, _) = ws(rest).map_err(|_| ParseError::UnexpectedEof)?;
            remaining = rest;
        }

        Ok(pattern)
    }

    /// Parse a single binding `a=<x>, ?b="1"`
    fn parse_binding<'a>(&self, original: &'a str) -> Result<(&'a str, Binding), ParseError> {
        let mut binding = Binding::new();
        let (mut remaining, _) = inline_ws(original).map_err(|_| ParseError::UnexpectedEof)?;

        while !remaining.is_empty() && !remaining.starts_with('|') {
            let (rest, var) = binding_name(remaining)
                .map_err(|_| syntax_error(original, remaining, "Expected variable name"))?;
            let (rest, _) = inline_ws(rest).map_err(|_| ParseError::UnexpectedEof)?;
            let rest = rest
                .strip_prefix('=')
                .ok_or_else(|| syntax_error(original, rest, "Expected '=' after variable name"))?;
            let (rest, _) = inline_ws(rest).map_err(|_| ParseError::UnexpectedEof)?;
            let (rest, term) = self
                .parse_term(rest)
                .map_err(|e| relocate(e, original, rest))?;
            if term.is_variable() {
                return Err(syntax_error(original, rest, format!("Variable {} cannot be bound to a variable", var)));
            }
            binding.insert(var, term);

            let (rest, _) = inline_ws(rest).map_err(|_| ParseError::UnexpectedEof)?;
            remaining = match rest.strip_prefix(',') {
                Some(after) => inline_ws(after).map_err(|_| ParseError::UnexpectedEof)?.0,
                None => rest,
            };
            if !remaining.is_empty() && !remaining.starts_with('|') && rest.len() == remaining.len() {
                return Err(syntax_error(original, remaining, "Expected ',' or '|' between bindings"));
            }
        }

        Ok((remaining, binding))
    }
}

fn relocate(err: ParseError, original: &str, remaining: &str) -> ParseError {
    match err {
        ParseError::Syntax { position, message } => ParseError::Syntax {
            position: position + original.len() - remaining.len(),
            message,
        },
        other => other,
    }
}

// ============================================================================
// Public entry points
// ============================================================================

/// Parse a single term from a string
pub fn parse_term(input: &str, state: &ParserState) -> Result<Term, ParseError> {
    let input = input.trim();
    let (rest, term) = PatternParser::new(state).parse_term(input)?;
    if !rest.trim().is_empty() {
        return Err(syntax_error(input, rest, "Trailing input after term"));
    }
    Ok(term)
}

/// Parse a single triple pattern, with or without a trailing `.`
pub fn parse_triple_pattern(input: &str, state: &ParserState) -> Result<TriplePattern, ParseError> {
    let input = input.trim();
    let (rest, triple) = PatternParser::new(state).parse_triple(input)?;
    let rest = rest.trim();
    if !(rest.is_empty() || rest == ".") {
        return Err(syntax_error(input, rest, "Trailing input after triple pattern"));
    }
    Ok(triple)
}

/// Parse a graph pattern: triple patterns separated by `.`
pub fn parse_graph_pattern(input: &str, state: &ParserState) -> Result<GraphPattern, ParseError> {
    PatternParser::new(state).parse_graph(input.trim())
}

/// Parse a single binding, e.g. `a=<sensor1>, b="22.0"^^xsd:float`
pub fn parse_binding(input: &str, state: &ParserState) -> Result<Binding, ParseError> {
    let input = input.trim();
    let (rest, binding) = PatternParser::new(state).parse_binding(input)?;
    if !rest.is_empty() {
        return Err(syntax_error(input, rest, "Trailing input after binding"));
    }
    Ok(binding)
}

/// Parse a binding set: bindings separated by `|`
///
/// An empty or blank input is the empty binding set.
pub fn parse_binding_set(input: &str, state: &ParserState) -> Result<BindingSet, ParseError> {
    let original = input.trim();
    let parser = PatternParser::new(state);
    let mut set = BindingSet::new();
    let mut remaining = original;

    while !remaining.is_empty() {
        let (rest, binding) = parser
            .parse_binding(remaining)
            .map_err(|e| relocate(e, original, remaining))?;
        set.insert(binding);
        remaining = match rest.strip_prefix('|') {
            Some(after) => after.trim_start(),
            None => rest,
        };
    }

    Ok(set)
}

/// A rule as written in a rule file, before a handler is attached
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSource {
    pub antecedent: GraphPattern,
    pub consequent: GraphPattern,
    /// 1-based line number the rule starts on
    pub line: usize,
}

/// Result of parsing a rule file
#[derive(Debug, Clone, Default)]
pub struct ParsedRules {
    pub rules: Vec<RuleSource>,
    pub prefixes: IndexMap<String, String>,
}

/// Parse a rule file
///
/// Each non-empty line holds one triple pattern. A line containing only
/// `->` switches from antecedent to consequent; a blank line closes the
/// current rule. Lines starting with `#` are ignored and `@prefix p: <ns> .`
/// declares a prefix for the rest of the file.
pub fn parse_rules(input: &str, state: &ParserState) -> Result<ParsedRules, ParseError> {
    let mut state = state.clone();
    let mut rules = Vec::new();
    let mut antecedent = GraphPattern::new();
    let mut consequent = GraphPattern::new();
    let mut in_antecedent = true;
    let mut start_line = 1;

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();

        if trimmed.starts_with('#') {
            continue;
        }

        if trimmed.is_empty() {
            if !antecedent.is_empty() || !consequent.is_empty() {
                rules.push(RuleSource {
                    antecedent: std::mem::take(&mut antecedent),
                    consequent: std::mem::take(&mut consequent),
                    line: start_line,
                });
            }
            in_antecedent = true;
            start_line = line_no + 1;
        } else if trimmed == "->" {
            in_antecedent = !in_antecedent;
        } else if let Some(directive) = trimmed.strip_prefix("@prefix") {
            parse_prefix_line(directive, &mut state)
                .map_err(|message| ParseError::InvalidRule { line: line_no, message })?;
            start_line = line_no + 1;
        } else {
            let triple = parse_triple_pattern(trimmed, &state)
                .map_err(|e| ParseError::InvalidRule { line: line_no, message: e.to_string() })?;
            if in_antecedent {
                antecedent.insert(triple);
            } else {
                consequent.insert(triple);
            }
        }
    }

    if !antecedent.is_empty() || !consequent.is_empty() {
        rules.push(RuleSource { antecedent, consequent, line: start_line });
    }

    Ok(ParsedRules { rules, prefixes: state.prefixes })
}

/// Parse the remainder of an `@prefix` line
fn parse_prefix_line(input: &str, state: &mut ParserState) -> Result<(), String> {
    let (input, _) = ws(input).map_err(|_| "Unexpected end of prefix".to_string())?;
    let (input, prefix) = take_while::<_, &str, nom::error::Error<&str>>(|c: char| c.is_alphanumeric() || c == '_')(input)
        .map_err(|_| "Expected prefix name".to_string())?;
    let (input, _) = char::<&str, nom::error::Error<&str>>(':')(input)
        .map_err(|_| "Expected ':' after prefix".to_string())?;
    let (input, _) = ws(input).map_err(|_| "Unexpected end of prefix".to_string())?;
    let (input, namespace) = iri_ref(input)
        .map_err(|_| "Expected IRI for namespace".to_string())?;

    let rest = input.trim();
    if !(rest.is_empty() || rest == ".") {
        return Err(format!("Unexpected input after prefix directive: {}", rest));
    }

    state.add_prefix(prefix, namespace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ParserState {
        let mut state = ParserState::new();
        state.add_prefix("ex", "http://example.org/");
        state
    }

    #[test]
    fn test_iri_ref() {
        let result = iri_ref("<http://example.org/>").unwrap();
        assert_eq!(result.1, "http://example.org/");
    }

    #[test]
    fn test_prefixed_name_leaves_terminating_dot() {
        let (rest, (prefix, local)) = prefixed_name("ex:sensor1 .").unwrap();
        assert_eq!((prefix, local), ("ex", "sensor1"));
        assert_eq!(rest, " .");

        let (rest, (_, local)) = prefixed_name("ex:sensor1.").unwrap();
        assert_eq!(local, "sensor1");
        assert_eq!(rest, ".");
    }

    #[test]
    fn test_string_literal() {
        let result = string_literal("\"hello world\"").unwrap();
        assert_eq!(result.1, "hello world");

        let escaped = string_literal(r#""say \"hi\"""#).unwrap();
        assert_eq!(escaped.1, "say \"hi\"");
    }

    #[test]
    fn test_variable() {
        let result = variable("?x").unwrap();
        assert_eq!(result.1.name(), "x");
    }

    #[test]
    fn test_parse_terms() {
        let s = state();
        assert_eq!(parse_term("<sensor1>", &s).unwrap(), Term::uri("sensor1"));
        assert_eq!(parse_term("?p", &s).unwrap(), Term::var("p"));
        assert_eq!(parse_term("ex:Sensor", &s).unwrap(), Term::uri("http://example.org/Sensor"));
        assert_eq!(
            parse_term("\"22.0\"^^<http://www.w3.org/2001/XMLSchema#float>", &s).unwrap(),
            Term::typed_literal("22.0", ns::XSD_FLOAT)
        );
        assert_eq!(
            parse_term("\"21.0\"^^xsd:float", &s).unwrap(),
            Term::typed_literal("21.0", ns::XSD_FLOAT)
        );
        assert_eq!(parse_term("\"douche\"@nl", &s).unwrap(), Term::lang_literal("douche", "nl"));
        assert_eq!(parse_term("42", &s).unwrap(), Term::typed_literal("42", ns::XSD_INTEGER));
        assert_eq!(parse_term("true", &s).unwrap(), Term::typed_literal("true", ns::XSD_BOOLEAN));
    }

    #[test]
    fn test_undefined_prefix() {
        let err = parse_term("foo:bar", &state()).unwrap_err();
        assert_eq!(err, ParseError::UndefinedPrefix { prefix: "foo".into() });
    }

    #[test]
    fn test_parse_triple_pattern() {
        let tp = parse_triple_pattern("?a <type> <Sensor> .", &state()).unwrap();
        assert_eq!(tp.subject(), &Term::var("a"));
        assert_eq!(tp.predicate(), &Term::uri("type"));
        assert_eq!(tp.object(), &Term::uri("Sensor"));
    }

    #[test]
    fn test_parse_rdf_type_shorthand() {
        let tp = parse_triple_pattern("?a a ex:Sensor", &state()).unwrap();
        assert_eq!(tp.predicate(), &Term::uri(ns::rdf_type()));
    }

    #[test]
    fn test_parse_graph_pattern() {
        let gp = parse_graph_pattern("?p <type> <Sensor> . ?p <hasValInC> ?q .", &state()).unwrap();
        assert_eq!(gp.len(), 2);

        let single = parse_graph_pattern("?x <isAncestorOf> ?y", &state()).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_parse_graph_pattern_with_numbers() {
        let gp = parse_graph_pattern("?s ex:hasV 22 . ?s ex:hasW 21.5 .", &state()).unwrap();
        assert_eq!(gp.len(), 2);
    }

    #[test]
    fn test_parse_graph_pattern_missing_separator() {
        let err = parse_graph_pattern("?a <b> ?c ?d <e> ?f", &state()).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn test_parse_binding_set() {
        let bs = parse_binding_set("a=<barry>,b=<fenna>|a=<janny>, ?b=<barry>", &state()).unwrap();
        assert_eq!(bs.len(), 2);
        let first = bs.iter().next().unwrap();
        assert_eq!(first.get(&Variable::new("a")), Some(&Term::uri("barry")));
    }

    #[test]
    fn test_parse_binding_with_literals() {
        let b = parse_binding("a=<sensor1>, b=\"22.0\"^^xsd:float, c=\"x,y\"", &state()).unwrap();
        assert_eq!(b.len(), 3);
        assert_eq!(b.get(&Variable::new("c")), Some(&Term::literal("x,y")));
    }

    #[test]
    fn test_parse_empty_binding_set() {
        assert!(parse_binding_set("", &state()).unwrap().is_empty());
        assert!(parse_binding_set("   ", &state()).unwrap().is_empty());
    }

    #[test]
    fn test_binding_cannot_hold_variable() {
        assert!(parse_binding("a=?b", &state()).is_err());
    }

    #[test]
    fn test_parse_rules() {
        let input = r#"
# transitivity
@prefix fam: <http://example.org/family#> .
?x fam:isAncestorOf ?y
?y fam:isAncestorOf ?z
->
?x fam:isAncestorOf ?z

->
<http://example.org/family#barry> fam:isAncestorOf <http://example.org/family#fenna>
"#;
        let parsed = parse_rules(input, &ParserState::new()).unwrap();
        assert_eq!(parsed.rules.len(), 2);
        assert_eq!(parsed.rules[0].antecedent.len(), 2);
        assert_eq!(parsed.rules[0].consequent.len(), 1);
        assert!(parsed.rules[1].antecedent.is_empty());
        assert_eq!(parsed.rules[1].consequent.len(), 1);
        assert!(parsed.prefixes.contains_key("fam"));
    }

    #[test]
    fn test_parse_rules_reports_line() {
        let input = "?a <b> ?c\n->\n?a <d\n";
        let err = parse_rules(input, &ParserState::new()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidRule { line: 3, .. }));
    }
}
