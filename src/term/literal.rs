//! Literal value representation

use std::fmt;

use super::uri::ns;

/// Datatype for a literal
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Datatype {
    /// Plain literal (no datatype)
    Plain,
    /// Language-tagged literal
    Language(String),
    /// Typed literal with datatype IRI
    Typed(String),
}

/// An RDF literal value
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    value: String,
    datatype: Datatype,
}

impl Literal {
    /// Create a plain literal
    pub fn plain(value: String) -> Self {
        Literal {
            value,
            datatype: Datatype::Plain,
        }
    }

    /// Create a typed literal
    pub fn typed(value: String, datatype: String) -> Self {
        Literal {
            value,
            datatype: Datatype::Typed(datatype),
        }
    }

    /// Create a language-tagged literal
    pub fn with_language(value: String, lang: String) -> Self {
        Literal {
            value,
            datatype: Datatype::Language(lang.to_lowercase()),
        }
    }

    /// Create an `xsd:float` literal from a number
    pub fn float(value: f64) -> Self {
        Literal::typed(format_number(value), ns::XSD_FLOAT.to_string())
    }

    /// Create an `xsd:integer` literal
    pub fn integer(value: i64) -> Self {
        Literal::typed(value.to_string(), ns::XSD_INTEGER.to_string())
    }

    /// Get the lexical value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Get the datatype
    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    /// Check if this is a plain literal
    pub fn is_plain(&self) -> bool {
        matches!(self.datatype, Datatype::Plain)
    }

    /// Get the language tag if present
    pub fn language(&self) -> Option<&str> {
        match &self.datatype {
            Datatype::Language(lang) => Some(lang),
            _ => None,
        }
    }

    /// Get the datatype IRI if present
    pub fn datatype_uri(&self) -> Option<&str> {
        match &self.datatype {
            Datatype::Typed(uri) => Some(uri),
            _ => None,
        }
    }

    /// Try to parse as an integer
    pub fn as_integer(&self) -> Option<i64> {
        self.value.parse().ok()
    }

    /// Try to parse as a float
    pub fn as_float(&self) -> Option<f64> {
        self.value.parse().ok()
    }
}

// Keeps a trailing ".0" on whole numbers so the lexical form stays a float.
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.datatype {
            Datatype::Plain => write!(f, "\"{}\"", escape(&self.value)),
            Datatype::Language(lang) => write!(f, "\"{}\"@{}", escape(&self.value), lang),
            Datatype::Typed(dt) => write!(f, "\"{}\"^^<{}>", escape(&self.value), dt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_literal() {
        let lit = Literal::plain("hello".into());
        assert_eq!(lit.value(), "hello");
        assert!(lit.is_plain());
        assert_eq!(format!("{}", lit), "\"hello\"");
    }

    #[test]
    fn test_typed_literal() {
        let lit = Literal::typed("42".into(), ns::XSD_INTEGER.into());
        assert_eq!(lit.as_integer(), Some(42));
        assert!(!lit.is_plain());
        assert_eq!(lit.datatype_uri(), Some(ns::XSD_INTEGER));
    }

    #[test]
    fn test_lang_literal() {
        let lit = Literal::with_language("hallo".into(), "NL".into());
        assert_eq!(lit.language(), Some("nl"));
        assert_eq!(format!("{}", lit), "\"hallo\"@nl");
    }

    #[test]
    fn test_float_keeps_decimal_point() {
        assert_eq!(Literal::float(22.0).value(), "22.0");
        assert_eq!(Literal::float(21.5).value(), "21.5");
        assert_eq!(Literal::float(22.0).as_float(), Some(22.0));
    }

    #[test]
    fn test_display_escapes_quotes() {
        let lit = Literal::plain("say \"hi\"".into());
        assert_eq!(lit.to_string(), "\"say \\\"hi\\\"\"");
    }
}
