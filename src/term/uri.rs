//! IRI representation

use std::fmt;

/// An IRI reference
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uri {
    value: String,
}

impl Uri {
    /// Create a new IRI
    pub fn new(value: String) -> Self {
        Uri { value }
    }

    /// Get the IRI as a string slice
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Get the namespace (everything up to and including the last # or /)
    pub fn namespace(&self) -> &str {
        if let Some(pos) = self.value.rfind('#') {
            &self.value[..=pos]
        } else if let Some(pos) = self.value.rfind('/') {
            &self.value[..=pos]
        } else {
            &self.value
        }
    }

    /// Get the local name (fragment or last path segment)
    pub fn local_name(&self) -> &str {
        if let Some(pos) = self.value.rfind('#') {
            &self.value[pos + 1..]
        } else if let Some(pos) = self.value.rfind('/') {
            &self.value[pos + 1..]
        } else {
            &self.value
        }
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.value)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.value)
    }
}

impl From<&str> for Uri {
    fn from(s: &str) -> Self {
        Uri::new(s.to_string())
    }
}

impl From<String> for Uri {
    fn from(s: String) -> Self {
        Uri::new(s)
    }
}

/// Well-known namespace IRIs
pub mod ns {
    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
    pub const OWL: &str = "http://www.w3.org/2002/07/owl#";

    pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
    pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

    /// `rdf:type`
    pub fn rdf_type() -> String {
        format!("{}type", RDF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace() {
        let uri = Uri::new("http://example.org/foo#bar".into());
        assert_eq!(uri.namespace(), "http://example.org/foo#");
        assert_eq!(uri.local_name(), "bar");

        let uri2 = Uri::new("http://example.org/sensors/sensor1".into());
        assert_eq!(uri2.namespace(), "http://example.org/sensors/");
        assert_eq!(uri2.local_name(), "sensor1");
    }

    #[test]
    fn test_relative_iri_has_no_namespace() {
        let uri = Uri::from("isAncestorOf");
        assert_eq!(uri.namespace(), "isAncestorOf");
        assert_eq!(uri.to_string(), "<isAncestorOf>");
    }
}
