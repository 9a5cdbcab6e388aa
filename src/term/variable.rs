//! Variable representation for triple patterns

use std::fmt;
use std::sync::Arc;

/// A named variable
///
/// Variables carry no identity beyond their name: two occurrences of `?x`
/// in the same graph pattern denote the same variable.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    name: Arc<str>,
}

impl Variable {
    /// Create a variable with the given name (without the leading `?`)
    pub fn new(name: impl AsRef<str>) -> Self {
        Variable {
            name: Arc::from(name.as_ref().trim_start_matches('?')),
        }
    }

    /// Get the variable name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}

impl From<&str> for Variable {
    fn from(s: &str) -> Self {
        Variable::new(s)
    }
}
