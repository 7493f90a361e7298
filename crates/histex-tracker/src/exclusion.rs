use histex_store::Item;
use std::collections::HashSet;

/// Wrapper prefixes the host adds to rehydrated or projected objects.
const WRAPPER_PREFIXES: [&str; 2] = ["Deserialized.", "Selected."];

/// Type names that never become the last result.
#[derive(Debug, Clone, Default)]
pub struct ExclusionList {
    names: HashSet<String>,
}

impl ExclusionList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// A type name matches an entry `x` when, after stripping one wrapper
    /// prefix, it equals `x`, `Deserialized.x` or `Selected.x`.
    pub fn matches(&self, type_name: &str) -> bool {
        let base = strip_wrapper(type_name);
        if self.names.contains(base) {
            return true;
        }
        WRAPPER_PREFIXES
            .iter()
            .any(|prefix| self.names.contains(&format!("{}{}", prefix, base)))
    }

    pub fn excludes(&self, item: &Item) -> bool {
        item.type_names.iter().any(|name| self.matches(name))
    }
}

fn strip_wrapper(type_name: &str) -> &str {
    WRAPPER_PREFIXES
        .iter()
        .find_map(|prefix| type_name.strip_prefix(prefix))
        .unwrap_or(type_name)
}
