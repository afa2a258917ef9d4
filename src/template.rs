//! Template-variable substitution.
//!
//! The host owns template variables; this module only defines the seam the
//! controller and resolver call through, plus a map-backed implementation
//! used by the CLI and in tests.

use std::collections::BTreeMap;
use std::fmt::Debug;

/// A host-defined template variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVariable {
    pub name: String,
}

/// Per-request variable overrides (repeated panels and the like).
pub type ScopedVars = BTreeMap<String, String>;

/// Host template-variable service.
pub trait TemplateService: Send + Sync + Debug {
    /// Variables currently defined on the dashboard.
    fn variables(&self) -> Vec<TemplateVariable>;

    /// Replace `$name` / `${name}` references. Scoped values win over the
    /// dashboard's. Unknown references are left as written.
    fn replace(&self, text: &str, scoped: Option<&ScopedVars>) -> String;
}

/// Template service backed by a fixed map of values.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateService {
    values: BTreeMap<String, String>,
}

impl StaticTemplateService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a variable.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    fn lookup<'a>(&'a self, name: &str, scoped: Option<&'a ScopedVars>) -> Option<&'a str> {
        scoped
            .and_then(|s| s.get(name))
            .or_else(|| self.values.get(name))
            .map(String::as_str)
    }
}

impl TemplateService for StaticTemplateService {
    fn variables(&self) -> Vec<TemplateVariable> {
        self.values
            .keys()
            .map(|name| TemplateVariable { name: name.clone() })
            .collect()
    }

    fn replace(&self, text: &str, scoped: Option<&ScopedVars>) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
                match braced.find('}') {
                    Some(end) => (&braced[..end], end + 2),
                    None => ("", 0),
                }
            } else {
                let end = after
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end)
            };

            match self.lookup(name, scoped).filter(|_| !name.is_empty()) {
                Some(value) => out.push_str(value),
                None => {
                    out.push('$');
                    out.push_str(&after[..consumed]);
                }
            }
            rest = &after[consumed..];
        }

        out.push_str(rest);
        out
    }
}
