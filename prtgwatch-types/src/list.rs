//! Candidate values for selection dropdowns.

use crate::WILDCARD;

/// One candidate value in a selection dropdown.
///
/// Entries synthesized from template variables carry `templated = Some(true)`
/// and a `$`-prefixed name; server-fetched entries leave it unset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricListEntry {
    pub name: String,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub visible_name: Option<String>,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub templated: Option<bool>,
}

impl MetricListEntry {
    /// A server-fetched entry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible_name: None,
            templated: None,
        }
    }

    /// Add a display label.
    pub fn with_visible_name(mut self, visible_name: impl Into<String>) -> Self {
        self.visible_name = Some(visible_name.into());
        self
    }

    /// The "match everything" entry (label "All", value `*`).
    pub fn wildcard() -> Self {
        Self::new(WILDCARD).with_visible_name("All")
    }

    /// An entry for a template variable; `$` is added if missing.
    pub fn template(variable: &str) -> Self {
        let name = if variable.starts_with('$') {
            variable.to_string()
        } else {
            format!("${variable}")
        };
        Self {
            name,
            visible_name: None,
            templated: Some(true),
        }
    }

    /// Label to show in the dropdown.
    pub fn label(&self) -> &str {
        self.visible_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_templated(&self) -> bool {
        self.templated.unwrap_or(false)
    }
}
