//! Query targets - the mutable query definition owned by the host.

use std::fmt;

/// The literal wildcard selector name.
pub const WILDCARD: &str = "*";

/// Which API calls a target fires and which of its fields are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum QueryType {
    /// Historical channel values as time series.
    #[default]
    Metrics,
    /// Underlying numeric/status code of a single property.
    Raw,
    /// Display text of a single property.
    Text,
}

impl QueryType {
    /// Returns the lowercase label used on the wire and in the CLI.
    pub fn label(&self) -> &'static str {
        match self {
            QueryType::Metrics => "metrics",
            QueryType::Raw => "raw",
            QueryType::Text => "text",
        }
    }

    /// Parse a lowercase label.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metrics" => Some(QueryType::Metrics),
            "raw" => Some(QueryType::Raw),
            "text" => Some(QueryType::Text),
            _ => None,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A level of the selection cascade, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Level {
    Group,
    Device,
    Sensor,
    Channel,
    Value,
    Property,
    FilterProperty,
}

impl Level {
    /// Every level, group first.
    pub const ALL: [Level; 7] = [
        Level::Group,
        Level::Device,
        Level::Sensor,
        Level::Channel,
        Level::Value,
        Level::Property,
        Level::FilterProperty,
    ];

    /// The level whose list depends on this one.
    pub fn next(self) -> Option<Level> {
        match self {
            Level::Group => Some(Level::Device),
            Level::Device => Some(Level::Sensor),
            Level::Sensor => Some(Level::Channel),
            Level::Channel => Some(Level::Value),
            Level::Value => Some(Level::Property),
            Level::Property => Some(Level::FilterProperty),
            Level::FilterProperty => None,
        }
    }

    /// All levels strictly below this one.
    pub fn descendants(self) -> impl Iterator<Item = Level> {
        Level::ALL.into_iter().filter(move |l| *l > self)
    }

    /// Human-readable label ("Group", "Filter property", ...).
    pub fn label(&self) -> &'static str {
        match self {
            Level::Group => "Group",
            Level::Device => "Device",
            Level::Sensor => "Sensor",
            Level::Channel => "Channel",
            Level::Value => "Value",
            Level::Property => "Property",
            Level::FilterProperty => "Filter property",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single dropdown selection.
///
/// The name may be a literal identifier, the wildcard `*`, a template
/// variable reference (`$var` or `${var}`), or a `/regex/` pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Selection {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
}

impl Selection {
    /// Create a selection with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The wildcard selection.
    pub fn wildcard() -> Self {
        Self::new(WILDCARD)
    }

    /// True when the name is blank after trimming.
    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// True for the literal `*`.
    pub fn is_wildcard(&self) -> bool {
        self.name.trim() == WILDCARD
    }

    /// True when the name references a template variable.
    pub fn is_templated(&self) -> bool {
        self.name.contains('$')
    }

    /// The pattern inside a `/regex/` name, if this is one.
    pub fn regex_pattern(&self) -> Option<&str> {
        regex_pattern(&self.name)
    }

    /// Reset to an empty name.
    pub fn clear(&mut self) {
        self.name.clear();
    }
}

/// The pattern inside a `/regex/` string.
pub fn regex_pattern(name: &str) -> Option<&str> {
    let name = name.trim();
    if name.len() >= 2 && name.starts_with('/') && name.ends_with('/') {
        Some(&name[1..name.len() - 1])
    } else {
        None
    }
}

/// Series-label prefixes for metric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct DisplayOptions {
    pub include_group: bool,
    pub include_device: bool,
    pub include_sensor: bool,
}

/// A single toggle within [`DisplayOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayOption {
    IncludeGroup,
    IncludeDevice,
    IncludeSensor,
}

impl DisplayOptions {
    /// Set one toggle.
    pub fn set(&mut self, option: DisplayOption, enabled: bool) {
        match option {
            DisplayOption::IncludeGroup => self.include_group = enabled,
            DisplayOption::IncludeDevice => self.include_device = enabled,
            DisplayOption::IncludeSensor => self.include_sensor = enabled,
        }
    }
}

/// The resolved display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct QueryOptions {
    pub mode: QueryType,
}

/// The mutable query definition for one panel query row.
///
/// # Example
///
/// ```rust
/// use prtgwatch_types::{Level, QueryTarget, QueryType};
///
/// let mut target = QueryTarget::new("A");
/// target.selection_mut(Level::Group).name = "Servers".to_string();
/// target.set_query_type(QueryType::Text);
///
/// assert_eq!(target.selection(Level::Group).name, "Servers");
/// assert_eq!(target.query_options.mode, QueryType::Text);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct QueryTarget {
    pub ref_id: String,
    pub query_type: QueryType,
    pub group_selection: Selection,
    pub device_selection: Selection,
    pub sensor_selection: Selection,
    pub channel_selection: Selection,
    pub value_selection: Selection,
    pub property_selection: Selection,
    pub filter_property_selection: Selection,
    pub options: DisplayOptions,
    pub query_options: QueryOptions,
}

impl QueryTarget {
    /// Create a target with blank selections and the given ref id.
    pub fn new(ref_id: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            query_type: QueryType::default(),
            group_selection: Selection::default(),
            device_selection: Selection::default(),
            sensor_selection: Selection::default(),
            channel_selection: Selection::default(),
            value_selection: Selection::default(),
            property_selection: Selection::default(),
            filter_property_selection: Selection::default(),
            options: DisplayOptions::default(),
            query_options: QueryOptions::default(),
        }
    }

    /// Borrow the selector for a level.
    pub fn selection(&self, level: Level) -> &Selection {
        match level {
            Level::Group => &self.group_selection,
            Level::Device => &self.device_selection,
            Level::Sensor => &self.sensor_selection,
            Level::Channel => &self.channel_selection,
            Level::Value => &self.value_selection,
            Level::Property => &self.property_selection,
            Level::FilterProperty => &self.filter_property_selection,
        }
    }

    /// Mutably borrow the selector for a level.
    pub fn selection_mut(&mut self, level: Level) -> &mut Selection {
        match level {
            Level::Group => &mut self.group_selection,
            Level::Device => &mut self.device_selection,
            Level::Sensor => &mut self.sensor_selection,
            Level::Channel => &mut self.channel_selection,
            Level::Value => &mut self.value_selection,
            Level::Property => &mut self.property_selection,
            Level::FilterProperty => &mut self.filter_property_selection,
        }
    }

    /// Switch query mode, keeping `query_options.mode` in step.
    pub fn set_query_type(&mut self, query_type: QueryType) {
        self.query_type = query_type;
        self.query_options.mode = query_type;
    }

    /// True if any selector references a template variable.
    pub fn is_templated(&self) -> bool {
        Level::ALL.iter().any(|l| self.selection(*l).is_templated())
    }
}

impl Default for QueryTarget {
    fn default() -> Self {
        Self::new("A")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_cascade_order() {
        assert_eq!(Level::Group.next(), Some(Level::Device));
        assert_eq!(Level::Value.next(), Some(Level::Property));
        assert_eq!(Level::FilterProperty.next(), None);

        let below_sensor: Vec<_> = Level::Sensor.descendants().collect();
        assert_eq!(
            below_sensor,
            vec![
                Level::Channel,
                Level::Value,
                Level::Property,
                Level::FilterProperty
            ]
        );
        assert_eq!(Level::FilterProperty.descendants().count(), 0);
    }

    #[test]
    fn test_selection_kinds() {
        assert!(Selection::new("  ").is_empty());
        assert!(Selection::wildcard().is_wildcard());
        assert!(Selection::new("$group").is_templated());
        assert!(Selection::new("${group}").is_templated());
        assert_eq!(Selection::new("/^core-.*/").regex_pattern(), Some("^core-.*"));
        assert_eq!(Selection::new("/").regex_pattern(), None);
        assert_eq!(Selection::new("core").regex_pattern(), None);
    }

    #[test]
    fn test_query_type_keeps_options_in_step() {
        let mut target = QueryTarget::default();
        assert_eq!(target.ref_id, "A");
        assert_eq!(target.query_type, QueryType::Metrics);

        target.set_query_type(QueryType::Raw);
        assert_eq!(target.query_type, QueryType::Raw);
        assert_eq!(target.query_options.mode, QueryType::Raw);
    }

    #[test]
    fn test_query_type_parse() {
        assert_eq!(QueryType::parse("TEXT"), Some(QueryType::Text));
        assert_eq!(QueryType::parse(" raw "), Some(QueryType::Raw));
        assert_eq!(QueryType::parse("bogus"), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_target_uses_host_field_names() {
        let json = r#"{
            "refId": "B",
            "queryType": "text",
            "groupSelection": {"name": "Servers"},
            "propertySelection": {"name": "sensor"},
            "options": {"includeSensor": true}
        }"#;
        let target: QueryTarget = serde_json::from_str(json).unwrap();

        assert_eq!(target.ref_id, "B");
        assert_eq!(target.query_type, QueryType::Text);
        assert_eq!(target.group_selection.name, "Servers");
        assert!(target.device_selection.is_empty());
        assert!(target.options.include_sensor);
        assert!(!target.options.include_group);
    }
}
