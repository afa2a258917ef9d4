//! Output frames handed back to the dashboard host.

use std::collections::BTreeMap;

/// Column type of a [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldType {
    Time,
    Number,
    String,
}

/// A single cell.
///
/// Serialized untagged, so a frame column reads like the host expects:
/// `[1700000000000, 12.5, null]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FieldValue {
    Null,
    Time(i64),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Time(t) => Some(*t as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Per-field display configuration.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct FieldConfig {
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub display_name: Option<String>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "BTreeMap::is_empty"))]
    pub custom: BTreeMap<String, String>,
}

/// One column of a frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Field {
    pub name: String,

    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub field_type: FieldType,

    pub values: Vec<FieldValue>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub config: FieldConfig,
}

impl Field {
    /// Create an empty field of the given type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            values: Vec::new(),
            config: FieldConfig::default(),
        }
    }

    /// The conventional `Time` column.
    pub fn time(values: Vec<i64>) -> Self {
        let mut field = Self::new("Time", FieldType::Time);
        field.values = values.into_iter().map(FieldValue::Time).collect();
        field
    }

    /// Set the display label.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.config.display_name = Some(display_name.into());
        self
    }

    /// Set the values.
    pub fn with_values(mut self, values: Vec<FieldValue>) -> Self {
        self.values = values;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A resolved series for one query target. The time field comes first.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DataFrame {
    pub ref_id: String,
    pub name: String,
    pub fields: Vec<Field>,
}

impl DataFrame {
    pub fn new(ref_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of rows (length of the first field).
    pub fn row_count(&self) -> usize {
        self.fields.first().map_or(0, Field::len)
    }
}

/// Overall outcome of a multi-target query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoadingState {
    Done,
    Error,
}

/// Frames for all targets of one request plus an overall state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryResponse {
    pub data: Vec<DataFrame>,
    pub state: LoadingState,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub error: Option<String>,
}

impl QueryResponse {
    /// Build a response; `Done` iff at least one frame was produced.
    pub fn from_frames(data: Vec<DataFrame>) -> Self {
        if data.is_empty() {
            Self::error("No data returned for any query target")
        } else {
            Self {
                data,
                state: LoadingState::Done,
                error: None,
            }
        }
    }

    /// An empty response in the error state.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            state: LoadingState::Error,
            error: Some(message.into()),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == LoadingState::Done
    }
}
