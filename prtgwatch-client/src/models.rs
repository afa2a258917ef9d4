//! Records returned by the table and historic-data endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Extra columns of a table row, keyed by column name.
pub type Properties = Map<String, Value>;

/// Shared access to table rows that carry a primary name column.
pub trait Named {
    /// Display name of the record type ("Group", "Device", ...).
    const KIND: &'static str;
    /// The `content=` value that lists these records.
    const CONTENT: &'static str;
    /// Columns requested for this content type.
    const COLUMNS: &'static str;
    /// Column holding the primary name.
    const NAME_COLUMN: &'static str;

    fn name(&self) -> &str;
    fn objid(&self) -> i64;
    fn properties(&self) -> &Properties;

    /// Names of the parent objects this row carries (`group`, `device`).
    fn parents(&self) -> Vec<(&'static str, &str)> {
        Vec::new()
    }

    /// Look up a column by name, checking the typed fields first.
    fn property(&self, key: &str) -> Option<Value> {
        if key == "objid" {
            return Some(Value::from(self.objid()));
        }
        if key == Self::NAME_COLUMN {
            return Some(Value::String(self.name().to_string()));
        }
        if let Some((_, parent)) = self.parents().into_iter().find(|(k, _)| *k == key) {
            return Some(Value::String(parent.to_string()));
        }
        self.properties().get(key).cloned()
    }
}

/// A probe group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub objid: i64,
    #[serde(default)]
    pub group: String,
    #[serde(flatten)]
    pub properties: Properties,
}

/// A monitored device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub objid: i64,
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub group: String,
    #[serde(flatten)]
    pub properties: Properties,
}

/// A sensor on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    #[serde(default)]
    pub objid: i64,
    #[serde(default)]
    pub sensor: String,
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub group: String,
    #[serde(flatten)]
    pub properties: Properties,
}

/// A sensor channel. `objid` is the owning sensor's object id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub objid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub properties: Properties,
}

impl Named for Group {
    const KIND: &'static str = "Group";
    const CONTENT: &'static str = "groups";
    const COLUMNS: &'static str =
        "objid,group,probe,active,status,message,priority,tags,totalsens,upsens,downsens,warnsens";
    const NAME_COLUMN: &'static str = "group";

    fn name(&self) -> &str {
        &self.group
    }
    fn objid(&self) -> i64 {
        self.objid
    }
    fn properties(&self) -> &Properties {
        &self.properties
    }
}

impl Named for Device {
    const KIND: &'static str = "Device";
    const CONTENT: &'static str = "devices";
    const COLUMNS: &'static str =
        "objid,device,group,host,active,status,message,priority,tags,upsens,downsens,warnsens";
    const NAME_COLUMN: &'static str = "device";

    fn name(&self) -> &str {
        &self.device
    }
    fn objid(&self) -> i64 {
        self.objid
    }
    fn properties(&self) -> &Properties {
        &self.properties
    }
    fn parents(&self) -> Vec<(&'static str, &str)> {
        vec![("group", self.group.as_str())]
    }
}

impl Named for Sensor {
    const KIND: &'static str = "Sensor";
    const CONTENT: &'static str = "sensors";
    const COLUMNS: &'static str =
        "objid,sensor,device,group,active,status,message,priority,tags,lastvalue,lastcheck,interval";
    const NAME_COLUMN: &'static str = "sensor";

    fn name(&self) -> &str {
        &self.sensor
    }
    fn objid(&self) -> i64 {
        self.objid
    }
    fn properties(&self) -> &Properties {
        &self.properties
    }
    fn parents(&self) -> Vec<(&'static str, &str)> {
        vec![("group", self.group.as_str()), ("device", self.device.as_str())]
    }
}

impl Named for Channel {
    const KIND: &'static str = "Channel";
    const CONTENT: &'static str = "channels";
    const COLUMNS: &'static str = "objid,name,lastvalue";
    const NAME_COLUMN: &'static str = "name";

    fn name(&self) -> &str {
        &self.name
    }
    fn objid(&self) -> i64 {
        self.objid
    }
    fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// One entry of a historical-data request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryItem {
    #[serde(default)]
    pub sensor_id: Option<String>,
    #[serde(default)]
    pub channel: String,
}

impl QueryItem {
    pub fn new(sensor_id: impl ToString, channel: impl Into<String>) -> Self {
        Self {
            sensor_id: Some(sensor_id.to_string()),
            channel: channel.into(),
        }
    }
}

/// Response of `historicdata.json`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoricalResponse {
    #[serde(default, rename = "prtg-version")]
    pub version: Option<String>,
    #[serde(default)]
    pub treesize: Option<u64>,
    /// One row per bucket: `datetime`, `datetime_raw`, then a column per channel.
    #[serde(default)]
    pub histdata: Vec<Properties>,
}

impl HistoricalResponse {
    /// Every column that is not a datetime column, in first-seen order.
    pub fn value_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.histdata {
            for key in row.keys() {
                if !is_datetime_column(key) && !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }
}

/// True for `datetime` and `datetime_raw`.
pub fn is_datetime_column(key: &str) -> bool {
    key == "datetime" || key == "datetime_raw"
}

/// A log entry for a sensor, shaped as a dashboard annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntry {
    /// Unix timestamp in milliseconds.
    pub time: i64,
    pub title: String,
    pub text: String,
    pub tags: Vec<String>,
}
