//! Datasource facade: turns query targets into frames.
//!
//! [`PrtgDataSource`] owns one [`ApiClient`] (and so one response cache) and
//! the host's template service. Sibling targets resolve concurrently; each
//! target's own steps run in order, and a failing target is logged and left
//! out of the response instead of failing its siblings.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use prtgwatch_client::time::{ole_to_unix_ms, parse_prtg_datetime};
use prtgwatch_client::{
    ApiClient, ClientError, HistoricalResponse, MessageEntry, Named, Properties, QueryItem, Sensor,
};
use prtgwatch_types::{
    DataFrame, Field, FieldType, FieldValue, Level, MetricListEntry, QueryResponse, QueryTarget,
    QueryType, WILDCARD,
};

use crate::controller::{list_entries, Notifier, SelectionController};
use crate::template::{ScopedVars, TemplateService};

/// Separator between label parts of a metric field.
pub const LABEL_SEPARATOR: &str = " - ";

/// Query time range in Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub from_ms: i64,
    pub to_ms: i64,
}

impl TimeRange {
    pub fn new(from_ms: i64, to_ms: i64) -> Self {
        Self { from_ms, to_ms }
    }
}

/// One panel refresh: every target plus the shared range.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub targets: Vec<QueryTarget>,
    pub range: TimeRange,
    pub scoped_vars: ScopedVars,
}

/// Result of a connection test. Always produced, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasourceStatus {
    pub ok: bool,
    pub message: String,
    pub version: String,
}

/// The PRTG datasource.
#[derive(Debug, Clone)]
pub struct PrtgDataSource {
    client: Arc<ApiClient>,
    templates: Arc<dyn TemplateService>,
}

impl PrtgDataSource {
    pub fn new(client: ApiClient, templates: Arc<dyn TemplateService>) -> Self {
        Self {
            client: Arc::new(client),
            templates,
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// A query editor bound to this datasource's client and templates.
    pub fn controller(&self, target: QueryTarget, notifier: Notifier) -> SelectionController {
        SelectionController::new(target, self.client.clone(), self.templates.clone(), notifier)
    }

    /// Resolve every target of `request`.
    pub async fn query(&self, request: &QueryRequest) -> QueryResponse {
        if request.targets.is_empty() {
            debug!("query without targets");
        }

        let results = join_all(
            request
                .targets
                .iter()
                .map(|target| self.query_target(target, request.range, &request.scoped_vars)),
        )
        .await;

        let mut frames = Vec::with_capacity(results.len());
        for (target, result) in request.targets.iter().zip(results) {
            match result {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!(ref_id = %target.ref_id, error = %e, "query target failed"),
            }
        }
        QueryResponse::from_frames(frames)
    }

    /// Sensor log entries for the annotation layer.
    pub async fn annotations(
        &self,
        range: TimeRange,
        sensor: &str,
    ) -> Result<Vec<MessageEntry>, ClientError> {
        let name = self.templates.replace(sensor.trim(), None);
        let sensor = self.client.sensor_info(&name).await?;
        self.client
            .messages_between(range.from_ms, range.to_ms, sensor.objid)
            .await
    }

    /// Check version and credentials.
    pub async fn test_datasource(&self) -> DatasourceStatus {
        let version = self.client.version_string().await;
        if version.starts_with("ERROR") {
            return DatasourceStatus {
                ok: false,
                message: format!("Could not reach the server: {version}"),
                version,
            };
        }

        let ok = self.client.test_auth().await;
        let message = if ok {
            "Data source is working".to_string()
        } else {
            "Authentication failed".to_string()
        };
        info!(ok, %version, "datasource test finished");
        DatasourceStatus { ok, message, version }
    }

    /// Values for a template-variable query.
    ///
    /// Accepts `groups`, `devices [group]`, `sensors [device]` and
    /// `channels <device> <sensor>`. Arguments containing spaces can be
    /// double-quoted.
    pub async fn metric_find_query(&self, query: &str) -> Result<Vec<MetricListEntry>, ClientError> {
        let query = self.templates.replace(query, None);
        let args = split_args(&query);
        let arg = |i: usize| args.get(i).map(String::as_str);

        match arg(0).map(str::to_ascii_lowercase).as_deref() {
            Some("groups") => Ok(list_entries(&self.client.group_suggest().await?)),
            Some("devices") => Ok(list_entries(&self.client.device_suggest(arg(1)).await?)),
            Some("sensors") => Ok(list_entries(&self.client.sensor_suggest(arg(1)).await?)),
            Some("channels") => Ok(list_entries(
                &self.client.channel_suggest(None, arg(1), arg(2)).await?,
            )),
            _ => Err(ClientError::QueryFailed {
                kind: "Variable",
                cause: format!("unsupported query: {query}"),
            }),
        }
    }

    async fn query_target(
        &self,
        target: &QueryTarget,
        range: TimeRange,
        scoped: &ScopedVars,
    ) -> Result<DataFrame, ClientError> {
        let target = self.resolve_target(target, scoped);
        match target.query_type {
            QueryType::Metrics => self.metrics_frame(&target, range).await,
            QueryType::Text | QueryType::Raw => self.property_frame(&target).await,
        }
    }

    /// Copy of `target` with template references substituted.
    fn resolve_target(&self, target: &QueryTarget, scoped: &ScopedVars) -> QueryTarget {
        let mut resolved = target.clone();
        for level in Level::ALL {
            let selection = resolved.selection_mut(level);
            if selection.is_templated() {
                selection.name = self.templates.replace(&selection.name, Some(scoped));
            }
        }
        resolved
    }

    /// One-row frame holding a single property of a group, device or sensor.
    async fn property_frame(&self, target: &QueryTarget) -> Result<DataFrame, ClientError> {
        let kind = target.query_type.label();
        let property = target.filter_property_selection.name.trim();
        if property.is_empty() || property == WILDCARD {
            return Err(ClientError::QueryFailed {
                kind,
                cause: "no property selected".to_string(),
            });
        }

        let (name, lookup) = match target.property_selection.name.trim() {
            "group" => {
                let group = self.client.group_info(target.group_selection.name.trim()).await?;
                (group.group.clone(), PropertyLookup::new(&group))
            }
            "device" => {
                let device = self
                    .client
                    .device_info_in(
                        Some(target.group_selection.name.as_str()),
                        target.device_selection.name.trim(),
                    )
                    .await?;
                (device.device.clone(), PropertyLookup::new(&device))
            }
            "sensor" => {
                let sensor = self
                    .client
                    .sensor_info_on(
                        Some(target.device_selection.name.as_str()),
                        target.sensor_selection.name.trim(),
                    )
                    .await?;
                (sensor.sensor.clone(), PropertyLookup::new(&sensor))
            }
            other => {
                return Err(ClientError::QueryFailed {
                    kind,
                    cause: format!("unknown object kind: {other}"),
                })
            }
        };

        let field = match target.query_type {
            QueryType::Raw => {
                let key = raw_key(property);
                let value = lookup.get(&key).and_then(number).map_or(FieldValue::Null, FieldValue::Number);
                Field::new(property, FieldType::Number).with_values(vec![value])
            }
            _ => {
                let value = lookup.get(property).map_or(FieldValue::Null, text);
                Field::new(property, FieldType::String).with_values(vec![value])
            }
        };

        let mut frame = DataFrame::new(&target.ref_id, name);
        frame.push(Field::time(vec![Utc::now().timestamp_millis()]));
        frame.push(field);
        Ok(frame)
    }

    /// Time series for the selected sensor channels.
    async fn metrics_frame(
        &self,
        target: &QueryTarget,
        range: TimeRange,
    ) -> Result<DataFrame, ClientError> {
        let sensor = self
            .client
            .sensor_info_on(
                Some(target.device_selection.name.as_str()),
                target.sensor_selection.name.trim(),
            )
            .await?;
        let item = QueryItem::new(sensor.objid, target.channel_selection.name.trim());
        let history = self
            .client
            .historical_data(range.from_ms, range.to_ms, &[item])
            .await?;

        debug!(
            ref_id = %target.ref_id,
            sensor_id = sensor.objid,
            rows = history.histdata.len(),
            "historical data received"
        );
        Ok(metrics_frame(target, &sensor, &history))
    }
}

/// Property access over any table record.
struct PropertyLookup {
    values: Properties,
}

impl PropertyLookup {
    fn new<T: Named>(record: &T) -> Self {
        let mut values = record.properties().clone();
        for key in ["objid", T::NAME_COLUMN] {
            if let Some(v) = record.property(key) {
                values.insert(key.to_string(), v);
            }
        }
        for (key, parent) in record.parents() {
            values.insert(key.to_string(), Value::String(parent.to_string()));
        }
        Self { values }
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// The numeric sibling of a display property.
fn raw_key(property: &str) -> String {
    if property.ends_with("_raw") {
        property.to_string()
    } else {
        format!("{property}_raw")
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn text(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::String(s) => FieldValue::Text(s.clone()),
        other => FieldValue::Text(other.to_string()),
    }
}

/// Build the metrics frame from a historical response.
fn metrics_frame(target: &QueryTarget, sensor: &Sensor, history: &HistoricalResponse) -> DataFrame {
    let columns = selected_columns(&target.value_selection.name, &history.value_columns());

    let mut times = Vec::with_capacity(history.histdata.len());
    let mut values: Vec<Vec<FieldValue>> = vec![Vec::with_capacity(history.histdata.len()); columns.len()];
    for row in &history.histdata {
        let Some(time) = row_time(row) else {
            continue;
        };
        times.push(time);
        for (column, cells) in columns.iter().zip(values.iter_mut()) {
            cells.push(
                row.get(column)
                    .and_then(number)
                    .map_or(FieldValue::Null, FieldValue::Number),
            );
        }
    }

    let mut frame = DataFrame::new(&target.ref_id, &sensor.sensor);
    frame.push(Field::time(times));
    for (column, cells) in columns.iter().zip(values) {
        frame.push(
            Field::new(column, FieldType::Number)
                .with_values(cells)
                .with_display_name(series_label(target, sensor, column)),
        );
    }
    frame
}

/// Columns named in a comma list, or all of them when none match.
fn selected_columns(selection: &str, available: &[String]) -> Vec<String> {
    let wanted: Vec<&str> = selection
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != WILDCARD)
        .collect();

    let matched: Vec<String> = wanted
        .iter()
        .filter(|c| available.iter().any(|a| a == *c))
        .map(|c| c.to_string())
        .collect();

    if matched.is_empty() {
        available.to_vec()
    } else {
        matched
    }
}

/// Prefix group, device and sensor names as the display options ask.
fn series_label(target: &QueryTarget, sensor: &Sensor, column: &str) -> String {
    let options = &target.options;
    let mut parts: Vec<&str> = Vec::with_capacity(4);
    if options.include_group {
        parts.push(&sensor.group);
    }
    if options.include_device {
        parts.push(&sensor.device);
    }
    if options.include_sensor {
        parts.push(&sensor.sensor);
    }
    parts.push(column);
    parts.retain(|p| !p.is_empty());
    parts.join(LABEL_SEPARATOR)
}

fn row_time(row: &Properties) -> Option<i64> {
    row.get("datetime")
        .and_then(Value::as_str)
        .and_then(parse_prtg_datetime)
        .or_else(|| row.get("datetime_raw").and_then(Value::as_f64).map(ole_to_unix_ms))
}

/// Whitespace-separated words; double quotes group words.
fn split_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;

    for c in input.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::StaticTemplateService;
    use prtgwatch_client::StaticTransport;
    use prtgwatch_types::LoadingState;

    const SENSORS: &str = r#"{"prtg-version": "24.1", "sensors": [
        {"objid": 2044, "sensor": "Ping", "device": "core-sw1", "group": "Network",
         "status": "Up", "status_raw": 3, "message": "OK"},
        {"objid": 2050, "sensor": "Traffic", "device": "core-sw1", "group": "Network"}
    ]}"#;

    const HISTORY: &str = r#"{"prtg-version": "24.1", "treesize": 2, "histdata": [
        {"datetime": "01.03.2024 10:00:00", "datetime_raw": 45352.41, "Ping Time": 4, "Packet Loss": 0},
        {"datetime": "01.03.2024 10:05:00", "datetime_raw": 45352.42, "Ping Time": "5", "Packet Loss": ""}
    ]}"#;

    fn datasource(transport: &StaticTransport) -> PrtgDataSource {
        let client = ApiClient::builder()
            .hostname("prtg.local")
            .transport(Arc::new(transport.clone()))
            .build()
            .unwrap();
        let templates = StaticTemplateService::new().with("sensor", "Ping");
        PrtgDataSource::new(client, Arc::new(templates))
    }

    fn transport() -> StaticTransport {
        StaticTransport::new()
            .route("content=sensors", SENSORS)
            .route("content=groups", r#"{"groups": [{"objid": 1, "group": "Network"}]}"#)
            .route("passhash=&id=2044&", HISTORY)
            .route_status("passhash=&id=2050&", 500, "boom")
    }

    fn text_target(ref_id: &str, sensor: &str, property: &str) -> QueryTarget {
        let mut target = QueryTarget::new(ref_id);
        target.set_query_type(QueryType::Text);
        target.sensor_selection.name = sensor.into();
        target.property_selection.name = "sensor".into();
        target.filter_property_selection.name = property.into();
        target
    }

    fn metrics_target(ref_id: &str, sensor: &str) -> QueryTarget {
        let mut target = QueryTarget::new(ref_id);
        target.sensor_selection.name = sensor.into();
        target.channel_selection.name = "*".into();
        target
    }

    fn request(targets: Vec<QueryTarget>) -> QueryRequest {
        QueryRequest {
            targets,
            range: TimeRange::new(0, 6 * 3_600_000),
            scoped_vars: ScopedVars::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_targets_is_error() {
        let ds = datasource(&transport());
        let response = ds.query(&request(vec![])).await;
        assert_eq!(response.state, LoadingState::Error);
        assert!(response.data.is_empty());
    }

    #[tokio::test]
    async fn test_text_mode_sensor_property() {
        let ds = datasource(&transport());
        let response = ds.query(&request(vec![text_target("A", "Ping", "status")])).await;

        assert_eq!(response.state, LoadingState::Done);
        assert_eq!(response.data.len(), 1);
        let frame = &response.data[0];
        assert_eq!(frame.fields.len(), 2);
        assert_eq!(frame.fields[0].name, "Time");
        assert_eq!(frame.fields[1].name, "status");
        assert_eq!(frame.fields[1].values, vec![FieldValue::Text("Up".into())]);
        assert_eq!(frame.name, "Ping");
    }

    #[tokio::test]
    async fn test_raw_mode_reads_numeric_sibling() {
        let ds = datasource(&transport());
        let mut target = text_target("A", "Ping", "status");
        target.set_query_type(QueryType::Raw);

        let response = ds.query(&request(vec![target])).await;
        let field = &response.data[0].fields[1];
        assert_eq!(field.field_type, FieldType::Number);
        assert_eq!(field.values, vec![FieldValue::Number(3.0)]);
    }

    #[tokio::test]
    async fn test_group_property_frame() {
        let ds = datasource(&transport());
        let mut target = text_target("A", "", "group");
        target.property_selection.name = "group".into();
        target.group_selection.name = "Network".into();

        let response = ds.query(&request(vec![target])).await;
        assert_eq!(
            response.data[0].fields[1].values,
            vec![FieldValue::Text("Network".into())]
        );
    }

    #[tokio::test]
    async fn test_metrics_frame_with_labels() {
        let ds = datasource(&transport());
        let mut target = metrics_target("A", "$sensor");
        target.value_selection.name = "Ping Time, Unknown".into();
        target.options.include_device = true;
        target.options.include_sensor = true;

        let response = ds.query(&request(vec![target])).await;
        assert!(response.is_done());
        let frame = &response.data[0];
        assert_eq!(frame.fields.len(), 2);
        assert_eq!(
            frame.fields[0].values,
            vec![
                FieldValue::Time(1_709_287_200_000),
                FieldValue::Time(1_709_287_500_000)
            ]
        );
        let ping = frame.field("Ping Time").unwrap();
        assert_eq!(ping.values, vec![FieldValue::Number(4.0), FieldValue::Number(5.0)]);
        assert_eq!(
            ping.config.display_name.as_deref(),
            Some("core-sw1 - Ping - Ping Time")
        );
    }

    #[tokio::test]
    async fn test_metrics_without_value_selection_uses_all_columns() {
        let ds = datasource(&transport());
        let response = ds.query(&request(vec![metrics_target("A", "Ping")])).await;

        let frame = &response.data[0];
        assert_eq!(frame.fields.len(), 3);
        let loss = frame.field("Packet Loss").unwrap();
        assert_eq!(loss.values, vec![FieldValue::Number(0.0), FieldValue::Null]);
        assert_eq!(loss.config.display_name.as_deref(), Some("Packet Loss"));
    }

    #[tokio::test]
    async fn test_failing_target_does_not_abort_siblings() {
        let ds = datasource(&transport());
        let response = ds
            .query(&request(vec![
                metrics_target("A", "Traffic"),
                metrics_target("B", "Missing"),
                text_target("C", "Ping", "message"),
            ]))
            .await;

        assert!(response.is_done());
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].ref_id, "C");
    }

    #[tokio::test]
    async fn test_all_targets_failing_is_error() {
        let ds = datasource(&transport());
        let response = ds
            .query(&request(vec![
                metrics_target("A", "Missing"),
                text_target("B", "Ping", ""),
            ]))
            .await;
        assert_eq!(response.state, LoadingState::Error);
    }

    #[tokio::test]
    async fn test_annotations() {
        let transport = transport().route(
            "content=messages",
            r#"{"messages": [{"datetime_raw": 45000.5, "parent": "Ping", "type": "Down", "message": "Timeout"}]}"#,
        );
        let ds = datasource(&transport);
        let at = 1_678_881_600_000;

        let entries = ds
            .annotations(TimeRange::new(at - 60_000, at + 60_000), "$sensor")
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(transport.requests_matching("content=messages")[0].contains("id=2044"));
    }

    #[tokio::test]
    async fn test_annotations_keep_millisecond_start() {
        // Logged 300 ms after a whole second.
        let serial = 45000.5 + 0.3 / 86_400.0;
        let body = format!(
            r#"{{"messages": [{{"datetime_raw": {serial}, "parent": "Ping", "type": "Down", "message": "x"}}]}}"#
        );
        let transport = transport().route("content=messages", body);
        let ds = datasource(&transport);
        let at = 1_678_881_600_000;

        let late_start = TimeRange::new(at + 600, at + 60_000);
        assert!(ds.annotations(late_start, "Ping").await.unwrap().is_empty());
        let early_start = TimeRange::new(at + 100, at + 60_000);
        assert_eq!(ds.annotations(early_start, "Ping").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sensor_names_resolve_by_device() {
        let transport = StaticTransport::new()
            .route(
                "content=sensors",
                r#"{"sensors": [
                    {"objid": 100, "sensor": "Ping", "device": "core-sw1", "group": "Network",
                     "message": "first"},
                    {"objid": 200, "sensor": "Ping", "device": "core-sw2", "group": "Network",
                     "message": "second"}
                ]}"#,
            )
            .route("passhash=&id=200&", HISTORY);
        let ds = datasource(&transport);

        let mut target = metrics_target("A", "Ping");
        target.device_selection.name = "core-sw2".into();
        target.value_selection.name = "Ping Time".into();
        target.options.include_device = true;
        let mut text = text_target("B", "Ping", "message");
        text.device_selection.name = "core-sw2".into();

        let response = ds.query(&request(vec![target, text])).await;
        assert_eq!(response.data.len(), 2);
        assert_eq!(transport.requests_matching("passhash=&id=200&").len(), 1);
        assert!(transport.requests_matching("passhash=&id=100&").is_empty());
        let ping = response.data[0].field("Ping Time").unwrap();
        assert_eq!(ping.config.display_name.as_deref(), Some("core-sw2 - Ping Time"));
        assert_eq!(
            response.data[1].fields[1].values,
            vec![FieldValue::Text("second".into())]
        );
    }

    #[tokio::test]
    async fn test_datasource_status() {
        let transport = StaticTransport::new()
            .route("status.json", r#"{"Version": "24.1.92"}"#)
            .route("content=groups", r#"{"groups": []}"#);
        let status = datasource(&transport).test_datasource().await;
        assert!(status.ok);
        assert_eq!(status.version, "24.1.92");

        let transport = StaticTransport::new()
            .route("status.json", r#"{"Version": "24.1.92"}"#)
            .route_status("content=groups", 403, "denied");
        let status = datasource(&transport).test_datasource().await;
        assert!(!status.ok);
        assert_eq!(status.message, "Authentication failed");

        let transport = StaticTransport::new().route_error("status.json", ClientError::Timeout);
        let status = datasource(&transport).test_datasource().await;
        assert!(!status.ok);
        assert!(status.version.starts_with("ERROR"));
    }

    #[tokio::test]
    async fn test_metric_find_query() {
        let transport = transport().route(
            "content=devices",
            r#"{"devices": [{"objid": 10, "device": "core sw"}]}"#,
        );
        let ds = datasource(&transport);

        let groups = ds.metric_find_query("groups").await.unwrap();
        assert_eq!(groups, vec![MetricListEntry::new("Network")]);

        let sensors = ds.metric_find_query("sensors \"core-sw1\"").await.unwrap();
        assert_eq!(sensors.len(), 2);
        assert!(transport.requests_matching("content=sensors")[0].contains("filter_device=core-sw1"));

        ds.metric_find_query("devices Network").await.unwrap();
        assert!(transport.requests_matching("content=devices")[0].contains("filter_group=Network"));

        let err = ds.metric_find_query("bogus").await.unwrap_err();
        assert_eq!(err.to_string(), "Variable query failed: unsupported query: bogus");
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("channels \"core sw\" Ping"), vec!["channels", "core sw", "Ping"]);
        assert_eq!(split_args("  groups  "), vec!["groups"]);
        assert_eq!(split_args("devices \"\""), vec!["devices", ""]);
    }

    #[test]
    fn test_selected_columns() {
        let available = vec!["A".to_string(), "B".to_string()];
        assert_eq!(selected_columns("B", &available), vec!["B"]);
        assert_eq!(selected_columns("", &available), available);
        assert_eq!(selected_columns("*", &available), available);
        assert_eq!(selected_columns("C", &available), available);
    }

    #[test]
    fn test_raw_key() {
        assert_eq!(raw_key("status"), "status_raw");
        assert_eq!(raw_key("lastvalue_raw"), "lastvalue_raw");
    }
}
