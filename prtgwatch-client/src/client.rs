//! Authenticated, cached gateway to the server's REST surface.
//!
//! ## Example
//!
//! ```rust,no_run
//! use prtgwatch_client::ApiClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::builder()
//!         .hostname("prtg.example.com")
//!         .credentials("prtgadmin", "1234567890")
//!         .build()?;
//!
//!     println!("{}", client.version_string().await);
//!     for group in client.group_suggest().await? {
//!         println!("{} ({})", group.group, group.objid);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use prtgwatch_types::{regex_pattern, WILDCARD};

use crate::cache::{Cache, DEFAULT_TIMEOUT_SECS};
use crate::models::{
    Channel, Device, Group, HistoricalResponse, MessageEntry, Named, QueryItem, Sensor,
};
use crate::response::{decode_body, extract_collection, process_response, STATUS_VERSION};
use crate::time::{averaging_bucket, format_request_date, ole_to_unix_ms};
use crate::transport::{ReqwestTransport, Transport};
use crate::ClientError;

/// Returned by [`ApiClient::version_string`] when the status has no version.
pub const UNKNOWN_VERSION: &str = "Unknown Version";

/// Default request timeout (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Rows requested from table endpoints.
const TABLE_COUNT: &str = "50000";

/// Rows requested for value suggestions and messages.
const VALUES_COUNT: &str = "100";

/// API endpoints used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Table,
    Status,
    HistoricData,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Table => "table.json",
            Endpoint::Status => "status.json",
            Endpoint::HistoricData => "historicdata.json",
        }
    }
}

/// Outcome of the two-phase value lookup behind [`ApiClient::value_suggest`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValueLookup {
    /// No channel was selected; nothing was requested.
    NoChannel,
    /// No sensor object id could be resolved from the channel list.
    SensorUnresolved,
    /// The sensor resolved, but fetching its values failed.
    FetchFailed { sensor_id: i64, error: ClientError },
    /// Values for the resolved sensor.
    Values {
        sensor_id: i64,
        rows: Vec<Map<String, Value>>,
    },
}

impl ValueLookup {
    /// The value rows, or nothing for every other outcome.
    pub fn into_rows(self) -> Vec<Map<String, Value>> {
        match self {
            ValueLookup::Values { rows, .. } => rows,
            _ => Vec::new(),
        }
    }
}

/// Client for the table, status and historic-data endpoints.
///
/// Cheap to share behind an `Arc`; the response cache is internally locked
/// so concurrent queries from sibling targets reuse each other's results.
#[derive(Debug)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    username: String,
    passhash: String,
    tz_auto_adjust: bool,
    cache: Mutex<Cache<Value>>,
}

impl ApiClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Base URL every endpoint path is appended to (`https://host/api`).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Drop every cached response. Call after a configuration change.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Number of cached responses (including stale ones not yet evicted).
    pub fn cached_responses(&self) -> usize {
        self.cache.lock().len()
    }

    // ------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------

    /// Fetch the server version from `status.json`.
    pub async fn get_version(&self) -> Result<String, ClientError> {
        let status = self.fetch(Endpoint::Status, &[]).await?;
        Ok(status
            .get(STATUS_VERSION)
            .and_then(Value::as_str)
            .map(normalize_version)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string()))
    }

    /// The server version, `"Unknown Version"`, or `"ERROR: <cause>"`.
    /// Never fails.
    pub async fn version_string(&self) -> String {
        match self.get_version().await {
            Ok(version) => version,
            Err(e) => {
                warn!(error = %e, "version check failed");
                format!("ERROR: {e}")
            }
        }
    }

    /// Issue a minimal authenticated request.
    pub async fn try_auth(&self) -> Result<(), ClientError> {
        let params = [("content", "groups"), ("columns", "objid"), ("count", "1")];
        self.fetch_uncached(Endpoint::Table, &params).await.map(|_| ())
    }

    /// True if the server answered the authenticated request with a body.
    pub async fn test_auth(&self) -> bool {
        match self.try_auth().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "authentication check failed");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Suggest queries
    // ------------------------------------------------------------------

    /// All groups, sorted by name.
    pub async fn group_suggest(&self) -> Result<Vec<Group>, ClientError> {
        self.suggest::<Group>(&[]).await
    }

    /// Devices, optionally restricted to a group, sorted by name.
    pub async fn device_suggest(&self, group: Option<&str>) -> Result<Vec<Device>, ClientError> {
        self.suggest::<Device>(&[("group", group)]).await
    }

    /// Sensors, optionally restricted to a device, sorted by name.
    pub async fn sensor_suggest(&self, device: Option<&str>) -> Result<Vec<Sensor>, ClientError> {
        self.suggest::<Sensor>(&[("device", device)]).await
    }

    /// Channels for the matching sensors, sorted by name.
    pub async fn channel_suggest(
        &self,
        group: Option<&str>,
        device: Option<&str>,
        sensor: Option<&str>,
    ) -> Result<Vec<Channel>, ClientError> {
        self.suggest::<Channel>(&[("group", group), ("device", device), ("sensor", sensor)])
            .await
    }

    /// Value rows for a channel; empty on any failure.
    pub async fn value_suggest(
        &self,
        group: Option<&str>,
        device: Option<&str>,
        sensor: Option<&str>,
        channel: Option<&str>,
    ) -> Vec<Map<String, Value>> {
        self.value_lookup(group, device, sensor, channel)
            .await
            .into_rows()
    }

    /// The two-phase value lookup with every outcome kept distinct.
    pub async fn value_lookup(
        &self,
        group: Option<&str>,
        device: Option<&str>,
        sensor: Option<&str>,
        channel: Option<&str>,
    ) -> ValueLookup {
        let Some(channel) = channel.map(str::trim).filter(|c| !c.is_empty()) else {
            return ValueLookup::NoChannel;
        };

        let Some(sensor_id) = self.resolve_channel_sensor(group, device, sensor, channel).await
        else {
            return ValueLookup::SensorUnresolved;
        };

        match self.fetch_values(sensor_id).await {
            Ok(rows) => ValueLookup::Values { sensor_id, rows },
            Err(error) => {
                warn!(sensor_id, error = %error, "value query failed");
                ValueLookup::FetchFailed { sensor_id, error }
            }
        }
    }

    async fn resolve_channel_sensor(
        &self,
        group: Option<&str>,
        device: Option<&str>,
        sensor: Option<&str>,
        channel: &str,
    ) -> Option<i64> {
        let channels = match self.channel_suggest(group, device, sensor).await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "could not resolve sensor for value query");
                return None;
            }
        };
        channels
            .iter()
            .find(|c| channel == WILDCARD || c.name == channel)
            .or_else(|| channels.first())
            .map(|c| c.objid)
            .filter(|id| *id > 0)
    }

    async fn fetch_values(&self, sensor_id: i64) -> Result<Vec<Map<String, Value>>, ClientError> {
        let id = sensor_id.to_string();
        let params = [
            ("content", "values"),
            ("id", id.as_str()),
            ("columns", "datetime,value_"),
            ("usecaption", "1"),
            ("count", VALUES_COUNT),
        ];
        let value = self.fetch(Endpoint::Table, &params).await?;
        let rows = extract_collection(value, "values").ok_or_else(|| ClientError::QueryFailed {
            kind: "Value",
            cause: "response has no values".to_string(),
        })?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // History and messages
    // ------------------------------------------------------------------

    /// Historical samples for `items[0]` between two Unix millisecond times.
    pub async fn historical_data(
        &self,
        from_ms: i64,
        to_ms: i64,
        items: &[QueryItem],
    ) -> Result<HistoricalResponse, ClientError> {
        let item = items.first().ok_or(ClientError::MissingSensorId)?;
        let sensor_id = parse_sensor_id(item.sensor_id.as_deref())?;

        let avg = averaging_bucket(from_ms, to_ms);
        let sdate = format_request_date(from_ms, self.tz_auto_adjust)
            .ok_or_else(|| ClientError::Url(format!("start time out of range: {from_ms}")))?;
        let edate = format_request_date(to_ms, self.tz_auto_adjust)
            .ok_or_else(|| ClientError::Url(format!("end time out of range: {to_ms}")))?;
        let id = sensor_id.to_string();

        let mut params = vec![
            ("id", id.as_str()),
            ("avg", avg),
            ("sdate", sdate.as_str()),
            ("edate", edate.as_str()),
            ("usecaption", "1"),
        ];
        let channel = item.channel.trim();
        if !channel.is_empty() && channel != WILDCARD {
            params.push(("channel", channel));
        }

        debug!(sensor_id, avg, "fetching historical data");
        let value = self.fetch(Endpoint::HistoricData, &params).await?;
        let response: HistoricalResponse = match value {
            Value::Object(_) => serde_json::from_value(value)?,
            Value::Array(rows) => HistoricalResponse {
                histdata: serde_json::from_value(Value::Array(rows))?,
                ..Default::default()
            },
            _ => HistoricalResponse::default(),
        };

        if response.histdata.is_empty() {
            return Err(ClientError::NoHistoricalData);
        }
        Ok(response)
    }

    /// Log entries for a sensor, strictly inside `(from_sec, to_sec)`.
    pub async fn messages(
        &self,
        from_sec: i64,
        to_sec: i64,
        sensor_id: i64,
    ) -> Result<Vec<MessageEntry>, ClientError> {
        self.messages_between(from_sec.saturating_mul(1000), to_sec.saturating_mul(1000), sensor_id)
            .await
    }

    /// Log entries for a sensor, strictly inside `(from_ms, to_ms)`.
    pub async fn messages_between(
        &self,
        from_ms: i64,
        to_ms: i64,
        sensor_id: i64,
    ) -> Result<Vec<MessageEntry>, ClientError> {
        let id = sensor_id.to_string();
        let params = [
            ("content", "messages"),
            ("id", id.as_str()),
            ("columns", "objid,datetime,parent,type,name,status,message,tags"),
            ("count", VALUES_COUNT),
        ];
        let value = self
            .fetch(Endpoint::Table, &params)
            .await
            .map_err(|e| e.in_query("Message"))?;
        let rows = extract_collection(value, "messages").ok_or_else(|| ClientError::QueryFailed {
            kind: "Message",
            cause: "response has no messages".to_string(),
        })?;

        Ok(rows
            .iter()
            .filter_map(message_entry)
            .filter(|m| m.time > from_ms && m.time < to_ms)
            .collect())
    }

    // ------------------------------------------------------------------
    // Info lookups
    // ------------------------------------------------------------------

    /// The group named `name` (or matching `/regex/`).
    pub async fn group_info(&self, name: &str) -> Result<Group, ClientError> {
        let groups = self.group_suggest().await?;
        find_by_name(groups, name)
    }

    /// The device named `name` (or matching `/regex/`) in any group.
    pub async fn device_info(&self, name: &str) -> Result<Device, ClientError> {
        self.device_info_in(None, name).await
    }

    /// The device named `name` inside `group`. An empty or `*` group
    /// searches every group.
    pub async fn device_info_in(
        &self,
        group: Option<&str>,
        name: &str,
    ) -> Result<Device, ClientError> {
        let group = parent_scope(group);
        let devices = self.device_suggest(group.filter(|g| regex_pattern(g).is_none())).await?;
        find_by_name(within(devices, "group", group)?, name)
    }

    /// The sensor named `name` (or matching `/regex/`) on any device.
    pub async fn sensor_info(&self, name: &str) -> Result<Sensor, ClientError> {
        self.sensor_info_on(None, name).await
    }

    /// The sensor named `name` on `device`. Sensor names repeat across
    /// devices ("Ping"), so targets with a device selection resolve here.
    pub async fn sensor_info_on(
        &self,
        device: Option<&str>,
        name: &str,
    ) -> Result<Sensor, ClientError> {
        let device = parent_scope(device);
        let sensors = self.sensor_suggest(device.filter(|d| regex_pattern(d).is_none())).await?;
        find_by_name(within(sensors, "device", device)?, name)
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    async fn suggest<T: Named + DeserializeOwned>(
        &self,
        filters: &[(&str, Option<&str>)],
    ) -> Result<Vec<T>, ClientError> {
        let filter_keys: Vec<(String, &str)> = filters
            .iter()
            .filter_map(|(level, value)| {
                let value = value.map(str::trim).filter(|v| !v.is_empty() && *v != WILDCARD)?;
                Some((format!("filter_{level}"), value))
            })
            .collect();

        let mut params: Vec<(&str, &str)> = vec![
            ("content", T::CONTENT),
            ("columns", T::COLUMNS),
            ("count", TABLE_COUNT),
        ];
        params.extend(filter_keys.iter().map(|(k, v)| (k.as_str(), *v)));

        let value = self
            .fetch(Endpoint::Table, &params)
            .await
            .map_err(|e| e.in_query(T::KIND))?;
        let rows = extract_collection(value, T::CONTENT).ok_or_else(|| ClientError::QueryFailed {
            kind: T::KIND,
            cause: format!("response has no {}", T::CONTENT),
        })?;

        let mut records: Vec<T> = serde_json::from_value(Value::Array(rows))
            .map_err(|e| ClientError::from(e).in_query(T::KIND))?;
        records.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(records)
    }

    fn url(&self, endpoint: Endpoint, params: &[(&str, &str)]) -> Result<Url, ClientError> {
        let base = format!("{}/{}", self.base_url, endpoint.path());
        let auth = [
            ("username", self.username.as_str()),
            ("passhash", self.passhash.as_str()),
        ];
        Url::parse_with_params(&base, auth.iter().chain(params.iter()))
            .map_err(|e| ClientError::Url(e.to_string()))
    }

    /// GET, normalize, and cache by URL hash.
    async fn fetch(&self, endpoint: Endpoint, params: &[(&str, &str)]) -> Result<Value, ClientError> {
        let url = self.url(endpoint, params)?;
        let key = cache_key(&url);

        let cached = self.cache.lock().get(&key);
        if let Some(hit) = cached {
            debug!(endpoint = endpoint.path(), "cache hit");
            return Ok(hit);
        }

        let value = self.request(&url).await?;
        let normalized = process_response(value)?;
        self.cache.lock().set(&key, normalized.clone());
        Ok(normalized)
    }

    async fn fetch_uncached(
        &self,
        endpoint: Endpoint,
        params: &[(&str, &str)],
    ) -> Result<Value, ClientError> {
        let url = self.url(endpoint, params)?;
        self.request(&url).await
    }

    async fn request(&self, url: &Url) -> Result<Value, ClientError> {
        debug!(path = url.path(), "GET");
        let response = self.transport.get(url).await?;

        if response.status == 403 {
            return Err(ClientError::AccessDenied(response.body));
        }
        if !response.is_success() {
            return Err(ClientError::Http {
                status: response.status,
                body: response.body,
            });
        }
        Ok(decode_body(&response.body))
    }
}

/// Builder for [`ApiClient`].
#[derive(Debug, Default)]
pub struct ApiClientBuilder {
    hostname: Option<String>,
    username: Option<String>,
    passhash: Option<String>,
    cache_timeout_secs: Option<u64>,
    request_timeout: Option<Duration>,
    tz_auto_adjust: bool,
    transport: Option<Arc<dyn Transport>>,
}

impl ApiClientBuilder {
    /// Server hostname, optionally with scheme and port
    /// (`prtg.local`, `http://10.0.0.5:8080`). Defaults to HTTPS.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Username and passhash sent with every request.
    pub fn credentials(mut self, username: impl Into<String>, passhash: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.passhash = Some(passhash.into());
        self
    }

    /// Response cache lifetime (default: 300 seconds).
    pub fn cache_timeout_secs(mut self, secs: u64) -> Self {
        self.cache_timeout_secs = Some(secs);
        self
    }

    /// Request timeout (default: 30 seconds). Ignored with a custom transport.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Format request dates in local time instead of UTC.
    pub fn tz_auto_adjust(mut self, enabled: bool) -> Self {
        self.tz_auto_adjust = enabled;
        self
    }

    /// Use a custom transport instead of reqwest.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new(
                self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            )?),
        };

        Ok(ApiClient {
            transport,
            base_url: base_url(self.hostname.as_deref().unwrap_or("localhost")),
            username: self.username.unwrap_or_default(),
            passhash: self.passhash.unwrap_or_default(),
            tz_auto_adjust: self.tz_auto_adjust,
            cache: Mutex::new(Cache::new(
                self.cache_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            )),
        })
    }
}

/// `https://host/api` from a bare or scheme-qualified hostname.
fn base_url(hostname: &str) -> String {
    let host = hostname.trim().trim_end_matches('/');
    let host = host.strip_suffix("/api").unwrap_or(host);
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/api")
    } else {
        format!("https://{host}/api")
    }
}

fn cache_key(url: &Url) -> String {
    format!("{:x}", Sha256::digest(url.as_str().as_bytes()))
}

/// Strip whitespace and the trailing `+` some builds report.
fn normalize_version(version: &str) -> String {
    version.trim().trim_end_matches('+').to_string()
}

/// A positive numeric sensor object id.
pub fn parse_sensor_id(raw: Option<&str>) -> Result<i64, ClientError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(ClientError::MissingSensorId)?;
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ClientError::InvalidSensorId),
    }
}

/// Exact or `/regex/` name test.
enum NameMatcher {
    Exact(String),
    Pattern(Regex),
}

impl NameMatcher {
    fn new(kind: &'static str, name: &str) -> Result<Self, ClientError> {
        match regex_pattern(name) {
            Some(pattern) => Regex::new(pattern)
                .map(NameMatcher::Pattern)
                .map_err(|e| ClientError::QueryFailed {
                    kind,
                    cause: format!("invalid pattern {name}: {e}"),
                }),
            None => Ok(NameMatcher::Exact(name.to_string())),
        }
    }

    fn is_match(&self, candidate: &str) -> bool {
        match self {
            NameMatcher::Exact(name) => candidate == name,
            NameMatcher::Pattern(re) => re.is_match(candidate),
        }
    }
}

/// A parent filter worth applying: trimmed, non-empty and not the wildcard.
fn parent_scope(parent: Option<&str>) -> Option<&str> {
    parent.map(str::trim).filter(|p| !p.is_empty() && *p != WILDCARD)
}

/// Keep records whose `key` parent column matches `parent`.
fn within<T: Named>(
    records: Vec<T>,
    key: &str,
    parent: Option<&str>,
) -> Result<Vec<T>, ClientError> {
    let Some(parent) = parent else {
        return Ok(records);
    };
    let matcher = NameMatcher::new(T::KIND, parent)?;
    Ok(records
        .into_iter()
        .filter(|r| {
            r.parents()
                .iter()
                .any(|(k, v)| *k == key && matcher.is_match(v))
        })
        .collect())
}

fn find_by_name<T: Named>(records: Vec<T>, name: &str) -> Result<T, ClientError> {
    let matcher = NameMatcher::new(T::KIND, name)?;
    records
        .into_iter()
        .find(|r| matcher.is_match(r.name()))
        .ok_or_else(|| ClientError::NotFound {
            kind: T::KIND,
            name: name.to_string(),
        })
}

/// Escape text for the HTML annotation body.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

fn message_entry(row: &Value) -> Option<MessageEntry> {
    let text_of = |key: &str| row.get(key).and_then(Value::as_str).map(str::trim);

    let parent = text_of("parent")?;
    let kind = text_of("type")?;
    let message = text_of("message_raw").or_else(|| text_of("message"))?;
    let serial = row.get("datetime_raw").and_then(Value::as_f64)?;

    let tags = text_of("tags")
        .map(|t| {
            t.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Some(MessageEntry {
        time: ole_to_unix_ms(serial),
        title: kind.to_string(),
        text: format!(
            "<p><b>{}</b></p><p>{}</p><p>{}</p>",
            escape_html(parent),
            escape_html(kind),
            escape_html(message)
        ),
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StaticTransport;
    use serde_json::json;

    fn client(transport: &StaticTransport) -> ApiClient {
        ApiClient::builder()
            .hostname("prtg.local")
            .credentials("admin", "hash")
            .transport(Arc::new(transport.clone()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("prtg.local"), "https://prtg.local/api");
        assert_eq!(base_url("http://10.0.0.5:8080/"), "http://10.0.0.5:8080/api");
        assert_eq!(base_url("https://prtg.local/api"), "https://prtg.local/api");
    }

    #[test]
    fn test_parse_sensor_id() {
        assert_eq!(parse_sensor_id(Some("2044")), Ok(2044));
        assert_eq!(parse_sensor_id(Some("-1")), Err(ClientError::InvalidSensorId));
        assert_eq!(parse_sensor_id(Some("abc")), Err(ClientError::InvalidSensorId));
        assert_eq!(parse_sensor_id(Some(" ")), Err(ClientError::MissingSensorId));
        assert_eq!(parse_sensor_id(None), Err(ClientError::MissingSensorId));
    }

    #[tokio::test]
    async fn test_version_string() {
        let transport = StaticTransport::new().route("status.json", r#"{"Version": "24.1.92.1554+"}"#);
        assert_eq!(client(&transport).version_string().await, "24.1.92.1554");

        let transport = StaticTransport::new().route("status.json", r#"{"Version": ""}"#);
        assert_eq!(client(&transport).version_string().await, UNKNOWN_VERSION);

        let transport = StaticTransport::new().route_error("status.json", ClientError::Timeout);
        assert_eq!(
            client(&transport).version_string().await,
            "ERROR: Request timed out"
        );
    }

    #[tokio::test]
    async fn test_test_auth() {
        let transport = StaticTransport::new().route("content=groups", r#"{"groups": []}"#);
        assert!(client(&transport).test_auth().await);

        let transport = StaticTransport::new().route_status("table.json", 403, "denied");
        let c = client(&transport);
        assert!(!c.test_auth().await);
        assert!(matches!(c.try_auth().await, Err(ClientError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn test_group_suggest_sorted_by_name() {
        let transport = StaticTransport::new().route(
            "content=groups",
            r#"{"prtg-version": "24.1", "groups": [{"objid": 2, "group": "B"}, {"objid": 1, "group": "A"}]}"#,
        );
        let groups = client(&transport).group_suggest().await.unwrap();
        let names: Vec<_> = groups.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_device_suggest_filters_and_sorts() {
        let transport = StaticTransport::new().route(
            "content=devices",
            r#"{"prtg-version": "24.1", "devices": [{"objid": 5, "device": "sw2"}, {"objid": 4, "device": "sw1"}]}"#,
        );
        let c = client(&transport);
        let devices = c.device_suggest(Some("Network")).await.unwrap();
        assert_eq!(devices[0].device, "sw1");

        let requests = transport.requests();
        assert!(requests[0].contains("filter_group=Network"));
        assert!(requests[0].contains("username=admin"));
        assert!(requests[0].contains("passhash=hash"));

        c.device_suggest(Some("*")).await.unwrap();
        assert!(!transport.requests()[1].contains("filter_group"));
    }

    #[tokio::test]
    async fn test_suggest_without_collection_fails() {
        let transport = StaticTransport::new().route("content=sensors", r#"{"treesize": 0}"#);
        let err = client(&transport).sensor_suggest(None).await.unwrap_err();
        assert_eq!(err.to_string(), "Sensor query failed: response has no sensors");
    }

    #[tokio::test]
    async fn test_suggest_http_error_is_prefixed() {
        let transport = StaticTransport::new().route_status("content=groups", 500, "boom");
        let err = client(&transport).group_suggest().await.unwrap_err();
        assert_eq!(err.to_string(), "Group query failed: HTTP 500: boom");
    }

    #[tokio::test]
    async fn test_responses_are_cached() {
        let transport = StaticTransport::new().route("content=groups", r#"{"groups": [{"group": "A"}]}"#);
        let c = client(&transport);
        c.group_suggest().await.unwrap();
        c.group_suggest().await.unwrap();
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(c.cached_responses(), 1);

        c.clear_cache();
        c.group_suggest().await.unwrap();
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_info_lookup() {
        let transport = StaticTransport::new().route(
            "content=sensors",
            r#"{"sensors": [{"objid": 10, "sensor": "Ping"}, {"objid": 11, "sensor": "Traffic core"}]}"#,
        );
        let c = client(&transport);
        assert_eq!(c.sensor_info("Ping").await.unwrap().objid, 10);
        assert_eq!(c.sensor_info("/^Traffic/").await.unwrap().objid, 11);

        let err = c.sensor_info("Missing").await.unwrap_err();
        assert_eq!(err.to_string(), "Sensor not found: Missing");
    }

    #[tokio::test]
    async fn test_sensor_lookup_scoped_to_device() {
        let transport = StaticTransport::new().route(
            "content=sensors",
            r#"{"sensors": [
                {"objid": 100, "sensor": "Ping", "device": "core-sw1"},
                {"objid": 200, "sensor": "Ping", "device": "core-sw2"}
            ]}"#,
        );
        let c = client(&transport);

        assert_eq!(c.sensor_info("Ping").await.unwrap().objid, 100);
        assert_eq!(c.sensor_info_on(Some("core-sw2"), "Ping").await.unwrap().objid, 200);
        assert_eq!(c.sensor_info_on(Some("*"), "Ping").await.unwrap().objid, 100);
        assert_eq!(c.sensor_info_on(Some("/sw2$/"), "Ping").await.unwrap().objid, 200);
        assert_eq!(transport.requests_matching("filter_device=core-sw2").len(), 1);
        assert!(!transport.requests_matching("content=sensors").iter().any(|u| u.contains("filter_device=%2F")));

        let err = c.sensor_info_on(Some("core-sw3"), "Ping").await.unwrap_err();
        assert_eq!(err.to_string(), "Sensor not found: Ping");
    }

    #[tokio::test]
    async fn test_device_lookup_scoped_to_group() {
        let transport = StaticTransport::new().route(
            "content=devices",
            r#"{"devices": [
                {"objid": 10, "device": "gw", "group": "Site A"},
                {"objid": 20, "device": "gw", "group": "Site B"}
            ]}"#,
        );
        let c = client(&transport);
        assert_eq!(c.device_info("gw").await.unwrap().objid, 10);
        assert_eq!(c.device_info_in(Some("Site B"), "gw").await.unwrap().objid, 20);
    }

    #[tokio::test]
    async fn test_historical_data_rejects_bad_ids_before_network() {
        let transport = StaticTransport::new();
        let c = client(&transport);

        let err = c
            .historical_data(0, 3_600_000, &[QueryItem::new(-1, "*")])
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::InvalidSensorId);

        let err = c
            .historical_data(0, 3_600_000, &[QueryItem::default()])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid query: Missing sensor ID");

        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_historical_data_request_shape() {
        let transport = StaticTransport::new().route(
            "historicdata.json",
            r#"{"prtg-version": "24.1", "treesize": 1, "histdata": [{"datetime": "01.03.2024 10:00:00", "Ping Time": 4}]}"#,
        );
        let c = client(&transport);
        let hour = 3_600_000;

        let response = c
            .historical_data(0, 20 * hour, &[QueryItem::new(2044, "*")])
            .await
            .unwrap();
        assert_eq!(response.histdata.len(), 1);

        let url = &transport.requests()[0];
        assert!(url.contains("id=2044"));
        assert!(url.contains("avg=300"));
        assert!(url.contains("sdate=1970-01-01-00-00-00"));
        assert!(url.contains("edate=1970-01-01-20-00-00"));
        assert!(!url.contains("channel="));

        c.historical_data(0, 1000 * hour, &[QueryItem::new(2044, "Ping Time")])
            .await
            .unwrap();
        let url = &transport.requests()[1];
        assert!(url.contains("avg=86400"));
        assert!(url.contains("channel=Ping+Time"));

        c.historical_data(0, 5 * hour, &[QueryItem::new(2044, "*")])
            .await
            .unwrap();
        assert!(transport.requests()[2].contains("avg=0"));
    }

    #[tokio::test]
    async fn test_historical_data_empty() {
        let transport = StaticTransport::new()
            .route("id=1&", r#"{"prtg-version": "24.1", "histdata": []}"#)
            .route("id=2&", "Not enough monitoring data");
        let c = client(&transport);

        let err = c
            .historical_data(0, 1000, &[QueryItem::new(1, "*")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No historical data received");

        let err = c
            .historical_data(0, 1000, &[QueryItem::new(2, "*")])
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::NotEnoughData);
        assert!(err.is_no_data());
    }

    #[tokio::test]
    async fn test_messages_window_and_format() {
        let body = json!({
            "prtg-version": "24.1",
            "messages": [
                {"datetime_raw": 45000.5, "parent": "Ping", "type": "Down", "message": "Timeout", "tags": "net, core ,"},
                {"datetime_raw": 45000.5, "parent": "Ping", "message": "no type"}
            ]
        })
        .to_string();
        let transport = StaticTransport::new().route("content=messages", body);
        let c = client(&transport);
        let at = 1_678_881_600;

        let entries = c.messages(at - 60, at + 60, 2044).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].time, at * 1000);
        assert_eq!(entries[0].title, "Down");
        assert!(entries[0].text.contains("Ping"));
        assert!(entries[0].text.contains("Timeout"));
        assert_eq!(entries[0].tags, vec!["net", "core"]);

        assert!(c.messages(at - 60, at - 1, 2044).await.unwrap().is_empty());
        // Bounds are exclusive.
        assert!(c.messages(at, at + 60, 2044).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_messages_millisecond_window() {
        // 300 ms past a whole second.
        let serial = 45000.5 + 0.3 / 86_400.0;
        let body = json!({
            "messages": [{"datetime_raw": serial, "parent": "Ping", "type": "Down", "message": "x"}]
        })
        .to_string();
        let transport = StaticTransport::new().route("content=messages", body);
        let c = client(&transport);
        let at_ms = 1_678_881_600_000;

        let hits = c.messages_between(at_ms + 200, at_ms + 60_000, 2044).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].time, at_ms + 300);
        assert!(c
            .messages_between(at_ms + 600, at_ms + 60_000, 2044)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_message_text_is_escaped() {
        let body = json!({
            "messages": [{
                "datetime_raw": 45000.5,
                "parent": "<b>core</b>",
                "type": "Down & out",
                "message": "<script>alert(1)</script>"
            }]
        })
        .to_string();
        let transport = StaticTransport::new().route("content=messages", body);
        let at = 1_678_881_600;

        let entries = client(&transport).messages(at - 60, at + 60, 2044).await.unwrap();
        let text = &entries[0].text;
        assert!(text.contains("&lt;b&gt;core&lt;/b&gt;"));
        assert!(text.contains("Down &amp; out"));
        assert!(text.contains("&lt;script&gt;"));
        assert!(!text.contains("<script>"));
        assert_eq!(entries[0].title, "Down & out");
    }

    #[tokio::test]
    async fn test_value_lookup_outcomes() {
        let transport = StaticTransport::new()
            .route(
                "content=channels",
                r#"{"channels": [{"objid": 2044, "name": "Ping Time"}]}"#,
            )
            .route(
                "content=values",
                r#"{"values": [{"datetime": "01.03.2024 10:00:00", "Ping Time": "4 msec"}]}"#,
            );
        let c = client(&transport);

        assert_eq!(c.value_lookup(None, None, None, Some(" ")).await, ValueLookup::NoChannel);

        match c.value_lookup(None, None, Some("Ping"), Some("Ping Time")).await {
            ValueLookup::Values { sensor_id, rows } => {
                assert_eq!(sensor_id, 2044);
                assert_eq!(rows.len(), 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(transport.requests_matching("content=values")[0].contains("id=2044"));
    }

    #[tokio::test]
    async fn test_value_lookup_partial_failure() {
        let transport = StaticTransport::new()
            .route("content=channels", r#"{"channels": [{"objid": 7, "name": "Load"}]}"#)
            .route_status("content=values", 500, "boom");
        let c = client(&transport);

        let outcome = c.value_lookup(None, None, None, Some("Load")).await;
        assert!(matches!(outcome, ValueLookup::FetchFailed { sensor_id: 7, .. }));
        assert!(c.value_suggest(None, None, None, Some("Load")).await.is_empty());
    }

    #[tokio::test]
    async fn test_value_lookup_unresolved_sensor() {
        let transport = StaticTransport::new().route("content=channels", r#"{"channels": []}"#);
        let c = client(&transport);
        assert_eq!(
            c.value_lookup(None, None, None, Some("Load")).await,
            ValueLookup::SensorUnresolved
        );
    }
}
