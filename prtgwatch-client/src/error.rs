//! Error types for the API client.

use thiserror::Error;

/// Errors that can occur when talking to the monitoring server.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// The server answered 403.
    #[error("Access denied: check username and passhash ({0})")]
    AccessDenied(String),

    /// Any other non-success status. Carries the response body as detail.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(String),

    /// A suggest/info query failed or returned no usable collection.
    #[error("{kind} query failed: {cause}")]
    QueryFailed { kind: &'static str, cause: String },

    /// An info lookup found no record with the requested name.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Invalid sensor ID")]
    InvalidSensorId,

    #[error("Invalid query: Missing sensor ID")]
    MissingSensorId,

    #[error("No historical data received")]
    NoHistoricalData,

    /// The server's sentinel for an empty range.
    #[error("Not enough monitoring data")]
    NotEnoughData,
}

impl ClientError {
    /// Wrap this error as the cause of a failed `kind` query.
    ///
    /// Errors that already name their operation pass through unchanged.
    pub fn in_query(self, kind: &'static str) -> Self {
        match self {
            ClientError::QueryFailed { .. } | ClientError::NotFound { .. } => self,
            other => ClientError::QueryFailed {
                kind,
                cause: other.to_string(),
            },
        }
    }

    /// HTTP-status-derived code, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::AccessDenied(_) => Some(403),
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for "valid request, empty result" conditions.
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            ClientError::NoHistoricalData | ClientError::NotEnoughData
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ClientError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_query_prefixes_operation() {
        let err = ClientError::Timeout.in_query("Group");
        assert_eq!(err.to_string(), "Group query failed: Request timed out");

        let not_found = ClientError::NotFound {
            kind: "Sensor",
            name: "Ping".to_string(),
        };
        assert_eq!(not_found.clone().in_query("Sensor"), not_found);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ClientError::AccessDenied("x".into()).status(), Some(403));
        let http = ClientError::Http {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(http.status(), Some(500));
        assert_eq!(http.to_string(), "HTTP 500: boom");
        assert_eq!(ClientError::InvalidSensorId.status(), None);
    }
}
