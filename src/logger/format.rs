//! Access log format module
//!
//! Supports multiple log formats:
//! - `combined` (Apache/Nginx combined format)
//! - `common` (Common Log Format - CLF)
//! - `json` (one JSON object per line)
//! - Custom patterns with variables

use chrono::{DateTime, Local};
use serde_json::json;

const CLF_TIME: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Parsed access log format, chosen once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessLogFormat {
    Combined,
    Common,
    Json,
    Custom(String),
}

impl AccessLogFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "combined" => Self::Combined,
            "common" => Self::Common,
            "json" => Self::Json,
            custom => Self::Custom(custom.to_string()),
        }
    }
}

/// One served request
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    pub time: DateTime<Local>,
    pub method: String,
    /// Path as the client sent it
    pub path: String,
    /// Query string (without leading ?)
    pub query: Option<String>,
    /// Path after directory-index rewriting, when it changed
    pub rewritten_path: Option<String>,
    pub http_version: String,
    pub status: u16,
    pub body_bytes: u64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub request_time_us: u64,
}

impl AccessLogEntry {
    /// Create a new entry stamped with the current local time
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            query: None,
            rewritten_path: None,
            http_version: "1.1".to_string(),
            status: 200,
            body_bytes: 0,
            referer: None,
            user_agent: None,
            request_time_us: 0,
        }
    }

    pub fn format(&self, format: &AccessLogFormat) -> String {
        match format {
            AccessLogFormat::Combined => format!(
                "{} \"{}\" \"{}\"",
                self.format_common(),
                self.referer.as_deref().unwrap_or("-"),
                self.user_agent.as_deref().unwrap_or("-"),
            ),
            AccessLogFormat::Common => self.format_common(),
            AccessLogFormat::Json => self.format_json(),
            AccessLogFormat::Custom(pattern) => self.format_custom(pattern),
        }
    }

    fn request_uri(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent`
    fn format_common(&self) -> String {
        format!(
            "{} - - [{}] \"{} {} HTTP/{}\" {} {}",
            self.remote_addr,
            self.time.format(CLF_TIME),
            self.method,
            self.request_uri(),
            self.http_version,
            self.status,
            self.body_bytes,
        )
    }

    fn format_json(&self) -> String {
        json!({
            "remote_addr": self.remote_addr,
            "time": self.time.to_rfc3339(),
            "method": self.method,
            "path": self.path,
            "query": self.query,
            "rewritten_path": self.rewritten_path,
            "http_version": self.http_version,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "referer": self.referer,
            "user_agent": self.user_agent,
            "request_time_us": self.request_time_us,
        })
        .to_string()
    }

    /// Custom format with variable substitution
    ///
    /// Supported variables: `$remote_addr`, `$time_local`, `$time_iso8601`,
    /// `$request`, `$request_method`, `$request_uri`, `$rewritten_uri`,
    /// `$status`, `$body_bytes_sent`, `$http_referer`, `$http_user_agent`,
    /// `$request_time` (seconds, 3 decimal places).
    fn format_custom(&self, pattern: &str) -> String {
        let request_uri = self.request_uri();
        let request_line = format!("{} {} HTTP/{}", self.method, request_uri, self.http_version);
        #[allow(clippy::cast_precision_loss)]
        let request_time = self.request_time_us as f64 / 1_000_000.0;

        // $request_time and $request_* before $request
        pattern
            .replace("$remote_addr", &self.remote_addr)
            .replace("$time_local", &self.time.format(CLF_TIME).to_string())
            .replace("$time_iso8601", &self.time.to_rfc3339())
            .replace("$request_time", &format!("{request_time:.3}"))
            .replace("$request_method", &self.method)
            .replace("$request_uri", &request_uri)
            .replace("$request", &request_line)
            .replace(
                "$rewritten_uri",
                self.rewritten_path.as_deref().unwrap_or(&self.path),
            )
            .replace("$status", &self.status.to_string())
            .replace("$body_bytes_sent", &self.body_bytes.to_string())
            .replace("$http_referer", self.referer.as_deref().unwrap_or("-"))
            .replace("$http_user_agent", self.user_agent.as_deref().unwrap_or("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_entry() -> AccessLogEntry {
        let mut entry = AccessLogEntry::new(
            "192.168.1.1".to_string(),
            "GET".to_string(),
            "/posts/my-post".to_string(),
        );
        entry.query = Some("ref=feed".to_string());
        entry.rewritten_path = Some("/posts/my-post/index.html".to_string());
        entry.status = 200;
        entry.body_bytes = 1234;
        entry.referer = Some("https://example.com".to_string());
        entry.user_agent = Some("Mozilla/5.0".to_string());
        entry.request_time_us = 1600;
        entry
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(AccessLogFormat::parse("combined"), AccessLogFormat::Combined);
        assert_eq!(AccessLogFormat::parse("json"), AccessLogFormat::Json);
        assert_eq!(
            AccessLogFormat::parse("$status"),
            AccessLogFormat::Custom("$status".to_string())
        );
    }

    #[test]
    fn test_format_combined() {
        let log = create_test_entry().format(&AccessLogFormat::Combined);
        assert!(log.starts_with("192.168.1.1 - - ["));
        assert!(log.contains("\"GET /posts/my-post?ref=feed HTTP/1.1\" 200 1234"));
        assert!(log.ends_with("\"https://example.com\" \"Mozilla/5.0\""));
    }

    #[test]
    fn test_format_common() {
        let log = create_test_entry().format(&AccessLogFormat::Common);
        assert!(log.contains("\"GET /posts/my-post?ref=feed HTTP/1.1\" 200 1234"));
        assert!(!log.contains("https://example.com"));
    }

    #[test]
    fn test_format_json() {
        let log = create_test_entry().format(&AccessLogFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&log).unwrap();
        assert_eq!(value["remote_addr"], "192.168.1.1");
        assert_eq!(value["rewritten_path"], "/posts/my-post/index.html");
        assert_eq!(value["status"], 200);
        assert_eq!(value["body_bytes"], 1234);
        assert!(value["time"].is_string());
    }

    #[test]
    fn test_format_json_escapes() {
        let mut entry = create_test_entry();
        entry.user_agent = Some("quote\" and \\ slash".to_string());
        let log = entry.format(&AccessLogFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&log).unwrap();
        assert_eq!(value["user_agent"], "quote\" and \\ slash");
    }

    #[test]
    fn test_format_custom() {
        let format = AccessLogFormat::parse("$request_method $request_uri -> $rewritten_uri $status $request_time");
        let log = create_test_entry().format(&format);
        assert_eq!(
            log,
            "GET /posts/my-post?ref=feed -> /posts/my-post/index.html 200 0.002"
        );
    }
}
