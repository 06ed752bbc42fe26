use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{errors::Error, formatting::truncate_text, Result};

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
}

impl AuditEvent {
    fn base(event: &str, user_id: i64, username: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: Some(user_id),
            username: Some(username.to_string()),
            action: None,
            detail: None,
            authorized: None,
            error: None,
            context: None,
            retry_after: None,
        }
    }

    /// A user-visible action: intake, list, compile, extract, clear.
    pub fn action(user_id: i64, username: &str, action: &str, detail: &str) -> Self {
        let mut ev = Self::base("action", user_id, username);
        ev.action = Some(action.to_string());
        ev.detail = Some(detail.to_string());
        ev
    }

    pub fn auth(user_id: i64, username: &str, authorized: bool) -> Self {
        let mut ev = Self::base("auth", user_id, username);
        ev.authorized = Some(authorized);
        ev
    }

    pub fn error(user_id: i64, username: &str, error: &str, context: Option<&str>) -> Self {
        let mut ev = Self::base("error", user_id, username);
        ev.error = Some(error.to_string());
        ev.context = context.map(|s| s.to_string());
        ev
    }

    pub fn rate_limit(user_id: i64, username: &str, retry_after: f64) -> Self {
        let mut ev = Self::base("rate_limit", user_id, username);
        ev.retry_after = Some(retry_after);
        ev
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        // Truncate potentially large payloads.
        if let Some(s) = &event.detail {
            event.detail = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }
        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            out.push_str(&json_value_to_display(v));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.log"))
    }

    #[test]
    fn audit_truncates_long_details() {
        let log = AuditLogger::new(tmp_file("fcb-audit-test"), true);
        let detail = "x".repeat(AUDIT_MAX_TEXT + 50);
        log.write(AuditEvent::action(1, "u", "intake", &detail))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("..."));
        assert!(!written.contains(&detail));
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn plain_format_writes_key_value_lines() {
        let log = AuditLogger::new(tmp_file("fcb-audit-plain"), false);
        log.write(AuditEvent::auth(7, "alice", false)).unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("event: auth"));
        assert!(written.contains("authorized: false"));
        assert!(written.contains("user_id: 7"));
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn json_lines_are_parseable() {
        let log = AuditLogger::new(tmp_file("fcb-audit-json"), true);
        log.write(AuditEvent::rate_limit(3, "bob", 2.5)).unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        let v: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(v["event"], "rate_limit");
        assert_eq!(v["retry_after"], 2.5);
        let _ = std::fs::remove_file(log.path());
    }
}
