//! KDL schema for config.kdl.
//!
//! ```kdl
//! backend "sqlite"          // or "file", "memory"
//! history-limit 20
//! review-interval-hours 6
//! decision-log-limit 200
//! log-level "warn"
//! log-format "text"         // or "json"
//! action-log #true
//! ```
//!
//! Every node is optional and unknown nodes are ignored. A known node whose
//! value has the wrong type or is out of range is an error.

use crate::storage::BackendType;
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

/// File name of the config inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.kdl";

/// Longest allowed review interval (one year).
pub const MAX_REVIEW_INTERVAL_HOURS: u32 = 24 * 365;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines (default)
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings stored in config.kdl.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaypointConfig {
    /// Storage backend name, checked by [`WaypointConfig::validate`]
    pub backend: Option<String>,

    /// Entries kept in outcome and execution history; the engine caps this at 20
    pub history_limit: Option<u32>,

    /// Hours until the next scheduled review
    pub review_interval_hours: Option<u32>,

    /// Entries kept in the decision log
    pub decision_log_limit: Option<u32>,

    /// Default tracing filter when `WP_LOG` is unset
    pub log_level: Option<String>,

    pub log_format: Option<LogFormat>,

    /// Whether operator commands are appended to action.log
    pub action_log: Option<bool>,
}

impl WaypointConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsed backend type, if set and recognized.
    pub fn backend_type(&self) -> Option<BackendType> {
        self.backend.as_deref().and_then(BackendType::parse)
    }

    /// Validate the config values.
    ///
    /// Returns an error message naming the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref backend) = self.backend {
            if BackendType::parse(backend).is_none() {
                return Err(format!(
                    "backend must be \"sqlite\", \"file\" or \"memory\", got \"{}\"",
                    backend
                ));
            }
        }
        let positive = [
            ("history-limit", self.history_limit),
            ("review-interval-hours", self.review_interval_hours),
            ("decision-log-limit", self.decision_log_limit),
        ];
        for (name, value) in positive {
            if value == Some(0) {
                return Err(format!("{} must be at least 1", name));
            }
        }
        if let Some(hours) = self.review_interval_hours {
            if hours > MAX_REVIEW_INTERVAL_HOURS {
                return Err(format!(
                    "review-interval-hours must be at most {}, got {}",
                    MAX_REVIEW_INTERVAL_HOURS, hours
                ));
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    ///
    /// Returns an error message naming the first node with a malformed value.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self, String> {
        let log_format = match string_value(doc, "log-format")? {
            Some(s) => Some(LogFormat::parse(&s).ok_or_else(|| {
                format!("log-format must be \"text\" or \"json\", got \"{}\"", s)
            })?),
            None => None,
        };
        let action_log = match first_value(doc, "action-log") {
            Some(value) => Some(
                value
                    .as_bool()
                    .ok_or_else(|| format!("action-log must be #true or #false, got {}", value))?,
            ),
            None => None,
        };

        Ok(Self {
            backend: string_value(doc, "backend")?,
            history_limit: u32_value(doc, "history-limit")?,
            review_interval_hours: u32_value(doc, "review-interval-hours")?,
            decision_log_limit: u32_value(doc, "decision-log-limit")?,
            log_level: string_value(doc, "log-level")?,
            log_format,
            action_log,
        })
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref backend) = self.backend {
            push_node(&mut doc, "backend", KdlValue::String(backend.clone()));
        }
        let limits = [
            ("history-limit", self.history_limit),
            ("review-interval-hours", self.review_interval_hours),
            ("decision-log-limit", self.decision_log_limit),
        ];
        for (name, value) in limits {
            if let Some(v) = value {
                push_node(&mut doc, name, KdlValue::Integer(i128::from(v)));
            }
        }
        if let Some(ref level) = self.log_level {
            push_node(&mut doc, "log-level", KdlValue::String(level.clone()));
        }
        if let Some(format) = self.log_format {
            push_node(&mut doc, "log-format", KdlValue::String(format.as_str().to_string()));
        }
        if let Some(enabled) = self.action_log {
            push_node(&mut doc, "action-log", KdlValue::Bool(enabled));
        }

        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &WaypointConfig) {
        if other.backend.is_some() {
            self.backend = other.backend.clone();
        }
        if other.history_limit.is_some() {
            self.history_limit = other.history_limit;
        }
        if other.review_interval_hours.is_some() {
            self.review_interval_hours = other.review_interval_hours;
        }
        if other.decision_log_limit.is_some() {
            self.decision_log_limit = other.decision_log_limit;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level.clone();
        }
        if other.log_format.is_some() {
            self.log_format = other.log_format;
        }
        if other.action_log.is_some() {
            self.action_log = other.action_log;
        }
    }
}

fn first_value<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .map(|entry| entry.value())
}

fn string_value(doc: &KdlDocument, name: &str) -> Result<Option<String>, String> {
    let Some(value) = first_value(doc, name) else {
        return Ok(None);
    };
    value
        .as_string()
        .map(|s| Some(s.to_string()))
        .ok_or_else(|| format!("{} must be a string, got {}", name, value))
}

fn u32_value(doc: &KdlDocument, name: &str) -> Result<Option<u32>, String> {
    let Some(value) = first_value(doc, name) else {
        return Ok(None);
    };
    value
        .as_integer()
        .and_then(|i| u32::try_from(i).ok())
        .map(Some)
        .ok_or_else(|| format!("{} must be a non-negative integer, got {}", name, value))
}

fn push_node(doc: &mut KdlDocument, name: &str, value: KdlValue) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(value));
    doc.nodes_mut().push(node);
}
