//! Live status samples reported by nodes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The latest status payload reported by a node.
///
/// Payloads are stored verbatim: any map of fields the node sends replaces the
/// previous sample as a whole. An empty sample means no live data, which is
/// also how a disconnected node is represented.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusSample(Map<String, Value>);

impl StatusSample {
    /// Returns an empty sample.
    pub fn empty() -> Self {
        Self(Map::new())
    }

    /// Wraps an already decoded field map.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Returns whether the sample carries no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a raw field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns the underlying field map.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns whether the node reports connectivity over IPv4 or IPv6.
    pub fn is_online(&self) -> bool {
        let flag = |field: &str| self.get(field).and_then(Value::as_bool).unwrap_or(false);
        flag("online4") || flag("online6")
    }

    /// Interprets the sample as the documented status fields.
    ///
    /// Returns `None` for an empty sample or when a documented field has an
    /// unexpected type.
    pub fn report(&self) -> Option<StatusReport> {
        if self.is_empty() {
            return None;
        }
        serde_json::from_value(Value::Object(self.0.clone())).ok()
    }
}

impl From<StatusReport> for StatusSample {
    fn from(report: StatusReport) -> Self {
        match serde_json::to_value(report) {
            Ok(Value::Object(fields)) => Self(fields),
            _ => Self::empty(),
        }
    }
}

/// Typed view of the status fields the reporting agent sends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusReport {
    pub online4: bool,
    pub online6: bool,
    /// Seconds since boot.
    pub uptime: f64,
    pub load: f64,
    /// CPU usage in percent.
    pub cpu: f64,
    pub network_rx: f64,
    pub network_tx: f64,
    pub network_in: f64,
    pub network_out: f64,
    pub memory_total: f64,
    pub memory_used: f64,
    pub swap_total: f64,
    pub swap_used: f64,
    pub hdd_total: f64,
    pub hdd_used: f64,
    pub custom: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_sample_serializes_as_empty_object() {
        let sample = StatusSample::empty();
        assert!(sample.is_empty());
        assert_eq!(serde_json::to_string(&sample).unwrap(), "{}");
        assert!(sample.report().is_none());
    }

    #[test]
    fn test_unknown_fields_are_kept_verbatim() {
        let sample: StatusSample =
            serde_json::from_value(json!({"online6": true, "gpu": {"temp": 61}})).unwrap();

        assert!(sample.is_online());
        assert_eq!(sample.get("gpu").unwrap()["temp"], 61);
        assert_eq!(
            serde_json::to_value(&sample).unwrap(),
            json!({"online6": true, "gpu": {"temp": 61}})
        );
    }

    #[test]
    fn test_report_reads_documented_fields() {
        let sample: StatusSample = serde_json::from_value(json!({
            "online4": true,
            "uptime": 3600,
            "load": 0.42,
            "cpu": 13,
            "memory_total": 2048,
            "memory_used": 512,
            "hdd_total": 0,
            "custom": "hello"
        }))
        .unwrap();

        let report = sample.report().unwrap();
        assert!(report.online4);
        assert!(!report.online6);
        assert_eq!(report.uptime, 3600.0);
        assert_eq!(report.memory_used, 512.0);
        assert_eq!(report.hdd_total, 0.0);
        assert_eq!(report.custom, "hello");
    }

    #[test]
    fn test_report_rejects_mistyped_field() {
        let sample: StatusSample = serde_json::from_value(json!({"cpu": "busy"})).unwrap();
        assert!(sample.report().is_none());
        assert!(!sample.is_online());
    }

    #[test]
    fn test_sample_from_report() {
        let sample = StatusSample::from(StatusReport {
            online4: true,
            cpu: 50.0,
            ..Default::default()
        });
        assert!(sample.is_online());
        assert_eq!(sample.get("cpu"), Some(&json!(50.0)));
    }
}
