//! Structured technical-issue record extracted from free text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::sanitize::extract_json;

/// Placeholder for any field the model left out, nulled or blanked.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Field names in their fixed output order.
pub const ISSUE_FIELDS: [&str; 7] = [
    "issue_type",
    "video_length",
    "video_format",
    "error_message",
    "stage_of_failure",
    "device_or_environment",
    "urgency_level",
];

/// The seven fields support staff need to triage a technical issue.
///
/// Serialization always emits the fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub issue_type: String,
    pub video_length: String,
    pub video_format: String,
    pub error_message: String,
    pub stage_of_failure: String,
    pub device_or_environment: String,
    pub urgency_level: String,
}

impl Default for IssueRecord {
    fn default() -> Self {
        Self {
            issue_type: NOT_SPECIFIED.into(),
            video_length: NOT_SPECIFIED.into(),
            video_format: NOT_SPECIFIED.into(),
            error_message: NOT_SPECIFIED.into(),
            stage_of_failure: NOT_SPECIFIED.into(),
            device_or_environment: NOT_SPECIFIED.into(),
            urgency_level: NOT_SPECIFIED.into(),
        }
    }
}

/// Normalize one raw value: strings are trimmed, other JSON is kept as its
/// compact text, and null or blank becomes [`NOT_SPECIFIED`].
fn field_value(raw: Option<&Value>) -> String {
    let text = match raw {
        None | Some(Value::Null) => return NOT_SPECIFIED.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    };

    if text.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        text
    }
}

impl IssueRecord {
    /// Build a record from a parsed object. Unknown keys are ignored.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let get = |key: &str| field_value(object.get(key));
        Self {
            issue_type: get("issue_type"),
            video_length: get("video_length"),
            video_format: get("video_format"),
            error_message: get("error_message"),
            stage_of_failure: get("stage_of_failure"),
            device_or_environment: get("device_or_environment"),
            urgency_level: get("urgency_level"),
        }
    }

    /// Parse raw extraction output, tolerating prose and code fences.
    pub fn from_model_output(raw: &str) -> Self {
        let record = Self::from_object(&extract_json(raw));
        let missing = record
            .fields()
            .iter()
            .filter(|(_, value)| *value == NOT_SPECIFIED)
            .count();
        tracing::debug!(missing, "Sanitized issue record");
        record
    }

    /// Field name and value pairs in output order.
    pub fn fields(&self) -> [(&'static str, &str); 7] {
        [
            (ISSUE_FIELDS[0], self.issue_type.as_str()),
            (ISSUE_FIELDS[1], self.video_length.as_str()),
            (ISSUE_FIELDS[2], self.video_format.as_str()),
            (ISSUE_FIELDS[3], self.error_message.as_str()),
            (ISSUE_FIELDS[4], self.stage_of_failure.as_str()),
            (ISSUE_FIELDS[5], self.device_or_environment.as_str()),
            (ISSUE_FIELDS[6], self.urgency_level.as_str()),
        ]
    }

    /// Two-space indented JSON in fixed field order.
    pub fn to_pretty_json(&self) -> String {
        // A struct of plain strings always serializes.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn keeps_trimmed_values() {
        let record = IssueRecord::from_object(&object(json!({
            "issue_type": "  export failure ",
            "video_format": "mp4",
        })));
        assert_eq!(record.issue_type, "export failure");
        assert_eq!(record.video_format, "mp4");
        assert_eq!(record.video_length, NOT_SPECIFIED);
    }

    #[test]
    fn null_and_blank_become_not_specified() {
        let record = IssueRecord::from_object(&object(json!({
            "error_message": null,
            "stage_of_failure": "   ",
            "urgency_level": "",
        })));
        assert_eq!(record.error_message, NOT_SPECIFIED);
        assert_eq!(record.stage_of_failure, NOT_SPECIFIED);
        assert_eq!(record.urgency_level, NOT_SPECIFIED);
    }

    #[test]
    fn non_string_values_become_text() {
        let record = IssueRecord::from_object(&object(json!({
            "video_length": 90,
            "device_or_environment": ["macOS", "Chrome"],
        })));
        assert_eq!(record.video_length, "90");
        assert_eq!(record.device_or_environment, r#"["macOS","Chrome"]"#);
    }

    #[test]
    fn unparseable_output_yields_all_not_specified() {
        let record = IssueRecord::from_model_output("Sorry, I cannot help with that.");
        assert_eq!(record, IssueRecord::default());
        assert!(record.fields().iter().all(|(_, v)| *v == NOT_SPECIFIED));
    }

    #[test]
    fn extra_fields_are_dropped_and_order_is_fixed() {
        let record = IssueRecord::from_model_output(
            r#"Sure! {"urgency_level": "high", "customer_mood": "angry", "issue_type": "crash"}"#,
        );
        let json: Value = serde_json::from_str(&record.to_pretty_json()).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ISSUE_FIELDS);
        assert!(json.get("customer_mood").is_none());
        assert_eq!(json["urgency_level"], "high");
        assert_eq!(json["issue_type"], "crash");
    }

    #[test]
    fn pretty_json_uses_two_space_indent() {
        let pretty = IssueRecord::default().to_pretty_json();
        assert!(pretty.starts_with("{\n  \"issue_type\": \"Not specified\",\n  \"video_length\""));
        assert!(pretty.ends_with("\"urgency_level\": \"Not specified\"\n}"));
        assert_eq!(pretty.lines().count(), 9);
    }

    #[test]
    fn field_names_match_serialized_keys() {
        let record = IssueRecord::default();
        let names: Vec<_> = record.fields().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ISSUE_FIELDS);
    }
}
