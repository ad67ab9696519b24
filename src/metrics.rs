use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a card metric is computed over the raw record array.
///
/// Closed set: a kind serde does not recognize fails config loading
/// instead of computing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationKind {
    Count,
    CountTrue,
    CountFalse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSpec {
    pub label: String,
    /// Field inspected by countTrue/countFalse; count ignores it.
    pub key: String,
    #[serde(rename = "type")]
    pub kind: AggregationKind,
    #[serde(default)]
    pub color: Option<String>,
}

impl MetricSpec {
    pub fn count(label: &str, key: &str, color: &str) -> Self {
        Self::new(label, key, AggregationKind::Count, color)
    }

    pub fn count_true(label: &str, key: &str, color: &str) -> Self {
        Self::new(label, key, AggregationKind::CountTrue, color)
    }

    pub fn count_false(label: &str, key: &str, color: &str) -> Self {
        Self::new(label, key, AggregationKind::CountFalse, color)
    }

    fn new(label: &str, key: &str, kind: AggregationKind, color: &str) -> Self {
        Self {
            label: label.to_string(),
            key: key.to_string(),
            kind,
            color: Some(color.to_string()),
        }
    }
}

/// A computed card value, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricValue {
    pub label: String,
    pub value: u64,
    pub color: Option<String>,
}

/// Truthiness the way the upstream records mean it: null/missing, false,
/// zero, NaN and the empty string are falsy; every other value (including
/// the string "false", objects and arrays) is truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn field<'a>(record: &'a Value, key: &str) -> Option<&'a Value> {
    record.as_object().and_then(|map| map.get(key))
}

/// Compute every configured metric over the current record array. Pure:
/// recomputed fresh on each call, no state carried between invocations.
pub fn compute_metrics(records: &[Value], specs: &[MetricSpec]) -> Vec<MetricValue> {
    specs
        .iter()
        .map(|spec| {
            let value = match spec.kind {
                AggregationKind::Count => records.len() as u64,
                AggregationKind::CountTrue => records
                    .iter()
                    .filter(|r| is_truthy(field(r, &spec.key)))
                    .count() as u64,
                AggregationKind::CountFalse => records
                    .iter()
                    .filter(|r| !is_truthy(field(r, &spec.key)))
                    .count() as u64,
            };
            MetricValue {
                label: spec.label.clone(),
                value,
                color: spec.color.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Value> {
        vec![json!({"a": 1}), json!({"a": 0}), json!({"a": null})]
    }

    #[test]
    fn test_count_ignores_key() {
        let specs = vec![MetricSpec::count("Total", "does_not_exist", "blue")];
        let out = compute_metrics(&records(), &specs);
        assert_eq!(out[0].value, 3);
    }

    #[test]
    fn test_count_true() {
        let specs = vec![MetricSpec::count_true("True", "a", "green")];
        let out = compute_metrics(&records(), &specs);
        assert_eq!(out[0].value, 1);
    }

    #[test]
    fn test_count_false() {
        let specs = vec![MetricSpec::count_false("False", "a", "red")];
        let out = compute_metrics(&records(), &specs);
        assert_eq!(out[0].value, 2);
    }

    #[test]
    fn test_missing_field_is_falsy() {
        let recs = vec![json!({"b": 1})];
        let specs = vec![MetricSpec::count_true("True", "a", "green")];
        assert_eq!(compute_metrics(&recs, &specs)[0].value, 0);
    }

    #[test]
    fn test_string_truthiness() {
        assert!(is_truthy(Some(&json!("false")))); // non-empty string
        assert!(!is_truthy(Some(&json!(""))));
        assert!(is_truthy(Some(&json!("true"))));
    }

    #[test]
    fn test_number_and_container_truthiness() {
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(0.0))));
        assert!(is_truthy(Some(&json!(-2))));
        assert!(is_truthy(Some(&json!({}))));
        assert!(is_truthy(Some(&json!([]))));
        assert!(!is_truthy(Some(&Value::Null)));
        assert!(!is_truthy(None));
    }

    #[test]
    fn test_metrics_preserve_spec_order() {
        let specs = vec![
            MetricSpec::count("First", "a", "blue"),
            MetricSpec::count_true("Second", "a", "green"),
        ];
        let out = compute_metrics(&records(), &specs);
        assert_eq!(out[0].label, "First");
        assert_eq!(out[1].label, "Second");
    }

    #[test]
    fn test_empty_records() {
        let specs = vec![
            MetricSpec::count("Total", "a", "blue"),
            MetricSpec::count_true("True", "a", "green"),
            MetricSpec::count_false("False", "a", "red"),
        ];
        let out = compute_metrics(&[], &specs);
        assert_eq!(out[0].value, 0);
        assert_eq!(out[1].value, 0);
        assert_eq!(out[2].value, 0);
    }
}
