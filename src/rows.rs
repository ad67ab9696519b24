use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::Value;

use crate::config::TableSection;
use crate::schema::RowSchema;

/// Shown for a display key whose source value is null or absent.
pub const MISSING_VALUE: &str = "—";

/// Display-safe projection of one raw backend record.
///
/// `key` is the stable backend identity named by the table config's
/// `entity_key`; `seq` is the 1-based position in the fetched page, kept
/// only as a render-order hint. All display fields are strings, so rows
/// render and serialize without per-cell type dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub seq: usize,
    pub key: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub full: Option<Value>,
}

impl Row {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Value used for identity matching: prefer the full record's field,
    /// fall back to the displayed string.
    pub fn lookup(&self, key: &str) -> Option<String> {
        if let Some(full) = &self.full {
            if let Some(v) = full.get(key) {
                if let Some(s) = scalar_to_string(v) {
                    return Some(s);
                }
            }
        }
        self.field(key).map(|s| s.to_string())
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce an arbitrary backend value into its display string.
pub fn coerce_display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING_VALUE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => serde_json::to_string(other).unwrap_or_else(|_| MISSING_VALUE.to_string()),
    }
}

/// Project raw records into rows per the table configuration, then validate
/// the whole batch against the config-derived schema. Order is preserved;
/// any violation fails the call with no partial output.
pub fn normalize_records(
    records: &[Value],
    table: &TableSection,
    schema: &RowSchema,
) -> Result<Vec<Row>> {
    let rows: Vec<Row> = records
        .iter()
        .enumerate()
        .map(|(i, record)| project(i + 1, record, table))
        .collect();
    schema.validate_all(&rows)?;
    Ok(rows)
}

fn project(seq: usize, record: &Value, table: &TableSection) -> Row {
    let map = record.as_object();
    let mut fields = BTreeMap::new();
    for key in &table.display_keys {
        let val = map.and_then(|m| m.get(key));
        fields.insert(key.clone(), coerce_display(val));
    }

    let key = table
        .entity_key
        .as_ref()
        .and_then(|k| map.and_then(|m| m.get(k)))
        .and_then(scalar_to_string);

    let full = if table.keep_full_record {
        Some(record.clone())
    } else {
        None
    };

    Row { seq, key, fields, full }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use serde_json::json;

    fn table() -> TableSection {
        DashboardConfig::bot_runs().sections.table
    }

    fn schema(table: &TableSection) -> RowSchema {
        RowSchema::from_table(table)
    }

    #[test]
    fn test_rows_preserve_order_and_count() {
        let t = table();
        let s = schema(&t);
        let records = vec![
            json!({"bot_name": "a", "runid": "r1", "status": "queued", "cancel_requested": false, "updated_at": "t1"}),
            json!({"bot_name": "b", "runid": "r2", "status": "running", "cancel_requested": false, "updated_at": "t2"}),
            json!({"bot_name": "c", "runid": "r3", "status": "completed", "cancel_requested": true, "updated_at": "t3"}),
        ];
        let rows = normalize_records(&records, &t, &s).unwrap();
        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.seq, i + 1);
            for key in &t.display_keys {
                assert!(row.fields.contains_key(key), "missing {}", key);
            }
        }
        assert_eq!(rows[0].key.as_deref(), Some("r1"));
        assert_eq!(rows[2].field("status"), Some("completed"));
    }

    #[test]
    fn test_null_and_missing_become_placeholder() {
        let t = table();
        let s = schema(&t);
        let records = vec![json!({"runid": "r1", "bot_name": null, "status": "done"})];
        let rows = normalize_records(&records, &t, &s).unwrap();
        assert_eq!(rows[0].field("bot_name"), Some(MISSING_VALUE));
        // updated_at absent entirely
        assert_eq!(rows[0].field("updated_at"), Some(MISSING_VALUE));
        assert_eq!(rows[0].field("status"), Some("done"));
    }

    #[test]
    fn test_object_value_becomes_json_text() {
        let t = table();
        let s = schema(&t);
        let records = vec![json!({"runid": "r1", "bot_name": {"a": 1}})];
        let rows = normalize_records(&records, &t, &s).unwrap();
        assert_eq!(rows[0].field("bot_name"), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_scalar_coercion() {
        let t = table();
        let s = schema(&t);
        let records = vec![json!({"runid": 42, "cancel_requested": true, "bot_name": 1.5})];
        let rows = normalize_records(&records, &t, &s).unwrap();
        assert_eq!(rows[0].field("cancel_requested"), Some("true"));
        assert_eq!(rows[0].field("bot_name"), Some("1.5"));
        // numeric entity keys resolve too
        assert_eq!(rows[0].key.as_deref(), Some("42"));
    }

    #[test]
    fn test_full_record_attached_when_configured() {
        let t = table();
        let s = schema(&t);
        let records = vec![json!({"runid": "r1", "hidden_field": "kept"})];
        let rows = normalize_records(&records, &t, &s).unwrap();
        let full = rows[0].full.as_ref().unwrap();
        assert_eq!(full["hidden_field"], "kept");

        let mut bare = t.clone();
        bare.keep_full_record = false;
        let s2 = schema(&bare);
        let rows = normalize_records(&records, &bare, &s2).unwrap();
        assert!(rows[0].full.is_none());
    }

    #[test]
    fn test_missing_entity_key_leaves_key_unset() {
        let t = table();
        let s = schema(&t);
        let records = vec![json!({"bot_name": "orphan"})];
        let rows = normalize_records(&records, &t, &s).unwrap();
        assert!(rows[0].key.is_none());
    }

    #[test]
    fn test_empty_entity_key_fails_whole_batch() {
        let t = table();
        let s = schema(&t);
        let records = vec![
            json!({"runid": "ok"}),
            json!({"runid": ""}),
        ];
        assert!(normalize_records(&records, &t, &s).is_err());
    }

    #[test]
    fn test_lookup_prefers_full_record() {
        let t = table();
        let s = schema(&t);
        let records = vec![json!({"runid": "r1", "status": {"nested": true}})];
        let rows = normalize_records(&records, &t, &s).unwrap();
        // displayed status is JSON text, full-record status is not scalar,
        // so lookup falls back to the display string
        assert_eq!(rows[0].lookup("status").as_deref(), Some(r#"{"nested":true}"#));
        assert_eq!(rows[0].lookup("runid").as_deref(), Some("r1"));
    }

    #[test]
    fn test_end_to_end_shape() {
        let mut t = table();
        t.display_keys = vec!["name".to_string(), "status".to_string()];
        t.labels.clear();
        t.entity_key = None;
        t.keep_full_record = false;
        let s = schema(&t);
        let records = vec![
            json!({"name": "Acme", "status": "active"}),
            json!({"name": null, "status": "done"}),
        ];
        let rows = normalize_records(&records, &t, &s).unwrap();
        assert_eq!(rows[0].seq, 1);
        assert_eq!(rows[0].field("name"), Some("Acme"));
        assert_eq!(rows[0].field("status"), Some("active"));
        assert_eq!(rows[1].seq, 2);
        assert_eq!(rows[1].field("name"), Some(MISSING_VALUE));
        assert_eq!(rows[1].field("status"), Some("done"));
    }
}
