use anyhow::Result;
use serde_json::{json, Value};

use crate::config::TableSection;
use crate::rows::{normalize_records, Row};
use crate::schema::RowSchema;

/// Localized mutation applied to rows and records after a successful
/// side-effecting action: a new status plus a raised request flag.
#[derive(Debug, Clone)]
pub struct OptimisticPatch {
    pub id_field: String,
    pub status_field: String,
    pub patched_status: String,
    pub flag_field: String,
}

/// The one piece of mutable shared state: the fetched record array and its
/// derived rows, owned by the view that renders the table. Mutated only by
/// a full replace on fresh data and by [`apply_patch`](Self::apply_patch).
pub struct ViewState {
    table: TableSection,
    schema: RowSchema,
    records: Vec<Value>,
    rows: Vec<Row>,
    stale: bool,
}

impl ViewState {
    pub fn new(table: TableSection) -> Self {
        let schema = RowSchema::from_table(&table);
        Self {
            table,
            schema,
            records: Vec::new(),
            rows: Vec::new(),
            stale: false,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn schema(&self) -> &RowSchema {
        &self.schema
    }

    /// Full replace on fresh data arrival. Normalization failure leaves the
    /// previous rows in place and propagates; there is no partial table.
    pub fn replace(&mut self, records: Vec<Value>) -> Result<()> {
        let rows = normalize_records(&records, &self.table, &self.schema)?;
        self.records = records;
        self.rows = rows;
        self.stale = false;
        Ok(())
    }

    /// Patch every row and record matching the identifier. Returns how many
    /// rows changed and marks the view as needing an authoritative refresh
    /// when any did.
    pub fn apply_patch(&mut self, patch: &OptimisticPatch, key: &str) -> usize {
        let mut patched = 0;
        for row in &mut self.rows {
            if row.lookup(&patch.id_field).as_deref() != Some(key) {
                continue;
            }
            row.fields
                .insert(patch.status_field.clone(), patch.patched_status.clone());
            row.fields.insert(patch.flag_field.clone(), "true".to_string());
            if let Some(Value::Object(full)) = row.full.as_mut() {
                full.insert(patch.status_field.clone(), json!(patch.patched_status));
                full.insert(patch.flag_field.clone(), json!(true));
            }
            patched += 1;
        }
        for record in &mut self.records {
            let matches = record
                .get(&patch.id_field)
                .map(|v| scalar_eq(v, key))
                .unwrap_or(false);
            if !matches {
                continue;
            }
            if let Value::Object(map) = record {
                map.insert(patch.status_field.clone(), json!(patch.patched_status));
                map.insert(patch.flag_field.clone(), json!(true));
            }
        }
        if patched > 0 {
            self.stale = true;
        }
        patched
    }

    /// True once an optimistic patch landed; cleared by the next replace.
    pub fn needs_refresh(&self) -> bool {
        self.stale
    }
}

fn scalar_eq(value: &Value, key: &str) -> bool {
    match value {
        Value::String(s) => s == key,
        Value::Number(n) => n.to_string() == key,
        _ => false,
    }
}
