use std::fmt;

use crate::config::TableSection;
use crate::rows::Row;

/// Declarative row shape, derived from the table configuration and from
/// nothing else: adding a display key to a view's config changes
/// validation with it, so the two cannot drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSchema {
    pub required_fields: Vec<String>,
    pub has_entity_key: bool,
}

/// One failed check, pointing at the offending row.
#[derive(Debug, Clone)]
pub struct SchemaViolation {
    pub row_seq: usize,
    pub msg: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row_seq, self.msg)
    }
}

impl std::error::Error for SchemaViolation {}

impl RowSchema {
    pub fn from_table(table: &TableSection) -> Self {
        Self {
            required_fields: table.display_keys.clone(),
            has_entity_key: table.entity_key.is_some(),
        }
    }

    /// Check one row. Fields beyond the declared ones are tolerated and
    /// preserved; only the declared shape is enforced.
    pub fn validate(&self, row: &Row) -> Result<(), SchemaViolation> {
        if row.seq == 0 {
            return Err(SchemaViolation {
                row_seq: row.seq,
                msg: "seq must be 1-based".to_string(),
            });
        }
        for field in &self.required_fields {
            if !row.fields.contains_key(field) {
                return Err(SchemaViolation {
                    row_seq: row.seq,
                    msg: format!("missing display field `{}`", field),
                });
            }
        }
        // An entity key may be absent (the backend row simply has none and
        // actions stay unavailable for it), but never empty.
        if let Some(key) = &row.key {
            if key.is_empty() {
                return Err(SchemaViolation {
                    row_seq: row.seq,
                    msg: "entity key is empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate a whole batch atomically: the first violation rejects the
    /// entire batch, there is no per-row partial acceptance.
    pub fn validate_all(&self, rows: &[Row]) -> Result<(), SchemaViolation> {
        for row in rows {
            self.validate(row)?;
        }
        Ok(())
    }
}
