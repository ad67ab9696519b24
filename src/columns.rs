use crate::config::TableSection;
use crate::rows::Row;

/// Glyph rendered when a cell's coerced value is empty or unresolvable.
pub const EMPTY_CELL: &str = "–";

/// How a column's cells are produced from a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRule {
    /// Opens the full-record detail view; used for the first display key.
    DetailView,
    /// Plain coerced string, empty values rendered as [`EMPTY_CELL`].
    Text,
    /// Caller-defined cell (the appended actions column).
    Actions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub accessor_key: String,
    pub header: String,
    pub cell: CellRule,
}

impl ColumnDescriptor {
    /// Extra column appended after the configuration-derived ones.
    pub fn actions(header: &str) -> Self {
        Self {
            accessor_key: "actions".to_string(),
            header: header.to_string(),
            cell: CellRule::Actions,
        }
    }
}

/// What the renderer receives for one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellContent {
    /// Text that opens the row's detail view when activated.
    Detail(String),
    Text(String),
    /// The host decides (action buttons, badges) from the row itself.
    Actions,
}

/// One descriptor per display key, in `display_keys` order, header resolved
/// from the labels map with the raw key as fallback. The first key's cells
/// open the detail view; an optional caller column is appended last.
pub fn build_columns(table: &TableSection, extra: Option<ColumnDescriptor>) -> Vec<ColumnDescriptor> {
    let mut columns: Vec<ColumnDescriptor> = table
        .display_keys
        .iter()
        .enumerate()
        .map(|(i, key)| ColumnDescriptor {
            accessor_key: key.clone(),
            header: table.label_for(key).to_string(),
            cell: if i == 0 { CellRule::DetailView } else { CellRule::Text },
        })
        .collect();
    if let Some(extra) = extra {
        columns.push(extra);
    }
    columns
}

/// Column list plus presentation-only decorations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    pub drag_handles: bool,
    pub columns: Vec<ColumnDescriptor>,
}

/// Layer drag-reorder affordances onto a final column list. Decoration
/// only: the accessor order used for data lookup is untouched.
pub fn with_reorder_handles(columns: Vec<ColumnDescriptor>) -> ColumnPlan {
    ColumnPlan { drag_handles: true, columns }
}

/// Produce the content for one cell of one row.
pub fn render_cell(column: &ColumnDescriptor, row: &Row) -> CellContent {
    match column.cell {
        CellRule::Actions => CellContent::Actions,
        CellRule::DetailView => {
            let text = row.field(&column.accessor_key).unwrap_or(EMPTY_CELL);
            CellContent::Detail(text.to_string())
        }
        CellRule::Text => {
            let text = match row.field(&column.accessor_key) {
                Some(v) if !v.is_empty() => v,
                _ => EMPTY_CELL,
            };
            CellContent::Text(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use std::collections::BTreeMap;

    fn table() -> crate::config::TableSection {
        DashboardConfig::bot_runs().sections.table
    }

    #[test]
    fn test_one_column_per_display_key_in_order() {
        let t = table();
        let cols = build_columns(&t, None);
        assert_eq!(cols.len(), t.display_keys.len());
        for (col, key) in cols.iter().zip(&t.display_keys) {
            assert_eq!(&col.accessor_key, key);
        }
    }

    #[test]
    fn test_header_label_fallback() {
        let mut t = table();
        t.labels.remove("updated_at");
        let cols = build_columns(&t, None);
        let status = cols.iter().find(|c| c.accessor_key == "status").unwrap();
        assert_eq!(status.header, "Status");
        let updated = cols.iter().find(|c| c.accessor_key == "updated_at").unwrap();
        assert_eq!(updated.header, "updated_at");
    }

    #[test]
    fn test_first_column_opens_detail_view() {
        let cols = build_columns(&table(), None);
        assert_eq!(cols[0].cell, CellRule::DetailView);
        assert!(cols[1..].iter().all(|c| c.cell == CellRule::Text));
    }

    #[test]
    fn test_extra_column_appended_last() {
        let t = table();
        let cols = build_columns(&t, Some(ColumnDescriptor::actions("Actions")));
        assert_eq!(cols.len(), t.display_keys.len() + 1);
        let last = cols.last().unwrap();
        assert_eq!(last.cell, CellRule::Actions);
        assert_eq!(last.header, "Actions");
    }

    #[test]
    fn test_reorder_decoration_keeps_order() {
        let cols = build_columns(&table(), Some(ColumnDescriptor::actions("Actions")));
        let keys: Vec<String> = cols.iter().map(|c| c.accessor_key.clone()).collect();
        let plan = with_reorder_handles(cols);
        assert!(plan.drag_handles);
        let after: Vec<String> = plan.columns.iter().map(|c| c.accessor_key.clone()).collect();
        assert_eq!(keys, after);
    }

    fn row_with(key: &str, value: &str) -> Row {
        let mut fields = BTreeMap::new();
        fields.insert(key.to_string(), value.to_string());
        Row { seq: 1, key: None, fields, full: None }
    }

    #[test]
    fn test_render_text_and_empty_glyph() {
        let col = ColumnDescriptor {
            accessor_key: "status".to_string(),
            header: "Status".to_string(),
            cell: CellRule::Text,
        };
        assert_eq!(
            render_cell(&col, &row_with("status", "running")),
            CellContent::Text("running".to_string())
        );
        assert_eq!(
            render_cell(&col, &row_with("status", "")),
            CellContent::Text(EMPTY_CELL.to_string())
        );
        assert_eq!(
            render_cell(&col, &row_with("other", "x")),
            CellContent::Text(EMPTY_CELL.to_string())
        );
    }

    #[test]
    fn test_render_detail_cell() {
        let col = ColumnDescriptor {
            accessor_key: "bot_name".to_string(),
            header: "Bot".to_string(),
            cell: CellRule::DetailView,
        };
        assert_eq!(
            render_cell(&col, &row_with("bot_name", "voucher")),
            CellContent::Detail("voucher".to_string())
        );
    }
}
