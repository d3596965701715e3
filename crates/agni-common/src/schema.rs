//! Export schema projection.
//!
//! Derives a stable column ordering from a heterogeneous record set and
//! renders rows against it. No I/O happens here; the CSV writer consumes
//! `(columns, rows)`.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::types::Record;

/// An ordered column set derived from the union of all record keys.
///
/// Priority columns come first, in the priority list's order, skipping
/// any that no record actually has. The remaining columns follow in
/// lexicographic order so the schema is stable across runs.
#[derive(Debug, Clone)]
pub struct ExportSchema {
    columns: Vec<String>,
}

impl ExportSchema {
    /// Builds the schema from the records to be exported.
    pub fn from_records(records: &[Record], priority: &[String]) -> Self {
        let mut keys: BTreeSet<&str> = BTreeSet::new();
        for record in records {
            keys.extend(record.keys().map(String::as_str));
        }

        let mut columns: Vec<String> = Vec::with_capacity(keys.len());
        for col in priority {
            if keys.remove(col.as_str()) {
                columns.push(col.clone());
            }
        }
        columns.extend(keys.into_iter().map(String::from));

        Self { columns }
    }

    /// The ordered column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Renders one record as a row, substituting the empty string for
    /// absent fields.
    pub fn row(&self, record: &Record) -> Vec<String> {
        self.columns
            .iter()
            .map(|col| record.get(col).map(render_cell).unwrap_or_default())
            .collect()
    }

    /// Renders all records against this schema.
    pub fn project(&self, records: &[Record]) -> Vec<Vec<String>> {
        records.iter().map(|r| self.row(r)).collect()
    }
}

/// Renders a single field value as CSV cell text. Strings are written
/// bare; nested structures are serialized to their JSON text form.
fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => serde_json::to_string(nested).unwrap_or_default(),
    }
}
