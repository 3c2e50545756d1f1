//! Upstream row to domain record mapping

use crate::core::error::{GatewayResult, UpstreamError};
use crate::core::resource::FieldMapping;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// One upstream result row: native column name to cell, in upstream order
pub type UpstreamRow = IndexMap<String, Value>;

/// Applies a declared field mapping to upstream rows.
///
/// Unmapped columns are ignored. A mapped column that is missing, `NULL`,
/// empty or blank leaves its field absent from the record.
#[derive(Debug, Clone, Copy)]
pub struct RowMapper<'a> {
    fields: &'a [FieldMapping],
}

impl<'a> RowMapper<'a> {
    pub fn new(fields: &'a [FieldMapping]) -> Self {
        Self { fields }
    }

    /// Map one row into a JSON record keyed by domain field names
    pub fn to_record(&self, row: &UpstreamRow) -> GatewayResult<Map<String, Value>> {
        let mut record = Map::with_capacity(self.fields.len());
        for mapping in self.fields {
            let Some(raw) = lookup(row, &mapping.column) else {
                continue;
            };
            let value = mapping
                .kind
                .coerce(raw)
                .map_err(|e| UpstreamError::InvalidResponse {
                    message: format!("column {}: {}", mapping.column, e),
                })?;
            if let Some(value) = value {
                record.insert(mapping.field.clone(), value.to_json());
            }
        }
        Ok(record)
    }

    /// Map one row into a typed record
    pub fn map<T: DeserializeOwned>(&self, row: &UpstreamRow) -> GatewayResult<T> {
        let record = self.to_record(row)?;
        serde_json::from_value(Value::Object(record)).map_err(|e| {
            UpstreamError::InvalidResponse {
                message: format!("row does not fit the record: {}", e),
            }
            .into()
        })
    }

    /// Reverse a record into the upstream row it was mapped from.
    ///
    /// Absent fields become `NULL` cells so the row carries every mapped
    /// column.
    pub fn to_row(&self, record: &Value) -> UpstreamRow {
        self.fields
            .iter()
            .map(|mapping| {
                let cell = record
                    .get(&mapping.field)
                    .map(|v| mapping.kind.to_upstream(v))
                    .unwrap_or(Value::Null);
                (mapping.column.clone(), cell)
            })
            .collect()
    }
}

/// Exact column first, then a padded or differently-cased spelling
fn lookup<'r>(row: &'r UpstreamRow, column: &str) -> Option<&'r Value> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}
