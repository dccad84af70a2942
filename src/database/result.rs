//! Query result types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Bounded result of one query.
///
/// `rows` never holds more than `row_limit` entries. `truncated` is set only when the engine
/// had at least one more row to give.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub truncated: bool,
    pub row_limit: u32,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Cell value that can hold different SQL types.
///
/// Serializes untagged so a row is a plain JSON array; engine NULL is JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    DateTime(DateTime<Utc>),
    Bytes(Vec<u8>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cells_serialize_as_plain_scalars() {
        let row = vec![
            CellValue::Null,
            CellValue::Bool(true),
            CellValue::Int(42),
            CellValue::Float(1.5),
            CellValue::String("Ada".into()),
        ];

        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!([null, true, 42, 1.5, "Ada"])
        );
    }

    #[test]
    fn test_result_serialization() {
        let result = QueryResult {
            columns: vec!["Value".into(), "Name".into()],
            rows: vec![vec![CellValue::Int(1), CellValue::Null]],
            truncated: false,
            row_limit: 100,
        };

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "columns": ["Value", "Name"],
                "rows": [[1, null]],
                "truncated": false,
                "row_limit": 100
            })
        );
    }
}
