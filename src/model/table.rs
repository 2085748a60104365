//! Tabular stage outputs exchanged with the workflow service
//!
//! The workflow stages produce heterogeneous tables: a fixed set of named
//! columns plus, for the scoring stage, one dynamically-named column per risk
//! factor. Rather than addressing cells through untyped JSON maps, the table
//! boundary is explicit here: lookups fail fast naming the missing column.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single table cell
///
/// Scores that could not be computed upstream arrive as `Null` (NaN does not
/// survive JSON transport); in-process constructed tables may also carry a
/// literal NaN. Both are treated as "not a number".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Number(f64),
    Text(String),
    TextList(Vec<String>),
}

impl CellValue {
    /// True for cells that must be dropped from numeric score mappings
    pub fn is_nan(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Number(n) => n.is_nan(),
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<Vec<String>> for CellValue {
    fn from(value: Vec<String>) -> Self {
        CellValue::TextList(value)
    }
}

/// One table row: an ordered mapping of column name to cell
///
/// Column order is preserved so that "every column not consumed by a fixed
/// field" remains a well-defined set after the fixed fields are taken out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.cells.push((column.into(), value.into()));
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Remove and return a cell by column name
    pub fn take(&mut self, column: &str) -> Option<CellValue> {
        let index = self.cells.iter().position(|(name, _)| name == column)?;
        Some(self.cells.remove(index).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Consume the row, yielding the remaining cells in column order
    pub fn into_cells(self) -> Vec<(String, CellValue)> {
        self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<CellValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row {
            cells: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// Rows travel on the wire as plain JSON objects, one key per column.
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to cell values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
                let mut cells = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, CellValue>()? {
                    cells.push(entry);
                }
                Ok(Row { cells })
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// A stage output table: rows in source order, encoded as a JSON array of
/// record objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataTable {
    pub rows: Vec<Row>,
}

impl DataTable {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        Row::from_iter([
            ("Company", CellValue::from("A")),
            ("Composite Score", CellValue::from(55i64)),
            ("Risk1", CellValue::Number(f64::NAN)),
        ])
    }

    #[test]
    fn test_take_removes_cell() {
        let mut row = sample_row();
        assert_eq!(row.take("Company"), Some(CellValue::Text("A".to_string())));
        assert_eq!(row.take("Company"), None);
        assert_eq!(row.columns().count(), 2);
    }

    #[test]
    fn test_nan_detection() {
        let row = sample_row();
        assert!(row.get("Risk1").unwrap().is_nan());
        assert!(!row.get("Composite Score").unwrap().is_nan());
        assert!(CellValue::Null.is_nan());
    }

    #[test]
    fn test_row_roundtrip_preserves_order() {
        let table = DataTable::new(vec![Row::from_iter([
            ("Company", CellValue::from("A")),
            ("Ticker", CellValue::from("T1")),
            ("Highlights", CellValue::from(vec!["h".to_string()])),
        ])]);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"[{"Company":"A","Ticker":"T1","Highlights":["h"]}]"#);

        let parsed: DataTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_nan_serializes_to_null() {
        let table = DataTable::new(vec![Row::from_iter([(
            "Risk1",
            CellValue::Number(f64::NAN),
        )])]);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"[{"Risk1":null}]"#);

        let parsed: DataTable = serde_json::from_str(&json).unwrap();
        assert!(parsed.rows[0].get("Risk1").unwrap().is_nan());
    }
}
