//! Sample metadata
//!
//! One row per sample, all cells as strings. Whatever column identifies
//! the samples is renamed to [`ID_COLUMN`] so the rest of the pipeline
//! and the browser UI can rely on a fixed key.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::{debug, warn};
use rayon::prelude::*;
use serde_json::{Map, Value};

use crate::matrix::{DistanceMatrix, join_neighbours};
use crate::table::{Table, TableError, read_table};

/// Canonical name of the sample ID column
pub const ID_COLUMN: &str = "ID";

/// Column added with each sample's nearest neighbours
pub const NEAREST_NEIGHBOUR_COLUMN: &str = "Nearest_neighbour";

/// Name given to a pre-existing `ID` column that is not the ID column
pub const DISPLACED_ID_COLUMN: &str = "other_id_x";

/// Separator between entries of a multi-valued cell in hover text
pub const CELL_LINE_BREAK: &str = "<br>";

/// Text used for empty cells
pub const MISSING_VALUE: &str = "nan";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    /// ID -> row index (first occurrence wins)
    index: HashMap<String, usize>,
}

/// Borrowed view of one metadata row
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [String],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i].as_str())
    }

    pub fn id(&self) -> &'a str {
        self.get(ID_COLUMN).unwrap_or_default()
    }

    /// `(column, value)` pairs in column order
    pub fn fields(self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }
}

impl Metadata {
    /// Build metadata from a parsed table.
    ///
    /// `id_column` picks the sample ID column when it exists in the table;
    /// otherwise the first column is used. A different column already
    /// called `ID` is renamed to [`DISPLACED_ID_COLUMN`].
    pub fn from_table(table: Table, id_column: Option<&str>) -> Result<Self, TableError> {
        let Table { mut headers, rows } = table;
        if headers.is_empty() {
            return Err(TableError::Empty);
        }

        let id_idx = id_column
            .and_then(|name| headers.iter().position(|h| h == name))
            .unwrap_or(0);

        if headers[0] != ID_COLUMN {
            if let Some(existing) = headers.iter().position(|h| h == ID_COLUMN) {
                if existing != id_idx {
                    headers[existing] = DISPLACED_ID_COLUMN.to_string();
                }
            }
        }
        headers[id_idx] = ID_COLUMN.to_string();

        let mut seen = HashSet::new();
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(TableError::DuplicateColumn(header.clone()));
            }
        }

        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        let cell = cell.trim();
                        if cell.is_empty() {
                            MISSING_VALUE.to_string()
                        } else {
                            cell.to_string()
                        }
                    })
                    .collect()
            })
            .collect();

        let mut metadata = Self {
            columns: headers,
            rows,
            index: HashMap::new(),
        };
        metadata.rebuild_index(id_idx);
        Ok(metadata)
    }

    fn rebuild_index(&mut self, id_idx: usize) {
        self.index.clear();
        for (i, row) in self.rows.iter().enumerate() {
            let id = &row[id_idx];
            if self.index.contains_key(id) {
                warn!("Duplicate sample ID '{}' in metadata; using first occurrence", id);
                continue;
            }
            self.index.insert(id.clone(), i);
        }
    }

    fn id_index(&self) -> usize {
        self.columns
            .iter()
            .position(|c| c == ID_COLUMN)
            .unwrap_or(0)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Sample IDs in row order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        let id_idx = self.id_index();
        self.rows.iter().map(move |row| row[id_idx].as_str())
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|row| Record {
            columns: &self.columns,
            values: row,
        })
    }

    pub fn get(&self, id: &str) -> Option<Record<'_>> {
        self.index.get(id).map(|&i| Record {
            columns: &self.columns,
            values: &self.rows[i],
        })
    }

    /// All values of one column, in row order
    pub fn column_values(&self, column: &str) -> Option<Vec<&str>> {
        let idx = self.columns.iter().position(|c| c == column)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// Number of distinct values in a column
    pub fn distinct_count(&self, column: &str) -> usize {
        self.column_values(column)
            .map(|values| values.into_iter().collect::<HashSet<_>>().len())
            .unwrap_or(0)
    }

    /// Keep only rows whose ID passes `keep`; returns the dropped IDs
    pub fn retain_ids(&mut self, mut keep: impl FnMut(&str) -> bool) -> Vec<String> {
        let id_idx = self.id_index();
        let mut dropped = Vec::new();
        self.rows.retain(|row| {
            let id = &row[id_idx];
            if keep(id) {
                true
            } else {
                dropped.push(id.clone());
                false
            }
        });
        self.rebuild_index(id_idx);
        dropped
    }

    /// Append a column; `values` must have one entry per row
    pub fn push_column(&mut self, name: &str, values: Vec<String>) {
        debug_assert_eq!(values.len(), self.rows.len());
        if let Some(idx) = self.columns.iter().position(|c| c == name) {
            for (row, value) in self.rows.iter_mut().zip(values) {
                row[idx] = value;
            }
            return;
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    /// Add the [`NEAREST_NEIGHBOUR_COLUMN`], one matrix scan per sample.
    ///
    /// Values are `id=distance` entries joined with `<br>`; samples
    /// missing from the matrix get an empty cell.
    pub fn add_nearest_neighbours(&mut self, matrix: &DistanceMatrix) {
        let ids: Vec<&str> = self.ids().collect();
        let values: Vec<String> = ids
            .par_iter()
            .map(|id| join_neighbours(&matrix.nearest_neighbours(id), CELL_LINE_BREAK))
            .collect();
        debug!("Computed nearest neighbours for {} samples", values.len());
        self.push_column(NEAREST_NEIGHBOUR_COLUMN, values);
    }

    /// Metadata as a JSON object keyed by sample ID.
    ///
    /// The nearest neighbour cell is split back into a list so the browser
    /// can iterate it without re-parsing.
    pub fn to_json_by_id(&self) -> Value {
        let mut by_id = Map::new();
        for record in self.records() {
            if by_id.contains_key(record.id()) {
                continue;
            }
            let mut object = Map::new();
            for (column, value) in record.fields() {
                let json_value = if column == NEAREST_NEIGHBOUR_COLUMN {
                    Value::Array(
                        value
                            .split(CELL_LINE_BREAK)
                            .filter(|s| !s.is_empty())
                            .map(|s| Value::String(s.to_string()))
                            .collect(),
                    )
                } else {
                    Value::String(value.to_string())
                };
                object.insert(column.to_string(), json_value);
            }
            by_id.insert(record.id().to_string(), Value::Object(object));
        }
        Value::Object(by_id)
    }
}

/// Read a metadata table from disk
pub fn read_metadata(path: &Path, id_column: Option<&str>) -> Result<Metadata, TableError> {
    Metadata::from_table(read_table(path)?, id_column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_table;

    fn sample_metadata() -> Metadata {
        let text = "sample,name,date,ID\nA,Ashley,2024-01-01,x1\nB,Barbara,,x2\nO,Otto,2024-01-05,x3\n";
        Metadata::from_table(parse_table(text).unwrap(), None).unwrap()
    }

    #[test]
    fn test_first_column_becomes_id() {
        let metadata = sample_metadata();
        assert_eq!(metadata.columns(), ["ID", "name", "date", "other_id_x"]);
        assert_eq!(metadata.ids().collect::<Vec<_>>(), ["A", "B", "O"]);
    }

    #[test]
    fn test_named_id_column() {
        let table = parse_table("row,ID_col,name\n1,A,Ashley\n2,B,Barbara\n").unwrap();
        let metadata = Metadata::from_table(table, Some("ID_col")).unwrap();
        assert_eq!(metadata.columns(), ["row", "ID", "name"]);
        assert_eq!(metadata.get("B").unwrap().get("name"), Some("Barbara"));
    }

    #[test]
    fn test_unknown_id_column_falls_back_to_first() {
        let table = parse_table("ID_col,name\nA,Ashley\n").unwrap();
        let metadata = Metadata::from_table(table, Some("id_col")).unwrap();
        assert_eq!(metadata.columns()[0], "ID");
        assert!(metadata.contains("A"));
    }

    #[test]
    fn test_empty_cells_become_nan() {
        let metadata = sample_metadata();
        assert_eq!(metadata.get("B").unwrap().get("date"), Some("nan"));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let table = parse_table("ID,a,a\n1,2,3\n").unwrap();
        assert!(matches!(
            Metadata::from_table(table, None),
            Err(TableError::DuplicateColumn(c)) if c == "a"
        ));
    }

    #[test]
    fn test_retain_ids() {
        let mut metadata = sample_metadata();
        let dropped = metadata.retain_ids(|id| id != "O");
        assert_eq!(dropped, ["O"]);
        assert_eq!(metadata.len(), 2);
        assert!(!metadata.contains("O"));
        assert!(metadata.contains("B"));
    }

    #[test]
    fn test_distinct_count() {
        let metadata = sample_metadata();
        assert_eq!(metadata.distinct_count("name"), 3);
        assert_eq!(metadata.distinct_count("missing"), 0);
    }

    #[test]
    fn test_add_nearest_neighbours_and_json() {
        let mut metadata = sample_metadata();
        let matrix = DistanceMatrix::from_table(
            parse_table("\tA\tB\tO\nA\t0\t3\t3\nB\t3\t0\t5\nO\t3\t5\t0\n").unwrap(),
        )
        .unwrap();
        metadata.add_nearest_neighbours(&matrix);

        let record = metadata.get("A").unwrap();
        assert_eq!(record.get(NEAREST_NEIGHBOUR_COLUMN), Some("B=3<br>O=3"));

        let json = metadata.to_json_by_id();
        assert_eq!(json["A"]["name"], "Ashley");
        assert_eq!(json["A"]["Nearest_neighbour"], serde_json::json!(["B=3", "O=3"]));
        assert_eq!(json["B"]["Nearest_neighbour"], serde_json::json!(["A=3"]));

        let keys: Vec<&String> = json["A"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["ID", "name", "date", "other_id_x", "Nearest_neighbour"]);
    }
}
