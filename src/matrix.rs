//! Pairwise SNP distance matrix
//!
//! Square matrix of SNP counts between samples, as written by tools such
//! as snp-dists. The row labels and the header must list the samples in
//! the same order, so the index is stored once.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use log::warn;
use serde::Serialize;
use thiserror::Error;

use crate::table::{Table, TableError, read_table};

/// Errors that can occur when loading a distance matrix
#[derive(Error, Debug)]
pub enum MatrixError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Matrix is not square: {rows} rows but {columns} columns")]
    NotSquare { rows: usize, columns: usize },

    #[error("Column order does not match row order (row {position}: '{row}' vs column '{column}')")]
    OrderMismatch {
        position: usize,
        row: String,
        column: String,
    },

    #[error("Sample '{0}' occurs more than once in the matrix")]
    DuplicateId(String),

    #[error("Invalid distance '{value}' for {row} vs {column}")]
    InvalidDistance {
        row: String,
        column: String,
        value: String,
    },
}

/// A sample and its distance from the query sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Neighbour {
    pub id: String,
    pub distance: u64,
}

impl fmt::Display for Neighbour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.id, self.distance)
    }
}

/// Format neighbours as `id=distance` entries joined by `separator`
pub fn join_neighbours(neighbours: &[Neighbour], separator: &str) -> String {
    neighbours
        .iter()
        .map(Neighbour::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMatrix {
    index: Vec<String>,
    positions: HashMap<String, usize>,
    data: Vec<Vec<u64>>,
}

/// JSON shape consumed by the report: the shared index plus row data
#[derive(Serialize)]
struct SplitMatrix<'a> {
    index: &'a [String],
    data: &'a [Vec<u64>],
}

impl DistanceMatrix {
    /// Build from a table whose first column holds the row labels.
    /// The header's first cell is ignored.
    pub fn from_table(table: Table) -> Result<Self, MatrixError> {
        let columns: Vec<String> = table.headers.into_iter().skip(1).collect();
        let rows = table.rows;

        if rows.len() != columns.len() {
            return Err(MatrixError::NotSquare {
                rows: rows.len(),
                columns: columns.len(),
            });
        }

        let mut index = Vec::with_capacity(rows.len());
        let mut positions = HashMap::with_capacity(rows.len());
        let mut data = Vec::with_capacity(rows.len());

        for (position, mut row) in rows.into_iter().enumerate() {
            let id = row.remove(0).trim().to_string();
            if id != columns[position] {
                return Err(MatrixError::OrderMismatch {
                    position,
                    row: id,
                    column: columns[position].clone(),
                });
            }
            if positions.insert(id.clone(), position).is_some() {
                return Err(MatrixError::DuplicateId(id));
            }

            let values = row
                .iter()
                .zip(&columns)
                .map(|(cell, column)| {
                    parse_distance(cell).ok_or_else(|| MatrixError::InvalidDistance {
                        row: id.clone(),
                        column: column.clone(),
                        value: cell.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            index.push(id);
            data.push(values);
        }

        Ok(Self {
            index,
            positions,
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Sample IDs in matrix order
    pub fn ids(&self) -> &[String] {
        &self.index
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Distance between two samples, `None` if either is unknown
    pub fn distance(&self, a: &str, b: &str) -> Option<u64> {
        let i = *self.positions.get(a)?;
        let j = *self.positions.get(b)?;
        Some(self.data[i][j])
    }

    /// All samples at the minimum distance from `id`, in matrix order.
    ///
    /// The sample itself is never its own neighbour. Unknown samples have
    /// no neighbours.
    pub fn nearest_neighbours(&self, id: &str) -> Vec<Neighbour> {
        let Some(&row) = self.positions.get(id) else {
            warn!("Sample '{}' not found in distance matrix", id);
            return Vec::new();
        };

        let others = || {
            self.data[row]
                .iter()
                .enumerate()
                .filter(move |&(j, _)| j != row)
        };
        let Some(min) = others().map(|(_, &d)| d).min() else {
            return Vec::new();
        };

        others()
            .filter(|&(_, &d)| d == min)
            .map(|(j, &d)| Neighbour {
                id: self.index[j].clone(),
                distance: d,
            })
            .collect()
    }

    /// All samples within `max_distance` of `id` (inclusive), closest first.
    /// Samples at equal distance keep matrix order.
    pub fn neighbours_within(&self, id: &str, max_distance: u64) -> Vec<Neighbour> {
        let Some(&row) = self.positions.get(id) else {
            warn!("Sample '{}' not found in distance matrix", id);
            return Vec::new();
        };

        let mut neighbours: Vec<Neighbour> = self.data[row]
            .iter()
            .enumerate()
            .filter(|&(j, &d)| j != row && d <= max_distance)
            .map(|(j, &d)| Neighbour {
                id: self.index[j].clone(),
                distance: d,
            })
            .collect();
        neighbours.sort_by_key(|n| n.distance);
        neighbours
    }

    /// `{"index": [...], "data": [[...], ...]}`
    pub fn to_split_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(SplitMatrix {
            index: &self.index,
            data: &self.data,
        })
    }
}

fn parse_distance(cell: &str) -> Option<u64> {
    let cell = cell.trim();
    if let Ok(value) = cell.parse::<u64>() {
        return Some(value);
    }
    // Some tools write integral distances as floats
    let value = cell.parse::<f64>().ok()?;
    (value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64).then_some(value as u64)
}

/// Read a distance matrix from disk, sniffing the delimiter
pub fn read_distance_matrix(path: &Path) -> Result<DistanceMatrix, MatrixError> {
    DistanceMatrix::from_table(read_table(path)?)
}
