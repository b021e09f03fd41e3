//! Matrix materializer
//!
//! Reads stored labels back as a candidates × keys sparse matrix. Rows follow
//! the caller's candidate order, columns the key names in lexical order. Pairs
//! with no stored label read as 0 (abstain), and explicit zero codes are not
//! kept as entries either.

use crate::keys::list_keys;
use crate::store::{AnnotationKind, ID_CHUNK};
use lfmat_common::{Candidate, Error, Result};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;

/// Compressed sparse row matrix of label codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SparseMatrix {
    rows: usize,
    cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<i32>,
}

impl SparseMatrix {
    /// All-abstain matrix of the given shape
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            indptr: vec![0; rows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Build from `(row, col, value)` triplets
    ///
    /// When a cell appears more than once the last triplet wins. Zero values are
    /// dropped.
    pub fn from_triplets(
        rows: usize,
        cols: usize,
        mut triplets: Vec<(usize, usize, i32)>,
    ) -> Result<Self> {
        if let Some(&(row, col, _)) = triplets.iter().find(|&&(r, c, _)| r >= rows || c >= cols) {
            return Err(Error::InvalidInput(format!(
                "entry ({}, {}) outside matrix of shape ({}, {})",
                row, col, rows, cols
            )));
        }

        // Stable sort keeps insertion order within a cell
        triplets.sort_by_key(|&(row, col, _)| (row, col));

        let mut indptr = vec![0usize; rows + 1];
        let mut indices = Vec::with_capacity(triplets.len());
        let mut data = Vec::with_capacity(triplets.len());

        let mut i = 0;
        while i < triplets.len() {
            let (row, col, _) = triplets[i];
            let mut last = i;
            while last + 1 < triplets.len()
                && triplets[last + 1].0 == row
                && triplets[last + 1].1 == col
            {
                last += 1;
            }

            let value = triplets[last].2;
            if value != 0 {
                indices.push(col);
                data.push(value);
                indptr[row + 1] += 1;
            }
            i = last + 1;
        }

        for row in 0..rows {
            indptr[row + 1] += indptr[row];
        }

        Ok(Self {
            rows,
            cols,
            indptr,
            indices,
            data,
        })
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of stored (non-abstain) entries
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Code at `(row, col)`, `None` when out of bounds
    pub fn get(&self, row: usize, col: usize) -> Option<i32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }

        let (start, end) = (self.indptr[row], self.indptr[row + 1]);
        match self.indices[start..end].binary_search(&col) {
            Ok(pos) => Some(self.data[start + pos]),
            Err(_) => Some(0),
        }
    }

    /// Stored `(col, value)` entries of one row
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, i32)> + '_ {
        let range = if row < self.rows {
            self.indptr[row]..self.indptr[row + 1]
        } else {
            0..0
        };
        range.map(move |i| (self.indices[i], self.data[i]))
    }

    /// Stored `(row, col, value)` entries in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, i32)> + '_ {
        (0..self.rows).flat_map(move |row| self.row(row).map(move |(col, value)| (row, col, value)))
    }

    pub fn to_dense(&self) -> Vec<Vec<i32>> {
        let mut dense = vec![vec![0; self.cols]; self.rows];
        for (row, col, value) in self.iter() {
            dense[row][col] = value;
        }
        dense
    }
}

/// A materialized matrix together with its row and column labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelMatrix {
    /// Row `i` holds the labels of `candidate_ids[i]`
    pub candidate_ids: Vec<i64>,
    /// Column `j` holds the labels of key `keys[j]`
    pub keys: Vec<String>,
    pub matrix: SparseMatrix,
}

impl LabelMatrix {
    pub fn shape(&self) -> (usize, usize) {
        self.matrix.shape()
    }

    /// Column index of a key
    pub fn column(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Code of one (candidate row, key) cell
    pub fn value(&self, row: usize, key: &str) -> Option<i32> {
        self.column(key).and_then(|col| self.matrix.get(row, col))
    }
}

/// Materialize one matrix per candidate list
///
/// Columns are every registered key of `kind`, or only `key` when given (the
/// named key becomes the single column whether or not it is registered).
pub async fn materialize_all(
    pool: &SqlitePool,
    kind: AnnotationKind,
    cand_lists: &[Vec<Candidate>],
    key: Option<&str>,
) -> Result<Vec<LabelMatrix>> {
    let keys = match key {
        Some(name) => vec![name.to_string()],
        None => list_keys(pool, kind).await?,
    };

    let mut matrices = Vec::with_capacity(cand_lists.len());
    for candidates in cand_lists {
        matrices.push(materialize(pool, kind, candidates, &keys).await?);
    }

    Ok(matrices)
}

/// Materialize the matrix of `candidates` against the given key columns
pub async fn materialize(
    pool: &SqlitePool,
    kind: AnnotationKind,
    candidates: &[Candidate],
    keys: &[String],
) -> Result<LabelMatrix> {
    let candidate_ids: Vec<i64> = candidates.iter().map(|c| c.id).collect();

    let key_index: HashMap<&str, usize> = keys
        .iter()
        .enumerate()
        .map(|(col, name)| (name.as_str(), col))
        .collect();

    // A candidate listed twice gets two identical rows
    let mut rows_by_candidate: HashMap<i64, Vec<usize>> = HashMap::new();
    for (row, id) in candidate_ids.iter().enumerate() {
        rows_by_candidate.entry(*id).or_default().push(row);
    }

    let mut triplets = Vec::new();
    if !keys.is_empty() {
        let mut unique_ids: Vec<i64> = rows_by_candidate.keys().copied().collect();
        unique_ids.sort_unstable();

        for chunk in unique_ids.chunks(ID_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT candidate_id, key_name, value FROM {} WHERE candidate_id IN (",
                kind.label_table()
            ));
            let mut separated = qb.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            let rows: Vec<(i64, String, i32)> = qb.build_query_as().fetch_all(pool).await?;

            for (candidate_id, key_name, value) in rows {
                let (Some(&col), Some(candidate_rows)) =
                    (key_index.get(key_name.as_str()), rows_by_candidate.get(&candidate_id))
                else {
                    continue;
                };
                for &row in candidate_rows {
                    triplets.push((row, col, value));
                }
            }
        }
    }

    let matrix = if triplets.is_empty() {
        SparseMatrix::zeros(candidate_ids.len(), keys.len())
    } else {
        SparseMatrix::from_triplets(candidate_ids.len(), keys.len(), triplets)?
    };

    tracing::debug!(
        kind = ?kind,
        rows = candidate_ids.len(),
        cols = keys.len(),
        nnz = matrix.nnz(),
        "Materialized label matrix"
    );

    Ok(LabelMatrix {
        candidate_ids,
        keys: keys.to_vec(),
        matrix,
    })
}
