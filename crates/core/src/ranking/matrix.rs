//! Criterion matrix and the min/max normalization shared by the weight
//! estimator and the scorer.

use serde::{Deserialize, Serialize};

use crate::errors::RankingError;

/// Optimization direction of one criterion column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Larger values are better.
    Max,
    /// Smaller values are better.
    Min,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Min => "min",
        }
    }

    /// Parses the wire spelling. Only the exact lowercase words are accepted.
    pub fn parse(value: &str) -> Result<Self, RankingError> {
        match value {
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            other => Err(RankingError::InvalidMode(other.to_string())),
        }
    }
}

pub fn parse_modes<S: AsRef<str>>(values: &[S]) -> Result<Vec<Mode>, RankingError> {
    values.iter().map(|value| Mode::parse(value.as_ref())).collect()
}

/// Rows are alternatives, columns are criteria. Values are stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct CriterionMatrix {
    rows: usize,
    columns: usize,
    values: Vec<f64>,
}

impl CriterionMatrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, RankingError> {
        let columns = rows.first().map(Vec::len).unwrap_or(0);
        if rows.is_empty() || columns == 0 {
            return Err(RankingError::EmptyMatrix);
        }

        let mut values = Vec::with_capacity(rows.len() * columns);
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != columns {
                return Err(RankingError::RaggedMatrix {
                    row: row_index,
                    expected: columns,
                    actual: row.len(),
                });
            }
            if let Some(column) = row.iter().position(|value| !value.is_finite()) {
                return Err(RankingError::NonFinite { row: row_index, column });
            }
            values.extend_from_slice(row);
        }

        Ok(Self { rows: rows.len(), columns, values })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.values[row * self.columns + column]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.columns..(row + 1) * self.columns]
    }

    pub fn column(&self, column: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.rows).map(move |row| self.get(row, column))
    }

    pub(crate) fn check_modes(&self, modes: &[Mode]) -> Result<(), RankingError> {
        if modes.len() != self.columns {
            return Err(RankingError::ShapeMismatch {
                what: "mode vector",
                expected: self.columns,
                actual: modes.len(),
            });
        }
        Ok(())
    }
}

/// Per-column distance from the ideal point: 0 at the ideal, 1 at the
/// anti-ideal. Constant columns are all zero.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviationMatrix {
    columns: usize,
    values: Vec<f64>,
}

impl DeviationMatrix {
    pub fn rows(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.values.len() / self.columns
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.values[row * self.columns + column]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.columns..(row + 1) * self.columns]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ColumnRange {
    min: f64,
    max: f64,
}

impl ColumnRange {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        values.fold(Self { min: f64::INFINITY, max: f64::NEG_INFINITY }, |range, value| Self {
            min: range.min.min(value),
            max: range.max.max(value),
        })
    }

    fn span(&self) -> f64 {
        self.max - self.min
    }
}

pub fn deviation_matrix(
    matrix: &CriterionMatrix,
    modes: &[Mode],
) -> Result<DeviationMatrix, RankingError> {
    matrix.check_modes(modes)?;
    Ok(DeviationMatrix { columns: matrix.columns(), values: oriented_values(matrix, modes, true) })
}

/// Column-major benefit-oriented values (1 at the ideal, 0 at the anti-ideal),
/// constant columns all zero. Callers must have checked the mode vector.
pub(crate) fn benefit_columns(matrix: &CriterionMatrix, modes: &[Mode]) -> Vec<Vec<f64>> {
    let values = oriented_values(matrix, modes, false);
    (0..matrix.columns())
        .map(|column| {
            (0..matrix.rows()).map(|row| values[row * matrix.columns() + column]).collect()
        })
        .collect()
}

fn oriented_values(matrix: &CriterionMatrix, modes: &[Mode], deviation: bool) -> Vec<f64> {
    let ranges: Vec<ColumnRange> =
        (0..matrix.columns()).map(|column| ColumnRange::of(matrix.column(column))).collect();

    let mut values = vec![0.0; matrix.rows() * matrix.columns()];
    for row in 0..matrix.rows() {
        for (column, (range, mode)) in ranges.iter().zip(modes).enumerate() {
            let span = range.span();
            if span == 0.0 {
                continue;
            }
            let value = matrix.get(row, column);
            let distance_from_ideal = match mode {
                Mode::Max => (range.max - value) / span,
                Mode::Min => (value - range.min) / span,
            };
            let oriented = if deviation { distance_from_ideal } else { 1.0 - distance_from_ideal };
            values[row * matrix.columns() + column] = oriented.clamp(0.0, 1.0);
        }
    }
    values
}
