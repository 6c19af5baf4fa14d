//! Time-indexed k-line table
//!
//! A small column store: an index (time or plain row numbers) plus ordered,
//! typed columns of equal length. Missing cells are `None`.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::error::DataError;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Typed column values
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Time(Vec<Option<DateTime<Utc>>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Time(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            Column::Float(_) => "float64",
            Column::Int(_) => "int64",
            Column::Time(_) => "datetime",
            Column::Text(_) => "text",
        }
    }

    pub fn non_null_count(&self) -> usize {
        match self {
            Column::Float(v) => v.iter().flatten().count(),
            Column::Int(v) => v.iter().flatten().count(),
            Column::Time(v) => v.iter().flatten().count(),
            Column::Text(v) => v.iter().flatten().count(),
        }
    }

    pub fn as_floats(&self) -> Option<&[Option<f64>]> {
        match self {
            Column::Float(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Cell rendered for output; `None` when missing
    fn cell(&self, row: usize) -> Option<String> {
        match self {
            Column::Float(v) => v[row].map(|x| x.to_string()),
            Column::Int(v) => v[row].map(|x| x.to_string()),
            Column::Time(v) => v[row].map(|t| t.format(TIME_FORMAT).to_string()),
            Column::Text(v) => v[row].clone(),
        }
    }

    fn slice(&self, len: usize) -> Column {
        match self {
            Column::Float(v) => Column::Float(v[..len].to_vec()),
            Column::Int(v) => Column::Int(v[..len].to_vec()),
            Column::Time(v) => Column::Time(v[..len].to_vec()),
            Column::Text(v) => Column::Text(v[..len].to_vec()),
        }
    }
}

/// Row labels of a frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameIndex {
    /// Plain row numbers `0..len`
    Range(usize),
    /// Strictly increasing timestamps
    Time {
        name: String,
        values: Vec<DateTime<Utc>>,
    },
}

impl FrameIndex {
    pub fn len(&self) -> usize {
        match self {
            FrameIndex::Range(len) => *len,
            FrameIndex::Time { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn name(&self) -> &str {
        match self {
            FrameIndex::Range(_) => "",
            FrameIndex::Time { name, .. } => name,
        }
    }

    fn label(&self, row: usize) -> String {
        match self {
            FrameIndex::Range(_) => row.to_string(),
            FrameIndex::Time { values, .. } => values[row].format(TIME_FORMAT).to_string(),
        }
    }

    fn slice(&self, len: usize) -> FrameIndex {
        match self {
            FrameIndex::Range(_) => FrameIndex::Range(len),
            FrameIndex::Time { name, values } => FrameIndex::Time {
                name: name.clone(),
                values: values[..len].to_vec(),
            },
        }
    }
}

/// Normalized k-line table
#[derive(Debug, Clone, PartialEq)]
pub struct KlineFrame {
    index: FrameIndex,
    columns: Vec<(String, Column)>,
}

impl KlineFrame {
    /// A frame with no rows and no columns
    pub fn empty() -> Self {
        Self {
            index: FrameIndex::Range(0),
            columns: Vec::new(),
        }
    }

    /// Build a frame, checking every column matches the index length
    pub fn new(index: FrameIndex, columns: Vec<(String, Column)>) -> Result<Self, DataError> {
        let expected = index.len();
        for (name, column) in &columns {
            if column.len() != expected {
                return Err(DataError::LengthMismatch {
                    name: name.clone(),
                    expected,
                    found: column.len(),
                });
            }
        }

        if let FrameIndex::Time { values, .. } = &index {
            if let Some(row) = (1..values.len()).find(|&i| values[i] <= values[i - 1]) {
                return Err(DataError::UnorderedIndex { row });
            }
        }

        Ok(Self { index, columns })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self) -> &FrameIndex {
        &self.index
    }

    /// Index timestamps when the frame is time-indexed
    pub fn timestamps(&self) -> Option<&[DateTime<Utc>]> {
        match &self.index {
            FrameIndex::Time { values, .. } => Some(values.as_slice()),
            FrameIndex::Range(_) => None,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, column)| column)
    }

    /// Values of a float column
    pub fn floats(&self, name: &str) -> Option<&[Option<f64>]> {
        self.column(name).and_then(Column::as_floats)
    }

    /// Insert a float column, replacing any column with the same name in place
    pub fn set_float_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<(), DataError> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(DataError::LengthMismatch {
                name,
                expected: self.len(),
                found: values.len(),
            });
        }

        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, column)) => *column = Column::Float(values),
            None => self.columns.push((name, Column::Float(values))),
        }
        Ok(())
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> KlineFrame {
        let len = n.min(self.len());
        KlineFrame {
            index: self.index.slice(len),
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.slice(len)))
                .collect(),
        }
    }

    /// Column listing with types and non-null counts
    pub fn summary(&self) -> String {
        let mut out = String::new();
        match &self.index {
            FrameIndex::Time { name, values } => {
                let range = match (values.first(), values.last()) {
                    (Some(first), Some(last)) => format!(
                        ": {} to {}",
                        first.format(TIME_FORMAT),
                        last.format(TIME_FORMAT)
                    ),
                    _ => String::new(),
                };
                out.push_str(&format!(
                    "Time index '{}', {} entries{}\n",
                    name,
                    values.len(),
                    range
                ));
            }
            FrameIndex::Range(len) => {
                out.push_str(&format!("Range index, {} entries\n", len));
            }
        }

        out.push_str(&format!("Data columns (total {} columns):\n", self.columns.len()));
        for (i, (name, column)) in self.columns.iter().enumerate() {
            out.push_str(&format!(
                " {:>2}  {:<30} {:>6} non-null  {}\n",
                i,
                name,
                column.non_null_count(),
                column.dtype()
            ));
        }
        out
    }

    fn header(&self) -> Vec<String> {
        std::iter::once(self.index.name().to_string())
            .chain(self.columns.iter().map(|(name, _)| name.clone()))
            .collect()
    }

    fn row_cells(&self, row: usize, missing: &str) -> Vec<String> {
        std::iter::once(self.index.label(row))
            .chain(
                self.columns
                    .iter()
                    .map(|(_, column)| column.cell(row).unwrap_or_else(|| missing.to_string())),
            )
            .collect()
    }

    /// Write as CSV: index first, missing cells left empty
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DataError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.header())?;
        for row in 0..self.len() {
            csv_writer.write_record(self.row_cells(row, ""))?;
        }
        csv_writer
            .flush()
            .map_err(|e| DataError::Csv(e.to_string()))?;
        Ok(())
    }

    /// Save as a CSV file
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let file = std::fs::File::create(path.as_ref())
            .map_err(|e| DataError::Csv(format!("{}: {}", path.as_ref().display(), e)))?;
        self.write_csv(file)
    }
}

impl fmt::Display for KlineFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() && self.is_empty() {
            return write!(f, "Empty KlineFrame");
        }

        let header = self.header();
        let rows: Vec<Vec<String>> = (0..self.len())
            .map(|row| self.row_cells(row, "NaN"))
            .collect();

        let widths: Vec<usize> = (0..header.len())
            .map(|col| {
                rows.iter()
                    .map(|r| r[col].len())
                    .chain(std::iter::once(header[col].len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let render = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:>width$}", cell, width = width))
                .join("  ")
        };

        writeln!(f, "{}", render(header.as_slice()))?;
        for row in &rows {
            writeln!(f, "{}", render(row.as_slice()))?;
        }
        write!(f, "[{} rows x {} columns]", self.len(), self.columns.len())
    }
}
