//! K-line normalization
//!
//! Turns raw Binance kline rows into a typed, time-indexed [`KlineFrame`].
//! Column names follow the Binance REST documentation order.
//!
//! Coercion is best-effort: a cell that cannot be read as a number (or as
//! an epoch-milliseconds time) becomes missing, the rest of the row is kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::binance::RawKline;
use crate::error::DataError;
use crate::frame::{Column, FrameIndex, KlineFrame};

// =============================================================================
// Column Schema
// =============================================================================

pub const TIME_COLUMN: &str = "Timestamp";
pub const CLOSE_COLUMN: &str = "Close";

/// Binance kline fields, in response order
pub const KLINE_COLUMN_NAMES: [&str; 12] = [
    "Timestamp",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "Close_time",
    "Quote_asset_volume",
    "Number_of_trades",
    "Taker_buy_base_asset_volume",
    "Taker_buy_quote_asset_volume",
    "Ignore",
];

/// Columns every normalized frame carries
pub const ESSENTIAL_COLUMNS: [&str; 6] = ["Timestamp", "Open", "High", "Low", "Close", "Volume"];

/// Which columns survive normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnSelection {
    /// `ESSENTIAL_COLUMNS` only
    #[default]
    Essential,
    /// Every column in the column list
    All,
}

/// Storage type of a column, decided by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Time,
    Float,
    Int,
    Text,
}

pub fn column_kind(name: &str) -> ColumnKind {
    match name {
        "Timestamp" | "Close_time" => ColumnKind::Time,
        "Open"
        | "High"
        | "Low"
        | "Close"
        | "Volume"
        | "Quote_asset_volume"
        | "Taker_buy_base_asset_volume"
        | "Taker_buy_quote_asset_volume" => ColumnKind::Float,
        "Number_of_trades" => ColumnKind::Int,
        _ => ColumnKind::Text,
    }
}

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    /// Name of each raw field, in row order
    pub column_names: Vec<String>,
    pub selection: ColumnSelection,
    /// Use `Timestamp` as the frame index instead of a row range
    pub index_by_time: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            column_names: KLINE_COLUMN_NAMES.iter().map(|s| s.to_string()).collect(),
            selection: ColumnSelection::Essential,
            index_by_time: true,
        }
    }
}

impl NormalizeOptions {
    pub fn with_column_names<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.column_names = names.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn with_selection(mut self, selection: ColumnSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_index_by_time(mut self, index_by_time: bool) -> Self {
        self.index_by_time = index_by_time;
        self
    }
}

// =============================================================================
// Cell Coercion
// =============================================================================

/// Read a cell as a float; non-numeric values and NaN become `None`
pub fn coerce_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| !v.is_nan())
}

/// Read a cell as an integer; fractional values become `None`
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// Read a cell as epoch milliseconds
pub fn coerce_millis(value: &Value) -> Option<DateTime<Utc>> {
    coerce_int(value).and_then(DateTime::from_timestamp_millis)
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn build_column(kind: ColumnKind, rows: &[RawKline], position: usize) -> Column {
    let cells = rows.iter().map(|row| &row[position]);
    match kind {
        ColumnKind::Time => Column::Time(cells.map(coerce_millis).collect()),
        ColumnKind::Float => Column::Float(cells.map(coerce_float).collect()),
        ColumnKind::Int => Column::Int(cells.map(coerce_int).collect()),
        ColumnKind::Text => Column::Text(cells.map(coerce_text).collect()),
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// Convert raw kline rows into a typed frame
///
/// 1. Checks the column list holds every essential column and each row has
///    one field per column name.
/// 2. Keeps the essential columns (or all of them).
/// 3. Coerces prices/volumes to floats and times to UTC date-times.
/// 4. Optionally makes `Timestamp` the index (must be strictly increasing).
///
/// Empty input yields an empty frame.
pub fn normalize_klines(
    rows: &[RawKline],
    options: &NormalizeOptions,
) -> Result<KlineFrame, DataError> {
    if rows.is_empty() {
        warn!("Klines data is empty. Returning an empty frame.");
        return Ok(KlineFrame::empty());
    }

    let names = &options.column_names;
    let position = |name: &str| names.iter().position(|n| n == name);

    if let Some(missing) = ESSENTIAL_COLUMNS.iter().find(|c| position(c).is_none()) {
        return Err(DataError::MissingColumn(missing.to_string()));
    }

    if let Some((row, raw)) = rows
        .iter()
        .enumerate()
        .find(|(_, raw)| raw.len() != names.len())
    {
        return Err(DataError::RowWidth {
            row,
            expected: names.len(),
            found: raw.len(),
        });
    }

    let selected: Vec<(&str, usize)> = match options.selection {
        ColumnSelection::Essential => ESSENTIAL_COLUMNS
            .iter()
            .filter_map(|name| position(name).map(|pos| (*name, pos)))
            .collect(),
        ColumnSelection::All => names
            .iter()
            .enumerate()
            .map(|(pos, name)| (name.as_str(), pos))
            .collect(),
    };

    let mut index = FrameIndex::Range(rows.len());
    let mut columns = Vec::with_capacity(selected.len());

    for (name, pos) in selected {
        if options.index_by_time && name == TIME_COLUMN {
            let values = rows
                .iter()
                .enumerate()
                .map(|(row, raw)| {
                    coerce_millis(&raw[pos]).ok_or(DataError::InvalidTimestamp { row })
                })
                .collect::<Result<Vec<_>, _>>()?;
            index = FrameIndex::Time {
                name: TIME_COLUMN.to_string(),
                values,
            };
            continue;
        }

        columns.push((name.to_string(), build_column(column_kind(name), rows, pos)));
    }

    let frame = KlineFrame::new(index, columns)?;

    info!(
        "Successfully processed {} k-lines{}.",
        frame.len(),
        if options.index_by_time {
            ". Frame is now indexed by Timestamp"
        } else {
            ""
        }
    );

    Ok(frame)
}

// =============================================================================
// Tests
// =============================================================================
