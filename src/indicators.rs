//! Technical indicators
//!
//! SMA, EMA and RSI over a column of optional prices, plus the annotator that
//! appends `{NAME}_{length}` columns to a [`KlineFrame`].
//!
//! Missing inputs never poison later values: SMA skips windows that contain
//! a gap, EMA and RSI emit `None` for the gap and continue from their last
//! state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::data::CLOSE_COLUMN;
use crate::error::IndicatorError;
use crate::frame::KlineFrame;

pub const DEFAULT_LENGTH: usize = 14;

/// Indicators computed when none are configured
pub const DEFAULT_INDICATORS: [IndicatorKind; 3] =
    [IndicatorKind::Sma, IndicatorKind::Ema, IndicatorKind::Rsi];

// =============================================================================
// Series Functions
// =============================================================================

/// Simple Moving Average
///
/// `None` until a full window is available, and for any window holding a
/// missing value.
pub fn sma(values: &[Option<f64>], length: usize) -> Vec<Option<f64>> {
    if length == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < length {
                return None;
            }
            let window = &values[i + 1 - length..=i];
            let sum = window.iter().copied().sum::<Option<f64>>()?;
            Some(sum / length as f64)
        })
        .collect()
}

/// Exponential Moving Average
///
/// Seeded with the SMA of the first complete window, then
/// `prev + k * (x - prev)` with `k = 2 / (length + 1)`.
pub fn ema(values: &[Option<f64>], length: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());
    if length == 0 {
        result.resize(values.len(), None);
        return result;
    }

    let multiplier = 2.0 / (length as f64 + 1.0);
    let mut ema_value: Option<f64> = None;
    let mut seed_sum = 0.0;
    let mut seed_count = 0;

    for value in values.iter().copied() {
        match (ema_value, value) {
            (Some(prev), Some(x)) => {
                let next = prev + multiplier * (x - prev);
                ema_value = Some(next);
                result.push(Some(next));
            }
            (Some(_), None) => result.push(None),
            (None, Some(x)) => {
                seed_sum += x;
                seed_count += 1;
                if seed_count == length {
                    ema_value = Some(seed_sum / length as f64);
                }
                result.push(ema_value);
            }
            (None, None) => {
                // A gap restarts the seed window
                seed_sum = 0.0;
                seed_count = 0;
                result.push(None);
            }
        }
    }

    result
}

/// Relative Strength Index with Wilder's smoothing
///
/// Average gain and loss are seeded with the mean of the first `length`
/// price changes, then smoothed as `(prev * (length - 1) + x) / length`.
/// The first value lands on row `length`. A window with no movement at all
/// reads 50.
pub fn rsi(values: &[Option<f64>], length: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());
    if length == 0 {
        result.resize(values.len(), None);
        return result;
    }

    let period = length as f64;
    let mut averages: Option<(f64, f64)> = None;
    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    let mut seed_count = 0;

    for i in 0..values.len() {
        let change = match (i.checked_sub(1).and_then(|p| values[p]), values[i]) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        };

        let Some(change) = change else {
            if averages.is_none() {
                gain_sum = 0.0;
                loss_sum = 0.0;
                seed_count = 0;
            }
            result.push(None);
            continue;
        };

        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        let (avg_gain, avg_loss) = match averages {
            Some((prev_gain, prev_loss)) => (
                (prev_gain * (period - 1.0) + gain) / period,
                (prev_loss * (period - 1.0) + loss) / period,
            ),
            None => {
                gain_sum += gain;
                loss_sum += loss;
                seed_count += 1;
                if seed_count < length {
                    result.push(None);
                    continue;
                }
                (gain_sum / period, loss_sum / period)
            }
        };

        averages = Some((avg_gain, avg_loss));
        result.push(Some(rsi_value(avg_gain, avg_loss)));
    }

    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    let total = avg_gain + avg_loss;
    if total == 0.0 {
        50.0
    } else {
        100.0 * avg_gain / total
    }
}

// =============================================================================
// Indicator Selection
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
}

impl IndicatorKind {
    /// Column prefix
    pub fn name(&self) -> &'static str {
        match self {
            IndicatorKind::Sma => "SMA",
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Rsi => "RSI",
        }
    }

    pub fn compute(&self, values: &[Option<f64>], length: usize) -> Vec<Option<f64>> {
        match self {
            IndicatorKind::Sma => sma(values, length),
            IndicatorKind::Ema => ema(values, length),
            IndicatorKind::Rsi => rsi(values, length),
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for IndicatorKind {
    type Err = IndicatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sma" => Ok(IndicatorKind::Sma),
            "ema" => Ok(IndicatorKind::Ema),
            "rsi" => Ok(IndicatorKind::Rsi),
            _ => Err(IndicatorError::UnknownIndicator(s.trim().to_string())),
        }
    }
}

impl TryFrom<String> for IndicatorKind {
    type Error = IndicatorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IndicatorKind> for String {
    fn from(kind: IndicatorKind) -> Self {
        kind.name().to_ascii_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub length: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
        }
    }
}

impl IndicatorParams {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

/// One indicator column to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorRequest {
    pub kind: IndicatorKind,
    pub params: IndicatorParams,
}

impl IndicatorRequest {
    pub fn new(kind: IndicatorKind, params: IndicatorParams) -> Self {
        Self { kind, params }
    }

    /// Output column name, e.g. `RSI_14`
    pub fn column_name(&self) -> String {
        format!("{}_{}", self.kind.name(), self.params.length)
    }

    fn validate(&self) -> Result<(), IndicatorError> {
        if self.params.length == 0 {
            return Err(IndicatorError::InvalidLength {
                indicator: self.kind.name().to_string(),
            });
        }
        Ok(())
    }
}

/// Ordered list of indicator requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSet {
    requests: Vec<IndicatorRequest>,
}

impl Default for IndicatorSet {
    fn default() -> Self {
        Self::from_kinds(&DEFAULT_INDICATORS, &HashMap::new())
    }
}

impl IndicatorSet {
    pub fn empty() -> Self {
        Self {
            requests: Vec::new(),
        }
    }

    /// Build from kinds, taking parameters from `overrides` where present
    pub fn from_kinds(
        kinds: &[IndicatorKind],
        overrides: &HashMap<IndicatorKind, IndicatorParams>,
    ) -> Self {
        let requests = kinds
            .iter()
            .map(|kind| {
                let params = overrides.get(kind).copied().unwrap_or_default();
                IndicatorRequest::new(*kind, params)
            })
            .collect();
        Self { requests }
    }

    /// Parse indicator names (case-insensitive); unknown names are an error
    pub fn from_names<S: AsRef<str>>(
        names: &[S],
        overrides: &HashMap<IndicatorKind, IndicatorParams>,
    ) -> Result<Self, IndicatorError> {
        let kinds = names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<IndicatorKind>, _>>()?;
        Ok(Self::from_kinds(&kinds, overrides))
    }

    pub fn with(mut self, kind: IndicatorKind, params: IndicatorParams) -> Self {
        self.requests.push(IndicatorRequest::new(kind, params));
        self
    }

    /// Use the same length for every request
    pub fn with_length(mut self, length: usize) -> Self {
        for request in &mut self.requests {
            request.params.length = length;
        }
        self
    }

    pub fn requests(&self) -> &[IndicatorRequest] {
        &self.requests
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn validate(&self) -> Result<(), IndicatorError> {
        self.requests.iter().try_for_each(IndicatorRequest::validate)
    }
}

// =============================================================================
// Annotation
// =============================================================================

/// Append one column per request, computed from `Close`
///
/// Columns that already exist are overwritten in place, so annotating twice
/// yields the same columns.
pub fn annotate(mut frame: KlineFrame, indicators: &IndicatorSet) -> Result<KlineFrame, IndicatorError> {
    indicators.validate()?;

    if frame.is_empty() {
        warn!("Frame is empty. No indicators added.");
        return Ok(frame);
    }

    let close = frame
        .floats(CLOSE_COLUMN)
        .ok_or_else(|| IndicatorError::MissingColumn(CLOSE_COLUMN.to_string()))?
        .to_vec();

    for request in indicators.requests() {
        let name = request.column_name();
        let values = request.kind.compute(&close, request.params.length);
        debug!(
            "{}: {} of {} rows populated",
            name,
            values.iter().flatten().count(),
            values.len()
        );
        frame.set_float_column(name, values)?;
    }

    Ok(frame)
}

// =============================================================================
// Tests
// =============================================================================
