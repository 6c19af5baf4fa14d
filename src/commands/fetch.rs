//! Fetch command implementation

use anyhow::{Context, Result};
use binance_data::indicators::IndicatorSet;
use binance_data::{fetch_annotated, ColumnSelection, Config, KlineQuery};
use std::path::PathBuf;
use tracing::info;

use super::{connect, split_list};

/// Command-line overrides for the `data` and `indicators` config sections
#[derive(Debug)]
pub struct FetchArgs {
    pub symbol: Option<String>,
    pub interval: Option<String>,
    pub days: Option<u32>,
    pub indicators: Option<String>,
    pub length: Option<usize>,
    pub all_columns: bool,
    pub head: usize,
    pub output: Option<PathBuf>,
}

pub fn run(mut config: Config, args: FetchArgs) -> Result<()> {
    // Apply overrides
    if let Some(symbol) = args.symbol {
        info!("Overriding symbol to: {}", symbol);
        config.data.symbol = symbol;
    }
    if let Some(interval) = args.interval {
        info!("Overriding interval to: {}", interval);
        config.data.interval = interval;
    }
    if let Some(days) = args.days {
        config.data.days_back = days;
    }
    if args.all_columns {
        config.data.columns = ColumnSelection::All;
    }
    config.validate().context("Invalid fetch parameters")?;

    let mut indicators = match args.indicators.as_deref() {
        Some(list) if list.trim().eq_ignore_ascii_case("none") => IndicatorSet::empty(),
        Some(list) => IndicatorSet::from_names(&split_list(list), &config.indicators.params)?,
        None => config.indicators.indicator_set(),
    };
    if let Some(length) = args.length {
        indicators = indicators.with_length(length);
    }

    let gateway = connect(&config)?;

    let query = KlineQuery::last_days(
        config.data.symbol.clone(),
        config.data.interval.clone(),
        config.data.days_back,
    )?;
    let frame = fetch_annotated(
        &gateway,
        &query,
        &config.data.normalize_options(),
        &indicators,
    )
    .with_context(|| format!("Failed to fetch k-lines for {}", query.symbol))?;

    if frame.is_empty() {
        println!("No k-lines found for {} with the specified parameters.", query.symbol);
        return Ok(());
    }

    println!("\n{}\n", frame.head(args.head));
    print!("{}", frame.summary());

    if let Some(path) = args.output {
        frame
            .save_csv(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        info!("Saved {} rows to {}", frame.len(), path.display());
    }

    Ok(())
}
