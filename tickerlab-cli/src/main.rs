//! TickerLab CLI: fetch, analyze, export and chart one ticker.
//!
//! Commands:
//! - `run`: fetch, compute SMA/RSI/MACD, optionally export and chart
//! - `fetch`: fetch and normalize only, then export the raw price table

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, LeaveAlternateScreen};
use polars::prelude::DataFrame;
use tickerlab_core::schema::{CLOSE, MACD, RSI_14, SMA_20};
use tickerlab_core::{Interval, Period};
use tickerlab_runner::{
    export, fetch, provider_for, run, ChartConfig, CsvOverrides, ExportFormat, PipelineConfig,
};
use tickerlab_tui::{Theme, Visualizer};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "tickerlab",
    about = "TickerLab CLI: price history with SMA, RSI and MACD"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a price history, compute indicators, then export and/or chart it.
    Run {
        /// Ticker symbol (e.g., AAPL, ETL.PA). Optional when the config names one.
        symbol: Option<String>,

        /// Path to a TOML pipeline config. Flags override its fields.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,

        /// Export destination. Format follows the extension unless --format is set.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format: csv or xlsx.
        #[arg(long, value_parser = parse_format)]
        format: Option<ExportFormat>,

        #[command(flatten)]
        csv: CsvArgs,

        /// Show the three-panel chart in the terminal.
        #[arg(long, default_value_t = false)]
        chart: bool,

        /// Chart title. Defaults to "Technical analysis - <SYMBOL>".
        #[arg(long)]
        title: Option<String>,

        /// Draw the chart with the 16-color palette.
        #[arg(long, default_value_t = false)]
        basic_colors: bool,

        /// Worksheet name for .xlsx output.
        #[arg(long)]
        sheet_name: Option<String>,
    },
    /// Fetch and normalize a price history without computing indicators.
    Fetch {
        /// Ticker symbol.
        symbol: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Export destination (.csv or .xlsx).
        #[arg(long, short)]
        output: PathBuf,

        #[command(flatten)]
        csv: CsvArgs,
    },
}

#[derive(Debug, Default, Args)]
struct SourceArgs {
    /// Start date (YYYY-MM-DD). Defaults to one year before the end date.
    #[arg(long, conflicts_with = "period")]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Bar interval: 1m 2m 5m 15m 30m 60m 90m 1h 1d 5d 1wk 1mo 3mo.
    #[arg(long)]
    interval: Option<Interval>,

    /// Range ending on the end date: 1d 5d 1mo 3mo 6mo 1y 2y 5y 10y ytd max.
    #[arg(long)]
    period: Option<Period>,

    /// Read prices from a CSV export instead of the network.
    #[arg(long, value_name = "PATH")]
    from_csv: Option<PathBuf>,

    /// Stacked header rows in the --from-csv file.
    #[arg(long, requires = "from_csv")]
    header_rows: Option<usize>,
}

impl SourceArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(start) = self.start {
            config.start = Some(start);
            config.period = None;
        }
        if let Some(period) = self.period {
            config.period = Some(period);
            config.start = None;
        }
        if let Some(end) = self.end {
            config.end = Some(end);
        }
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if let Some(path) = &self.from_csv {
            config.source.csv = Some(path.clone());
        }
        if let Some(rows) = self.header_rows {
            config.source.header_rows = rows;
        }
    }
}

#[derive(Debug, Default, Args)]
struct CsvArgs {
    /// CSV field delimiter (single ASCII character).
    #[arg(long)]
    delimiter: Option<char>,

    /// strftime format for timestamps in CSV output.
    #[arg(long)]
    date_format: Option<String>,
}

impl CsvArgs {
    fn apply(&self, overrides: &mut CsvOverrides) {
        if let Some(delimiter) = self.delimiter {
            overrides.delimiter = Some(delimiter);
        }
        if let Some(format) = &self.date_format {
            overrides.date_format = Some(format.clone());
        }
    }
}

fn parse_format(s: &str) -> Result<ExportFormat, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            symbol,
            config,
            source,
            output,
            format,
            csv,
            chart,
            title,
            basic_colors,
            sheet_name,
        } => {
            let mut pipeline = match &config {
                Some(path) => PipelineConfig::from_file(path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            if symbol.is_some() {
                pipeline.symbol = symbol;
            }
            source.apply(&mut pipeline);
            if output.is_some() {
                pipeline.output.path = output;
            }
            if format.is_some() {
                pipeline.output.format = format;
            }
            csv.apply(&mut pipeline.output.csv);
            if chart {
                pipeline.chart.enabled = true;
            }
            if title.is_some() {
                pipeline.chart.title = title;
            }
            if basic_colors {
                pipeline.chart.basic_colors = true;
            }
            if sheet_name.is_some() {
                pipeline.output.xlsx.sheet_name = sheet_name;
            }
            run_cmd(&pipeline)
        }
        Commands::Fetch {
            symbol,
            source,
            output,
            csv,
        } => {
            let mut pipeline = PipelineConfig {
                symbol: Some(symbol),
                ..Default::default()
            };
            source.apply(&mut pipeline);
            csv.apply(&mut pipeline.output.csv);
            pipeline.output.path = Some(output);
            fetch_cmd(&pipeline)
        }
    }
}

/// Structured logs to stderr. `RUST_LOG` sets the filter (default `info`),
/// `TICKERLAB_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let log_format = std::env::var("TICKERLAB_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn run_cmd(config: &PipelineConfig) -> Result<()> {
    let symbol = config.symbol.clone().unwrap_or_default();
    let output = run(config, today()).with_context(|| format!("run for {symbol} failed"))?;

    print_summary(output.query.symbol(), &output.data, output.exported.as_ref());

    if config.chart.enabled {
        install_terminal_panic_hook();
        visualizer_for(&config.chart)
            .plot_data(output.query.symbol(), &output.data, config.chart.title.as_deref())
            .context("chart stage failed")?;
    }
    Ok(())
}

fn fetch_cmd(config: &PipelineConfig) -> Result<()> {
    let query = config.query(today()).context("invalid fetch settings")?;
    let symbol = query.symbol().to_string();
    let provider = provider_for(&config.source).context("failed to set up data source")?;

    let data = fetch(query, provider).with_context(|| format!("fetching {symbol} failed"))?;

    if let Some(path) = export(&data, config).context("export stage failed")? {
        info!(symbol = %symbol, path = %path.display(), "saved normalized prices");
        println!("Saved {} rows for {symbol} to {}", data.height(), path.display());
    }
    Ok(())
}

fn visualizer_for(chart: &ChartConfig) -> Visualizer {
    if chart.basic_colors {
        Visualizer::with_theme(Theme::basic())
    } else {
        Visualizer::new()
    }
}

/// Leave raw mode and the alternate screen before the default panic output.
fn install_terminal_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stderr(), LeaveAlternateScreen);
        default_hook(info);
    }));
}

fn last_value(data: &DataFrame, name: &str) -> Option<f64> {
    data.column(name)
        .ok()?
        .as_materialized_series()
        .f64()
        .ok()?
        .last()
}

fn print_summary(symbol: &str, data: &DataFrame, exported: Option<&PathBuf>) {
    let show = |v: Option<f64>, decimals: usize| match v {
        Some(v) => format!("{v:.decimals$}"),
        None => "n/a".to_string(),
    };
    println!();
    println!("=== {symbol} ===");
    println!("Rows:           {}", data.height());
    println!("Last close:     {}", show(last_value(data, CLOSE), 2));
    println!("SMA 20:         {}", show(last_value(data, SMA_20), 2));
    println!("RSI 14:         {}", show(last_value(data, RSI_14), 1));
    println!("MACD:           {}", show(last_value(data, MACD), 3));
    if let Some(path) = exported {
        println!("Exported to:    {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "tickerlab", "run", "AAPL", "--period", "6mo", "--interval", "1wk", "-o", "a.xlsx",
            "--chart", "--delimiter", ";",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                symbol,
                source,
                output,
                chart,
                csv,
                ..
            } => {
                assert_eq!(symbol.as_deref(), Some("AAPL"));
                assert_eq!(source.period, Some(Period::SixMonths));
                assert_eq!(source.interval, Some(Interval::OneWeek));
                assert_eq!(output, Some(PathBuf::from("a.xlsx")));
                assert_eq!(csv.delimiter, Some(';'));
                assert!(chart);
            }
            Commands::Fetch { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn start_and_period_conflict() {
        let err = Cli::try_parse_from([
            "tickerlab", "run", "AAPL", "--start", "2024-01-01", "--period", "1y",
        ]);
        assert!(err.is_err());
        assert!(Cli::try_parse_from(["tickerlab", "run", "AAPL", "--interval", "7m"]).is_err());
        assert!(Cli::try_parse_from(["tickerlab", "run", "AAPL", "--format", "pdf"]).is_err());
    }

    #[test]
    fn flags_override_config_fields_individually() {
        let mut config = PipelineConfig::from_toml(
            r#"
            symbol = "MSFT"
            period = "1y"
            interval = "1d"

            [output.csv]
            delimiter = ";"
            date_format = "%d/%m/%Y"
            "#,
        )
        .unwrap();

        let source = SourceArgs {
            start: NaiveDate::from_ymd_opt(2024, 2, 1),
            ..Default::default()
        };
        source.apply(&mut config);
        CsvArgs {
            delimiter: Some('|'),
            date_format: None,
        }
        .apply(&mut config.output.csv);

        assert_eq!(config.period, None);
        assert_eq!(config.start, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(config.interval, Interval::OneDay);
        assert_eq!(config.output.csv.delimiter, Some('|'));
        assert_eq!(config.output.csv.date_format.as_deref(), Some("%d/%m/%Y"));
    }

    #[test]
    fn last_value_reads_tail() {
        let df = polars::prelude::df!("Close" => &[1.0, 2.5]).unwrap();
        assert_eq!(last_value(&df, CLOSE), Some(2.5));
        assert_eq!(last_value(&df, MACD), None);
    }

    #[test]
    fn basic_colors_select_the_sixteen_color_palette() {
        let mut chart = ChartConfig::default();
        assert_eq!(visualizer_for(&chart), Visualizer::new());
        chart.basic_colors = true;
        assert_eq!(visualizer_for(&chart), Visualizer::with_theme(Theme::basic()));
    }
}
