//! Three-panel indicator chart widget.
//!
//! Top: close price with the 20-bar SMA overlay. Middle: RSI 14 on a fixed
//! 0-100 scale with overbought/oversold guides at 70 and 30. Bottom: MACD line.
//! Rows with a null timestamp or value are skipped per line, so indicator
//! warmup gaps simply start the line later.

use chrono::DateTime;
use polars::prelude::*;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Widget},
};
use thiserror::Error;
use tickerlab_core::data::{coerce_numeric, coerce_timestamp, DataError};
use tickerlab_core::schema::{CLOSE, DATE, MACD, RSI_14, SMA_20};

use crate::theme::Theme;

/// Columns a table must carry to be plotted, checked in this order.
pub const REQUIRED_COLUMNS: [&str; 5] = [DATE, CLOSE, SMA_20, RSI_14, MACD];

pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;

const DAY_MS: f64 = 86_400_000.0;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("input must be a table with at least one column")]
    NotTabular,

    #[error("table must contain a '{0}' column to plot")]
    MissingColumn(String),

    #[error("cannot plot: {0}")]
    Data(#[from] DataError),

    #[error("{0}")]
    Polars(#[from] PolarsError),

    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

pub fn default_title(name: &str) -> String {
    format!("Technical analysis - {name}")
}

/// Chart widget built from a processed table. Owns its plotted points.
#[derive(Debug, Clone)]
pub struct IndicatorChart {
    title: String,
    close: Vec<(f64, f64)>,
    sma: Vec<(f64, f64)>,
    rsi: Vec<(f64, f64)>,
    macd: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    theme: Theme,
}

impl IndicatorChart {
    /// Extract the plotted columns from `data`. The table itself is not
    /// modified; a non-datetime `Date` column is coerced on a copy.
    pub fn from_frame(data: &DataFrame, title: &str, theme: Theme) -> Result<Self, ChartError> {
        if data.width() == 0 {
            return Err(ChartError::NotTabular);
        }
        let mut columns = Vec::with_capacity(REQUIRED_COLUMNS.len());
        for name in REQUIRED_COLUMNS {
            let column = data
                .column(name)
                .map_err(|_| ChartError::MissingColumn(name.to_string()))?;
            columns.push(column.as_materialized_series());
        }

        let stamps = coerce_timestamp(columns[0])?.cast(&DataType::Int64)?;
        let xs: Vec<Option<f64>> = stamps.i64()?.iter().map(|v| v.map(|ms| ms as f64)).collect();

        let points = |series: &Series| -> Result<Vec<(f64, f64)>, ChartError> {
            let values = coerce_numeric(series)?;
            let ys = values.f64()?;
            let pts: Vec<(f64, f64)> = xs
                .iter()
                .zip(ys.iter())
                .filter_map(|(x, y)| Some(((*x)?, y?)))
                .filter(|(_, y)| y.is_finite())
                .collect();
            Ok(pts)
        };

        let close = points(columns[1])?;
        let sma = points(columns[2])?;
        let rsi = points(columns[3])?;
        let macd = points(columns[4])?;

        let x_bounds = padded_bounds(xs.iter().flatten().copied(), 0.0);
        Ok(Self {
            title: title.to_string(),
            close,
            sma,
            rsi,
            macd,
            x_bounds,
            theme,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of plotted close prices.
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    fn x_axis(&self) -> Axis<'_> {
        let [lo, hi] = self.x_bounds;
        let fmt = if hi - lo < 3.0 * DAY_MS {
            "%m-%d %H:%M"
        } else {
            "%Y-%m-%d"
        };
        let labels = [lo, (lo + hi) / 2.0, hi]
            .into_iter()
            .map(|ms| Span::styled(date_label(ms, fmt), self.theme.muted_style()))
            .collect::<Vec<_>>();
        Axis::default()
            .style(self.theme.muted_style())
            .bounds(self.x_bounds)
            .labels(labels)
    }

    fn y_axis(&self, bounds: [f64; 2], decimals: usize) -> Axis<'_> {
        let [lo, hi] = bounds;
        let labels = [lo, (lo + hi) / 2.0, hi]
            .into_iter()
            .map(|v| Span::styled(format!("{v:.decimals$}"), self.theme.muted_style()))
            .collect::<Vec<_>>();
        Axis::default()
            .style(self.theme.muted_style())
            .bounds(bounds)
            .labels(labels)
    }

    fn panel(&self, title: Line<'static>) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent))
            .title(title)
    }

    fn render_price(&self, area: Rect, buf: &mut Buffer) {
        let y_bounds = padded_bounds(
            self.close.iter().chain(&self.sma).map(|&(_, y)| y),
            0.05,
        );
        let datasets = vec![
            line("Close", &self.close, self.theme.price),
            line("SMA 20", &self.sma, self.theme.average),
        ];
        Chart::new(datasets)
            .block(self.panel(Line::from(" Close / SMA 20 ")))
            .x_axis(self.x_axis())
            .y_axis(self.y_axis(y_bounds, 2))
            .render(area, buf);
    }

    fn render_rsi(&self, area: Rect, buf: &mut Buffer) {
        let [lo, hi] = self.x_bounds;
        let overbought = [(lo, RSI_OVERBOUGHT), (hi, RSI_OVERBOUGHT)];
        let oversold = [(lo, RSI_OVERSOLD), (hi, RSI_OVERSOLD)];
        let datasets = vec![
            line("RSI 14", &self.rsi, self.theme.oscillator),
            line("Overbought (70)", &overbought, self.theme.overbought),
            line("Oversold (30)", &oversold, self.theme.oversold),
        ];
        Chart::new(datasets)
            .block(self.panel(Line::from(" RSI 14 ")))
            .x_axis(self.x_axis())
            .y_axis(self.y_axis([0.0, 100.0], 0))
            .render(area, buf);
    }

    fn render_macd(&self, area: Rect, buf: &mut Buffer) {
        let y_bounds = padded_bounds(self.macd.iter().map(|&(_, y)| y), 0.1);
        let mut title = vec![Span::raw(" MACD 12/26/9 ")];
        if let Some(&(_, last)) = self.macd.last() {
            title.push(Span::styled(
                format!("{last:+.3} "),
                Style::default().fg(self.theme.momentum_color(last)),
            ));
        }
        Chart::new(vec![line("MACD", &self.macd, self.theme.momentum)])
            .block(self.panel(Line::from(title)))
            .x_axis(self.x_axis())
            .y_axis(self.y_axis(y_bounds, 3))
            .render(area, buf);
    }
}

impl Widget for &IndicatorChart {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let outer = Block::default()
            .title(Span::styled(format!(" {} ", self.title), self.theme.title_style()))
            .title_bottom(Span::styled(" q / Esc to close ", self.theme.muted_style()))
            .style(Style::default().bg(self.theme.background));
        let inner = outer.inner(area);
        outer.render(area, buf);

        let [price, rsi, macd] = Layout::vertical([
            Constraint::Percentage(50),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .areas(inner);

        self.render_price(price, buf);
        self.render_rsi(rsi, buf);
        self.render_macd(macd, buf);
    }
}

fn line<'a>(name: &'a str, data: &'a [(f64, f64)], color: Color) -> Dataset<'a> {
    Dataset::default()
        .name(name)
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(data)
}

/// Min/max of `values` widened by `pad` of the range. Falls back to `[0, 1]`
/// when there is nothing to plot, and to `±1` around a flat series.
fn padded_bounds(values: impl Iterator<Item = f64>, pad: f64) -> [f64; 2] {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    let range = hi - lo;
    if range <= 0.0 {
        return [lo - 1.0, hi + 1.0];
    }
    [lo - range * pad, hi + range * pad]
}

fn date_label(ms: f64, fmt: &str) -> String {
    DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.format(fmt).to_string())
        .unwrap_or_default()
}
