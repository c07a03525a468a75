//! TickerLab TUI: terminal charts for processed price tables.
//!
//! - `IndicatorChart`: price/SMA, RSI and MACD panels as a ratatui widget
//! - `Visualizer`: full-screen display with keyboard dismissal
//! - `Theme`: color palette

pub mod chart;
pub mod theme;
pub mod visualizer;

pub use chart::{default_title, ChartError, IndicatorChart, REQUIRED_COLUMNS};
pub use theme::Theme;
pub use visualizer::Visualizer;
