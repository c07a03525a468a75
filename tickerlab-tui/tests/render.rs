//! Render a processed table on a test backend.

use polars::prelude::*;
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use tickerlab_core::calculate_indicators;
use tickerlab_core::data::{Normalizer, RawTable};
use tickerlab_tui::{default_title, IndicatorChart, Theme};

fn processed(rows: usize) -> DataFrame {
    let dates: Vec<String> = (0..rows)
        .map(|i| {
            let day = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
            (day + chrono::Duration::days(i as i64)).to_string()
        })
        .collect();
    let closes: Vec<f64> = (0..rows)
        .map(|i| 20.0 + (i as f64 / 6.0).sin() * 2.0 + i as f64 * 0.05)
        .collect();
    let raw = df!("Date" => dates, "Close" => closes).unwrap();
    let normalized = Normalizer::normalize(RawTable::from(raw)).unwrap();
    calculate_indicators(&normalized).unwrap()
}

#[test]
fn processed_table_renders_on_test_backend() {
    let df = processed(120);
    let chart =
        IndicatorChart::from_frame(&df, &default_title("ETL.PA"), Theme::default()).unwrap();
    assert_eq!(chart.len(), 120);

    let mut terminal = Terminal::new(TestBackend::new(140, 50)).unwrap();
    terminal.draw(|f| f.render_widget(&chart, f.area())).unwrap();
    let text: String = terminal
        .backend()
        .buffer()
        .content()
        .iter()
        .map(|c| c.symbol())
        .collect();
    assert!(text.contains("Technical analysis - ETL.PA"));
    assert!(text.contains("2024-03-01"));
}

#[test]
fn tiny_terminal_does_not_panic() {
    let df = processed(40);
    let chart = IndicatorChart::from_frame(&df, "small", Theme::basic()).unwrap();
    let mut terminal = Terminal::new(TestBackend::new(12, 6)).unwrap();
    terminal.draw(|f| f.render_widget(&chart, f.area())).unwrap();
}
