//! Interactive chart display on the terminal's alternate screen.

use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use polars::prelude::DataFrame;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;
use tracing::info;

use crate::chart::{default_title, ChartError, IndicatorChart};
use crate::theme::Theme;

/// Shows a processed table as a three-panel chart and blocks until dismissed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Visualizer {
    theme: Theme,
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_theme(theme: Theme) -> Self {
        Self { theme }
    }

    /// Validate `data`, then draw it until the user presses `q`, `Esc` or `Enter`.
    ///
    /// Validation happens before the terminal is touched, so a table missing a
    /// required column fails without flashing the screen.
    pub fn plot_data(
        &self,
        name: &str,
        data: &DataFrame,
        title: Option<&str>,
    ) -> Result<(), ChartError> {
        let title = resolve_title(name, title);
        let chart = IndicatorChart::from_frame(data, &title, self.theme)?;
        info!(name, points = chart.len(), "displaying chart");

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e.into());
        }
        let result = Terminal::new(CrosstermBackend::new(stdout))
            .map_err(ChartError::from)
            .and_then(|mut terminal| {
                let shown = show(&mut terminal, &chart);
                let _ = terminal.show_cursor();
                shown
            });

        // A drawing error wins over a restore error.
        result.and(restore_terminal())
    }
}

/// The override when given, otherwise the default title for `name`.
fn resolve_title(name: &str, title: Option<&str>) -> String {
    title.map_or_else(|| default_title(name), str::to_string)
}

/// Attempt both restore steps; report the first failure.
fn restore_terminal() -> Result<(), ChartError> {
    let raw = disable_raw_mode();
    let screen = execute!(io::stdout(), LeaveAlternateScreen);
    raw.and(screen).map_err(ChartError::from)
}

fn show<B: Backend>(terminal: &mut Terminal<B>, chart: &IndicatorChart) -> Result<(), ChartError> {
    terminal.clear()?;
    loop {
        terminal.draw(|f| f.render_widget(chart, f.area()))?;
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && is_close_key(key.code) {
                return Ok(());
            }
        }
    }
}

fn is_close_key(code: KeyCode) -> bool {
    matches!(code, KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn validation_fails_before_terminal_setup() {
        let df = df!("Date" => &["2025-01-01"], "Close" => &[1.0]).unwrap();
        let err = Visualizer::new().plot_data("AAPL", &df, None).unwrap_err();
        assert!(matches!(&err, ChartError::MissingColumn(c) if c == "SMA_20"));

        let err = Visualizer::new()
            .plot_data("AAPL", &DataFrame::empty(), Some("x"))
            .unwrap_err();
        assert!(matches!(err, ChartError::NotTabular));
    }

    #[test]
    fn title_override_wins_over_default() {
        assert_eq!(resolve_title("AAPL", None), "Technical analysis - AAPL");
        assert_eq!(resolve_title("AAPL", Some("Apple, daily")), "Apple, daily");
    }

    #[test]
    fn themed_visualizer_keeps_its_palette() {
        assert_eq!(Visualizer::new(), Visualizer::with_theme(Theme::default()));
        assert_ne!(Visualizer::new(), Visualizer::with_theme(Theme::basic()));
    }

    #[test]
    fn close_keys() {
        assert!(is_close_key(KeyCode::Char('q')));
        assert!(is_close_key(KeyCode::Esc));
        assert!(!is_close_key(KeyCode::Char('x')));
    }
}
