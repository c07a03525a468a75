//! Neon-on-charcoal palette for the indicator chart.
//!
//! Each plotted line has its own role so the price overlay and the oscillator
//! panels stay readable on a dark terminal.

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    /// Near-black background
    pub background: Color,
    /// Panel borders and titles
    pub accent: Color,
    /// Close price line
    pub price: Color,
    /// Moving-average overlay
    pub average: Color,
    /// RSI line
    pub oscillator: Color,
    /// MACD line
    pub momentum: Color,
    /// Overbought reference (RSI 70)
    pub overbought: Color,
    /// Oversold reference (RSI 30)
    pub oversold: Color,
    /// Axes and hints
    pub muted: Color,
    pub text_primary: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::neon()
    }
}

impl Theme {
    pub fn neon() -> Self {
        Self {
            background: Color::Rgb(18, 18, 20),
            accent: Color::Rgb(0, 255, 255),
            price: Color::Rgb(0, 255, 255),
            average: Color::Rgb(255, 140, 0),
            oscillator: Color::Rgb(147, 112, 219),
            momentum: Color::Rgb(0, 255, 128),
            overbought: Color::Rgb(255, 20, 147),
            oversold: Color::Rgb(0, 255, 128),
            muted: Color::Rgb(100, 149, 237),
            text_primary: Color::White,
        }
    }

    /// Plain 16-color variant for terminals without truecolor.
    pub fn basic() -> Self {
        Self {
            background: Color::Reset,
            accent: Color::Cyan,
            price: Color::Cyan,
            average: Color::Yellow,
            oscillator: Color::Magenta,
            momentum: Color::Green,
            overbought: Color::Red,
            oversold: Color::Green,
            muted: Color::Gray,
            text_primary: Color::White,
        }
    }

    pub fn muted_style(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn title_style(&self) -> Style {
        Style::default()
            .fg(self.text_primary)
            .add_modifier(Modifier::BOLD)
    }

    /// Color for a MACD reading: above zero uses the momentum color.
    pub fn momentum_color(&self, value: f64) -> Color {
        if value >= 0.0 {
            self.momentum
        } else {
            self.overbought
        }
    }
}
