use super::{BarSequence, Mapper, Viewport};
use crate::config::{self, timezone::UserTimezone};

use iced_core::{Point, Size};

/// Fixed line height of the tooltip box.
pub const LINE_HEIGHT: f32 = 18.0;
/// Gap between the data point and the tooltip box.
const OFFSET: f32 = 10.0;
/// Approximate advance of a monospace glyph, relative to the font size.
const CHAR_WIDTH: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TooltipState {
    pub visible: bool,
    /// Pointer position the tooltip was resolved from.
    pub x: f32,
    pub y: f32,
    pub index: usize,
}

impl TooltipState {
    pub fn hidden() -> Self {
        Self::default()
    }
}

/// Resolves the bar under `pointer`; hidden when it falls outside the window.
pub fn resolve(viewport: &Viewport, mapper: Option<&Mapper>, pointer: Point) -> TooltipState {
    let Some(index) = mapper.and_then(|mapper| mapper.index_at(pointer.x)) else {
        return TooltipState::hidden();
    };

    if !viewport.contains(index) {
        return TooltipState::hidden();
    }

    TooltipState {
        visible: true,
        x: pointer.x,
        y: pointer.y,
        index,
    }
}

/// Text content of a tooltip for one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Details {
    pub lines: Vec<String>,
    pub price_change: f64,
    pub price_change_percent: f64,
}

impl Details {
    pub fn is_up(&self) -> bool {
        self.price_change >= 0.0
    }
}

pub fn describe(bars: &BarSequence, index: usize, timezone: UserTimezone) -> Option<Details> {
    let bar = bars.get(index)?;
    let previous_close = bars.previous_close(index)?;

    let price_change = bar.close - previous_close;
    let price_change_percent = if previous_close.is_finite() && previous_close != 0.0 {
        price_change / previous_close * 100.0
    } else {
        0.0
    };

    let sign = if price_change >= 0.0 { "+" } else { "" };

    let lines = vec![
        timezone.format_tooltip_timestamp(bar.time),
        format!("O: ${:.2}", bar.open),
        format!("H: ${:.2}", bar.high),
        format!("L: ${:.2}", bar.low),
        format!("C: ${:.2}", bar.close),
        format!("Vol: {}", abbr_large_numbers(bar.volume)),
        format!("Change: {sign}{price_change:.2} ({price_change_percent:.2}%)"),
    ];

    Some(Details {
        lines,
        price_change,
        price_change_percent,
    })
}

pub fn abbr_large_numbers(value: f64) -> String {
    let abs = value.abs();

    if abs >= 1e9 {
        format!("{:.1}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else {
        format!("{value:.1}")
    }
}

pub fn box_size(lines: &[String], style: &config::Tooltip) -> Size {
    let longest = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);

    Size::new(
        longest as f32 * style.font_size * CHAR_WIDTH + style.padding * 2.0,
        lines.len() as f32 * LINE_HEIGHT + style.padding * 2.0,
    )
}

/// Top-left corner of the tooltip box for a data point at `anchor`.
///
/// Sits above and to the right, moving left when it would cross `right_edge` and below
/// the point when it would leave the top of the canvas.
pub fn place(anchor: Point, size: Size, right_edge: f32) -> Point {
    let mut x = anchor.x + OFFSET;
    let mut y = anchor.y - size.height - OFFSET;

    if x + size.width > right_edge {
        x = anchor.x - size.width - OFFSET;
    }
    if y < 0.0 {
        y = anchor.y + OFFSET;
    }

    Point::new(x, y)
}
