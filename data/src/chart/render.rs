//! Frame drawing, independent of any particular canvas.
//!
//! Every frame is painted in a fixed order: background, price line and area, grid,
//! volume, last price marker. The tooltip is painted separately on top so hosts can
//! cache the two layers independently.

use super::{BarSequence, Mapper, Viewport, grid, tooltip};
use crate::config::Config;

use iced_core::{Color, Point, Size};

const VOLUME_LABEL_STEPS: usize = 4;
const VOLUME_LABEL_SIZE: f32 = 10.0;
const ARROW_WIDTH: f32 = 50.0;
const ARROW_HALF_HEIGHT: f32 = 7.0;
const ARROW_FONT_SIZE: f32 = 12.0;
const LAST_POINT_RADIUS: f32 = 5.0;
const HOVER_POINT_RADIUS: f32 = 4.0;
const CROSSHAIR_DASH: [f32; 2] = [2.0, 2.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Start,
    Center,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
    /// Dash and gap lengths; solid when `None`.
    pub dash: Option<[f32; 2]>,
}

impl Stroke {
    pub fn solid(color: Color, width: f32) -> Self {
        Self {
            color,
            width,
            dash: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub content: String,
    pub position: Point,
    pub color: Color,
    pub size: f32,
    pub bold: bool,
    pub align_x: Align,
    pub align_y: Align,
}

/// Drawing primitives the chart needs from a host canvas.
pub trait Surface {
    fn size(&self) -> Size;

    fn fill_rectangle(&mut self, top_left: Point, size: Size, color: Color);

    fn fill_rounded_rectangle(&mut self, top_left: Point, size: Size, radius: f32, color: Color);

    /// Closed polygon through `points`.
    fn fill_polygon(&mut self, points: &[Point], color: Color);

    /// Open path through `points`.
    fn stroke_polyline(&mut self, points: &[Point], stroke: Stroke);

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color);

    fn stroke_circle(&mut self, center: Point, radius: f32, stroke: Stroke);

    fn fill_text(&mut self, text: Text);
}

/// Per-frame state drawn on top of the bars.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Overlay {
    pub tooltip: tooltip::TooltipState,
    /// Latest traded price, when a live feed is running.
    pub last_price: Option<f64>,
}

pub fn render(
    surface: &mut impl Surface,
    viewport: &Viewport,
    bars: &BarSequence,
    config: &Config,
    overlay: &Overlay,
) {
    render_main(surface, viewport, bars, config, overlay.last_price);
    render_overlay(surface, viewport, bars, config, &overlay.tooltip);
}

/// Everything but the tooltip.
pub fn render_main(
    surface: &mut impl Surface,
    viewport: &Viewport,
    bars: &BarSequence,
    config: &Config,
    last_price: Option<f64>,
) {
    let size = surface.size();
    surface.fill_rectangle(Point::ORIGIN, size, config.background);

    let Some(mapper) = Mapper::new(bars, viewport, size, config.padding) else {
        return;
    };

    draw_price_area(surface, &mapper, bars, config);
    draw_grid(surface, &mapper, bars, config);
    draw_volume(surface, &mapper, bars, config);
    draw_last_price(surface, &mapper, bars, config, last_price);
}

pub fn render_overlay(
    surface: &mut impl Surface,
    viewport: &Viewport,
    bars: &BarSequence,
    config: &Config,
    tooltip: &tooltip::TooltipState,
) {
    if !tooltip.visible || !viewport.contains(tooltip.index) {
        return;
    }

    let Some(mapper) = Mapper::new(bars, viewport, surface.size(), config.padding) else {
        return;
    };
    let Some(bar) = bars.get(tooltip.index).filter(|bar| bar.close.is_finite()) else {
        return;
    };
    let Some(details) = tooltip::describe(bars, tooltip.index, config.timezone) else {
        return;
    };

    let anchor = mapper.point(tooltip.index, bar.close);
    let style = &config.tooltip;

    let crosshair = Stroke {
        color: style.crosshair_color,
        width: 1.0,
        dash: Some(CROSSHAIR_DASH),
    };
    surface.stroke_polyline(
        &[
            Point::new(anchor.x, mapper.top()),
            Point::new(anchor.x, mapper.bottom()),
        ],
        crosshair,
    );
    surface.stroke_polyline(
        &[
            Point::new(mapper.left(), anchor.y),
            Point::new(mapper.right(), anchor.y),
        ],
        crosshair,
    );

    let box_size = tooltip::box_size(&details.lines, style);
    let origin = tooltip::place(anchor, box_size, mapper.right());
    surface.fill_rounded_rectangle(origin, box_size, style.radius, style.background);

    let change_color = if details.is_up() {
        style.up_color
    } else {
        style.down_color
    };
    let last_line = details.lines.len().saturating_sub(1);

    for (i, line) in details.lines.into_iter().enumerate() {
        surface.fill_text(Text {
            content: line,
            position: Point::new(
                origin.x + style.padding,
                origin.y + style.padding + i as f32 * tooltip::LINE_HEIGHT,
            ),
            color: if i == last_line {
                change_color
            } else {
                style.text_color
            },
            size: style.font_size,
            bold: false,
            align_x: Align::Start,
            align_y: Align::Start,
        });
    }

    draw_point(surface, anchor, HOVER_POINT_RADIUS, config.line_color);
}

/// Line and area fill over the window; non-finite closes break the path.
fn draw_price_area(surface: &mut impl Surface, mapper: &Mapper, bars: &BarSequence, config: &Config) {
    let mut segments: Vec<Vec<Point>> = vec![];
    let mut current: Vec<Point> = vec![];

    for index in mapper.start()..=mapper.end() {
        match bars.get(index).map(|bar| bar.close) {
            Some(close) if close.is_finite() => current.push(mapper.point(index, close)),
            _ => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    let baseline = mapper.bottom();

    for segment in &segments {
        let (Some(first), Some(last)) = (segment.first(), segment.last()) else {
            continue;
        };

        let mut area = Vec::with_capacity(segment.len() + 2);
        area.push(Point::new(first.x, baseline));
        area.extend_from_slice(segment);
        area.push(Point::new(last.x, baseline));

        surface.fill_polygon(&area, config.fill_color);
    }

    for segment in segments.iter().filter(|segment| segment.len() > 1) {
        surface.stroke_polyline(segment, Stroke::solid(config.line_color, config.line_width));
    }
}

fn draw_grid(surface: &mut impl Surface, mapper: &Mapper, bars: &BarSequence, config: &Config) {
    let style = &config.grid;

    for row in grid::horizontal(mapper, style.price_step) {
        surface.stroke_polyline(
            &[
                Point::new(mapper.left(), row.y),
                Point::new(mapper.right(), row.y),
            ],
            Stroke::solid(style.line_color, style.line_width),
        );
        surface.fill_text(Text {
            content: row.label,
            position: Point::new(mapper.right() + 2.0, row.y),
            color: style.line_color,
            size: style.font_size,
            bold: false,
            align_x: Align::Start,
            align_y: Align::Center,
        });
    }

    let label_y = mapper.height() - (config.padding / 2.0);

    for line in grid::vertical(bars, mapper, config.timezone) {
        let color = match line.tier {
            grid::Tier::Year => style.year_color,
            grid::Tier::Month => style.month_color,
            grid::Tier::Day => style.day_color,
            grid::Tier::Hour => style.hour_color,
        };

        surface.stroke_polyline(
            &[
                Point::new(line.x, mapper.top()),
                Point::new(line.x, mapper.bottom()),
            ],
            Stroke::solid(color, style.line_width),
        );
        surface.fill_text(Text {
            content: line.label,
            position: Point::new(line.x, label_y),
            color,
            size: style.font_size,
            bold: line.tier == grid::Tier::Year,
            align_x: Align::Center,
            align_y: Align::Center,
        });
    }
}

/// Volume strip along the bottom of the plot, scaled to the largest visible volume.
fn draw_volume(surface: &mut impl Surface, mapper: &Mapper, bars: &BarSequence, config: &Config) {
    let style = &config.volume;
    if style.height <= 0.0 {
        return;
    }

    let max_volume = (mapper.start()..=mapper.end())
        .filter_map(|index| bars.get(index))
        .map(|bar| bar.volume)
        .filter(|volume| volume.is_finite())
        .fold(0.0_f64, f64::max);

    if max_volume <= 0.0 {
        return;
    }

    let baseline = mapper.bottom();
    let bar_width = (mapper.step_x() - style.spacing).max(1.0);

    for index in mapper.start()..=mapper.end() {
        let Some(bar) = bars.get(index) else {
            continue;
        };
        if !(bar.volume.is_finite() && bar.volume > 0.0) {
            continue;
        }

        let height = (bar.volume / max_volume) as f32 * style.height;
        let is_up = bars
            .previous_close(index)
            .is_none_or(|previous| bar.is_up_from(previous));

        surface.fill_rectangle(
            Point::new(mapper.x(index), baseline - height),
            Size::new(bar_width, height),
            if is_up {
                style.up_color
            } else {
                style.down_color
            },
        );
    }

    for step in 0..=VOLUME_LABEL_STEPS {
        let fraction = step as f32 / VOLUME_LABEL_STEPS as f32;

        surface.fill_text(Text {
            content: tooltip::abbr_large_numbers(max_volume * f64::from(fraction)),
            position: Point::new(mapper.left() - 4.0, baseline - fraction * style.height),
            color: style.label_color,
            size: VOLUME_LABEL_SIZE,
            bold: false,
            align_x: Align::End,
            align_y: Align::Center,
        });
    }
}

/// Arrow in the right gutter with the latest price, plus a dot on the last visible close.
fn draw_last_price(
    surface: &mut impl Surface,
    mapper: &Mapper,
    bars: &BarSequence,
    config: &Config,
    last_price: Option<f64>,
) {
    let last_visible = bars.get(mapper.end()).map(|bar| bar.close);
    let price = last_price.or_else(|| bars.last().map(|bar| bar.close));

    if let Some(price) = price.filter(|price| price.is_finite()) {
        let y = mapper.y(price).clamp(mapper.top(), mapper.bottom());
        let tip = mapper.right() + 2.0;
        let tail = (tip + ARROW_WIDTH).min(mapper.width());

        surface.fill_polygon(
            &[
                Point::new(tip, y),
                Point::new(tip + 5.0, y - ARROW_HALF_HEIGHT),
                Point::new(tail, y - ARROW_HALF_HEIGHT),
                Point::new(tail, y + ARROW_HALF_HEIGHT),
                Point::new(tip + 5.0, y + ARROW_HALF_HEIGHT),
            ],
            config.price_arrow.fill_color,
        );
        surface.fill_text(Text {
            content: format!("{price:.2}"),
            position: Point::new(tip + 6.0, y),
            color: config.price_arrow.text_color,
            size: ARROW_FONT_SIZE,
            bold: false,
            align_x: Align::Start,
            align_y: Align::Center,
        });
    }

    if let Some(close) = last_visible.filter(|close| close.is_finite()) {
        draw_point(
            surface,
            mapper.point(mapper.end(), close),
            LAST_POINT_RADIUS,
            config.line_color,
        );
    }
}

fn draw_point(surface: &mut impl Surface, center: Point, radius: f32, color: Color) {
    surface.fill_circle(center, radius, color);
    surface.stroke_circle(center, radius, Stroke::solid(Color::WHITE, 2.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::tooltip::TooltipState;
    use crate::config::timezone::UserTimezone;
    use exchange::Bar;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Rectangle(Color),
        RoundedRectangle,
        Polygon(usize, Color),
        Polyline(usize, Color),
        Circle(Color),
        CircleOutline,
        Text(String),
    }

    #[derive(Default)]
    struct Recorder {
        ops: Vec<Op>,
    }

    impl Surface for Recorder {
        fn size(&self) -> Size {
            SIZE
        }

        fn fill_rectangle(&mut self, _: Point, _: Size, color: Color) {
            self.ops.push(Op::Rectangle(color));
        }

        fn fill_rounded_rectangle(&mut self, _: Point, _: Size, _: f32, _: Color) {
            self.ops.push(Op::RoundedRectangle);
        }

        fn fill_polygon(&mut self, points: &[Point], color: Color) {
            self.ops.push(Op::Polygon(points.len(), color));
        }

        fn stroke_polyline(&mut self, points: &[Point], stroke: Stroke) {
            self.ops.push(Op::Polyline(points.len(), stroke.color));
        }

        fn fill_circle(&mut self, _: Point, _: f32, color: Color) {
            self.ops.push(Op::Circle(color));
        }

        fn stroke_circle(&mut self, _: Point, _: f32, _: Stroke) {
            self.ops.push(Op::CircleOutline);
        }

        fn fill_text(&mut self, text: Text) {
            self.ops.push(Op::Text(text.content));
        }
    }

    const SIZE: Size = Size::new(600.0, 400.0);

    fn config() -> Config {
        Config {
            timezone: UserTimezone::Utc,
            ..Config::default()
        }
    }

    fn daily(closes: &[f64]) -> BarSequence {
        BarSequence::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, close)| Bar {
                    time: 1_705_276_800 + i as i64 * 86_400,
                    open: *close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close: *close,
                    volume: 100.0 * (i + 1) as f64,
                })
                .collect(),
            86_400,
        )
    }

    fn position(ops: &[Op], predicate: impl Fn(&Op) -> bool) -> usize {
        ops.iter()
            .position(predicate)
            .unwrap_or_else(|| panic!("missing op in {ops:#?}"))
    }

    #[test]
    fn empty_sequence_draws_background_only() {
        let mut surface = Recorder::default();
        let config = config();

        render(
            &mut surface,
            &Viewport::default(),
            &BarSequence::default(),
            &config,
            &Overlay {
                tooltip: TooltipState {
                    visible: true,
                    ..TooltipState::default()
                },
                last_price: Some(10.0),
            },
        );

        assert_eq!(surface.ops, vec![Op::Rectangle(config.background)]);
    }

    #[test]
    fn layers_are_drawn_in_order() {
        let config = config();
        let bars = daily(&[100.0, 110.0, 105.0]);
        let viewport = Viewport::reset(bars.len(), None);
        let mut surface = Recorder::default();

        render(
            &mut surface,
            &viewport,
            &bars,
            &config,
            &Overlay {
                tooltip: TooltipState {
                    visible: true,
                    x: 300.0,
                    y: 200.0,
                    index: 1,
                },
                last_price: Some(107.25),
            },
        );
        let ops = &surface.ops;

        assert_eq!(ops[0], Op::Rectangle(config.background));

        let area = position(ops, |op| *op == Op::Polygon(5, config.fill_color));
        let line = position(ops, |op| *op == Op::Polyline(3, config.line_color));
        let grid = position(ops, |op| matches!(op, Op::Polyline(2, c) if *c == config.grid.line_color));
        let volume = position(ops, |op| *op == Op::Rectangle(config.volume.up_color));
        let arrow = position(ops, |op| *op == Op::Polygon(5, config.price_arrow.fill_color));
        let price = position(ops, |op| *op == Op::Text("107.25".to_string()));
        let tooltip = position(ops, |op| *op == Op::RoundedRectangle);
        let change = position(ops, |op| *op == Op::Text("Change: +10.00 (10.00%)".to_string()));

        assert!(area < line);
        assert!(line < grid);
        assert!(grid < volume);
        assert!(volume < arrow);
        assert!(arrow < price);
        assert!(price < tooltip);
        assert!(tooltip < change);
        assert_eq!(ops.last(), Some(&Op::CircleOutline));
    }

    #[test]
    fn down_bars_use_down_volume_colour() {
        let config = config();
        let bars = daily(&[100.0, 90.0]);
        let viewport = Viewport::reset(bars.len(), None);
        let mut surface = Recorder::default();

        render_main(&mut surface, &viewport, &bars, &config, None);

        let volume: Vec<&Op> = surface
            .ops
            .iter()
            .filter(|op| {
                matches!(op, Op::Rectangle(c) if *c == config.volume.up_color || *c == config.volume.down_color)
            })
            .collect();

        assert_eq!(
            volume,
            vec![
                &Op::Rectangle(config.volume.up_color),
                &Op::Rectangle(config.volume.down_color)
            ]
        );
        assert!(surface.ops.contains(&Op::Text("90.00".to_string())));
    }

    #[test]
    fn missing_closes_split_the_line() {
        let config = config();
        let bars = daily(&[100.0, 101.0, f64::NAN, 103.0, 104.0, 105.0]);
        let viewport = Viewport::reset(bars.len(), None);
        let mut surface = Recorder::default();

        render_main(&mut surface, &viewport, &bars, &config, None);

        let lines: Vec<&Op> = surface
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Polyline(_, c) if *c == config.line_color))
            .collect();
        let areas = surface
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Polygon(_, c) if *c == config.fill_color))
            .count();

        assert_eq!(lines, vec![&Op::Polyline(2, config.line_color), &Op::Polyline(3, config.line_color)]);
        assert_eq!(areas, 2);
    }

    #[test]
    fn hidden_tooltip_draws_nothing() {
        let config = config();
        let bars = daily(&[100.0, 110.0]);
        let viewport = Viewport::reset(bars.len(), None);
        let mut surface = Recorder::default();

        render_overlay(&mut surface, &viewport, &bars, &config, &TooltipState::hidden());

        assert!(surface.ops.is_empty());
    }
}
