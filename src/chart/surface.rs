use data::chart::render::{Align, Stroke, Surface, Text};
use iced::widget::canvas::{self, Frame, LineDash, Path};
use iced::{Alignment, Color, Font, Point, Size, font};

const BOLD: Font = Font {
    weight: font::Weight::Bold,
    ..Font::MONOSPACE
};

/// [`Surface`] backed by an iced canvas frame.
pub struct FrameSurface<'a> {
    frame: &'a mut Frame,
}

impl<'a> FrameSurface<'a> {
    pub fn new(frame: &'a mut Frame) -> Self {
        Self { frame }
    }
}

fn alignment(align: Align) -> Alignment {
    match align {
        Align::Start => Alignment::Start,
        Align::Center => Alignment::Center,
        Align::End => Alignment::End,
    }
}

fn polyline(points: &[Point], close: bool) -> Option<Path> {
    let (first, rest) = points.split_first()?;

    Some(Path::new(|builder| {
        builder.move_to(*first);
        for point in rest {
            builder.line_to(*point);
        }
        if close {
            builder.close();
        }
    }))
}

impl Surface for FrameSurface<'_> {
    fn size(&self) -> Size {
        self.frame.size()
    }

    fn fill_rectangle(&mut self, top_left: Point, size: Size, color: Color) {
        self.frame.fill_rectangle(top_left, size, color);
    }

    fn fill_rounded_rectangle(&mut self, top_left: Point, size: Size, radius: f32, color: Color) {
        self.frame
            .fill(&Path::rounded_rectangle(top_left, size, radius.into()), color);
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) {
        if let Some(path) = polyline(points, true) {
            self.frame.fill(&path, color);
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], stroke: Stroke) {
        let Some(path) = polyline(points, false) else {
            return;
        };

        let segments = stroke.dash.unwrap_or_default();
        let line_dash = if stroke.dash.is_some() {
            LineDash {
                segments: &segments,
                offset: 0,
            }
        } else {
            LineDash::default()
        };

        self.frame.stroke(
            &path,
            canvas::Stroke {
                line_dash,
                ..canvas::Stroke::default()
                    .with_color(stroke.color)
                    .with_width(stroke.width)
            },
        );
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color) {
        self.frame.fill(&Path::circle(center, radius), color);
    }

    fn stroke_circle(&mut self, center: Point, radius: f32, stroke: Stroke) {
        self.frame.stroke(
            &Path::circle(center, radius),
            canvas::Stroke::default()
                .with_color(stroke.color)
                .with_width(stroke.width),
        );
    }

    fn fill_text(&mut self, text: Text) {
        self.frame.fill_text(canvas::Text {
            content: text.content,
            position: text.position,
            color: text.color,
            size: text.size.into(),
            font: if text.bold { BOLD } else { Font::MONOSPACE },
            align_x: alignment(text.align_x).into(),
            align_y: alignment(text.align_y).into(),
            ..Default::default()
        });
    }
}
