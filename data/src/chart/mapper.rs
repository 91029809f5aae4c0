use super::{BarSequence, Viewport};

use iced_core::{Point, Size};

/// Index/price to pixel conversion for one frame.
///
/// Rebuilt from the current window and canvas size every time it is needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mapper {
    width: f64,
    height: f64,
    padding: f64,
    start: usize,
    end: usize,
    step_x: f64,
    min_price: f64,
    max_price: f64,
    scale_y: f64,
}

impl Mapper {
    /// `None` for an empty sequence, a plot with no area, or a window without a finite price.
    pub fn new(bars: &BarSequence, viewport: &Viewport, size: Size, padding: f32) -> Option<Self> {
        let width = f64::from(size.width);
        let height = f64::from(size.height);
        let padding = f64::from(padding);

        let plot_width = width - 2.0 * padding;
        let plot_height = height - 2.0 * padding;
        if plot_width.is_nan() || plot_height.is_nan() || plot_width <= 0.0 || plot_height <= 0.0 {
            return None;
        }

        let window = bars.window(viewport);
        if window.is_empty() {
            return None;
        }

        let (min_price, max_price) = window
            .iter()
            .flat_map(|bar| [bar.low, bar.high])
            .filter(|price| price.is_finite())
            .fold(None, |range: Option<(f64, f64)>, price| {
                Some(range.map_or((price, price), |(min, max)| {
                    (min.min(price), max.max(price))
                }))
            })?;

        let (min_price, max_price) = if max_price - min_price > 0.0 {
            (min_price, max_price)
        } else {
            (min_price - 1.0, max_price + 1.0)
        };

        let start = viewport.start.min(bars.len() - 1);
        let end = viewport.end.clamp(start, bars.len() - 1);
        let visible = (end - start + 1) as f64;

        Some(Self {
            width,
            height,
            padding,
            start,
            end,
            step_x: plot_width / visible,
            min_price,
            max_price,
            scale_y: plot_height / (max_price - min_price),
        })
    }

    pub fn x(&self, index: usize) -> f32 {
        (self.padding + (index as f64 - self.start as f64) * self.step_x) as f32
    }

    pub fn y(&self, price: f64) -> f32 {
        (self.height - self.padding - (price - self.min_price) * self.scale_y) as f32
    }

    pub fn point(&self, index: usize, price: f64) -> Point {
        Point::new(self.x(index), self.y(price))
    }

    /// Bar whose column contains `x`; `None` left of the plot.
    ///
    /// Snaps by a fraction of a pixel so `index_at(x(i)) == i` despite rounding.
    pub fn index_at(&self, x: f32) -> Option<usize> {
        let snap = (self.step_x * 0.25).min(1e-3);
        let offset = (f64::from(x) - self.padding + snap) / self.step_x;

        if offset < 0.0 || !offset.is_finite() {
            return None;
        }

        Some(self.start + offset.floor() as usize)
    }

    /// Bar closest to `x`, always inside the window.
    pub fn nearest_index(&self, x: f32) -> usize {
        let offset = ((f64::from(x) - self.padding) / self.step_x).round();
        let index = self.start as f64 + offset;

        index.clamp(self.start as f64, self.end as f64) as usize
    }

    pub fn price_at(&self, y: f32) -> f64 {
        self.min_price + (self.height - self.padding - f64::from(y)) / self.scale_y
    }

    pub fn min_price(&self) -> f64 {
        self.min_price
    }

    pub fn max_price(&self) -> f64 {
        self.max_price
    }

    pub fn step_x(&self) -> f32 {
        self.step_x as f32
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn left(&self) -> f32 {
        self.padding as f32
    }

    pub fn right(&self) -> f32 {
        (self.width - self.padding) as f32
    }

    pub fn top(&self) -> f32 {
        self.padding as f32
    }

    pub fn bottom(&self) -> f32 {
        (self.height - self.padding) as f32
    }

    pub fn plot_width(&self) -> f32 {
        (self.width - 2.0 * self.padding) as f32
    }

    pub fn width(&self) -> f32 {
        self.width as f32
    }

    pub fn height(&self) -> f32 {
        self.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange::Bar;
    use proptest::prelude::*;

    const DAY: i64 = 86_400;

    fn bar(time: i64, close: f64) -> Bar {
        Bar {
            time,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    fn closes(closes: &[f64]) -> BarSequence {
        BarSequence::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, close)| bar(i as i64 * DAY, *close))
                .collect(),
            DAY as u32,
        )
    }

    #[test]
    fn three_daily_bars_fill_the_window() {
        let bars = closes(&[100.0, 110.0, 105.0]);
        let viewport = Viewport::reset(bars.len(), None);
        let mapper = Mapper::new(&bars, &viewport, Size::new(400.0, 300.0), 50.0).unwrap();

        assert_eq!((mapper.start(), mapper.end()), (0, 2));
        assert_eq!(mapper.min_price(), 100.0);
        assert_eq!(mapper.max_price(), 110.0);

        assert_eq!(mapper.x(0), 50.0);
        assert_eq!(mapper.x(1), 150.0);
        assert_eq!(mapper.y(100.0), 250.0);
        assert_eq!(mapper.y(110.0), 50.0);
    }

    #[test]
    fn flat_and_non_finite_prices() {
        let bars = closes(&[f64::NAN, 5.0, f64::INFINITY, 5.0]);
        let viewport = Viewport::reset(bars.len(), None);
        let mapper = Mapper::new(&bars, &viewport, Size::new(200.0, 200.0), 10.0).unwrap();

        assert_eq!(mapper.min_price(), 4.0);
        assert_eq!(mapper.max_price(), 6.0);

        let nothing = closes(&[f64::NAN]);
        assert!(Mapper::new(&nothing, &Viewport::reset(1, None), Size::new(200.0, 200.0), 10.0).is_none());
    }

    #[test]
    fn no_mapper_without_data_or_area() {
        let bars = closes(&[1.0, 2.0]);
        let viewport = Viewport::reset(bars.len(), None);

        assert!(Mapper::new(&BarSequence::default(), &Viewport::default(), Size::new(200.0, 200.0), 10.0).is_none());
        assert!(Mapper::new(&bars, &viewport, Size::new(100.0, 200.0), 50.0).is_none());
        assert!(Mapper::new(&bars, &viewport, Size::ZERO, 0.0).is_none());
    }

    #[test]
    fn inverse_mappings() {
        let bars = closes(&[100.0, 110.0, 105.0, 120.0]);
        let viewport = Viewport::reset(bars.len(), None);
        let mapper = Mapper::new(&bars, &viewport, Size::new(450.0, 300.0), 50.0).unwrap();

        // 350px / 4 bars
        assert_eq!(mapper.index_at(49.0), None);
        assert_eq!(mapper.index_at(50.0), Some(0));
        assert_eq!(mapper.index_at(137.0), Some(0));
        assert_eq!(mapper.index_at(138.0), Some(1));
        assert_eq!(mapper.index_at(1_000.0), Some(10));

        assert_eq!(mapper.nearest_index(0.0), 0);
        assert_eq!(mapper.nearest_index(100.0), 1);
        assert_eq!(mapper.nearest_index(1_000.0), 3);

        assert!((mapper.price_at(mapper.y(112.5)) - 112.5).abs() < 1e-4);
    }

    proptest! {
        #[test]
        fn index_round_trips_through_x(
            len in 1usize..2_000,
            visible in 1usize..2_000,
            width in 120.0f32..2_500.0,
            height in 120.0f32..1_500.0,
            shift in -2_000isize..0,
        ) {
            let bars = BarSequence::new(
                (0..len).map(|i| bar(i as i64 * 60, 100.0 + (i % 17) as f64)).collect(),
                60,
            );
            let mut viewport = Viewport::reset(len, Some(visible));
            viewport.pan_bars(shift, len);

            let mapper = Mapper::new(&bars, &viewport, Size::new(width, height), 50.0).unwrap();

            for i in viewport.start..=viewport.end {
                prop_assert_eq!(mapper.index_at(mapper.x(i)), Some(i));
                prop_assert_eq!(mapper.nearest_index(mapper.x(i)), i);
            }
        }
    }
}
