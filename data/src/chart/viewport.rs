/// Fewest bars a zoom can narrow the window to.
pub const MIN_VISIBLE_BARS: usize = 5;

/// Visible window over a bar sequence, inclusive on both ends.
///
/// `fractional_start`/`fractional_end` carry drag distance that has not yet added up to a
/// whole bar, so slow drags still move the window eventually.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub start: usize,
    pub end: usize,
    pub fractional_start: f64,
    pub fractional_end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanOutcome {
    /// Integer window changed.
    pub moved: bool,
    /// Part of the requested motion was discarded at a sequence bound.
    pub pinned: bool,
}

impl Viewport {
    /// Shows the latest `visible_bars` bars, or all of them.
    pub fn reset(len: usize, visible_bars: Option<usize>) -> Self {
        if len == 0 {
            return Self::default();
        }

        let count = visible_bars.map_or(len, |bars| bars.clamp(1, len));
        Self::spanning(len - count, count)
    }

    fn spanning(start: usize, count: usize) -> Self {
        let end = start + count.max(1) - 1;

        Self {
            start,
            end,
            fractional_start: start as f64,
            fractional_end: end as f64,
        }
    }

    pub fn visible_count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }

    /// Pans by `pixel_delta` over a plot `plot_width` pixels wide.
    ///
    /// A positive delta is a rightward drag, which reveals older bars.
    pub fn apply_pan_delta(&mut self, pixel_delta: f64, plot_width: f64, len: usize) -> PanOutcome {
        if len == 0 || !pixel_delta.is_finite() || !plot_width.is_finite() || plot_width <= 0.0 {
            return PanOutcome::default();
        }

        let bar_delta = -pixel_delta * self.visible_count() as f64 / plot_width;
        self.shift_to(self.fractional_start + bar_delta, len)
    }

    /// Pans by whole bars; positive moves towards newer bars.
    pub fn pan_bars(&mut self, bars: isize, len: usize) -> PanOutcome {
        if len == 0 {
            return PanOutcome::default();
        }

        self.shift_to(self.start as f64 + bars as f64, len)
    }

    fn shift_to(&mut self, fractional_start: f64, len: usize) -> PanOutcome {
        let count = self.visible_count().min(len);
        let max_start = (len - count) as f64;

        let clamped = fractional_start.clamp(0.0, max_start);
        let pinned = clamped != fractional_start;

        let previous = (self.start, self.end);
        let start = clamped.round() as usize;

        self.start = start;
        self.end = start + count - 1;
        self.fractional_start = clamped;
        self.fractional_end = clamped + (count - 1) as f64;

        PanOutcome {
            moved: previous != (self.start, self.end),
            pinned,
        }
    }

    /// Scales the window by `factor` (below 1 zooms in), keeping the bar under `anchor`
    /// (0 = left edge, 1 = right edge of the plot) in place.
    pub fn zoom(&mut self, factor: f64, anchor: f64, len: usize) -> bool {
        if len == 0 || !factor.is_finite() || factor <= 0.0 {
            return false;
        }

        let anchor = if anchor.is_finite() {
            anchor.clamp(0.0, 1.0)
        } else {
            0.5
        };

        let count = self.visible_count().min(len);
        let min_count = MIN_VISIBLE_BARS.min(len);
        let new_count = ((count as f64 * factor).round() as usize).clamp(min_count, len);

        if new_count == count {
            return false;
        }

        let pivot = self.fractional_start + anchor * (count - 1) as f64;
        let fractional_start =
            (pivot - anchor * (new_count - 1) as f64).clamp(0.0, (len - new_count) as f64);

        let previous = (self.start, self.end);
        *self = Self::spanning(fractional_start.round() as usize, new_count);
        self.fractional_start = fractional_start;
        self.fractional_end = fractional_start + (new_count - 1) as f64;

        previous != (self.start, self.end)
    }
}
