use super::Viewport;

use exchange::Bar;

/// Ordered bars of one query, replaced wholesale on every fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSequence {
    bars: Vec<Bar>,
    /// Seconds per bar.
    granularity: u32,
}

impl BarSequence {
    /// Sorts by time and keeps the first bar of any repeated timestamp.
    pub fn new(mut bars: Vec<Bar>, granularity: u32) -> Self {
        bars.sort_by_key(|bar| bar.time);
        bars.dedup_by_key(|bar| bar.time);

        Self { bars, granularity }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn as_slice(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Close of the bar before `index`, or of `index` itself for the first bar.
    pub fn previous_close(&self, index: usize) -> Option<f64> {
        self.get(index.saturating_sub(1)).map(|bar| bar.close)
    }

    /// Bars inside the viewport, empty for an empty sequence.
    pub fn window(&self, viewport: &Viewport) -> &[Bar] {
        if self.bars.is_empty() {
            return &[];
        }

        let end = viewport.end.min(self.bars.len() - 1);
        let start = viewport.start.min(end);
        &self.bars[start..=end]
    }
}
