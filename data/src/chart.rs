pub mod bars;
pub mod grid;
pub mod kinetic;
pub mod mapper;
pub mod render;
pub mod tooltip;
pub mod viewport;

pub use bars::BarSequence;
pub use kinetic::KineticScroll;
pub use mapper::Mapper;
pub use render::{Overlay, Surface};
pub use tooltip::TooltipState;
pub use viewport::{PanOutcome, Viewport};

use crate::config::Config;

use iced_core::{Point, Size};
use std::time::{Duration, Instant};

/// Window scale applied per wheel line; scrolling up zooms in.
const ZOOM_STEP: f64 = 0.9;

/// Layers a host has to redraw after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct Invalidation {
    /// Bars, grid, volume and price marker.
    pub main: bool,
    /// Tooltip and crosshair.
    pub crosshair: bool,
}

impl Invalidation {
    pub const NONE: Self = Self {
        main: false,
        crosshair: false,
    };

    pub const ALL: Self = Self {
        main: true,
        crosshair: true,
    };

    pub const CROSSHAIR: Self = Self {
        main: false,
        crosshair: true,
    };

    fn main_if(changed: bool) -> Self {
        if changed { Self::ALL } else { Self::NONE }
    }

    fn crosshair_if(changed: bool) -> Self {
        if changed { Self::CROSSHAIR } else { Self::NONE }
    }

    pub fn is_empty(&self) -> bool {
        !self.main && !self.crosshair
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            main: self.main || other.main,
            crosshair: self.crosshair || other.crosshair,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub anchor_x: f32,
    last_x: f32,
    last_moved_at: Instant,
    /// px/ms over the latest movement.
    velocity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PanSession {
    #[default]
    Idle,
    Dragging(DragSession),
    KineticDecay(KineticScroll),
}

/// Everything one chart needs between frames: data, window, pan session and hover.
///
/// Handlers never draw; they report what became stale through [`Invalidation`].
#[derive(Debug, Clone)]
pub struct ChartState {
    config: Config,
    bars: BarSequence,
    viewport: Viewport,
    size: Size,
    session: PanSession,
    tooltip: TooltipState,
    hover: Option<Point>,
    last_price: Option<f64>,
}

impl ChartState {
    pub fn new(config: Config) -> Self {
        Self {
            config: config.sanitized(),
            bars: BarSequence::default(),
            viewport: Viewport::default(),
            size: Size::ZERO,
            session: PanSession::Idle,
            tooltip: TooltipState::hidden(),
            hover: None,
            last_price: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bars(&self) -> &BarSequence {
        &self.bars
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn session(&self) -> &PanSession {
        &self.session
    }

    pub fn tooltip(&self) -> &TooltipState {
        &self.tooltip
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    pub fn overlay(&self) -> Overlay {
        Overlay {
            tooltip: self.tooltip,
            last_price: self.last_price,
        }
    }

    /// Mapper for the current window and size, rebuilt on every call.
    pub fn mapper(&self) -> Option<Mapper> {
        Mapper::new(&self.bars, &self.viewport, self.size, self.config.padding)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.session, PanSession::Dragging(_))
    }

    pub fn is_decaying(&self) -> bool {
        matches!(self.session, PanSession::KineticDecay(_))
    }

    /// Tick period while kinetic decay is running.
    pub fn kinetic_interval(&self) -> Option<Duration> {
        match &self.session {
            PanSession::KineticDecay(scroll) => Some(scroll.interval()),
            _ => None,
        }
    }

    pub fn set_config(&mut self, config: Config) -> Invalidation {
        self.config = config.sanitized();
        self.refresh_tooltip();
        Invalidation::ALL
    }

    /// Replaces the sequence and shows its latest bars, dropping any pan in progress.
    pub fn load(&mut self, bars: BarSequence) -> Invalidation {
        self.bars = bars;
        self.viewport = Viewport::reset(self.bars.len(), self.config.visible_bars);
        self.session = PanSession::Idle;
        self.hover = None;
        self.tooltip = TooltipState::hidden();

        Invalidation::ALL
    }

    pub fn resize(&mut self, size: Size) -> Invalidation {
        if size == self.size {
            return Invalidation::NONE;
        }

        self.size = size;
        self.refresh_tooltip();
        Invalidation::ALL
    }

    /// Starts a drag; any kinetic decay in flight is dropped first.
    pub fn on_pointer_down(&mut self, position: Point, now: Instant) -> Invalidation {
        if self.is_decaying() {
            log::debug!("Kinetic scroll interrupted by a new drag");
        }

        self.session = PanSession::Dragging(DragSession {
            anchor_x: position.x,
            last_x: position.x,
            last_moved_at: now,
            velocity: 0.0,
        });
        self.hover = Some(position);

        Invalidation::crosshair_if(self.refresh_tooltip())
    }

    pub fn on_pointer_move(&mut self, position: Point, now: Instant) -> Invalidation {
        self.hover = Some(position);

        if !self.is_dragging() {
            return Invalidation::crosshair_if(self.refresh_tooltip());
        }
        let PanSession::Dragging(drag) = &mut self.session else {
            return Invalidation::NONE;
        };

        let delta = position.x - drag.last_x;
        if delta == 0.0 {
            return Invalidation::NONE;
        }

        let elapsed = now.saturating_duration_since(drag.last_moved_at).as_secs_f64() * 1_000.0;
        if elapsed > 0.0 {
            drag.velocity = f64::from(delta) / elapsed;
        }
        drag.last_x = position.x;
        drag.last_moved_at = now;

        let outcome =
            self.viewport
                .apply_pan_delta(f64::from(delta), self.plot_width(), self.bars.len());

        Invalidation::main_if(outcome.moved)
    }

    /// Ends a drag, handing its release velocity to kinetic decay when fast enough.
    pub fn on_pointer_up(&mut self, position: Point, now: Instant) -> Invalidation {
        self.hover = Some(position);

        if let PanSession::Dragging(drag) = self.session {
            let held = now.saturating_duration_since(drag.last_moved_at);
            let release_window = Duration::from_millis(self.config.kinetic.release_window_ms);

            let velocity = if held > release_window || self.bars.is_empty() {
                0.0
            } else {
                drag.velocity
            };

            self.session = match KineticScroll::start(velocity, &self.config.kinetic) {
                Some(scroll) => {
                    log::debug!("Kinetic scroll started at {velocity:.3} px/ms");
                    PanSession::KineticDecay(scroll)
                }
                None => PanSession::Idle,
            };
        }

        Invalidation::crosshair_if(self.refresh_tooltip())
    }

    /// Pointer left the canvas: a drag ends without momentum and the tooltip hides.
    pub fn on_pointer_leave(&mut self) -> Invalidation {
        if self.is_dragging() {
            self.session = PanSession::Idle;
        }
        self.hover = None;

        Invalidation::crosshair_if(self.refresh_tooltip())
    }

    /// Zooms around the pointer by `lines` wheel notches.
    pub fn on_wheel(&mut self, lines: f32, position: Point) -> Invalidation {
        if self.is_decaying() {
            self.session = PanSession::Idle;
        }
        self.hover = Some(position);

        let plot_width = self.plot_width();
        if plot_width <= 0.0 || !lines.is_finite() {
            return Invalidation::NONE;
        }

        let anchor = (f64::from(position.x) - f64::from(self.config.padding)) / plot_width;
        let factor = ZOOM_STEP.powf(f64::from(lines));

        let zoomed = self.viewport.zoom(factor, anchor, self.bars.len());
        let tooltip_changed = self.refresh_tooltip();

        Invalidation::main_if(zoomed).merge(Invalidation::crosshair_if(tooltip_changed))
    }

    /// Advances kinetic decay by one tick; returns to idle once it stops or pins.
    pub fn on_tick(&mut self) -> Invalidation {
        let PanSession::KineticDecay(scroll) = &mut self.session else {
            return Invalidation::NONE;
        };

        let Some(delta) = scroll.step() else {
            self.session = PanSession::Idle;
            return Invalidation::NONE;
        };
        let finished = scroll.is_finished();

        let outcome = self
            .viewport
            .apply_pan_delta(delta, self.plot_width(), self.bars.len());

        if outcome.pinned || finished {
            if outcome.pinned {
                log::debug!("Kinetic scroll pinned at bar {}", self.viewport.start);
            }
            self.session = PanSession::Idle;
        }

        let tooltip_changed = outcome.moved && self.refresh_tooltip();
        Invalidation::main_if(outcome.moved).merge(Invalidation::crosshair_if(tooltip_changed))
    }

    /// Shifts the window by whole bars; positive moves towards newer bars.
    pub fn pan_bars(&mut self, bars: isize) -> Invalidation {
        if !self.is_dragging() {
            self.session = PanSession::Idle;
        }

        let outcome = self.viewport.pan_bars(bars, self.bars.len());
        let tooltip_changed = outcome.moved && self.refresh_tooltip();

        Invalidation::main_if(outcome.moved).merge(Invalidation::crosshair_if(tooltip_changed))
    }

    pub fn reset_to_latest(&mut self) -> Invalidation {
        let viewport = Viewport::reset(self.bars.len(), self.config.visible_bars);
        self.session = PanSession::Idle;

        if viewport == self.viewport {
            return Invalidation::NONE;
        }

        self.viewport = viewport;
        self.refresh_tooltip();
        Invalidation::ALL
    }

    pub fn set_live_price(&mut self, price: Option<f64>) -> Invalidation {
        let price = price.filter(|price| price.is_finite());
        if price == self.last_price {
            return Invalidation::NONE;
        }

        self.last_price = price;
        Invalidation::ALL
    }

    /// Drops every pending interaction before the chart goes away.
    pub fn teardown(&mut self) {
        self.session = PanSession::Idle;
        self.hover = None;
        self.tooltip = TooltipState::hidden();
    }

    fn plot_width(&self) -> f64 {
        f64::from(self.size.width) - 2.0 * f64::from(self.config.padding)
    }

    /// Re-resolves the tooltip from the stored hover position; `true` if it changed.
    fn refresh_tooltip(&mut self) -> bool {
        let tooltip = match self.hover {
            Some(position) if !self.is_dragging() => {
                tooltip::resolve(&self.viewport, self.mapper().as_ref(), position)
            }
            _ => TooltipState::hidden(),
        };

        let changed = tooltip != self.tooltip;
        self.tooltip = tooltip;
        changed
    }
}
