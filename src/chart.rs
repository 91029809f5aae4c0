pub mod keyboard_nav;
mod surface;

use data::chart::{BarSequence, ChartState, Invalidation, render};
use data::Config;
use surface::FrameSurface;

use iced::widget::canvas::{self, Cache};
use iced::{Element, Event, Length, Point, Rectangle, Renderer, Size, Theme, mouse};
use std::time::Instant;

/// Wheel pixels that count as one notch.
const PIXELS_PER_LINE: f32 = 60.0;

#[derive(Debug, Clone, Copy)]
pub enum Message {
    /// Canvas input, tagged with the canvas size it was measured against.
    Input(Size, Input),
    PanBars(isize),
    ResetToLatest,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input {
    Resized,
    PointerDown(Point, Instant),
    PointerMoved(Point, Instant),
    PointerUp(Point, Instant),
    PointerLeft,
    Wheel(f32, Point),
}

/// Price chart canvas: engine state plus one cache per layer.
pub struct PriceChart {
    state: ChartState,
    main_cache: Cache,
    crosshair_cache: Cache,
}

impl PriceChart {
    pub fn new(config: Config) -> Self {
        Self {
            state: ChartState::new(config),
            main_cache: Cache::default(),
            crosshair_cache: Cache::default(),
        }
    }

    pub fn state(&self) -> &ChartState {
        &self.state
    }

    pub fn update(&mut self, message: Message) {
        let invalidation = match message {
            Message::Input(size, input) => {
                let resized = self.state.resize(size);

                let handled = match input {
                    Input::Resized => Invalidation::NONE,
                    Input::PointerDown(position, at) => self.state.on_pointer_down(position, at),
                    Input::PointerMoved(position, at) => self.state.on_pointer_move(position, at),
                    Input::PointerUp(position, at) => self.state.on_pointer_up(position, at),
                    Input::PointerLeft => self.state.on_pointer_leave(),
                    Input::Wheel(lines, position) => self.state.on_wheel(lines, position),
                };

                resized.merge(handled)
            }
            Message::PanBars(bars) => self.state.pan_bars(bars),
            Message::ResetToLatest => self.state.reset_to_latest(),
        };

        self.invalidate(invalidation);
    }

    pub fn load(&mut self, bars: BarSequence) {
        let invalidation = self.state.load(bars);
        self.invalidate(invalidation);
    }

    pub fn set_live_price(&mut self, price: Option<f64>) {
        let invalidation = self.state.set_live_price(price);
        self.invalidate(invalidation);
    }

    pub fn tick(&mut self) {
        let invalidation = self.state.on_tick();
        self.invalidate(invalidation);
    }

    pub fn teardown(&mut self) {
        self.state.teardown();
        self.invalidate(Invalidation::ALL);
    }

    fn invalidate(&mut self, invalidation: Invalidation) {
        if invalidation.main {
            self.main_cache.clear();
        }
        if invalidation.main || invalidation.crosshair {
            self.crosshair_cache.clear();
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        canvas::Canvas::new(self)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}

impl PriceChart {
    /// Maps a canvas event to chart input; the flag asks to capture the event.
    fn input_for(
        &self,
        event: &Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<(Input, bool)> {
        let now = Instant::now();
        let inside = cursor.position_in(bounds);
        let engaged = self.state.is_dragging() || self.state.tooltip().visible;

        let Event::Mouse(mouse_event) = event else {
            return None;
        };

        match mouse_event {
            mouse::Event::ButtonPressed(mouse::Button::Left) => {
                Some((Input::PointerDown(inside?, now), true))
            }
            mouse::Event::ButtonReleased(mouse::Button::Left) if self.state.is_dragging() => {
                let position = cursor
                    .position()
                    .map(|p| Point::new(p.x - bounds.x, p.y - bounds.y))?;
                Some((Input::PointerUp(position, now), true))
            }
            mouse::Event::CursorMoved { .. } => match inside {
                Some(position) => Some((Input::PointerMoved(position, now), false)),
                None if engaged => Some((Input::PointerLeft, false)),
                None => None,
            },
            mouse::Event::CursorLeft if engaged => Some((Input::PointerLeft, false)),
            mouse::Event::WheelScrolled { delta } => {
                let lines = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => *y,
                    mouse::ScrollDelta::Pixels { y, .. } => *y / PIXELS_PER_LINE,
                };

                Some((Input::Wheel(lines, inside?), true))
            }
            _ => None,
        }
    }
}

impl canvas::Program<Message> for PriceChart {
    type State = ();

    fn update(
        &self,
        _state: &mut Self::State,
        event: &Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<canvas::Action<Message>> {
        let size = bounds.size();

        match self.input_for(event, bounds, cursor) {
            Some((input, capture)) => {
                let action = canvas::Action::publish(Message::Input(size, input));
                Some(if capture { action.and_capture() } else { action })
            }
            None if size != self.state.size() => {
                Some(canvas::Action::publish(Message::Input(size, Input::Resized)))
            }
            None => None,
        }
    }

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let state = &self.state;

        let main = self.main_cache.draw(renderer, bounds.size(), |frame| {
            render::render_main(
                &mut FrameSurface::new(frame),
                state.viewport(),
                state.bars(),
                state.config(),
                state.last_price(),
            );
        });

        let crosshair = self.crosshair_cache.draw(renderer, bounds.size(), |frame| {
            render::render_overlay(
                &mut FrameSurface::new(frame),
                state.viewport(),
                state.bars(),
                state.config(),
                state.tooltip(),
            );
        });

        vec![main, crosshair]
    }

    fn mouse_interaction(
        &self,
        _state: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if self.state.is_dragging() {
            mouse::Interaction::Grabbing
        } else if cursor.is_over(bounds) {
            mouse::Interaction::Crosshair
        } else {
            mouse::Interaction::default()
        }
    }
}
