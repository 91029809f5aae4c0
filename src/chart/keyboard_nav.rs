//! Keyboard-driven chart panning.
//!
//! ## Key bindings
//!
//! | Key            | Action                                  |
//! |----------------|-----------------------------------------|
//! | `←`            | Pan 10 bars towards history             |
//! | `→`            | Pan 10 bars towards the present         |
//! | `Shift + ←/→`  | Pan 50 bars                             |
//! | `PageUp`       | Pan one full window towards history     |
//! | `PageDown`     | Pan one full window towards the present |
//! | `Home` / `End` | Jump back to the latest bars            |
//!
//! `←` moves the window the same way as a rightward drag.

use super::Message;
use data::ChartState;
use iced::keyboard::{self, key::Named};

const BARS_SMALL: isize = 10;
const BARS_LARGE: isize = 50;

/// Returns `None` for anything that is not a navigation key.
pub fn handle(event: &keyboard::Event, state: &ChartState) -> Option<Message> {
    let keyboard::Event::KeyPressed { key, modifiers, .. } = event else {
        return None;
    };

    let bars = if modifiers.shift() {
        BARS_LARGE
    } else {
        BARS_SMALL
    };
    let page = isize::try_from(state.viewport().visible_count()).unwrap_or(isize::MAX);

    let message = match key.as_ref() {
        keyboard::Key::Named(Named::ArrowLeft) => Message::PanBars(-bars),
        keyboard::Key::Named(Named::ArrowRight) => Message::PanBars(bars),
        keyboard::Key::Named(Named::PageUp) => Message::PanBars(-page),
        keyboard::Key::Named(Named::PageDown) => Message::PanBars(page),
        keyboard::Key::Named(Named::Home | Named::End) => Message::ResetToLatest,
        _ => return None,
    };

    Some(message)
}
