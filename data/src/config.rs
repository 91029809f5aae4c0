use iced_core::Color;
use serde::{Deserialize, Serialize};

use std::{fs, io};

pub mod timezone;

use timezone::UserTimezone;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads `config.json` from the data directory; a missing file yields the defaults.
pub fn load() -> Result<Config, Error> {
    let path = crate::data_path(Some(CONFIG_FILE));

    match fs::read_to_string(&path) {
        Ok(contents) => {
            let config = Config::from_json(&contents)?;
            log::info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e.into()),
    }
}

/// Look and feel of the chart, plus interaction tuning.
///
/// Every field has a default, so a partial document only overrides what it names.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub line_width: f32,
    #[serde(with = "hex_color")]
    pub line_color: Color,
    #[serde(with = "hex_color")]
    pub fill_color: Color,
    #[serde(with = "hex_color")]
    pub background: Color,
    /// Space around the plot; the right-hand padding doubles as the price gutter.
    pub padding: f32,
    /// Bars shown after a load; all of them when `null`.
    pub visible_bars: Option<usize>,
    pub timezone: UserTimezone,
    pub grid: Grid,
    pub tooltip: Tooltip,
    pub volume: Volume,
    pub price_arrow: PriceArrow,
    pub kinetic: Kinetic,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            line_width: 3.0,
            line_color: rgb(0x3D, 0xA5, 0xED),
            fill_color: rgb(0xEA, 0xF5, 0xFD),
            background: Color::WHITE,
            padding: 50.0,
            visible_bars: Some(120),
            timezone: UserTimezone::default(),
            grid: Grid::default(),
            tooltip: Tooltip::default(),
            volume: Volume::default(),
            price_arrow: PriceArrow::default(),
            kinetic: Kinetic::default(),
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Clamps values that would break layout or keep kinetic decay from terminating.
    pub fn sanitized(mut self) -> Self {
        let defaults = Config::default();

        self.line_width = non_negative(self.line_width, defaults.line_width);
        self.padding = non_negative(self.padding, defaults.padding);
        self.visible_bars = self.visible_bars.filter(|bars| *bars > 0);

        self.grid.line_width = non_negative(self.grid.line_width, defaults.grid.line_width);
        self.grid.font_size = positive(self.grid.font_size, defaults.grid.font_size);
        self.grid.price_step = positive(self.grid.price_step, defaults.grid.price_step);

        self.tooltip.padding = non_negative(self.tooltip.padding, defaults.tooltip.padding);
        self.tooltip.radius = non_negative(self.tooltip.radius, defaults.tooltip.radius);
        self.tooltip.font_size = positive(self.tooltip.font_size, defaults.tooltip.font_size);

        self.volume.spacing = non_negative(self.volume.spacing, defaults.volume.spacing);
        self.volume.height = non_negative(self.volume.height, defaults.volume.height);

        self.kinetic = self.kinetic.sanitized();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Grid {
    pub line_width: f32,
    #[serde(with = "hex_color")]
    pub line_color: Color,
    #[serde(with = "hex_color")]
    pub year_color: Color,
    #[serde(with = "hex_color")]
    pub month_color: Color,
    #[serde(with = "hex_color")]
    pub day_color: Color,
    #[serde(with = "hex_color")]
    pub hour_color: Color,
    pub font_size: f32,
    /// Vertical distance between price rows, in pixels.
    pub price_step: f32,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            line_width: 0.3,
            line_color: rgb(0xA9, 0xA9, 0xA9),
            year_color: rgb(0xFF, 0x00, 0x00),
            month_color: rgb(0x00, 0x80, 0x00),
            day_color: rgb(0x00, 0x00, 0xFF),
            hour_color: rgb(0xA9, 0xA9, 0xA9),
            font_size: 12.0,
            price_step: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Tooltip {
    #[serde(with = "hex_color")]
    pub background: Color,
    #[serde(with = "hex_color")]
    pub text_color: Color,
    pub padding: f32,
    pub radius: f32,
    pub font_size: f32,
    #[serde(with = "hex_color")]
    pub up_color: Color,
    #[serde(with = "hex_color")]
    pub down_color: Color,
    #[serde(with = "hex_color")]
    pub crosshair_color: Color,
}

impl Default for Tooltip {
    fn default() -> Self {
        Self {
            background: Color::from_rgba8(0, 0, 0, 0.5),
            text_color: Color::WHITE,
            padding: 4.0,
            radius: 4.0,
            font_size: 12.0,
            up_color: rgb(0x4C, 0xAF, 0x50),
            down_color: rgb(0xFF, 0x52, 0x52),
            crosshair_color: Color::from_rgba8(0, 0, 0, 0.3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Volume {
    #[serde(with = "hex_color")]
    pub up_color: Color,
    #[serde(with = "hex_color")]
    pub down_color: Color,
    /// Gap between neighbouring volume bars.
    pub spacing: f32,
    /// Height of the volume strip at the bottom of the plot.
    pub height: f32,
    #[serde(with = "hex_color")]
    pub label_color: Color,
}

impl Default for Volume {
    fn default() -> Self {
        Self {
            up_color: Color::from_rgba8(165, 214, 255, 0.8),
            down_color: Color::from_rgba8(255, 158, 158, 0.8),
            spacing: 1.0,
            height: 100.0,
            label_color: rgb(0x66, 0x66, 0x66),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PriceArrow {
    #[serde(with = "hex_color")]
    pub fill_color: Color,
    #[serde(with = "hex_color")]
    pub text_color: Color,
}

impl Default for PriceArrow {
    fn default() -> Self {
        Self {
            fill_color: rgb(0x3D, 0xA5, 0xED),
            text_color: Color::WHITE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Kinetic {
    /// Velocity multiplier applied every tick.
    pub friction: f64,
    /// Decay ends below this speed, px/ms.
    pub stop_velocity: f64,
    /// Releases slower than this do not start decay, px/ms.
    pub min_release_velocity: f64,
    pub tick_ms: u64,
    /// A pointer resting longer than this before release carries no velocity.
    pub release_window_ms: u64,
}

impl Default for Kinetic {
    fn default() -> Self {
        Self {
            friction: 0.97,
            stop_velocity: 0.02,
            min_release_velocity: 0.1,
            tick_ms: 5,
            release_window_ms: 100,
        }
    }
}

impl Kinetic {
    pub const MIN_FRICTION: f64 = 0.01;
    pub const MAX_FRICTION: f64 = 0.999;

    pub fn sanitized(self) -> Self {
        let defaults = Kinetic::default();

        let friction = if self.friction.is_finite() {
            self.friction.clamp(Self::MIN_FRICTION, Self::MAX_FRICTION)
        } else {
            defaults.friction
        };

        let stop_velocity = if self.stop_velocity.is_finite() && self.stop_velocity > 0.0 {
            self.stop_velocity
        } else {
            defaults.stop_velocity
        };

        let min_release_velocity =
            if self.min_release_velocity.is_finite() && self.min_release_velocity >= 0.0 {
                self.min_release_velocity
            } else {
                defaults.min_release_velocity
            };

        Self {
            friction,
            stop_velocity,
            min_release_velocity,
            tick_ms: self.tick_ms.max(1),
            release_window_ms: self.release_window_ms,
        }
    }
}

fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::from_rgb8(r, g, b)
}

fn non_negative(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        fallback
    }
}

fn positive(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

/// `#RRGGBB` / `#RRGGBBAA` colour strings.
pub mod hex_color {
    use iced_core::Color;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(hex: &str) -> Option<Color> {
        let digits = hex.strip_prefix('#')?;
        if !digits.is_ascii() {
            return None;
        }

        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();

        match digits.len() {
            6 => Some(Color::from_rgb8(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Color::from_rgba8(
                channel(0)?,
                channel(2)?,
                channel(4)?,
                f32::from(channel(6)?) / 255.0,
            )),
            _ => None,
        }
    }

    pub fn format(color: &Color) -> String {
        let [r, g, b, a] = color.into_rgba8();

        if a == u8::MAX {
            format!("#{r:02X}{g:02X}{b:02X}")
        } else {
            format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }

    pub fn serialize<S>(color: &Color, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(color))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Color, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        parse(&hex).ok_or_else(|| {
            serde::de::Error::custom(format!("Invalid colour {hex:?}, expected #RRGGBB[AA]"))
        })
    }
}
