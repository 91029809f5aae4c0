use crate::config;

use std::time::Duration;

/// Momentum left over after a drag, decaying geometrically each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KineticScroll {
    /// px/ms, same sign convention as drag deltas.
    velocity: f64,
    friction: f64,
    stop_velocity: f64,
    interval: Duration,
}

impl KineticScroll {
    /// Starts decay from a release velocity, or `None` when the release is too slow.
    pub fn start(velocity: f64, config: &config::Kinetic) -> Option<Self> {
        let config = config.sanitized();

        if !velocity.is_finite()
            || velocity.abs() < config.min_release_velocity
            || velocity.abs() < config.stop_velocity
        {
            return None;
        }

        Some(Self {
            velocity,
            friction: config.friction,
            stop_velocity: config.stop_velocity,
            interval: Duration::from_millis(config.tick_ms),
        })
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_finished(&self) -> bool {
        !self.velocity.is_finite() || self.velocity.abs() < self.stop_velocity
    }

    /// Pixel delta for this tick, then applies friction; `None` once decay has ended.
    pub fn step(&mut self) -> Option<f64> {
        if self.is_finished() {
            self.velocity = 0.0;
            return None;
        }

        let delta = self.velocity * self.interval.as_millis() as f64;
        self.velocity *= self.friction;

        Some(delta)
    }

    /// Upper bound on the deltas [`step`](Self::step) will still yield.
    pub fn max_ticks(&self) -> u64 {
        if self.is_finished() {
            return 0;
        }

        let ticks = (self.stop_velocity / self.velocity.abs()).ln() / self.friction.ln();
        ticks.max(0.0).ceil() as u64 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinetic(friction: f64) -> config::Kinetic {
        config::Kinetic {
            friction,
            ..config::Kinetic::default()
        }
    }

    #[test]
    fn slow_release_does_not_start_decay() {
        let config = config::Kinetic::default();

        assert!(KineticScroll::start(0.05, &config).is_none());
        assert!(KineticScroll::start(-0.05, &config).is_none());
        assert!(KineticScroll::start(f64::NAN, &config).is_none());
        assert!(KineticScroll::start(1.0, &config).is_some());
    }

    #[test]
    fn deltas_shrink_by_friction() {
        let mut scroll = KineticScroll::start(2.0, &kinetic(0.5)).unwrap();

        // 5ms ticks
        assert_eq!(scroll.step(), Some(10.0));
        assert_eq!(scroll.step(), Some(5.0));
        assert_eq!(scroll.velocity(), 0.5);
    }

    #[test]
    fn out_of_range_friction_still_terminates() {
        let mut scroll = KineticScroll::start(5.0, &kinetic(1.0)).unwrap();

        let bound = scroll.max_ticks();
        let mut ticks = 0;
        while scroll.step().is_some() {
            ticks += 1;
            assert!(ticks <= bound);
        }
    }

    proptest! {
        #[test]
        fn decay_terminates_within_bound(
            velocity in prop_oneof![-50.0..-0.1f64, 0.1..50.0f64],
            friction in 0.01..0.999f64,
        ) {
            let mut scroll = KineticScroll::start(velocity, &kinetic(friction)).unwrap();
            let bound = scroll.max_ticks();

            let mut ticks = 0u64;
            while let Some(delta) = scroll.step() {
                prop_assert_eq!(delta.signum(), velocity.signum());
                ticks += 1;
                prop_assert!(ticks <= bound, "{} ticks exceeded bound {}", ticks, bound);
            }

            prop_assert_eq!(scroll.velocity(), 0.0);
        }
    }
}
