use super::{BarSequence, Mapper};
use crate::config::timezone::{CalendarFields, UserTimezone, month_name};

const DAY_SECS: u64 = 86_400;
/// Widest visible span, in days, that still gets day labels.
const MAX_DAY_LABEL_SPAN: u64 = 30;
/// Widest visible span, in days, that still gets hour labels.
const MAX_HOUR_LABEL_SPAN: u64 = 2;
/// Hour labels only make sense below 15 minute bars.
const MAX_HOUR_LABEL_GRANULARITY: u32 = 900;

/// Calendar boundary a vertical gridline marks, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Year,
    Month,
    Day,
    Hour,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gridline {
    pub x: f32,
    pub label: String,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceLine {
    pub y: f32,
    pub label: String,
}

/// Date gridlines for the visible window, one per calendar boundary crossed.
///
/// Walks the plot pixel by pixel, resolving each column to its nearest bar. The first
/// column only seeds the comparison.
pub fn vertical(bars: &BarSequence, mapper: &Mapper, timezone: UserTimezone) -> Vec<Gridline> {
    let (Some(first), Some(last)) = (bars.get(mapper.start()), bars.get(mapper.end())) else {
        return vec![];
    };

    let span_days = last.time.saturating_sub(first.time).max(0).unsigned_abs().div_ceil(DAY_SECS);
    let show_days = span_days <= MAX_DAY_LABEL_SPAN;
    let show_hours =
        span_days <= MAX_HOUR_LABEL_SPAN && bars.granularity() < MAX_HOUR_LABEL_GRANULARITY;

    let columns = mapper.plot_width().floor().max(0.0) as usize;
    let mut previous: Option<CalendarFields> = None;
    let mut lines = vec![];

    for column in 0..columns {
        let x = mapper.left() + column as f32;

        let Some(fields) = bars
            .get(mapper.nearest_index(x))
            .and_then(|bar| timezone.calendar(bar.time))
        else {
            continue;
        };

        if let Some(prev) = previous.replace(fields) {
            let line = if fields.year != prev.year {
                Some((Tier::Year, fields.year.to_string()))
            } else if fields.month != prev.month {
                Some((Tier::Month, month_name(fields.month).to_string()))
            } else if show_days && fields.day != prev.day {
                Some((Tier::Day, fields.day.to_string()))
            } else if show_hours && fields.hour != prev.hour {
                Some((Tier::Hour, format!("{:02}:00", fields.hour)))
            } else {
                None
            };

            if let Some((tier, label)) = line {
                lines.push(Gridline { x, label, tier });
            }
        }
    }

    lines
}

/// Price rows every `step` pixels from the top of the plot to its bottom.
pub fn horizontal(mapper: &Mapper, step: f32) -> Vec<PriceLine> {
    if step.is_nan() || step <= 0.0 {
        return vec![];
    }

    let rows = ((mapper.bottom() - mapper.top()) / step).floor() as usize;

    (0..=rows)
        .map(|row| {
            let y = mapper.top() + row as f32 * step;

            PriceLine {
                y,
                label: format!("{:.2}", mapper.price_at(y)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::Viewport;
    use exchange::Bar;
    use iced_core::Size;

    // 2024-01-01T00:00:00Z
    const NEW_YEAR_2024: i64 = 1_704_067_200;
    const DAY: i64 = DAY_SECS as i64;

    fn bars_from(start: i64, step: i64, count: usize, granularity: u32) -> BarSequence {
        BarSequence::new(
            (0..count)
                .map(|i| Bar {
                    time: start + i as i64 * step,
                    open: 10.0,
                    high: 11.0 + i as f64,
                    low: 9.0,
                    close: 10.0,
                    volume: 1.0,
                })
                .collect(),
            granularity,
        )
    }

    fn grid(bars: &BarSequence) -> Vec<Gridline> {
        let viewport = Viewport::reset(bars.len(), None);
        let mapper = Mapper::new(bars, &viewport, Size::new(900.0, 400.0), 50.0).unwrap();
        vertical(bars, &mapper, UserTimezone::Utc)
    }

    fn tiers(lines: &[Gridline], tier: Tier) -> Vec<&str> {
        lines
            .iter()
            .filter(|line| line.tier == tier)
            .map(|line| line.label.as_str())
            .collect()
    }

    #[test]
    fn forty_day_span_has_no_day_labels() {
        // Dec 10 .. Jan 19
        let bars = bars_from(NEW_YEAR_2024 - 22 * DAY, DAY, 41, 86_400);
        let lines = grid(&bars);

        assert!(tiers(&lines, Tier::Day).is_empty());
        assert_eq!(tiers(&lines, Tier::Year), vec!["2024"]);
    }

    #[test]
    fn twenty_five_day_span_has_day_labels() {
        let bars = bars_from(NEW_YEAR_2024 + 3 * DAY, DAY, 26, 86_400);
        let lines = grid(&bars);

        // the first column seeds with Jan 4
        let days = tiers(&lines, Tier::Day);
        assert_eq!(days.first(), Some(&"5"));
        assert_eq!(days.len(), 25);
        assert!(tiers(&lines, Tier::Hour).is_empty());
    }

    #[test]
    fn coarsest_changed_tier_wins() {
        // Nov 1 2023 .. Feb 28 2024, daily
        let start = NEW_YEAR_2024 - 61 * DAY;
        let bars = bars_from(start, DAY, 120, 86_400);
        let lines = grid(&bars);

        insta::assert_debug_snapshot!(
            lines.iter().map(|l| (l.tier, l.label.as_str())).collect::<Vec<_>>(),
            @r#"
        [
            (
                Month,
                "Dec",
            ),
            (
                Year,
                "2024",
            ),
            (
                Month,
                "Feb",
            ),
        ]
        "#
        );
    }

    #[test]
    fn hour_labels_need_short_span_and_fine_bars() {
        let five_minute = bars_from(NEW_YEAR_2024, 300, 12 * 12, 300);
        let hours = tiers(&grid(&five_minute), Tier::Hour).len();
        assert_eq!(hours, 11);

        let fifteen_minute = bars_from(NEW_YEAR_2024, 900, 4 * 12, 900);
        assert!(tiers(&grid(&fifteen_minute), Tier::Hour).is_empty());
    }

    #[test]
    fn hour_labels_are_zero_padded() {
        let bars = bars_from(NEW_YEAR_2024, 60, 3 * 60, 60);
        let lines = grid(&bars);
        let labels = tiers(&lines, Tier::Hour);

        assert_eq!(labels, vec!["01:00", "02:00"]);
    }

    #[test]
    fn price_rows_cover_the_plot() {
        let bars = bars_from(NEW_YEAR_2024, DAY, 2, 86_400);
        let viewport = Viewport::reset(bars.len(), None);
        // prices 9..12 over 300px
        let mapper = Mapper::new(&bars, &viewport, Size::new(400.0, 400.0), 50.0).unwrap();

        let rows = horizontal(&mapper, 30.0);

        assert_eq!(rows.len(), 11);
        assert_eq!(rows[0].y, 50.0);
        assert_eq!(rows[0].label, "12.00");
        assert_eq!(rows[10].y, 350.0);
        assert_eq!(rows[10].label, "9.00");
        assert!(horizontal(&mapper, 0.0).is_empty());
    }
}
