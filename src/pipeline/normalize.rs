//! Merges arrival and departure fields into one timestamp per stop.
//!
//! Arrival and departure carry the same value except at journey endpoints:
//! the first call has no arrival and the last call has no departure. The
//! normalizer picks one per event by walking a precedence list.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{StopEvent, Timestamp};
use super::utility::minutes_between;

/// Which side of a stop call a timestamp was recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSide {
    Departure,
    Arrival,
}

impl TimeSide {
    fn actual(self, event: &StopEvent) -> Option<Timestamp> {
        match self {
            TimeSide::Departure => event.actual_departure,
            TimeSide::Arrival => event.actual_arrival,
        }
    }

    fn scheduled(self, event: &StopEvent) -> Option<Timestamp> {
        match self {
            TimeSide::Departure => event.scheduled_departure,
            TimeSide::Arrival => event.scheduled_arrival,
        }
    }
}

/// Default precedence: departure first, then arrival.
pub const DEFAULT_PRECEDENCE: [TimeSide; 2] = [TimeSide::Departure, TimeSide::Arrival];

/// Returns the first `Some` produced by `pick` over `precedence`.
pub fn coalesce<T, F>(precedence: &[TimeSide], pick: F) -> Option<T>
where
    F: Fn(TimeSide) -> Option<T>,
{
    precedence.iter().find_map(|&side| pick(side))
}

pub struct StopEventNormalizer {
    precedence: Vec<TimeSide>,
}

impl Default for StopEventNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PRECEDENCE.to_vec())
    }
}

impl StopEventNormalizer {
    pub fn new(precedence: Vec<TimeSide>) -> Self {
        Self { precedence }
    }

    /// Fills `stop_time`, `aimed_stop_time` and `delay_minutes` on every row.
    /// No rows are dropped.
    #[tracing::instrument(skip_all, fields(rows = events.len()))]
    pub fn normalize(&self, mut events: Vec<StopEvent>) -> Vec<StopEvent> {
        let mut without_delay = 0usize;

        for event in &mut events {
            let current: &StopEvent = event;
            let stop_time = coalesce(&self.precedence, |side| side.actual(current));
            let aimed_stop_time = coalesce(&self.precedence, |side| side.scheduled(current));

            event.stop_time = stop_time;
            event.aimed_stop_time = aimed_stop_time;
            event.delay_minutes = match (aimed_stop_time, stop_time) {
                (Some(aimed), Some(actual)) => Some(minutes_between(aimed, actual)),
                _ => None,
            };

            if event.delay_minutes.is_none() {
                without_delay += 1;
            }
        }

        debug!(without_delay, "Stop events normalized");
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};

    #[test]
    fn test_departure_preferred_over_arrival() {
        let event = event()
            .with_scheduled(Some(ts("10:00:00")), Some(ts("10:01:00")))
            .with_actual(Some(ts("10:02:00")), Some(ts("10:03:30")));

        let out = StopEventNormalizer::default().normalize(vec![event]);

        assert_eq!(out[0].stop_time, Some(ts("10:03:30")));
        assert_eq!(out[0].aimed_stop_time, Some(ts("10:01:00")));
        assert!((out[0].delay_minutes.unwrap() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_falls_back_to_arrival_at_last_stop() {
        let event = event()
            .with_scheduled(Some(ts("10:00:00")), None)
            .with_actual(Some(ts("09:59:00")), None);

        let out = StopEventNormalizer::default().normalize(vec![event]);

        assert_eq!(out[0].stop_time, Some(ts("09:59:00")));
        assert!((out[0].delay_minutes.unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_delay_undefined_without_actual_time() {
        let event = event().with_scheduled(None, Some(ts("10:00:00")));

        let out = StopEventNormalizer::default().normalize(vec![event.clone(), event]);

        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.stop_time.is_none()));
        assert!(out.iter().all(|e| e.delay_minutes.is_none()));
        assert_eq!(out[0].aimed_stop_time, Some(ts("10:00:00")));
    }

    #[test]
    fn test_custom_precedence() {
        let event = event().with_actual(Some(ts("10:02:00")), Some(ts("10:03:00")));

        let out = StopEventNormalizer::new(vec![TimeSide::Arrival, TimeSide::Departure])
            .normalize(vec![event]);

        assert_eq!(out[0].stop_time, Some(ts("10:02:00")));
    }

    #[test]
    fn test_coalesce_empty_precedence() {
        assert_eq!(coalesce::<i32, _>(&[], |_| Some(1)), None);
    }

    // Helper functions for tests
    fn event() -> StopEvent {
        StopEvent::new("J1", NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(), 1, "A")
    }

    fn ts(time: &str) -> Timestamp {
        DateTime::parse_from_rfc3339(&format!("2025-02-14T{time}+01:00")).unwrap()
    }
}
