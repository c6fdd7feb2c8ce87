//! Temporal feature engineering over per-stop telemetry.
//!
//! Rows move through [`StopEventNormalizer`], [`JourneySequencer`] and
//! [`DelayDynamicsCalculator`] in that order. The enriched rows then feed
//! [`StopPairAggregator`] or the weather correlator.

pub mod aggregate;
pub mod dynamics;
pub mod normalize;
pub mod sequence;
pub mod types;
pub mod utility;

pub use aggregate::{StopPairAggregator, TimeWindow};
pub use dynamics::DelayDynamicsCalculator;
pub use normalize::{StopEventNormalizer, TimeSide};
pub use sequence::JourneySequencer;
pub use types::{StopEvent, StopPairStat, Timestamp, WeatherObservation};

/// Runs normalization, sequencing and delay dynamics over raw rows.
#[tracing::instrument(skip_all, fields(rows = events.len()))]
pub fn enrich(normalizer: &StopEventNormalizer, events: Vec<StopEvent>) -> Vec<StopEvent> {
    let events = normalizer.normalize(events);
    let events = JourneySequencer.sequence(events);
    DelayDynamicsCalculator.apply(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};

    #[test]
    fn test_enrich_end_to_end() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 14).unwrap();
        let events = vec![
            StopEvent::new("J1", date, 2, "B")
                .with_scheduled(Some(ts("08:05:00")), Some(ts("08:05:00")))
                .with_actual(Some(ts("08:07:00")), Some(ts("08:08:00"))),
            StopEvent::new("J1", date, 1, "A")
                .with_scheduled(None, Some(ts("08:00:00")))
                .with_actual(None, Some(ts("08:01:00"))),
            StopEvent::new("J1", date, 3, "C")
                .with_scheduled(Some(ts("08:10:00")), None)
                .with_actual(Some(ts("08:12:00")), None),
        ];

        let out = enrich(&StopEventNormalizer::default(), events);

        assert_eq!(out[0].stop_name, "A");
        assert_eq!(out[0].delay_minutes, Some(1.0));
        assert_eq!(out[0].time_to_next_stop_minutes, Some(7.0));
        assert_eq!(out[0].delay_change, Some(2.0));
        assert_eq!(out[1].delay_change, Some(-1.0));
        assert_eq!(out[2].delay_change, None);

        let stats = StopPairAggregator.aggregate(&out);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].scheduled_time_avg, Some(5.0));
    }

    fn ts(time: &str) -> Timestamp {
        DateTime::parse_from_rfc3339(&format!("2025-02-14T{time}+01:00")).unwrap()
    }
}
