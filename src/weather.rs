//! Nearest-time join of stop events to weather observations.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::pipeline::types::{StopEvent, WeatherObservation};
use crate::pipeline::utility::{minutes_between, pearson};

/// A stop event paired with the closest weather reading, if any exists.
#[derive(Debug, Clone, Copy)]
pub struct JoinedRow<'a> {
    pub event: &'a StopEvent,
    pub observation: Option<&'a WeatherObservation>,
    /// Absolute distance between `stop_time` and `reference_time`.
    pub distance_minutes: Option<f64>,
}

#[derive(Debug, Default)]
pub struct WeatherCorrelator;

impl WeatherCorrelator {
    /// Matches each event carrying a `stop_time` to the observation with the
    /// smallest absolute time distance, looking both backwards and forwards.
    ///
    /// Events without a `stop_time` are left out. When two observations are
    /// equally close the earlier one wins. With no observations at all every
    /// event is still returned, unmatched.
    #[tracing::instrument(skip_all, fields(events = events.len(), observations = observations.len()))]
    pub fn join<'a>(
        &self,
        events: &'a [StopEvent],
        observations: &'a [WeatherObservation],
    ) -> Vec<JoinedRow<'a>> {
        join_readings(events, observations.iter().collect())
    }

    /// Pearson correlation between `delay_minutes` and `element`.
    ///
    /// Only observations that report `element` take part in the join. Returns
    /// `None` when fewer than two rows carry both values or either side is
    /// constant.
    #[tracing::instrument(skip(self, events, observations))]
    pub fn correlate(
        &self,
        events: &[StopEvent],
        observations: &[WeatherObservation],
        element: &str,
    ) -> Option<f64> {
        let carrying: Vec<&WeatherObservation> = observations
            .iter()
            .filter(|o| o.value(element).is_some())
            .collect();

        let pairs: Vec<(f64, f64)> = join_readings(events, carrying)
            .iter()
            .filter_map(|row| Some((row.event.delay_minutes?, row.observation?.value(element)?)))
            .collect();

        let coefficient = pearson(&pairs);
        info!(element, samples = pairs.len(), ?coefficient, "Delay/weather correlation");
        coefficient
    }

    /// Runs [`correlate`](Self::correlate) independently for each element.
    pub fn correlate_elements(
        &self,
        events: &[StopEvent],
        observations: &[WeatherObservation],
        elements: &[String],
    ) -> BTreeMap<String, Option<f64>> {
        elements
            .iter()
            .map(|element| (element.clone(), self.correlate(events, observations, element)))
            .collect()
    }
}

fn join_readings<'a>(
    events: &'a [StopEvent],
    mut readings: Vec<&'a WeatherObservation>,
) -> Vec<JoinedRow<'a>> {
    let mut timed: Vec<&StopEvent> = events.iter().filter(|e| e.stop_time.is_some()).collect();
    timed.sort_by_key(|e| e.stop_time);
    readings.sort_by_key(|o| o.reference_time);

    if readings.is_empty() {
        warn!("No weather observations to join against");
    }

    let joined: Vec<_> = timed
        .into_iter()
        .filter_map(|event| {
            let at = event.stop_time?;
            let idx = readings.partition_point(|o| o.reference_time < at);

            let before = idx.checked_sub(1).map(|i| readings[i]);
            let after = readings.get(idx).copied();

            let nearest = match (before, after) {
                (Some(b), Some(a)) => {
                    let back = minutes_between(b.reference_time, at);
                    let ahead = minutes_between(at, a.reference_time);
                    Some(if ahead < back { a } else { b })
                }
                (b, a) => b.or(a),
            };

            Some(JoinedRow {
                event,
                observation: nearest,
                distance_minutes: nearest
                    .map(|o| minutes_between(o.reference_time, at).abs()),
            })
        })
        .collect();

    debug!(joined = joined.len(), "Weather join complete");
    joined
}
