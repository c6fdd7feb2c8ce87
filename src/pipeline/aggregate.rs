use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::types::{StopEvent, StopPairStat};
use super::utility::{max, mean, sample_stddev};
use crate::error::{PipelineError, Result};

const SECONDS_PER_DAY: i64 = 86_400;

/// A time-of-day band `target ± window_minutes`.
///
/// Bands that reach past midnight wrap around to the other side of the day,
/// so `23:58 ± 5 min` covers 23:53..=00:03.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub target: NaiveTime,
    pub window_minutes: u32,
}

impl TimeWindow {
    pub fn around(target: NaiveTime, window_minutes: u32) -> Result<Self> {
        if i64::from(window_minutes) * 60 > SECONDS_PER_DAY {
            return Err(PipelineError::Config(format!(
                "a {window_minutes} minute window is longer than a day"
            )));
        }
        Ok(Self {
            target,
            window_minutes,
        })
    }

    /// Whether `time` lies within the band, measured on the 24h clock.
    pub fn contains(&self, time: NaiveTime) -> bool {
        let diff = (i64::from(time.num_seconds_from_midnight())
            - i64::from(self.target.num_seconds_from_midnight()))
        .abs();
        let circular = diff.min(SECONDS_PER_DAY - diff);
        circular <= i64::from(self.window_minutes) * 60
    }
}

#[derive(Default)]
struct PairSeries {
    travel: Vec<f64>,
    scheduled: Vec<f64>,
    delay: Vec<f64>,
    delay_change: Vec<f64>,
}

impl PairSeries {
    fn push(&mut self, event: &StopEvent) {
        self.travel.extend(event.time_to_next_stop_minutes);
        self.scheduled.extend(event.aimed_time_to_next_stop_minutes);
        self.delay.extend(event.delay_minutes);
        self.delay_change.extend(event.delay_change);
    }

    fn into_stat(self, stop_name: String, next_stop_name: String) -> StopPairStat {
        let (travel_time_avg, travel_time_std) = avg_std(&self.travel);
        let (scheduled_time_avg, scheduled_time_std) = avg_std(&self.scheduled);
        let (delay_avg, delay_std) = avg_std(&self.delay);

        StopPairStat {
            stop_name,
            next_stop_name,
            travel_time_avg,
            travel_time_std,
            scheduled_time_avg,
            scheduled_time_std,
            delay_avg,
            delay_std,
            delay_change_avg: mean(&self.delay_change),
            delay_change_max: max(&self.delay_change),
            count: self.travel.len(),
        }
    }
}

fn avg_std(values: &[f64]) -> (Option<f64>, Option<f64>) {
    let avg = mean(values);
    (avg, avg.and_then(|m| sample_stddev(values, m)))
}

/// Groups sequenced rows into per-segment statistics.
#[derive(Debug, Default)]
pub struct StopPairAggregator;

impl StopPairAggregator {
    /// Aggregates every row that has a successor by `(stop, next stop)`.
    ///
    /// `count` is the number of rows with a defined travel time; means and
    /// deviations use only the rows where that particular value is defined.
    /// Output is ordered by stop name, then next stop name.
    #[tracing::instrument(skip_all, fields(rows = events.len()))]
    pub fn aggregate(&self, events: &[StopEvent]) -> Vec<StopPairStat> {
        aggregate_rows(events.iter())
    }

    /// Restricts the input to rows whose scheduled time of day falls in
    /// `window`, aggregates, keeps pairs with `count > min_support` and sorts
    /// them by `delay_change_avg` ascending.
    #[tracing::instrument(skip_all, fields(rows = events.len(), window_target = %window.target, minutes = window.window_minutes))]
    pub fn aggregate_window(
        &self,
        events: &[StopEvent],
        window: TimeWindow,
        min_support: usize,
    ) -> Vec<StopPairStat> {
        self.aggregate_windows(events, &[window], min_support)
    }

    /// Like [`aggregate_window`](Self::aggregate_window) for the union of
    /// several bands. A row inside more than one band is counted once.
    pub fn aggregate_windows(
        &self,
        events: &[StopEvent],
        windows: &[TimeWindow],
        min_support: usize,
    ) -> Vec<StopPairStat> {
        let in_band = events.iter().filter(|e| {
            e.aimed_stop_time
                .is_some_and(|t| windows.iter().any(|w| w.contains(t.time())))
        });

        let mut stats: Vec<_> = aggregate_rows(in_band)
            .into_iter()
            .filter(|s| s.count > min_support)
            .collect();

        stats.sort_by(|a, b| by_delay_change(a.delay_change_avg, b.delay_change_avg));

        info!(
            pairs = stats.len(),
            min_support, "Windowed stop pairs aggregated"
        );
        stats
    }
}

fn aggregate_rows<'a>(events: impl Iterator<Item = &'a StopEvent>) -> Vec<StopPairStat> {
    let mut groups: BTreeMap<(&str, &str), PairSeries> = BTreeMap::new();

    for event in events {
        let Some(next) = event.next_stop_name.as_deref() else {
            continue;
        };
        groups
            .entry((event.stop_name.as_str(), next))
            .or_default()
            .push(event);
    }

    debug!(pairs = groups.len(), "Stop pairs grouped");

    groups
        .into_iter()
        .map(|((stop, next), series)| series.into_stat(stop.to_string(), next.to_string()))
        .collect()
}

/// Ascending, undefined averages last.
fn by_delay_change(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
