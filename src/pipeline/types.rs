//! Record types flowing through the pipeline.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timestamps keep the offset they were reported with so that time-of-day
/// filtering happens in the operator's local time.
pub type Timestamp = DateTime<FixedOffset>;

/// One observed call of a service journey at a stop.
///
/// The first eight fields come from the upstream collector. The rest are
/// filled in by the pipeline stages and stay `None` until then, or when the
/// inputs needed to derive them are missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopEvent {
    #[serde(rename = "serviceJourneyId", alias = "journeyId")]
    pub journey_id: String,
    #[serde(rename = "operatingDate")]
    pub operating_date: NaiveDate,
    #[serde(rename = "sequenceNr")]
    pub sequence_nr: i64,
    #[serde(rename = "stopPointName", alias = "stopName")]
    pub stop_name: String,

    #[serde(rename = "aimedArrivalTime", alias = "scheduledArrival")]
    pub scheduled_arrival: Option<Timestamp>,
    #[serde(rename = "aimedDepartureTime", alias = "scheduledDeparture")]
    pub scheduled_departure: Option<Timestamp>,
    #[serde(rename = "arrivalTime", alias = "actualArrival")]
    pub actual_arrival: Option<Timestamp>,
    #[serde(rename = "departureTime", alias = "actualDeparture")]
    pub actual_departure: Option<Timestamp>,

    // derived
    #[serde(rename = "stopTime", default)]
    pub stop_time: Option<Timestamp>,
    #[serde(rename = "aimedStopTime", default)]
    pub aimed_stop_time: Option<Timestamp>,
    #[serde(rename = "delayMinutes", default)]
    pub delay_minutes: Option<f64>,
    #[serde(rename = "nextStopPointName", default)]
    pub next_stop_name: Option<String>,
    #[serde(rename = "nextSequenceNr", default)]
    pub next_sequence_nr: Option<i64>,
    #[serde(rename = "timeToNextStopMinutes", default)]
    pub time_to_next_stop_minutes: Option<f64>,
    #[serde(rename = "aimedTimeToNextStopMinutes", default)]
    pub aimed_time_to_next_stop_minutes: Option<f64>,
    #[serde(rename = "delayChange", default)]
    pub delay_change: Option<f64>,
}

impl StopEvent {
    /// Creates a raw event with no timing information.
    pub fn new(
        journey_id: &str,
        operating_date: NaiveDate,
        sequence_nr: i64,
        stop_name: &str,
    ) -> Self {
        StopEvent {
            journey_id: journey_id.to_string(),
            operating_date,
            sequence_nr,
            stop_name: stop_name.to_string(),
            scheduled_arrival: None,
            scheduled_departure: None,
            actual_arrival: None,
            actual_departure: None,
            stop_time: None,
            aimed_stop_time: None,
            delay_minutes: None,
            next_stop_name: None,
            next_sequence_nr: None,
            time_to_next_stop_minutes: None,
            aimed_time_to_next_stop_minutes: None,
            delay_change: None,
        }
    }

    /// Set scheduled arrival and departure.
    pub fn with_scheduled(
        mut self,
        arrival: Option<Timestamp>,
        departure: Option<Timestamp>,
    ) -> Self {
        self.scheduled_arrival = arrival;
        self.scheduled_departure = departure;
        self
    }

    /// Set observed arrival and departure.
    pub fn with_actual(mut self, arrival: Option<Timestamp>, departure: Option<Timestamp>) -> Self {
        self.actual_arrival = arrival;
        self.actual_departure = departure;
        self
    }

    /// Whether sequencing found a valid successor for this event.
    pub fn has_successor(&self) -> bool {
        self.next_stop_name.is_some()
    }
}

/// Summary statistics for one ordered (stop, next stop) segment.
///
/// Means and deviations are `None` when no contributing row carried the
/// underlying value; deviations need at least two values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPairStat {
    #[serde(rename = "stopPointName")]
    pub stop_name: String,
    #[serde(rename = "nextStopPointName")]
    pub next_stop_name: String,
    pub travel_time_avg: Option<f64>,
    pub travel_time_std: Option<f64>,
    pub scheduled_time_avg: Option<f64>,
    pub scheduled_time_std: Option<f64>,
    pub delay_avg: Option<f64>,
    pub delay_std: Option<f64>,
    pub delay_change_avg: Option<f64>,
    pub delay_change_max: Option<f64>,
    pub count: usize,
}

/// A weather station reading at one reference time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub source_id: String,
    pub reference_time: Timestamp,
    /// Element name (e.g. `air_temperature`) to observed value.
    pub values: BTreeMap<String, f64>,
}

impl WeatherObservation {
    pub fn new(source_id: &str, reference_time: Timestamp) -> Self {
        WeatherObservation {
            source_id: source_id.to_string(),
            reference_time,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, element: &str, value: f64) -> Self {
        self.values.insert(element.to_string(), value);
        self
    }

    pub fn value(&self, element: &str) -> Option<f64> {
        self.values.get(element).copied()
    }
}
