//! CSV readers for the record collections handed over by upstream collectors.

use csv::StringRecord;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::pipeline::types::{StopEvent, StopPairStat, Timestamp, WeatherObservation};

/// Identity columns of a stop event, each with its accepted spellings.
const STOP_EVENT_KEYS: &[&[&str]] = &[
    &["serviceJourneyId", "journeyId"],
    &["sequenceNr"],
    &["operatingDate"],
    &["stopPointName", "stopName"],
];

const WEATHER_KEYS: &[&[&str]] = &[&["sourceId"], &["referenceTime"], &["elementId"], &["value"]];

fn require_columns(headers: &StringRecord, keys: &[&[&str]]) -> Result<()> {
    for spellings in keys {
        if !spellings.iter().any(|name| headers.iter().any(|h| h == *name)) {
            return Err(PipelineError::missing_column(spellings[0]));
        }
    }
    Ok(())
}

/// Reads raw stop events.
///
/// # Errors
///
/// Returns [`PipelineError::DataIntegrity`] before reading any row when an
/// identity column (journey id, sequence number, operating date, stop name)
/// is missing from the header.
pub fn read_stop_events<R: Read>(reader: R) -> Result<Vec<StopEvent>> {
    let mut rdr = csv::Reader::from_reader(reader);
    require_columns(rdr.headers()?, STOP_EVENT_KEYS)?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: StopEvent = result?;
        rows.push(record);
    }

    info!(rows = rows.len(), "Stop events loaded");
    Ok(rows)
}

/// One reading in long form, as delivered by the weather collaborator.
#[derive(Debug, Deserialize)]
struct WeatherRow {
    #[serde(rename = "sourceId")]
    source_id: String,
    #[serde(rename = "referenceTime")]
    reference_time: Timestamp,
    #[serde(rename = "elementId")]
    element_id: String,
    value: Option<f64>,
}

/// Reads long-form weather rows and folds them into one observation per
/// (source, reference time). Rows without a value are skipped.
pub fn read_weather_observations<R: Read>(reader: R) -> Result<Vec<WeatherObservation>> {
    let mut rdr = csv::Reader::from_reader(reader);
    require_columns(rdr.headers()?, WEATHER_KEYS)?;

    let mut grouped: BTreeMap<(Timestamp, String), WeatherObservation> = BTreeMap::new();
    let mut skipped = 0usize;

    for result in rdr.deserialize() {
        let row: WeatherRow = result?;
        let Some(value) = row.value else {
            skipped += 1;
            continue;
        };
        grouped
            .entry((row.reference_time, row.source_id.clone()))
            .or_insert_with(|| WeatherObservation::new(&row.source_id, row.reference_time))
            .values
            .insert(row.element_id, value);
    }

    debug!(skipped, "Weather rows without value skipped");
    info!(observations = grouped.len(), "Weather observations loaded");
    Ok(grouped.into_values().collect())
}

/// Reads a stop-pair table previously written by [`crate::output`].
pub fn read_stop_pair_stats<R: Read>(reader: R) -> Result<Vec<StopPairStat>> {
    let mut rdr = csv::Reader::from_reader(reader);
    require_columns(rdr.headers()?, &[&["stopPointName"], &["nextStopPointName"], &["count"]])?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: StopPairStat = result?;
        rows.push(record);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: &str = "\
serviceJourneyId,operatingDate,sequenceNr,stopPointName,aimedArrivalTime,aimedDepartureTime,arrivalTime,departureTime,extra
RUT:ServiceJourney:1,2025-02-14,1,Jernbanetorget,,2025-02-14T08:00:00+01:00,,2025-02-14T08:01:00+01:00,x
RUT:ServiceJourney:1,2025-02-14,2,Stortinget,2025-02-14T08:03:00+01:00,2025-02-14T08:03:00+01:00,2025-02-14T08:05:00+01:00,2025-02-14T08:05:30+01:00,y
";

    #[test]
    fn test_read_stop_events() {
        let rows = read_stop_events(EVENTS.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].journey_id, "RUT:ServiceJourney:1");
        assert_eq!(rows[0].sequence_nr, 1);
        assert_eq!(rows[0].scheduled_arrival, None);
        assert!(rows[0].scheduled_departure.is_some());
        assert_eq!(rows[1].stop_name, "Stortinget");
        assert!(rows[1].stop_time.is_none());
    }

    #[test]
    fn test_short_column_aliases() {
        let csv = "journeyId,operatingDate,sequenceNr,stopName\nJ1,2025-02-14,3,A\n";

        let rows = read_stop_events(csv.as_bytes()).unwrap();

        assert_eq!(rows[0].journey_id, "J1");
        assert_eq!(rows[0].stop_name, "A");
    }

    #[test]
    fn test_missing_sequence_column() {
        let csv = "serviceJourneyId,operatingDate,stopPointName\nJ1,2025-02-14,A\n";

        let err = read_stop_events(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::DataIntegrity(_)));
    }

    #[test]
    fn test_missing_journey_column() {
        let csv = "operatingDate,sequenceNr,stopPointName\n2025-02-14,1,A\n";

        let err = read_stop_events(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("serviceJourneyId"));
    }

    #[test]
    fn test_read_weather_groups_elements() {
        let csv = "\
sourceId,referenceTime,elementId,value,timeOffset
SN18700:0,2025-02-14T08:00:00.000Z,air_temperature,-3.5,PT0H
SN18700:0,2025-02-14T08:00:00.000Z,wind_speed,4.1,PT0H
SN18700:0,2025-02-14T09:00:00.000Z,air_temperature,,PT0H
SN18700:0,2025-02-14T07:00:00.000Z,air_temperature,-4.0,PT0H
";

        let obs = read_weather_observations(csv.as_bytes()).unwrap();

        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].value("air_temperature"), Some(-4.0));
        assert_eq!(obs[1].value("air_temperature"), Some(-3.5));
        assert_eq!(obs[1].value("wind_speed"), Some(4.1));
    }

    #[test]
    fn test_read_weather_requires_reference_time() {
        let csv = "sourceId,elementId,value\nSN1,t,1.0\n";
        assert!(read_weather_observations(csv.as_bytes()).is_err());
    }
}
