//! Orders stop events per service journey and links each event to the call
//! that immediately follows it.
//!
//! A successor is only accepted when its `sequence_nr` is exactly one above
//! the current one. Journey ends and gaps in the recorded sequence both leave
//! the link fields empty and are never treated as errors.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::types::{StopEvent, Timestamp};
use super::utility::minutes_between;

fn sort_key(event: &StopEvent) -> (NaiveDate, &str, i64) {
    (
        event.operating_date,
        event.journey_id.as_str(),
        event.sequence_nr,
    )
}

/// Sorts by (operating date, journey id, sequence number), ascending.
pub(crate) fn order_events(events: &mut [StopEvent]) {
    events.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

/// For every row of an ordered slice, the index of its adjacent successor.
///
/// Rows are partitioned by journey id while keeping their relative order,
/// then each partition is walked pairwise. Only a successor on the same
/// operating date whose sequence number is `current + 1` counts, so a journey
/// id reused on another date starts a new journey (see DESIGN.md).
///
/// Rows with an empty journey id and repeated sequence numbers are left
/// unlinked and logged instead of failing the batch.
pub(crate) fn successor_indices(events: &[StopEvent]) -> Vec<Option<usize>> {
    let mut partitions: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut anonymous = 0usize;

    for (idx, event) in events.iter().enumerate() {
        if event.journey_id.trim().is_empty() {
            anonymous += 1;
            continue;
        }
        partitions
            .entry(event.journey_id.as_str())
            .or_default()
            .push(idx);
    }

    if anonymous > 0 {
        warn!(rows = anonymous, "Rows without journey id left unlinked");
    }

    let mut successors = vec![None; events.len()];

    for indices in partitions.values() {
        for pair in indices.windows(2) {
            let (current, next) = (&events[pair[0]], &events[pair[1]]);

            if current.operating_date == next.operating_date
                && current.sequence_nr == next.sequence_nr
            {
                warn!(
                    journey_id = %current.journey_id,
                    sequence_nr = current.sequence_nr,
                    operating_date = %current.operating_date,
                    "Repeated sequence number treated as a boundary"
                );
                continue;
            }

            if current.operating_date == next.operating_date
                && current.sequence_nr.checked_add(1) == Some(next.sequence_nr)
            {
                successors[pair[0]] = Some(pair[1]);
            }
        }
    }

    successors
}

#[derive(Debug, Default)]
pub struct JourneySequencer;

impl JourneySequencer {
    /// Orders the rows and fills the successor fields (`next_stop_name`,
    /// `next_sequence_nr`, `time_to_next_stop_minutes`,
    /// `aimed_time_to_next_stop_minutes`).
    #[tracing::instrument(skip_all, fields(rows = events.len()))]
    pub fn sequence(&self, mut events: Vec<StopEvent>) -> Vec<StopEvent> {
        order_events(&mut events);
        let successors = successor_indices(&events);

        let links: Vec<_> = successors
            .iter()
            .enumerate()
            .map(|(idx, succ)| succ.map(|s| link(&events[idx], &events[s])))
            .collect();

        let mut boundaries = 0usize;
        for (event, link) in events.iter_mut().zip(links) {
            match link {
                Some(link) => {
                    event.next_stop_name = Some(link.stop_name);
                    event.next_sequence_nr = Some(link.sequence_nr);
                    event.time_to_next_stop_minutes = link.minutes;
                    event.aimed_time_to_next_stop_minutes = link.aimed_minutes;
                }
                None => {
                    boundaries += 1;
                    event.next_stop_name = None;
                    event.next_sequence_nr = None;
                    event.time_to_next_stop_minutes = None;
                    event.aimed_time_to_next_stop_minutes = None;
                }
            }
        }

        debug!(boundaries, "Journeys sequenced");
        events
    }
}

struct Link {
    stop_name: String,
    sequence_nr: i64,
    minutes: Option<f64>,
    aimed_minutes: Option<f64>,
}

fn link(current: &StopEvent, next: &StopEvent) -> Link {
    let span = |a: Option<Timestamp>, b: Option<Timestamp>| match (a, b) {
        (Some(a), Some(b)) => Some(minutes_between(a, b)),
        _ => None,
    };

    Link {
        stop_name: next.stop_name.clone(),
        sequence_nr: next.sequence_nr,
        minutes: span(current.stop_time, next.stop_time),
        aimed_minutes: span(current.aimed_stop_time, next.aimed_stop_time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_links_consecutive_calls() {
        let events = vec![
            timed("J1", 2, "B", "10:05:00", "10:06:00"),
            timed("J1", 1, "A", "10:00:00", "10:00:00"),
            timed("J1", 3, "C", "10:10:00", "10:13:00"),
        ];

        let out = JourneySequencer.sequence(events);

        let seqs: Vec<_> = out.iter().map(|e| e.sequence_nr).collect();
        assert_eq!(seqs, vec![1, 2, 3]);

        assert_eq!(out[0].next_stop_name.as_deref(), Some("B"));
        assert_eq!(out[0].next_sequence_nr, Some(2));
        assert!((out[0].time_to_next_stop_minutes.unwrap() - 6.0).abs() < 1e-9);
        assert!((out[0].aimed_time_to_next_stop_minutes.unwrap() - 5.0).abs() < 1e-9);

        assert_eq!(out[1].next_stop_name.as_deref(), Some("C"));
        assert!((out[1].time_to_next_stop_minutes.unwrap() - 7.0).abs() < 1e-9);

        assert_eq!(out[2].next_stop_name, None);
        assert_eq!(out[2].time_to_next_stop_minutes, None);
    }

    #[test]
    fn test_sequence_gap_is_a_boundary() {
        let events = vec![
            timed("J1", 1, "A", "10:00:00", "10:00:00"),
            timed("J1", 2, "B", "10:05:00", "10:05:00"),
            timed("J1", 4, "D", "10:15:00", "10:15:00"),
            timed("J1", 5, "E", "10:20:00", "10:20:00"),
        ];

        let out = JourneySequencer.sequence(events);

        let next: Vec<_> = out.iter().map(|e| e.next_stop_name.as_deref()).collect();
        assert_eq!(next, vec![Some("B"), None, Some("E"), None]);
        assert_eq!(out[1].next_sequence_nr, None);
        assert_eq!(out[1].time_to_next_stop_minutes, None);
    }

    #[test]
    fn test_journeys_are_not_linked_to_each_other() {
        let events = vec![
            timed("J1", 1, "A", "10:00:00", "10:00:00"),
            timed("J2", 2, "X", "10:01:00", "10:01:00"),
            timed("J2", 1, "W", "09:58:00", "09:58:00"),
            timed("J1", 2, "B", "10:04:00", "10:04:00"),
        ];

        let out = JourneySequencer.sequence(events);

        let keys: Vec<_> = out
            .iter()
            .map(|e| (e.journey_id.as_str(), e.sequence_nr))
            .collect();
        assert_eq!(keys, vec![("J1", 1), ("J1", 2), ("J2", 1), ("J2", 2)]);
        assert_eq!(out[0].next_stop_name.as_deref(), Some("B"));
        assert_eq!(out[1].next_stop_name, None);
        assert_eq!(out[2].next_stop_name.as_deref(), Some("X"));
        assert_eq!(out[3].next_stop_name, None);
    }

    #[test]
    fn test_same_journey_on_consecutive_days() {
        let mut day2 = timed("J1", 1, "A", "10:00:00", "10:00:00");
        day2.operating_date = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();
        let events = vec![
            day2,
            timed("J1", 1, "A", "10:00:00", "10:00:00"),
            timed("J1", 2, "B", "10:05:00", "10:05:00"),
        ];

        let out = JourneySequencer.sequence(events);

        assert_eq!(out[0].next_stop_name.as_deref(), Some("B"));
        assert_eq!(out[1].next_stop_name, None);
        assert_eq!(out[2].next_stop_name, None);
    }

    #[test]
    fn test_no_link_across_operating_dates() {
        let mut day2 = timed("J1", 2, "B", "10:05:00", "10:05:00");
        day2.operating_date = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();
        let events = vec![timed("J1", 1, "A", "10:00:00", "10:00:00"), day2];

        let out = JourneySequencer.sequence(events);

        assert!(out.iter().all(|e| !e.has_successor()));
    }

    #[test]
    fn test_missing_stop_time_keeps_link_but_not_duration() {
        let mut second = timed("J1", 2, "B", "10:05:00", "10:05:00");
        second.stop_time = None;
        let events = vec![timed("J1", 1, "A", "10:00:00", "10:00:00"), second];

        let out = JourneySequencer.sequence(events);

        assert_eq!(out[0].next_stop_name.as_deref(), Some("B"));
        assert_eq!(out[0].time_to_next_stop_minutes, None);
        assert!((out[0].aimed_time_to_next_stop_minutes.unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_stop_journey() {
        let out = JourneySequencer
            .sequence(vec![timed("J1", 7, "A", "10:00:00", "10:00:00")]);
        assert_eq!(out.len(), 1);
        assert!(!out[0].has_successor());
    }

    #[test]
    fn test_repeated_sequence_is_a_boundary() {
        let events = vec![
            timed("J1", 1, "A", "10:00:00", "10:00:00"),
            timed("J1", 2, "B", "10:05:00", "10:05:00"),
            timed("J2", 1, "W", "10:00:00", "10:00:00"),
            timed("J2", 1, "W", "10:00:00", "10:00:00"),
            timed("J2", 2, "X", "10:04:00", "10:04:00"),
        ];

        let out = JourneySequencer.sequence(events);

        assert_eq!(out.len(), 5);
        let next: Vec<_> = out.iter().map(|e| e.next_stop_name.as_deref()).collect();
        assert_eq!(next, vec![Some("B"), None, None, Some("X"), None]);
    }

    #[test]
    fn test_empty_journey_id_is_left_unlinked() {
        let events = vec![
            timed("", 1, "A", "10:00:00", "10:00:00"),
            timed("", 2, "B", "10:05:00", "10:05:00"),
            timed("J1", 1, "C", "10:00:00", "10:00:00"),
            timed("J1", 2, "D", "10:06:00", "10:06:00"),
        ];

        let out = JourneySequencer.sequence(events);

        assert_eq!(out.len(), 4);
        assert!(out.iter().filter(|e| e.journey_id.is_empty()).all(|e| !e.has_successor()));
        let j1 = out.iter().find(|e| e.stop_name == "C").unwrap();
        assert_eq!(j1.next_stop_name.as_deref(), Some("D"));
    }

    // Helper functions for tests
    fn timed(journey: &str, seq: i64, stop: &str, aimed: &str, actual: &str) -> StopEvent {
        let mut event = StopEvent::new(
            journey,
            NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(),
            seq,
            stop,
        );
        event.aimed_stop_time = Some(ts(aimed));
        event.stop_time = Some(ts(actual));
        event
    }

    fn ts(time: &str) -> Timestamp {
        DateTime::parse_from_rfc3339(&format!("2025-02-14T{time}+01:00")).unwrap()
    }
}
