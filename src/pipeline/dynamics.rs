//! Change in delay between consecutive calls of a journey.
//!
//! Positive values mean lateness is growing along the segment, negative
//! values mean the vehicle is recovering.

use tracing::debug;

use super::sequence::{order_events, successor_indices};
use super::types::StopEvent;

#[derive(Debug, Default)]
pub struct DelayDynamicsCalculator;

impl DelayDynamicsCalculator {
    /// Sets `delay_change = delay(successor) - delay(current)` using the same
    /// adjacency rule as [`JourneySequencer`](super::sequence::JourneySequencer).
    #[tracing::instrument(skip_all, fields(rows = events.len()))]
    pub fn apply(&self, mut events: Vec<StopEvent>) -> Vec<StopEvent> {
        order_events(&mut events);
        let successors = successor_indices(&events);

        let changes: Vec<Option<f64>> = successors
            .iter()
            .enumerate()
            .map(|(idx, succ)| {
                let next = events[(*succ)?].delay_minutes?;
                let current = events[idx].delay_minutes?;
                Some(next - current)
            })
            .collect();

        let defined = changes.iter().filter(|c| c.is_some()).count();
        for (event, change) in events.iter_mut().zip(changes) {
            event.delay_change = change;
        }

        debug!(defined, "Delay changes computed");
        events
    }
}
