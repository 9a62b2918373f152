use crate::types::{AggregateResult, Event, Instant, Source};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct Shows {
    by_venue: BTreeMap<String, Vec<Event>>,
    seen: HashSet<(String, String, Instant)>,
}

/// Shared venue → events collection for one harvest run.
///
/// Cloning yields another handle onto the same collection. Every merge takes the
/// lock, so concurrent completions never interleave inside one venue's list.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    shows: Arc<Mutex<Shows>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds events, ignoring any already merged under the same venue, link and start.
    /// Returns how many were new.
    pub fn merge(&self, events: impl IntoIterator<Item = Event>, source: &Source) -> usize {
        let mut shows = self.shows.lock().unwrap_or_else(PoisonError::into_inner);
        let mut added = 0;
        for event in events {
            let identity = (event.venue_name.clone(), event.link.clone(), event.start);
            if !shows.seen.insert(identity) {
                debug!(source = %source.name, link = %event.link, "Duplicate event ignored");
                continue;
            }
            shows
                .by_venue
                .entry(event.venue_name.clone())
                .or_default()
                .push(event);
            added += 1;
        }
        added
    }

    pub fn len(&self) -> usize {
        self.shows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .seen
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot with each venue's events sorted ascending by start.
    pub fn finalize(&self, harvested_at: Instant, incomplete: bool) -> AggregateResult {
        let mut shows = self
            .shows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_venue
            .clone();
        for events in shows.values_mut() {
            events.sort_by_key(|event| event.start);
        }
        AggregateResult {
            harvested_at,
            shows,
            incomplete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Family;
    use chrono::DateTime;

    fn event(venue: &str, link: &str, start: &str) -> Event {
        Event::new(
            vec!["Some Band".to_string()],
            venue,
            DateTime::parse_from_rfc3339(start).unwrap(),
            link,
        )
        .unwrap()
    }

    fn source(name: &str) -> Source {
        Source::new(name, Family::BoweryPresents, &["http://example.com/calendar"])
    }

    fn harvested_at() -> Instant {
        DateTime::parse_from_rfc3339("2016-04-29T12:00:00-04:00").unwrap()
    }

    #[test]
    fn test_merge_twice_is_idempotent() {
        let aggregator = Aggregator::new();
        let src = source("Terminal 5");
        let e = event("Terminal 5", "http://t5/1", "2016-05-01T20:00:00-04:00");

        assert_eq!(aggregator.merge(vec![e.clone()], &src), 1);
        let first = aggregator.finalize(harvested_at(), false);
        assert_eq!(aggregator.merge(vec![e], &src), 0);
        let second = aggregator.finalize(harvested_at(), false);

        assert_eq!(first, second);
        assert_eq!(second.shows["Terminal 5"].len(), 1);
    }

    #[test]
    fn test_finalize_sorts_each_venue_ascending() {
        let aggregator = Aggregator::new();
        let src = source("Terminal 5");
        aggregator.merge(
            vec![
                event("Terminal 5", "http://t5/3", "2016-05-03T19:30:00-04:00"),
                event("Terminal 5", "http://t5/1", "2016-05-01T20:00:00-04:00"),
                // Earlier as an instant despite the later wall-clock hour
                event("Terminal 5", "http://t5/2", "2016-05-01T19:00:00-05:00"),
            ],
            &src,
        );
        let result = aggregator.finalize(harvested_at(), false);
        let links: Vec<_> = result.shows["Terminal 5"].iter().map(|e| e.link.as_str()).collect();
        assert_eq!(links, vec!["http://t5/1", "http://t5/2", "http://t5/3"]);
    }

    #[test]
    fn test_merge_order_across_sources_does_not_matter() {
        let a = event("Warsaw", "http://w/1", "2016-05-02T20:00:00-04:00");
        let b = event("Capitol Theatre", "http://c/1", "2016-04-30T18:00:00-04:00");
        let c = event("Warsaw", "http://w/0", "2016-05-01T20:00:00-04:00");

        let forward = Aggregator::new();
        forward.merge(vec![a.clone(), c.clone()], &source("Warsaw"));
        forward.merge(vec![b.clone()], &source("Capitol Theatre"));

        let backward = Aggregator::new();
        backward.merge(vec![b], &source("Capitol Theatre"));
        backward.merge(vec![c, a], &source("Warsaw"));

        assert_eq!(
            forward.finalize(harvested_at(), false),
            backward.finalize(harvested_at(), false)
        );
    }

    #[test]
    fn test_distinct_events_at_same_venue_are_kept() {
        let aggregator = Aggregator::new();
        let src = source("Rockwood (Stage 1)");
        aggregator.merge(
            vec![
                event("Rockwood (Stage 1)", "http://rw/", "2016-05-01T19:00:00-04:00"),
                event("Rockwood (Stage 1)", "http://rw/", "2016-05-02T19:00:00-04:00"),
                event("Rockwood (Stage 2)", "http://rw/", "2016-05-01T19:00:00-04:00"),
            ],
            &src,
        );
        assert_eq!(aggregator.len(), 3);
        let result = aggregator.finalize(harvested_at(), true);
        assert!(result.incomplete);
        assert_eq!(result.shows["Rockwood (Stage 1)"].len(), 2);
        assert_eq!(result.total_events(), 3);
    }
}
