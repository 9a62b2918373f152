use crate::aggregator::Aggregator;
use crate::apis::{ParseContext, Strategy};
use crate::config::HarvestSettings;
use crate::dates::{DateNormalizer, REFERENCE_ZONE};
use crate::error::{Result, ScraperError};
use crate::fetch::{fetch_with_retry, Fetcher};
use crate::metrics::HarvestMetrics;
use crate::types::{
    AggregateResult, Event, FetchRequest, Fragment, Instant, Page, Source, Stage,
};
use chrono::{DateTime, Duration, Offset, SubsecRound, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Per-source tally of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub requests: usize,
    pub fetch_failures: usize,
    pub skips: usize,
    pub events: usize,
}

impl SourceReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// The snapshot plus how each source fared
#[derive(Debug, Clone)]
pub struct Harvest {
    pub result: AggregateResult,
    pub reports: Vec<SourceReport>,
}

#[derive(Debug)]
struct WorkItem {
    source: usize,
    request: FetchRequest,
}

/// Drives every source's crawl through one bounded pool of in-flight fetches.
pub struct CrawlOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    settings: HarvestSettings,
    now: Option<DateTime<Utc>>,
}

impl CrawlOrchestrator {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: HarvestSettings) -> Self {
        Self {
            fetcher,
            settings,
            now: None,
        }
    }

    /// Pins the harvest clock: year inference, API date windows and `updated`.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub async fn run(&self, sources: &[Source]) -> Result<AggregateResult> {
        Ok(self.harvest(sources).await?.result)
    }

    pub async fn harvest(&self, sources: &[Source]) -> Result<Harvest> {
        if sources.is_empty() {
            return Err(ScraperError::Config("no sources configured".into()));
        }
        let started = std::time::Instant::now();
        let now = self.now.unwrap_or_else(Utc::now);
        let dates = DateNormalizer::new(now);
        let strategies = sources
            .iter()
            .map(Strategy::for_source)
            .collect::<Result<Vec<_>>>()?;

        let aggregator = Aggregator::new();
        let mut reports: Vec<SourceReport> =
            sources.iter().map(|s| SourceReport::new(&s.name)).collect();
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();

        // Round-robin so no source waits behind another's seed list
        let seeds: Vec<Vec<FetchRequest>> = strategies
            .iter()
            .zip(sources)
            .map(|(strategy, source)| {
                strategy.seed_requests(&ParseContext {
                    source,
                    dates: &dates,
                })
            })
            .collect();
        let rounds = seeds.iter().map(Vec::len).max().unwrap_or(0);
        for round in 0..rounds {
            for (source, requests) in seeds.iter().enumerate() {
                if let Some(request) = requests.get(round) {
                    enqueue(&mut queue, &mut seen, source, request.clone());
                }
            }
        }
        info!(
            sources = sources.len(),
            seeds = queue.len(),
            max_in_flight = self.settings.max_in_flight,
            "Starting harvest"
        );

        let max_in_flight = self.settings.max_in_flight.max(1);
        let deadline = self
            .settings
            .deadline()
            .map(|d| tokio::time::Instant::now() + d);
        let mut in_flight = FuturesUnordered::new();
        let mut incomplete = false;

        loop {
            while in_flight.len() < max_in_flight {
                let Some(item) = queue.pop_front() else { break };
                let name = sources[item.source].name.as_str();
                reports[item.source].requests += 1;
                HarvestMetrics::record_request(name);
                let span = info_span!("source", name = %name);
                in_flight.push(self.fetch_item(item).instrument(span));
            }

            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, in_flight.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            abandoned = in_flight.len(),
                            queued = queue.len(),
                            "Harvest deadline reached, keeping what was collected"
                        );
                        incomplete = true;
                        break;
                    }
                },
                None => in_flight.next().await,
            };
            let Some((item, outcome)) = next else { break };

            let source = &sources[item.source];
            let report = &mut reports[item.source];
            let _entered = info_span!("source", name = %source.name).entered();
            let page = match outcome {
                Ok(page) => page,
                Err(e) => {
                    report.fetch_failures += 1;
                    HarvestMetrics::record_fetch_failure(&source.name);
                    warn!(url = %item.request.url, error = %e, "Fetch abandoned");
                    continue;
                }
            };
            HarvestMetrics::record_page(&source.name, page.body.len());

            let ctx = ParseContext {
                source,
                dates: &dates,
            };
            let fragments = strategies[item.source].handle(&item.request.stage, &page, &ctx);
            let mut events: Vec<Event> = Vec::new();
            for fragment in fragments {
                match fragment {
                    Fragment::Request(request) => {
                        enqueue(&mut queue, &mut seen, item.source, request);
                    }
                    Fragment::Event(event) => events.push(event),
                    Fragment::Skip(e) => {
                        report.skips += 1;
                        HarvestMetrics::record_skip(&source.name);
                        warn!(url = %page.url, error = %e, "Skipped item");
                    }
                }
            }
            let added = aggregator.merge(events, source);
            report.events += added;
            HarvestMetrics::record_events(&source.name, added);
            debug!(url = %page.url, added, "Page handled");
        }
        drop(in_flight);

        for report in &reports {
            if report.events == 0 {
                let exhausted = ScraperError::SourceExhausted(report.name.clone());
                warn!(
                    source = %report.name,
                    requests = report.requests,
                    fetch_failures = report.fetch_failures,
                    skips = report.skips,
                    "{exhausted}"
                );
            } else {
                info!(
                    source = %report.name,
                    requests = report.requests,
                    fetch_failures = report.fetch_failures,
                    skips = report.skips,
                    events = report.events,
                    "Source harvested"
                );
            }
        }
        HarvestMetrics::record_run(started.elapsed().as_secs_f64(), incomplete);

        if aggregator.is_empty() {
            return Err(ScraperError::TotalFailure {
                sources: sources.len(),
            });
        }

        let result = aggregator.finalize(self.stamp(started.elapsed()), incomplete);
        info!(
            venues = result.shows.len(),
            events = result.total_events(),
            incomplete,
            "Harvest finished"
        );
        Ok(Harvest { result, reports })
    }

    /// Harvest time once the crawl has drained, in the reference zone to the second.
    /// A pinned clock advances by the run's elapsed time.
    fn stamp(&self, elapsed: std::time::Duration) -> Instant {
        let finished = match self.now {
            Some(now) => now + Duration::seconds(elapsed.as_secs() as i64),
            None => Utc::now().trunc_subsecs(0),
        };
        let local = finished.with_timezone(&REFERENCE_ZONE);
        local.with_timezone(&local.offset().fix())
    }

    async fn fetch_item(&self, item: WorkItem) -> (WorkItem, Result<Page>) {
        let outcome = fetch_with_retry(
            self.fetcher.as_ref(),
            &item.request.url,
            self.settings.retry_policy(),
        )
        .await;
        (item, outcome)
    }
}

/// Queues a request unless this run already has it for the same source and stage.
fn enqueue(
    queue: &mut VecDeque<WorkItem>,
    seen: &mut HashSet<(usize, String, Stage)>,
    source: usize,
    request: FetchRequest,
) {
    if seen.insert((source, request.url.clone(), request.stage.clone())) {
        queue.push_back(WorkItem { source, request });
    } else {
        debug!(url = %request.url, "Request already scheduled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Family;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves one fixed body per URL and records what was asked for.
    struct Routes {
        pages: Vec<(&'static str, String)>,
        asked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for Routes {
        async fn fetch(&self, url: &str) -> Result<Page> {
            self.asked.lock().unwrap().push(url.to_string());
            self.pages
                .iter()
                .find(|(route, _)| *route == url)
                .map(|(_, body)| Page::new(url, body.clone()))
                .ok_or_else(|| ScraperError::ParseStructure(format!("no route for {url}")))
        }
    }

    fn settings() -> HarvestSettings {
        HarvestSettings {
            fetch_retries: 0,
            retry_backoff_ms: 0,
            ..HarvestSettings::default()
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2016-04-29T12:00:00-04:00")
            .unwrap()
            .with_timezone(&Utc)
    }

    const GRID: &str = "http://www.beacontheatre.com/calendar?venue=beacon";

    fn grid_routes(list: &str) -> Routes {
        Routes {
            pages: vec![
                (GRID, list.to_string()),
                (
                    "http://www.beacontheatre.com/events/a",
                    r#"<div id="event-information"><h1 class="event-title">Band A</h1></div>
                       <div class="box-event-calendar"><span class="m-event">May</span>
                       <span class="number-day-event">1</span><span class="d-event">2016</span>
                       <span class="time-event">8:00 PM</span></div>"#
                        .to_string(),
                ),
            ],
            asked: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_links_fetched_once() {
        let list = r#"<table><tr>
            <td class="event_name"><a href="/events/a">A</a></td>
            <td class="event_name"><a href="/events/a">A again</a></td>
            <td class="event_name"><a href="/events/missing">Gone</a></td>
        </tr></table>"#;
        let routes = Arc::new(grid_routes(list));
        let orchestrator = CrawlOrchestrator::new(routes.clone(), settings()).with_now(now());
        let sources = vec![Source::new("The Beacon Theatre", Family::CalendarGrid, &[GRID])];

        let harvest = orchestrator.harvest(&sources).await.unwrap();
        let asked = routes.asked.lock().unwrap().clone();
        assert_eq!(asked.len(), 3);
        assert_eq!(asked.iter().filter(|u| u.ends_with("/events/a")).count(), 1);

        assert_eq!(
            harvest.reports,
            vec![SourceReport {
                name: "The Beacon Theatre".into(),
                requests: 3,
                fetch_failures: 1,
                skips: 0,
                events: 1,
            }]
        );
        assert_eq!(harvest.result.harvested_at.offset().local_minus_utc(), -4 * 3600);
        assert!(!harvest.result.incomplete);
    }

    /// Routes that take a while to answer
    struct Slow(Routes, std::time::Duration);

    #[async_trait]
    impl Fetcher for Slow {
        async fn fetch(&self, url: &str) -> Result<Page> {
            tokio::time::sleep(self.1).await;
            self.0.fetch(url).await
        }
    }

    #[tokio::test]
    async fn test_updated_is_stamped_when_the_crawl_drains() {
        let list = r#"<table><tr><td class="event_name"><a href="/events/a">A</a></td></tr></table>"#;
        let slow = Slow(grid_routes(list), std::time::Duration::from_millis(1100));
        let orchestrator = CrawlOrchestrator::new(Arc::new(slow), settings()).with_now(now());
        let sources = vec![Source::new("The Beacon Theatre", Family::CalendarGrid, &[GRID])];

        let result = orchestrator.run(&sources).await.unwrap();
        // Two sequential fetches: listing, then detail
        let lag = result.harvested_at.with_timezone(&Utc) - now();
        assert!(lag >= Duration::seconds(2), "stamp lags the run by {lag}");
        assert_eq!(result.harvested_at.offset().local_minus_utc(), -4 * 3600);
    }

    #[tokio::test]
    async fn test_no_sources_is_a_config_error() {
        let orchestrator =
            CrawlOrchestrator::new(Arc::new(grid_routes("")), settings()).with_now(now());
        assert!(matches!(
            orchestrator.run(&[]).await,
            Err(ScraperError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_every_source_empty_is_total_failure() {
        let orchestrator =
            CrawlOrchestrator::new(Arc::new(grid_routes("<p>no events</p>")), settings())
                .with_now(now());
        let sources = vec![
            Source::new("The Beacon Theatre", Family::CalendarGrid, &[GRID]),
            Source::new("Nowhere", Family::CalendarGrid, &["http://nowhere.example/"]),
        ];
        assert!(matches!(
            orchestrator.run(&sources).await,
            Err(ScraperError::TotalFailure { sources: 2 })
        ));
    }
}
