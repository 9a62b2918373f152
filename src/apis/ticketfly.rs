use super::{ExtractionStrategy, ParseContext};
use crate::error::{Result, ScraperError};
use crate::pagination::next_cursor;
use crate::types::{Event, FetchRequest, Fragment, Page};
use chrono::Duration;
use chrono_tz::Tz;
use regex::{Regex, RegexBuilder};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

const MAX_RESULTS: u32 = 1000;
const DAYS_BEHIND: i64 = 7;
const DAYS_AHEAD: i64 = 3 * 31;
const START_DATE_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
    page_num: u32,
    total_pages: u32,
    #[serde(default)]
    events: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    #[serde(default)]
    headliners: Vec<Act>,
    #[serde(default)]
    supports: Vec<Act>,
    venue: Venue,
    start_date: String,
    ticket_purchase_url: String,
}

#[derive(Debug, Deserialize)]
struct Act {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Venue {
    name: String,
    time_zone: Option<String>,
}

/// TicketFly's paginated events-list API. Every page, the first included, is a
/// listing page; there is no detail stage.
pub struct TicketFly {
    venue_id: u32,
    org_id: Option<u32>,
    exclude_artist: Option<Regex>,
}

impl TicketFly {
    pub fn new(venue_id: u32, org_id: Option<u32>, exclude_artist: Option<&str>) -> Result<Self> {
        let exclude_artist = exclude_artist
            .map(|re| {
                RegexBuilder::new(re)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ScraperError::Config(format!("invalid exclusion '{re}': {e}")))
            })
            .transpose()?;
        Ok(Self {
            venue_id,
            org_id,
            exclude_artist,
        })
    }

    /// Query URL for one page of this venue's events, windowed around today.
    fn page_url(&self, endpoint: &str, page_num: u32, ctx: &ParseContext<'_>) -> Result<String> {
        let today = ctx.dates.now().date_naive();
        let from = (today - Duration::days(DAYS_BEHIND)).format("%Y-%m-%d 00:00:00");
        let thru = (today + Duration::days(DAYS_AHEAD)).format("%Y-%m-%d 23:59:59");

        let mut params = vec![
            ("maxResults", MAX_RESULTS.to_string()),
            ("venueId", self.venue_id.to_string()),
            ("fromDate", from.to_string()),
            ("thruDate", thru.to_string()),
            ("pageNum", page_num.to_string()),
        ];
        if let Some(org_id) = self.org_id {
            params.push(("orgId", org_id.to_string()));
        }
        Url::parse_with_params(endpoint, &params)
            .map(String::from)
            .map_err(|e| ScraperError::Config(format!("invalid API endpoint '{endpoint}': {e}")))
    }

    fn is_excluded(&self, artists: &[String]) -> bool {
        self.exclude_artist
            .as_ref()
            .is_some_and(|re| artists.iter().any(|artist| re.is_match(artist)))
    }

    fn to_event(&self, record: EventRecord, ctx: &ParseContext<'_>) -> Result<Event> {
        let zone = match record.venue.time_zone.as_deref() {
            Some(name) => match name.parse::<Tz>() {
                Ok(zone) => Some(zone),
                Err(_) => {
                    debug!(zone = name, "Unknown venue time zone, using reference zone");
                    None
                }
            },
            None => None,
        };
        let start = ctx
            .dates
            .normalize(&[&record.start_date], START_DATE_PATTERN, zone, None)?;
        let venue_name = if record.venue.name.trim().is_empty() {
            ctx.source.name.clone()
        } else {
            record.venue.name
        };
        let artists = record
            .headliners
            .into_iter()
            .chain(record.supports)
            .map(|act| act.name);
        Event::new(artists, venue_name, start, record.ticket_purchase_url)
    }
}

/// Same query with `pageNum` swapped for `page_num`.
fn with_page(url: &str, page_num: u32) -> Option<String> {
    let mut url = Url::parse(url).ok()?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "pageNum")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("pageNum", &page_num.to_string());
    Some(url.to_string())
}

impl ExtractionStrategy for TicketFly {
    fn seed_requests(&self, ctx: &ParseContext<'_>) -> Vec<FetchRequest> {
        ctx.source
            .seed_urls
            .iter()
            .filter_map(|endpoint| match self.page_url(endpoint, 1, ctx) {
                Ok(url) => Some(FetchRequest::seed(url)),
                Err(e) => {
                    warn!(source = %ctx.source.name, error = %e, "Unusable API endpoint");
                    None
                }
            })
            .collect()
    }

    fn parse_list(&self, page: &Page, ctx: &ParseContext<'_>) -> Vec<Fragment> {
        let list: EventList = match serde_json::from_str(&page.body) {
            Ok(list) => list,
            Err(e) => return vec![Fragment::Skip(e.into())],
        };
        debug!(
            url = %page.url,
            page_num = list.page_num,
            total_pages = list.total_pages,
            records = list.events.len(),
            "TicketFly page"
        );

        // A page with no records ends the walk even if totalPages says otherwise
        let next = if list.events.is_empty() {
            None
        } else {
            next_cursor(list.page_num, list.total_pages)
        };

        let mut fragments = Vec::with_capacity(list.events.len() + 1);
        for record in list.events {
            match self.to_event(record, ctx) {
                Ok(event) if self.is_excluded(&event.artists) => {
                    debug!(artists = ?event.artists, "Excluded by artist filter");
                }
                result => fragments.push(result.into()),
            }
        }
        if let Some(page_num) = next {
            match with_page(&page.url, page_num) {
                Some(url) => fragments.push(Fragment::Request(FetchRequest::listing(url))),
                None => fragments.push(Fragment::Skip(ScraperError::ParseStructure(format!(
                    "cannot build page {page_num} from {}",
                    page.url
                )))),
            }
        }
        fragments
    }
}
