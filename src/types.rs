use crate::error::{Result, ScraperError};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A timezone-qualified point in time. Always carries an explicit UTC offset.
pub type Instant = DateTime<FixedOffset>;

/// One normalized show at one venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub artists: Vec<String>,
    pub venue_name: String,
    #[serde(rename = "date")]
    pub start: Instant,
    #[serde(rename = "event_link")]
    pub link: String,
}

impl Event {
    /// Builds an event, dropping blank artist names. Fails when no artist is left
    /// or when the venue name or link is blank.
    pub fn new(
        artists: impl IntoIterator<Item = String>,
        venue_name: impl Into<String>,
        start: Instant,
        link: impl Into<String>,
    ) -> Result<Self> {
        let artists: Vec<String> = artists
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        let link = Into::<String>::into(link).trim().to_string();
        let venue_name = Into::<String>::into(venue_name).trim().to_string();
        if link.is_empty() {
            return Err(ScraperError::ParseStructure(format!(
                "no event link for show at '{venue_name}'"
            )));
        }
        if venue_name.is_empty() {
            return Err(ScraperError::ParseStructure(format!("no venue name for {link}")));
        }
        if artists.is_empty() {
            return Err(ScraperError::ParseStructure(format!(
                "no artist names for {link}"
            )));
        }
        Ok(Self {
            artists,
            venue_name,
            start,
            link,
        })
    }
}

/// Page/API shape a source conforms to, with the parameters that shape needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Family {
    BoweryPresents,
    TicketWebHtml,
    TicketFlyApi {
        venue_id: u32,
        #[serde(default)]
        org_id: Option<u32>,
        /// Case-insensitive regex; records with a matching artist are dropped
        #[serde(default)]
        exclude_artist_pattern: Option<String>,
    },
    RockwoodTable {
        /// CSS selector matching the day-blocks of one stage column
        scope: String,
        #[serde(default = "default_true")]
        join_rows: bool,
        #[serde(default = "default_true")]
        late_night_rollover: bool,
    },
    CalendarGrid,
    CityWinery,
}

fn default_true() -> bool {
    true
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::BoweryPresents => "bowery_presents",
            Family::TicketWebHtml => "ticket_web_html",
            Family::TicketFlyApi { .. } => "ticket_fly_api",
            Family::RockwoodTable { .. } => "rockwood_table",
            Family::CalendarGrid => "calendar_grid",
            Family::CityWinery => "city_winery",
        };
        f.write_str(name)
    }
}

/// One venue (or venue group) to harvest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    #[serde(flatten)]
    pub family: Family,
    pub seed_urls: Vec<String>,
}

impl Source {
    pub fn new(name: impl Into<String>, family: Family, seed_urls: &[&str]) -> Self {
        Self {
            name: name.into(),
            family,
            seed_urls: seed_urls.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Which strategy callback a fetched page is handed to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    /// A source's start page; may reveal further listing pages
    Seed,
    Listing,
    /// A detail page, optionally with text carried over from the listing
    Detail { carried: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub url: String,
    pub stage: Stage,
}

impl FetchRequest {
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stage: Stage::Seed,
        }
    }

    pub fn listing(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stage: Stage::Listing,
        }
    }

    pub fn detail(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stage: Stage::Detail { carried: None },
        }
    }

    pub fn detail_with(url: impl Into<String>, carried: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stage: Stage::Detail {
                carried: Some(carried.into()),
            },
        }
    }
}

/// Output unit of a strategy callback
#[derive(Debug)]
pub enum Fragment {
    Request(FetchRequest),
    Event(Event),
    /// One item could not be extracted; the crawl carries on
    Skip(ScraperError),
}

impl From<Result<Event>> for Fragment {
    fn from(result: Result<Event>) -> Self {
        match result {
            Ok(event) => Fragment::Event(event),
            Err(e) => Fragment::Skip(e),
        }
    }
}

/// A fetched document: the final URL after redirects plus the raw body
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub body: String,
}

impl Page {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    pub fn document(&self) -> scraper::Html {
        scraper::Html::parse_document(&self.body)
    }
}

/// The single snapshot a harvest run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    #[serde(rename = "updated")]
    pub harvested_at: Instant,
    pub shows: BTreeMap<String, Vec<Event>>,
    /// Set when the run hit its deadline before every source drained
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub incomplete: bool,
}

impl AggregateResult {
    pub fn total_events(&self) -> usize {
        self.shows.values().map(Vec::len).sum()
    }
}
