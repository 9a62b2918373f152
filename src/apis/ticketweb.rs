use super::{element_text, first_text, pattern, selector, ExtractionStrategy, ParseContext};
use crate::error::{Result, ScraperError};
use crate::pagination::discover_pages;
use crate::types::{Event, FetchRequest, Fragment, Page};
use regex::Regex;
use scraper::Selector;
use tracing::debug;

const EVENT_URL: &str =
    "http://www.ticketweb.com/t3/sale/SaleEventDetail?dispatch=loadSelectionData&eventId=";
const DATE_PATTERN: &str = "%A, %B %d, %Y %I:%M %p";

/// TicketWeb venue pages: paginated listing, one detail page per event
pub struct TicketWeb {
    pagination: Selector,
    event_link: Selector,
    artist: Selector,
    date_text: Selector,
    event_id: Regex,
    // "Friday, May 06, 2016 8:00 PM EDT"; the zone abbreviation is split off
    date_and_zone: Regex,
}

impl TicketWeb {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pagination: selector(".pagination-nav li")?,
            event_link: selector(".event-list .media-body .event-name a")?,
            artist: selector(".artist-text .highlight span")?,
            date_text: selector("#edp-artist-Col .artist-text p")?,
            event_id: pattern(r"eventId=(\d+)")?,
            date_and_zone: pattern(r"^(\w+, \w+ \d+, \d{4} \d+:\d+ [AP]M) (\w+)")?,
        })
    }

    /// Listing hrefs carry client-side template noise, so only the id is kept.
    pub fn canonical_event_url(&self, href: &str) -> Option<String> {
        let id = self.event_id.captures(href)?.get(1)?.as_str();
        Some(format!("{EVENT_URL}{id}"))
    }
}

impl ExtractionStrategy for TicketWeb {
    /// The seed is listing page 1; its pagination widget names the rest.
    fn parse_seed(&self, page: &Page, ctx: &ParseContext<'_>) -> Vec<Fragment> {
        let further: Vec<String> = {
            let document = page.document();
            discover_pages(&page.url, &document, &self.pagination)
                .into_iter()
                .skip(1)
                .collect()
        };
        let mut fragments: Vec<Fragment> = further
            .into_iter()
            .map(|url| Fragment::Request(FetchRequest::listing(url)))
            .collect();
        fragments.extend(self.parse_list(page, ctx));
        fragments
    }

    fn parse_list(&self, page: &Page, _ctx: &ParseContext<'_>) -> Vec<Fragment> {
        let document = page.document();
        document
            .select(&self.event_link)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| match self.canonical_event_url(href) {
                Some(url) => Fragment::Request(FetchRequest::detail(url)),
                None => Fragment::Skip(ScraperError::ParseStructure(format!(
                    "no event id in link '{href}' on {}",
                    page.url
                ))),
            })
            .collect()
    }

    fn parse_detail(
        &self,
        page: &Page,
        _carried: Option<&str>,
        ctx: &ParseContext<'_>,
    ) -> Vec<Fragment> {
        let document = page.document();
        let artists: Vec<String> = document.select(&self.artist).map(element_text).collect();
        if artists.is_empty() {
            return vec![Fragment::Skip(ScraperError::ParseStructure(format!(
                "no artists on {}",
                page.url
            )))];
        }
        let Some(text) = document.select(&self.date_text).next().and_then(first_text) else {
            return vec![Fragment::Skip(ScraperError::ParseStructure(format!(
                "no date text on {}",
                page.url
            )))];
        };

        let event = self
            .date_and_zone
            .captures(&text)
            .ok_or_else(|| ScraperError::date_format(text.as_str(), DATE_PATTERN))
            .and_then(|caps| {
                let abbreviation = caps.get(2).map(|m| m.as_str());
                debug!(url = %page.url, ?abbreviation, "TicketWeb date");
                ctx.dates
                    .normalize(&[&caps[1]], DATE_PATTERN, None, abbreviation)
            })
            .and_then(|start| {
                Event::new(artists, ctx.source.name.as_str(), start, page.url.as_str())
            });
        vec![event.into()]
    }
}
