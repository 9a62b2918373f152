use super::{detail_link, element_text, first_text, selector, ExtractionStrategy, ParseContext};
use crate::dates::DateNormalizer;
use crate::error::{Result, ScraperError};
use crate::types::{Event, Fragment, Instant, Page};
use scraper::{Html, Selector};
use tracing::debug;

const HUMAN_DATE_PATTERN: &str = "%a, %B %d, %Y %I:%M %p";

/// Calendar sites sharing the Bowery Presents layout: one calendar page of
/// headliner links, one detail page per show.
pub struct BoweryPresents {
    event_link: Selector,
    artist_name: Selector,
    machine_date: Selector,
    human_date: Selector,
    doors_time: Selector,
}

impl BoweryPresents {
    pub fn new() -> Result<Self> {
        Ok(Self {
            event_link: selector(".tfly-calendar .one-event .headliners > a")?,
            artist_name: selector(".artist-boxes .artist-name")?,
            machine_date: selector(".event-info .times .value-title")?,
            human_date: selector(".event-info .dates")?,
            doors_time: selector(".event-info .times .doors")?,
        })
    }

    fn start(&self, document: &Html, ctx: &ParseContext<'_>) -> Result<Instant> {
        if let Some(title) = document
            .select(&self.machine_date)
            .find_map(|el| el.value().attr("title"))
        {
            return DateNormalizer::parse_machine(title);
        }

        let date = document
            .select(&self.human_date)
            .next()
            .and_then(first_text)
            .ok_or_else(|| ScraperError::ParseStructure("no event date".into()))?;
        let doors = document
            .select(&self.doors_time)
            .next()
            .and_then(first_text)
            .ok_or_else(|| ScraperError::ParseStructure("no doors time".into()))?;
        let doors = doors.trim_start_matches("Doors:").trim();
        ctx.dates.normalize(&[&date, doors], HUMAN_DATE_PATTERN, None, None)
    }
}

impl ExtractionStrategy for BoweryPresents {
    fn parse_list(&self, page: &Page, _ctx: &ParseContext<'_>) -> Vec<Fragment> {
        let document = page.document();
        document
            .select(&self.event_link)
            .map(|a| detail_link(&page.url, a))
            .collect()
    }

    fn parse_detail(
        &self,
        page: &Page,
        _carried: Option<&str>,
        ctx: &ParseContext<'_>,
    ) -> Vec<Fragment> {
        let document = page.document();
        let artists: Vec<String> = document.select(&self.artist_name).map(element_text).collect();
        let event = self.start(&document, ctx).and_then(|start| {
            Event::new(artists, ctx.source.name.as_str(), start, page.url.as_str())
        });
        if let Err(e) = &event {
            debug!(url = %page.url, error = %e, "Bowery detail page unusable");
        }
        vec![event.into()]
    }
}
