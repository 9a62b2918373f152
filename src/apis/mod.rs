//! Extraction strategies, one per source family.

pub mod bowery_presents;
pub mod calendar_grid;
pub mod city_winery;
pub mod rockwood;
pub mod ticketfly;
pub mod ticketweb;

use crate::dates::DateNormalizer;
use crate::error::{Result, ScraperError};
use crate::types::{FetchRequest, Fragment, Page, Source, Stage};
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Selector};

/// What a strategy knows about the run while parsing one page
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub source: &'a Source,
    pub dates: &'a DateNormalizer,
}

/// Per-family page handling
pub trait ExtractionStrategy {
    /// First requests of a source
    fn seed_requests(&self, ctx: &ParseContext<'_>) -> Vec<FetchRequest> {
        ctx.source
            .seed_urls
            .iter()
            .map(|url| FetchRequest::seed(url.as_str()))
            .collect()
    }

    /// A source's start page. Same as any listing page unless the family paginates.
    fn parse_seed(&self, page: &Page, ctx: &ParseContext<'_>) -> Vec<Fragment> {
        self.parse_list(page, ctx)
    }

    fn parse_list(&self, page: &Page, ctx: &ParseContext<'_>) -> Vec<Fragment>;

    /// Families whose listing already yields events have no detail stage.
    fn parse_detail(
        &self,
        _page: &Page,
        _carried: Option<&str>,
        _ctx: &ParseContext<'_>,
    ) -> Vec<Fragment> {
        Vec::new()
    }
}

/// Strategy chosen by a source's family tag
pub enum Strategy {
    BoweryPresents(bowery_presents::BoweryPresents),
    TicketWeb(ticketweb::TicketWeb),
    TicketFly(ticketfly::TicketFly),
    Rockwood(rockwood::Rockwood),
    CalendarGrid(calendar_grid::CalendarGrid),
    CityWinery(city_winery::CityWinery),
}

impl Strategy {
    pub fn for_source(source: &Source) -> Result<Self> {
        use crate::types::Family;

        if source.seed_urls.is_empty() {
            return Err(ScraperError::Config(format!(
                "source '{}' has no seed URLs",
                source.name
            )));
        }
        Ok(match &source.family {
            Family::BoweryPresents => {
                Strategy::BoweryPresents(bowery_presents::BoweryPresents::new()?)
            }
            Family::TicketWebHtml => Strategy::TicketWeb(ticketweb::TicketWeb::new()?),
            Family::TicketFlyApi {
                venue_id,
                org_id,
                exclude_artist_pattern,
            } => Strategy::TicketFly(ticketfly::TicketFly::new(
                *venue_id,
                *org_id,
                exclude_artist_pattern.as_deref(),
            )?),
            Family::RockwoodTable {
                scope,
                join_rows,
                late_night_rollover,
            } => Strategy::Rockwood(rockwood::Rockwood::new(
                scope,
                *join_rows,
                *late_night_rollover,
            )?),
            Family::CalendarGrid => Strategy::CalendarGrid(calendar_grid::CalendarGrid::new()?),
            Family::CityWinery => Strategy::CityWinery(city_winery::CityWinery::new()?),
        })
    }

    fn inner(&self) -> &dyn ExtractionStrategy {
        match self {
            Strategy::BoweryPresents(s) => s,
            Strategy::TicketWeb(s) => s,
            Strategy::TicketFly(s) => s,
            Strategy::Rockwood(s) => s,
            Strategy::CalendarGrid(s) => s,
            Strategy::CityWinery(s) => s,
        }
    }

    pub fn seed_requests(&self, ctx: &ParseContext<'_>) -> Vec<FetchRequest> {
        self.inner().seed_requests(ctx)
    }

    /// Routes a fetched page to the callback its request was tagged with.
    pub fn handle(&self, stage: &Stage, page: &Page, ctx: &ParseContext<'_>) -> Vec<Fragment> {
        let strategy = self.inner();
        match stage {
            Stage::Seed => strategy.parse_seed(page, ctx),
            Stage::Listing => strategy.parse_list(page, ctx),
            Stage::Detail { carried } => strategy.parse_detail(page, carried.as_deref(), ctx),
        }
    }
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScraperError::Config(format!("invalid selector '{css}': {e:?}")))
}

pub(crate) fn pattern(re: &str) -> Result<Regex> {
    Regex::new(re).map_err(|e| ScraperError::Config(format!("invalid pattern '{re}': {e}")))
}

/// All text below `element`, whitespace-collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The element's first non-blank text node, trimmed.
pub(crate) fn first_text(element: ElementRef<'_>) -> Option<String> {
    element
        .text()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// Resolves `href` against the page it was found on.
pub(crate) fn absolute_url(page_url: &str, href: &str) -> Option<String> {
    Url::parse(page_url)
        .ok()?
        .join(href.trim())
        .ok()
        .map(|u| u.to_string())
}

/// Detail request for a listing link, or a `Skip` when the link cannot be resolved.
pub(crate) fn detail_link(page_url: &str, link: ElementRef<'_>) -> Fragment {
    let href = link.value().attr("href").unwrap_or_default();
    match absolute_url(page_url, href) {
        Some(url) if !href.trim().is_empty() => Fragment::Request(FetchRequest::detail(url)),
        _ => Fragment::Skip(ScraperError::ParseStructure(format!(
            "unusable event link '{href}' on {page_url}"
        ))),
    }
}
