use super::{detail_link, first_text, selector, ExtractionStrategy, ParseContext};
use crate::error::{Result, ScraperError};
use crate::types::{Event, Fragment, Page};
use scraper::{ElementRef, Selector};

const DATE_PATTERN: &str = "%b %d %Y %I:%M %p";

/// Calendar pages of the Madison Square Garden family of venues. A detail page
/// lists every date of one title, so residencies become one event per date.
pub struct CalendarGrid {
    event_link: Selector,
    title: Selector,
    date_box: Selector,
    month: Selector,
    day: Selector,
    year: Selector,
    time: Selector,
}

impl CalendarGrid {
    pub fn new() -> Result<Self> {
        Ok(Self {
            event_link: selector("td.event_name a")?,
            title: selector("#event-information .event-title")?,
            date_box: selector(".box-event-calendar")?,
            month: selector(".m-event")?,
            day: selector(".number-day-event")?,
            year: selector(".d-event")?,
            time: selector(".time-event")?,
        })
    }

    fn date_parts(&self, date_box: ElementRef<'_>) -> Option<[String; 4]> {
        let part = |sel: &Selector| date_box.select(sel).next().and_then(first_text);
        Some([
            part(&self.month)?,
            part(&self.day)?,
            part(&self.year)?,
            part(&self.time)?,
        ])
    }
}

impl ExtractionStrategy for CalendarGrid {
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
        let Some(title) = document.select(&self.title).next().and_then(first_text) else {
            return vec![Fragment::Skip(ScraperError::ParseStructure(format!(
                "no event title on {}",
                page.url
            )))];
        };

        let fragments: Vec<Fragment> = document
            .select(&self.date_box)
            .map(|date_box| {
                let parts = self.date_parts(date_box).ok_or_else(|| {
                    ScraperError::ParseStructure(format!(
                        "incomplete calendar date for '{title}' on {}",
                        page.url
                    ))
                })?;
                let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
                let start = ctx.dates.normalize(&parts, DATE_PATTERN, None, None)?;
                Event::new([title.clone()], ctx.source.name.as_str(), start, page.url.as_str())
            })
            .map(Fragment::from)
            .collect();

        if fragments.is_empty() {
            return vec![Fragment::Skip(ScraperError::ParseStructure(format!(
                "no calendar dates for '{title}' on {}",
                page.url
            )))];
        }
        fragments
    }
}
