use super::{absolute_url, first_text, pattern, selector, ExtractionStrategy, ParseContext};
use crate::error::{Result, ScraperError};
use crate::pagination::next_link;
use crate::types::{Event, FetchRequest, Fragment, Page};
use regex::Regex;
use scraper::Selector;

const DATE_PATTERN: &str = "%A, %B %d %I:%M %p";

/// City Winery's ticket list. Listing entries carry a yearless date that travels
/// with the detail request; the detail page supplies the time and title.
pub struct CityWinery {
    entry: Selector,
    entry_date: Selector,
    entry_link: Selector,
    next_page: Selector,
    times: Selector,
    title: Selector,
    clock: Regex,
    title_suffix: Regex,
}

impl CityWinery {
    pub fn new() -> Result<Self> {
        Ok(Self {
            entry: selector(".tickets-content.products-container dl")?,
            entry_date: selector("dt")?,
            entry_link: selector("p.addtocart a")?,
            next_page: selector("a.next")?,
            times: selector(".event-head .left strong")?,
            title: selector(".event-head h1")?,
            clock: pattern(r"\d+:\d+ [AaPp][Mm]")?,
            title_suffix: pattern(r"^(.+)-")?,
        })
    }
}

impl ExtractionStrategy for CityWinery {
    fn parse_list(&self, page: &Page, _ctx: &ParseContext<'_>) -> Vec<Fragment> {
        let document = page.document();
        let mut fragments: Vec<Fragment> = document
            .select(&self.entry)
            .map(|entry| {
                let date = entry.select(&self.entry_date).next().and_then(first_text);
                let link = entry
                    .select(&self.entry_link)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| absolute_url(&page.url, href));
                match (link, date) {
                    (Some(link), Some(date)) => {
                        Fragment::Request(FetchRequest::detail_with(link, date))
                    }
                    _ => Fragment::Skip(ScraperError::ParseStructure(format!(
                        "listing entry without date or link on {}",
                        page.url
                    ))),
                }
            })
            .collect();
        if let Some(next) = next_link(&page.url, &document, &self.next_page) {
            fragments.push(Fragment::Request(FetchRequest::listing(next)));
        }
        fragments
    }

    fn parse_detail(
        &self,
        page: &Page,
        carried: Option<&str>,
        ctx: &ParseContext<'_>,
    ) -> Vec<Fragment> {
        let Some(date) = carried else {
            return vec![Fragment::Skip(ScraperError::ParseStructure(format!(
                "no listing date carried to {}",
                page.url
            )))];
        };
        let document = page.document();

        let times: Vec<String> = document.select(&self.times).filter_map(first_text).collect();
        let chosen = times
            .iter()
            .find(|t| t.to_lowercase().contains("start"))
            .or_else(|| times.first());
        let Some(clock) = chosen.and_then(|t| self.clock.find(t)) else {
            return vec![Fragment::Skip(ScraperError::ParseStructure(format!(
                "no start time on {}",
                page.url
            )))];
        };

        let Some(heading) = document.select(&self.title).next().and_then(first_text) else {
            return vec![Fragment::Skip(ScraperError::ParseStructure(format!(
                "no event title on {}",
                page.url
            )))];
        };
        // "Artist - Special Event" keeps just the artist
        let title = match self.title_suffix.captures(&heading) {
            Some(caps) => caps[1].trim().to_string(),
            None => heading.clone(),
        };

        let event = ctx
            .dates
            .normalize(&[date, clock.as_str()], DATE_PATTERN, None, None)
            .and_then(|start| {
                Event::new([title], ctx.source.name.as_str(), start, page.url.as_str())
            });
        vec![event.into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateNormalizer;
    use crate::types::{Family, Source, Stage};
    use chrono::{DateTime, Utc};

    const SEED: &str =
        "http://www.citywinery.com/newyork/tickets.html?cat=40&limit=100&p=0&view=list";

    fn run<F>(f: F) -> Vec<Fragment>
    where
        F: FnOnce(&CityWinery, &ParseContext<'_>) -> Vec<Fragment>,
    {
        let src = Source::new("City Winery", Family::CityWinery, &[SEED]);
        let dates = DateNormalizer::new(
            DateTime::parse_from_rfc3339("2016-11-15T12:00:00-05:00")
                .unwrap()
                .with_timezone(&Utc),
        );
        let ctx = ParseContext { source: &src, dates: &dates };
        f(&CityWinery::new().unwrap(), &ctx)
    }

    #[test]
    fn test_list_carries_date_and_follows_next_link() {
        let page = Page::new(
            SEED,
            r#"<div class="tickets-content products-container">
                 <dl><dt> Friday, January 13 </dt>
                     <dd><p class="addtocart"><a href="http://www.citywinery.com/newyork/joan-osborne.html">Buy</a></p></dd></dl>
                 <dl><dt>Saturday, January 14</dt></dl>
               </div>
               <a class="next" href="tickets.html?cat=40&amp;limit=100&amp;p=1&amp;view=list">Next</a>"#,
        );
        let fragments = run(|cw, ctx| cw.parse_list(&page, ctx));
        assert_eq!(fragments.len(), 3);
        match &fragments[0] {
            Fragment::Request(r) => {
                assert_eq!(r.url, "http://www.citywinery.com/newyork/joan-osborne.html");
                assert_eq!(
                    r.stage,
                    Stage::Detail {
                        carried: Some("Friday, January 13".into())
                    }
                );
            }
            other => panic!("unexpected fragment: {other:?}"),
        }
        assert!(matches!(fragments[1], Fragment::Skip(_)));
        match &fragments[2] {
            Fragment::Request(r) => {
                assert_eq!(r.stage, Stage::Listing);
                assert_eq!(
                    r.url,
                    "http://www.citywinery.com/newyork/tickets.html?cat=40&limit=100&p=1&view=list"
                );
            }
            other => panic!("unexpected fragment: {other:?}"),
        }
    }

    const DETAIL: &str = r#"
        <div class="event-head">
          <h1>Joan Osborne - Songs of Bob Dylan</h1>
          <div class="left">
            <strong>Doors: 6:00 PM</strong>
            <strong>Show Start: 8:00 PM</strong>
          </div>
        </div>"#;

    #[test]
    fn test_detail_prefers_start_time_and_rolls_year() {
        let page = Page::new("http://www.citywinery.com/newyork/joan-osborne.html", DETAIL);
        let fragments = run(|cw, ctx| cw.parse_detail(&page, Some("Friday, January 13"), ctx));
        match fragments.as_slice() {
            [Fragment::Event(event)] => {
                assert_eq!(event.artists, vec!["Joan Osborne"]);
                assert_eq!(event.venue_name, "City Winery");
                assert_eq!(event.start.to_rfc3339(), "2017-01-13T20:00:00-05:00");
                assert_eq!(event.link, page.url);
            }
            other => panic!("unexpected fragments: {other:?}"),
        }
    }

    #[test]
    fn test_detail_without_carried_date_or_time_is_skipped() {
        let page = Page::new("http://www.citywinery.com/newyork/joan-osborne.html", DETAIL);
        let fragments = run(|cw, ctx| cw.parse_detail(&page, None, ctx));
        assert!(matches!(fragments.as_slice(), [Fragment::Skip(_)]));

        let no_time = Page::new(
            "http://www.citywinery.com/newyork/x.html",
            r#"<div class="event-head"><h1>Someone</h1><div class="left"><strong>TBA</strong></div></div>"#,
        );
        let fragments = run(|cw, ctx| cw.parse_detail(&no_time, Some("Friday, January 13"), ctx));
        assert!(matches!(
            fragments.as_slice(),
            [Fragment::Skip(ScraperError::ParseStructure(_))]
        ));
    }
}
