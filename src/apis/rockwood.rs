use super::{first_text, pattern, selector, ExtractionStrategy, ParseContext};
use crate::error::{Result, ScraperError};
use crate::types::{Event, Fragment, Instant, Page};
use chrono::{Duration, NaiveDate};
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::debug;

/// One stage column of the Rockwood Music Hall front page. Each day-block has a
/// `MM.DD` header and a table of `H:MMam/pm` slots.
pub struct Rockwood {
    scope: Selector,
    join_rows: bool,
    late_night_rollover: bool,
    header: Selector,
    row: Selector,
    cell: Selector,
    link: Selector,
    strong: Selector,
    day: Regex,
    time: Regex,
}

struct Slot {
    artist: String,
    start: Instant,
}

impl Rockwood {
    pub fn new(scope: &str, join_rows: bool, late_night_rollover: bool) -> Result<Self> {
        Ok(Self {
            scope: selector(scope)?,
            join_rows,
            late_night_rollover,
            header: selector("h2")?,
            row: selector(".sched_pod tr")?,
            cell: selector("td")?,
            link: selector("a")?,
            strong: selector("strong")?,
            day: pattern(r"^(\d\d)\.(\d\d)")?,
            time: pattern(r"^(\d+):(\d\d)([ap]m)")?,
        })
    }

    fn block_date(&self, header: &str, ctx: &ParseContext<'_>) -> Result<NaiveDate> {
        let caps = self
            .day
            .captures(header)
            .ok_or_else(|| ScraperError::date_format(header, "MM.DD"))?;
        let (Ok(month), Ok(day)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            return Err(ScraperError::date_format(header, "MM.DD"));
        };
        NaiveDate::from_ymd_opt(ctx.dates.infer_year(month), month, day)
            .ok_or_else(|| ScraperError::date_format(header, "MM.DD"))
    }

    /// A row's slot, or `None` for rows that are not time/artist pairs.
    fn slot(&self, row: ElementRef<'_>, date: NaiveDate, ctx: &ParseContext<'_>) -> Option<Slot> {
        let mut cells = row.select(&self.cell);
        let time_text = first_text(cells.next()?)?;
        let caps = self.time.captures(&time_text)?;
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        let morning = &caps[3] == "am";

        let artist_cell = cells.next()?;
        let artist = artist_cell
            .select(&self.link)
            .next()
            .or_else(|| artist_cell.select(&self.strong).next())
            .and_then(first_text)?;

        let hour = if morning { hour % 12 } else { hour % 12 + 12 };
        let mut naive = date.and_hms_opt(hour, minute, 0)?;
        // Morning slots belong to the night that started on the block's date
        if morning && self.late_night_rollover {
            naive += Duration::days(1);
        }
        let start = ctx.dates.localize(naive, None, None)?;
        Some(Slot { artist, start })
    }

    fn parse_block(
        &self,
        block: ElementRef<'_>,
        page: &Page,
        ctx: &ParseContext<'_>,
    ) -> Vec<Fragment> {
        let Some(header) = block.select(&self.header).next().and_then(first_text) else {
            debug!(url = %page.url, "Day-block without a header");
            return Vec::new();
        };
        let date = match self.block_date(&header, ctx) {
            Ok(date) => date,
            Err(e) => return vec![Fragment::Skip(e)],
        };

        let mut slots: Vec<Slot> = block
            .select(&self.row)
            .filter_map(|row| self.slot(row, date, ctx))
            .collect();
        if slots.is_empty() {
            return vec![Fragment::Skip(ScraperError::ParseStructure(format!(
                "no scheduled acts under '{header}' on {}",
                page.url
            )))];
        }
        slots.sort_by_key(|slot| slot.start);

        let venue = ctx.source.name.as_str();
        if self.join_rows {
            let start = slots[0].start;
            let artists = slots
                .iter()
                .map(|slot| format!("{} ({})", slot.artist, slot.start.format("%-I:%M")));
            vec![Event::new(artists, venue, start, page.url.as_str()).into()]
        } else {
            slots
                .into_iter()
                .map(|slot| Event::new([slot.artist], venue, slot.start, page.url.as_str()).into())
                .collect()
        }
    }
}

impl ExtractionStrategy for Rockwood {
    fn parse_list(&self, page: &Page, ctx: &ParseContext<'_>) -> Vec<Fragment> {
        let document = page.document();
        document
            .select(&self.scope)
            .flat_map(|block| self.parse_block(block, page, ctx))
            .collect()
    }
}
