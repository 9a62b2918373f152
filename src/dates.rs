//! Date/time normalization.
//!
//! Every source spells dates differently. This module turns those spellings into
//! an [`Instant`] with an explicit offset, so nothing downstream ever sees a
//! naive local time.

use crate::error::{Result, ScraperError};
use crate::types::Instant;
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, LocalResult, NaiveDateTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;
use tracing::debug;

/// Zone every venue-local time is materialized in unless a source names its own
pub const REFERENCE_ZONE: Tz = chrono_tz::America::New_York;

#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    zone: Tz,
    now: DateTime<Tz>,
}

impl DateNormalizer {
    /// Normalizer for the reference zone, with `now` as the year-inference anchor.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_zone(REFERENCE_ZONE, now)
    }

    pub fn with_zone(zone: Tz, now: DateTime<Utc>) -> Self {
        Self {
            zone,
            now: now.with_timezone(&zone),
        }
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.now
    }

    /// Joins `raw_parts` with single spaces and parses them with `pattern`.
    ///
    /// A pattern without a year gets one inferred with [`Self::infer_year`]. A
    /// `dst_hint` abbreviation such as `EDT` fixes the offset outright; otherwise the
    /// offset comes from `zone_hint` (or the reference zone) for that wall-clock time.
    pub fn normalize(
        &self,
        raw_parts: &[&str],
        pattern: &str,
        zone_hint: Option<Tz>,
        dst_hint: Option<&str>,
    ) -> Result<Instant> {
        let raw = raw_parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let naive = self.parse_naive(&raw, pattern)?;
        self.localize(naive, zone_hint, dst_hint)
            .ok_or_else(|| ScraperError::date_format(raw, pattern))
    }

    fn parse_naive(&self, raw: &str, pattern: &str) -> Result<NaiveDateTime> {
        if pattern.contains("%Y") || pattern.contains("%y") {
            return NaiveDateTime::parse_from_str(raw, pattern)
                .map_err(|_| ScraperError::date_format(raw, pattern));
        }

        // The inferred year wins over a weekday that disagrees with it
        let in_year = |year: i32| {
            let dated = |raw: &str, pattern: &str| {
                NaiveDateTime::parse_from_str(&format!("{raw} {year}"), &format!("{pattern} %Y"))
                    .ok()
            };
            dated(raw, pattern).or_else(|| {
                let (raw, pattern) = without_weekday(raw, pattern)?;
                dated(raw, pattern)
            })
        };
        let this_year = self.now.year();
        let month = in_year(this_year)
            .or_else(|| in_year(this_year + 1))
            .map(|parsed| parsed.month())
            .ok_or_else(|| ScraperError::date_format(raw, pattern))?;
        in_year(self.infer_year(month)).ok_or_else(|| ScraperError::date_format(raw, pattern))
    }

    /// Year for a yearless month/day: the current year, or the next one when the
    /// month already lies behind `now`.
    pub fn infer_year(&self, month: u32) -> i32 {
        if self.now.month() > month {
            self.now.year() + 1
        } else {
            self.now.year()
        }
    }

    /// Attaches an offset to a naive wall-clock time.
    pub fn localize(
        &self,
        naive: NaiveDateTime,
        zone_hint: Option<Tz>,
        dst_hint: Option<&str>,
    ) -> Option<Instant> {
        if let Some(abbreviation) = dst_hint {
            match abbreviation_offset(abbreviation) {
                Some(offset) => return offset.from_local_datetime(&naive).single(),
                None => debug!(abbreviation, "Unknown zone abbreviation, using zone rules"),
            }
        }

        let zone = zone_hint.unwrap_or(self.zone);
        let resolved = match zone.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt,
            // Repeated hour at the end of DST: standard time
            LocalResult::Ambiguous(_, standard) => standard,
            // Skipped hour at the start of DST: shift past the gap
            LocalResult::None => zone
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()?,
        };
        Some(resolved.with_timezone(&resolved.offset().fix()))
    }

    /// Parses a machine-readable timestamp such as `2016-05-01T20:00:00-04:00`.
    pub fn parse_machine(raw: &str) -> Result<Instant> {
        let raw = raw.trim();
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
            .map_err(|_| ScraperError::date_format(raw, "RFC 3339"))
    }
}

/// Drops a leading weekday name from both the text and the pattern.
fn without_weekday<'a>(raw: &'a str, pattern: &'a str) -> Option<(&'a str, &'a str)> {
    let pattern = pattern
        .strip_prefix("%A")
        .or_else(|| pattern.strip_prefix("%a"))?;
    let raw = raw.trim_start_matches(char::is_alphabetic);
    Some((raw, pattern))
}

fn abbreviation_offset(abbreviation: &str) -> Option<FixedOffset> {
    let hours = match abbreviation.trim().to_uppercase().as_str() {
        "UTC" | "GMT" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}
