//! Publish-date normalization for feed items.
//!
//! RSS `pubDate` values are nominally RFC 822 but in practice arrive in a handful of
//! layouts. [`normalize_published`] tries each known layout in a fixed order and
//! falls back to the current time when none matches, flagging the result as
//! estimated so it can be told apart from a real publish date.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// A normalized publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedAt {
    pub at: DateTime<Utc>,
    /// True when `at` is the ingestion time because the raw value was unusable
    pub estimated: bool,
}

/// Normalize a raw publish-date string. Never fails.
pub fn normalize_published(raw: &str) -> PublishedAt {
    normalize_published_at(raw, Utc::now())
}

/// Like [`normalize_published`] with an explicit fallback instant.
pub fn normalize_published_at(raw: &str, now: DateTime<Utc>) -> PublishedAt {
    match parse_published(raw) {
        Some(at) => PublishedAt {
            at,
            estimated: false,
        },
        None => {
            tracing::warn!(raw = %raw, "Unrecognized publish date, using ingestion time");
            PublishedAt {
                at: now,
                estimated: true,
            }
        }
    }
}

/// Parse `raw` against the supported layouts, first match wins:
///
/// 1. `Mon, 02 Jan 2006 15:04:05 -0700`
/// 2. `Mon, 02 Jan 2006 15:04:05 MST`
/// 3. `02 Jan 06 15:04 MST`
/// 4. `2006-01-02T15:04:05Z`
///
/// Layouts with seconds also accept a fractional part (`15:04:05.123`).
/// The weekday is checked for spelling only; a weekday that disagrees with the
/// date is ignored.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    parse_rfc1123_numeric(s)
        .or_else(|| parse_rfc1123_abbrev(s))
        .or_else(|| parse_rfc822(s))
        .or_else(|| parse_iso8601_utc(s))
}

fn strip_weekday(s: &str) -> Option<&str> {
    let (day, rest) = s.split_once(", ")?;
    WEEKDAYS.contains(&day).then_some(rest)
}

fn parse_rfc1123_numeric(s: &str) -> Option<DateTime<Utc>> {
    let rest = strip_weekday(s)?;
    DateTime::parse_from_str(rest, "%d %b %Y %H:%M:%S%.f %z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_rfc1123_abbrev(s: &str) -> Option<DateTime<Utc>> {
    let rest = strip_weekday(s)?;
    parse_with_zone_abbrev(rest, "%d %b %Y %H:%M:%S%.f")
}

fn parse_rfc822(s: &str) -> Option<DateTime<Utc>> {
    parse_with_zone_abbrev(s, "%d %b %y %H:%M")
}

fn parse_iso8601_utc(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Split off a trailing zone abbreviation and parse the rest as local time in that zone.
fn parse_with_zone_abbrev(s: &str, layout: &str) -> Option<DateTime<Utc>> {
    let (local, zone) = s.rsplit_once(' ')?;
    let offset = zone_offset(zone)?;
    let naive = NaiveDateTime::parse_from_str(local.trim_end(), layout).ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Offset for a zone abbreviation.
///
/// Only the RFC 822 North American zones carry a real offset. Any other
/// 3-5 letter uppercase abbreviation is accepted as UTC.
fn zone_offset(abbr: &str) -> Option<FixedOffset> {
    let hours = match abbr {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ if (3..=5).contains(&abbr.len()) && abbr.bytes().all(|b| b.is_ascii_uppercase()) => 0,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}
