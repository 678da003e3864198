//! Listing-page panel parsing.
//!
//! Each search result is a Bootstrap panel whose heading carries the
//! enrollment status, course code, section number, and title in one line,
//! e.g. `"Open CSE 101 - 01 Introduction to Data Structures"`. Body columns
//! hold the list-view fallback fields (instructor, location, meeting string)
//! that a detail-page fetch may later overlay.

use html_scraper::{ElementRef, Html, Selector};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Enrollment status of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionStatus {
    Open,
    Closed,
    WaitList,
}

impl SectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionStatus::Open => "Open",
            SectionStatus::Closed => "Closed",
            SectionStatus::WaitList => "Wait List",
        }
    }
}

/// One class offering as it appears in the listing, before any detail-page
/// enrichment. Fallback fields default to `"Staff"`/`"TBA"` when the panel
/// body doesn't yield them.
#[derive(Debug, Clone)]
pub struct PanelSummary {
    pub status: SectionStatus,
    pub course_code: String,
    pub section_number: String,
    pub title: String,
    pub instructor: String,
    pub location: String,
    pub meeting: String,
    pub enrolled: i32,
    pub capacity: i32,
    pub detail_href: Option<String>,
}

static SEL_PANEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.panel.panel-default").unwrap());
static SEL_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.panel-heading h2").unwrap());
static SEL_BODY_COLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.panel-body > div.row > div").unwrap());

// Detail links vary between terms; these are tried in order.
static SEL_DETAIL_ID: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[id^="class_id_"]"#).unwrap());
static SEL_DETAIL_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.panel-heading h2 a").unwrap());
static SEL_DETAIL_ANY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.panel-heading a").unwrap());

/// `"01 Introduction to Data Structures"` -> ("01", title).
static RE_SECTION_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+[A-Za-z]?)\s+(.+)$").unwrap());

/// `"29 of 30"` anywhere in the panel body.
static RE_ENROLLMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s+of\s+(\d+)").unwrap());

/// The first "panel" on a results page is a summary banner, not a class.
static RE_RESULTS_BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\d+\s+(?:classes|results)\b").unwrap());

/// Positional body columns in the list view. Column 0 is the class number
/// badge and is ignored here; the detail page is authoritative for it.
const COL_INSTRUCTOR: usize = 1;
const COL_LOCATION: usize = 2;
const COL_MEETING: usize = 3;

pub const FALLBACK_INSTRUCTOR: &str = "Staff";
pub const FALLBACK_TEXT: &str = "TBA";
pub const FALLBACK_SECTION_NUMBER: &str = "01";

/// Parse a listing document into owned panel summaries.
///
/// Malformed panels (banner rows, hyphen-less headings) are skipped with a
/// debug line and never abort the listing.
pub fn parse_listing(body: &str) -> Vec<PanelSummary> {
    let html = Html::parse_document(body);
    let mut panels = Vec::new();

    for panel in html.select(&SEL_PANEL) {
        let Some(heading) = panel.select(&SEL_HEADING).next() else {
            continue;
        };
        let heading_text = collapse_whitespace(&heading.text().collect::<String>());

        match parse_panel(panel, &heading_text) {
            Some(summary) => panels.push(summary),
            None => {
                debug!(heading = heading_text.as_str(), "skipping non-class panel");
            }
        }
    }

    panels
}

fn parse_panel(panel: ElementRef<'_>, heading: &str) -> Option<PanelSummary> {
    if RE_RESULTS_BANNER.is_match(heading) {
        return None;
    }

    let (status, remainder) = parse_status(heading);

    // "CSE 101 - 01 Introduction to Data Structures"
    let (course_code, rest) = remainder.split_once('-')?;
    let course_code = course_code.trim().to_string();
    if course_code.is_empty() {
        return None;
    }

    let rest = rest.trim();
    let (section_number, title) = match RE_SECTION_TITLE.captures(rest) {
        Some(caps) => (caps[1].to_string(), caps[2].trim().to_string()),
        None => (FALLBACK_SECTION_NUMBER.to_string(), rest.to_string()),
    };

    let cols: Vec<String> = panel
        .select(&SEL_BODY_COLS)
        .map(|col| collapse_whitespace(&col.text().collect::<String>()))
        .collect();

    let instructor = column_value(&cols, COL_INSTRUCTOR).unwrap_or_else(|| {
        FALLBACK_INSTRUCTOR.to_string()
    });
    let location = column_value(&cols, COL_LOCATION).unwrap_or_else(|| FALLBACK_TEXT.to_string());
    let meeting = column_value(&cols, COL_MEETING).unwrap_or_else(|| FALLBACK_TEXT.to_string());

    let body_text = collapse_whitespace(&panel.text().collect::<String>());
    let (enrolled, capacity) = parse_enrollment(&body_text);

    Some(PanelSummary {
        status,
        course_code,
        section_number,
        title,
        instructor,
        location,
        meeting,
        enrolled,
        capacity,
        detail_href: find_detail_href(panel),
    })
}

/// Recover the status from the heading prefix, returning the heading with
/// the status keyword stripped. Anything that isn't Open or Wait List is
/// Closed.
fn parse_status(heading: &str) -> (SectionStatus, &str) {
    let heading = heading.trim();
    for (keyword, status) in [
        ("Wait List", SectionStatus::WaitList),
        ("Waitlist", SectionStatus::WaitList),
        ("Open", SectionStatus::Open),
        ("Closed", SectionStatus::Closed),
    ] {
        if let Some(rest) = heading.strip_prefix(keyword) {
            return (status, rest.trim_start());
        }
    }
    (SectionStatus::Closed, heading)
}

/// Body columns carry `"Label: value"` text; the label is stripped and
/// empty values are treated as missing.
fn column_value(cols: &[String], index: usize) -> Option<String> {
    let raw = cols.get(index)?;
    let value = match raw.split_once(':') {
        Some((_, v)) => v.trim(),
        None => raw.trim(),
    };
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_enrollment(text: &str) -> (i32, i32) {
    match RE_ENROLLMENT.captures(text) {
        Some(caps) => (
            caps[1].parse().unwrap_or(0),
            caps[2].parse().unwrap_or(0),
        ),
        None => (0, 0),
    }
}

/// Try the known link shapes in order; the markup differs between list
/// variants and older terms.
fn find_detail_href(panel: ElementRef<'_>) -> Option<String> {
    for sel in [&*SEL_DETAIL_ID, &*SEL_DETAIL_HEADING, &*SEL_DETAIL_ANY] {
        if let Some(href) = panel.select(sel).next().and_then(|a| a.attr("href")) {
            if !href.is_empty() {
                return Some(href.to_string());
            }
        }
    }
    None
}

/// Meeting string like `"MWF 9:20AM-10:25AM"` -> (days, start, end).
/// Unrecognized strings yield `("TBA", None, None)`.
pub fn parse_meeting(meeting: &str) -> (String, Option<String>, Option<String>) {
    static RE_MEETING: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^([A-Za-z]+)\s+(\d{1,2}:\d{2}\s?[AP]M)\s*-\s*(\d{1,2}:\d{2}\s?[AP]M)$")
            .unwrap()
    });

    match RE_MEETING.captures(meeting.trim()) {
        Some(caps) => (
            caps[1].to_string(),
            Some(caps[2].to_string()),
            Some(caps[3].to_string()),
        ),
        None => (FALLBACK_TEXT.to_string(), None, None),
    }
}

/// Collapse runs of whitespace to single spaces and trim.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
