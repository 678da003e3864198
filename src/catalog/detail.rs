//! Detail-page field extraction and associated discussion sections.
//!
//! Detail pages are label-soup: every field lives somewhere in the flattened
//! page text under a `"Label:"` marker, and which labels appear varies by
//! class. Each field therefore gets its own extraction rule returning an
//! `Option`, so one missing or reshaped label never blocks the others.

use crate::catalog::panels::{SectionStatus, collapse_whitespace};
use html_scraper::{Html, Selector};
use regex::Regex;
use std::sync::LazyLock;

/// Richer fields the detail page may overlay on top of the list view.
/// Every field is independently optional.
#[derive(Debug, Clone, Default)]
pub struct DetailFields {
    pub title: Option<String>,
    pub class_number: Option<i32>,
    pub credits: Option<i32>,
    pub instruction_mode: Option<String>,
    pub career: Option<String>,
    pub grading: Option<String>,
    pub ge: Option<String>,
    pub prerequisites: Option<String>,
    pub description: Option<String>,
}

/// A discussion or lab row from the "Associated Sections" panel.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscussionRow {
    pub kind: String,
    pub section_number: String,
    pub days: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: String,
    pub enrolled: i32,
    pub capacity: i32,
    pub status: SectionStatus,
}

static SEL_HEADINGS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").unwrap());
static SEL_PANELS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.panel").unwrap());
static SEL_PANEL_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.panel-heading").unwrap());
static SEL_ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.panel-body div.row").unwrap());

/// Build a rule that captures everything after `label` up to the next known
/// label (or end of text). The regex crate has no lookahead, so the stop
/// labels are consumed by a non-capturing group instead.
fn labeled_rule(label: &str) -> Regex {
    Regex::new(&format!(
        r"{label}\s*(.+?)(?:\s+(?:Class Number:|Career:|Grading:|Credits:|General Education:|Instruction Mode:|Enrollment Requirements:|Class Notes:|Description:|Meeting Information|Associated Discussion)|$)"
    ))
    .unwrap()
}

static RE_CLASS_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Class Number:\s*(\d+)").unwrap());
static RE_CREDITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Credits:\s*(\d+)").unwrap());
static RE_INSTRUCTION_MODE: LazyLock<Regex> = LazyLock::new(|| labeled_rule("Instruction Mode:"));
static RE_CAREER: LazyLock<Regex> = LazyLock::new(|| labeled_rule("Career:"));
static RE_GRADING: LazyLock<Regex> = LazyLock::new(|| labeled_rule("Grading:"));
static RE_GE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"General Education:\s*([A-Z]{1,4}\b)").unwrap());
static RE_PREREQUISITES: LazyLock<Regex> =
    LazyLock::new(|| labeled_rule("Enrollment Requirements:"));
static RE_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| labeled_rule("Description:"));

// Associated-section row patterns, each independent of the others.
static RE_ASSOC_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\d+)\s+(DIS|LAB|SEC|STU)\s+(\d+[A-Za-z]?)").unwrap());
static RE_ASSOC_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}:\d{2}\s?[AP]M)\s*-\s*(\d{1,2}:\d{2}\s?[AP]M)").unwrap()
});
static RE_ASSOC_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:Su|Sa|Tu|Th|M|W|F)+)\b").unwrap());
static RE_ASSOC_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[AP]M\s+(.+?)\s+\d+\s+of\s+\d+").unwrap());
static RE_ASSOC_ENROLLMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+of\s+(\d+)").unwrap());

/// Extract overlay fields from a detail document.
///
/// `course_code` anchors the canonical-title rule: the title heading is the
/// one that starts with the code, with the `"CODE - NN"` prefix stripped.
pub fn parse_detail(body: &str, course_code: &str) -> DetailFields {
    let html = Html::parse_document(body);
    let text = collapse_whitespace(&html.root_element().text().collect::<String>());

    DetailFields {
        title: extract_title(&html, course_code),
        class_number: capture(&RE_CLASS_NUMBER, &text).and_then(|v| v.parse().ok()),
        credits: capture(&RE_CREDITS, &text).and_then(|v| v.parse().ok()),
        instruction_mode: capture(&RE_INSTRUCTION_MODE, &text),
        career: capture(&RE_CAREER, &text),
        grading: capture(&RE_GRADING, &text),
        ge: capture(&RE_GE, &text),
        prerequisites: capture(&RE_PREREQUISITES, &text),
        description: capture(&RE_DESCRIPTION, &text),
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|caps| caps[1].trim().to_string())
}

/// The canonical title heading reads `"CSE 101 - 01 Introduction to Data
/// Structures"`. Find the heading that starts with the course code and strip
/// the code/section prefix.
fn extract_title(html: &Html, course_code: &str) -> Option<String> {
    for heading in html.select(&SEL_HEADINGS) {
        let text = collapse_whitespace(&heading.text().collect::<String>());
        if let Some(rest) = text.strip_prefix(course_code) {
            let Some(rest) = rest.trim_start().strip_prefix('-') else {
                continue;
            };
            let rest = rest.trim_start();
            // Drop the leading section number if present.
            let title = match rest.split_once(' ') {
                Some((first, tail)) if first.chars().next().is_some_and(|c| c.is_ascii_digit()) => {
                    tail.trim()
                }
                _ => rest,
            };
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
    }
    None
}

/// Parse the "Associated Sections" panel into discussion rows.
///
/// Status is computed, not scraped: a discussion is Closed iff it is full
/// with a nonzero capacity.
pub fn parse_discussions(body: &str) -> Vec<DiscussionRow> {
    let html = Html::parse_document(body);

    let Some(assoc_panel) = html.select(&SEL_PANELS).find(|panel| {
        panel
            .select(&SEL_PANEL_HEADING)
            .next()
            .map(|h| h.text().collect::<String>().contains("Associated"))
            .unwrap_or(false)
    }) else {
        return Vec::new();
    };

    assoc_panel
        .select(&SEL_ROWS)
        .filter_map(|row| {
            let text = collapse_whitespace(&row.text().collect::<String>());
            parse_discussion_row(&text)
        })
        .collect()
}

fn parse_discussion_row(text: &str) -> Option<DiscussionRow> {
    let header = RE_ASSOC_HEADER.captures(text)?;
    let kind = header[2].to_string();
    let section_number = header[3].to_string();

    let (start_time, end_time) = match RE_ASSOC_TIME.captures(text) {
        Some(caps) => (Some(caps[1].to_string()), Some(caps[2].to_string())),
        None => (None, None),
    };

    // Day-code search starts past the header so the section number's trailing
    // letter (e.g. "01F") can't shadow a real day group.
    let after_header = &text[header.get(0).map(|m| m.end()).unwrap_or(0)..];
    let days = RE_ASSOC_DAYS
        .captures(after_header)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "TBA".to_string());

    let location = RE_ASSOC_LOCATION
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_else(|| "TBA".to_string());

    let (enrolled, capacity) = match RE_ASSOC_ENROLLMENT.captures(text) {
        Some(caps) => (
            caps[1].parse().unwrap_or(0),
            caps[2].parse().unwrap_or(0),
        ),
        None => (0, 0),
    };

    Some(DiscussionRow {
        kind,
        section_number,
        days,
        start_time,
        end_time,
        location,
        enrolled,
        capacity,
        status: discussion_status(enrolled, capacity),
    })
}

/// Closed iff enrolled >= capacity > 0, else Open. A zero capacity means
/// the source hasn't published limits, which is treated as Open.
pub fn discussion_status(enrolled: i32, capacity: i32) -> SectionStatus {
    if capacity > 0 && enrolled >= capacity {
        SectionStatus::Closed
    } else {
        SectionStatus::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_PAGE: &str = r#"
        <html><body>
          <h2>CSE 101 - 01 Introduction to Data Structures and Algorithms</h2>
          <div class="panel">
            <div class="panel-body">
              Class Number: 50321 Career: Undergraduate Grading: Student Option
              Credits: 5 General Education: MF Instruction Mode: In Person
              Enrollment Requirements: Prerequisite(s): CSE 13S and MATH 19B Class Notes: none
              Description: Introduction to abstract data types and basics of algorithms.
            </div>
          </div>
          <div class="panel">
            <div class="panel-heading">Associated Discussion Sections or Labs</div>
            <div class="panel-body">
              <div class="row">#1 DIS 01A W 7:10PM-8:15PM Soc Sci 110 25 of 30</div>
              <div class="row">#2 DIS 01B TuTh 8:00AM-9:05AM Kresge Clrm 327 30 of 30</div>
              <div class="row">#3 LAB 01C TBA TBA 0 of 0</div>
            </div>
          </div>
        </body></html>"#;

    #[test]
    fn test_all_detail_fields_extracted() {
        let fields = parse_detail(DETAIL_PAGE, "CSE 101");
        assert_eq!(
            fields.title.as_deref(),
            Some("Introduction to Data Structures and Algorithms")
        );
        assert_eq!(fields.class_number, Some(50321));
        assert_eq!(fields.credits, Some(5));
        assert_eq!(fields.instruction_mode.as_deref(), Some("In Person"));
        assert_eq!(fields.career.as_deref(), Some("Undergraduate"));
        assert_eq!(fields.grading.as_deref(), Some("Student Option"));
        assert_eq!(fields.ge.as_deref(), Some("MF"));
        assert_eq!(
            fields.prerequisites.as_deref(),
            Some("Prerequisite(s): CSE 13S and MATH 19B")
        );
        assert_eq!(
            fields.description.as_deref(),
            Some("Introduction to abstract data types and basics of algorithms.")
        );
    }

    #[test]
    fn test_missing_fields_stay_none() {
        let fields = parse_detail("<html><body><h2>Nothing here</h2></body></html>", "CSE 101");
        assert!(fields.title.is_none());
        assert!(fields.class_number.is_none());
        assert!(fields.credits.is_none());
        assert!(fields.ge.is_none());
        assert!(fields.prerequisites.is_none());
    }

    #[test]
    fn test_one_rule_failing_does_not_block_others() {
        let body = "<html><body>Credits: 5 Career: Undergraduate</body></html>";
        let fields = parse_detail(body, "CSE 101");
        assert_eq!(fields.credits, Some(5));
        assert_eq!(fields.career.as_deref(), Some("Undergraduate"));
        assert!(fields.class_number.is_none());
        assert!(fields.grading.is_none());
    }

    #[test]
    fn test_discussions_parsed_with_computed_status() {
        let rows = parse_discussions(DETAIL_PAGE);
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].kind, "DIS");
        assert_eq!(rows[0].section_number, "01A");
        assert_eq!(rows[0].days, "W");
        assert_eq!(rows[0].start_time.as_deref(), Some("7:10PM"));
        assert_eq!(rows[0].end_time.as_deref(), Some("8:15PM"));
        assert_eq!(rows[0].location, "Soc Sci 110");
        assert_eq!(rows[0].enrolled, 25);
        assert_eq!(rows[0].capacity, 30);
        assert_eq!(rows[0].status, SectionStatus::Open);

        assert_eq!(rows[1].status, SectionStatus::Closed);
        assert_eq!(rows[1].days, "TuTh");

        // Zero capacity with no meeting info stays Open with defaults.
        assert_eq!(rows[2].status, SectionStatus::Open);
        assert_eq!(rows[2].days, "TBA");
        assert!(rows[2].start_time.is_none());
        assert_eq!(rows[2].location, "TBA");
    }

    #[test]
    fn test_discussion_status_boundaries() {
        assert_eq!(discussion_status(30, 30), SectionStatus::Closed);
        assert_eq!(discussion_status(29, 30), SectionStatus::Open);
        assert_eq!(discussion_status(31, 30), SectionStatus::Closed);
        assert_eq!(discussion_status(5, 0), SectionStatus::Open);
    }

    #[test]
    fn test_no_associated_panel_yields_empty() {
        assert!(parse_discussions("<html><body></body></html>").is_empty());
    }

    #[test]
    fn test_malformed_discussion_row_skipped() {
        let body = r#"
            <div class="panel">
              <div class="panel-heading">Associated Discussion Sections or Labs</div>
              <div class="panel-body"><div class="row">Select a discussion below</div></div>
            </div>"#;
        assert!(parse_discussions(body).is_empty());
    }
}
