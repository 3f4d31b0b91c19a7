//! Week grid of the schedule page.
//!
//! The page carries no structured data about when a section takes place. Each day is a column:
//!
//! ```text
//! div (day)
//! ├── div (header, last child holds "dd.mm")
//! ├── div
//! │   └── div
//! │       └── a (onclick="getpopup(<id>)", style="top: <px>px; background-color: #...")
//! └── div (grid, one child per time slot)
//! ```
//!
//! The time slot of a block is only encoded in its `top` offset, and the year is not shown at all.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveTime};
use regex::{Captures, Regex};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::journal::{Journal, Transport, view_form};
use crate::model::{Filter, Section, Session};

/// Height of one time slot row in the week grid
pub const ROW_HEIGHT_PX: u32 = 55;

#[allow(clippy::expect_used)]
static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d\d):(\d\d)\s*-\s*(\d\d):(\d\d)$").expect("time range regex is valid")
});

#[allow(clippy::expect_used)]
static POPUP_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)getpopup\s*\((\d+)\)").expect("popup regex is valid")
});

#[allow(clippy::expect_used)]
static STYLE_TOP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)top:\s*(\d+)px").expect("top regex is valid"));

// Other colors mark full or inactive sections
#[allow(clippy::expect_used)]
static AVAILABLE_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)#(FFE4C4|B0E0E6)").expect("color regex is valid"));

#[allow(clippy::expect_used)]
static DAY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\.(\d{1,2})").expect("day label regex is valid")
});

/// Why a candidate block did not become a [`Section`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoDayColumn,
    /// The day's grid does not line up with the time legend
    ColumnMismatch { rows: usize, slots: usize },
    NoTopOffset,
    SlotOutOfRange { top_px: u32 },
    BadTimeRange(String),
    BadDayLabel(String),
    BadId(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDayColumn => f.write_str("block is not inside a day column"),
            Self::ColumnMismatch { rows, slots } => {
                write!(f, "day column has {rows} rows but legend has {slots} slots")
            }
            Self::NoTopOffset => f.write_str("block has no top offset"),
            Self::SlotOutOfRange { top_px } => write!(f, "no time slot at top {top_px}px"),
            Self::BadTimeRange(s) => write!(f, "invalid time range {s:?}"),
            Self::BadDayLabel(s) => write!(f, "invalid day label {s:?}"),
            Self::BadId(s) => write!(f, "invalid section id in {s:?}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekSchedule {
    /// In document order
    pub sections: Vec<Section>,
    pub skipped: Vec<SkipReason>,
}

/// Row of the time legend a block at `top_px` belongs to.
///
/// The first row sits one row height below the column top.
#[must_use]
pub fn slot_index(top_px: u32) -> Option<usize> {
    (top_px / ROW_HEIGHT_PX)
        .checked_sub(1)
        .and_then(|i| usize::try_from(i).ok())
}

impl<T: Transport> Journal<T> {
    /// Fetch the week containing `date` and reconstruct its open sections.
    ///
    /// # Errors
    /// Only transport failures. Blocks that cannot be understood are skipped.
    pub fn fetch_week(
        &self,
        date: NaiveDate,
        filter: &Filter,
        session: &Session,
    ) -> Result<WeekSchedule> {
        let form = view_form(session, date, filter.ids());
        let html = self.post("section/schedule.php", &form, Some(session))?;
        let week = parse_week(&html, date);

        for reason in &week.skipped {
            log::debug!("Skipped section block: {reason}");
        }
        log::debug!(
            "Week of {date}: {} sections, {} skipped",
            week.sections.len(),
            week.skipped.len()
        );
        Ok(week)
    }

    /// Same as [`Self::fetch_week`] without the skip details.
    ///
    /// # Errors
    /// Only transport failures.
    pub fn extract_sections(
        &self,
        date: NaiveDate,
        filter: &Filter,
        session: &Session,
    ) -> Result<Vec<Section>> {
        Ok(self.fetch_week(date, filter, session)?.sections)
    }

    /// Link to the human-facing schedule page, for the browser only.
    ///
    /// # Errors
    /// Only if the base URL cannot be joined.
    pub fn build_filter_url(&self, date: NaiveDate, filter: &Filter) -> Result<Url> {
        let (section, building, lector) = filter.ids();
        let mut url = self.base_url.join("section/index.php")?;
        url.query_pairs_mut()
            .append_pair("section[]", &section.to_string())
            .append_pair("zd[]", &building.to_string())
            .append_pair("lec[]", &lector.to_string())
            .append_pair("date", &date.format("%Y-%m-%d").to_string())
            .append_pair("type", "2")
            .append_pair("view", "0");
        Ok(url)
    }
}

/// Parse a week page. `week_of` is any date of the requested week; it supplies the missing year.
#[must_use]
pub fn parse_week(html: &str, week_of: NaiveDate) -> WeekSchedule {
    let document = Html::parse_document(html);
    let legend = time_legend(&document);

    let mut week = WeekSchedule::default();
    for link in candidate_blocks(&document) {
        match reconstruct(link, &legend, week_of) {
            Ok(section) => week.sections.push(section),
            Err(reason) => week.skipped.push(reason),
        }
    }
    week
}

fn select<'a>(document: &'a Html, css: &'static str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(e) => {
            log::error!("Invalid selector {css:?}: {e}");
            Vec::new()
        }
    }
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_owned()
}

/// Time ranges of the week's slots, top to bottom
fn time_legend(document: &Html) -> Vec<String> {
    select(document, "p")
        .into_iter()
        .map(text_of)
        .filter(|text| TIME_RANGE.is_match(text))
        .collect()
}

fn candidate_blocks(document: &Html) -> Vec<ElementRef<'_>> {
    select(document, "a[onclick]")
        .into_iter()
        .filter(|link| {
            let attrs = link.value();
            let onclick = attrs.attr("onclick").unwrap_or_default();
            let style = attrs.attr("style").unwrap_or_default();
            POPUP_CALL.is_match(onclick) && AVAILABLE_COLOR.is_match(style)
        })
        .collect()
}

fn parent(element: ElementRef) -> Option<ElementRef> {
    element.parent().and_then(ElementRef::wrap)
}

fn element_children(element: ElementRef) -> Vec<ElementRef> {
    element.children().filter_map(ElementRef::wrap).collect()
}

fn reconstruct(
    link: ElementRef,
    legend: &[String],
    week_of: NaiveDate,
) -> std::result::Result<Section, SkipReason> {
    let day = parent(link)
        .and_then(parent)
        .and_then(parent)
        .ok_or(SkipReason::NoDayColumn)?;
    let columns = element_children(day);
    let grid = columns.get(2).ok_or(SkipReason::NoDayColumn)?;

    let rows = element_children(*grid).len();
    if rows != legend.len() {
        return Err(SkipReason::ColumnMismatch {
            rows,
            slots: legend.len(),
        });
    }

    let style = link.value().attr("style").unwrap_or_default();
    let top_px: u32 = STYLE_TOP
        .captures(style)
        .and_then(|caps| caps[1].parse().ok())
        .ok_or(SkipReason::NoTopOffset)?;
    let range = slot_index(top_px)
        .and_then(|i| legend.get(i))
        .ok_or(SkipReason::SlotOutOfRange { top_px })?;
    let (start, end) = parse_time_range(range)?;

    let label = columns
        .first()
        .and_then(|header| element_children(*header).last().copied())
        .map(text_of)
        .unwrap_or_default();
    let date = parse_day_label(&label, week_of).ok_or(SkipReason::BadDayLabel(label))?;

    let onclick = link.value().attr("onclick").unwrap_or_default();
    let id: u32 = POPUP_CALL
        .captures(onclick)
        .and_then(|caps| caps[1].parse().ok())
        .ok_or_else(|| SkipReason::BadId(onclick.to_owned()))?;

    Ok(Section {
        date,
        start,
        end,
        id,
    })
}

fn parse_time_range(
    range: &str,
) -> std::result::Result<(NaiveTime, NaiveTime), SkipReason> {
    let bad = || SkipReason::BadTimeRange(range.to_owned());
    let caps = TIME_RANGE.captures(range).ok_or_else(bad)?;
    let time = |caps: &Captures, h: usize, m: usize| {
        let hour = caps[h].parse().ok()?;
        let minute = caps[m].parse().ok()?;
        NaiveTime::from_hms_opt(hour, minute, 0)
    };
    let start = time(&caps, 1, 2).ok_or_else(bad)?;
    let end = time(&caps, 3, 4).ok_or_else(bad)?;
    Ok((start, end))
}

/// `dd.mm` placed in the year that puts it closest to `week_of`
fn parse_day_label(label: &str, week_of: NaiveDate) -> Option<NaiveDate> {
    let caps = DAY_LABEL.captures(label)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;

    let year = week_of.year();
    [year, year + 1, year - 1]
        .into_iter()
        .filter_map(|y| NaiveDate::from_ymd_opt(y, month, day))
        .min_by_key(|d| (*d - week_of).num_days().abs())
}
