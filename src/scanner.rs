use std::iter::successors;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

use crate::error::Result;
use crate::journal::{Journal, Transport};
use crate::model::{Filter, Menu, Section, Session};

/// Weeks are scanned while their Monday is at most this many calendar months after the first one
pub const LOOKAHEAD_MONTHS: i32 = 2;

const NOT_AVAILABLE: &str = "<N/A>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub key: String,
    pub filter: Filter,
    pub section: Section,
}

/// Available sections keyed by their display line, in the order they were first found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    entries: Vec<Found>,
}

impl ScanResult {
    /// Returns `true` if `key` was not present yet. An existing key keeps its position.
    pub fn insert(&mut self, key: String, filter: Filter, section: Section) -> bool {
        if let Some(found) = self.entries.iter_mut().find(|f| f.key == key) {
            found.filter = filter;
            found.section = section;
            return false;
        }
        self.entries.push(Found {
            key,
            filter,
            section,
        });
        true
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|f| f.key.clone()).collect()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Found> {
        self.entries.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Found> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub menu: Menu,
    pub found: ScanResult,
    /// Section blocks the extractor could not make sense of
    pub skipped: usize,
}

#[must_use]
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// Mondays of the weeks to scan, starting with the week of `today`.
///
/// Months are counted across year boundaries, so a November start ends in January.
#[must_use]
pub fn lookahead_weeks(today: NaiveDate) -> Vec<NaiveDate> {
    let first = start_of_week(today);
    successors(Some(first), |week| week.checked_add_days(Days::new(7)))
        .take_while(|week| month_index(*week) - month_index(first) <= LOOKAHEAD_MONTHS)
        .collect()
}

/// `25 апр.: Секция БАДМИНТОН (Гутко)`
#[must_use]
pub fn display_key(menu: &Menu, filter: &Filter, section: &Section) -> String {
    format!(
        "{}: {} ({})",
        section.friendly_date(),
        menu.section_name(filter).unwrap_or(NOT_AVAILABLE),
        menu.lector_surname(filter).unwrap_or(NOT_AVAILABLE),
    )
}

/// Look for sections open to enrollment over the lookahead window.
///
/// Requests are strictly sequential. `on_found` is called with the result so far every time
/// a new entry is added.
///
/// # Errors
/// Any failure to fetch the menu, a week or an event page aborts the whole scan.
pub fn scan<T: Transport>(
    journal: &Journal<T>,
    session: &Session,
    filters: &[Filter],
    now: NaiveDateTime,
    mut on_found: impl FnMut(&ScanResult),
) -> Result<ScanOutcome> {
    let menu = journal.extract_menu(session, now.date())?;

    let active: Vec<&Filter> = filters
        .iter()
        .filter(|f| {
            if f.is_empty() {
                log::warn!("Ignoring empty filter {f:?}");
            }
            !f.paused && !f.is_empty()
        })
        .collect();

    let mut found = ScanResult::default();
    let mut skipped = 0;

    for week in lookahead_weeks(now.date()) {
        for &filter in &active {
            let schedule = journal.fetch_week(week, filter, session)?;
            skipped += schedule.skipped.len();

            for section in schedule.sections {
                if !journal.is_available_for_enrollment(&section, session, now)? {
                    continue;
                }
                let key = display_key(&menu, filter, &section);
                log::info!("Available: {key}");
                if found.insert(key, *filter, section) {
                    on_found(&found);
                }
            }
        }
    }

    Ok(ScanOutcome {
        menu,
        found,
        skipped,
    })
}
