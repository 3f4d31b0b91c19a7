use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Cookie credentials handed out by `auth.php`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub login: String,
    pub auth_token: String,
}

impl Session {
    #[must_use]
    pub fn cookie_header(&self) -> String {
        format!("login={}; hash={}", self.login, self.auth_token)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<hidden>")
            .finish()
    }
}

pub const ANY_SECTION: &str = "Любая секция";
pub const ANY_LECTOR: &str = "Любой преподаватель";
pub const ANY_BUILDING: &str = "Любое здание";

/// Selectable filter dimensions, keyed by the journal's numeric ids.
///
/// Id 0 is the "any" option of each dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub sections: BTreeMap<u32, String>,
    pub lectors: BTreeMap<u32, String>,
    pub buildings: BTreeMap<u32, String>,
}

impl Menu {
    #[must_use]
    pub fn empty() -> Self {
        let any = || BTreeMap::from([(0, String::new())]);
        Self {
            sections: any(),
            lectors: any(),
            buildings: any(),
        }
    }

    #[must_use]
    pub fn section_name(&self, filter: &Filter) -> Option<&str> {
        lookup(&self.sections, filter.section)
    }

    #[must_use]
    pub fn lector_name(&self, filter: &Filter) -> Option<&str> {
        lookup(&self.lectors, filter.lector)
    }

    /// First word of the lector's full name
    #[must_use]
    pub fn lector_surname(&self, filter: &Filter) -> Option<&str> {
        self.lector_name(filter)
            .and_then(|name| name.split_whitespace().next())
    }

    #[must_use]
    pub fn building_name(&self, filter: &Filter) -> Option<&str> {
        lookup(&self.buildings, filter.building)
    }

    /// Human readable one-liner of a filter, "any" placeholders for unset dimensions
    #[must_use]
    pub fn describe(&self, filter: &Filter) -> String {
        let section = self.section_name(filter).unwrap_or(ANY_SECTION);
        let lector = self.lector_name(filter).unwrap_or(ANY_LECTOR);
        let building = self.building_name(filter).unwrap_or(ANY_BUILDING);
        format!("{section} / {lector} / {building}")
    }
}

fn lookup(map: &BTreeMap<u32, String>, id: Option<u32>) -> Option<&str> {
    map.get(&id?).map(String::as_str)
}

/// A saved combination of menu selections.
///
/// `None` means "no constraint" on that dimension. Id 0 is folded into `None` on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub section: Option<u32>,
    pub lector: Option<u32>,
    pub building: Option<u32>,
    #[serde(default)]
    pub paused: bool,
}

impl Filter {
    #[must_use]
    pub fn new(section: Option<u32>, lector: Option<u32>, building: Option<u32>) -> Self {
        Self {
            section: section.filter(|&id| id != 0),
            lector: lector.filter(|&id| id != 0),
            building: building.filter(|&id| id != 0),
            paused: false,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        [self.section, self.lector, self.building]
            .into_iter()
            .all(|id| id.unwrap_or(0) == 0)
    }

    /// Section/zd/lec ids as the journal expects them, 0 for unset
    #[must_use]
    pub fn ids(&self) -> (u32, u32, u32) {
        (
            self.section.unwrap_or(0),
            self.building.unwrap_or(0),
            self.lector.unwrap_or(0),
        )
    }

    #[must_use]
    pub const fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }
}

/// A single class occurrence in the weekly schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub id: u32,
}

const SHORT_MONTHS: [&str; 12] = [
    "янв.", "февр.", "мар.", "апр.", "мая", "июн.", "июл.", "авг.", "сент.", "окт.", "нояб.",
    "дек.",
];

impl Section {
    /// `25 апр.`
    #[must_use]
    pub fn friendly_date(&self) -> String {
        let month = SHORT_MONTHS[self.date.month0() as usize];
        format!("{:02} {month}", self.date.day())
    }
}
