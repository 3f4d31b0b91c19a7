use chrono::NaiveDateTime;
use scraper::Html;

use crate::error::Result;
use crate::journal::{Journal, Transport};
use crate::model::{Section, Session};

/// Shown on the event page only while enrollment for that day is open
const ENROLLMENT_OPEN: &str = "Запись на секцию на этот день";

impl<T: Transport> Journal<T> {
    /// Whether the section can be enrolled into right now.
    ///
    /// Sections that already ended are rejected without asking the server.
    ///
    /// # Errors
    /// Transport failures while fetching the event page.
    pub fn is_available_for_enrollment(
        &self,
        section: &Section,
        session: &Session,
        now: NaiveDateTime,
    ) -> Result<bool> {
        if section.date < now.date() || (section.date == now.date() && section.end < now.time()) {
            return Ok(false);
        }

        let form = [("oid", section.id.to_string())];
        let html = self.post("section/eventinfo.php", &form, Some(session))?;
        Ok(is_open_for_enrollment(&html))
    }
}

#[must_use]
pub fn is_open_for_enrollment(html: &str) -> bool {
    let document = Html::parse_document(html);
    let text = document.root_element().text().collect::<String>();
    text.contains(ENROLLMENT_OPEN)
}
