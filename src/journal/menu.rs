use std::collections::BTreeMap;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::journal::{Journal, Transport, view_form};
use crate::model::{ANY_BUILDING, ANY_LECTOR, ANY_SECTION, Menu, Session};

impl<T: Transport> Journal<T> {
    /// Fetch the section, lector and building option lists.
    ///
    /// A list missing from the page yields an empty map.
    ///
    /// # Errors
    /// Only transport failures; the markup itself never fails the call.
    pub fn extract_menu(&self, session: &Session, today: NaiveDate) -> Result<Menu> {
        let form = view_form(session, today, (0, 0, 0));
        let html = self.post("section/getmenu.php", &form, Some(session))?;
        let menu = parse_menu(&html);
        log::debug!(
            "Menu has {} sections, {} lectors, {} buildings",
            menu.sections.len(),
            menu.lectors.len(),
            menu.buildings.len(),
        );
        Ok(menu)
    }
}

#[must_use]
pub fn parse_menu(html: &str) -> Menu {
    let document = Html::parse_document(html);
    Menu {
        sections: options(&document, "#section", ANY_SECTION),
        lectors: options(&document, "#lector", ANY_LECTOR),
        buildings: options(&document, "#zd", ANY_BUILDING),
    }
}

/// Maps the `value` of every child of the first element matching `css` to its text
fn options(document: &Html, css: &str, any_label: &str) -> BTreeMap<u32, String> {
    let Ok(selector) = Selector::parse(css) else {
        return BTreeMap::new();
    };
    let Some(list) = document.select(&selector).next() else {
        log::warn!("Menu list {css} is missing");
        return BTreeMap::new();
    };

    list.children()
        .filter_map(ElementRef::wrap)
        .filter_map(|option| {
            let id: u32 = option.value().attr("value")?.trim().parse().ok()?;
            let label = if id == 0 {
                any_label.to_owned()
            } else {
                option.text().collect::<String>().trim().to_owned()
            };
            Some((id, label))
        })
        .collect()
}
