use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::{Client, Response};
use reqwest::header::COOKIE;
use reqwest::{StatusCode, Url};

mod eventinfo;
mod login;
mod menu;
mod schedule;

pub use eventinfo::is_open_for_enrollment;
pub use login::parse_auth_response;
pub use menu::parse_menu;
pub use schedule::{ROW_HEIGHT_PX, SkipReason, WeekSchedule, parse_week, slot_index};

use crate::error::{Error, Result};
use crate::model::Session;

pub const DEFAULT_BASE_URL: &str = "https://journal.unn.ru/";

/// Applied to every outbound request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Moves form bodies to the journal and brings back the raw response text.
pub trait Transport {
    /// POSTs an `application/x-www-form-urlencoded` body to `url`.
    ///
    /// # Errors
    /// Connection failures, timeouts and non-success status codes.
    fn post_form(&self, url: Url, form: &[(&str, String)], session: Option<&Session>)
    -> Result<String>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post_form(
        &self,
        url: Url,
        form: &[(&str, String)],
        session: Option<&Session>,
    ) -> Result<String> {
        (**self).post_form(url, form, session)
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http_client })
    }
}

impl Transport for HttpTransport {
    fn post_form(
        &self,
        url: Url,
        form: &[(&str, String)],
        session: Option<&Session>,
    ) -> Result<String> {
        log::trace!("POST {url}");
        let mut request = self.http_client.post(url.clone()).form(form);
        if let Some(session) = session {
            request = request.header(COOKIE, session.cookie_header());
        }
        let resp: Response = request.send()?;
        handle_response(&url, resp)
    }
}

fn handle_response(url: &Url, response: Response) -> Result<String> {
    let status: StatusCode = response.status();
    if !status.is_success() {
        return Err(Error::Status {
            path: url.path().to_owned(),
            status,
        });
    }
    Ok(response.text()?)
}

/// Client for the sports section pages of the journal.
///
/// Holds no session state; every call receives the [`Session`] it should act as.
pub struct Journal<T> {
    pub(crate) transport: T,
    base_url: Url,
}

impl<T: Transport> Journal<T> {
    pub fn new(transport: T, base_url: Url) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn post(
        &self,
        relative_url: &str,
        form: &[(&str, String)],
        session: Option<&Session>,
    ) -> Result<String> {
        let url: Url = self.base_url.join(relative_url)?;
        self.transport.post_form(url, form, session)
    }
}

/// Form fields shared by the menu and schedule pages
fn view_form(
    session: &Session,
    date: NaiveDate,
    (section, building, lector): (u32, u32, u32),
) -> Vec<(&'static str, String)> {
    vec![
        ("section", section.to_string()),
        ("zd", building.to_string()),
        ("lec", lector.to_string()),
        ("stud", session.login.clone()),
        ("date", date.format("%Y-%m-%d").to_string()),
        ("type", "2".to_owned()),
        ("view", "0".to_owned()),
        ("lang", "ru".to_owned()),
    ]
}
