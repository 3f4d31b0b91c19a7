use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use journal_watch::{
    Credentials, CycleState, Error, Filter, Journal, MemoryStorage, Notifier, Result, Session,
    Settings, Storage, Transport, Watcher,
};
use reqwest::{StatusCode, Url};

const MENU: &str = include_str!("fixtures/menu.html");
const SCHEDULE: &str = include_str!("fixtures/schedule.html");
const EVENT_CLOSED: &str = include_str!("fixtures/eventinfo_closed.html");
const EVENT_OPEN: &str = include_str!("fixtures/eventinfo_open.html");

/// Answers with fixtures; event pages are looked up by section id
struct Site {
    events: HashMap<String, &'static str>,
    requests: RefCell<Vec<String>>,
}

impl Site {
    fn new(events: &[(&str, &'static str)]) -> Self {
        Self {
            events: events.iter().map(|(id, page)| ((*id).to_owned(), *page)).collect(),
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl Transport for Site {
    fn post_form(
        &self,
        url: Url,
        form: &[(&str, String)],
        session: Option<&Session>,
    ) -> Result<String> {
        let path = url.path().to_owned();
        self.requests.borrow_mut().push(path.clone());

        if path != "/auth.php" {
            assert_eq!(
                session.map(Session::cookie_header).as_deref(),
                Some("login=s21730; hash=tok")
            );
        }

        let field = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap_or_default()
        };
        let page = match path.as_str() {
            "/auth.php" if field("password") == "right" => "2023-04-25 08:00:01 tok OK",
            "/auth.php" => "Ошибка авторизации",
            "/section/getmenu.php" => MENU,
            "/section/schedule.php" => SCHEDULE,
            "/section/eventinfo.php" => {
                self.events.get(field("oid")).copied().unwrap_or(EVENT_CLOSED)
            }
            _ => {
                return Err(Error::Status {
                    path,
                    status: StatusCode::NOT_FOUND,
                });
            }
        };
        Ok(page.to_owned())
    }
}

fn journal(site: &Site) -> Journal<&Site> {
    Journal::new(site, Url::parse("https://journal.test/").unwrap())
}

fn morning() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 4, 25)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn key_of(map: &BTreeMap<u32, String>, label: &str) -> Option<u32> {
    map.iter().find(|(_, v)| v.as_str() == label).map(|(k, _)| *k)
}

#[test]
fn badminton_week() {
    let site = Site::new(&[]);
    let journal = journal(&site);

    let session = journal.authenticate("s21730", "right").unwrap();
    let date = NaiveDate::from_ymd_opt(2023, 4, 25).unwrap();
    let menu = journal.extract_menu(&session, date).unwrap();
    assert_eq!(menu.sections.len(), 5);
    assert!(menu.sections.contains_key(&0));

    let filter = Filter::new(
        key_of(&menu.sections, "Секция БАДМИНТОН"),
        key_of(&menu.lectors, "Гутко Светлана Николаевна"),
        None,
    );
    let sections = journal.extract_sections(date, &filter, &session).unwrap();
    assert_eq!(sections.len(), 2);

    let available = journal
        .is_available_for_enrollment(&sections[1], &session, morning())
        .unwrap();
    assert!(!available);
}

#[test]
fn wrong_password_is_an_auth_error() {
    let site = Site::new(&[]);
    let err = journal(&site).authenticate("s21730", "wrong").unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}

#[derive(Default)]
struct Inbox(RefCell<Vec<String>>);

impl Notifier for &Inbox {
    fn report_checking(&self) {}

    fn report_progress(&self, entries: &[String]) {
        self.0.borrow_mut().push(format!("progress {}", entries.len()));
    }

    fn report_failure(&self, message: &str) {
        self.0.borrow_mut().push(format!("failure {message}"));
    }

    fn report_empty(&self, _next_check: NaiveDateTime) {
        self.0.borrow_mut().push("empty".to_owned());
    }

    fn report_available(&self, entries: &[String], link: &Url) {
        self.0
            .borrow_mut()
            .push(format!("available {} {}", entries.len(), link.query().unwrap_or_default()));
    }
}

fn settings(password: &str) -> Settings {
    Settings {
        credentials: Some(Credentials {
            login: "s21730".into(),
            password: password.into(),
        }),
        filters: vec![Filter::new(Some(1), Some(1), None)],
        ..Settings::default()
    }
}

#[test]
fn only_the_open_section_is_reported() {
    let site = Site::new(&[("1003", EVENT_OPEN)]);
    let inbox = Inbox::default();
    let watcher = Watcher::new(
        journal(&site),
        MemoryStorage::new(settings("right")),
        &inbox,
        Tz::Europe__Moscow,
    );

    let state = watcher.trigger_at(morning()).unwrap();

    assert_eq!(
        state,
        CycleState::Found(vec!["27 апр.: Секция БАДМИНТОН (Гутко)".to_owned()])
    );
    assert_eq!(
        *inbox.0.borrow(),
        vec![
            "progress 1".to_owned(),
            "available 1 section%5B%5D=1&zd%5B%5D=0&lec%5B%5D=1&date=2023-04-27&type=2&view=0"
                .to_owned(),
        ]
    );
}

#[test]
fn bad_credentials_fail_then_recover() {
    let site = Site::new(&[]);
    let inbox = Inbox::default();
    let storage = MemoryStorage::new(settings("wrong"));
    let watcher = Watcher::new(journal(&site), &storage, &inbox, Tz::Europe__Moscow);

    let state = watcher.trigger_at(morning()).unwrap();
    assert!(matches!(state, CycleState::Failed(ref m) if m.starts_with("Authentication failed")));
    assert_eq!(*site.requests.borrow(), vec!["/auth.php"]);
    assert!(storage.session().unwrap().is_none());

    // Credentials are read again on every cycle
    storage
        .set_credentials(Some(Credentials {
            login: "s21730".into(),
            password: "right".into(),
        }))
        .unwrap();
    assert_eq!(watcher.trigger_at(morning()), Some(CycleState::Empty));
    assert_eq!(storage.session().unwrap().unwrap().auth_token, "tok");
    assert_eq!(
        *inbox.0.borrow(),
        vec![
            "failure Authentication failed: Unexpected response from auth.php".to_owned(),
            "empty".to_owned(),
        ]
    );
}
