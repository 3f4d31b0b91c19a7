use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};
use crate::journal::{Journal, Transport};
use crate::notify::Notifier;
use crate::scanner::{ScanResult, scan};
use crate::store::{DEFAULT_POLL_INTERVAL, Storage};

/// Lower bound for the gap between two checks, whatever is configured
pub const MIN_POLL_INTERVAL: Duration = Duration::from_mins(1);

/// Where the watcher is in its check cycle.
///
/// Every state but `Checking` accepts the next trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Checking,
    /// Display keys of the open sections
    Found(Vec<String>),
    Empty,
    Failed(String),
}

/// Fires the watcher repeatedly.
pub trait Ticker {
    /// Block for at least `gap`. Returns `false` to stop watching.
    fn wait(&mut self, gap: Duration) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SleepTicker;

impl Ticker for SleepTicker {
    fn wait(&mut self, gap: Duration) -> bool {
        sleep(gap);
        true
    }
}

/// Marks a cycle as running until dropped
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Watcher<T, S, N> {
    journal: Journal<T>,
    storage: S,
    notifier: N,
    timezone: Tz,
    in_progress: AtomicBool,
    state: Mutex<CycleState>,
}

impl<T: Transport, S: Storage, N: Notifier> Watcher<T, S, N> {
    /// `timezone` is the journal's local time, used to tell past sections from upcoming ones.
    pub fn new(journal: Journal<T>, storage: S, notifier: N, timezone: Tz) -> Self {
        Self {
            journal,
            storage,
            notifier,
            timezone,
            in_progress: AtomicBool::new(false),
            state: Mutex::new(CycleState::Idle),
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_state(&self, state: CycleState) {
        log::debug!("Cycle state: {state:?}");
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Configured poll interval, never below [`MIN_POLL_INTERVAL`]
    pub fn interval(&self) -> Duration {
        let interval = self.storage.poll_interval().unwrap_or_else(|e| {
            log::warn!("Could not read poll interval, using default: {e}");
            DEFAULT_POLL_INTERVAL
        });
        interval.max(MIN_POLL_INTERVAL)
    }

    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.timezone).naive_local()
    }

    /// Check the journal once, unless a check is already running.
    ///
    /// Returns the outcome, or `None` if the trigger was ignored.
    pub fn trigger(&self) -> Option<CycleState> {
        self.trigger_at(self.now())
    }

    pub fn trigger_at(&self, now: NaiveDateTime) -> Option<CycleState> {
        let Some(_guard) = CycleGuard::acquire(&self.in_progress) else {
            log::warn!("Previous check still running; ignoring trigger");
            return None;
        };

        self.set_state(CycleState::Checking);
        self.notifier.report_checking();

        let state = match self.check(now) {
            Ok(found) if found.is_empty() => {
                let next = TimeDelta::from_std(self.interval())
                    .ok()
                    .and_then(|gap| now.checked_add_signed(gap))
                    .unwrap_or(now);
                self.notifier.report_empty(next);
                CycleState::Empty
            }
            Ok(found) => {
                let keys = found.keys();
                self.notifier.report_available(&keys, &self.link_to_first(&found));
                CycleState::Found(keys)
            }
            Err(e) => {
                let message = e.to_string();
                log::error!("Check failed: {message}");
                self.notifier.report_failure(&message);
                CycleState::Failed(message)
            }
        };

        self.set_state(state.clone());
        Some(state)
    }

    fn check(&self, now: NaiveDateTime) -> Result<ScanResult> {
        let credentials = self
            .storage
            .credentials()?
            .ok_or_else(|| Error::config("No credentials"))?;
        let filters = self.storage.filters()?;
        if filters.is_empty() {
            return Err(Error::config("No filters"));
        }

        let session = self
            .journal
            .authenticate(&credentials.login, &credentials.password)?;
        self.storage.set_session(Some(session.clone()))?;

        let outcome = scan(&self.journal, &session, &filters, now, |found| {
            self.notifier.report_progress(&found.keys());
        })?;
        if outcome.skipped > 0 {
            log::info!("{} section blocks could not be parsed", outcome.skipped);
        }
        self.storage.set_menu(Some(outcome.menu))?;

        Ok(outcome.found)
    }

    fn link_to_first(&self, found: &ScanResult) -> reqwest::Url {
        found
            .first()
            .and_then(|first| {
                self.journal
                    .build_filter_url(first.section.date, &first.filter)
                    .ok()
            })
            .unwrap_or_else(|| self.journal.base_url().clone())
    }

    /// Check, wait, repeat until `ticker` says stop. A failed check does not end the loop.
    pub fn run(&self, ticker: &mut impl Ticker) {
        loop {
            self.trigger();
            let gap = self.interval();
            log::debug!("Next check in {gap:?}");
            if !ticker.wait(gap) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::journal::testing::{
        AUTH_OK, EVENT_CLOSED, EVENT_OPEN, FakeTransport, MENU, SCHEDULE, journal,
    };
    use crate::model::{Credentials, Filter};
    use crate::store::{MemoryStorage, Settings};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl Notifier for &Recorder {
        fn report_checking(&self) {
            self.push("checking".into());
        }

        fn report_failure(&self, message: &str) {
            self.push(format!("failure: {message}"));
        }

        fn report_empty(&self, next_check: NaiveDateTime) {
            self.push(format!("empty, next at {}", next_check.format("%H:%M")));
        }

        fn report_available(&self, entries: &[String], link: &reqwest::Url) {
            self.push(format!("available: {} -> {}", entries.join(" | "), link.path()));
        }
    }

    struct CountingTicker {
        left: usize,
        gaps: Vec<Duration>,
    }

    impl Ticker for CountingTicker {
        fn wait(&mut self, gap: Duration) -> bool {
            self.gaps.push(gap);
            self.left -= 1;
            self.left > 0
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 4, 25)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn storage() -> MemoryStorage {
        MemoryStorage::new(Settings {
            credentials: Some(Credentials {
                login: "s21730".into(),
                password: "hunter2".into(),
            }),
            filters: vec![Filter::new(Some(1), Some(1), None)],
            ..Settings::default()
        })
    }

    fn site(event: &str) -> FakeTransport {
        FakeTransport::default()
            .with("/auth.php", AUTH_OK)
            .with("/section/getmenu.php", MENU)
            .with("/section/schedule.php", SCHEDULE)
            .with("/section/eventinfo.php", event)
    }

    #[test]
    fn open_sections_are_reported() {
        let recorder = Recorder::default();
        let watcher = Watcher::new(journal(site(EVENT_OPEN)), storage(), &recorder, Tz::Europe__Moscow);

        let state = watcher.trigger_at(now()).unwrap();

        let keys = vec![
            "25 апр.: Секция БАДМИНТОН (Гутко)".to_owned(),
            "27 апр.: Секция БАДМИНТОН (Гутко)".to_owned(),
        ];
        assert_eq!(state, CycleState::Found(keys.clone()));
        assert_eq!(watcher.state(), CycleState::Found(keys));
        assert_eq!(
            recorder.events(),
            vec![
                "checking".to_owned(),
                "available: 25 апр.: Секция БАДМИНТОН (Гутко) | 27 апр.: Секция БАДМИНТОН (Гутко) -> /section/index.php".to_owned(),
            ]
        );

        let settings = watcher.storage.load().unwrap();
        assert_eq!(settings.session.unwrap().auth_token, "5f2b9c0e7d1a4b38");
        assert_eq!(settings.menu.unwrap().sections.len(), 5);
    }

    #[test]
    fn nothing_open_reports_next_check() {
        let recorder = Recorder::default();
        let watcher = Watcher::new(journal(site(EVENT_CLOSED)), storage(), &recorder, Tz::Europe__Moscow);

        assert_eq!(watcher.trigger_at(now()), Some(CycleState::Empty));
        assert_eq!(recorder.events(), vec!["checking", "empty, next at 09:10"]);
    }

    #[test]
    fn missing_credentials_fail_the_cycle() {
        let recorder = Recorder::default();
        let watcher = Watcher::new(
            journal(site(EVENT_OPEN)),
            MemoryStorage::default(),
            &recorder,
            Tz::Europe__Moscow,
        );

        assert_eq!(
            watcher.trigger_at(now()),
            Some(CycleState::Failed("No credentials".into()))
        );
        assert_eq!(recorder.events(), vec!["checking", "failure: No credentials"]);
        assert_eq!(watcher.journal.transport.call_count("/auth.php"), 0);
    }

    #[test]
    fn failed_cycle_does_not_lock_out_the_next() {
        let recorder = Recorder::default();
        // The schedule page is missing, so every scan breaks after the menu
        let transport = FakeTransport::default()
            .with("/auth.php", AUTH_OK)
            .with("/section/getmenu.php", MENU);
        let watcher = Watcher::new(journal(transport), storage(), &recorder, Tz::Europe__Moscow);

        let first = watcher.trigger_at(now()).unwrap();
        assert!(matches!(first, CycleState::Failed(_)));
        assert!(matches!(watcher.state(), CycleState::Failed(_)));

        let second = watcher.trigger_at(now()).unwrap();
        assert!(matches!(second, CycleState::Failed(_)));
        assert_eq!(watcher.journal.transport.call_count("/auth.php"), 2);
    }

    #[test]
    fn trigger_during_a_check_is_ignored() {
        let recorder = Recorder::default();
        let watcher = Watcher::new(journal(site(EVENT_OPEN)), storage(), &recorder, Tz::Europe__Moscow);

        let guard = CycleGuard::acquire(&watcher.in_progress).unwrap();
        assert_eq!(watcher.trigger_at(now()), None);
        assert!(recorder.events().is_empty());

        drop(guard);
        assert!(watcher.trigger_at(now()).is_some());
    }

    #[test]
    fn poisoned_state_still_tracks_cycles() {
        let recorder = Recorder::default();
        let watcher = Watcher::new(journal(site(EVENT_CLOSED)), storage(), &recorder, Tz::Europe__Moscow);

        std::thread::scope(|s| {
            let poisoner = s.spawn(|| {
                let _state = watcher.state.lock().unwrap();
                panic!("poison the state lock");
            });
            assert!(poisoner.join().is_err());
        });
        assert!(watcher.state.is_poisoned());

        assert_eq!(watcher.trigger_at(now()), Some(CycleState::Empty));
        assert_eq!(watcher.state(), CycleState::Empty);
    }

    #[test]
    fn run_keeps_polling_with_minimum_gap() {
        let recorder = Recorder::default();
        let storage = storage();
        storage.set_poll_interval(Duration::ZERO).unwrap();
        let transport = FakeTransport::default().with("/auth.php", "maintenance");
        let watcher = Watcher::new(journal(transport), storage, &recorder, Tz::Europe__Moscow);

        let mut ticker = CountingTicker {
            left: 3,
            gaps: Vec::new(),
        };
        watcher.run(&mut ticker);

        assert_eq!(ticker.gaps, vec![MIN_POLL_INTERVAL; 3]);
        assert_eq!(watcher.journal.transport.call_count("/auth.php"), 3);
        assert!(matches!(watcher.state(), CycleState::Failed(_)));
    }
}
