use chrono::NaiveDateTime;
use reqwest::Url;

/// Receives the status of every check cycle.
pub trait Notifier {
    fn report_checking(&self);

    /// Called each time a scan in progress finds another entry
    fn report_progress(&self, _entries: &[String]) {}

    fn report_failure(&self, message: &str);

    fn report_empty(&self, next_check: NaiveDateTime);

    /// `link` opens the schedule page of the first entry
    fn report_available(&self, entries: &[String], link: &Url);
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn report_checking(&self) {
        (**self).report_checking();
    }

    fn report_progress(&self, entries: &[String]) {
        (**self).report_progress(entries);
    }

    fn report_failure(&self, message: &str) {
        (**self).report_failure(message);
    }

    fn report_empty(&self, next_check: NaiveDateTime) {
        (**self).report_empty(next_check);
    }

    fn report_available(&self, entries: &[String], link: &Url) {
        (**self).report_available(entries, link);
    }
}

/// Writes every report to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn report_checking(&self) {
        log::info!("Checking the journal...");
    }

    fn report_progress(&self, entries: &[String]) {
        log::debug!("{} available so far", entries.len());
    }

    fn report_failure(&self, message: &str) {
        log::error!("Check failed: {message}");
    }

    fn report_empty(&self, next_check: NaiveDateTime) {
        log::info!(
            "Nothing available. Next check at {}",
            next_check.format("%H:%M")
        );
    }

    fn report_available(&self, entries: &[String], link: &Url) {
        log::info!("Enrollment open for {} sections:", entries.len());
        for entry in entries {
            log::info!("  {entry}");
        }
        log::info!("Open: {link}");
    }
}

/// Forwards every report to all of its notifiers in order.
#[derive(Default)]
pub struct Notifiers(Vec<Box<dyn Notifier + Send + Sync>>);

impl Notifiers {
    #[must_use]
    pub fn with(mut self, notifier: impl Notifier + Send + Sync + 'static) -> Self {
        self.0.push(Box::new(notifier));
        self
    }
}

impl Notifier for Notifiers {
    fn report_checking(&self) {
        self.0.iter().for_each(|n| n.report_checking());
    }

    fn report_progress(&self, entries: &[String]) {
        self.0.iter().for_each(|n| n.report_progress(entries));
    }

    fn report_failure(&self, message: &str) {
        self.0.iter().for_each(|n| n.report_failure(message));
    }

    fn report_empty(&self, next_check: NaiveDateTime) {
        self.0.iter().for_each(|n| n.report_empty(next_check));
    }

    fn report_available(&self, entries: &[String], link: &Url) {
        self.0.iter().for_each(|n| n.report_available(entries, link));
    }
}
