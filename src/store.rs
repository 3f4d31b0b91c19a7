use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Credentials, Filter, Menu, Session};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_mins(10);

/// Everything the watcher persists between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub credentials: Option<Credentials>,
    pub session: Option<Session>,
    pub menu: Option<Menu>,
    /// Unique by all fields, kept in insertion order
    pub filters: Vec<Filter>,
    pub poll_interval_mins: u64,
    pub first_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials: None,
            session: None,
            menu: None,
            filters: Vec::new(),
            poll_interval_mins: DEFAULT_POLL_INTERVAL.as_secs() / 60,
            first_run: true,
        }
    }
}

impl Settings {
    fn add_filter(&mut self, filter: Filter) -> Result<bool> {
        if filter.is_empty() {
            return Err(Error::config("Refusing to save an empty filter"));
        }
        if self.filters.contains(&filter) {
            return Ok(false);
        }
        self.filters.push(filter);
        Ok(true)
    }

    fn remove_filter(&mut self, filter: &Filter) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f != filter);
        self.filters.len() != before
    }

    fn set_filter_paused(&mut self, filter: &Filter, paused: bool) -> bool {
        let Some(index) = self.filters.iter().position(|f| f == filter) else {
            return false;
        };
        let updated = filter.with_paused(paused);
        if self.filters.contains(&updated) {
            self.filters.remove(index);
        } else {
            self.filters[index] = updated;
        }
        true
    }
}

/// Key-value contract of the settings store.
///
/// Every getter reads the current state, nothing is cached between calls.
pub trait Storage {
    /// Snapshot of all settings
    fn load(&self) -> Result<Settings>;

    /// Apply `change` to the settings and persist the result
    fn update<R>(&self, change: impl FnOnce(&mut Settings) -> R) -> Result<R>;

    fn credentials(&self) -> Result<Option<Credentials>> {
        Ok(self.load()?.credentials)
    }

    fn set_credentials(&self, credentials: Option<Credentials>) -> Result<()> {
        self.update(|s| s.credentials = credentials)
    }

    fn session(&self) -> Result<Option<Session>> {
        Ok(self.load()?.session)
    }

    fn set_session(&self, session: Option<Session>) -> Result<()> {
        self.update(|s| s.session = session)
    }

    fn menu(&self) -> Result<Option<Menu>> {
        Ok(self.load()?.menu)
    }

    fn set_menu(&self, menu: Option<Menu>) -> Result<()> {
        self.update(|s| s.menu = menu)
    }

    fn filters(&self) -> Result<Vec<Filter>> {
        Ok(self.load()?.filters)
    }

    /// Returns `false` if an identical filter is already stored.
    ///
    /// # Errors
    /// [`Error::Config`] for an empty filter.
    fn add_filter(&self, filter: Filter) -> Result<bool> {
        self.update(|s| s.add_filter(filter))?
    }

    fn remove_filter(&self, filter: &Filter) -> Result<bool> {
        self.update(|s| s.remove_filter(filter))
    }

    fn set_filter_paused(&self, filter: &Filter, paused: bool) -> Result<bool> {
        self.update(|s| s.set_filter_paused(filter, paused))
    }

    fn clear_filters(&self) -> Result<()> {
        self.update(|s| s.filters.clear())
    }

    fn poll_interval(&self) -> Result<Duration> {
        let mins = self.load()?.poll_interval_mins;
        Ok(Duration::from_secs(mins.saturating_mul(60)))
    }

    fn set_poll_interval(&self, interval: Duration) -> Result<()> {
        self.update(|s| s.poll_interval_mins = interval.as_secs() / 60)
    }

    fn first_run(&self) -> Result<bool> {
        Ok(self.load()?.first_run)
    }

    fn set_first_run(&self, first_run: bool) -> Result<()> {
        self.update(|s| s.first_run = first_run)
    }

    fn clear(&self) -> Result<()> {
        self.update(|s| *s = Settings::default())
    }
}

impl<S: Storage> Storage for &S {
    fn load(&self) -> Result<Settings> {
        (**self).load()
    }

    fn update<R>(&self, change: impl FnOnce(&mut Settings) -> R) -> Result<R> {
        (**self).update(change)
    }
}

/// Settings kept as one JSON document on disk. A missing file reads as defaults.
#[derive(Debug)]
pub struct JsonStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Settings> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(Error::Storage(format!(
                "Could not read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl Storage for JsonStorage {
    fn load(&self) -> Result<Settings> {
        let _guard = self.lock.lock().map_err(|e| Error::Storage(e.to_string()))?;
        self.read()
    }

    fn update<R>(&self, change: impl FnOnce(&mut Settings) -> R) -> Result<R> {
        let _guard = self.lock.lock().map_err(|e| Error::Storage(e.to_string()))?;
        let mut settings = self.read()?;
        let ret = change(&mut settings);
        self.write(&settings)?;
        Ok(ret)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    settings: Mutex<Settings>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Settings> {
        let settings = self.settings.lock().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(settings.clone())
    }

    fn update<R>(&self, change: impl FnOnce(&mut Settings) -> R) -> Result<R> {
        let mut settings = self.settings.lock().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(change(&mut settings))
    }
}
