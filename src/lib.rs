#![deny(unexpected_cfgs)]
//
#![warn(clippy::cargo)]
#![warn(clippy::nursery)]
//
// https://github.com/rust-lang/rust-clippy/issues/16440
#![allow(clippy::multiple_crate_versions)]

mod error;
mod validate;

pub mod discord;
pub mod journal;
pub mod model;
pub mod notify;
pub mod scanner;
pub mod store;
pub mod watcher;

pub use error::{Error, Result};
pub use journal::{HttpTransport, Journal, Transport};
pub use model::{Credentials, Filter, Menu, Section, Session};
pub use notify::{LogNotifier, Notifier, Notifiers};
pub use scanner::{ScanOutcome, ScanResult, scan};
pub use store::{JsonStorage, MemoryStorage, Settings, Storage};
pub use watcher::{CycleState, SleepTicker, Ticker, Watcher};
