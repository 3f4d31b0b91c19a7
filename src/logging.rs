use std::io::Write;

use chrono::Utc;
use colored::{Color, Colorize as _};
use env_logger::{Builder, Env};
use log::Level;

/// Colored single-line records; `RUST_LOG` overrides the default level.
pub fn init(verbose: bool) {
    let mut builder = Builder::new();

    builder.parse_env(get_env(verbose));

    builder.format(|f, record| {
        let time = Utc::now().format("%m-%d %H:%M:%S").to_string().dimmed();
        let (letter, color) = style(record.level());
        let level = letter.color(color);
        // Module path without the crate name
        let target = record
            .target()
            .trim_start_matches("journal_watch::")
            .dimmed();
        let message = record.args().to_string().color(color);

        writeln!(f, "{time} [{level}@{target}] {message}")
    });

    builder.init();
}

fn get_env(verbose: bool) -> Env<'static> {
    let default_level = if verbose || cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };
    Env::default().default_filter_or(default_level)
}

const fn style(level: Level) -> (&'static str, Color) {
    match level {
        Level::Trace => ("T", Color::Magenta),
        Level::Debug => ("D", Color::Blue),
        Level::Info => ("I", Color::Green),
        Level::Warn => ("W", Color::Yellow),
        Level::Error => ("E", Color::Red),
    }
}
