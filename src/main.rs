mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use journal_watch::{
    Credentials, CycleState, Filter, HttpTransport, Journal, JsonStorage, LogNotifier, Menu,
    Notifiers, Session, SleepTicker, Storage, Watcher, discord::DiscordNotifier,
    journal::DEFAULT_BASE_URL, scanner::start_of_week,
};
use reqwest::Url;

/// UNN Sports Journal Enrollment Watcher
#[derive(Parser)]
struct Args {
    /// Settings file
    #[arg(long, global = true, default_value = "journal-watch.json")]
    store: PathBuf,

    /// The timezone the journal's schedule is in
    #[arg(short = 'z', long, global = true, default_value_t = Tz::Europe__Moscow)]
    timezone: Tz,

    /// Root of the journal site
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    base_url: Url,

    /// Log debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check and save your journal credentials
    Login { login: String, password: String },

    /// Forget credentials, session and cached menu
    Logout,

    /// Show the selectable sections, lectors and buildings
    Menu {
        /// Fetch the menu again instead of using the cached one
        #[arg(short, long)]
        refresh: bool,
    },

    /// Manage the saved filters
    #[command(subcommand)]
    Filter(FilterCommand),

    /// Set the minutes between two checks
    Interval { minutes: u64 },

    /// Check the journal once
    Check,

    /// Check the journal periodically
    Watch {
        /// The Discord WebHook URL the notifications should be sent to
        #[arg(short, long)]
        discord_webhook_url: Option<Url>,
    },
}

#[derive(Subcommand)]
enum FilterCommand {
    /// Save a new filter. Ids come from the `menu` command.
    Add {
        #[arg(short, long)]
        section: Option<u32>,

        #[arg(short, long)]
        lector: Option<u32>,

        #[arg(short, long)]
        building: Option<u32>,
    },
    Remove { index: usize },
    Pause { index: usize },
    Resume { index: usize },
    List,
    Clear,
}

struct App {
    journal: Journal<HttpTransport>,
    storage: JsonStorage,
    timezone: Tz,
}

impl App {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    fn login(&self, login: String, password: String) -> Result<()> {
        log::info!("Logging into the journal as {login}...");
        let session = self
            .journal
            .authenticate(&login, &password)
            .context("Could not log into the journal")?;

        self.storage
            .set_credentials(Some(Credentials { login, password }))?;
        self.storage.set_session(Some(session.clone()))?;
        self.refresh_menu(&session)?;

        log::info!("Logged in; credentials saved to {}", self.storage.path().display());
        Ok(())
    }

    fn logout(&self) -> Result<()> {
        self.storage.set_credentials(None)?;
        self.storage.set_session(None)?;
        self.storage.set_menu(None)?;
        log::info!("Credentials removed");
        Ok(())
    }

    fn session(&self) -> Result<Session> {
        let credentials = self
            .storage
            .credentials()?
            .context("No credentials; run `login` first")?;
        let session = self
            .journal
            .authenticate(&credentials.login, &credentials.password)
            .context("Could not log into the journal")?;
        self.storage.set_session(Some(session.clone()))?;
        Ok(session)
    }

    fn refresh_menu(&self, session: &Session) -> Result<Menu> {
        let menu = self
            .journal
            .extract_menu(session, self.today())
            .context("Could not fetch the menu")?;
        self.storage.set_menu(Some(menu.clone()))?;
        Ok(menu)
    }

    fn cached_menu(&self) -> Menu {
        match self.storage.menu() {
            Ok(Some(menu)) => menu,
            Ok(None) => Menu::empty(),
            Err(e) => {
                log::warn!("Could not read cached menu: {e}");
                Menu::empty()
            }
        }
    }

    fn menu(&self, refresh: bool) -> Result<()> {
        let menu = match self.storage.menu()? {
            Some(menu) if !refresh => menu,
            _ => self.refresh_menu(&self.session()?)?,
        };

        for (title, options) in [
            ("Sections", &menu.sections),
            ("Lectors", &menu.lectors),
            ("Buildings", &menu.buildings),
        ] {
            println!("{title}:");
            for (id, label) in options {
                println!("  {id:>5}  {label}");
            }
        }
        Ok(())
    }

    fn filter_at(&self, index: usize) -> Result<Filter> {
        let filters = self.storage.filters()?;
        filters
            .get(index)
            .copied()
            .with_context(|| format!("No filter #{index} (there are {})", filters.len()))
    }

    fn filter(&self, command: FilterCommand) -> Result<()> {
        match command {
            FilterCommand::Add {
                section,
                lector,
                building,
            } => {
                let filter = Filter::new(section, lector, building);
                if self.storage.add_filter(filter)? {
                    log::info!("Added {}", self.cached_menu().describe(&filter));
                } else {
                    log::warn!("The same filter is already saved");
                }
            }
            FilterCommand::Remove { index } => {
                self.storage.remove_filter(&self.filter_at(index)?)?;
            }
            FilterCommand::Pause { index } => {
                self.storage.set_filter_paused(&self.filter_at(index)?, true)?;
            }
            FilterCommand::Resume { index } => {
                self.storage.set_filter_paused(&self.filter_at(index)?, false)?;
            }
            FilterCommand::Clear => self.storage.clear_filters()?,
            FilterCommand::List => self.list_filters()?,
        }
        Ok(())
    }

    fn list_filters(&self) -> Result<()> {
        let menu = self.cached_menu();
        let week = start_of_week(self.today());
        for (i, filter) in self.storage.filters()?.iter().enumerate() {
            let paused = if filter.paused { " (paused)" } else { "" };
            println!("#{i}{paused} {}", menu.describe(filter));
            println!("    {}", self.journal.build_filter_url(week, filter)?);
        }
        Ok(())
    }

    fn interval(&self, minutes: u64) -> Result<()> {
        if minutes == 0 {
            bail!("The interval must be at least one minute");
        }
        self.storage
            .set_poll_interval(Duration::from_secs(minutes.saturating_mul(60)))?;
        log::info!("Checking every {minutes} minutes");
        Ok(())
    }

    fn check(self) -> Result<()> {
        let watcher = Watcher::new(self.journal, self.storage, LogNotifier, self.timezone);
        match watcher.trigger() {
            Some(CycleState::Failed(message)) => bail!("Check failed: {message}"),
            _ => Ok(()),
        }
    }

    fn watch(self, discord_webhook_url: Option<Url>) -> Result<()> {
        let mut notifiers = Notifiers::default().with(LogNotifier);
        if let Some(url) = discord_webhook_url {
            let discord =
                DiscordNotifier::new(url).context("Could not create Discord Webhook Client")?;
            notifiers = notifiers.with(discord);
        }

        let watcher = Watcher::new(self.journal, self.storage, notifiers, self.timezone);
        log::info!("Watching the journal every {:?}", watcher.interval());
        watcher.run(&mut SleepTicker);
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let transport = HttpTransport::new().context("Could not create HTTP client")?;
    let app = App {
        journal: Journal::new(transport, args.base_url),
        storage: JsonStorage::new(args.store),
        timezone: args.timezone,
    };

    if app.storage.first_run()? {
        log::info!(
            "First run: save your credentials with `login`, look up ids with `menu`, then `filter add` and `watch`."
        );
        app.storage.set_first_run(false)?;
    }

    match args.command {
        Command::Login { login, password } => app.login(login, password),
        Command::Logout => app.logout(),
        Command::Menu { refresh } => app.menu(refresh),
        Command::Filter(command) => app.filter(command),
        Command::Interval { minutes } => app.interval(minutes),
        Command::Check => app.check(),
        Command::Watch {
            discord_webhook_url,
        } => app.watch(discord_webhook_url),
    }
}
