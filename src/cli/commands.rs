use crate::api::{BrowserClient, FeedClient, DEFAULT_SECTION, SECTIONS};
use crate::cli::onboard::{
    ensure_registered, identify, resolve_user, Identity, Session, TerminalPrompter,
};
use crate::config::Settings;
use crate::db::{CredentialStore, FileRepository, PreferenceAccessor};
use crate::error::{AppError, Result};
use crate::models::{Article, Headline, Preferences, SearchResult, UserRecord};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use colored::*;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::json;
use std::io::{ErrorKind, IsTerminal, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

/// News headlines and reading preferences for agent-written briefings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the latest headlines of a section
    Headlines(HeadlinesArgs),

    /// Extract the full text of an article through the browser session
    Read(ReadArgs),

    /// Search the site through the browser session
    Search(SearchArgs),

    /// Show whether the browser bridge is reachable
    Status,

    /// List the known feed sections
    Sections,

    /// Read or change the current user's preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),

    /// Show, reset, delete or list user profiles
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Args, Debug)]
pub struct HeadlinesArgs {
    /// Section to fetch (see `sections`)
    #[arg(short, long, default_value = DEFAULT_SECTION)]
    pub section: String,

    /// Maximum number of headlines (default: 20)
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Article URL
    pub url: String,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search terms
    pub query: String,

    /// Maximum number of results (default: 10)
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    /// Print the preferences as JSON
    Get,

    /// Replace all preferences with a JSON object
    Set {
        /// e.g. '{"topics":["AI"],"instructions":"..."}'
        json: String,
    },

    /// Set a single preference key (value is parsed as JSON, else kept as text)
    Update { key: String, value: String },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Show the current user's profile
    Show,

    /// Restore default preferences and clear the context
    Reset,

    /// Delete the current user's profile
    Delete,

    /// List all profiles
    List,
}

/// CLI application
pub struct App {
    settings: Settings,
    store: CredentialStore<FileRepository>,
    feeds: FeedClient,
    browser: BrowserClient,
}

impl App {
    /// Create a new CLI application
    pub fn new(settings: Settings) -> Result<Self> {
        let store = CredentialStore::new(FileRepository::new(settings.credentials_path()));
        let feeds = FeedClient::new(&settings.feed_base_url, settings.session_cookie.clone())?;
        let browser = BrowserClient::new(&settings.browser_url, &settings.feed_base_url)?;

        Ok(Self {
            settings,
            store,
            feeds,
            browser,
        })
    }

    /// Run one command to completion
    pub async fn run(&self, cli: Cli) -> Result<()> {
        match cli.command {
            Commands::Status => self.show_status().await,
            Commands::Sections => self.list_sections(),
            Commands::Headlines(args) => {
                let session = self.session()?;
                self.headlines(&session, &args).await
            },
            Commands::Read(args) => {
                let session = self.session()?;
                self.read(&session, &args).await
            },
            Commands::Search(args) => {
                let session = self.session()?;
                self.search(&session, &args).await
            },
            Commands::Prefs(cmd) => {
                let session = self.session()?;
                self.prefs(&session, cmd)
            },
            // Listing only marks the current user, so it never prompts.
            Commands::User(UserCommand::List) => self.list_users(),
            Commands::User(cmd) => {
                let session = self.session()?;
                self.user(&session, cmd)
            },
        }
    }

    fn session(&self) -> Result<Session> {
        let interactive = std::io::stdin().is_terminal();
        resolve_user(
            &self.store,
            self.settings.user.as_deref(),
            interactive,
            &mut TerminalPrompter,
        )
    }

    /// Registers the user if needed and returns their preferences.
    fn preferences_for(&self, session: &Session) -> Result<Preferences> {
        if !session.prompted {
            ensure_registered(&self.store, &session.username)?;
        }
        PreferenceAccessor::new(&self.store).get(&session.username)
    }

    async fn headlines(&self, session: &Session, args: &HeadlinesArgs) -> Result<()> {
        let preferences = self.preferences_for(session)?;
        // Validate before the spinner shows up.
        self.feeds.section_url(&args.section)?;

        let progress = spinner(&format!("Fetching {} headlines...", args.section))?;
        let result = self.feeds.fetch_headlines(&args.section, args.limit).await;
        progress.finish_and_clear();
        let headlines = result?;

        let last = json!({
            "section": args.section,
            "count": headlines.len(),
            "fetched_at": Utc::now().to_rfc3339(),
        });
        if let Err(e) = self
            .store
            .set_context_value(&session.username, "last_headlines", last)
        {
            warn!("Could not record last fetch for {}: {}", session.username, e);
        }

        if args.json {
            print_json(&json!({
                "user": session.username,
                "preferences": preferences,
                "section": args.section,
                "headlines": headlines,
            }))
        } else {
            print_preferences(&session.username, &preferences)?;
            emit(&render_headlines(&args.section, &headlines))
        }
    }

    async fn read(&self, session: &Session, args: &ReadArgs) -> Result<()> {
        let preferences = self.preferences_for(session)?;

        let progress = spinner("Reading article...")?;
        let result = self.browser.read_article(&args.url).await;
        progress.finish_and_clear();
        let article = result?;

        if args.json {
            print_json(&json!({
                "user": session.username,
                "preferences": preferences,
                "article": article,
            }))
        } else {
            print_preferences(&session.username, &preferences)?;
            emit(&render_article(&article))
        }
    }

    async fn search(&self, session: &Session, args: &SearchArgs) -> Result<()> {
        let preferences = self.preferences_for(session)?;

        let progress = spinner(&format!("Searching for '{}'...", args.query))?;
        let result = self.browser.search(&args.query, args.limit).await;
        progress.finish_and_clear();
        let results = result?;

        if args.json {
            print_json(&json!({
                "user": session.username,
                "preferences": preferences,
                "query": args.query,
                "results": results,
            }))
        } else {
            print_preferences(&session.username, &preferences)?;
            emit(&render_search_results(&args.query, &results))
        }
    }

    async fn show_status(&self) -> Result<()> {
        let status = self.browser.status().await?;
        let mut out = if status.connected {
            format!("{}\n", "Browser session: connected".green())
        } else {
            format!("{}\n", "Browser session: not connected".yellow())
        };
        if let Some(browser) = &status.browser {
            out.push_str(&format!("Browser: {}\n", browser));
        }
        match status.logged_in {
            Some(true) => out.push_str("Logged in: yes\n"),
            Some(false) => out.push_str("Logged in: no (articles may be truncated)\n"),
            None => {},
        }
        emit(&out)
    }

    fn list_sections(&self) -> Result<()> {
        let mut table = Table::new();
        table.set_header(vec!["Section", "Feed URL"]);
        for section in SECTIONS {
            table.add_row(vec![section.to_string(), self.feeds.section_url(section)?]);
        }
        emit(&format!("{table}\n"))
    }

    fn prefs(&self, session: &Session, cmd: PrefsCommand) -> Result<()> {
        ensure_registered(&self.store, &session.username)?;
        let accessor = PreferenceAccessor::new(&self.store);

        match cmd {
            PrefsCommand::Get => print_json(&accessor.get(&session.username)?),
            PrefsCommand::Set { json } => {
                accessor.set_raw(&session.username, &json)?;
                info!("Preferences replaced for {}", session.username);
                eprintln!("{} {}", "Preferences saved for".green(), session.username);
                Ok(())
            },
            PrefsCommand::Update { key, value } => {
                accessor.update(&session.username, &key, &value)?;
                info!("Preference {} updated for {}", key, session.username);
                eprintln!(
                    "{} '{}' {} {}",
                    "Updated".green(),
                    key,
                    "for".green(),
                    session.username
                );
                Ok(())
            },
        }
    }

    fn user(&self, session: &Session, cmd: UserCommand) -> Result<()> {
        let username = session.username.as_str();

        match cmd {
            UserCommand::Show => {
                ensure_registered(&self.store, username)?;
                let record = self
                    .store
                    .get_user(username)
                    .ok_or_else(|| AppError::NotFound(username.to_string()))?;
                emit(&format!("{}\n", render_user(username, &record)?))
            },
            UserCommand::Reset => {
                let record = PreferenceAccessor::new(&self.store).reset(username)?;
                eprintln!("{} {}", "Reset preferences for".green(), username);
                print_json(&record.preferences)
            },
            UserCommand::Delete => {
                self.store.delete_user(username)?;
                eprintln!("{} {}", "Deleted user".green(), username);
                Ok(())
            },
            UserCommand::List => self.list_users(),
        }
    }

    /// All profiles, with the configured user (if any) marked by `*`.
    fn list_users(&self) -> Result<()> {
        let users = self.store.list_users();
        if users.is_empty() {
            eprintln!("{}", "No users registered yet.".yellow());
            return Ok(());
        }
        let current = match identify(self.settings.user.as_deref()) {
            Identity::Resolved(name) => Some(name),
            Identity::NeedsPrompt => None,
        };

        let mut table = Table::new();
        table.set_header(vec!["User", "Registered", "Preference keys"]);
        for (name, record) in users {
            let marker = if current.as_deref() == Some(name.as_str()) {
                " *"
            } else {
                ""
            };
            let keys: Vec<&str> = record.preferences.keys().map(String::as_str).collect();
            table.add_row(vec![
                format!("{}{}", name, marker),
                record.registered.to_rfc3339(),
                keys.join(", "),
            ]);
        }
        emit(&format!("{table}\n"))
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    progress.set_message(message.to_string());
    progress.enable_steady_tick(Duration::from_millis(100));
    Ok(progress)
}

/// Writes `text` to stdout. A reader that went away early (`| head`) is not an error.
fn emit(text: &str) -> Result<()> {
    write_until_closed(&mut std::io::stdout().lock(), text)
}

fn write_until_closed<W: Write>(out: &mut W, text: &str) -> Result<()> {
    match out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!("stdout closed by reader, dropping remaining output");
            Ok(())
        },
        other => Ok(other?),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    emit(&format!("{}\n", serde_json::to_string_pretty(value)?))
}

fn print_preferences(username: &str, preferences: &Preferences) -> Result<()> {
    emit(&format!(
        "# Preferences for {}\n{}\n\n",
        username,
        serde_json::to_string_pretty(preferences)?
    ))
}

/// Plain-text headline list handed to the formatting agent.
pub fn render_headlines(section: &str, headlines: &[Headline]) -> String {
    let mut out = format!("# Headlines: {} ({})\n", section, headlines.len());
    for (i, headline) in headlines.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n", i + 1, headline.title));
        if !headline.link.is_empty() {
            out.push_str(&format!("   {}\n", headline.link));
        }
        let mut meta = Vec::new();
        if let Some(published) = headline.published {
            meta.push(published.format("%Y-%m-%d %H:%M UTC").to_string());
        }
        if let Some(category) = &headline.category {
            meta.push(category.clone());
        }
        if !meta.is_empty() {
            out.push_str(&format!("   {}\n", meta.join(" | ")));
        }
        if let Some(description) = &headline.description {
            out.push_str(&format!("   {}\n", description));
        }
    }
    out
}

pub fn render_article(article: &Article) -> String {
    let mut out = format!("# {}\n", article.title);
    let meta: Vec<&str> = [article.byline.as_deref(), article.published.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if !meta.is_empty() {
        out.push_str(&format!("{}\n", meta.join(" | ")));
    }
    out.push_str(&format!("{}\n\n{}\n", article.url, article.text.trim()));
    out
}

pub fn render_search_results(query: &str, results: &[SearchResult]) -> String {
    let mut out = format!("# Search: {} ({})\n", query, results.len());
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n   {}\n", i + 1, result.title, result.url));
        if let Some(published) = &result.published {
            out.push_str(&format!("   {}\n", published));
        }
        if let Some(snippet) = &result.snippet {
            out.push_str(&format!("   {}\n", snippet));
        }
    }
    out
}

fn render_user(username: &str, record: &UserRecord) -> Result<Table> {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["User".to_string(), username.to_string()]);
    table.add_row(vec!["Registered".to_string(), record.registered.to_rfc3339()]);
    table.add_row(vec![
        "Preferences".to_string(),
        serde_json::to_string_pretty(&record.preferences)?,
    ]);
    let context = match &record.context {
        Some(context) => serde_json::to_string_pretty(context)?,
        None => "-".to_string(),
    };
    table.add_row(vec!["Context".to_string(), context]);
    Ok(table)
}
