//! Works out who the current user is for this invocation.
//!
//! The environment wins. Without it, an interactive terminal gets one prompt; anything
//! else is a configuration error. A name typed at the prompt is registered right away,
//! while a name from the environment is registered lazily by [`ensure_registered`].

use crate::config::USER_ENV;
use crate::db::{validate_username, CredentialRepository, CredentialStore};
use crate::error::{AppError, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Input};
use tracing::{debug, info};

/// First step of identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Resolved(String),
    NeedsPrompt,
}

/// Source of a typed username.
pub trait Prompter {
    /// Blocks until one line is read. No timeout.
    fn ask_username(&mut self) -> Result<String>;
}

/// Reads the username from the terminal with `dialoguer`.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask_username(&mut self) -> Result<String> {
        let name: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("No user configured. Enter a username")
            .allow_empty(true)
            .interact_text()?;
        Ok(name)
    }
}

/// The resolved user for the rest of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    /// The name came from the prompt rather than the environment.
    pub prompted: bool,
}

pub fn identify(env_user: Option<&str>) -> Identity {
    match env_user.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => Identity::Resolved(name.to_string()),
        None => Identity::NeedsPrompt,
    }
}

/// Resolves the current user, prompting when allowed.
pub fn resolve_user<R, P>(
    store: &CredentialStore<R>,
    env_user: Option<&str>,
    interactive: bool,
    prompter: &mut P,
) -> Result<Session>
where
    R: CredentialRepository,
    P: Prompter + ?Sized,
{
    match identify(env_user) {
        Identity::Resolved(username) => {
            debug!("Using user {} from {}", username, USER_ENV);
            Ok(Session {
                username,
                prompted: false,
            })
        },
        Identity::NeedsPrompt if !interactive => Err(AppError::Config(format!(
            "{} is not set and there is no interactive terminal to ask for a username. \
             Set it first, e.g. `export {}=<name>`.",
            USER_ENV, USER_ENV
        ))),
        Identity::NeedsPrompt => {
            let typed = prompter.ask_username()?;
            if typed.trim().is_empty() {
                return Err(AppError::Config(
                    "A username is required. Nothing was saved.".to_string(),
                ));
            }
            let username = validate_username(&typed)?.to_string();

            let registration = store.register_user(&username)?;
            if registration.created {
                eprintln!("{} {}", "Created profile for".green(), username.bold());
            } else {
                eprintln!("{} {}", "Welcome back,".green(), username.bold());
            }
            eprintln!(
                "To skip this prompt next time, run `export {}={}` or add `{}={}` to a .env file.",
                USER_ENV, username, USER_ENV, username
            );
            info!(
                "Onboarded user {} interactively (registered {})",
                username, registration.record.registered
            );

            Ok(Session {
                username,
                prompted: true,
            })
        },
    }
}

/// Registers `username` if it has no record yet. Returns `true` if it was created.
pub fn ensure_registered<R: CredentialRepository>(
    store: &CredentialStore<R>,
    username: &str,
) -> Result<bool> {
    if store.get_user(username).is_some() {
        return Ok(false);
    }
    let registration = store.register_user(username)?;
    if registration.created {
        eprintln!(
            "{} {} {}",
            "Registered new user".green(),
            username.bold(),
            "with default preferences.".green()
        );
    }
    Ok(registration.created)
}
