//! Durable username -> record mapping backed by a single JSON document.
//!
//! Storage I/O sits behind the `CredentialRepository` trait so the store logic can run
//! against the real file (`FileRepository`) or an in-memory document (`MemoryRepository`).
//! Every mutating operation is load -> mutate -> save with no locking: two processes
//! writing at once can lose an update (last writer wins).

use crate::error::{AppError, Result};
use crate::models::{default_preferences, CredentialDatabase, Preferences, UserRecord};
use chrono::Utc;
use serde_json::{Map, Value};
#[cfg(test)]
use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Raw load/save of the whole credential document.
pub trait CredentialRepository {
    /// Returns the stored document, or an empty one when nothing usable is stored.
    fn load(&self) -> CredentialDatabase;

    /// Replaces the stored document.
    fn save(&self, db: &CredentialDatabase) -> Result<()>;
}

/// How `FileRepository::load_with_status` obtained its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No file yet.
    Missing,
    Loaded,
    /// The file exists but could not be read or is not a JSON object; an empty
    /// database was returned. Single malformed records do not trigger this.
    Recovered,
}

/// File-backed repository (`<config dir>/credentials.json`).
pub struct FileRepository {
    path: PathBuf,
}

impl FileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the document and reports whether recovery kicked in.
    pub fn load_with_status(&self) -> (CredentialDatabase, LoadStatus) {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No credential file at {}", self.path.display());
                return (CredentialDatabase::default(), LoadStatus::Missing);
            },
            Err(e) => {
                warn!(
                    "Could not read credential file {}: {}. Continuing with an empty database.",
                    self.path.display(),
                    e
                );
                return (CredentialDatabase::default(), LoadStatus::Recovered);
            },
        };

        match serde_json::from_str::<CredentialDatabase>(&raw) {
            Ok(db) => {
                debug!(
                    "Loaded {} user(s) from {}",
                    db.users.len(),
                    self.path.display()
                );
                (db, LoadStatus::Loaded)
            },
            Err(e) => {
                warn!(
                    "Credential file {} is not valid ({}). Continuing with an empty database.",
                    self.path.display(),
                    e
                );
                (CredentialDatabase::default(), LoadStatus::Recovered)
            },
        }
    }
}

impl CredentialRepository for FileRepository {
    fn load(&self) -> CredentialDatabase {
        self.load_with_status().0
    }

    fn save(&self, db: &CredentialDatabase) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_string_pretty(db)?;
        fs::write(&self.path, body)?;
        debug!("Saved {} user(s) to {}", db.users.len(), self.path.display());
        Ok(())
    }
}

/// In-memory repository for tests.
///
/// Uses `RefCell` since the tool is single-threaded.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryRepository {
    db: RefCell<CredentialDatabase>,
    saves: RefCell<usize>,
}

#[cfg(test)]
impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls seen so far.
    pub fn save_count(&self) -> usize {
        *self.saves.borrow()
    }
}

#[cfg(test)]
impl CredentialRepository for MemoryRepository {
    fn load(&self) -> CredentialDatabase {
        self.db.borrow().clone()
    }

    fn save(&self, db: &CredentialDatabase) -> Result<()> {
        *self.db.borrow_mut() = db.clone();
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}

/// Outcome of `CredentialStore::register_user`.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub record: UserRecord,
    /// `true` when this call created the record.
    pub created: bool,
}

/// User record operations on top of a repository.
pub struct CredentialStore<R: CredentialRepository> {
    repo: R,
}

impl<R: CredentialRepository> CredentialStore<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    #[cfg(test)]
    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn load(&self) -> CredentialDatabase {
        self.repo.load()
    }

    pub fn save(&self, db: &CredentialDatabase) -> Result<()> {
        self.repo.save(db)
    }

    pub fn get_user(&self, name: &str) -> Option<UserRecord> {
        self.load().users.get(name).cloned()
    }

    /// All users, sorted by name.
    pub fn list_users(&self) -> Vec<(String, UserRecord)> {
        self.load().users.into_iter().collect()
    }

    /// Creates `name` with default preferences unless it already exists.
    pub fn register_user(&self, name: &str) -> Result<Registration> {
        let name = validate_username(name)?;
        let mut db = self.load();

        if let Some(record) = db.users.get(name) {
            debug!("User {} already registered", name);
            return Ok(Registration {
                record: record.clone(),
                created: false,
            });
        }

        let record = UserRecord::new(Utc::now());
        db.users.insert(name.to_string(), record.clone());
        self.save(&db)?;
        info!("Registered new user {}", name);

        Ok(Registration {
            record,
            created: true,
        })
    }

    /// Replaces the whole preference object.
    pub fn set_preferences(&self, name: &str, preferences: Preferences) -> Result<()> {
        self.modify(name, |record| record.preferences = preferences)?;
        Ok(())
    }

    /// Merges one key into the preference object, leaving siblings alone.
    pub fn update_preference(&self, name: &str, key: &str, value: Value) -> Result<()> {
        self.modify(name, |record| {
            record.preferences.insert(key.to_string(), value);
        })?;
        Ok(())
    }

    /// Merges one key into the context object, creating it if needed.
    pub fn set_context_value(&self, name: &str, key: &str, value: Value) -> Result<()> {
        self.modify(name, |record| {
            record
                .context
                .get_or_insert_with(Map::new)
                .insert(key.to_string(), value);
        })?;
        Ok(())
    }

    /// Restores default preferences and empties the context. `registered` is kept.
    pub fn reset_user(&self, name: &str) -> Result<UserRecord> {
        let record = self.modify(name, |record| {
            record.preferences = default_preferences();
            record.context = Some(Map::new());
        })?;
        info!("Reset user {}", name);
        Ok(record)
    }

    pub fn delete_user(&self, name: &str) -> Result<()> {
        let mut db = self.load();
        if db.users.remove(name).is_none() {
            return Err(AppError::NotFound(name.to_string()));
        }
        self.save(&db)?;
        info!("Deleted user {}", name);
        Ok(())
    }

    /// Loads, applies `change` to the named record, saves, and returns the new record.
    fn modify<F>(&self, name: &str, change: F) -> Result<UserRecord>
    where
        F: FnOnce(&mut UserRecord),
    {
        let mut db = self.load();
        let record = db
            .users
            .get_mut(name)
            .ok_or_else(|| AppError::NotFound(name.to_string()))?;
        change(record);
        let updated = record.clone();
        self.save(&db)?;
        Ok(updated)
    }
}

/// Trims a username and rejects empty ones.
pub fn validate_username(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "username must not be empty".to_string(),
        ));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(AppError::Validation(
            "username must not contain control characters".to_string(),
        ));
    }
    Ok(trimmed)
}
