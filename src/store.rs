//! Roster and session history, persisted as JSON values in a key-value store.

use crate::app_dirs::AppDirs;
use crate::character::{presets, Character};
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::session::{SessionKind, SessionResult};
use crate::util::{mean, std_dev};
use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

pub const ROSTER_KEY: &str = "roster";
pub const SPRINT_HISTORY_KEY: &str = "sprintHistory";
pub const RACE_HISTORY_KEY: &str = "raceHistory";

/// String-keyed JSON storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        self.put(key, &serde_json::to_string(value)?)
    }
}

/// SQLite-backed store: a single `kv` table.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens the store under `$HOME/.local/state/uma-stable`.
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("uma_stable.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }

    /// When `key` was last written.
    pub fn updated_at(&self, key: &str) -> Result<Option<String>> {
        let ts = self
            .conn
            .query_row("SELECT updated_at FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(ts)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, Local::now().to_rfc3339()],
        )?;
        log::debug!("stored {} bytes under {key}", value.len());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Receives every finished session exactly once.
pub trait ResultSink {
    fn apply_result(&mut self, result: &SessionResult) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySummary {
    pub count: usize,
    pub mean_score: Option<f64>,
    pub std_dev: Option<f64>,
    pub best: Option<i64>,
}

#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    date: String,
    kind: String,
    character: &'a str,
    score: i64,
    good: i32,
    over: i32,
    under: i32,
    placement: Option<u32>,
    xp: u32,
}

fn history_key(kind: SessionKind) -> &'static str {
    match kind {
        SessionKind::Sprint => SPRINT_HISTORY_KEY,
        SessionKind::BeatRace | SessionKind::StatRace => RACE_HISTORY_KEY,
    }
}

/// The player's stable: roster plus per-kind history, written through to `S`.
#[derive(Debug)]
pub struct Stable<S: KeyValueStore> {
    store: S,
    roster: Vec<Character>,
    sprints: Vec<SessionResult>,
    races: Vec<SessionResult>,
}

impl<S: KeyValueStore> Stable<S> {
    /// Loads the stable, seeding the roster from the presets the first time.
    pub fn open(store: S) -> Result<Self> {
        let roster = match store.load::<Vec<Character>>(ROSTER_KEY)? {
            Some(roster) if !roster.is_empty() => roster,
            _ => {
                log::info!("seeding roster with presets");
                let roster = presets();
                store.save(ROSTER_KEY, &roster)?;
                roster
            }
        };
        let sprints = store.load(SPRINT_HISTORY_KEY)?.unwrap_or_default();
        let races = store.load(RACE_HISTORY_KEY)?.unwrap_or_default();
        Ok(Self {
            store,
            roster,
            sprints,
            races,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn roster(&self) -> &[Character] {
        &self.roster
    }

    pub fn find(&self, id: &str) -> Result<&Character> {
        self.roster
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::CharacterNotFound(id.to_string()))
    }

    /// Adds a new character or replaces the one with the same id.
    pub fn upsert(&mut self, character: Character) -> Result<()> {
        character.validate()?;
        match self.roster.iter().position(|c| c.id == character.id) {
            Some(i) => self.roster[i] = character,
            None => self.roster.push(character),
        }
        self.store.save(ROSTER_KEY, &self.roster)
    }

    /// Newest first.
    pub fn history(&self, kind: SessionKind) -> &[SessionResult] {
        match kind {
            SessionKind::Sprint => &self.sprints,
            SessionKind::BeatRace | SessionKind::StatRace => &self.races,
        }
    }

    /// Every recorded session, newest first.
    pub fn all_history(&self) -> Vec<&SessionResult> {
        let mut all: Vec<_> = self.sprints.iter().chain(&self.races).collect();
        all.sort_by(|a, b| b.date.cmp(&a.date));
        all
    }

    pub fn summary(&self, kind: SessionKind) -> HistorySummary {
        let scores: Vec<f64> = self
            .history(kind)
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.score as f64)
            .collect();
        HistorySummary {
            count: scores.len(),
            mean_score: mean(&scores),
            std_dev: std_dev(&scores),
            best: self
                .history(kind)
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| r.score)
                .max(),
        }
    }

    /// Writes the whole history as CSV, newest first.
    pub fn export_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for r in self.all_history() {
            wtr.serialize(HistoryRow {
                date: r.date.to_rfc3339(),
                kind: r.kind.to_string(),
                character: &r.character_id,
                score: r.score,
                good: r.percentages.good,
                over: r.percentages.over,
                under: r.percentages.under,
                placement: r.placement,
                xp: r.xp_gained,
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn contains(&self, id: &str) -> bool {
        self.sprints.iter().chain(&self.races).any(|r| r.id == id)
    }
}

impl<S: KeyValueStore> ResultSink for Stable<S> {
    fn apply_result(&mut self, result: &SessionResult) -> Result<()> {
        if self.contains(&result.id) {
            log::warn!("result {} already recorded, skipping", result.id);
            return Ok(());
        }
        let character = self
            .roster
            .iter_mut()
            .find(|c| c.id == result.character_id)
            .ok_or_else(|| Error::CharacterNotFound(result.character_id.clone()))?;

        character.base_stats.apply(&result.stat_changes);
        let mut progress = Progress {
            level: character.level,
            xp: character.xp,
            xp_to_next_level: character.xp_to_next_level,
        };
        let levels = progress.gain(result.xp_gained);
        character.level = progress.level;
        character.xp = progress.xp;
        character.xp_to_next_level = progress.xp_to_next_level;
        if levels > 0 {
            log::info!("{} reached level {}", character.name, character.level);
        }

        let history = match result.kind {
            SessionKind::Sprint => &mut self.sprints,
            SessionKind::BeatRace | SessionKind::StatRace => &mut self.races,
        };
        history.insert(0, result.clone());

        self.store.save(ROSTER_KEY, &self.roster)?;
        self.store.save(history_key(result.kind), &*history)?;
        Ok(())
    }
}
