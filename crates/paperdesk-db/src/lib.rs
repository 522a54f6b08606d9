// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use paperdesk_app::{PrefKey, PrefsStorage};
use rusqlite::{Connection, OptionalExtension, params};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const APP_NAME: &str = "paperdesk";

const SCHEMA_VERSION: i64 = 1;
const SETTINGS_TABLE: &str = "settings";
const SETTINGS_COLUMNS: [&str; 3] = ["key", "value", "updated_at"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPref {
    pub key: String,
    pub bytes: usize,
    pub updated_at: String,
}

/// Preference storage backed by a single sqlite `settings` table.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        validate_db_path(&path.to_string_lossy())?;
        let conn = Connection::open(path)
            .with_context(|| format!("open preference database {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory preference database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )
        .context("configure sqlite connection")?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates the schema in an empty database, otherwise checks that the
    /// existing file carries a usable `settings` table.
    pub fn bootstrap(&self) -> Result<()> {
        let tables: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .context("inspect database tables")?;

        if tables == 0 {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create preference schema")?;
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)
                .context("stamp schema version")?;
            tracing::info!(version = SCHEMA_VERSION, "preference schema created");
            return Ok(());
        }

        self.check_settings_table()
    }

    fn check_settings_table(&self) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .context("prepare settings column lookup")?;
        let present = stmt
            .query_map(params![SETTINGS_TABLE], |row| row.get::<_, String>(0))
            .context("read settings columns")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect settings columns")?;

        if present.is_empty() {
            bail!(
                "database is missing required table `{SETTINGS_TABLE}`; point storage.db_path at a paperdesk database"
            );
        }
        let missing: Vec<&str> = SETTINGS_COLUMNS
            .into_iter()
            .filter(|column| !present.iter().any(|name| name == column))
            .collect();
        if !missing.is_empty() {
            bail!(
                "table `{SETTINGS_TABLE}` is missing required columns: {}; move the file aside and relaunch to recreate it",
                missing.join(", ")
            );
        }
        Ok(())
    }

    pub fn get_pref_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("read preference {key}"))
    }

    pub fn put_pref_raw(&self, key: &str, value: &str) -> Result<()> {
        let stamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("format preference timestamp")?;
        self.conn
            .execute(
                "
                INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, stamp],
            )
            .with_context(|| format!("write preference {key}"))?;
        Ok(())
    }

    /// Every stored key with its size, for diagnostics.
    pub fn list_prefs(&self) -> Result<Vec<StoredPref>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, length(value), updated_at FROM settings ORDER BY key")
            .context("prepare preference listing")?;
        let prefs = stmt
            .query_map([], |row| {
                Ok(StoredPref {
                    key: row.get(0)?,
                    bytes: usize::try_from(row.get::<_, i64>(1)?).unwrap_or_default(),
                    updated_at: row.get(2)?,
                })
            })
            .context("list preferences")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect preferences")?;
        Ok(prefs)
    }
}

impl PrefsStorage for Store {
    fn get_pref(&self, key: PrefKey) -> Result<Option<String>> {
        self.get_pref_raw(key.as_str())
    }

    fn set_pref(&self, key: PrefKey, value: &str) -> Result<()> {
        self.put_pref_raw(key.as_str(), value)?;
        tracing::trace!(key = key.as_str(), bytes = value.len(), "preference written");
        Ok(())
    }
}

/// `PAPERDESK_DB_PATH`, else `<data_local_dir>/paperdesk/paperdesk.db`.
pub fn default_db_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os("PAPERDESK_DB_PATH") {
        return Ok(PathBuf::from(path));
    }

    let app_dir = dirs::data_local_dir()
        .ok_or_else(|| {
            anyhow!(
                "cannot resolve data directory; set PAPERDESK_DB_PATH to a writable database path"
            )
        })?
        .join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("paperdesk.db"))
}

/// Accepts plain filesystem paths and `:memory:`; rejects URI forms that
/// sqlite would otherwise interpret.
pub fn validate_db_path(path: &str) -> Result<()> {
    match path {
        "" => bail!("database path must not be empty"),
        ":memory:" => return Ok(()),
        _ => {}
    }

    if let Some((scheme, _)) = path.split_once("://")
        && !scheme.is_empty()
        && scheme.chars().all(char::is_alphabetic)
    {
        bail!("database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead");
    }
    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }
    if path.contains('?') {
        bail!("database path {path:?} contains '?'; drop the query string");
    }
    Ok(())
}
