use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;

use crate::db::DbPool;
use crate::logging::log_event;
use crate::models::Mode;

const GATEWAY_KEY: &str = "chat.gateway";
const MODE_KEY: &str = "chat.mode";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Where the two backends live and how long a single request may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    pub local_base_url: String,
    pub cloud_base_url: String,
    pub timeout_secs: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            local_base_url: DEFAULT_BASE_URL.to_string(),
            cloud_base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GatewaySettings {
    pub fn local_ask_url(&self) -> String {
        format!("{}/ask", self.local_base_url.trim_end_matches('/'))
    }

    pub fn local_health_url(&self) -> String {
        format!("{}/health", self.local_base_url.trim_end_matches('/'))
    }

    pub fn cloud_chat_url(&self) -> String {
        format!("{}/chat", self.cloud_base_url.trim_end_matches('/'))
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewaySettingsUpdate {
    pub local_base_url: Option<String>,
    pub cloud_base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

pub fn seed_defaults(conn: &rusqlite::Connection) -> Result<()> {
    if read_setting(conn, GATEWAY_KEY)?.is_none() {
        write_gateway(conn, &GatewaySettings::default())?;
    }
    if read_setting(conn, MODE_KEY)?.is_none() {
        write_setting(conn, MODE_KEY, Mode::default().as_str())?;
    }
    Ok(())
}

pub fn get_settings(conn: &rusqlite::Connection) -> Result<GatewaySettings> {
    match read_setting(conn, GATEWAY_KEY)? {
        Some(raw) => serde_json::from_str(&raw).context("stored gateway settings are corrupt"),
        None => Ok(GatewaySettings::default()),
    }
}

pub fn update_settings(
    conn: &rusqlite::Connection,
    update: GatewaySettingsUpdate,
) -> Result<GatewaySettings> {
    let mut settings = get_settings(conn)?;

    if let Some(url) = update.local_base_url {
        settings.local_base_url = clean_url(&url)?;
    }
    if let Some(url) = update.cloud_base_url {
        settings.cloud_base_url = clean_url(&url)?;
    }
    if let Some(timeout) = update.timeout_secs {
        if timeout == 0 {
            return Err(anyhow!("Timeout must be at least one second"));
        }
        settings.timeout_secs = timeout;
    }

    write_gateway(conn, &settings)?;
    Ok(settings)
}

pub fn audit_settings_change(conn: &rusqlite::Connection, settings: &GatewaySettings) {
    audit(
        conn,
        "CFG-0001",
        "chat.settings",
        "Gateway settings updated",
        Some("Backend endpoints or timeout changed"),
        serde_json::to_value(settings).ok(),
    );
}

/// Journal a configuration change. Journal failures never fail the change.
fn audit(
    conn: &rusqlite::Connection,
    code: &str,
    module: &str,
    message: &str,
    explain: Option<&str>,
    data: Option<serde_json::Value>,
) {
    if let Err(err) = log_event(conn, "info", Some(code), module, message, explain, data) {
        log::warn!("failed to journal {code}: {err}");
    }
}

fn clean_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(anyhow!("Backend URL must start with http:// or https://: {url}"));
    }
    Ok(trimmed.to_string())
}

fn write_gateway(conn: &rusqlite::Connection, settings: &GatewaySettings) -> Result<()> {
    let payload = serde_json::to_string(settings)?;
    write_setting(conn, GATEWAY_KEY, &payload)
}

fn read_setting(conn: &rusqlite::Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM app_settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

fn write_setting(conn: &rusqlite::Connection, key: &str, value: &str) -> Result<()> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    conn.execute(
        "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, now],
    )?;
    Ok(())
}

/// Persistence for the mode toggle, injected into the conversation store.
pub trait ModePreferences: Send + Sync {
    /// Stored mode, or `None` when nothing usable is stored.
    fn load(&self) -> Result<Option<Mode>>;
    fn save(&self, mode: Mode) -> Result<()>;
}

/// Keeps the mode in `app_settings` under `chat.mode`.
#[derive(Clone)]
pub struct SqliteModePreferences {
    pool: DbPool,
}

impl SqliteModePreferences {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ModePreferences for SqliteModePreferences {
    fn load(&self) -> Result<Option<Mode>> {
        let conn = self.pool.get()?;
        Ok(read_setting(&conn, MODE_KEY)?.and_then(|raw| raw.parse().ok()))
    }

    fn save(&self, mode: Mode) -> Result<()> {
        let conn = self.pool.get()?;
        write_setting(&conn, MODE_KEY, mode.as_str())?;
        audit(
            &conn,
            "CHAT-0100",
            "chat.mode",
            "Mode changed",
            None,
            Some(json!({ "mode": mode })),
        );
        Ok(())
    }
}

/// Session-only preference, used when nothing should touch disk.
#[derive(Default)]
pub struct MemoryModePreferences {
    mode: Mutex<Option<Mode>>,
}

impl MemoryModePreferences {
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode: Mutex::new(Some(mode)),
        }
    }
}

impl ModePreferences for MemoryModePreferences {
    fn load(&self) -> Result<Option<Mode>> {
        let guard = self.mode.lock().map_err(|_| anyhow!("mode lock poisoned"))?;
        Ok(*guard)
    }

    fn save(&self, mode: Mode) -> Result<()> {
        let mut guard = self.mode.lock().map_err(|_| anyhow!("mode lock poisoned"))?;
        *guard = Some(mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE app_settings (key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at INTEGER NOT NULL);
             CREATE TABLE event_log (id TEXT PRIMARY KEY, ts INTEGER, level TEXT, code TEXT, module TEXT, message TEXT, explain TEXT, data TEXT);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn seeding_writes_defaults_once() {
        let conn = conn();
        seed_defaults(&conn).unwrap();
        assert_eq!(get_settings(&conn).unwrap(), GatewaySettings::default());

        update_settings(
            &conn,
            GatewaySettingsUpdate {
                timeout_secs: Some(5),
                ..Default::default()
            },
        )
        .unwrap();
        seed_defaults(&conn).unwrap();
        assert_eq!(get_settings(&conn).unwrap().timeout_secs, 5);
    }

    #[test]
    fn update_trims_trailing_slashes() {
        let conn = conn();
        let settings = update_settings(
            &conn,
            GatewaySettingsUpdate {
                cloud_base_url: Some(" https://proxy.example.com/ ".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(settings.cloud_base_url, "https://proxy.example.com");
        assert_eq!(settings.cloud_chat_url(), "https://proxy.example.com/chat");
        assert_eq!(settings.local_base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn update_rejects_bad_values() {
        let conn = conn();
        assert!(update_settings(
            &conn,
            GatewaySettingsUpdate {
                timeout_secs: Some(0),
                ..Default::default()
            },
        )
        .is_err());
        assert!(update_settings(
            &conn,
            GatewaySettingsUpdate {
                local_base_url: Some("localhost:8000".into()),
                ..Default::default()
            },
        )
        .is_err());
    }

    #[test]
    fn settings_audit_is_journaled() {
        let conn = conn();
        audit_settings_change(&conn, &GatewaySettings::default());
        let events = crate::logging::recent_events(&conn, Some("chat.settings"), 5).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].code.as_deref(), Some("CFG-0001"));
        assert_eq!(events[0].data.as_ref().unwrap()["timeout_secs"], DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn audit_survives_missing_journal_table() {
        let conn = Connection::open_in_memory().unwrap();
        audit(&conn, "CHAT-0100", "chat.mode", "Mode changed", None, None);
    }

    #[test]
    fn memory_preferences_round_trip() {
        let prefs = MemoryModePreferences::default();
        assert_eq!(prefs.load().unwrap(), None);
        prefs.save(Mode::Cloud).unwrap();
        assert_eq!(prefs.load().unwrap(), Some(Mode::Cloud));
    }
}
