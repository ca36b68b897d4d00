//! Durable event journal kept in the `event_log` table. Every entry is also
//! echoed through the `log` facade so it shows up in the console.

use r2d2_sqlite::rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub id: String,
    pub ts: i64,
    pub level: String,
    pub code: Option<String>,
    pub module: String,
    pub message: String,
    pub explain: Option<String>,
    pub data: Option<Value>,
}

pub fn log_event(
    conn: &Connection,
    level: &str,
    code: Option<&str>,
    module: &str,
    message: &str,
    explain: Option<&str>,
    data: Option<Value>,
) -> rusqlite::Result<()> {
    let console_level = match level {
        "error" => log::Level::Error,
        "warn" => log::Level::Warn,
        "debug" => log::Level::Debug,
        _ => log::Level::Info,
    };
    log::log!(target: module, console_level, "[{}] {message}", code.unwrap_or("-"));

    let id = Uuid::new_v4().to_string();
    let ts = OffsetDateTime::now_utc().unix_timestamp();
    let data_str = data.map(|v| v.to_string());
    conn.execute(
        "INSERT INTO event_log (id, ts, level, code, module, message, explain, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![id, ts, level, code, module, message, explain, data_str],
    )?;
    Ok(())
}

/// Most recent events first, optionally restricted to one module.
pub fn recent_events(
    conn: &Connection,
    module: Option<&str>,
    limit: usize,
) -> rusqlite::Result<Vec<EventRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, ts, level, code, module, message, explain, data FROM event_log
         WHERE (?1 IS NULL OR module = ?1)
         ORDER BY ts DESC, rowid DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![module, limit as i64], |row| {
        let data: Option<String> = row.get(7)?;
        Ok(EventRecord {
            id: row.get(0)?,
            ts: row.get(1)?,
            level: row.get(2)?,
            code: row.get(3)?,
            module: row.get(4)?,
            message: row.get(5)?,
            explain: row.get(6)?,
            data: data.and_then(|raw| serde_json::from_str(&raw).ok()),
        })
    })?;
    rows.collect()
}
