use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::PathBuf;

use crate::agents::config as chat_config;

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn init_db(workspace_dir: PathBuf) -> Result<DbPool> {
    std::fs::create_dir_all(&workspace_dir)?;
    let db_path = workspace_dir.join("ragchat.db");
    let mgr = SqliteConnectionManager::file(&db_path);
    let pool = Pool::new(mgr)?;
    {
        let conn = pool.get()?;
        apply_migrations(&conn)?;
        chat_config::seed_defaults(&conn)?;
    }
    Ok(pool)
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    let migrations: &[(&str, &str)] = &[(
        "0001_init.sql",
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../migrations/0001_init.sql"
        )),
    )];

    for (name, sql) in migrations {
        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration {name}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::config::{self, ModePreferences, SqliteModePreferences};
    use crate::logging::recent_events;
    use crate::models::Mode;

    #[test]
    fn init_db_is_idempotent_and_seeds_settings() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_db(dir.path().to_path_buf()).unwrap();
        drop(pool);
        let pool = init_db(dir.path().to_path_buf()).unwrap();
        let conn = pool.get().unwrap();
        assert_eq!(
            config::get_settings(&conn).unwrap(),
            config::GatewaySettings::default()
        );
    }

    #[test]
    fn sqlite_mode_preferences_persist_and_journal() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_db(dir.path().to_path_buf()).unwrap();
        let prefs = SqliteModePreferences::new(pool.clone());
        assert_eq!(prefs.load().unwrap(), Some(Mode::Local));

        prefs.save(Mode::Cloud).unwrap();
        let reopened = SqliteModePreferences::new(init_db(dir.path().to_path_buf()).unwrap());
        assert_eq!(reopened.load().unwrap(), Some(Mode::Cloud));

        let conn = pool.get().unwrap();
        let events = recent_events(&conn, Some("chat.mode"), 5).unwrap();
        assert_eq!(events[0].code.as_deref(), Some("CHAT-0100"));
    }
}
