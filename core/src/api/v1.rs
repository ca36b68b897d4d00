//! Version 1 of the collaborator API.
//!
//! Commands are thin wrappers that validate input, delegate to the
//! conversation store, journal the outcome and return JSON-friendly payloads
//! to whichever front end drives the session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::spawn_blocking;

use crate::agents::config::{self, GatewaySettings, GatewaySettingsUpdate};
use crate::agents::gateway::{BackendHealth, HttpGateway};
use crate::conversation::{ConversationStore, Exchange};
use crate::db::DbPool;
use crate::logging::{log_event, recent_events, EventRecord};
use crate::models::{ConversationSnapshot, Mode};

/// Shared state handed to each command.
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub store: Arc<ConversationStore>,
}

/// State of the local journal database, reported next to backend health.
#[derive(Debug, Clone, Serialize)]
pub struct JournalStatus {
    pub settings_seeded: bool,
    pub events: i64,
    pub last_event_ts: Option<i64>,
}

/// Confirm the journal database is reachable and summarise what it holds.
pub async fn journal_status(state: &ApiState) -> Result<JournalStatus, String> {
    let pool = state.db.clone();
    spawn_blocking(move || {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let settings_seeded = conn
            .query_row(
                "SELECT COUNT(1) FROM app_settings WHERE key IN ('chat.gateway', 'chat.mode')",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|e| e.to_string())?
            == 2;
        let (events, last_event_ts) = conn
            .query_row("SELECT COUNT(1), MAX(ts) FROM event_log", [], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Option<i64>>(1)?))
            })
            .map_err(|e| e.to_string())?;
        Ok(JournalStatus {
            settings_seeded,
            events,
            last_event_ts,
        })
    })
    .await
    .map_err(|e| e.to_string())?
}

/// Read-only view of messages, mode and loading flag.
pub fn chat_state(state: &ApiState) -> ConversationSnapshot {
    state.store.snapshot()
}

#[derive(Deserialize)]
pub struct ChatSendInput {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatSendOutput {
    #[serde(flatten)]
    pub exchange: Exchange,
    pub state: ConversationSnapshot,
}

/// Send one message through the active provider and journal the exchange.
pub async fn chat_send(state: &ApiState, input: ChatSendInput) -> Result<ChatSendOutput, String> {
    let exchange = state
        .store
        .send(&input.content)
        .await
        .map_err(|e| format!("{} ({})", e, e.code()))?;

    journal_exchange(&state.db, &exchange).await;

    Ok(ChatSendOutput {
        exchange,
        state: state.store.snapshot(),
    })
}

#[derive(Deserialize)]
pub struct ChatSetModeInput {
    pub mode: String,
}

/// Switch the provider used for the next message.
pub fn chat_set_mode(
    state: &ApiState,
    input: ChatSetModeInput,
) -> Result<ConversationSnapshot, String> {
    let mode: Mode = input.mode.parse()?;
    state.store.set_mode(mode);
    Ok(state.store.snapshot())
}

/// Empty the conversation log.
pub async fn chat_clear(state: &ApiState) -> Result<ConversationSnapshot, String> {
    let removed = state.store.clear();
    let pool = state.db.clone();
    spawn_blocking(move || {
        let conn = pool.get().map_err(|e| e.to_string())?;
        log_event(
            &conn,
            "info",
            Some("CHAT-0101"),
            "chat.exchange",
            "Conversation cleared",
            None,
            Some(json!({ "removed": removed })),
        )
        .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())??;
    Ok(state.store.snapshot())
}

/// Query the local backend's health endpoint.
pub async fn chat_health(state: &ApiState) -> Result<BackendHealth, String> {
    state
        .store
        .gateway()
        .health()
        .await
        .map_err(|e| format!("{} ({})", e, e.code()))
}

pub async fn settings_get(state: &ApiState) -> Result<GatewaySettings, String> {
    let pool = state.db.clone();
    spawn_blocking(move || {
        let conn = pool.get().map_err(|e| e.to_string())?;
        config::get_settings(&conn).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())?
}

/// Persist new backend settings and point later sends at them.
pub async fn settings_update(
    state: &ApiState,
    input: GatewaySettingsUpdate,
) -> Result<GatewaySettings, String> {
    let pool = state.db.clone();
    let settings = spawn_blocking(move || {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let settings = config::update_settings(&conn, input).map_err(|e| format!("{e:#}"))?;
        config::audit_settings_change(&conn, &settings);
        Ok::<_, String>(settings)
    })
    .await
    .map_err(|e| e.to_string())??;

    let gateway = HttpGateway::new(settings.clone()).map_err(|e| format!("{e:#}"))?;
    state.store.replace_gateway(Arc::new(gateway));
    Ok(settings)
}

#[derive(Deserialize, Default)]
pub struct ChatEventsInput {
    pub limit: Option<usize>,
}

/// Recent exchange journal entries, newest first.
pub async fn chat_list_events(
    state: &ApiState,
    input: ChatEventsInput,
) -> Result<Vec<EventRecord>, String> {
    let pool = state.db.clone();
    let limit = input.limit.unwrap_or(20);
    spawn_blocking(move || {
        let conn = pool.get().map_err(|e| e.to_string())?;
        recent_events(&conn, Some("chat.exchange"), limit).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())?
}

async fn journal_exchange(pool: &DbPool, exchange: &Exchange) {
    let pool = pool.clone();
    let source = exchange.reply.source;
    let preview = exchange.reply.content.chars().take(200).collect::<String>();
    let failure = exchange.failure.clone();
    let discarded = exchange.discarded;
    let outcome = spawn_blocking(move || {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let logged = match failure {
            None => log_event(
                &conn,
                "info",
                Some("CHAT-0200"),
                "chat.exchange",
                "Exchange completed",
                None,
                Some(json!({
                    "mode": source,
                    "preview": preview,
                    "discarded": discarded,
                })),
            ),
            Some(err) => log_event(
                &conn,
                "warn",
                Some("CHAT-0201"),
                "chat.exchange",
                "Backend unreachable",
                Some(err.explain()),
                Some(json!({
                    "mode": source,
                    "code": err.code(),
                    "status": err.status_code(),
                    "error": err.to_string(),
                })),
            ),
        };
        logged.map_err(|e| e.to_string())
    })
    .await;
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log::warn!("failed to journal exchange: {err}"),
        Err(err) => log::warn!("journal task failed: {err}"),
    }
}
