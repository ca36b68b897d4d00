use std::path::PathBuf;
use std::sync::Arc;

use directories::ProjectDirs;
use log::error;
use ragchat_core::agents::config::{self as chat_config, GatewaySettingsUpdate, SqliteModePreferences};
use ragchat_core::agents::HttpGateway;
use ragchat_core::api::v1::{self, ApiState, ChatSendInput, ChatSetModeInput};
use ragchat_core::db::init_db;
use ragchat_core::{ConversationStore, Mode};
use tokio::io::{AsyncBufReadExt, BufReader};

mod render;

fn workspace_dir() -> PathBuf {
    if let Some(proj) = ProjectDirs::from("com", "RagChat", "RagChat") {
        proj.data_dir().to_path_buf()
    } else {
        std::env::temp_dir().join("RagChat")
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Send(String),
    Mode(Option<Mode>),
    Clear,
    Health,
    Config,
    Set(String, String),
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Send(line.to_string()));
        };
        let mut parts = rest.split_whitespace();
        let cmd = match parts.next().unwrap_or_default() {
            "mode" => match parts.next() {
                None => Self::Mode(None),
                Some(raw) => match raw.parse() {
                    Ok(mode) => Self::Mode(Some(mode)),
                    Err(err) => Self::Invalid(err),
                },
            },
            "clear" => Self::Clear,
            "health" => Self::Health,
            "config" => Self::Config,
            "set" => match (parts.next(), parts.next()) {
                (Some(key), Some(value)) => Self::Set(key.to_string(), value.to_string()),
                _ => Self::Invalid("usage: /set <local_url|cloud_url|timeout> <value>".into()),
            },
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Invalid(format!("unknown command: /{other}")),
        };
        Some(cmd)
    }
}

fn settings_update(key: &str, value: &str) -> Result<GatewaySettingsUpdate, String> {
    let mut update = GatewaySettingsUpdate::default();
    match key {
        "local_url" => update.local_base_url = Some(value.to_string()),
        "cloud_url" => update.cloud_base_url = Some(value.to_string()),
        "timeout" => {
            let secs = value
                .parse()
                .map_err(|_| format!("timeout must be a whole number of seconds: {value}"))?;
            update.timeout_secs = Some(secs);
        }
        other => return Err(format!("unknown setting: {other}")),
    }
    Ok(update)
}

async fn run_command(state: &ApiState, command: Command) -> bool {
    match command {
        Command::Send(content) => {
            render::typing(state.store.mode());
            match v1::chat_send(state, ChatSendInput { content }).await {
                Ok(output) => {
                    if output.exchange.discarded {
                        render::notice("reply arrived after the chat was cleared");
                    } else {
                        println!("{}", render::format_message(&output.exchange.reply));
                    }
                }
                Err(err) => render::notice(&err),
            }
        }
        Command::Mode(None) => render::mode_badge(state.store.mode()),
        Command::Mode(Some(mode)) => {
            let input = ChatSetModeInput {
                mode: mode.to_string(),
            };
            match v1::chat_set_mode(state, input) {
                Ok(snapshot) => render::mode_badge(snapshot.mode),
                Err(err) => render::notice(&err),
            }
        }
        Command::Clear => match v1::chat_clear(state).await {
            Ok(snapshot) => render::welcome(&snapshot),
            Err(err) => render::notice(&err),
        },
        Command::Health => {
            match v1::chat_health(state).await {
                Ok(health) => render::health(&health),
                Err(err) => render::notice(&format!("Connection Error: {err}")),
            }
            match v1::journal_status(state).await {
                Ok(status) => render::journal(&status),
                Err(err) => render::notice(&format!("journal unavailable: {err}")),
            }
        }
        Command::Config => match v1::settings_get(state).await {
            Ok(settings) => match serde_json::to_string_pretty(&settings) {
                Ok(text) => println!("{text}"),
                Err(err) => render::notice(&err.to_string()),
            },
            Err(err) => render::notice(&err),
        },
        Command::Set(key, value) => {
            let result = match settings_update(&key, &value) {
                Ok(update) => v1::settings_update(state, update).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(_) => render::notice(&format!("{key} updated")),
                Err(err) => render::notice(&err),
            }
        }
        Command::Help => render::help(),
        Command::Invalid(err) => render::notice(&err),
        Command::Quit => return false,
    }
    true
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let db = init_db(workspace_dir()).expect("failed to init db");
    let settings = {
        let conn = db.get().expect("failed to open db connection");
        chat_config::get_settings(&conn).expect("failed to read gateway settings")
    };
    let gateway = HttpGateway::new(settings).expect("failed to initialise HTTP gateway");
    let preferences = SqliteModePreferences::new(db.clone());
    let store = ConversationStore::new(Arc::new(gateway), Arc::new(preferences));
    let state = ApiState {
        db,
        store: Arc::new(store),
    };

    render::welcome(&v1::chat_state(&state));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        render::prompt(state.store.mode());
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                error!("failed to read input: {err}");
                break;
            }
        };
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        if !run_command(&state, command).await {
            break;
        }
    }
}
