//! Terminal presentation of the conversation.

use std::io::Write;

use ragchat_core::agents::BackendHealth;
use ragchat_core::api::v1::JournalStatus;
use ragchat_core::{ConversationSnapshot, Message, Mode, Role};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const BAR_WIDTH: usize = 20;

pub fn welcome(snapshot: &ConversationSnapshot) {
    println!("Welcome to RAG Chat");
    match snapshot.mode {
        Mode::Local => println!("Ask questions about the loaded notes using Local RAG search."),
        Mode::Cloud => println!("Chat with GPT-4 powered Cloud API for any question."),
    }
    mode_badge(snapshot.mode);
    println!("Type /help for commands.");
}

pub fn mode_badge(mode: Mode) {
    match mode {
        Mode::Local => println!("[Local RAG Mode]"),
        Mode::Cloud => println!("[Cloud API Mode]"),
    }
}

pub fn prompt(mode: Mode) {
    print!("{mode}> ");
    let _ = std::io::stdout().flush();
}

pub fn typing(mode: Mode) {
    println!("Assistant ({}) is typing...", mode.display_name());
}

pub fn notice(text: &str) {
    println!("! {text}");
}

pub fn help() {
    println!("/mode [local|cloud]   show or switch the provider");
    println!("/clear                empty the conversation");
    println!("/health               check the local backend");
    println!("/config               show backend settings");
    println!("/set <key> <value>    local_url, cloud_url or timeout");
    println!("/quit                 leave");
}

pub fn health(health: &BackendHealth) {
    println!(
        "status: {} | model loaded: {} | notes loaded: {} ({})",
        health.status, health.model_loaded, health.notes_loaded, health.notes_count
    );
}

pub fn journal(status: &JournalStatus) {
    println!("{}", format_journal(status));
}

fn format_journal(status: &JournalStatus) -> String {
    let last = status
        .last_event_ts
        .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
        .map(clock)
        .unwrap_or_else(|| "never".to_string());
    format!(
        "journal: {} events, last at {last}{}",
        status.events,
        if status.settings_seeded { "" } else { " (settings missing)" }
    )
}

pub fn format_message(message: &Message) -> String {
    let mut header = match message.role {
        Role::User => "You".to_string(),
        Role::Assistant => "Assistant".to_string(),
    };
    if let (Role::Assistant, Some(source)) = (message.role, message.source) {
        header.push_str(&format!(" via {}", source.display_name()));
    }
    header.push_str(&format!(" · {}", clock(message.timestamp)));

    let mut lines = vec![header];
    let local_reply = message.role == Role::Assistant && message.source == Some(Mode::Local);
    if let (true, Some(score)) = (local_reply, message.similarity_score) {
        lines.push(similarity_bar(score));
    }
    lines.push(message.content.clone());
    if let (true, Some(confidence)) = (local_reply, message.confidence) {
        lines.push(format!(
            "Confidence: {}",
            confidence.as_str().to_ascii_uppercase()
        ));
    }
    lines.join("\n")
}

fn similarity_bar(score: f64) -> String {
    let percent = (score.clamp(0.0, 1.0) * 100.0).round() as usize;
    let filled = percent * BAR_WIDTH / 100;
    format!(
        "[{}{}] {percent}% Match",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}

fn clock(timestamp: OffsetDateTime) -> String {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    timestamp
        .to_offset(offset)
        .format(format_description!("[hour]:[minute]"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_core::Confidence;

    fn assistant(source: Mode) -> Message {
        Message {
            id: 2,
            role: Role::Assistant,
            content: "The sky is blue.".into(),
            timestamp: OffsetDateTime::now_utc(),
            source: Some(source),
            confidence: Some(Confidence::Medium),
            similarity_score: Some(0.456),
        }
    }

    #[test]
    fn local_reply_shows_score_and_confidence() {
        let text = format_message(&assistant(Mode::Local));
        assert!(text.starts_with("Assistant via Local RAG"));
        assert!(text.contains("46% Match"));
        assert!(text.contains("The sky is blue."));
        assert!(text.ends_with("Confidence: MEDIUM"));
    }

    #[test]
    fn cloud_reply_hides_local_metadata() {
        let text = format_message(&assistant(Mode::Cloud));
        assert!(text.starts_with("Assistant via GPT-4"));
        assert!(!text.contains("Match"));
        assert!(!text.contains("Confidence"));
    }

    #[test]
    fn journal_line_reports_counts() {
        let empty = JournalStatus {
            settings_seeded: true,
            events: 0,
            last_event_ts: None,
        };
        assert_eq!(format_journal(&empty), "journal: 0 events, last at never");

        let unseeded = JournalStatus {
            settings_seeded: false,
            events: 3,
            last_event_ts: Some(0),
        };
        let text = format_journal(&unseeded);
        assert!(text.starts_with("journal: 3 events, last at "));
        assert!(text.ends_with("(settings missing)"));
    }

    #[test]
    fn similarity_bar_is_bounded() {
        assert_eq!(similarity_bar(1.0), format!("[{}] 100% Match", "#".repeat(20)));
        assert_eq!(similarity_bar(0.0), format!("[{}] 0% Match", "-".repeat(20)));
        assert!(similarity_bar(1.7).contains("100% Match"));
    }
}
