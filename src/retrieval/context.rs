//! Context assembly: render grouped search hits into the text blob
//! handed to the generative model (§4.6.4).

use crate::types::{ChatSearchResult, MeetingSearchResult};

const MEETING_BANNER: &str = "=== ТРАНСКРИПТЫ ВСТРЕЧ ===";
const CHAT_BANNER: &str = "=== ПЕРЕПИСКА В TELEGRAM ===";
const BANNER_RULE: &str = "==================================================";
const SECTION_JOIN: &str = "\n\n---\n\n";

/// Render meeting hits grouped by meeting id, preserving first-seen
/// (globally-ranked) order. Returns `None` when `results` is empty so
/// the caller can omit the whole section.
fn format_meeting_section(results: &[MeetingSearchResult]) -> Option<String> {
    if results.is_empty() {
        return None;
    }

    let mut groups: Vec<(crate::types::MeetingId, String, Option<chrono::DateTime<chrono::Utc>>, Vec<&str>)> =
        Vec::new();
    for r in results {
        match groups.iter_mut().find(|(id, ..)| *id == r.meeting_id) {
            Some((_, _, _, chunks)) => chunks.push(&r.chunk_text),
            None => groups.push((r.meeting_id, r.meeting_title.clone(), r.meeting_date, vec![&r.chunk_text])),
        }
    }

    let rendered: Vec<String> = groups
        .iter()
        .enumerate()
        .map(|(i, (_, title, date, chunks))| {
            let header = match date {
                Some(d) => format!("[Встреча {}: {} ({})]", i + 1, title, d.format("%Y-%m-%d")),
                None => format!("[Встреча {}: {}]", i + 1, title),
            };
            format!("{header}\n{}", chunks.join("\n\n"))
        })
        .collect();

    Some(format!("{MEETING_BANNER}\n{BANNER_RULE}\n{}", rendered.join(SECTION_JOIN)))
}

/// Render chat hits grouped by chat title, preserving first-seen order.
fn format_chat_section(results: &[ChatSearchResult]) -> Option<String> {
    if results.is_empty() {
        return None;
    }

    let mut groups: Vec<(crate::types::ChatId, String, Option<String>, Vec<&ChatSearchResult>)> = Vec::new();
    for r in results {
        match groups.iter_mut().find(|(id, ..)| *id == r.chat_id) {
            Some((_, _, _, msgs)) => msgs.push(r),
            None => groups.push((r.chat_id, r.chat_title.clone(), r.client_name.clone(), vec![r])),
        }
    }

    let rendered: Vec<String> = groups
        .iter()
        .enumerate()
        .map(|(i, (_, title, client_name, msgs))| {
            let client = client_name.as_deref().unwrap_or("Неизвестный");
            let header = format!("[Telegram чат {}: {} (клиент: {})]", i + 1, title, client);
            let lines: Vec<String> = msgs
                .iter()
                .map(|m| {
                    let date = m
                        .message_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "Неизвестный".to_string());
                    let sender = m.sender_name.as_deref().unwrap_or("Неизвестный");
                    format!("[{date}, {sender}]: {}", m.chunk_text)
                })
                .collect();
            format!("{header}\n{}", lines.join("\n"))
        })
        .collect();

    Some(format!("{CHAT_BANNER}\n{BANNER_RULE}\n{}", rendered.join(SECTION_JOIN)))
}

/// Combine meeting and chat sections per §4.6.4: meeting section
/// first, chat section second, either omitted entirely if its hit list
/// is empty, both joined by a blank line + `---` + blank line when
/// both are present.
pub fn assemble_context(meeting_results: &[MeetingSearchResult], chat_results: &[ChatSearchResult]) -> Option<String> {
    let meeting_section = format_meeting_section(meeting_results);
    let chat_section = format_chat_section(chat_results);

    match (meeting_section, chat_section) {
        (Some(m), Some(c)) => Some(format!("{m}{SECTION_JOIN}{c}")),
        (Some(m), None) => Some(m),
        (None, Some(c)) => Some(c),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn meeting_hit(meeting_id: crate::types::MeetingId, title: &str, text: &str) -> MeetingSearchResult {
        MeetingSearchResult {
            chunk_text: text.to_string(),
            meeting_id,
            meeting_title: title.to_string(),
            meeting_date: Some(Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap()),
            similarity: 0.9,
        }
    }

    #[test]
    fn empty_both_yields_none() {
        assert!(assemble_context(&[], &[]).is_none());
    }

    #[test]
    fn meeting_only_has_no_chat_banner() {
        let id = Uuid::new_v4();
        let hits = vec![meeting_hit(id, "Acme - Working session", "обсудили roadmap")];
        let ctx = assemble_context(&hits, &[]).unwrap();
        assert!(ctx.contains("ТРАНСКРИПТЫ ВСТРЕЧ"));
        assert!(!ctx.contains("ПЕРЕПИСКА"));
        assert!(ctx.contains("[Встреча 1: Acme - Working session (2026-01-15)]"));
    }

    #[test]
    fn groups_preserve_chunk_order_within_meeting() {
        let id = Uuid::new_v4();
        let hits = vec![meeting_hit(id, "Acme", "chunk one"), meeting_hit(id, "Acme", "chunk two")];
        let ctx = assemble_context(&hits, &[]).unwrap();
        assert_eq!(ctx.matches("[Встреча").count(), 1);
        assert!(ctx.contains("chunk one\n\nchunk two"));
    }

    #[test]
    fn missing_client_name_renders_unknown() {
        let hit = ChatSearchResult {
            chunk_text: "привет".to_string(),
            message_id: Uuid::new_v4(),
            chat_id: 1,
            chat_title: "General".to_string(),
            client_name: None,
            message_date: None,
            sender_name: None,
            similarity: 0.5,
        };
        let ctx = assemble_context(&[], &[hit]).unwrap();
        assert!(ctx.contains("(клиент: Неизвестный)"));
        assert!(ctx.contains("[Неизвестный, Неизвестный]: привет"));
    }

    #[test]
    fn both_sections_joined_with_rule() {
        let meeting_id = Uuid::new_v4();
        let m = vec![meeting_hit(meeting_id, "Acme", "встреча текст")];
        let c = vec![ChatSearchResult {
            chunk_text: "чат текст".to_string(),
            message_id: Uuid::new_v4(),
            chat_id: 2,
            chat_title: "Acme chat".to_string(),
            client_name: Some("Acme".to_string()),
            message_date: None,
            sender_name: Some("Ivan".to_string()),
            similarity: 0.5,
        }];
        let ctx = assemble_context(&m, &c).unwrap();
        let meeting_pos = ctx.find("ТРАНСКРИПТЫ").unwrap();
        let chat_pos = ctx.find("ПЕРЕПИСКА").unwrap();
        assert!(meeting_pos < chat_pos);
        assert!(ctx.contains("\n\n---\n\n"));
    }
}
