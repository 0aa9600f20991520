// Provider-facing message assembly
//
// Providers never fetch our signed URLs, so attachment bytes are embedded in
// the prompt. Types a model cannot read are replaced by a short note.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parley_llm::{Capabilities, Content, ContentPart, Message};
use parley_persist::{AgentMessage, MessageRole, MessageStatus, StoredFile};

/// Tag stored in front of prompts sent with web search enabled
pub const WEB_SEARCH_TAG: &str = "[Web search] ";

/// Render one attachment for a model with the given capabilities
pub fn attachment_part(file: &StoredFile, bytes: &[u8], caps: &Capabilities) -> ContentPart {
    let media_type = file.content_type.as_str();
    let essence = media_type.split(';').next().unwrap_or(media_type).trim();

    if essence.starts_with("image/") {
        if caps.vision {
            return ContentPart::Image {
                media_type: essence.to_string(),
                data: STANDARD.encode(bytes),
            };
        }
        return unreadable_note(file, "image");
    }

    match essence {
        "application/pdf" if caps.pdf => ContentPart::Document {
            media_type: essence.to_string(),
            filename: None,
            data: STANDARD.encode(bytes),
        },
        "application/pdf" => unreadable_note(file, "PDF"),
        "text/plain" | "text/csv" => ContentPart::text(format!(
            "[Attached file ({essence})]\n{}",
            String::from_utf8_lossy(bytes)
        )),
        _ if essence.starts_with("audio/") => unreadable_note(file, "audio"),
        _ if essence.starts_with("video/") => unreadable_note(file, "video"),
        _ => unreadable_note(file, "file"),
    }
}

fn unreadable_note(file: &StoredFile, kind: &str) -> ContentPart {
    ContentPart::text(format!(
        "[Attached {kind} ({}, {} bytes) cannot be read by this model]",
        file.content_type, file.size
    ))
}

/// Prompt content with its attachments appended after the text
pub fn prompt_content(text: &str, attachments: Vec<ContentPart>) -> Content {
    if attachments.is_empty() {
        return Content::text(text);
    }
    let mut parts = Vec::with_capacity(attachments.len() + 1);
    parts.push(ContentPart::text(text));
    parts.extend(attachments);
    Content::Parts(parts)
}

/// Text as sent upstream, without the stored mode tag
pub fn upstream_text(stored: &str) -> &str {
    stored.strip_prefix(WEB_SEARCH_TAG).unwrap_or(stored)
}

/// Convert stored history (oldest first) into provider messages
///
/// Failed assistant messages are UI notices, not model output, and are left
/// out. `prompt_id` marks the message that receives `attachments`.
pub fn history_messages(
    system_prompt: Option<&str>,
    history: &[AgentMessage],
    prompt_id: &str,
    attachments: Vec<ContentPart>,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(system) = system_prompt {
        messages.push(Message::system(system));
    }

    let mut attachments = Some(attachments);
    for msg in history {
        match (msg.role, msg.status) {
            (MessageRole::Assistant, MessageStatus::Failed) => continue,
            (MessageRole::Assistant, MessageStatus::Success) => {
                messages.push(Message::ai(msg.text.as_str()));
            }
            (MessageRole::User, _) => {
                let text = upstream_text(&msg.text);
                if msg.id == prompt_id {
                    let parts = attachments.take().unwrap_or_default();
                    messages.push(Message::human(prompt_content(text, parts)));
                } else {
                    messages.push(Message::human(text));
                }
            }
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn file(content_type: &str) -> StoredFile {
        StoredFile {
            storage_id: "s1".into(),
            user_id: "u1".into(),
            content_type: content_type.into(),
            size: 3,
            sha256: String::new(),
            created_at: Utc::now(),
        }
    }

    fn message(id: &str, role: MessageRole, status: MessageStatus, text: &str) -> AgentMessage {
        AgentMessage {
            id: id.into(),
            agent_thread_id: "a1".into(),
            user_id: "u1".into(),
            order: 0,
            role,
            text: text.into(),
            model: None,
            status,
            usage: None,
            created_at: Utc::now(),
        }
    }

    const ALL_CAPS: Capabilities = Capabilities {
        vision: true,
        pdf: true,
        web_search: true,
        reasoning: false,
    };

    #[test]
    fn test_image_becomes_base64_part() {
        let part = attachment_part(&file("image/png"), b"abc", &ALL_CAPS);
        assert_eq!(
            part,
            ContentPart::Image {
                media_type: "image/png".into(),
                data: "YWJj".into()
            }
        );
    }

    #[test]
    fn test_image_without_vision_is_a_note() {
        let part = attachment_part(&file("image/png"), b"abc", &Capabilities::default());
        let ContentPart::Text { text } = part else {
            panic!("expected text note");
        };
        assert!(text.contains("cannot be read"));
    }

    #[test]
    fn test_csv_is_inlined() {
        let part = attachment_part(&file("text/csv"), b"a,b\n1,2", &ALL_CAPS);
        assert_eq!(part, ContentPart::text("[Attached file (text/csv)]\na,b\n1,2"));
    }

    #[test]
    fn test_pdf_and_audio() {
        assert!(matches!(
            attachment_part(&file("application/pdf"), b"%PDF", &ALL_CAPS),
            ContentPart::Document { .. }
        ));
        assert!(matches!(
            attachment_part(&file("audio/mpeg"), b"ID3", &ALL_CAPS),
            ContentPart::Text { .. }
        ));
    }

    #[test]
    fn test_history_skips_failed_and_strips_tag() {
        let history = vec![
            message("m1", MessageRole::User, MessageStatus::Success, "[Web search] news?"),
            message("m2", MessageRole::Assistant, MessageStatus::Failed, "Generation failed"),
            message("m3", MessageRole::User, MessageStatus::Success, "again"),
        ];
        let messages = history_messages(Some("be brief"), &history, "m3", vec![]);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::system("be brief"));
        assert_eq!(messages[1], Message::human("news?"));
        assert_eq!(messages[2], Message::human("again"));
    }

    #[test]
    fn test_attachments_go_on_prompt_only() {
        let history = vec![
            message("m1", MessageRole::User, MessageStatus::Success, "first"),
            message("m2", MessageRole::User, MessageStatus::Success, "Check this"),
        ];
        let parts = vec![ContentPart::text("file body")];
        let messages = history_messages(None, &history, "m2", parts);

        assert_eq!(messages[0], Message::human("first"));
        assert_eq!(
            messages[1],
            Message::human(Content::Parts(vec![
                ContentPart::text("Check this"),
                ContentPart::text("file body"),
            ]))
        );
    }
}
