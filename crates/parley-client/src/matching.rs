use parley_agent::AttachmentRecordView;
use parley_persist::MessageRole;

/// Largest timestamp gap accepted by the nearest-time fallback
pub const MATCH_WINDOW_MS: i64 = 5000;

/// The parts of a rendered message that matching looks at
#[derive(Debug, Clone, Copy)]
pub struct RenderedMessage<'a> {
    pub id: &'a str,
    pub role: MessageRole,
    pub content: &'a str,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

/// Storage ids to preview under a message
///
/// Records linked to a message id only ever match that message. Unlinked
/// records fall back to body equality, then containment, then the nearest
/// timestamp within [`MATCH_WINDOW_MS`]. The result depends only on the
/// inputs, so calling it again gives the same answer.
pub fn attachments_for_message(
    message: &RenderedMessage<'_>,
    records: &[AttachmentRecordView],
) -> Vec<String> {
    if message.role != MessageRole::User {
        return Vec::new();
    }

    if let Some(linked) = records
        .iter()
        .find(|r| r.message_id.as_deref() == Some(message.id))
    {
        return linked.attachments.clone();
    }

    let unlinked: Vec<&AttachmentRecordView> =
        records.iter().filter(|r| r.message_id.is_none()).collect();

    if let Some(exact) = unlinked.iter().find(|r| r.body == message.content) {
        return exact.attachments.clone();
    }

    if let Some(contained) = unlinked
        .iter()
        .find(|r| !r.body.is_empty() && message.content.contains(r.body.as_str()))
    {
        return contained.attachments.clone();
    }

    let mut by_distance = unlinked;
    // sort_by_key is stable: equal gaps keep input order
    by_distance.sort_by_key(|r| (r.created_at - message.created_at).abs());
    match by_distance.first() {
        Some(nearest) if (nearest.created_at - message.created_at).abs() < MATCH_WINDOW_MS => {
            nearest.attachments.clone()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, body: &str, files: &[&str], message_id: Option<&str>, at: i64) -> AttachmentRecordView {
        AttachmentRecordView {
            id: id.into(),
            thread_id: "t1".into(),
            body: body.into(),
            attachments: files.iter().map(|s| s.to_string()).collect(),
            message_id: message_id.map(String::from),
            created_at: at,
        }
    }

    fn user_message<'a>(id: &'a str, content: &'a str, at: i64) -> RenderedMessage<'a> {
        RenderedMessage {
            id,
            role: MessageRole::User,
            content,
            created_at: at,
        }
    }

    #[test]
    fn test_linked_record_wins() {
        let records = vec![
            record("r1", "Check this", &["S0"], None, 1_000),
            record("r2", "Check this", &["S1"], Some("m2"), 1_000),
        ];
        let msg = user_message("m2", "Check this", 1_000);
        assert_eq!(attachments_for_message(&msg, &records), vec!["S1"]);
    }

    #[test]
    fn test_linked_record_never_matches_other_messages() {
        let records = vec![record("r1", "Check this", &["S1"], Some("m1"), 1_000)];
        let msg = user_message("m2", "Check this", 1_000);
        assert!(attachments_for_message(&msg, &records).is_empty());
    }

    #[test]
    fn test_exact_then_containment() {
        let records = vec![
            record("r1", "summary", &["A"], None, 0),
            record("r2", "Please give a summary", &["B"], None, 0),
        ];
        let exact = user_message("m", "Please give a summary", 50_000);
        assert_eq!(attachments_for_message(&exact, &records), vec!["B"]);

        let contained = user_message("m", "[Web search] a summary please", 50_000);
        assert_eq!(attachments_for_message(&contained, &records), vec!["A"]);
    }

    #[test]
    fn test_nearest_timestamp_window() {
        let records = vec![
            record("r1", "x1", &["far"], None, 10_000),
            record("r2", "x2", &["near"], None, 1_500),
        ];
        let close = user_message("m", "something else", 1_000);
        assert_eq!(attachments_for_message(&close, &records), vec!["near"]);

        let distant = user_message("m", "something else", 100_000);
        assert!(attachments_for_message(&distant, &records).is_empty());

        let edge = vec![record("r", "x", &["edge"], None, 6_000)];
        let at_window = user_message("m", "y", 1_000);
        assert!(attachments_for_message(&at_window, &edge).is_empty());
    }

    #[test]
    fn test_ties_keep_input_order() {
        let records = vec![
            record("r1", "a", &["first"], None, 900),
            record("r2", "b", &["second"], None, 1_100),
        ];
        let msg = user_message("m", "zzz", 1_000);
        assert_eq!(attachments_for_message(&msg, &records), vec!["first"]);
    }

    #[test]
    fn test_assistant_messages_have_no_attachments() {
        let records = vec![record("r1", "hi", &["S1"], Some("m1"), 0)];
        let msg = RenderedMessage {
            id: "m1",
            role: MessageRole::Assistant,
            content: "hi",
            created_at: 0,
        };
        assert!(attachments_for_message(&msg, &records).is_empty());
    }

    #[test]
    fn test_matching_is_idempotent() {
        let records = vec![record("r1", "Check this", &["S1"], None, 0)];
        let msg = user_message("m", "Check this", 0);
        let first = attachments_for_message(&msg, &records);
        assert_eq!(first, attachments_for_message(&msg, &records));
        assert_eq!(first, vec!["S1"]);
    }
}
