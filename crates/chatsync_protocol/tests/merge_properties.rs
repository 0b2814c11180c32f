//! Property tests for the merge engine.

use chatsync_protocol::{merge, Document, Message, Role, Session};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Strategy for a session's messages, sorted by creation time.
fn messages_strategy() -> impl Strategy<Value = Vec<Message>> {
    prop::collection::btree_map("m[0-6]", ("[a-c]{0,3}", 0u64..20), 0..6).prop_map(|by_id| {
        let mut messages: Vec<Message> = by_id
            .into_iter()
            .map(|(id, (content, at))| Message::new(id, Role::User, content, at))
            .collect();
        messages.sort_by_key(|m| m.created_at);
        messages
    })
}

/// Strategy for well-formed documents drawing ids from a small pool, so two
/// generated documents overlap often.
fn document_strategy() -> impl Strategy<Value = Document> {
    (
        prop::collection::btree_map("s[0-4]", (messages_strategy(), 0u64..50), 0..5),
        prop::collection::btree_map("[a-d]", any::<i32>(), 0..3),
        0u64..30,
    )
        .prop_map(|(sessions, settings, settings_at)| {
            let mut doc = Document::new();
            for (id, (messages, last_modified)) in sessions {
                doc.sessions.push(Session {
                    id,
                    topic: String::new(),
                    messages,
                    last_modified,
                });
            }
            for (key, value) in settings {
                doc.settings.insert(key, serde_json::json!(value));
            }
            doc.sync_meta.settings_updated_at = settings_at;
            doc
        })
}

fn messages_by_id(doc: &Document) -> BTreeMap<(String, String), Message> {
    doc.sessions
        .iter()
        .flat_map(|s| {
            s.messages
                .iter()
                .map(move |m| ((s.id.clone(), m.id.clone()), m.clone()))
        })
        .collect()
}

proptest! {
    #[test]
    fn merge_is_idempotent(doc in document_strategy()) {
        prop_assert_eq!(merge(&doc, &doc), doc);
    }

    #[test]
    fn merge_unions_session_ids(a in document_strategy(), b in document_strategy()) {
        let merged = merge(&a, &b);
        let expected: BTreeSet<&str> = a.session_ids().into_iter().chain(b.session_ids()).collect();
        let actual: BTreeSet<&str> = merged.session_ids().into_iter().collect();

        prop_assert_eq!(merged.sessions.len(), expected.len());
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn merge_loses_no_messages(a in document_strategy(), b in document_strategy()) {
        let merged = messages_by_id(&merge(&a, &b));
        let ours = messages_by_id(&a);
        let theirs = messages_by_id(&b);

        for (key, mine) in &ours {
            let got = merged.get(key);
            prop_assert!(got.is_some());
            match theirs.get(key) {
                Some(other) if other.created_at > mine.created_at && !other.same_content(mine) => {
                    prop_assert_eq!(got, Some(other));
                }
                _ => prop_assert_eq!(got, Some(mine)),
            }
        }
        for key in theirs.keys() {
            prop_assert!(merged.contains_key(key));
        }
    }

    #[test]
    fn merge_output_is_well_formed(a in document_strategy(), b in document_strategy()) {
        let merged = merge(&a, &b);
        prop_assert!(merged.validate().is_ok());
        for session in &merged.sessions {
            prop_assert!(session.messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        }
    }
}
