//! Two-way reconciliation of document snapshots.
//!
//! [`merge`] takes a `base` (the local copy) and an `incoming` copy (remote or
//! imported) and produces a new document. Neither input is modified.
//!
//! ## Rules
//!
//! - Sessions are unioned by id. Base order is kept; sessions only present in
//!   `incoming` follow in incoming order.
//! - Messages of a shared session are unioned by id. When both sides hold the
//!   same id with different content, the later `created_at` wins and a tie
//!   keeps base. The result is sorted by `created_at` (stable).
//! - A shared session takes the max `last_modified`; its topic comes from
//!   the side with the greater `last_modified` (tie keeps base).
//! - Settings are taken wholesale from the side with the greater
//!   [`SyncMeta::settings_marker`](crate::SyncMeta::settings_marker); a tie
//!   keeps base.
//! - `last_sync_time` and `last_provider` are copied from base. Stamping them
//!   is the orchestrator's job.
//!
//! The function is total: any two documents merge. `merge(x, x) == x` for
//! every well-formed `x`.

use crate::document::{Document, Message, Session};
use std::collections::HashMap;

/// Counters describing what a merge took from the incoming side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Sessions only present in incoming.
    pub sessions_added: usize,
    /// Messages only present in incoming, within shared sessions.
    pub messages_added: usize,
    /// Same-id messages where the incoming copy replaced base.
    pub messages_replaced: usize,
    /// Whether the settings map came from incoming.
    pub settings_from_incoming: bool,
}

impl MergeReport {
    /// Returns true if the merge result differs from base in content.
    pub fn changed_base(&self) -> bool {
        self.sessions_added > 0
            || self.messages_added > 0
            || self.messages_replaced > 0
            || self.settings_from_incoming
    }
}

/// Merges `incoming` into a copy of `base`.
pub fn merge(base: &Document, incoming: &Document) -> Document {
    merge_with_report(base, incoming).0
}

/// Like [`merge`], also returning what was taken from `incoming`.
pub fn merge_with_report(base: &Document, incoming: &Document) -> (Document, MergeReport) {
    let mut report = MergeReport::default();

    let mut sessions: Vec<Session> = base.sessions.clone();
    let mut positions: HashMap<String, usize> = sessions
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.clone(), i))
        .collect();

    for theirs in &incoming.sessions {
        match positions.get(&theirs.id) {
            Some(&pos) => {
                let merged = merge_session(&sessions[pos], theirs, &mut report);
                sessions[pos] = merged;
            }
            None => {
                positions.insert(theirs.id.clone(), sessions.len());
                sessions.push(theirs.clone());
                report.sessions_added += 1;
            }
        }
    }

    let mut sync_meta = base.sync_meta.clone();
    let settings = if incoming.sync_meta.settings_marker() > base.sync_meta.settings_marker() {
        report.settings_from_incoming = true;
        sync_meta.settings_updated_at = incoming.sync_meta.settings_updated_at;
        incoming.settings.clone()
    } else {
        base.settings.clone()
    };

    let document = Document {
        sessions,
        settings,
        sync_meta,
    };
    (document, report)
}

fn merge_session(ours: &Session, theirs: &Session, report: &mut MergeReport) -> Session {
    let topic = if theirs.last_modified > ours.last_modified {
        theirs.topic.clone()
    } else {
        ours.topic.clone()
    };

    Session {
        id: ours.id.clone(),
        topic,
        messages: merge_messages(&ours.messages, &theirs.messages, report),
        last_modified: ours.last_modified.max(theirs.last_modified),
    }
}

fn merge_messages(ours: &[Message], theirs: &[Message], report: &mut MergeReport) -> Vec<Message> {
    let mut merged: Vec<Message> = ours.to_vec();
    let mut positions: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.clone(), i))
        .collect();

    for message in theirs {
        match positions.get(&message.id) {
            Some(&pos) => {
                let current = &merged[pos];
                if !current.same_content(message) && message.created_at > current.created_at {
                    merged[pos] = message.clone();
                    report.messages_replaced += 1;
                }
            }
            None => {
                positions.insert(message.id.clone(), merged.len());
                merged.push(message.clone());
                report.messages_added += 1;
            }
        }
    }

    // Stable: equal timestamps keep base-then-incoming order.
    merged.sort_by_key(|m| m.created_at);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Role;
    use serde_json::json;

    fn msg(id: &str, content: &str, at: u64) -> Message {
        Message::new(id, Role::User, content, at)
    }

    fn session(id: &str, messages: Vec<Message>, last_modified: u64) -> Session {
        Session {
            id: id.into(),
            topic: format!("topic {id}"),
            messages,
            last_modified,
        }
    }

    fn doc(sessions: Vec<Session>) -> Document {
        Document {
            sessions,
            ..Document::default()
        }
    }

    #[test]
    fn merge_identical_is_identity() {
        let mut d = doc(vec![
            session("s1", vec![msg("m1", "a", 1), msg("m2", "b", 2)], 2),
            session("s2", vec![], 5),
        ]);
        d.set_setting("theme", json!("dark"), 3);

        let (merged, report) = merge_with_report(&d, &d);
        assert_eq!(merged, d);
        assert!(!report.changed_base());
    }

    #[test]
    fn merge_edited_message_scenario() {
        let local = doc(vec![session(
            "S1",
            vec![msg("m1", "hello", 1), msg("m2", "second", 2)],
            2,
        )]);
        let remote = doc(vec![
            session(
                "S1",
                vec![msg("m1", "hello (edited)", 5), msg("m3", "third", 3)],
                5,
            ),
            session("S2", vec![msg("x", "other", 4)], 4),
        ]);

        let (merged, report) = merge_with_report(&local, &remote);

        let s1 = merged.session("S1").unwrap();
        let ids: Vec<_> = s1.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3", "m1"]);
        assert_eq!(s1.message("m1").unwrap().content, "hello (edited)");
        assert_eq!(s1.last_modified, 5);
        assert_eq!(merged.session("S2"), remote.session("S2"));
        assert_eq!(merged.session_ids(), vec!["S1", "S2"]);

        assert_eq!(report.sessions_added, 1);
        assert_eq!(report.messages_added, 1);
        assert_eq!(report.messages_replaced, 1);
    }

    #[test]
    fn conflict_tie_keeps_base() {
        let base = doc(vec![session("s", vec![msg("m", "ours", 3)], 3)]);
        let incoming = doc(vec![session("s", vec![msg("m", "theirs", 3)], 3)]);

        let merged = merge(&base, &incoming);
        assert_eq!(merged.session("s").unwrap().messages[0].content, "ours");
    }

    #[test]
    fn older_incoming_copy_loses() {
        let base = doc(vec![session("s", vec![msg("m", "new", 9)], 9)]);
        let incoming = doc(vec![session("s", vec![msg("m", "old", 4)], 4)]);

        let (merged, report) = merge_with_report(&base, &incoming);
        assert_eq!(merged.session("s").unwrap().messages[0].content, "new");
        assert_eq!(report.messages_replaced, 0);
    }

    #[test]
    fn inputs_are_not_mutated() {
        let base = doc(vec![session("a", vec![msg("1", "x", 1)], 1)]);
        let incoming = doc(vec![session("b", vec![msg("2", "y", 2)], 2)]);
        let (base_before, incoming_before) = (base.clone(), incoming.clone());

        let _ = merge(&base, &incoming);
        assert_eq!(base, base_before);
        assert_eq!(incoming, incoming_before);
    }

    #[test]
    fn topic_follows_newer_session() {
        let base = session("s", vec![], 1);
        let mut theirs = session("s", vec![], 1);
        theirs.set_topic("new title", 2);
        assert_eq!(theirs.last_modified, 2);

        let merged = merge(&doc(vec![base.clone()]), &doc(vec![theirs.clone()]));
        assert_eq!(merged.session("s").unwrap().topic, "new title");
        assert_eq!(merged.session("s").unwrap().last_modified, 2);

        // A rename with an older clock never moves last_modified back.
        theirs.set_topic("stale title", 0);
        assert_eq!(theirs.last_modified, 2);
        let merged = merge(&doc(vec![theirs]), &doc(vec![base]));
        assert_eq!(merged.session("s").unwrap().topic, "stale title");
    }

    #[test]
    fn settings_follow_newer_marker_wholesale() {
        let mut base = Document::new();
        base.set_setting("theme", json!("dark"), 10);
        base.set_setting("fontSize", json!(14), 10);

        let mut incoming = Document::new();
        incoming.set_setting("theme", json!("light"), 20);

        let (merged, report) = merge_with_report(&base, &incoming);
        assert!(report.settings_from_incoming);
        assert_eq!(merged.settings, incoming.settings);
        assert!(!merged.settings.contains_key("fontSize"));
        assert_eq!(merged.sync_meta.settings_updated_at, 20);

        // Reversed roles: base is now the newer side.
        let merged = merge(&incoming, &base);
        assert_eq!(merged.settings, incoming.settings);
    }

    #[test]
    fn settings_tie_falls_back_to_last_sync_time() {
        let mut base = Document::new();
        base.set_setting("lang", json!("en"), 5);
        base.sync_meta.last_sync_time = Some(100);

        let mut incoming = Document::new();
        incoming.set_setting("lang", json!("fr"), 5);
        incoming.sync_meta.last_sync_time = Some(200);

        let merged = merge(&base, &incoming);
        assert_eq!(merged.settings["lang"], json!("fr"));
        // Sync stamps are never taken from incoming.
        assert_eq!(merged.sync_meta.last_sync_time, Some(100));
    }

    #[test]
    fn first_merge_against_empty_keeps_everything() {
        let local = doc(vec![session("a", vec![msg("1", "x", 1)], 1)]);
        assert_eq!(merge(&local, &Document::new()), local);
        assert_eq!(merge(&Document::new(), &local).sessions, local.sessions);
    }
}
