//! JSON snapshot codec.
//!
//! Snapshots are the wire form of a [`Document`]: the blob a remote adapter
//! stores and the contents of a backup file. Decoding validates the id
//! invariants so a malformed payload never reaches the merge engine.

use crate::document::Document;
use crate::error::{ProtocolError, ProtocolResult};

/// Serializes a document to its snapshot form.
pub fn encode_snapshot(document: &Document) -> ProtocolResult<String> {
    serde_json::to_string(document).map_err(|e| ProtocolError::encoding_failed(e.to_string()))
}

/// Parses and validates a snapshot.
pub fn decode_snapshot(payload: &str) -> ProtocolResult<Document> {
    let document: Document = serde_json::from_str(payload)
        .map_err(|e| ProtocolError::decoding_failed(e.to_string()))?;
    document.validate()?;
    Ok(document)
}

/// Returns true if a stored blob holds no snapshot at all.
///
/// Backends that cannot express absence return an empty value instead.
pub fn is_blank(payload: &str) -> bool {
    payload.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Message, Role, Session};

    #[test]
    fn decode_accepts_minimal_document() {
        let doc = decode_snapshot(r#"{"sessions":[]}"#).unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.sync_meta.last_sync_time, None);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_snapshot("not json"),
            Err(ProtocolError::DecodingFailed { .. })
        ));
        // Valid JSON, wrong schema.
        assert!(matches!(
            decode_snapshot(r#"{"chats": 3}"#),
            Err(ProtocolError::DecodingFailed { .. })
        ));
    }

    #[test]
    fn decode_rejects_duplicate_ids() {
        let payload = r#"{"sessions":[
            {"id":"a","lastModified":1,"messages":[]},
            {"id":"a","lastModified":2,"messages":[]}
        ]}"#;
        assert!(matches!(
            decode_snapshot(payload),
            Err(ProtocolError::DuplicateSession { .. })
        ));
    }

    #[test]
    fn encode_then_decode_preserves_document() {
        let mut doc = Document::new();
        let mut session = Session::new("s1", "Trip planning", 3);
        session.push_message(Message::new("m1", Role::User, "Where to?", 3), 3);
        doc.upsert_session(session);
        doc.set_setting("model", serde_json::json!("gpt"), 4);

        let encoded = encode_snapshot(&doc).unwrap();
        assert_eq!(decode_snapshot(&encoded).unwrap(), doc);
    }

    #[test]
    fn blank_payloads() {
        assert!(is_blank(""));
        assert!(is_blank("  \n"));
        assert!(!is_blank("{}"));
    }
}
