//! # chatsync protocol
//!
//! Document model, merge engine and snapshot codec for chatsync.
//!
//! This crate provides:
//! - [`Document`], [`Session`], [`Message`] and [`SyncMeta`]
//! - [`merge`], a pure two-way reconciliation of document snapshots
//! - JSON snapshot encoding and decoding with invariant checks
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod document;
mod error;
mod merge;

pub use codec::{decode_snapshot, encode_snapshot, is_blank};
pub use document::{Document, Message, Role, Session, Settings, SyncMeta};
pub use error::{ProtocolError, ProtocolResult};
pub use merge::{merge, merge_with_report, MergeReport};
