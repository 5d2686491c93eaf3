//! View controllers: pure derivations over the store

pub mod contacts;
pub mod conversation;

pub use contacts::{ContactDirectoryView, ContactRow, ListStatus};
pub use conversation::{ConversationView, Direction, MessageRow};
