//! Conversation view controller
//!
//! Derives the rendered message rows from the store and decides when the
//! view should jump to the newest message.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::Result;
use crate::messaging::{MessageSync, OutgoingMessage};
use crate::models::{ChatMessage, UserId};
use crate::network::Backend;
use crate::store::{Store, StoreEvent, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub text: String,
    pub timestamp: String,
    pub direction: Direction,
    pub pending: bool,
}

#[derive(Default)]
struct ConversationState {
    current_user: Option<UserId>,
    messages: Vec<ChatMessage>,
    rows: Vec<MessageRow>,
    scroll_requested: bool,
}

impl ConversationState {
    fn rederive(&mut self) {
        let me = self.current_user;
        self.rows = self
            .messages
            .iter()
            .map(|m| MessageRow {
                text: m.message.clone(),
                timestamp: m.timestamp.clone(),
                direction: if me.is_some_and(|me| m.is_outgoing(me)) {
                    Direction::Outgoing
                } else {
                    Direction::Incoming
                },
                pending: m.is_pending(),
            })
            .collect();
    }

    fn apply(&mut self, event: &StoreEvent) -> bool {
        match event {
            StoreEvent::CurrentUser(user) => {
                self.current_user = user.as_ref().map(|u| u.user_id);
            }
            StoreEvent::Messages(messages) => {
                // Only growth scrolls; an identical poll result must not.
                if messages.len() > self.messages.len() {
                    self.scroll_requested = true;
                }
                self.messages = messages.clone();
            }
            _ => return false,
        }
        self.rederive();
        true
    }
}

pub struct ConversationView {
    state: Arc<Mutex<ConversationState>>,
    changes: watch::Receiver<u64>,
    input: String,
    _subscription: Subscription,
}

impl ConversationView {
    pub fn attach(store: &Store) -> Self {
        let state = Arc::new(Mutex::new(ConversationState::default()));
        let (tx, changes) = watch::channel(0u64);

        let listener_state = state.clone();
        let subscription = store.attach(
            |snapshot| {
                let mut state = state.lock();
                state.current_user = snapshot.current_user.as_ref().map(|u| u.user_id);
                state.messages = snapshot.messages.clone();
                state.rederive();
            },
            move |event| {
                if listener_state.lock().apply(event) {
                    tx.send_modify(|revision| *revision += 1);
                }
            },
        );

        Self {
            state,
            changes,
            input: String::new(),
            _subscription: subscription,
        }
    }

    pub fn rows(&self) -> Vec<MessageRow> {
        self.state.lock().rows.clone()
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().rows.len()
    }

    /// Row the view should keep scrolled into sight.
    pub fn newest(&self) -> Option<MessageRow> {
        self.state.lock().rows.last().cloned()
    }

    /// True once per growth of the message list since the last call.
    pub fn take_scroll_request(&self) -> bool {
        std::mem::take(&mut self.state.lock().scroll_requested)
    }

    /// Bumped on every change to the rendered rows.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.clone()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Sends the input box contents and clears it. Blank input is not sent.
    pub fn submit<B: Backend>(&mut self, sync: &MessageSync<B>) -> Result<Option<OutgoingMessage>> {
        if self.input.trim().is_empty() {
            return Ok(None);
        }
        let text = std::mem::take(&mut self.input);
        sync.send_message(&text).map(Some)
    }
}
