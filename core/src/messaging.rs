//! Message synchronization and optimistic send
//!
//! The open conversation is polled on a timer scoped to the
//! `(current user, selected contact)` pair. Each successful fetch replaces the
//! message slot outright, including any optimistic entries: the backend echoes
//! everything it accepted, so a message whose submission failed disappears on
//! the next poll.

use chrono::{Local, NaiveTime, Timelike};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::models::{ChatMessage, ContactPair, UserId};
use crate::network::Backend;
use crate::poller::ScopedPoller;
use crate::store::Store;

/// An optimistically inserted message and the task submitting it.
pub struct OutgoingMessage {
    pub message: ChatMessage,
    pub submission: JoinHandle<Result<()>>,
}

pub struct MessageSync<B> {
    api: Arc<B>,
    store: Store,
    period: Duration,
    poller: ScopedPoller<(UserId, UserId)>,
    // Serializes selection changes so the store and the poller move together.
    transition: Mutex<()>,
}

impl<B: Backend> MessageSync<B> {
    pub fn new(api: Arc<B>, store: Store, period: Duration) -> Self {
        Self {
            api,
            store,
            period,
            poller: ScopedPoller::new(),
            transition: Mutex::new(()),
        }
    }

    /// Opens the conversation with `contact`: clears the message list, stops
    /// the previous conversation's poller, fetches at once and then every
    /// period. Re-selecting the open conversation changes nothing.
    pub fn select_contact(&self, contact: UserId) -> Result<()> {
        let user = self.store.current_user_id().ok_or(Error::NotLoggedIn)?;
        let _guard = self.transition.lock();

        if self.store.select_contact(Some(contact)) {
            tracing::info!(contact, "Conversation selected");
        }

        let api = self.api.clone();
        let store = self.store.clone();
        self.poller
            .restart((user, contact), "messages", self.period, move || {
                let api = api.clone();
                let store = store.clone();
                async move {
                    let _ = refresh_messages_for(api.as_ref(), &store, user, contact).await;
                }
            });
        Ok(())
    }

    /// Fetches the conversation with `selected` into the store. No-op when
    /// nothing is selected.
    pub async fn refresh_messages(&self, selected: Option<UserId>) -> Result<()> {
        let Some(contact) = selected else {
            return Ok(());
        };
        let user = self.store.current_user_id().ok_or(Error::NotLoggedIn)?;
        refresh_messages_for(self.api.as_ref(), &self.store, user, contact).await
    }

    /// Sends `text` to the open conversation, stamped with the local time.
    pub fn send_message(&self, text: &str) -> Result<OutgoingMessage> {
        self.send_message_at(text, Local::now().time())
    }

    /// Appends the message to the store before returning, then submits it in
    /// the background. A failed submission is logged, not rolled back.
    pub fn send_message_at(&self, text: &str, at: NaiveTime) -> Result<OutgoingMessage> {
        if text.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }
        let user = self.store.current_user_id().ok_or(Error::NotLoggedIn)?;
        let contact = self.store.selected_contact().ok_or(Error::NoConversation)?;

        let message = ChatMessage::outgoing(user, contact, text, format_timestamp(at));
        if !self.store.append_message(message.clone()) {
            return Err(Error::NoConversation);
        }

        let api = self.api.clone();
        let body = message.clone();
        let submission = tokio::spawn(async move {
            let result = api.submit_message(body).await;
            if let Err(e) = &result {
                tracing::warn!(to = contact, error = %e, "Message submission failed");
            }
            result
        });

        tracing::info!(to = contact, "Message sent");
        Ok(OutgoingMessage {
            message,
            submission,
        })
    }

    /// The conversation currently being polled.
    pub fn polling(&self) -> Option<(UserId, UserId)> {
        self.poller.scope()
    }

    /// Stops polling. The selection itself is kept.
    pub fn stop(&self) {
        let _guard = self.transition.lock();
        self.poller.stop();
    }
}

impl<B> Drop for MessageSync<B> {
    fn drop(&mut self) {
        self.poller.stop();
    }
}

async fn refresh_messages_for<B: Backend>(
    api: &B,
    store: &Store,
    user: UserId,
    contact: UserId,
) -> Result<()> {
    let pair = ContactPair {
        user_id: user,
        contact_id: contact,
    };
    match api.fetch_messages(pair).await {
        Ok(messages) => {
            if !store.replace_messages_for(user, contact, messages.unwrap_or_default()) {
                tracing::debug!(contact, "Dropping messages for a conversation no longer open");
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!(contact, error = %e, "Message refresh failed");
            if store.current_user_id() == Some(user) && store.selected_contact() == Some(contact) {
                store.set_notice(e.notice());
            }
            Err(e)
        }
    }
}

/// `H:MM`: hours unpadded, minutes zero-padded.
pub fn format_timestamp(at: NaiveTime) -> String {
    format!("{}:{:02}", at.hour(), at.minute())
}
