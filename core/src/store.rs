//! Shared state store
//!
//! One [`Store`] holds every piece of mutable session state. Handles are cheap
//! clones of the same `Arc`. All mutation goes through the named setters
//! below; each setter publishes one [`StoreEvent`] per slot it wrote, to every
//! listener, before returning.
//!
//! Fetched lists replace their slot wholesale. The only incremental write is
//! [`Store::append_message`], used for optimistic sends; the next successful
//! message fetch replaces those entries like everything else.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::models::{ChatMessage, UserId, UserProfile};

/// A completed write, carrying the slot's new contents.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    CurrentUser(Option<UserProfile>),
    SelectedContact(Option<UserId>),
    Messages(Vec<ChatMessage>),
    Contacts(Vec<UserProfile>),
    Users(Vec<UserProfile>),
    Notice(Option<String>),
}

/// Point-in-time copy of every slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub current_user: Option<UserProfile>,
    pub selected_contact: Option<UserId>,
    pub messages: Vec<ChatMessage>,
    pub contacts: Vec<UserProfile>,
    /// Set once a contact list has been written this session, even an empty one.
    pub contacts_loaded: bool,
    pub users: Vec<UserProfile>,
    pub notice: Option<String>,
}

type Listener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

#[derive(Default)]
struct Inner {
    state: RwLock<Snapshot>,
    // Held across mutate + notify so listeners see writes in the order performed.
    listeners: Mutex<Listeners>,
}

#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Inner>,
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    inner: Arc<Inner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.listeners.lock().entries.retain(|(id, _)| *id != self.id);
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for every subsequent write.
    ///
    /// Listeners run synchronously inside the write. They may read the store
    /// but must not write to it, subscribe, or drop a [`Subscription`].
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.attach(|_| {}, listener)
    }

    /// Like [`Store::subscribe`], first handing `init` the current state.
    /// No write can fall between `init` and the listener's first event.
    pub fn attach<I, F>(&self, init: I, listener: F) -> Subscription
    where
        I: FnOnce(&Snapshot),
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.inner.listeners.lock();
        init(&*self.inner.state.read());
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));

        Subscription {
            id,
            inner: self.inner.clone(),
        }
    }

    fn write<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut Snapshot) -> Vec<StoreEvent>,
    {
        let listeners = self.inner.listeners.lock();
        let events = {
            let mut state = self.inner.state.write();
            mutate(&mut state)
        };

        for event in &events {
            for (_, listener) in &listeners.entries {
                listener(event);
            }
        }
        !events.is_empty()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.read().clone()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.state.read().current_user.clone()
    }

    pub fn current_user_id(&self) -> Option<UserId> {
        self.inner.state.read().current_user.as_ref().map(|u| u.user_id)
    }

    pub fn selected_contact(&self) -> Option<UserId> {
        self.inner.state.read().selected_contact
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.state.read().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.inner.state.read().messages.len()
    }

    pub fn contacts(&self) -> Vec<UserProfile> {
        self.inner.state.read().contacts.clone()
    }

    /// False until the first contact list of the session arrives.
    pub fn contacts_loaded(&self) -> bool {
        self.inner.state.read().contacts_loaded
    }

    pub fn users(&self) -> Vec<UserProfile> {
        self.inner.state.read().users.clone()
    }

    pub fn notice(&self) -> Option<String> {
        self.inner.state.read().notice.clone()
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub fn set_current_user(&self, user: Option<UserProfile>) {
        self.write(|state| {
            state.current_user = user;
            vec![StoreEvent::CurrentUser(state.current_user.clone())]
        });
    }

    /// Changes the conversation. A real change also empties the message slot.
    /// Returns false when `contact` was already selected.
    pub fn select_contact(&self, contact: Option<UserId>) -> bool {
        self.write(|state| {
            if state.selected_contact == contact {
                return Vec::new();
            }
            state.selected_contact = contact;
            state.messages.clear();
            vec![
                StoreEvent::SelectedContact(contact),
                StoreEvent::Messages(Vec::new()),
            ]
        })
    }

    /// Empties every slot.
    pub fn reset(&self) {
        self.write(|state| {
            *state = Snapshot::default();
            vec![
                StoreEvent::CurrentUser(None),
                StoreEvent::SelectedContact(None),
                StoreEvent::Messages(Vec::new()),
                StoreEvent::Contacts(Vec::new()),
                StoreEvent::Users(Vec::new()),
                StoreEvent::Notice(None),
            ]
        });
    }

    // ========================================================================
    // Messages
    // ========================================================================

    pub fn set_messages(&self, messages: Vec<ChatMessage>) {
        self.write(|state| {
            state.messages = messages;
            vec![StoreEvent::Messages(state.messages.clone())]
        });
    }

    /// Applies a fetch result only if `(user, contact)` is still the open
    /// conversation. Returns false for a stale response.
    pub fn replace_messages_for(
        &self,
        user: UserId,
        contact: UserId,
        messages: Vec<ChatMessage>,
    ) -> bool {
        self.write(|state| {
            let current = state.current_user.as_ref().map(|u| u.user_id);
            if current != Some(user) || state.selected_contact != Some(contact) {
                return Vec::new();
            }
            state.messages = messages;
            vec![StoreEvent::Messages(state.messages.clone())]
        })
    }

    /// Appends an outgoing message if it belongs to the open conversation.
    pub fn append_message(&self, message: ChatMessage) -> bool {
        self.write(|state| {
            let current = state.current_user.as_ref().map(|u| u.user_id);
            if current != Some(message.from) || state.selected_contact != Some(message.to) {
                return Vec::new();
            }
            state.messages.push(message);
            vec![StoreEvent::Messages(state.messages.clone())]
        })
    }

    // ========================================================================
    // Contacts and directory
    // ========================================================================

    pub fn set_contacts(&self, contacts: Vec<UserProfile>) {
        self.write(|state| {
            state.contacts = contacts;
            state.contacts_loaded = true;
            vec![StoreEvent::Contacts(state.contacts.clone())]
        });
    }

    /// Applies a contact fetch only if `user` is still logged in.
    pub fn replace_contacts_for(&self, user: UserId, contacts: Vec<UserProfile>) -> bool {
        self.write(|state| {
            if state.current_user.as_ref().map(|u| u.user_id) != Some(user) {
                return Vec::new();
            }
            state.contacts = contacts;
            state.contacts_loaded = true;
            vec![StoreEvent::Contacts(state.contacts.clone())]
        })
    }

    pub fn set_users(&self, users: Vec<UserProfile>) {
        self.write(|state| {
            state.users = users;
            vec![StoreEvent::Users(state.users.clone())]
        });
    }

    /// Applies a directory fetch only if `user` is still logged in.
    pub fn replace_users_for(&self, user: UserId, users: Vec<UserProfile>) -> bool {
        self.write(|state| {
            if state.current_user.as_ref().map(|u| u.user_id) != Some(user) {
                return Vec::new();
            }
            state.users = users;
            vec![StoreEvent::Users(state.users.clone())]
        })
    }

    // ========================================================================
    // Notices
    // ========================================================================

    /// Raises a one-shot user-visible alert.
    pub fn set_notice(&self, notice: impl Into<String>) {
        let notice = notice.into();
        self.write(|state| {
            state.notice = Some(notice);
            vec![StoreEvent::Notice(state.notice.clone())]
        });
    }

    /// Takes the pending alert, if any, clearing the slot.
    pub fn take_notice(&self) -> Option<String> {
        let mut taken = None;
        self.write(|state| match state.notice.take() {
            Some(notice) => {
                taken = Some(notice);
                vec![StoreEvent::Notice(None)]
            }
            None => Vec::new(),
        });
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: UserId) -> UserProfile {
        UserProfile {
            user_id: id,
            email: format!("user{}@example.com", id),
            firstname: format!("First{}", id),
            lastname: format!("Last{}", id),
            descr: String::new(),
        }
    }

    fn message(from: UserId, to: UserId, text: &str) -> ChatMessage {
        ChatMessage {
            from,
            to,
            message: text.to_string(),
            timestamp: "9:05".to_string(),
            acked: true,
            local_id: None,
        }
    }

    fn recorder(store: &Store) -> (Arc<Mutex<Vec<StoreEvent>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = store.subscribe(move |event| sink.lock().push(event.clone()));
        (seen, sub)
    }

    #[test]
    fn test_every_write_is_observed_in_order() {
        let store = Store::new();
        let (seen, _sub) = recorder(&store);

        store.set_contacts(vec![profile(2)]);
        store.set_contacts(vec![profile(2)]);
        store.set_users(vec![]);

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                StoreEvent::Contacts(vec![profile(2)]),
                StoreEvent::Contacts(vec![profile(2)]),
                StoreEvent::Users(vec![]),
            ]
        );
    }

    #[test]
    fn test_dropped_subscription_stops_events() {
        let store = Store::new();
        let (seen, sub) = recorder(&store);
        store.set_users(vec![profile(1)]);
        drop(sub);
        store.set_users(vec![]);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_listener_can_read_store() {
        let store = Store::new();
        let reader = store.clone();
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = counts.clone();
        let _sub = store.subscribe(move |_| sink.lock().push(reader.contacts().len()));

        store.set_contacts(vec![profile(2), profile(3)]);
        assert_eq!(*counts.lock(), vec![2]);
    }

    #[test]
    fn test_select_contact_clears_messages() {
        let store = Store::new();
        store.set_current_user(Some(profile(1)));
        assert!(store.select_contact(Some(2)));
        store.set_messages(vec![message(1, 2, "a")]);

        let (seen, _sub) = recorder(&store);
        assert!(store.select_contact(Some(3)));
        assert!(store.messages().is_empty());
        assert_eq!(
            *seen.lock(),
            vec![
                StoreEvent::SelectedContact(Some(3)),
                StoreEvent::Messages(vec![]),
            ]
        );

        // Re-selecting the same contact is not a write.
        assert!(!store.select_contact(Some(3)));
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_stale_message_response_is_dropped() {
        let store = Store::new();
        store.set_current_user(Some(profile(1)));
        store.select_contact(Some(2));
        store.select_contact(Some(3));

        assert!(!store.replace_messages_for(1, 2, vec![message(2, 1, "old")]));
        assert!(store.messages().is_empty());

        assert!(store.replace_messages_for(1, 3, vec![message(3, 1, "new")]));
        assert_eq!(store.messages()[0].message, "new");
    }

    #[test]
    fn test_append_requires_matching_conversation() {
        let store = Store::new();
        store.set_current_user(Some(profile(1)));
        store.select_contact(Some(2));

        assert!(store.append_message(message(1, 2, "hi")));
        assert!(!store.append_message(message(1, 3, "elsewhere")));
        assert_eq!(store.message_count(), 1);
    }

    #[test]
    fn test_contact_replace_ignored_after_logout() {
        let store = Store::new();
        store.set_current_user(Some(profile(1)));
        store.reset();
        assert!(!store.replace_contacts_for(1, vec![profile(2)]));
        assert!(!store.replace_users_for(1, vec![profile(2)]));
        assert!(store.contacts().is_empty());
    }

    #[test]
    fn test_take_notice_is_one_shot() {
        let store = Store::new();
        store.set_notice("boom");
        assert_eq!(store.take_notice().as_deref(), Some("boom"));
        assert_eq!(store.take_notice(), None);
    }

    #[test]
    fn test_reset_clears_every_slot() {
        let store = Store::new();
        store.set_current_user(Some(profile(1)));
        store.select_contact(Some(2));
        store.set_users(vec![profile(2)]);
        store.set_notice("x");

        let (seen, _sub) = recorder(&store);
        store.reset();
        assert_eq!(store.snapshot(), Snapshot::default());
        assert_eq!(seen.lock().len(), 6);
    }

    #[test]
    fn test_empty_contact_fetch_counts_as_loaded() {
        let store = Store::new();
        store.set_current_user(Some(profile(1)));
        assert!(!store.contacts_loaded());

        assert!(store.replace_contacts_for(1, vec![]));
        assert!(store.contacts_loaded());

        store.reset();
        assert!(!store.contacts_loaded());
    }
}
