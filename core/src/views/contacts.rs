//! Contact directory view controller

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

use crate::directory::{filter_users, DirectorySync};
use crate::error::Result;
use crate::messaging::MessageSync;
use crate::models::{UserId, UserProfile};
use crate::network::Backend;
use crate::store::{Store, StoreEvent, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    /// No contact list has arrived for this session yet.
    Loading,
    Empty,
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRow {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub descr: String,
}

impl From<&UserProfile> for ContactRow {
    fn from(u: &UserProfile) -> Self {
        Self {
            user_id: u.user_id,
            name: u.display_name(),
            email: u.email.clone(),
            descr: u.descr.clone(),
        }
    }
}

#[derive(Default)]
struct DirectoryState {
    logged_in: bool,
    contacts: Option<Vec<ContactRow>>,
    selected: Option<UserId>,
    users: Vec<UserProfile>,
    query: String,
    results: Vec<UserProfile>,
    overlay_open: bool,
}

impl DirectoryState {
    fn apply(&mut self, event: &StoreEvent) -> bool {
        match event {
            StoreEvent::CurrentUser(user) => {
                self.logged_in = user.is_some();
                self.contacts = None;
            }
            StoreEvent::Contacts(contacts) => {
                if !self.logged_in {
                    return false;
                }
                self.contacts = Some(contacts.iter().map(ContactRow::from).collect());
            }
            StoreEvent::SelectedContact(selected) => self.selected = *selected,
            StoreEvent::Users(users) => {
                self.users = users.clone();
                self.refilter();
            }
            _ => return false,
        }
        true
    }

    fn refilter(&mut self) {
        self.results = filter_users(&self.users, &self.query);
    }
}

pub struct ContactDirectoryView {
    state: Arc<Mutex<DirectoryState>>,
    changes: watch::Receiver<u64>,
    _subscription: Subscription,
}

impl ContactDirectoryView {
    pub fn attach(store: &Store) -> Self {
        let state = Arc::new(Mutex::new(DirectoryState::default()));
        let (tx, changes) = watch::channel(0u64);

        let listener_state = state.clone();
        let subscription = store.attach(
            |snapshot| {
                let mut state = state.lock();
                state.logged_in = snapshot.current_user.is_some();
                if state.logged_in && snapshot.contacts_loaded {
                    state.contacts = Some(snapshot.contacts.iter().map(ContactRow::from).collect());
                }
                state.selected = snapshot.selected_contact;
                state.users = snapshot.users.clone();
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
            _subscription: subscription,
        }
    }

    pub fn contacts(&self) -> Vec<ContactRow> {
        self.state.lock().contacts.clone().unwrap_or_default()
    }

    pub fn status(&self) -> ListStatus {
        match &self.state.lock().contacts {
            None => ListStatus::Loading,
            Some(rows) if rows.is_empty() => ListStatus::Empty,
            Some(_) => ListStatus::Loaded,
        }
    }

    /// The contact whose conversation is open.
    pub fn selected(&self) -> Option<UserId> {
        self.state.lock().selected
    }

    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.clone()
    }

    // ========================================================================
    // Add-contact overlay
    // ========================================================================

    pub fn open_overlay(&self) {
        self.state.lock().overlay_open = true;
    }

    pub fn close_overlay(&self) {
        self.state.lock().overlay_open = false;
    }

    pub fn overlay_open(&self) -> bool {
        self.state.lock().overlay_open
    }

    /// Updates the search box; results are recomputed immediately.
    pub fn set_query(&self, query: &str) {
        let mut state = self.state.lock();
        state.query = query.to_string();
        state.refilter();
    }

    pub fn query(&self) -> String {
        self.state.lock().query.clone()
    }

    pub fn results(&self) -> Vec<UserProfile> {
        self.state.lock().results.clone()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Opens the conversation with a contact row.
    pub fn pick<B: Backend>(&self, sync: &MessageSync<B>, contact: UserId) -> Result<()> {
        sync.select_contact(contact)
    }

    /// Adds a directory result as a contact.
    pub async fn add<B: Backend>(&self, sync: &DirectorySync<B>, user: UserId) -> Result<()> {
        sync.add_contact(user).await
    }
}
