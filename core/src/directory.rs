//! Directory and contact synchronization
//!
//! Keeps the contact list and the user directory fresh by polling, and runs
//! the add-contact command. Contacts are never added locally ahead of the
//! server: a successful add is followed by a contact refresh, a failed one
//! leaves the slot as it was.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{ContactPair, UserId, UserProfile, UserScope};
use crate::network::Backend;
use crate::poller::ScopedPoller;
use crate::store::Store;

pub struct DirectorySync<B> {
    api: Arc<B>,
    store: Store,
    period: Duration,
    poller: ScopedPoller<UserId>,
}

impl<B: Backend> DirectorySync<B> {
    pub fn new(api: Arc<B>, store: Store, period: Duration) -> Self {
        Self {
            api,
            store,
            period,
            poller: ScopedPoller::new(),
        }
    }

    /// Fetches the user directory into the store.
    pub async fn refresh_directory(&self) -> Result<()> {
        let user = self.logged_in()?;
        refresh_directory_for(self.api.as_ref(), &self.store, user).await
    }

    /// Fetches the contact list into the store.
    pub async fn refresh_contacts(&self) -> Result<()> {
        let user = self.logged_in()?;
        refresh_contacts_for(self.api.as_ref(), &self.store, user).await
    }

    /// Asks the server to add `contact_id`, then refreshes contacts.
    pub async fn add_contact(&self, contact_id: UserId) -> Result<()> {
        let user = self.logged_in()?;

        if self.store.contacts().iter().any(|c| c.user_id == contact_id) {
            let err = Error::AlreadyContact(contact_id);
            self.store.set_notice(err.notice());
            return Err(err);
        }

        let pair = ContactPair {
            user_id: user,
            contact_id,
        };
        if let Err(e) = self.api.add_contact(pair).await {
            tracing::warn!(contact_id, error = %e, "Add contact failed");
            self.store.set_notice(e.notice());
            return Err(e);
        }

        tracing::info!(contact_id, "Contact added");
        refresh_contacts_for(self.api.as_ref(), &self.store, user).await
    }

    /// Directory entries matching `query`; see [`filter_users`].
    pub fn search(&self, query: &str) -> Vec<UserProfile> {
        filter_users(&self.store.users(), query)
    }

    /// Starts polling both lists for the logged-in user. Calling it again for
    /// the same user keeps the running poller.
    pub fn start(&self) -> Result<()> {
        let user = self.logged_in()?;
        let api = self.api.clone();
        let store = self.store.clone();

        self.poller.restart(user, "directory", self.period, move || {
            let api = api.clone();
            let store = store.clone();
            async move {
                // Failures are already surfaced as notices; the next tick retries.
                let _ = tokio::join!(
                    refresh_contacts_for(api.as_ref(), &store, user),
                    refresh_directory_for(api.as_ref(), &store, user),
                );
            }
        });
        Ok(())
    }

    pub fn stop(&self) {
        self.poller.stop();
    }

    pub fn is_running(&self) -> bool {
        self.poller.scope().is_some()
    }

    fn logged_in(&self) -> Result<UserId> {
        self.store.current_user_id().ok_or(Error::NotLoggedIn)
    }
}

impl<B> Drop for DirectorySync<B> {
    fn drop(&mut self) {
        self.poller.stop();
    }
}

async fn refresh_contacts_for<B: Backend>(api: &B, store: &Store, user: UserId) -> Result<()> {
    match api.fetch_contacts(UserScope { user_id: user }).await {
        Ok(contacts) => {
            if !store.replace_contacts_for(user, contacts.unwrap_or_default()) {
                tracing::debug!(user, "Dropping contact list for ended session");
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!(user, error = %e, "Contact refresh failed");
            if store.current_user_id() == Some(user) {
                store.set_notice(e.notice());
            }
            Err(e)
        }
    }
}

async fn refresh_directory_for<B: Backend>(api: &B, store: &Store, user: UserId) -> Result<()> {
    match api.fetch_users(UserScope { user_id: user }).await {
        Ok(users) => {
            if !store.replace_users_for(user, users.unwrap_or_default()) {
                tracing::debug!(user, "Dropping user directory for ended session");
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!(user, error = %e, "Directory refresh failed");
            if store.current_user_id() == Some(user) {
                store.set_notice(e.notice());
            }
            Err(e)
        }
    }
}

/// Case-insensitive substring search over first name, last name and email
/// run together. An empty query matches nothing.
pub fn filter_users(users: &[UserProfile], query: &str) -> Vec<UserProfile> {
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    users
        .iter()
        .filter(|u| u.search_key().to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
