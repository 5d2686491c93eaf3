//! pollchat Core Library
//!
//! Client-side synchronization engine for a poll-based messenger.
//! Provides: the shared store, pollers for contacts, the user directory and
//! messages, optimistic sending, and the view controllers that derive
//! renderable state from the store.

pub mod config;
pub mod directory;
pub mod error;
pub mod messaging;
pub mod models;
pub mod network;
pub mod poller;
pub mod store;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use config::*;
pub use directory::{filter_users, DirectorySync};
pub use error::*;
pub use messaging::{format_timestamp, MessageSync, OutgoingMessage};
pub use models::*;
pub use network::{ApiClient, Backend};
pub use store::{Snapshot, Store, StoreEvent, Subscription};
pub use views::*;

/// Main client instance: one session's store plus the components that keep
/// it in sync with the backend.
pub struct ChatClient<B = ApiClient> {
    config: ClientConfig,
    api: Arc<B>,
    store: Store,
    directory: DirectorySync<B>,
    messaging: MessageSync<B>,
}

impl ChatClient<ApiClient> {
    /// Create new client instance talking HTTP to the configured backend
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api = Arc::new(ApiClient::new(&config)?);
        Ok(Self::with_backend(config, api))
    }
}

impl<B: Backend> ChatClient<B> {
    pub fn with_backend(config: ClientConfig, api: Arc<B>) -> Self {
        let store = Store::new();
        let period = config.poll_interval();

        Self {
            directory: DirectorySync::new(api.clone(), store.clone(), period),
            messaging: MessageSync::new(api.clone(), store.clone(), period),
            config,
            api,
            store,
        }
    }

    /// Login to server. On failure the store is left as it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        match self.api.login(req).await {
            Ok(profile) => {
                tracing::info!(user = profile.user_id, "Logged in");
                self.begin_session(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                self.store.set_notice(e.notice());
                Err(e)
            }
        }
    }

    /// Create an account and log into it.
    pub async fn register(&self, req: RegisterRequest) -> Result<UserProfile> {
        match self.api.register(req).await {
            Ok(profile) => {
                tracing::info!(user = profile.user_id, "Account created");
                self.begin_session(profile.clone());
                self.store.set_notice("User created successfully!");
                Ok(profile)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Registration failed");
                self.store.set_notice(e.notice());
                Err(e)
            }
        }
    }

    /// Stops every poller and clears the session.
    pub fn logout(&self) {
        self.directory.stop();
        self.messaging.stop();
        if let Some(user) = self.store.current_user_id() {
            tracing::info!(user, "Logged out");
        }
        self.store.reset();
    }

    fn begin_session(&self, profile: UserProfile) {
        self.directory.stop();
        self.messaging.stop();
        self.store.reset();
        self.store.set_current_user(Some(profile));
    }

    /// Starts the contact and directory pollers for the logged-in user.
    pub fn start_directory_sync(&self) -> Result<()> {
        self.directory.start()
    }

    pub fn select_contact(&self, contact: UserId) -> Result<()> {
        self.messaging.select_contact(contact)
    }

    pub fn send_message(&self, text: &str) -> Result<OutgoingMessage> {
        self.messaging.send_message(text)
    }

    pub async fn add_contact(&self, contact: UserId) -> Result<()> {
        self.directory.add_contact(contact).await
    }

    pub fn search_users(&self, query: &str) -> Vec<UserProfile> {
        self.directory.search(query)
    }

    pub fn conversation_view(&self) -> ConversationView {
        ConversationView::attach(&self.store)
    }

    pub fn contacts_view(&self) -> ContactDirectoryView {
        ContactDirectoryView::attach(&self.store)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn directory(&self) -> &DirectorySync<B> {
        &self.directory
    }

    pub fn messaging(&self) -> &MessageSync<B> {
        &self.messaging
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
