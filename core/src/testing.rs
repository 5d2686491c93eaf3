//! In-memory backend for unit tests

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::*;
use crate::network::{routes, Backend};

#[derive(Default)]
struct FakeState {
    users: Option<Vec<UserProfile>>,
    contacts: Option<Vec<UserProfile>>,
    messages: Option<Vec<ChatMessage>>,
    account: Option<UserProfile>,
    failing: HashSet<&'static str>,
    delays: HashMap<&'static str, Duration>,
    requests: Vec<(&'static str, serde_json::Value)>,
}

/// Scripted backend. Lists start out `None` (the server's `null`).
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_users(&self, users: Option<Vec<UserProfile>>) {
        self.state.lock().users = users;
    }

    pub fn set_contacts(&self, contacts: Option<Vec<UserProfile>>) {
        self.state.lock().contacts = contacts;
    }

    pub fn set_messages(&self, messages: Option<Vec<ChatMessage>>) {
        self.state.lock().messages = messages;
    }

    pub fn set_account(&self, account: Option<UserProfile>) {
        self.state.lock().account = account;
    }

    pub fn fail(&self, route: &'static str) {
        self.state.lock().failing.insert(route);
    }

    pub fn recover(&self, route: &'static str) {
        self.state.lock().failing.remove(route);
    }

    pub fn delay(&self, route: &'static str, delay: Duration) {
        self.state.lock().delays.insert(route, delay);
    }

    pub fn calls(&self, route: &str) -> usize {
        self.state.lock().requests.iter().filter(|(r, _)| *r == route).count()
    }

    pub fn requests(&self, route: &str) -> Vec<serde_json::Value> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(r, _)| *r == route)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Records the call, waits out any scripted delay, then fails if scripted to.
    async fn enter<B: Serialize>(&self, route: &'static str, body: &B) -> Result<()> {
        let delay = {
            let mut state = self.state.lock();
            let value = serde_json::to_value(body)?;
            state.requests.push((route, value));
            state.delays.get(route).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.lock().failing.contains(route) {
            return Err(Error::Http { route, status: 500 });
        }
        Ok(())
    }
}

pub fn profile(id: UserId, first: &str, last: &str, email: &str) -> UserProfile {
    UserProfile {
        user_id: id,
        email: email.to_string(),
        firstname: first.to_string(),
        lastname: last.to_string(),
        descr: String::new(),
    }
}

pub fn server_message(from: UserId, to: UserId, text: &str) -> ChatMessage {
    ChatMessage {
        from,
        to,
        message: text.to_string(),
        timestamp: "12:00".to_string(),
        acked: true,
        local_id: None,
    }
}

impl Backend for FakeBackend {
    async fn login(&self, req: LoginRequest) -> Result<UserProfile> {
        self.enter(routes::LOGIN, &req).await?;
        let account = self.state.lock().account.clone();
        account
            .filter(|a| a.email == req.email)
            .ok_or(Error::Http { route: routes::LOGIN, status: 401 })
    }

    async fn register(&self, req: RegisterRequest) -> Result<UserProfile> {
        self.enter(routes::REGISTER, &req).await?;
        let created = UserProfile {
            user_id: 100,
            email: req.email,
            firstname: req.firstname,
            lastname: req.lastname,
            descr: req.descr,
        };
        self.state.lock().account = Some(created.clone());
        Ok(created)
    }

    async fn fetch_contacts(&self, scope: UserScope) -> Result<Option<Vec<UserProfile>>> {
        self.enter(routes::CONTACTS, &scope).await?;
        Ok(self.state.lock().contacts.clone())
    }

    async fn fetch_users(&self, scope: UserScope) -> Result<Option<Vec<UserProfile>>> {
        self.enter(routes::ALL_USERS, &scope).await?;
        Ok(self.state.lock().users.clone())
    }

    async fn add_contact(&self, pair: ContactPair) -> Result<()> {
        self.enter(routes::ADD_CONTACT, &pair).await?;
        let mut state = self.state.lock();
        let already = state
            .contacts
            .iter()
            .flatten()
            .any(|c| c.user_id == pair.contact_id);
        let user = state
            .users
            .iter()
            .flatten()
            .find(|u| u.user_id == pair.contact_id)
            .cloned();
        match user {
            Some(user) if !already => {
                state.contacts.get_or_insert_with(Vec::new).push(user);
                Ok(())
            }
            _ => Err(Error::Http { route: routes::ADD_CONTACT, status: 400 }),
        }
    }

    async fn fetch_messages(&self, pair: ContactPair) -> Result<Option<Vec<ChatMessage>>> {
        self.enter(routes::MESSAGES, &pair).await?;
        let state = self.state.lock();
        Ok(state.messages.as_ref().map(|all| {
            all.iter()
                .filter(|m| {
                    (m.from == pair.user_id && m.to == pair.contact_id)
                        || (m.from == pair.contact_id && m.to == pair.user_id)
                })
                .cloned()
                .collect()
        }))
    }

    async fn submit_message(&self, message: ChatMessage) -> Result<()> {
        self.enter(routes::INCOMING, &message).await?;
        let stored = ChatMessage {
            local_id: None,
            ..message
        };
        self.state
            .lock()
            .messages
            .get_or_insert_with(Vec::new)
            .push(stored);
        Ok(())
    }
}
