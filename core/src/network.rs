//! Network layer for pollchat - the backend seam and its HTTP implementation

use std::future::Future;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::*;

/// Backend routes, relative to the configured host and port.
pub mod routes {
    pub const LOGIN: &str = "login";
    pub const REGISTER: &str = "register";
    pub const CONTACTS: &str = "getcontacts";
    pub const ALL_USERS: &str = "allusers";
    pub const ADD_CONTACT: &str = "addcontact";
    pub const MESSAGES: &str = "getmessages";
    pub const INCOMING: &str = "incoming";
}

// ============================================================================
// Backend trait
// ============================================================================

/// Everything the sync engine asks of the server.
///
/// List fetches yield `None` when the server answers with `null` or an empty
/// body; callers decide what an absent list means.
pub trait Backend: Send + Sync + 'static {
    fn login(&self, req: LoginRequest) -> impl Future<Output = Result<UserProfile>> + Send;

    fn register(&self, req: RegisterRequest) -> impl Future<Output = Result<UserProfile>> + Send;

    fn fetch_contacts(
        &self,
        scope: UserScope,
    ) -> impl Future<Output = Result<Option<Vec<UserProfile>>>> + Send;

    fn fetch_users(
        &self,
        scope: UserScope,
    ) -> impl Future<Output = Result<Option<Vec<UserProfile>>>> + Send;

    fn add_contact(&self, pair: ContactPair) -> impl Future<Output = Result<()>> + Send;

    fn fetch_messages(
        &self,
        pair: ContactPair,
    ) -> impl Future<Output = Result<Option<Vec<ChatMessage>>>> + Send;

    /// Fire-and-forget from the caller's point of view; the result is only logged.
    fn submit_message(&self, message: ChatMessage) -> impl Future<Output = Result<()>> + Send;
}

// ============================================================================
// HTTP API Client
// ============================================================================

pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// POSTs `body` as JSON and returns the raw response text of a 2xx reply.
    async fn post<B: Serialize + Sync>(&self, route: &'static str, body: &B) -> Result<String> {
        let resp = self
            .client
            .post(self.config.route_url(route))
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(route, status = status.as_u16(), "Backend request failed");
            return Err(Error::Http {
                route,
                status: status.as_u16(),
            });
        }

        Ok(resp.text().await?)
    }
}

impl Backend for ApiClient {
    async fn login(&self, req: LoginRequest) -> Result<UserProfile> {
        let body = self.post(routes::LOGIN, &req).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn register(&self, req: RegisterRequest) -> Result<UserProfile> {
        let body = self.post(routes::REGISTER, &req).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_contacts(&self, scope: UserScope) -> Result<Option<Vec<UserProfile>>> {
        let body = self.post(routes::CONTACTS, &scope).await?;
        decode_list(&body)
    }

    async fn fetch_users(&self, scope: UserScope) -> Result<Option<Vec<UserProfile>>> {
        let body = self.post(routes::ALL_USERS, &scope).await?;
        decode_list(&body)
    }

    async fn add_contact(&self, pair: ContactPair) -> Result<()> {
        self.post(routes::ADD_CONTACT, &pair).await?;
        Ok(())
    }

    async fn fetch_messages(&self, pair: ContactPair) -> Result<Option<Vec<ChatMessage>>> {
        let body = self.post(routes::MESSAGES, &pair).await?;
        decode_list(&body)
    }

    async fn submit_message(&self, message: ChatMessage) -> Result<()> {
        self.post(routes::INCOMING, &message).await?;
        Ok(())
    }
}

/// Empty bodies and `null` both decode to `None`.
pub(crate) fn decode_list<T: DeserializeOwned>(body: &str) -> Result<Option<Vec<T>>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_list_null_and_empty() {
        assert_eq!(decode_list::<UserProfile>("null").unwrap(), None);
        assert_eq!(decode_list::<UserProfile>("").unwrap(), None);
        assert_eq!(decode_list::<UserProfile>("  \n").unwrap(), None);
    }

    #[test]
    fn test_decode_list_values() {
        let users: Option<Vec<UserProfile>> =
            decode_list(r#"[{"UserId":2,"Email":"b@x","Firstname":"B","Lastname":"X","Descr":""}]"#)
                .unwrap();
        assert_eq!(users.unwrap()[0].user_id, 2);
    }

    #[test]
    fn test_decode_list_rejects_garbage() {
        assert!(matches!(decode_list::<ChatMessage>("{oops"), Err(Error::Json(_))));
    }
}
