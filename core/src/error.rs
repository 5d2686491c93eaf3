//! Error types for pollchat core

use thiserror::Error;

use crate::models::UserId;
use crate::network::routes;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error on /{route}: status {status}")]
    Http { route: &'static str, status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("No conversation selected")]
    NoConversation,

    #[error("User {0} is already a contact")]
    AlreadyContact(UserId),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Text of the one-shot alert shown to the user for this failure.
    pub fn notice(&self) -> String {
        match self {
            Error::Http { route: routes::LOGIN, .. } => {
                "Error logging in. Try different email/password or please try again later".into()
            }
            Error::Http { route: routes::REGISTER, .. } => {
                "Error creating an account. Try different email or please try again later".into()
            }
            Error::Http { route: routes::MESSAGES, .. } => "Error getting messages".into(),
            Error::Http { route: routes::CONTACTS, .. } => "Error getting contacts".into(),
            Error::Http { route: routes::ALL_USERS, .. } => "Error getting users".into(),
            Error::Http { route: routes::ADD_CONTACT, .. } => {
                "Error adding contact. They may already be in your contacts".into()
            }
            Error::Http { route, status } => format!("Request to /{} failed ({})", route, status),
            Error::Transport(_) => "Could not reach the server. Please try again later".into(),
            Error::AlreadyContact(_) => "That user is already in your contacts".into(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}
