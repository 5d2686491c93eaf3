//! Data models for pollchat
//!
//! Field names follow the backend's JSON (PascalCase), so every wire type
//! carries `rename_all = "PascalCase"`.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Server-assigned user identifier.
pub type UserId = i64;

// ============================================================================
// Users
// ============================================================================

/// A user as the backend describes one. Used for the logged-in identity,
/// for contacts and for the user directory alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserProfile {
    pub user_id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub descr: String,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }

    /// Concatenation the directory search matches against.
    pub fn search_key(&self) -> String {
        format!("{}{}{}", self.firstname, self.lastname, self.email)
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatMessage {
    pub from: UserId,
    pub to: UserId,
    pub message: String,
    pub timestamp: String,
    #[serde(deserialize_with = "lenient_bool", default)]
    pub acked: bool,
    /// Set on entries inserted locally before any fetch has echoed them.
    #[serde(skip)]
    pub local_id: Option<Uuid>,
}

impl ChatMessage {
    /// Builds an optimistic outgoing entry, tagged as pending.
    pub fn outgoing(from: UserId, to: UserId, text: &str, timestamp: String) -> Self {
        Self {
            from,
            to,
            message: text.to_string(),
            timestamp,
            acked: true,
            local_id: Some(Uuid::new_v4()),
        }
    }

    pub fn is_outgoing(&self, current_user: UserId) -> bool {
        self.from == current_user
    }

    pub fn is_pending(&self) -> bool {
        self.local_id.is_some()
    }
}

/// The backend echoes `Acked` as an integer; accept either form.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrInt {
        Bool(bool),
        Int(i64),
    }

    Ok(match BoolOrInt::deserialize(deserializer)? {
        BoolOrInt::Bool(b) => b,
        BoolOrInt::Int(i) => i != 0,
    })
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    pub descr: String,
}

/// Body of the contact and directory listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserScope {
    pub user_id: UserId,
}

/// Body of add-contact and message fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContactPair {
    pub user_id: UserId,
    pub contact_id: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_wire_names() {
        let json = r#"{"UserId":3,"Email":"a@b.c","Firstname":"Ada","Lastname":"L","Descr":"hi"}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.user_id, 3);
        assert_eq!(profile.display_name(), "Ada L");
        assert_eq!(profile.search_key(), "AdaLa@b.c");
    }

    #[test]
    fn test_profile_missing_fields_default() {
        let profile: UserProfile = serde_json::from_str(r#"{"UserId":9}"#).unwrap();
        assert_eq!(profile.email, "");
        assert_eq!(profile.descr, "");
    }

    #[test]
    fn test_acked_accepts_int_and_bool() {
        let m: ChatMessage = serde_json::from_str(
            r#"{"From":1,"To":2,"Message":"x","Timestamp":"9:05","Acked":1}"#,
        )
        .unwrap();
        assert!(m.acked);
        assert!(!m.is_pending());

        let m: ChatMessage = serde_json::from_str(
            r#"{"From":1,"To":2,"Message":"x","Timestamp":"9:05","Acked":false}"#,
        )
        .unwrap();
        assert!(!m.acked);
    }

    #[test]
    fn test_outgoing_serializes_without_local_id() {
        let m = ChatMessage::outgoing(1, 2, "hi", "9:05".into());
        assert!(m.is_pending());
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"From":1,"To":2,"Message":"hi","Timestamp":"9:05","Acked":true})
        );
    }

    #[test]
    fn test_contact_pair_body() {
        let body = serde_json::to_value(ContactPair { user_id: 1, contact_id: 5 }).unwrap();
        assert_eq!(body, serde_json::json!({"UserId":1,"ContactId":5}));
    }
}
