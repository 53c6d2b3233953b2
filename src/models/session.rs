use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::token::AccessToken;

/// The user profile returned by the backend.
///
/// Only the fields the client itself looks at are modelled; everything else
/// (balances, account numbers, flags) is kept in `attributes` and written
/// back untouched when the session is persisted.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(from = "RawUserProfile")]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub attributes: HashMap<String, Value>,
}

// The backend may send `_id`, `id` or both; `id` wins when both are present.
#[derive(Deserialize)]
struct RawUserProfile {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "_id")]
    object_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(flatten)]
    attributes: HashMap<String, Value>,
}

impl From<RawUserProfile> for UserProfile {
    fn from(raw: RawUserProfile) -> Self {
        UserProfile {
            id: raw.id.or(raw.object_id),
            name: raw.name,
            email: raw.email,
            role: raw.role,
            attributes: raw.attributes,
        }
    }
}

/// The client-side session: who is signed in and with which token.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Session {
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default, deserialize_with = "token_or_none")]
    pub token: Option<AccessToken>,
}

impl Session {
    pub fn new(user: Option<UserProfile>, token: Option<AccessToken>) -> Self {
        Session { user, token }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// The envelope written to persisted storage: `{"state": {...}, "version": 0}`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PersistedSession {
    pub state: Session,
    #[serde(default)]
    pub version: u32,
}

// Older entries store a blank string instead of null after logout.
fn token_or_none<'de, D>(deserializer: D) -> Result<Option<AccessToken>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(AccessToken::new))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_keeps_unknown_fields() {
        let raw = r#"{
            "_id": "u-1",
            "name": "Ada",
            "email": "ada@example.com",
            "role": "admin",
            "balance": 1520.75,
            "accountNumber": "0042"
        }"#;
        let profile: UserProfile = serde_json::from_str(raw).unwrap();

        assert_eq!(profile.id.as_deref(), Some("u-1"));
        assert_eq!(profile.role.as_deref(), Some("admin"));
        assert_eq!(profile.attributes["balance"], serde_json::json!(1520.75));

        let written = serde_json::to_value(&profile).unwrap();
        assert_eq!(written["accountNumber"], "0042");
    }

    #[test]
    fn test_profile_accepts_both_id_keys() {
        let raw = r#"{"_id": "65f0c2", "id": "65f0c2", "name": "Ada"}"#;
        let profile: UserProfile = serde_json::from_str(raw).unwrap();

        assert_eq!(profile.id.as_deref(), Some("65f0c2"));
        assert!(profile.attributes.is_empty());

        let written = serde_json::to_value(&profile).unwrap();
        assert_eq!(written["id"], "65f0c2");
        assert!(written.get("_id").is_none());
    }

    #[test]
    fn test_persisted_envelope_parses() {
        let raw = r#"{"state": {"token": "abc", "user": {"name": "Ada"}}, "version": 0}"#;
        let persisted: PersistedSession = serde_json::from_str(raw).unwrap();

        assert_eq!(persisted.state.token.unwrap().as_str(), "abc");
        assert_eq!(persisted.state.user.unwrap().name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_blank_token_reads_as_signed_out() {
        let raw = r#"{"state": {"token": "", "user": null}}"#;
        let persisted: PersistedSession = serde_json::from_str(raw).unwrap();
        assert!(!persisted.state.is_authenticated());
    }
}
