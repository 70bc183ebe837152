//! Record models stored in the document collections.
//!
//! Two concrete kinds exist: [`Like`] and [`User`]. Both implement [`Record`],
//! which gives the storage layer their collection name, identity, and
//! timestamp stamping without knowing the concrete type.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::id::RecordId;

/// Stable document field names, shared by filters and sorts.
pub mod fields {
    pub const ID: &str = "_id";
    pub const USER_ID: &str = "userId";
    pub const TARGET_ID: &str = "targetId";
    pub const TARGET_TYPE: &str = "targetType";
    pub const ASSOCIATED_ID: &str = "associatedId";
    pub const NICKNAME: &str = "nickname";
    pub const AVATAR_URL: &str = "avatarUrl";
    pub const MOTTO: &str = "motto";
    pub const UPDATE_AT: &str = "updateAt";
    pub const CREATE_AT: &str = "createAt";
}

/// A document-backed record with store-assigned identity.
///
/// `id` is `None` until the store assigns one; afterwards it never changes.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection this record kind lives in.
    const COLLECTION: &'static str;

    /// Identity, if assigned.
    fn id(&self) -> Option<RecordId>;

    /// Assigns identity. Only called when `id()` is `None`.
    fn set_id(&mut self, id: RecordId);

    /// Stamps the creation timestamp.
    fn set_created_at(&mut self, at: DateTime<Utc>);

    /// Stamps the last-update timestamp.
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// Kind of content a like points at.
///
/// Carried as the raw request value; only the notification table interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetType(pub i64);

impl TargetType {
    /// Like on a post.
    pub const POST: Self = Self(1);
}

impl From<i64> for TargetType {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A single like. `(user_id, target_id, target_type)` identifies at most one
/// active like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Like {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(rename = "userId", default)]
    pub user_id: String,
    #[serde(rename = "targetId", default)]
    pub target_id: String,
    #[serde(rename = "targetType")]
    pub target_type: TargetType,
    #[serde(rename = "associatedId", default, skip_serializing_if = "String::is_empty")]
    pub associated_id: String,
    #[serde(rename = "updateAt", default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<DateTime<Utc>>,
    #[serde(rename = "createAt", default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<DateTime<Utc>>,
}

impl Like {
    /// Creates an unsaved like for the given tuple.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        target_id: impl Into<String>,
        target_type: TargetType,
        associated_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            target_id: target_id.into(),
            target_type,
            associated_id: associated_id.into(),
            update_at: None,
            create_at: None,
        }
    }
}

impl Record for Like {
    const COLLECTION: &'static str = "like";

    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.create_at = Some(at);
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.update_at = Some(at);
    }
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(rename = "avatarUrl", default, skip_serializing_if = "String::is_empty")]
    pub avatar_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nickname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub motto: String,
    #[serde(rename = "updateAt", default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<DateTime<Utc>>,
    #[serde(rename = "createAt", default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<DateTime<Utc>>,
}

impl Record for User {
    const COLLECTION: &'static str = "user";

    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.create_at = Some(at);
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.update_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_serializes_with_store_field_names() {
        let mut like = Like::new("u1", "t1", TargetType::POST, "a1");
        like.set_id(RecordId::from_bytes([1; 12]));
        let json = serde_json::to_value(&like).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj[fields::ID], "010101010101010101010101");
        assert_eq!(obj[fields::USER_ID], "u1");
        assert_eq!(obj[fields::TARGET_ID], "t1");
        assert_eq!(obj[fields::TARGET_TYPE], 1);
        assert_eq!(obj[fields::ASSOCIATED_ID], "a1");
        assert!(!obj.contains_key(fields::CREATE_AT));
    }

    #[test]
    fn unsaved_user_omits_identity_and_empty_fields() {
        let user = User {
            nickname: "mochi".to_string(),
            ..User::default()
        };
        let json = serde_json::to_value(&user).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj[fields::NICKNAME], "mochi");
    }

    #[test]
    fn user_reads_back_timestamps() {
        let json = serde_json::json!({
            "_id": "0102030405060708090a0b0c",
            "nickname": "mochi",
            "createAt": "2024-03-01T08:00:00Z",
            "updateAt": "2024-03-02T08:00:00+08:00",
        });
        let user: User = serde_json::from_value(json).unwrap();
        assert_eq!(user.id.unwrap().to_hex(), "0102030405060708090a0b0c");
        assert_eq!(user.create_at.unwrap().to_rfc3339(), "2024-03-01T08:00:00+00:00");
        assert_eq!(user.update_at.unwrap().to_rfc3339(), "2024-03-02T00:00:00+00:00");
        assert!(user.motto.is_empty());
    }
}
