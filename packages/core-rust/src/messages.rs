//! Request and response payloads for the like and user operations, plus the
//! notification published on the message bus.

use serde::{Deserialize, Serialize};

use crate::pagination::PaginationOptions;
use crate::types::TargetType;

// ---------------------------------------------------------------------------
// Likes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoLikeReq {
    pub user_id: String,
    pub target_id: String,
    pub target_type: TargetType,
    pub associated_id: String,
    /// Owner of the liked content; receives the notification.
    pub liked_user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoLikeResp {
    /// State of the tuple after the toggle.
    pub liked: bool,
    pub get_fish: bool,
    pub get_fish_times: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserLikedReq {
    pub user_id: String,
    pub target_id: String,
    pub target_type: TargetType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserLikedResp {
    pub liked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTargetLikesReq {
    pub target_id: String,
    pub target_type: TargetType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTargetLikesResp {
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserLikesReq {
    pub user_id: String,
    pub target_type: TargetType,
    #[serde(default)]
    pub pagination: PaginationOptions,
}

/// Projection of a like returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikePreview {
    pub target_id: String,
    pub associated_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserLikesResp {
    pub likes: Vec<LikePreview>,
    pub total: i64,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLikedUsersReq {
    pub target_id: String,
    pub target_type: TargetType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLikedUsersResp {
    pub user_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreview {
    pub id: String,
    pub avatar_url: String,
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetail {
    pub id: String,
    pub avatar_url: String,
    pub nickname: String,
    pub motto: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserReq {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserResp {
    pub user: UserPreview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserDetailReq {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserDetailResp {
    pub user: UserDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserReq {
    /// Empty fields are left untouched.
    pub user: UserDetail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserResp {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchUserReq {
    pub nickname: String,
    #[serde(default)]
    pub pagination: PaginationOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchUserResp {
    pub users: Vec<UserPreview>,
    pub total: i64,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInReq {
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInResp {
    pub get_fish: bool,
    pub get_fish_times: i64,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Notification categories understood by the notification consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum NotificationType {
    LikePost = 1,
    LikeMoment = 2,
    LikeComment = 3,
    LikeUser = 4,
}

impl NotificationType {
    /// Maps a like target type onto a notification type.
    ///
    /// Returns `None` for target types that never notify.
    #[must_use]
    pub fn for_like(target_type: TargetType) -> Option<Self> {
        match target_type.0 {
            1 => Some(Self::LikePost),
            2 => Some(Self::LikeComment),
            4 => Some(Self::LikeMoment),
            6 => Some(Self::LikeUser),
            _ => None,
        }
    }
}

impl From<NotificationType> for i64 {
    fn from(value: NotificationType) -> Self {
        value as i64
    }
}

impl TryFrom<i64> for NotificationType {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::LikePost),
            2 => Ok(Self::LikeMoment),
            3 => Ok(Self::LikeComment),
            4 => Ok(Self::LikeUser),
            other => Err(format!("unknown notification type {other}")),
        }
    }
}

/// Payload published on the notification topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub target_user_id: String,
    pub source_user_id: String,
    pub source_content_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub text: String,
    pub is_read: bool,
}

impl Notification {
    /// Builds the notification for a new like, or `None` if its target type
    /// does not notify.
    #[must_use]
    pub fn for_like(req: &DoLikeReq) -> Option<Self> {
        let kind = NotificationType::for_like(req.target_type)?;
        Some(Self {
            target_user_id: req.liked_user_id.clone(),
            source_user_id: req.user_id.clone(),
            source_content_id: req.target_id.clone(),
            kind,
            text: String::new(),
            is_read: false,
        })
    }
}
