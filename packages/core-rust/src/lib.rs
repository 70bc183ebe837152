//! Pawprint Core: record identity, like/user models, cursor pagination tokens,
//! streak calendar rules, and request/response messages.

pub mod calendar;
pub mod id;
pub mod messages;
pub mod pagination;
pub mod types;

pub use calendar::StreakWindow;
pub use id::{IdError, RecordId};
pub use pagination::{
    Direction, PageRequest, PageToken, PaginationOptions, SortKey, Sorter, TokenError,
};
pub use types::{fields, Like, Record, TargetType, User};
