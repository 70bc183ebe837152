//! Per-collection mappers composing the cache-aside store, paginators, and
//! search index for a single record kind.

pub mod like;
pub mod user;

pub use like::{FilterOptions, LikeMapper};
pub use user::UserMapper;
