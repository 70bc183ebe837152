//! Domain services. Every public operation runs under its caller's
//! [`OperationContext`](crate::context::OperationContext).

pub mod like;
pub mod user;

pub use like::LikeService;
pub use user::UserService;
