//! Pawprint Server: cache-aside like and user records, cursor pagination over
//! the document store and the search index, and streak-based rewards.

pub mod config;
pub mod context;
pub mod error;
pub mod fanout;
pub mod mapper;
pub mod notify;
pub mod pagination;
pub mod service;
pub mod storage;
pub mod streak;
pub mod telemetry;

pub use config::{ServiceArgs, ServiceConfig};
pub use context::OperationContext;
pub use error::{ServiceError, StoreError, StoreResult};
pub use service::{Backends, Services};
