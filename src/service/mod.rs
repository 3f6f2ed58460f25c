//! Application services used by the HTTP layer

pub mod cache;
pub mod chat;
pub mod error;

pub use cache::AdapterCache;
pub use chat::{ChatReply, ChatService, SendMessage};
pub use error::{ServiceError, ServiceResult};
