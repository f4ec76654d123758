pub mod config;
pub mod conversation;
pub mod demo;
pub mod error;
pub mod providers;
pub mod session;
pub mod tokens;
pub mod trim;

pub use conversation::Conversation;
pub use error::ChatError;
pub use providers::{Message, Role};
pub use session::{Session, SessionHandle, SessionStore};
pub use tokens::{ApproxTokenCounter, TokenCounter};
pub use trim::{TrimConfig, TrimStrategy, trim};
