pub mod client;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod error;

// Re-export main types for convenience
pub use client::{Generation, GenerationParameters, HttpTransport, Transport};
pub use config::Config;
pub use controller::{RequestController, RequestState};
pub use conversation::{Conversation, Message, Role};
pub use error::{ConversationError, GenerationError};
