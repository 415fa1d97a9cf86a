pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod stream;
pub mod transport;

pub use client::{
    CallParams, ChatClient, DefaultLocalizer, HistoryStore, Localizer, MemoryHistoryStore,
    MessageKey, StreamOptions, StreamingCall, UpdateCallback,
};
pub use error::ChatError;
pub use protocol::canonical::{AccumulatedMessage, Message, MessageContent, Role, WebpageInfo};
pub use protocol::ProviderProfile;
