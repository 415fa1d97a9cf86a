pub mod decoder;
pub mod dispatcher;
pub mod guard;
pub mod sse;

pub use decoder::{DecoderState, StreamDecoder};
pub use dispatcher::{DispatchAction, UpdateDispatcher, DEFAULT_UPDATE_INTERVAL};
pub use guard::{GuardVerdict, MisfiledReasoningGuard};
pub use sse::SseLineBuffer;
