pub mod http_transport;
pub mod normalize;
pub mod prepared_request;

pub use http_transport::HttpTransport;
pub use normalize::{ChatCompletionsUrlNormalizer, UrlNormalizer};
pub use prepared_request::{compose_request, resolve_model, PreparedRequest};
