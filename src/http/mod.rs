pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod types;

// Re-export commonly used types for convenient access
pub use client::{HttpClient, Transport};
pub use error::{TransportError, TransportErrorKind};
pub use request::{DEFAULT_TIMEOUT, HttpRequest};
pub use response::HttpResponse;
pub use types::Method;
