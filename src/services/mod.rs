pub mod cookies;
pub mod credentials;
mod http;

pub use credentials::{classify_status, Attempt, CredentialQueue, FailureClass};
pub use http::build_client;
