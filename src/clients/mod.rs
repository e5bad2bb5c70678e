//! # Hostinger API Clients
//!
//! - `errors`: error classification shared by every client
//! - `auth`: API key and OAuth authenticators, credential resolution
//! - `http`: authenticated HTTP client with bounded retries
//! - `instance`: VPS instance resource client

pub mod auth;
pub mod errors;
pub mod http;
pub mod instance;

pub use errors::{classify_error, ErrorKind, HostingerError};
pub use http::{ClientError, ClientFactory, HostingerClient, HttpClientConfig};
