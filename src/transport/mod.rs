//! Outbound HTTP plumbing shared by every provider adapter.

pub mod http;

pub use http::{remote_message, Auth, HttpTransport, TransportError};
