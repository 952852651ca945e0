//! Client for the First American / goEmerchant XML transaction gateway.
//!
//! Requests are flat key/value field lists posted as a `TRANSACTION`
//! document; replies are `RESPONSE` documents decoded into ordered field
//! maps. Batch operations (query, void, settle, credit) report one record per
//! transaction through numbered fields (`status1`, `status2`, …), which are
//! regrouped into a list of [`TransactionRecord`](multi::TransactionRecord)s.
//!
//! # Modules
//!
//! - [`xml`]: request encoding and reply decoding.
//! - [`response`]: [`Response`](response::Response) with typed accessors and error-text parsing.
//! - [`multi`]: regrouping of numbered fields into transaction records.
//! - [`operation`]: gateway operation names, batch reply layouts, batch request builder.
//! - [`transport`]: the [`Transport`](transport::Transport) seam and its `reqwest` implementation.
//! - [`gateway`]: the [`Gateway`](gateway::Gateway) client.
//! - [`config`]: endpoint and credential configuration.
//! - [`error`]: error types.
//!
//! A bad request (`status` of `0`) is not an `Err`: it is returned as a
//! [`Response`](response::Response) whose
//! [`missing_fields`](response::Response::missing_fields) and
//! [`invalid_fields`](response::Response::invalid_fields) explain the rejection.

pub mod config;
pub mod error;
pub mod gateway;
pub mod multi;
pub mod operation;
pub mod response;
pub mod transport;
pub mod xml;

pub use config::{CredentialSet, Credentials, GatewayConfig, TestCredentials};
pub use error::{ConfigError, GatewayError, TransportError, XmlError};
pub use gateway::Gateway;
pub use multi::{MultiRecordResponse, TransactionRecord};
pub use operation::{BatchFields, Operation};
pub use response::Response;
pub use transport::{HttpTransport, Transport};
