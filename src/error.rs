//! Error types for the gateway client.
//!
//! Only structural failures are errors here: malformed XML, a failed HTTP
//! round-trip, or an unreadable configuration file. A gateway reply with
//! `status == 0` is a successful call carrying domain error data; see
//! [`Response::was_request_bad`](crate::response::Response::was_request_bad).

use http::StatusCode;
use std::path::PathBuf;

/// Errors raised while encoding or decoding gateway XML.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("Malformed XML: {context}: {source}")]
    Malformed {
        context: &'static str,
        #[source]
        source: quick_xml::Error,
    },
    #[error("Invalid UTF-8 in XML: {context}: {source}")]
    Utf8 {
        context: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("Unexpected end of XML document: {0}")]
    UnexpectedEof(&'static str),
    #[error("XML document has no root element")]
    NoRoot,
    #[error("Content outside the root element: {0}")]
    OutsideRoot(&'static str),
    #[error("Failed to write XML: {0}")]
    Write(#[from] std::io::Error),
}

impl From<quick_xml::Error> for XmlError {
    fn from(source: quick_xml::Error) -> Self {
        XmlError::Malformed {
            context: "read",
            source,
        }
    }
}

/// Errors raised by a [`Transport`](crate::transport::Transport) implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors returned from [`Gateway`](crate::gateway::Gateway) calls.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Xml(#[from] XmlError),
}

/// Errors raised while loading a [`GatewayConfig`](crate::config::GatewayConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to resolve config path {0}: {1}")]
    PathResolve(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}
