//! Delivery of encoded requests to the gateway.
//!
//! [`Transport`] is the seam between request building and the network. The
//! [`HttpTransport`] implementation POSTs over `reqwest`; tests and callers
//! with their own HTTP stack can supply another implementation.

use http::header::CONTENT_TYPE;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::GatewayConfig;
use crate::error::TransportError;
use crate::response::RawResponse;

/// Content type the gateway expects on requests.
pub const XML_CONTENT_TYPE: &str = "text/xml; charset=UTF8";

/// Sends an encoded `TRANSACTION` document and returns the raw reply.
///
/// Implementations do not retry and do not interpret the body.
pub trait Transport {
    fn post_xml(
        &self,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

impl<T: Transport + Sync + Send> Transport for Arc<T> {
    fn post_xml(
        &self,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send {
        self.as_ref().post_xml(body)
    }
}

/// POSTs requests to a fixed gateway URL.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    url: Url,
    client: Client,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: None,
        }
    }

    /// Endpoint and timeout taken from `config`.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let transport = Self::new(config.api_url().clone());
        match config.timeout() {
            Some(timeout) => transport.with_timeout(timeout),
            None => transport,
        }
    }

    /// Replaces the underlying `reqwest` client, e.g. to share a connection pool.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Transport for HttpTransport {
    #[tracing::instrument(name = "fa_gateway.http.post_xml", skip_all, fields(url = %self.url), err)]
    async fn post_xml(&self, body: Vec<u8>) -> Result<RawResponse, TransportError> {
        const CONTEXT: &str = "POST xmlgateway";

        let mut request = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let http_response = request.send().await.map_err(|source| TransportError::Http {
            context: CONTEXT,
            source,
        })?;

        let status = http_response.status();
        if !status.is_success() {
            let body = http_response
                .text()
                .await
                .map_err(|source| TransportError::ResponseBodyRead {
                    context: CONTEXT,
                    source,
                })?;
            return Err(TransportError::HttpStatus {
                context: CONTEXT,
                status,
                body,
            });
        }

        let headers = http_response.headers().clone();
        let body = http_response
            .bytes()
            .await
            .map_err(|source| TransportError::ResponseBodyRead {
                context: CONTEXT,
                source,
            })?;
        tracing::debug!(%status, bytes = body.len(), "Gateway reply received");
        Ok(RawResponse::new(status, headers, body.to_vec()))
    }
}
