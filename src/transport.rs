// src/transport.rs

use std::future::Future;

use log::debug;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};

use crate::error::CairnError;

/// One fully-described HTTP request, ready for a transport to execute.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// JSON bytes; `None` for body-less requests.
    pub body: Option<Vec<u8>>,
}

/// What came back: status plus the raw body bytes. Decoding happens in the
/// command layer, never in the transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// The network seam. The client is generic over this, so tests can inject a
/// scripted transport and assert on the requests the command layer builds.
pub trait Transport: Clone + Send + Sync + 'static {
    fn execute(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, CairnError>> + Send;
}

/// The reqwest-backed transport used by default.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            http_client: reqwest::Client::new(),
        }
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, CairnError> {
        let mut builder = self
            .http_client
            .request(request.method.clone(), &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        debug!(
            "[HttpTransport] {} {} -> {} ({} bytes)",
            request.method,
            request.url,
            status,
            body.len()
        );
        Ok(TransportResponse { status, body })
    }
}
