// src/client.rs

use std::future::Future;
use std::sync::{Arc, RwLock};

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::command::{body_snippet, process_response, Endpoint};
use crate::error::CairnError;
use crate::storage::{LocalStore, MemoryStore};
use crate::transport::{HttpTransport, Transport, TransportRequest};

pub(crate) const HEADER_APP_ID: &str = "X-Cairn-Application-Id";
pub(crate) const HEADER_CLIENT_KEY: &str = "X-Cairn-Client-Key";
pub(crate) const HEADER_MASTER_KEY: &str = "X-Cairn-Master-Key";
pub(crate) const HEADER_SESSION_TOKEN: &str = "X-Cairn-Session-Token";

/// The main client for interacting with a Cairn server instance.
///
/// `CairnClient` holds the server URL, the application credentials and the
/// shared session/cache state. It is cheap to clone; clones share the session
/// token and the local store. The client is generic over its [`Transport`],
/// so tests can substitute a scripted transport for the HTTP one.
///
/// # Initialization
///
/// ```rust,no_run
/// use cairn_rs::CairnClient;
///
/// # fn main() -> Result<(), cairn_rs::CairnError> {
/// let client = CairnClient::new(
///     "http://localhost:1337/cairn",
///     "myAppId",
///     None,                 // client_key
///     Some("myMasterKey"),  // master_key
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CairnClient<T: Transport = HttpTransport> {
    server_url: String,
    app_id: String,
    client_key: Option<String>,
    master_key: Option<String>,
    transport: T,
    state: Arc<ClientState>,
}

struct ClientState {
    session_token: RwLock<Option<String>>,
    store: Arc<dyn LocalStore>,
}

impl CairnClient {
    /// Creates a new client over the default HTTP transport.
    ///
    /// # Arguments
    ///
    /// * `server_url`: The full base URL of the API mount, for example
    ///   `"http://localhost:1337/cairn"`. A trailing slash is stripped.
    /// * `app_id`: The application id, sent as a header with every request.
    /// * `client_key`: Optional. Sent when no session token or master key
    ///   applies to a request.
    /// * `master_key`: Optional. Needed for privileged operations
    ///   (aggregate/distinct queries, config updates); when configured it is
    ///   also the default credential for unauthenticated requests.
    pub fn new(
        server_url: &str,
        app_id: &str,
        client_key: Option<&str>,
        master_key: Option<&str>,
    ) -> Result<Self, CairnError> {
        Self::with_transport(
            server_url,
            app_id,
            client_key,
            master_key,
            HttpTransport::new(),
        )
    }
}

impl<T: Transport> CairnClient<T> {
    /// Creates a client over a caller-supplied transport. Everything else is
    /// identical to [`CairnClient::new`].
    pub fn with_transport(
        server_url: &str,
        app_id: &str,
        client_key: Option<&str>,
        master_key: Option<&str>,
        transport: T,
    ) -> Result<Self, CairnError> {
        let trimmed = server_url.trim_end_matches('/');
        let parsed = Url::parse(trimmed)?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(CairnError::InvalidUrl(format!(
                    "unsupported scheme '{}' in server URL '{}'",
                    other, server_url
                )))
            }
        }
        if app_id.is_empty() {
            return Err(CairnError::InvalidInput(
                "application id must not be empty".to_string(),
            ));
        }
        Ok(CairnClient {
            server_url: trimmed.to_string(),
            app_id: app_id.to_string(),
            client_key: client_key.map(str::to_string),
            master_key: master_key.map(str::to_string),
            transport,
            state: Arc::new(ClientState {
                session_token: RwLock::new(None),
                store: Arc::new(MemoryStore::new()),
            }),
        })
    }

    /// Replaces the local store backing the current user/installation/config
    /// caches. Call right after construction, before any state is written;
    /// existing clones keep the old state.
    pub fn with_store(self, store: Arc<dyn LocalStore>) -> Self {
        let token = self.session_token();
        CairnClient {
            state: Arc::new(ClientState {
                session_token: RwLock::new(token),
                store,
            }),
            ..self
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// The session token currently attached to requests, if any.
    pub fn session_token(&self) -> Option<String> {
        self.state
            .session_token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn set_session_token(&self, token: Option<String>) {
        *self
            .state
            .session_token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }

    pub(crate) fn store(&self) -> &Arc<dyn LocalStore> {
        &self.state.store
    }

    /// The path portion of the server URL (for example `/cairn`), prefixed
    /// onto batch sub-request paths.
    pub(crate) fn mount_path(&self) -> String {
        Url::parse(&self.server_url)
            .map(|url| url.path().trim_end_matches('/').to_string())
            .unwrap_or_default()
    }

    /// Assembles the headers for one request. Exactly one credential header
    /// accompanies the application id: the master key when forced, else the
    /// session token, else the master key when configured, else the client
    /// key.
    fn build_headers(&self, use_master_key: bool, has_body: bool) -> Result<HeaderMap, CairnError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HEADER_APP_ID,
            HeaderValue::from_str(&self.app_id).map_err(CairnError::InvalidHeaderValue)?,
        );
        if has_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if use_master_key {
            let master = self.master_key.as_deref().ok_or_else(|| {
                log::warn!("Master key requested for operation but not configured.");
                CairnError::MasterKeyRequired(
                    "this operation needs a master key but none is configured".to_string(),
                )
            })?;
            headers.insert(
                HEADER_MASTER_KEY,
                HeaderValue::from_str(master).map_err(CairnError::InvalidHeaderValue)?,
            );
        } else if let Some(token) = self.session_token() {
            headers.insert(
                HEADER_SESSION_TOKEN,
                HeaderValue::from_str(&token).map_err(CairnError::InvalidHeaderValue)?,
            );
        } else if let Some(master) = &self.master_key {
            headers.insert(
                HEADER_MASTER_KEY,
                HeaderValue::from_str(master).map_err(CairnError::InvalidHeaderValue)?,
            );
        } else if let Some(client_key) = &self.client_key {
            headers.insert(
                HEADER_CLIENT_KEY,
                HeaderValue::from_str(client_key).map_err(CairnError::InvalidHeaderValue)?,
            );
        }
        Ok(headers)
    }

    /// Serializes `body`, executes the request and decodes the response. All
    /// command-layer traffic funnels through here or
    /// [`CairnClient::request_with_params`].
    pub(crate) async fn request<B, R>(
        &self,
        method: Method,
        endpoint: Endpoint,
        body: Option<&B>,
        use_master_key: bool,
    ) -> Result<R, CairnError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.server_url, endpoint.url_component());
        let body_bytes = match body {
            Some(value) => Some(serde_json::to_vec(value)?),
            None => None,
        };
        let headers = self.build_headers(use_master_key, body_bytes.is_some())?;
        if let Some(bytes) = &body_bytes {
            debug!(
                "[CairnClient] {} {} body: {}",
                method,
                url,
                body_snippet(bytes)
            );
        } else {
            debug!("[CairnClient] {} {}", method, url);
        }
        let response = self
            .transport
            .execute(TransportRequest {
                method,
                url,
                headers,
                body: body_bytes,
            })
            .await?;
        process_response(response.status, &response.body)
    }

    /// Body-less request with URL query parameters (object fetches with
    /// `include`).
    pub(crate) async fn request_with_params<R>(
        &self,
        method: Method,
        endpoint: Endpoint,
        params: &[(String, String)],
        use_master_key: bool,
    ) -> Result<R, CairnError>
    where
        R: DeserializeOwned,
    {
        let mut url = Url::parse(&format!("{}{}", self.server_url, endpoint.url_component()))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        let headers = self.build_headers(use_master_key, false)?;
        let url = url.to_string();
        debug!("[CairnClient] {} {}", method, url);
        let response = self
            .transport
            .execute(TransportRequest {
                method,
                url,
                headers,
                body: None,
            })
            .await?;
        process_response(response.status, &response.body)
    }
}

/// Runs a future to completion on a throwaway runtime. Backs the
/// `*_blocking` calling convention; must not be invoked from inside an async
/// context (the runtime refuses to nest).
pub(crate) fn run_blocking<F: Future>(future: F) -> Result<F::Output, CairnError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CairnError::Runtime(format!("failed to start blocking runtime: {}", e)))?;
    Ok(runtime.block_on(future))
}
