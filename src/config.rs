// src/config.rs

use std::collections::HashMap;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{run_blocking, CairnClient};
use crate::command::Endpoint;
use crate::error::CairnError;
use crate::storage::CURRENT_CONFIG_KEY;
use crate::transport::Transport;

/// The server's key-value configuration. The wire shape nests everything
/// under a `params` key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct CairnConfig {
    /// A map of parameter names to their values.
    pub params: HashMap<String, Value>,
}

impl CairnConfig {
    /// Retrieves one parameter, decoded into the requested type. `None`
    /// when the key is absent or holds a value of another shape.
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.params
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

#[derive(Debug, Deserialize)]
struct UpdateConfigResponse {
    result: bool,
}

impl<T: Transport> CairnClient<T> {
    /// Fetches the server configuration and caches it as the current
    /// config.
    pub async fn fetch_config(&self) -> Result<CairnConfig, CairnError> {
        let config: CairnConfig = self
            .request_with_params(Method::GET, Endpoint::Config, &[], false)
            .await?;
        self.store()
            .set(CURRENT_CONFIG_KEY, serde_json::to_value(&config)?);
        Ok(config)
    }

    /// Blocking [`CairnClient::fetch_config`]. Must not be called from an
    /// async context.
    pub fn fetch_config_blocking(&self) -> Result<CairnConfig, CairnError> {
        run_blocking(self.fetch_config())?
    }

    /// Runs [`CairnClient::fetch_config`] on the ambient runtime and hands
    /// the result to `callback`.
    pub fn fetch_config_with_callback<F>(&self, callback: F)
    where
        F: FnOnce(Result<CairnConfig, CairnError>) + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            callback(client.fetch_config().await);
        });
    }

    /// The cached current configuration, if a fetch has completed since the
    /// store was last cleared.
    pub fn current_config(&self) -> Result<Option<CairnConfig>, CairnError> {
        match self.store().get(CURRENT_CONFIG_KEY) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Updates configuration parameters. Requires the master key. Returns
    /// the server's confirmation and folds the written parameters into the
    /// cached config.
    ///
    /// # Arguments
    /// * `params`: The parameters to change. Unmentioned parameters keep
    ///   their values.
    pub async fn update_config(
        &self,
        params: &HashMap<String, Value>,
    ) -> Result<bool, CairnError> {
        if params.is_empty() {
            return Err(CairnError::InvalidInput(
                "config update needs at least one parameter".to_string(),
            ));
        }
        let body = serde_json::json!({ "params": params });
        let response: UpdateConfigResponse = self
            .request(Method::PUT, Endpoint::Config, Some(&body), true)
            .await?;
        if response.result {
            let mut config = self.current_config()?.unwrap_or_default();
            for (key, value) in params {
                config.params.insert(key.clone(), value.clone());
            }
            self.store()
                .set(CURRENT_CONFIG_KEY, serde_json::to_value(&config)?);
        }
        Ok(response.result)
    }

    /// Blocking [`CairnClient::update_config`]. Must not be called from an
    /// async context.
    pub fn update_config_blocking(
        &self,
        params: &HashMap<String, Value>,
    ) -> Result<bool, CairnError> {
        run_blocking(self.update_config(params))?
    }

    /// Runs [`CairnClient::update_config`] on the ambient runtime and hands
    /// the result to `callback`.
    pub fn update_config_with_callback<F>(&self, params: HashMap<String, Value>, callback: F)
    where
        F: FnOnce(Result<bool, CairnError>) + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            callback(client.update_config(&params).await);
        });
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_decodes_into_the_requested_type() {
        let config: CairnConfig = serde_json::from_value(json!({
            "params": {"welcomeMessage": "hello", "maxPlayers": 4}
        }))
        .unwrap();
        assert_eq!(config.get::<String>("welcomeMessage").as_deref(), Some("hello"));
        assert_eq!(config.get::<i64>("maxPlayers"), Some(4));
        assert_eq!(config.get::<i64>("welcomeMessage"), None);
        assert_eq!(config.get::<i64>("absent"), None);
    }

    #[test]
    fn test_update_wire_shapes() {
        let response: UpdateConfigResponse = serde_json::from_value(json!({"result": true})).unwrap();
        assert!(response.result);
    }

    #[test]
    fn test_current_config_starts_empty() {
        let client = CairnClient::new("http://localhost:1337/api", "appId", None, None).unwrap();
        assert_eq!(client.current_config().unwrap(), None);
    }
}
