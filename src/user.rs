// src/user.rs

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::client::{run_blocking, CairnClient};
use crate::command::Endpoint;
use crate::error::CairnError;
use crate::object::{merge_saved, save_map, CairnObject};
use crate::storage::CURRENT_USER_KEY;
use crate::transport::Transport;

/// An object in the `_User` class.
///
/// Implementors should carry a `sessionToken` field: signup and login
/// responses deliver the token through it, and [`CairnClient::log_in`]
/// adopts it for subsequent requests.
///
/// # Examples
///
/// ```rust,no_run
/// use cairn_rs::{CairnObject, CairnUser};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct User {
///     #[serde(rename = "objectId", skip_serializing_if = "Option::is_none")]
///     object_id: Option<String>,
///     username: String,
///     #[serde(skip_serializing_if = "Option::is_none")]
///     email: Option<String>,
///     #[serde(rename = "sessionToken", skip_serializing_if = "Option::is_none")]
///     session_token: Option<String>,
/// }
///
/// impl CairnObject for User {
///     fn class_name() -> &'static str {
///         "_User"
///     }
///     fn object_id(&self) -> Option<&str> {
///         self.object_id.as_deref()
///     }
/// }
///
/// impl CairnUser for User {
///     fn username(&self) -> &str {
///         &self.username
///     }
///     fn session_token(&self) -> Option<&str> {
///         self.session_token.as_deref()
///     }
/// }
/// ```
pub trait CairnUser: CairnObject {
    fn username(&self) -> &str;

    /// The session token the server issued for this user, if any.
    fn session_token(&self) -> Option<&str>;
}

#[derive(Serialize, Debug)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize, Debug)]
struct PasswordResetRequest<'a> {
    email: &'a str,
}

impl<T: Transport> CairnClient<T> {
    fn adopt_user<U: CairnUser>(&self, user: &U) -> Result<(), CairnError> {
        let token = user.session_token().ok_or_else(|| {
            CairnError::InvalidSessionToken("user carries no session token".to_string())
        })?;
        self.set_session_token(Some(token.to_string()));
        self.store().set(CURRENT_USER_KEY, serde_json::to_value(user)?);
        Ok(())
    }

    /// Authenticates against the server. On success the returned user's
    /// session token is adopted for subsequent requests and the user is
    /// cached as the current user.
    ///
    /// # Arguments
    /// * `username`: The name the user signed up with.
    /// * `password`: The user's password, sent in the request body.
    pub async fn log_in<U: CairnUser>(
        &self,
        username: &str,
        password: &str,
    ) -> Result<U, CairnError> {
        let body = LoginRequest { username, password };
        let user: U = self
            .request(Method::POST, Endpoint::Login, Some(&body), false)
            .await?;
        self.adopt_user(&user)?;
        Ok(user)
    }

    /// Blocking [`CairnClient::log_in`]. Must not be called from an async
    /// context.
    pub fn log_in_blocking<U: CairnUser>(
        &self,
        username: &str,
        password: &str,
    ) -> Result<U, CairnError> {
        run_blocking(self.log_in(username, password))?
    }

    /// Runs [`CairnClient::log_in`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn log_in_with_callback<U, F>(&self, username: &str, password: &str, callback: F)
    where
        U: CairnUser,
        F: FnOnce(Result<U, CairnError>) + Send + 'static,
    {
        let client = self.clone();
        let username = username.to_string();
        let password = password.to_string();
        tokio::spawn(async move {
            callback(client.log_in(&username, &password).await);
        });
    }

    /// Registers `user` as a new account. The password travels only in the
    /// request body; the returned user carries the session token the server
    /// opened, which is adopted as for [`CairnClient::log_in`].
    pub async fn sign_up<U: CairnUser>(&self, user: &U, password: &str) -> Result<U, CairnError> {
        let mut body = save_map(user)?;
        body.insert("password".to_string(), Value::String(password.to_string()));
        let response: Value = self
            .request(
                Method::POST,
                Endpoint::class("_User"),
                Some(&Value::Object(body)),
                false,
            )
            .await?;
        let created: U = merge_saved(user, response)?;
        self.adopt_user(&created)?;
        Ok(created)
    }

    /// Blocking [`CairnClient::sign_up`]. Must not be called from an async
    /// context.
    pub fn sign_up_blocking<U: CairnUser>(&self, user: &U, password: &str) -> Result<U, CairnError> {
        run_blocking(self.sign_up(user, password))?
    }

    /// Runs [`CairnClient::sign_up`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn sign_up_with_callback<U, F>(&self, user: &U, password: &str, callback: F)
    where
        U: CairnUser,
        F: FnOnce(Result<U, CairnError>) + Send + 'static,
    {
        let client = self.clone();
        let user = user.clone();
        let password = password.to_string();
        tokio::spawn(async move {
            callback(client.sign_up(&user, &password).await);
        });
    }

    /// Ends the current session. The session token and cached current user
    /// are dropped even when the server rejects the call; the server's
    /// verdict is still returned.
    pub async fn log_out(&self) -> Result<(), CairnError> {
        let result: Result<Value, CairnError> = self
            .request(Method::POST, Endpoint::Logout, None::<&Value>, false)
            .await;
        self.set_session_token(None);
        self.store().delete(CURRENT_USER_KEY);
        result.map(|_| ())
    }

    /// Blocking [`CairnClient::log_out`]. Must not be called from an async
    /// context.
    pub fn log_out_blocking(&self) -> Result<(), CairnError> {
        run_blocking(self.log_out())?
    }

    /// Runs [`CairnClient::log_out`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn log_out_with_callback<F>(&self, callback: F)
    where
        F: FnOnce(Result<(), CairnError>) + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            callback(client.log_out().await);
        });
    }

    /// Asks the server to mail a password reset link to `email`.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), CairnError> {
        let body = PasswordResetRequest { email };
        let _: Value = self
            .request(Method::POST, Endpoint::PasswordReset, Some(&body), false)
            .await?;
        Ok(())
    }

    /// Blocking [`CairnClient::request_password_reset`]. Must not be called
    /// from an async context.
    pub fn request_password_reset_blocking(&self, email: &str) -> Result<(), CairnError> {
        run_blocking(self.request_password_reset(email))?
    }

    /// Runs [`CairnClient::request_password_reset`] on the ambient runtime
    /// and hands the result to `callback`.
    pub fn request_password_reset_with_callback<F>(&self, email: &str, callback: F)
    where
        F: FnOnce(Result<(), CairnError>) + Send + 'static,
    {
        let client = self.clone();
        let email = email.to_string();
        tokio::spawn(async move {
            callback(client.request_password_reset(&email).await);
        });
    }

    /// The cached current user, if a login or signup has completed (or
    /// [`CairnClient::remember_user`] ran) since the store was last
    /// cleared.
    pub fn current_user<U: CairnUser>(&self) -> Result<Option<U>, CairnError> {
        match self.store().get(CURRENT_USER_KEY) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Caches `user` as the current user and adopts its session token, as
    /// a completed login would.
    ///
    /// # Errors
    /// `CairnError::InvalidSessionToken` when the user has no token.
    pub fn remember_user<U: CairnUser>(&self, user: &U) -> Result<(), CairnError> {
        self.adopt_user(user)
    }

    /// Rehydrates the cached current user and re-adopts its session token.
    /// Returns `None` when nothing is cached.
    pub fn restore_session<U: CairnUser>(&self) -> Result<Option<U>, CairnError> {
        let user = self.current_user::<U>()?;
        if let Some(user) = &user {
            if let Some(token) = user.session_token() {
                self.set_session_token(Some(token.to_string()));
            }
        }
        Ok(user)
    }
}
