// src/object.rs

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::{run_blocking, CairnClient};
use crate::command::Endpoint;
use crate::error::CairnError;
use crate::pointer::Pointer;
use crate::query::Query;
use crate::transport::Transport;

/// A struct that maps to one server-side class.
///
/// Implementors are plain serde types; the only storage contract is that
/// the server-managed `objectId` field round-trips through
/// [`CairnObject::object_id`]. `createdAt` and `updatedAt` are optional:
/// declare them (as ISO strings or [`CairnDate`](crate::CairnDate)) to
/// receive them, omit them to ignore them.
///
/// # Examples
///
/// ```rust,no_run
/// use cairn_rs::CairnObject;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Book {
///     #[serde(rename = "objectId", skip_serializing_if = "Option::is_none")]
///     object_id: Option<String>,
///     title: String,
/// }
///
/// impl CairnObject for Book {
///     fn class_name() -> &'static str {
///         "Book"
///     }
///     fn object_id(&self) -> Option<&str> {
///         self.object_id.as_deref()
///     }
/// }
/// ```
pub trait CairnObject: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The server-side class this type maps to.
    fn class_name() -> &'static str;

    /// The object's id, present once it has been saved.
    fn object_id(&self) -> Option<&str>;

    /// An unconstrained query over this class.
    fn query() -> Query<Self> {
        Query::new()
    }

    /// A typed pointer at this object.
    ///
    /// # Errors
    /// `CairnError::MissingObjectId` when the object is unsaved.
    fn to_pointer(&self) -> Result<Pointer<Self>, CairnError> {
        Pointer::from_object(self)
    }
}

/// Class names are restricted to alphanumerics and underscores so they
/// embed into request paths untouched.
pub(crate) fn validate_class_name(class_name: &str) -> Result<(), CairnError> {
    if !class_name.is_empty()
        && class_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(CairnError::InvalidClassName(class_name.to_string()))
    }
}

pub(crate) fn object_map<O: CairnObject>(object: &O) -> Result<Map<String, Value>, CairnError> {
    match serde_json::to_value(object)? {
        Value::Object(map) => Ok(map),
        other => Err(CairnError::Serialization(format!(
            "object of class {} serialized to a non-object: {}",
            O::class_name(),
            other
        ))),
    }
}

/// The object's fields minus the server-managed ones, the shape every
/// create and update body takes.
pub(crate) fn save_map<O: CairnObject>(object: &O) -> Result<Map<String, Value>, CairnError> {
    let mut map = object_map(object)?;
    map.remove("objectId");
    map.remove("createdAt");
    map.remove("updatedAt");
    Ok(map)
}

pub(crate) fn save_body<O: CairnObject>(object: &O) -> Result<Value, CairnError> {
    Ok(Value::Object(save_map(object)?))
}

/// Overlays a save response onto the object's serialized fields and decodes
/// the result. A create response carries no `updatedAt`, so `createdAt`
/// doubles as the first modification time.
pub(crate) fn merge_saved<O: CairnObject>(object: &O, response: Value) -> Result<O, CairnError> {
    let mut map = object_map(object)?;
    if let Value::Object(overlay) = response {
        for (key, value) in overlay {
            map.insert(key, value);
        }
    }
    if !map.contains_key("updatedAt") {
        if let Some(created_at) = map.get("createdAt").cloned() {
            map.insert("updatedAt".to_string(), created_at);
        }
    }
    Ok(serde_json::from_value(Value::Object(map))?)
}

impl<T: Transport> CairnClient<T> {
    /// Saves `object`: creates it when it has no `objectId`, updates it
    /// otherwise. Returns the object with the server's fields merged in.
    ///
    /// # Arguments
    /// * `object`: The object to persist. Borrowed; the saved copy is
    ///   returned.
    pub async fn save<O: CairnObject>(&self, object: &O) -> Result<O, CairnError> {
        validate_class_name(O::class_name())?;
        let body = save_body(object)?;
        let response: Value = match object.object_id() {
            None => {
                self.request(
                    Method::POST,
                    Endpoint::class(O::class_name()),
                    Some(&body),
                    false,
                )
                .await?
            }
            Some(object_id) => {
                self.request(
                    Method::PUT,
                    Endpoint::object(O::class_name(), object_id),
                    Some(&body),
                    false,
                )
                .await?
            }
        };
        merge_saved(object, response)
    }

    /// Blocking [`CairnClient::save`]. Must not be called from an async
    /// context.
    pub fn save_blocking<O: CairnObject>(&self, object: &O) -> Result<O, CairnError> {
        run_blocking(self.save(object))?
    }

    /// Runs [`CairnClient::save`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn save_with_callback<O, F>(&self, object: &O, callback: F)
    where
        O: CairnObject,
        F: FnOnce(Result<O, CairnError>) + Send + 'static,
    {
        let client = self.clone();
        let object = object.clone();
        tokio::spawn(async move {
            callback(client.save(&object).await);
        });
    }

    /// Retrieves the server's current copy of `object`.
    ///
    /// # Errors
    /// `CairnError::MissingObjectId` when the object is unsaved.
    pub async fn fetch<O: CairnObject>(&self, object: &O) -> Result<O, CairnError> {
        validate_class_name(O::class_name())?;
        let pointer = Pointer::from_object(object)?;
        pointer.fetch(None, self).await
    }

    /// Blocking [`CairnClient::fetch`]. Must not be called from an async
    /// context.
    pub fn fetch_blocking<O: CairnObject>(&self, object: &O) -> Result<O, CairnError> {
        run_blocking(self.fetch(object))?
    }

    /// Runs [`CairnClient::fetch`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn fetch_with_callback<O, F>(&self, object: &O, callback: F)
    where
        O: CairnObject,
        F: FnOnce(Result<O, CairnError>) + Send + 'static,
    {
        let client = self.clone();
        let object = object.clone();
        tokio::spawn(async move {
            callback(client.fetch(&object).await);
        });
    }

    /// Deletes `object` on the server. The local copy is untouched.
    ///
    /// # Errors
    /// `CairnError::MissingObjectId` when the object is unsaved.
    pub async fn delete<O: CairnObject>(&self, object: &O) -> Result<(), CairnError> {
        validate_class_name(O::class_name())?;
        let object_id = object.object_id().ok_or(CairnError::MissingObjectId)?;
        let _: Value = self
            .request_with_params(
                Method::DELETE,
                Endpoint::object(O::class_name(), object_id),
                &[],
                false,
            )
            .await?;
        Ok(())
    }

    /// Blocking [`CairnClient::delete`]. Must not be called from an async
    /// context.
    pub fn delete_blocking<O: CairnObject>(&self, object: &O) -> Result<(), CairnError> {
        run_blocking(self.delete(object))?
    }

    /// Runs [`CairnClient::delete`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn delete_with_callback<O, F>(&self, object: &O, callback: F)
    where
        O: CairnObject,
        F: FnOnce(Result<(), CairnError>) + Send + 'static,
    {
        let client = self.clone();
        let object = object.clone();
        tokio::spawn(async move {
            callback(client.delete(&object).await);
        });
    }
}
