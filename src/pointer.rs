// src/pointer.rs

use std::marker::PhantomData;

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::{run_blocking, CairnClient};
use crate::command::Endpoint;
use crate::error::CairnError;
use crate::object::CairnObject;
use crate::transport::Transport;

/// A type-erased pointer to another object, in its wire form. Used when the
/// target class is only known at runtime (constraint payloads, decoded
/// fields of unknown shape).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RawPointer {
    #[serde(rename = "__type")]
    type_field: String, // Should always be "Pointer"
    #[serde(rename = "className")]
    pub class_name: String,
    #[serde(rename = "objectId")]
    pub object_id: String,
}

impl RawPointer {
    pub fn new(class_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        RawPointer {
            type_field: "Pointer".to_string(),
            class_name: class_name.into(),
            object_id: object_id.into(),
        }
    }
}

/// A typed pointer to a `T` stored on the server:
/// `{"__type": "Pointer", "className": ..., "objectId": ...}`.
///
/// Pointers are how objects reference each other without embedding. A
/// pointer can be resolved back into its object with [`Pointer::fetch`].
pub struct Pointer<T> {
    pub class_name: String,
    pub object_id: String,
    _marker: PhantomData<T>,
}

impl<T: CairnObject> Pointer<T> {
    /// Creates a pointer to the object of `T`'s class with this id.
    pub fn new(object_id: impl Into<String>) -> Self {
        Pointer {
            class_name: T::class_name().to_string(),
            object_id: object_id.into(),
            _marker: PhantomData,
        }
    }

    /// Creates a pointer referencing an already-saved object.
    ///
    /// # Errors
    /// Returns `CairnError::MissingObjectId` if the object has not been
    /// saved yet (no `objectId`).
    pub fn from_object(object: &T) -> Result<Self, CairnError> {
        match object.object_id() {
            Some(id) => Ok(Pointer::new(id)),
            None => Err(CairnError::MissingObjectId),
        }
    }

    /// True when `other` is a saved object with this pointer's id.
    pub fn has_same_object_id(&self, other: &T) -> bool {
        other.object_id() == Some(self.object_id.as_str())
    }

    /// Resolves the pointer by fetching the full object.
    ///
    /// `include_keys` nominates pointer-valued fields of the target to
    /// resolve in the same round trip; `["*"]` resolves them all. The list
    /// is sent as the JSON-array-valued `include` URL parameter.
    pub async fn fetch<Tr: Transport>(
        &self,
        include_keys: Option<&[&str]>,
        client: &CairnClient<Tr>,
    ) -> Result<T, CairnError> {
        let mut params: Vec<(String, String)> = Vec::new();
        if let Some(keys) = include_keys {
            params.push(("include".to_string(), serde_json::to_string(keys)?));
        }
        let endpoint = Endpoint::object(&self.class_name, &self.object_id);
        client
            .request_with_params(Method::GET, endpoint, &params, false)
            .await
    }

    /// Blocking variant of [`Pointer::fetch`]. Builds a throwaway runtime;
    /// must not be called from async context.
    pub fn fetch_blocking<Tr: Transport>(
        &self,
        include_keys: Option<&[&str]>,
        client: &CairnClient<Tr>,
    ) -> Result<T, CairnError> {
        run_blocking(self.fetch(include_keys, client))?
    }

    /// Callback variant of [`Pointer::fetch`]. The callback runs on the
    /// ambient tokio runtime and is invoked exactly once.
    pub fn fetch_with_callback<Tr, F>(
        &self,
        include_keys: Option<&[&str]>,
        client: &CairnClient<Tr>,
        callback: F,
    ) where
        Tr: Transport,
        F: FnOnce(Result<T, CairnError>) + Send + 'static,
    {
        let pointer = self.clone();
        let include: Option<Vec<String>> = include_keys
            .map(|keys| keys.iter().map(|k| k.to_string()).collect());
        let client = client.clone();
        tokio::spawn(async move {
            let refs: Option<Vec<&str>> = include
                .as_ref()
                .map(|keys| keys.iter().map(String::as_str).collect());
            callback(pointer.fetch(refs.as_deref(), &client).await);
        });
    }

    pub(crate) fn to_raw(&self) -> RawPointer {
        RawPointer::new(&self.class_name, &self.object_id)
    }
}

impl<T> Clone for Pointer<T> {
    fn clone(&self) -> Self {
        Pointer {
            class_name: self.class_name.clone(),
            object_id: self.object_id.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Pointer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pointer")
            .field("class_name", &self.class_name)
            .field("object_id", &self.object_id)
            .finish()
    }
}

impl<T> PartialEq for Pointer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name && self.object_id == other.object_id
    }
}

impl<T> Eq for Pointer<T> {}

impl<T> Serialize for Pointer<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawPointer::new(&self.class_name, &self.object_id).serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Pointer<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawPointer::deserialize(deserializer)?;
        Ok(Pointer {
            class_name: raw.class_name,
            object_id: raw.object_id,
            _marker: PhantomData,
        })
    }
}
