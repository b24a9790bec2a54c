// src/batch.rs
//
// Multi-object operations over the batch endpoint. One round trip carries
// up to BATCH_SIZE sub-requests; larger inputs are chunked into
// consecutive round trips, preserving input order in the output.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{run_blocking, CairnClient};
use crate::command::Endpoint;
use crate::error::CairnError;
use crate::object::{merge_saved, save_body, validate_class_name, CairnObject};
use crate::transport::Transport;

/// The most sub-requests one batch round trip may carry.
pub const BATCH_SIZE: usize = 50;

#[derive(Debug, Serialize)]
struct BatchRequestItem {
    method: &'static str,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

#[derive(Serialize)]
struct BatchRequest {
    requests: Vec<BatchRequestItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction: Option<bool>,
}

#[derive(Debug, Deserialize)]
enum BatchResponseItem {
    #[serde(rename = "success")]
    Success(Value),
    #[serde(rename = "error")]
    Error(BatchErrorBody),
}

#[derive(Debug, Deserialize)]
struct BatchErrorBody {
    code: u16,
    error: String,
}

fn class_path<O: CairnObject>(mount_path: &str) -> String {
    format!(
        "{}{}",
        mount_path,
        Endpoint::class(O::class_name()).url_component()
    )
}

fn object_path<O: CairnObject>(mount_path: &str, object_id: &str) -> String {
    format!(
        "{}{}",
        mount_path,
        Endpoint::object(O::class_name(), object_id).url_component()
    )
}

fn save_items<O: CairnObject>(
    mount_path: &str,
    objects: &[O],
) -> Result<Vec<BatchRequestItem>, CairnError> {
    objects
        .iter()
        .map(|object| {
            let body = Some(save_body(object)?);
            Ok(match object.object_id() {
                None => BatchRequestItem {
                    method: "POST",
                    path: class_path::<O>(mount_path),
                    body,
                },
                Some(object_id) => BatchRequestItem {
                    method: "PUT",
                    path: object_path::<O>(mount_path, object_id),
                    body,
                },
            })
        })
        .collect()
}

fn id_items<O: CairnObject>(
    mount_path: &str,
    method: &'static str,
    objects: &[O],
) -> Result<Vec<BatchRequestItem>, CairnError> {
    objects
        .iter()
        .map(|object| {
            let object_id = object.object_id().ok_or(CairnError::MissingObjectId)?;
            Ok(BatchRequestItem {
                method,
                path: object_path::<O>(mount_path, object_id),
                body: None,
            })
        })
        .collect()
}

fn check_transaction(transaction: bool, count: usize) -> Result<(), CairnError> {
    if transaction && count > BATCH_SIZE {
        return Err(CairnError::InvalidInput(format!(
            "a transaction cannot span more than {} objects",
            BATCH_SIZE
        )));
    }
    Ok(())
}

impl<T: Transport> CairnClient<T> {
    async fn run_batch(
        &self,
        requests: Vec<BatchRequestItem>,
        transaction: bool,
    ) -> Result<Vec<BatchResponseItem>, CairnError> {
        let expected = requests.len();
        let body = BatchRequest {
            requests,
            transaction: transaction.then_some(true),
        };
        let items: Vec<BatchResponseItem> = self
            .request(Method::POST, Endpoint::Batch, Some(&body), false)
            .await?;
        if items.len() != expected {
            return Err(CairnError::UnexpectedResponse(format!(
                "batch answered {} of {} sub-requests",
                items.len(),
                expected
            )));
        }
        Ok(items)
    }

    /// Saves every object in `objects`, creating or updating each one as
    /// [`CairnClient::save`] would. The result holds one entry per input
    /// object, in input order; a failed sub-request fails only its entry.
    ///
    /// # Arguments
    /// * `objects`: The objects to persist.
    /// * `transaction`: Apply all writes atomically. Limited to one round
    ///   trip, so at most [`BATCH_SIZE`] objects.
    pub async fn save_all<O: CairnObject>(
        &self,
        objects: &[O],
        transaction: bool,
    ) -> Result<Vec<Result<O, CairnError>>, CairnError> {
        validate_class_name(O::class_name())?;
        check_transaction(transaction, objects.len())?;
        let mount_path = self.mount_path();
        let mut results = Vec::with_capacity(objects.len());
        for chunk in objects.chunks(BATCH_SIZE) {
            let items = self
                .run_batch(save_items(&mount_path, chunk)?, transaction)
                .await?;
            for (object, item) in chunk.iter().zip(items) {
                results.push(match item {
                    BatchResponseItem::Success(value) => merge_saved(object, value),
                    BatchResponseItem::Error(body) => {
                        Err(CairnError::from_api_code(body.code, 400, body.error))
                    }
                });
            }
        }
        Ok(results)
    }

    /// Blocking [`CairnClient::save_all`]. Must not be called from an async
    /// context.
    pub fn save_all_blocking<O: CairnObject>(
        &self,
        objects: &[O],
        transaction: bool,
    ) -> Result<Vec<Result<O, CairnError>>, CairnError> {
        run_blocking(self.save_all(objects, transaction))?
    }

    /// Runs [`CairnClient::save_all`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn save_all_with_callback<O, F>(&self, objects: &[O], transaction: bool, callback: F)
    where
        O: CairnObject,
        F: FnOnce(Result<Vec<Result<O, CairnError>>, CairnError>) + Send + 'static,
    {
        let client = self.clone();
        let objects = objects.to_vec();
        tokio::spawn(async move {
            callback(client.save_all(&objects, transaction).await);
        });
    }

    /// Retrieves the server's current copy of every object in `objects`.
    /// The result holds one entry per input object, in input order.
    ///
    /// # Errors
    /// `CairnError::MissingObjectId` when any object is unsaved.
    pub async fn fetch_all<O: CairnObject>(
        &self,
        objects: &[O],
    ) -> Result<Vec<Result<O, CairnError>>, CairnError> {
        validate_class_name(O::class_name())?;
        let mount_path = self.mount_path();
        let mut results = Vec::with_capacity(objects.len());
        for chunk in objects.chunks(BATCH_SIZE) {
            let items = self
                .run_batch(id_items(&mount_path, "GET", chunk)?, false)
                .await?;
            for item in items {
                results.push(match item {
                    BatchResponseItem::Success(value) => {
                        serde_json::from_value(value).map_err(CairnError::from)
                    }
                    BatchResponseItem::Error(body) => {
                        Err(CairnError::from_api_code(body.code, 400, body.error))
                    }
                });
            }
        }
        Ok(results)
    }

    /// Blocking [`CairnClient::fetch_all`]. Must not be called from an
    /// async context.
    pub fn fetch_all_blocking<O: CairnObject>(
        &self,
        objects: &[O],
    ) -> Result<Vec<Result<O, CairnError>>, CairnError> {
        run_blocking(self.fetch_all(objects))?
    }

    /// Runs [`CairnClient::fetch_all`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn fetch_all_with_callback<O, F>(&self, objects: &[O], callback: F)
    where
        O: CairnObject,
        F: FnOnce(Result<Vec<Result<O, CairnError>>, CairnError>) + Send + 'static,
    {
        let client = self.clone();
        let objects = objects.to_vec();
        tokio::spawn(async move {
            callback(client.fetch_all(&objects).await);
        });
    }

    /// Deletes every object in `objects` on the server. The result holds
    /// one entry per input object, in input order.
    ///
    /// # Arguments
    /// * `objects`: The objects to delete. Each must have an `objectId`.
    /// * `transaction`: Apply all deletes atomically. Limited to one round
    ///   trip, so at most [`BATCH_SIZE`] objects.
    pub async fn delete_all<O: CairnObject>(
        &self,
        objects: &[O],
        transaction: bool,
    ) -> Result<Vec<Result<(), CairnError>>, CairnError> {
        validate_class_name(O::class_name())?;
        check_transaction(transaction, objects.len())?;
        let mount_path = self.mount_path();
        let mut results = Vec::with_capacity(objects.len());
        for chunk in objects.chunks(BATCH_SIZE) {
            let items = self
                .run_batch(id_items(&mount_path, "DELETE", chunk)?, transaction)
                .await?;
            for item in items {
                results.push(match item {
                    BatchResponseItem::Success(_) => Ok(()),
                    BatchResponseItem::Error(body) => {
                        Err(CairnError::from_api_code(body.code, 400, body.error))
                    }
                });
            }
        }
        Ok(results)
    }

    /// Blocking [`CairnClient::delete_all`]. Must not be called from an
    /// async context.
    pub fn delete_all_blocking<O: CairnObject>(
        &self,
        objects: &[O],
        transaction: bool,
    ) -> Result<Vec<Result<(), CairnError>>, CairnError> {
        run_blocking(self.delete_all(objects, transaction))?
    }

    /// Runs [`CairnClient::delete_all`] on the ambient runtime and hands
    /// the result to `callback`.
    pub fn delete_all_with_callback<O, F>(&self, objects: &[O], transaction: bool, callback: F)
    where
        O: CairnObject,
        F: FnOnce(Result<Vec<Result<(), CairnError>>, CairnError>) + Send + 'static,
    {
        let client = self.clone();
        let objects = objects.to_vec();
        tokio::spawn(async move {
            callback(client.delete_all(&objects, transaction).await);
        });
    }
}

#[cfg(test)]
mod batch_tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Count {
        #[serde(rename = "objectId", skip_serializing_if = "Option::is_none")]
        object_id: Option<String>,
        #[serde(default)]
        value: i64,
    }

    impl CairnObject for Count {
        fn class_name() -> &'static str {
            "Count"
        }

        fn object_id(&self) -> Option<&str> {
            self.object_id.as_deref()
        }
    }

    #[test]
    fn test_save_items_pick_method_and_path() {
        let objects = vec![
            Count {
                object_id: None,
                value: 1,
            },
            Count {
                object_id: Some("abc123".to_string()),
                value: 2,
            },
        ];
        let items = save_items("/api", &objects).unwrap();
        assert_eq!(items[0].method, "POST");
        assert_eq!(items[0].path, "/api/classes/Count");
        assert_eq!(items[0].body, Some(json!({"value": 1})));
        assert_eq!(items[1].method, "PUT");
        assert_eq!(items[1].path, "/api/classes/Count/abc123");
        assert_eq!(items[1].body, Some(json!({"value": 2})));
    }

    #[test]
    fn test_id_items_require_an_object_id() {
        let unsaved = vec![Count {
            object_id: None,
            value: 1,
        }];
        assert!(matches!(
            id_items("", "DELETE", &unsaved),
            Err(CairnError::MissingObjectId)
        ));
    }

    #[test]
    fn test_response_items_decode_both_arms() {
        let items: Vec<BatchResponseItem> = serde_json::from_value(json!([
            {"success": {"objectId": "abc123", "createdAt": "2024-03-09T12:30:45.000Z"}},
            {"error": {"code": 101, "error": "Object not found."}},
        ]))
        .unwrap();
        assert!(matches!(&items[0], BatchResponseItem::Success(_)));
        match &items[1] {
            BatchResponseItem::Error(body) => {
                assert_eq!(body.code, 101);
                assert_eq!(body.error, "Object not found.");
            }
            other => panic!("expected an error item, got {:?}", other),
        }
    }

    #[test]
    fn test_transaction_capped_at_one_round_trip() {
        assert!(check_transaction(false, BATCH_SIZE * 3).is_ok());
        assert!(check_transaction(true, BATCH_SIZE).is_ok());
        assert!(matches!(
            check_transaction(true, BATCH_SIZE + 1),
            Err(CairnError::InvalidInput(_))
        ));
    }
}
