// src/query.rs

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::client::{run_blocking, CairnClient};
use crate::command::Endpoint;
use crate::constraint::{greater_than, QueryConstraint, QueryWhere};
use crate::error::CairnError;
use crate::object::CairnObject;
use crate::transport::Transport;

/// The limit applied to a query that never set one.
pub const DEFAULT_LIMIT: usize = 100;

/// Page size [`Query::find_all`] uses while walking a class.
pub const FIND_ALL_BATCH_SIZE: usize = 1000;

/// A sort key for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    Ascending(String),
    Descending(String),
}

impl Order {
    pub fn ascending(key: &str) -> Self {
        Order::Ascending(key.to_string())
    }

    pub fn descending(key: &str) -> Self {
        Order::Descending(key.to_string())
    }

    fn key_spec(&self) -> String {
        match self {
            Order::Ascending(key) => key.clone(),
            Order::Descending(key) => format!("-{}", key),
        }
    }
}

/// A typed query against one class.
///
/// Builders consume and return the query, so a full query reads as one
/// chain. Terminal operations borrow a [`CairnClient`] and come in three
/// calling conventions: `async` (the primary), `*_blocking` for
/// synchronous callers outside a runtime, and `*_with_callback` which
/// spawns onto the ambient runtime and hands the result to a closure.
///
/// # Examples
///
/// ```rust,no_run
/// use cairn_rs::{constraint::greater_than, CairnClient, CairnError, CairnObject, Order};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct GameScore {
///     #[serde(rename = "objectId", skip_serializing_if = "Option::is_none")]
///     object_id: Option<String>,
///     score: i64,
/// }
///
/// impl CairnObject for GameScore {
///     fn class_name() -> &'static str {
///         "GameScore"
///     }
///     fn object_id(&self) -> Option<&str> {
///         self.object_id.as_deref()
///     }
/// }
///
/// # async fn run() -> Result<(), CairnError> {
/// let client = CairnClient::new("http://localhost:1337/api", "myAppId", None, None)?;
/// let top = GameScore::query()
///     .filter(greater_than("score", 1000))
///     .order(&[Order::descending("score")])
///     .limit(10)
///     .find(&client)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Query<T: CairnObject> {
    class_name: String,
    where_clause: QueryWhere,
    limit: usize,
    skip: usize,
    order: Option<Vec<Order>>,
    include: Option<BTreeSet<String>>,
    keys: Option<BTreeSet<String>>,
    exclude_keys: Option<BTreeSet<String>>,
    read_preference: Option<String>,
    include_read_preference: Option<String>,
    subquery_read_preference: Option<String>,
    hint: Option<Value>,
    marker: PhantomData<T>,
}

impl<T: CairnObject> Query<T> {
    /// Creates an unconstrained query for `T`'s class.
    pub fn new() -> Self {
        Query {
            class_name: T::class_name().to_string(),
            where_clause: QueryWhere::default(),
            limit: DEFAULT_LIMIT,
            skip: 0,
            order: None,
            include: None,
            keys: None,
            exclude_keys: None,
            read_preference: None,
            include_read_preference: None,
            subquery_read_preference: None,
            hint: None,
            marker: PhantomData,
        }
    }

    /// The class this query targets.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub(crate) fn where_clause(&self) -> &QueryWhere {
        &self.where_clause
    }

    /// Adds one constraint. Constraints on the same field merge into a
    /// single operator map; a repeated operator overwrites its predecessor,
    /// and direct equality replaces everything accumulated for that field.
    pub fn filter(mut self, constraint: QueryConstraint) -> Self {
        self.where_clause.add(constraint);
        self
    }

    /// Adds every constraint in `constraints`. Geo builders that emit an
    /// operator pair return their constraints this way.
    pub fn filter_all(mut self, constraints: Vec<QueryConstraint>) -> Self {
        for constraint in constraints {
            self.where_clause.add(constraint);
        }
        self
    }

    /// Caps the number of results. Zero makes every terminal operation
    /// resolve locally without a request.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Skips the first `skip` results.
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Sorts results by `keys`, applied in order. Replaces any previous
    /// sort.
    pub fn order(mut self, keys: &[Order]) -> Self {
        self.order = Some(keys.to_vec());
        self
    }

    /// Fetches the pointed-to objects for the named pointer fields.
    /// Accumulates across calls.
    pub fn include(mut self, keys: &[&str]) -> Self {
        self.include
            .get_or_insert_with(BTreeSet::new)
            .extend(keys.iter().map(|key| key.to_string()));
        self
    }

    /// Fetches the pointed-to objects for every pointer field.
    pub fn include_all(mut self) -> Self {
        self.include
            .get_or_insert_with(BTreeSet::new)
            .insert("*".to_string());
        self
    }

    /// Restricts returned fields to `keys`. Accumulates across calls.
    pub fn select(mut self, keys: &[&str]) -> Self {
        self.keys
            .get_or_insert_with(BTreeSet::new)
            .extend(keys.iter().map(|key| key.to_string()));
        self
    }

    /// Omits `keys` from returned objects. Accumulates across calls.
    pub fn exclude(mut self, keys: &[&str]) -> Self {
        self.exclude_keys
            .get_or_insert_with(BTreeSet::new)
            .extend(keys.iter().map(|key| key.to_string()));
        self
    }

    /// Names the index the server should use.
    pub fn hint<V: Into<Value>>(mut self, hint: V) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Sets the replica read preference for this query.
    pub fn read_preference(mut self, preference: &str) -> Self {
        self.read_preference = Some(preference.to_string());
        self
    }

    /// Sets the read preference used when fetching included pointers.
    pub fn include_read_preference(mut self, preference: &str) -> Self {
        self.include_read_preference = Some(preference.to_string());
        self
    }

    /// Sets the read preference used by sub-queries.
    pub fn subquery_read_preference(mut self, preference: &str) -> Self {
        self.subquery_read_preference = Some(preference.to_string());
        self
    }

    fn body_map(&self) -> Result<Map<String, Value>, CairnError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(CairnError::Serialization(format!(
                "query body serialized to a non-object: {}",
                other
            ))),
        }
    }

    fn no_results(&self) -> CairnError {
        CairnError::ObjectNotFound(format!("no results for class {}", self.class_name))
    }

    /// Retrieves every object matching the query, up to its limit.
    pub async fn find<Tr: Transport>(&self, client: &CairnClient<Tr>) -> Result<Vec<T>, CairnError> {
        if self.limit == 0 {
            return Ok(Vec::new());
        }
        let response: FindResponse<T> = client
            .request(
                Method::POST,
                Endpoint::class(&self.class_name),
                Some(self),
                false,
            )
            .await?;
        Ok(response.results)
    }

    /// Blocking [`Query::find`]. Must not be called from an async context.
    pub fn find_blocking<Tr: Transport>(&self, client: &CairnClient<Tr>) -> Result<Vec<T>, CairnError> {
        run_blocking(self.find(client))?
    }

    /// Runs [`Query::find`] on the ambient runtime and hands the result to
    /// `callback`.
    pub fn find_with_callback<Tr: Transport, F>(&self, client: &CairnClient<Tr>, callback: F)
    where
        F: FnOnce(Result<Vec<T>, CairnError>) + Send + 'static,
    {
        let query = self.clone();
        let client = client.clone();
        tokio::spawn(async move {
            callback(query.find(&client).await);
        });
    }

    /// Retrieves every object matching the query, paging past the server's
    /// per-request cap.
    ///
    /// The query must be unmodified in skip, order and limit: iteration
    /// orders by `objectId` and advances with a cursor constraint, so those
    /// settings cannot be honored. Results arrive in `objectId` order.
    pub async fn find_all<Tr: Transport>(&self, client: &CairnClient<Tr>) -> Result<Vec<T>, CairnError> {
        self.find_all_with_batch_size(FIND_ALL_BATCH_SIZE, client)
            .await
    }

    /// [`Query::find_all`] with an explicit page size.
    pub async fn find_all_with_batch_size<Tr: Transport>(
        &self,
        batch_size: usize,
        client: &CairnClient<Tr>,
    ) -> Result<Vec<T>, CairnError> {
        if self.limit == 0 {
            return Ok(Vec::new());
        }
        if self.skip > 0 || self.order.is_some() || self.limit != DEFAULT_LIMIT {
            return Err(CairnError::InvalidInput(
                "Cannot iterate on a query with skip, order, or limit set".to_string(),
            ));
        }
        if batch_size == 0 {
            return Err(CairnError::InvalidInput(
                "batch size must be greater than zero".to_string(),
            ));
        }

        let mut results: Vec<T> = Vec::new();
        let mut cursor = self.clone();
        cursor.order = Some(vec![Order::ascending("objectId")]);
        cursor.limit = batch_size;
        loop {
            let response: FindResponse<T> = client
                .request(
                    Method::POST,
                    Endpoint::class(&self.class_name),
                    Some(&cursor),
                    false,
                )
                .await?;
            let page = response.results;
            let page_len = page.len();
            let last_id = page
                .last()
                .and_then(|object| object.object_id())
                .map(str::to_string);
            log::debug!(
                "find_all page for class {}: {} results",
                self.class_name,
                page_len
            );
            results.extend(page);
            if page_len < batch_size {
                break;
            }
            match last_id {
                Some(object_id) => cursor.where_clause.add(greater_than("objectId", object_id)),
                None => {
                    return Err(CairnError::UnexpectedResponse(
                        "page result is missing objectId".to_string(),
                    ))
                }
            }
        }
        Ok(results)
    }

    /// Blocking [`Query::find_all`]. Must not be called from an async
    /// context.
    pub fn find_all_blocking<Tr: Transport>(&self, client: &CairnClient<Tr>) -> Result<Vec<T>, CairnError> {
        run_blocking(self.find_all(client))?
    }

    /// Runs [`Query::find_all`] on the ambient runtime and hands the result
    /// to `callback`.
    pub fn find_all_with_callback<Tr: Transport, F>(&self, client: &CairnClient<Tr>, callback: F)
    where
        F: FnOnce(Result<Vec<T>, CairnError>) + Send + 'static,
    {
        let query = self.clone();
        let client = client.clone();
        tokio::spawn(async move {
            callback(query.find_all(&client).await);
        });
    }

    /// Retrieves the first object matching the query.
    ///
    /// # Errors
    /// `CairnError::ObjectNotFound` when nothing matches, or when the
    /// query's limit is zero.
    pub async fn first<Tr: Transport>(&self, client: &CairnClient<Tr>) -> Result<T, CairnError> {
        if self.limit == 0 {
            return Err(self.no_results());
        }
        let mut body = self.body_map()?;
        body.insert("limit".to_string(), Value::from(1));
        let response: FindResponse<T> = client
            .request(
                Method::POST,
                Endpoint::class(&self.class_name),
                Some(&Value::Object(body)),
                false,
            )
            .await?;
        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| self.no_results())
    }

    /// Blocking [`Query::first`]. Must not be called from an async context.
    pub fn first_blocking<Tr: Transport>(&self, client: &CairnClient<Tr>) -> Result<T, CairnError> {
        run_blocking(self.first(client))?
    }

    /// Runs [`Query::first`] on the ambient runtime and hands the result to
    /// `callback`.
    pub fn first_with_callback<Tr: Transport, F>(&self, client: &CairnClient<Tr>, callback: F)
    where
        F: FnOnce(Result<T, CairnError>) + Send + 'static,
    {
        let query = self.clone();
        let client = client.clone();
        tokio::spawn(async move {
            callback(query.first(&client).await);
        });
    }

    /// Counts the objects matching the query without retrieving them.
    pub async fn count<Tr: Transport>(&self, client: &CairnClient<Tr>) -> Result<u64, CairnError> {
        if self.limit == 0 {
            return Ok(0);
        }
        let mut body = self.body_map()?;
        body.insert("limit".to_string(), Value::from(1));
        body.insert("count".to_string(), Value::Bool(true));
        let response: CountResponse = client
            .request(
                Method::POST,
                Endpoint::class(&self.class_name),
                Some(&Value::Object(body)),
                false,
            )
            .await?;
        Ok(response.count.unwrap_or(0))
    }

    /// Blocking [`Query::count`]. Must not be called from an async context.
    pub fn count_blocking<Tr: Transport>(&self, client: &CairnClient<Tr>) -> Result<u64, CairnError> {
        run_blocking(self.count(client))?
    }

    /// Runs [`Query::count`] on the ambient runtime and hands the result to
    /// `callback`.
    pub fn count_with_callback<Tr: Transport, F>(&self, client: &CairnClient<Tr>, callback: F)
    where
        F: FnOnce(Result<u64, CairnError>) + Send + 'static,
    {
        let query = self.clone();
        let client = client.clone();
        tokio::spawn(async move {
            callback(query.count(&client).await);
        });
    }

    /// Runs an aggregation pipeline over the class. The query's constraints
    /// do not apply; express filtering as pipeline stages. Requires the
    /// master key.
    pub async fn aggregate<Tr: Transport>(
        &self,
        pipeline: Value,
        client: &CairnClient<Tr>,
    ) -> Result<Vec<T>, CairnError> {
        if self.limit == 0 {
            return Ok(Vec::new());
        }
        let body = AggregateBody {
            pipeline: &pipeline,
            hint: self.hint.as_ref(),
            explain: None,
        };
        let response: FindResponse<T> = client
            .request(
                Method::POST,
                Endpoint::aggregate(&self.class_name),
                Some(&body),
                true,
            )
            .await?;
        Ok(response.results)
    }

    /// Blocking [`Query::aggregate`]. Must not be called from an async
    /// context.
    pub fn aggregate_blocking<Tr: Transport>(
        &self,
        pipeline: Value,
        client: &CairnClient<Tr>,
    ) -> Result<Vec<T>, CairnError> {
        run_blocking(self.aggregate(pipeline, client))?
    }

    /// Runs [`Query::aggregate`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn aggregate_with_callback<Tr: Transport, F>(
        &self,
        pipeline: Value,
        client: &CairnClient<Tr>,
        callback: F,
    ) where
        F: FnOnce(Result<Vec<T>, CairnError>) + Send + 'static,
    {
        let query = self.clone();
        let client = client.clone();
        tokio::spawn(async move {
            callback(query.aggregate(pipeline, &client).await);
        });
    }

    /// Collects the distinct values of `key` across objects matching the
    /// query. Requires the master key.
    pub async fn distinct<V, Tr>(
        &self,
        key: &str,
        client: &CairnClient<Tr>,
    ) -> Result<Vec<V>, CairnError>
    where
        V: DeserializeOwned,
        Tr: Transport,
    {
        if self.limit == 0 {
            return Ok(Vec::new());
        }
        let body = DistinctBody {
            distinct: key,
            where_clause: (!self.where_clause.is_empty()).then_some(&self.where_clause),
            hint: self.hint.as_ref(),
            explain: None,
        };
        let response: FindResponse<V> = client
            .request(
                Method::POST,
                Endpoint::aggregate(&self.class_name),
                Some(&body),
                true,
            )
            .await?;
        Ok(response.results)
    }

    /// Blocking [`Query::distinct`]. Must not be called from an async
    /// context.
    pub fn distinct_blocking<V, Tr>(
        &self,
        key: &str,
        client: &CairnClient<Tr>,
    ) -> Result<Vec<V>, CairnError>
    where
        V: DeserializeOwned,
        Tr: Transport,
    {
        run_blocking(self.distinct(key, client))?
    }

    /// Runs [`Query::distinct`] on the ambient runtime and hands the result
    /// to `callback`.
    pub fn distinct_with_callback<V, Tr, F>(&self, key: &str, client: &CairnClient<Tr>, callback: F)
    where
        V: DeserializeOwned + Send + 'static,
        Tr: Transport,
        F: FnOnce(Result<Vec<V>, CairnError>) + Send + 'static,
    {
        let query = self.clone();
        let client = client.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            callback(query.distinct(&key, &client).await);
        });
    }

    /// [`Query::find`] with `explain` set: returns the server's query plan
    /// instead of objects, decoded as `U`.
    pub async fn find_explain<U, Tr>(&self, client: &CairnClient<Tr>) -> Result<Vec<U>, CairnError>
    where
        U: DeserializeOwned,
        Tr: Transport,
    {
        if self.limit == 0 {
            return Ok(Vec::new());
        }
        let mut body = self.body_map()?;
        body.insert("explain".to_string(), Value::Bool(true));
        let response: FindResponse<U> = client
            .request(
                Method::POST,
                Endpoint::class(&self.class_name),
                Some(&Value::Object(body)),
                false,
            )
            .await?;
        Ok(response.results)
    }

    /// Blocking [`Query::find_explain`]. Must not be called from an async
    /// context.
    pub fn find_explain_blocking<U, Tr>(&self, client: &CairnClient<Tr>) -> Result<Vec<U>, CairnError>
    where
        U: DeserializeOwned,
        Tr: Transport,
    {
        run_blocking(self.find_explain(client))?
    }

    /// Runs [`Query::find_explain`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn find_explain_with_callback<U, Tr, F>(&self, client: &CairnClient<Tr>, callback: F)
    where
        U: DeserializeOwned + Send + 'static,
        Tr: Transport,
        F: FnOnce(Result<Vec<U>, CairnError>) + Send + 'static,
    {
        let query = self.clone();
        let client = client.clone();
        tokio::spawn(async move {
            callback(query.find_explain(&client).await);
        });
    }

    /// [`Query::first`] with `explain` set.
    pub async fn first_explain<U, Tr>(&self, client: &CairnClient<Tr>) -> Result<U, CairnError>
    where
        U: DeserializeOwned,
        Tr: Transport,
    {
        if self.limit == 0 {
            return Err(self.no_results());
        }
        let mut body = self.body_map()?;
        body.insert("limit".to_string(), Value::from(1));
        body.insert("explain".to_string(), Value::Bool(true));
        let response: FindResponse<U> = client
            .request(
                Method::POST,
                Endpoint::class(&self.class_name),
                Some(&Value::Object(body)),
                false,
            )
            .await?;
        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| self.no_results())
    }

    /// Blocking [`Query::first_explain`]. Must not be called from an async
    /// context.
    pub fn first_explain_blocking<U, Tr>(&self, client: &CairnClient<Tr>) -> Result<U, CairnError>
    where
        U: DeserializeOwned,
        Tr: Transport,
    {
        run_blocking(self.first_explain(client))?
    }

    /// Runs [`Query::first_explain`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn first_explain_with_callback<U, Tr, F>(&self, client: &CairnClient<Tr>, callback: F)
    where
        U: DeserializeOwned + Send + 'static,
        Tr: Transport,
        F: FnOnce(Result<U, CairnError>) + Send + 'static,
    {
        let query = self.clone();
        let client = client.clone();
        tokio::spawn(async move {
            callback(query.first_explain(&client).await);
        });
    }

    /// [`Query::count`] with `explain` set.
    pub async fn count_explain<U, Tr>(&self, client: &CairnClient<Tr>) -> Result<Vec<U>, CairnError>
    where
        U: DeserializeOwned,
        Tr: Transport,
    {
        if self.limit == 0 {
            return Ok(Vec::new());
        }
        let mut body = self.body_map()?;
        body.insert("limit".to_string(), Value::from(1));
        body.insert("count".to_string(), Value::Bool(true));
        body.insert("explain".to_string(), Value::Bool(true));
        let response: FindResponse<U> = client
            .request(
                Method::POST,
                Endpoint::class(&self.class_name),
                Some(&Value::Object(body)),
                false,
            )
            .await?;
        Ok(response.results)
    }

    /// Blocking [`Query::count_explain`]. Must not be called from an async
    /// context.
    pub fn count_explain_blocking<U, Tr>(&self, client: &CairnClient<Tr>) -> Result<Vec<U>, CairnError>
    where
        U: DeserializeOwned,
        Tr: Transport,
    {
        run_blocking(self.count_explain(client))?
    }

    /// Runs [`Query::count_explain`] on the ambient runtime and hands the
    /// result to `callback`.
    pub fn count_explain_with_callback<U, Tr, F>(&self, client: &CairnClient<Tr>, callback: F)
    where
        U: DeserializeOwned + Send + 'static,
        Tr: Transport,
        F: FnOnce(Result<Vec<U>, CairnError>) + Send + 'static,
    {
        let query = self.clone();
        let client = client.clone();
        tokio::spawn(async move {
            callback(query.count_explain(&client).await);
        });
    }

    /// [`Query::aggregate`] with `explain` set.
    pub async fn aggregate_explain<U, Tr>(
        &self,
        pipeline: Value,
        client: &CairnClient<Tr>,
    ) -> Result<Vec<U>, CairnError>
    where
        U: DeserializeOwned,
        Tr: Transport,
    {
        if self.limit == 0 {
            return Ok(Vec::new());
        }
        let body = AggregateBody {
            pipeline: &pipeline,
            hint: self.hint.as_ref(),
            explain: Some(true),
        };
        let response: FindResponse<U> = client
            .request(
                Method::POST,
                Endpoint::aggregate(&self.class_name),
                Some(&body),
                true,
            )
            .await?;
        Ok(response.results)
    }

    /// Blocking [`Query::aggregate_explain`]. Must not be called from an
    /// async context.
    pub fn aggregate_explain_blocking<U, Tr>(
        &self,
        pipeline: Value,
        client: &CairnClient<Tr>,
    ) -> Result<Vec<U>, CairnError>
    where
        U: DeserializeOwned,
        Tr: Transport,
    {
        run_blocking(self.aggregate_explain(pipeline, client))?
    }

    /// Runs [`Query::aggregate_explain`] on the ambient runtime and hands
    /// the result to `callback`.
    pub fn aggregate_explain_with_callback<U, Tr, F>(
        &self,
        pipeline: Value,
        client: &CairnClient<Tr>,
        callback: F,
    ) where
        U: DeserializeOwned + Send + 'static,
        Tr: Transport,
        F: FnOnce(Result<Vec<U>, CairnError>) + Send + 'static,
    {
        let query = self.clone();
        let client = client.clone();
        tokio::spawn(async move {
            callback(query.aggregate_explain(pipeline, &client).await);
        });
    }

    /// [`Query::distinct`] with `explain` set.
    pub async fn distinct_explain<U, Tr>(
        &self,
        key: &str,
        client: &CairnClient<Tr>,
    ) -> Result<Vec<U>, CairnError>
    where
        U: DeserializeOwned,
        Tr: Transport,
    {
        if self.limit == 0 {
            return Ok(Vec::new());
        }
        let body = DistinctBody {
            distinct: key,
            where_clause: (!self.where_clause.is_empty()).then_some(&self.where_clause),
            hint: self.hint.as_ref(),
            explain: Some(true),
        };
        let response: FindResponse<U> = client
            .request(
                Method::POST,
                Endpoint::aggregate(&self.class_name),
                Some(&body),
                true,
            )
            .await?;
        Ok(response.results)
    }

    /// Blocking [`Query::distinct_explain`]. Must not be called from an
    /// async context.
    pub fn distinct_explain_blocking<U, Tr>(
        &self,
        key: &str,
        client: &CairnClient<Tr>,
    ) -> Result<Vec<U>, CairnError>
    where
        U: DeserializeOwned,
        Tr: Transport,
    {
        run_blocking(self.distinct_explain(key, client))?
    }

    /// Runs [`Query::distinct_explain`] on the ambient runtime and hands
    /// the result to `callback`.
    pub fn distinct_explain_with_callback<U, Tr, F>(
        &self,
        key: &str,
        client: &CairnClient<Tr>,
        callback: F,
    ) where
        U: DeserializeOwned + Send + 'static,
        Tr: Transport,
        F: FnOnce(Result<Vec<U>, CairnError>) + Send + 'static,
    {
        let query = self.clone();
        let client = client.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            callback(query.distinct_explain(&key, &client).await);
        });
    }
}

impl<T: CairnObject> Default for Query<T> {
    fn default() -> Self {
        Query::new()
    }
}

impl<T: CairnObject> Clone for Query<T> {
    fn clone(&self) -> Self {
        Query {
            class_name: self.class_name.clone(),
            where_clause: self.where_clause.clone(),
            limit: self.limit,
            skip: self.skip,
            order: self.order.clone(),
            include: self.include.clone(),
            keys: self.keys.clone(),
            exclude_keys: self.exclude_keys.clone(),
            read_preference: self.read_preference.clone(),
            include_read_preference: self.include_read_preference.clone(),
            subquery_read_preference: self.subquery_read_preference.clone(),
            hint: self.hint.clone(),
            marker: PhantomData,
        }
    }
}

impl<T: CairnObject> Serialize for Query<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("limit", &self.limit)?;
        map.serialize_entry("skip", &self.skip)?;
        map.serialize_entry("_method", "GET")?;
        map.serialize_entry("where", &self.where_clause)?;
        if let Some(order) = &self.order {
            let specs: Vec<String> = order.iter().map(Order::key_spec).collect();
            map.serialize_entry("order", &specs)?;
        }
        if let Some(include) = &self.include {
            map.serialize_entry("include", include)?;
        }
        if let Some(keys) = &self.keys {
            map.serialize_entry("keys", keys)?;
        }
        if let Some(exclude_keys) = &self.exclude_keys {
            map.serialize_entry("excludeKeys", exclude_keys)?;
        }
        if let Some(read_preference) = &self.read_preference {
            map.serialize_entry("readPreference", read_preference)?;
        }
        if let Some(include_read_preference) = &self.include_read_preference {
            map.serialize_entry("includeReadPreference", include_read_preference)?;
        }
        if let Some(subquery_read_preference) = &self.subquery_read_preference {
            map.serialize_entry("subqueryReadPreference", subquery_read_preference)?;
        }
        if let Some(hint) = &self.hint {
            map.serialize_entry("hint", hint)?;
        }
        map.end()
    }
}

impl<T: CairnObject> PartialEq for Query<T> {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name
            && match (serde_json::to_value(self), serde_json::to_value(other)) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
    }
}

impl<T: CairnObject> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("class_name", &self.class_name)
            .field("where", &self.where_clause)
            .field("limit", &self.limit)
            .field("skip", &self.skip)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl<T: CairnObject> fmt::Display for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(body) => write!(f, "{} ({})", self.class_name, body),
            Err(_) => f.write_str(&self.class_name),
        }
    }
}

#[derive(Deserialize)]
struct FindResponse<U> {
    results: Vec<U>,
}

#[derive(Deserialize)]
struct CountResponse {
    count: Option<u64>,
}

#[derive(Serialize)]
struct AggregateBody<'a> {
    pipeline: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explain: Option<bool>,
}

#[derive(Serialize)]
struct DistinctBody<'a> {
    distinct: &'a str,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    where_clause: Option<&'a QueryWhere>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explain: Option<bool>,
}

#[cfg(test)]
mod query_tests {
    use super::*;
    use crate::constraint::equal_to;
    use serde_json::json;

    #[derive(Clone, Serialize, Deserialize)]
    struct GameScore {
        #[serde(rename = "objectId", skip_serializing_if = "Option::is_none")]
        object_id: Option<String>,
        #[serde(default)]
        score: i64,
    }

    impl CairnObject for GameScore {
        fn class_name() -> &'static str {
            "GameScore"
        }

        fn object_id(&self) -> Option<&str> {
            self.object_id.as_deref()
        }
    }

    #[test]
    fn test_default_body_shape() {
        let query = Query::<GameScore>::new();
        let body = serde_json::to_value(&query).unwrap();
        assert_eq!(
            body,
            json!({"limit": 100, "skip": 0, "_method": "GET", "where": {}})
        );
    }

    #[test]
    fn test_builders_land_in_body() {
        let query = Query::<GameScore>::new()
            .filter(equal_to("yolo", "yarr"))
            .limit(5)
            .skip(2)
            .order(&[Order::descending("score"), Order::ascending("createdAt")])
            .include(&["player"])
            .include(&["opponent"])
            .select(&["score"])
            .exclude(&["secret"])
            .hint("_id_");
        let body = serde_json::to_value(&query).unwrap();
        assert_eq!(
            body,
            json!({
                "limit": 5,
                "skip": 2,
                "_method": "GET",
                "where": {"yolo": "yarr"},
                "order": ["-score", "createdAt"],
                "include": ["opponent", "player"],
                "keys": ["score"],
                "excludeKeys": ["secret"],
                "hint": "_id_",
            })
        );
    }

    #[test]
    fn test_include_all_is_a_star() {
        let query = Query::<GameScore>::new().include_all();
        let body = serde_json::to_value(&query).unwrap();
        assert_eq!(body["include"], json!(["*"]));
    }

    #[test]
    fn test_equality_ignores_builder_call_order() {
        let a = Query::<GameScore>::new().limit(5).skip(2);
        let b = Query::<GameScore>::new().skip(2).limit(5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_display_names_the_class_and_body() {
        let rendered = Query::<GameScore>::new().to_string();
        assert!(rendered.starts_with("GameScore ("));
        assert!(rendered.contains("\"_method\":\"GET\""));
    }
}
