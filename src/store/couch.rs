//! CouchDB-compatible HTTP document store
//!
//! Routes:
//! - create     `POST /{db}` or `PUT /{db}/{id}`
//! - update     `PUT /{db}/{id}` with `_rev` in the body
//! - get        `GET /{db}/{id}?conflicts=..&revs=..`
//! - bulk_write `POST /{db}/_bulk_docs` with `new_edits: false`
//! - bulk_update `POST /{db}/_bulk_docs` with `_rev` on each document
//!
//! With `new_edits: false` the server stores each document at the position
//! named by its `_revisions` and only reports documents it refused. Anything
//! not reported is accepted at its declared revision. Each reported item
//! answers at most one submitted document.
//!
//! The interactive form answers every document, in submission order.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::errors::{StoreError, StoreResult};
use super::{
    Body, Document, DocumentStore, ErrorKind, ForcedUpdate, GetOptions, InteractiveUpdate,
    StoreCapabilities, StoreFuture, WriteResult,
};
use crate::revision::{RevisionChain, RevisionId};

/// Connection settings for a CouchDB-compatible server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouchConfig {
    /// Server root (default: "http://localhost:5984")
    #[serde(default = "default_url")]
    pub url: String,

    /// Database name (required, must already exist)
    pub database: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:5984".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl CouchConfig {
    /// Config for `database` on the default local server.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            url: default_url(),
            database: database.into(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// URL of `/{db}/{segments...}` with every segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| StoreError::Rejected(format!("invalid store url '{}': {}", self.url, e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StoreError::Rejected(format!("store url '{}' cannot be a base", self.url)))?;
            path.pop_if_empty();
            path.push(&self.database);
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }
}

/// `DocumentStore` over the CouchDB HTTP API.
#[derive(Debug, Clone)]
pub struct CouchDocumentStore {
    client: Client,
    config: CouchConfig,
}

#[derive(Debug, Deserialize)]
struct WriteAck {
    id: String,
    rev: RevisionId,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    id: String,
    #[serde(default)]
    rev: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl CouchDocumentStore {
    pub fn new(config: CouchConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("http client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CouchConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.password.as_ref()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Value> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    async fn create_doc(&self, id: Option<String>, body: Body) -> StoreResult<Document> {
        let request = match &id {
            Some(id) => self.client.put(self.config.endpoint(&[id.as_str()])?),
            None => self.client.post(self.config.endpoint(&[])?),
        };
        let value = self.send(request.json(&body)).await?;
        let ack: WriteAck =
            serde_json::from_value(value).map_err(|e| StoreError::Protocol(e.to_string()))?;

        Ok(Document {
            id: ack.id,
            revision: ack.rev,
            body,
            conflicts: Vec::new(),
            revisions: None,
        })
    }

    async fn update_doc(&self, id: &str, rev: &RevisionId, body: Body) -> StoreResult<Document> {
        let mut payload = body.clone();
        payload.insert("_rev".to_string(), Value::String(rev.to_string()));

        let request = self.client.put(self.config.endpoint(&[id])?).json(&payload);
        let value = self.send(request).await?;
        let ack: WriteAck =
            serde_json::from_value(value).map_err(|e| StoreError::Protocol(e.to_string()))?;

        Ok(Document {
            id: ack.id,
            revision: ack.rev,
            body,
            conflicts: Vec::new(),
            revisions: None,
        })
    }

    async fn get_doc(&self, id: &str, options: GetOptions) -> StoreResult<Document> {
        let request = self.client.get(self.config.endpoint(&[id])?).query(&[
            ("conflicts", options.conflicts.to_string()),
            ("revs", options.revs.to_string()),
        ]);
        parse_document(self.send(request).await?)
    }

    async fn bulk_docs(&self, updates: Vec<ForcedUpdate>) -> StoreResult<Vec<WriteResult>> {
        let docs: Vec<Value> = updates.iter().map(ForcedUpdate::to_json).collect();
        let request = self
            .client
            .post(self.config.endpoint(&["_bulk_docs"])?)
            .json(&json!({ "docs": docs, "new_edits": false }));

        let value = self.send(request).await?;
        let items: Vec<BulkItem> =
            serde_json::from_value(value).map_err(|e| StoreError::Protocol(e.to_string()))?;
        Ok(merge_bulk_response(&updates, items))
    }

    async fn bulk_edit(&self, updates: Vec<InteractiveUpdate>) -> StoreResult<Vec<WriteResult>> {
        let docs: Vec<Value> = updates.iter().map(InteractiveUpdate::to_json).collect();
        let request = self
            .client
            .post(self.config.endpoint(&["_bulk_docs"])?)
            .json(&json!({ "docs": docs }));

        let value = self.send(request).await?;
        let items: Vec<BulkItem> =
            serde_json::from_value(value).map_err(|e| StoreError::Protocol(e.to_string()))?;
        interactive_results(&updates, items)
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

async fn read_json(response: Response) -> StoreResult<Value> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(transport_error)?;
    decode_body(status, &bytes)
}

/// Successful bodies must be JSON. Error bodies only lend their `reason`;
/// the status decides the error.
fn decode_body(status: StatusCode, bytes: &[u8]) -> StoreResult<Value> {
    if status.is_success() {
        return serde_json::from_slice(bytes).map_err(|e| {
            StoreError::Protocol(format!("{} response is not valid JSON: {}", status, e))
        });
    }

    let reason = serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|value| value.get("reason").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
    Err(status_error(status, reason))
}

fn status_error(status: StatusCode, reason: String) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(reason),
        StatusCode::CONFLICT => StoreError::Conflict(reason),
        s if s.is_server_error() => StoreError::Unavailable(format!("{}: {}", s, reason)),
        s if s.is_client_error() => StoreError::Rejected(format!("{}: {}", s, reason)),
        s => StoreError::Protocol(format!("unexpected status {}: {}", s, reason)),
    }
}

/// Splits a raw CouchDB document into metadata and body.
fn parse_document(value: Value) -> StoreResult<Document> {
    let Value::Object(mut raw) = value else {
        return Err(StoreError::Protocol("document is not a JSON object".into()));
    };

    let id = match raw.remove("_id") {
        Some(Value::String(id)) => id,
        _ => return Err(StoreError::Protocol("document has no _id".into())),
    };
    let revision = match raw.remove("_rev") {
        Some(Value::String(rev)) => {
            RevisionId::parse(&rev).map_err(|e| StoreError::Protocol(e.to_string()))?
        }
        _ => return Err(StoreError::Protocol(format!("{} has no _rev", id))),
    };
    let conflicts = match raw.remove("_conflicts") {
        Some(value) => serde_json::from_value::<Vec<RevisionId>>(value)
            .map_err(|e| StoreError::Protocol(e.to_string()))?,
        None => Vec::new(),
    };
    let revisions = match raw.remove("_revisions") {
        Some(value) => Some(
            serde_json::from_value::<RevisionChain>(value)
                .map_err(|e| StoreError::Protocol(e.to_string()))?,
        ),
        None => None,
    };

    // remaining underscore fields are server metadata
    raw.retain(|key, _| !key.starts_with('_'));

    Ok(Document {
        id,
        revision,
        body: raw,
        conflicts,
        revisions,
    })
}

/// One result per update, in submission order.
///
/// An item naming a revision answers the update declaring exactly that
/// revision. An item without one answers the first still unanswered update
/// with its id. Either way an item is used once.
fn merge_bulk_response(updates: &[ForcedUpdate], items: Vec<BulkItem>) -> Vec<WriteResult> {
    let mut unclaimed: Vec<Option<BulkItem>> = items.into_iter().map(Some).collect();

    let mut claimed: Vec<Option<BulkItem>> = updates
        .iter()
        .map(|update| {
            let declared = update.declared_revision.to_string();
            claim(&mut unclaimed, |item| {
                item.id == update.id && item.rev.as_deref() == Some(declared.as_str())
            })
        })
        .collect();

    for (update, slot) in updates.iter().zip(claimed.iter_mut()) {
        if slot.is_none() {
            *slot = claim(&mut unclaimed, |item| item.id == update.id && item.rev.is_none());
        }
    }

    updates
        .iter()
        .zip(claimed)
        .map(|(update, item)| match item {
            Some(BulkItem {
                error: Some(error),
                reason,
                ..
            }) => rejected_item(&update.id, error, reason),
            _ => WriteResult::accepted(update.id.clone(), update.declared_revision.clone(), false),
        })
        .collect()
}

fn claim(items: &mut [Option<BulkItem>], answers: impl Fn(&BulkItem) -> bool) -> Option<BulkItem> {
    items
        .iter_mut()
        .find(|slot| matches!(slot, Some(item) if answers(item)))?
        .take()
}

fn rejected_item(id: &str, error: String, reason: Option<String>) -> WriteResult {
    let kind = match error.as_str() {
        "conflict" => ErrorKind::Conflict,
        _ => ErrorKind::WriteRejected,
    };
    WriteResult::rejected(id, kind, reason.unwrap_or(error))
}

/// Pairs an interactive `_bulk_docs` answer with its updates by position.
fn interactive_results(
    updates: &[InteractiveUpdate],
    items: Vec<BulkItem>,
) -> StoreResult<Vec<WriteResult>> {
    if items.len() != updates.len() {
        return Err(StoreError::Protocol(format!(
            "bulk edit answered {} of {} documents",
            items.len(),
            updates.len()
        )));
    }

    updates
        .iter()
        .zip(items)
        .map(|(update, item)| {
            if item.id != update.id {
                return Err(StoreError::Protocol(format!(
                    "bulk edit answered {} where {} was expected",
                    item.id, update.id
                )));
            }
            match (item.error, item.rev) {
                (Some(error), _) => Ok(rejected_item(&update.id, error, item.reason)),
                (None, Some(rev)) => {
                    let revision =
                        RevisionId::parse(&rev).map_err(|e| StoreError::Protocol(e.to_string()))?;
                    Ok(WriteResult::accepted(update.id.clone(), revision, false))
                }
                (None, None) => Err(StoreError::Protocol(format!(
                    "bulk edit answer for {} has neither rev nor error",
                    update.id
                ))),
            }
        })
        .collect()
}

impl DocumentStore for CouchDocumentStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            trusts_declared_ancestry: true,
        }
    }

    fn create(&self, id: Option<String>, body: Body) -> StoreFuture<'_, Document> {
        Box::pin(self.create_doc(id, body))
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        rev: &'a RevisionId,
        body: Body,
    ) -> StoreFuture<'a, Document> {
        Box::pin(self.update_doc(id, rev, body))
    }

    fn get<'a>(&'a self, id: &'a str, options: GetOptions) -> StoreFuture<'a, Document> {
        Box::pin(self.get_doc(id, options))
    }

    fn bulk_write(&self, updates: Vec<ForcedUpdate>) -> StoreFuture<'_, Vec<WriteResult>> {
        Box::pin(self.bulk_docs(updates))
    }

    fn bulk_update(&self, updates: Vec<InteractiveUpdate>) -> StoreFuture<'_, Vec<WriteResult>> {
        Box::pin(self.bulk_edit(updates))
    }
}
