//! Firestore REST adapter.
//!
//! Talks to the hosted document database over its v1 REST surface:
//! `documents:commit` for writes (with `exists` preconditions and
//! `REQUEST_TIME` transforms for the server timestamps), `documents:runQuery`
//! for ordered queries and plain GETs for single documents. The REST surface
//! has no push channel, so subscriptions poll it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};

use super::{
    generate_key, Direction, Document, DocumentStore, Query, StoreError, StoredDocument,
    CREATED_AT_FIELD, UPDATED_AT_FIELD,
};
use crate::config::FirebaseConfig;

/// Document store backed by a hosted Firestore database.
pub struct FirestoreStore {
    http: reqwest::Client,
    /// `{base}/projects/{project}/databases/{database}/documents`
    documents_url: String,
    /// `projects/{project}/databases/{database}/documents`
    documents_path: String,
    api_key: Option<String>,
    auth_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(config: &FirebaseConfig, timeout: Duration) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let documents_path = format!(
            "projects/{}/databases/{}/documents",
            config.project_id, config.database
        );
        let documents_url = format!(
            "{}/{}",
            config.firestore_url.trim_end_matches('/'),
            documents_path
        );

        Ok(Self {
            http,
            documents_url,
            documents_path,
            api_key: config.api_key.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    /// Full resource name of a document.
    pub fn document_name(&self, collection: &str, key: &str) -> String {
        format!("{}/{}/{}", self.documents_path, collection, key)
    }

    fn document_url(&self, collection: &str, key: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.documents_url)
            .map_err(|e| StoreError::Decode(format!("invalid Firestore URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Decode("Firestore URL cannot take a path".to_string()))?
            .push(collection)
            .push(key);
        Ok(url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut req = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            req = req.query(&[("key", key)]);
        }
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn commit(&self, write: Value) -> Result<(), ServiceFailure> {
        let url = format!("{}:commit", self.documents_url);
        let response = self
            .request(Method::POST, &url)
            .json(&json!({ "writes": [write] }))
            .send()
            .await
            .map_err(ServiceFailure::Transport)?;

        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ServiceFailure::from_body(status, &body))
    }

    /// Write creating `key`, failing if it already exists.
    pub fn create_write(&self, collection: &str, key: &str, data: &Document) -> Value {
        json!({
            "update": {
                "name": self.document_name(collection, key),
                "fields": encode_fields(&without_server_fields(data)),
            },
            "currentDocument": { "exists": false },
            "updateTransforms": [
                server_time_transform(CREATED_AT_FIELD),
                server_time_transform(UPDATED_AT_FIELD),
            ],
        })
    }

    /// Write merging `patch` into an existing document.
    pub fn update_write(&self, collection: &str, key: &str, patch: &Document) -> Value {
        let patch = without_server_fields(patch);
        let mask: Vec<String> = patch.keys().map(|k| quote_field_path(k)).collect();
        json!({
            "update": {
                "name": self.document_name(collection, key),
                "fields": encode_fields(&patch),
            },
            "updateMask": { "fieldPaths": mask },
            "currentDocument": { "exists": true },
            "updateTransforms": [server_time_transform(UPDATED_AT_FIELD)],
        })
    }

    /// `structuredQuery` body for an ordered, limited query.
    pub fn structured_query(query: &Query) -> Value {
        let direction = match query.direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        let mut structured = json!({
            "from": [{ "collectionId": query.collection }],
            "orderBy": [{
                "field": { "fieldPath": quote_field_path(&query.order_by) },
                "direction": direction,
            }],
        });
        if let Some(limit) = query.limit {
            structured["limit"] = json!(limit);
        }
        json!({ "structuredQuery": structured })
    }

    async fn create_at(&self, collection: &str, key: &str, data: &Document) -> Result<(), StoreError> {
        match self.commit(self.create_write(collection, key, data)).await {
            Ok(()) => Ok(()),
            Err(failure) if failure.is_conflict() => Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                key: key.to_string(),
            }),
            Err(failure) => Err(failure.into()),
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn create(&self, collection: &str, key: &str, data: Document) -> Result<(), StoreError> {
        self.create_at(collection, key, &data).await
    }

    async fn create_with_generated_key(
        &self,
        collection: &str,
        data: Document,
    ) -> Result<String, StoreError> {
        let key = generate_key();
        self.create_at(collection, &key, &data).await?;
        Ok(key)
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        patch: Document,
    ) -> Result<(), StoreError> {
        match self.commit(self.update_write(collection, key, &patch)).await {
            Ok(()) => Ok(()),
            Err(failure) if failure.is_not_found() => Err(StoreError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            }),
            Err(failure) => Err(failure.into()),
        }
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        let url = self.document_url(collection, key)?;
        let response = self.request(Method::GET, url.as_str()).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceFailure::from_body(status, &body).into());
        }

        let body: Value = response.json().await?;
        decode_document(&body).map(Some)
    }

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError> {
        let url = format!("{}:runQuery", self.documents_url);
        let response = self
            .request(Method::POST, &url)
            .json(&Self::structured_query(query))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceFailure::from_body(status, &body).into());
        }

        let body: Value = response.json().await?;
        parse_run_query_response(&body)
    }

    fn name(&self) -> &'static str {
        "firestore"
    }
}

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug)]
enum ServiceFailure {
    Transport(reqwest::Error),
    Status {
        code: u16,
        status: String,
        message: String,
    },
}

impl ServiceFailure {
    fn from_body(code: StatusCode, body: &str) -> Self {
        let (status, message) = match serde_json::from_str::<GoogleErrorBody>(body) {
            Ok(parsed) => (parsed.error.status, parsed.error.message),
            Err(_) => (String::new(), body.trim().to_string()),
        };
        ServiceFailure::Status {
            code: code.as_u16(),
            status,
            message,
        }
    }

    /// A create precondition (`exists: false`) was violated.
    fn is_conflict(&self) -> bool {
        match self {
            ServiceFailure::Status { code, status, .. } => {
                *code == 409 || status == "ALREADY_EXISTS"
            }
            ServiceFailure::Transport(_) => false,
        }
    }

    fn is_not_found(&self) -> bool {
        match self {
            ServiceFailure::Status { code, status, .. } => *code == 404 || status == "NOT_FOUND",
            ServiceFailure::Transport(_) => false,
        }
    }
}

impl From<ServiceFailure> for StoreError {
    fn from(failure: ServiceFailure) -> Self {
        match failure {
            ServiceFailure::Transport(e) => StoreError::Http(e),
            ServiceFailure::Status {
                code,
                status,
                message,
            } => StoreError::Service {
                status: code,
                message: if status.is_empty() {
                    message
                } else {
                    format!("{} ({})", message, status)
                },
            },
        }
    }
}

// ─── Value codec ────────────────────────────────────────────────────────────

fn server_time_transform(field: &str) -> Value {
    json!({ "fieldPath": field, "setToServerValue": "REQUEST_TIME" })
}

fn without_server_fields(data: &Document) -> Document {
    data.iter()
        .filter(|(k, _)| k.as_str() != CREATED_AT_FIELD && k.as_str() != UPDATED_AT_FIELD)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Quotes a field name with backticks unless it is a simple identifier.
pub fn quote_field_path(field: &str) -> String {
    let simple = field
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Encodes a JSON value as a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn encode_fields(doc: &Document) -> Value {
    let fields: Map<String, Value> = doc
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    Value::Object(fields)
}

/// Decodes a Firestore typed value into plain JSON. Timestamps, bytes and
/// references become strings.
pub fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let map = value
        .as_object()
        .ok_or_else(|| StoreError::Decode(format!("typed value is not an object: {}", value)))?;
    let (kind, inner) = map
        .iter()
        .next()
        .ok_or_else(|| StoreError::Decode("empty typed value".to_string()))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or(false))),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| StoreError::Decode(format!("bad integerValue: {}", inner)))
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            Ok(parsed
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        "timestampValue" | "stringValue" | "bytesValue" | "referenceValue" => {
            Ok(Value::String(inner.as_str().unwrap_or_default().to_string()))
        }
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = match inner.get("values").and_then(Value::as_array) {
                Some(items) => items.iter().map(decode_value).collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            Ok(Value::Array(values))
        }
        "mapValue" => Ok(Value::Object(decode_fields(inner.get("fields"))?)),
        other => Err(StoreError::Decode(format!("unknown value type '{}'", other))),
    }
}

pub fn decode_fields(fields: Option<&Value>) -> Result<Document, StoreError> {
    let Some(fields) = fields else {
        return Ok(Document::new());
    };
    let map = fields
        .as_object()
        .ok_or_else(|| StoreError::Decode("fields is not an object".to_string()))?;
    map.iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

/// Decodes a Firestore `Document` resource.
pub fn decode_document(doc: &Value) -> Result<StoredDocument, StoreError> {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode("document without name".to_string()))?;
    let id = name.rsplit('/').next().unwrap_or(name).to_string();
    let data = decode_fields(doc.get("fields"))?;
    Ok(StoredDocument::new(id, data))
}

/// Decodes the streamed array returned by `documents:runQuery`. Entries
/// without a document (progress markers) are skipped.
pub fn parse_run_query_response(body: &Value) -> Result<Vec<StoredDocument>, StoreError> {
    let entries = body
        .as_array()
        .ok_or_else(|| StoreError::Decode("runQuery response is not an array".to_string()))?;
    entries
        .iter()
        .filter_map(|entry| entry.get("document"))
        .map(decode_document)
        .collect()
}
