//! Elasticsearch Client
//!
//! `DocumentStore` over the Elasticsearch REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{BulkSummary, Document, DocumentStore};
use crate::error::StoreError;
use crate::query::SearchRequest;

const ALREADY_EXISTS: &str = "resource_already_exists_exception";

// == Response Shapes ==
#[derive(Deserialize)]
struct GetResponse {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Value,
}

// == Elasticsearch Client ==
#[derive(Debug, Clone)]
pub struct ElasticsearchClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ElasticsearchClient {
    /// Creates a client for `http://{host}:{port}` whose requests give up after `timeout`.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(&format!("http://{}:{}/", host, port))
            .map_err(|err| StoreError::Unavailable(format!("invalid store address: {}", err)))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `{base}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, StoreError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        serde_json::from_str(&body).map_err(|err| StoreError::Rejected {
            status: status.as_u16(),
            message: format!("unreadable response body: {}", err),
        })
    } else {
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message: body,
        })
    }
}

/// `error.type` of an Elasticsearch error body.
fn error_type(body: &Value) -> Option<&str> {
    body.get("error")?.get("type")?.as_str()
}

fn parse_get(body: Value) -> Result<Option<Document>, StoreError> {
    let response: GetResponse =
        serde_json::from_value(body).map_err(|err| StoreError::Rejected {
            status: 200,
            message: format!("unexpected get response: {}", err),
        })?;
    match (response.found, response.source) {
        (true, Some(source)) => Ok(Some(Document::new(response.id, source))),
        _ => Ok(None),
    }
}

fn parse_search(body: Value) -> Result<Vec<Document>, StoreError> {
    let response: SearchResponse =
        serde_json::from_value(body).map_err(|err| StoreError::Rejected {
            status: 200,
            message: format!("unexpected search response: {}", err),
        })?;
    Ok(response
        .hits
        .hits
        .into_iter()
        .map(|hit| Document::new(hit.id, hit.source))
        .collect())
}

/// Newline-delimited action/source pairs for `_bulk`.
fn bulk_body(index: &str, docs: &[Document]) -> String {
    let mut body = String::new();
    for doc in docs {
        let action = json!({ "index": { "_index": index, "_id": doc.id } });
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&doc.source.to_string());
        body.push('\n');
    }
    body
}

fn parse_bulk(body: &Value, submitted: usize) -> BulkSummary {
    let failed = body
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("index").and_then(|op| op.get("error")).is_some())
                .count()
        })
        .unwrap_or(0);
    BulkSummary {
        indexed: submitted.saturating_sub(failed),
        failed,
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchClient {
    async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let response = self
            .http
            .get(self.endpoint(&[index, "_doc", id]))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Document '{}' not found in '{}'", id, index);
            return Ok(None);
        }
        parse_get(read_json(response).await?)
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<Vec<Document>, StoreError> {
        let response = self
            .http
            .post(self.endpoint(&[index, "_search"]))
            .json(&request.body())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            warn!("Search against missing index '{}'", index);
            return Ok(Vec::new());
        }
        parse_search(read_json(response).await?)
    }

    async fn create_index(&self, index: &str, schema: &Value) -> Result<(), StoreError> {
        let response = self
            .http
            .put(self.endpoint(&[index]))
            .json(schema)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        if error_type(&body) == Some(ALREADY_EXISTS) {
            return Err(StoreError::IndexExists(index.to_string()));
        }
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message: text,
        })
    }

    async fn bulk_index(
        &self,
        index: &str,
        docs: Vec<Document>,
    ) -> Result<BulkSummary, StoreError> {
        if docs.is_empty() {
            return Ok(BulkSummary::default());
        }

        let response = self
            .http
            .post(self.endpoint(&["_bulk"]))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(bulk_body(index, &docs))
            .send()
            .await?;

        let body = read_json(response).await?;
        Ok(parse_bulk(&body, docs.len()))
    }

    async fn ping(&self) -> bool {
        match self.http.get(self.base_url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                warn!("Elasticsearch ping failed: {}", err);
                false
            }
        }
    }
}
