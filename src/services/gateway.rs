use std::future::Future;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::knowledge_base::{
    Connection, CreateKnowledgeBaseBody, IndexRequest, IndexingParams, KnowledgeBaseRef,
};
use crate::models::resource::Resource;

/// Remote listing and indexing calls, already scoped to an authenticated user.
pub trait ResourceGateway: Send + Sync + 'static {
    /// Lists a folder's children; `None` lists the connection's top level.
    fn list_children(
        &self,
        connection_id: &str,
        folder_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Resource>, AppError>> + Send;

    fn list_indexed_resources(
        &self,
        knowledge_base_id: &str,
    ) -> impl Future<Output = Result<Vec<Resource>, AppError>> + Send;

    fn create_or_extend_index(
        &self,
        request: &IndexRequest,
    ) -> impl Future<Output = Result<KnowledgeBaseRef, AppError>> + Send;

    /// Deletes by path; callers resolve the resource's current path first.
    fn delete_indexed_resource(
        &self,
        knowledge_base_id: &str,
        resource_path: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn probe_indexed(&self, resource_id: &str)
        -> impl Future<Output = Result<bool, AppError>> + Send;
}

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    indexing_params: IndexingParams,
}

#[derive(Debug, Deserialize)]
struct IndexStatusBody {
    #[serde(rename = "isIndexed", default)]
    is_indexed: bool,
}

impl HttpGateway {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            indexing_params: config.indexing_params.clone(),
        })
    }

    pub fn set_access_token(&mut self, token: Option<String>) {
        self.access_token = token;
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, AppError> {
        let token = self
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AppError::NotAuthenticated)?;
        Ok(request.bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response, AppError> {
        let response = self.authorized(request)?.send().await?;
        match status_error(response.status(), context) {
            Some(err) => Err(err),
            None => Ok(response),
        }
    }

    /// Connections available to the signed-in user.
    pub async fn list_connections(&self) -> Result<Vec<Connection>, AppError> {
        let url = format!("{}/connections", self.base_url);
        let request = self
            .client
            .get(&url)
            .query(&[("connection_provider", "gdrive"), ("limit", "5")]);
        let response = self.send(request, "connections").await?;
        let body = response.bytes().await?;
        Ok(parse_connection_list(&body))
    }

    async fn fetch_resources(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<Vec<Resource>, AppError> {
        let response = match self.send(request, context).await {
            Ok(response) => response,
            Err(err) if err.is_not_found() => {
                debug!(context, "listing not found, treating as empty");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };
        let body = response.bytes().await?;
        Ok(parse_resource_list(&body, context))
    }
}

impl ResourceGateway for HttpGateway {
    async fn list_children(
        &self,
        connection_id: &str,
        folder_id: Option<&str>,
    ) -> Result<Vec<Resource>, AppError> {
        let url = format!(
            "{}/connections/{connection_id}/resources/children",
            self.base_url
        );
        let mut request = self.client.get(&url);
        if let Some(folder_id) = folder_id.filter(|id| *id != "/") {
            request = request.query(&[("resource_id", folder_id)]);
        }
        self.fetch_resources(request, "connection resources").await
    }

    async fn list_indexed_resources(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Vec<Resource>, AppError> {
        let url = format!(
            "{}/knowledge_bases/{knowledge_base_id}/resources/children",
            self.base_url
        );
        let request = self.client.get(&url).query(&[("resource_path", "/")]);
        self.fetch_resources(request, "knowledge base resources")
            .await
    }

    async fn create_or_extend_index(
        &self,
        request: &IndexRequest,
    ) -> Result<KnowledgeBaseRef, AppError> {
        let body = CreateKnowledgeBaseBody {
            connection_id: &request.connection_id,
            connection_source_ids: &request.resource_ids,
            name: &request.name,
            description: &request.description,
            org_id: &request.org_id,
            content_mime: request.content_mime.as_deref(),
            indexing_params: &self.indexing_params,
        };
        let url = format!("{}/knowledge_bases", self.base_url);
        let response = self
            .send(self.client.post(&url).json(&body), "create knowledge base")
            .await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|err| AppError::MalformedResponse(format!("create knowledge base: {err}")))
    }

    async fn delete_indexed_resource(
        &self,
        knowledge_base_id: &str,
        resource_path: &str,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/knowledge_bases/{knowledge_base_id}/resources",
            self.base_url
        );
        let request = self
            .client
            .delete(&url)
            .query(&[("resource_path", resource_path)]);
        self.send(request, "delete knowledge base resource").await?;
        Ok(())
    }

    async fn probe_indexed(&self, resource_id: &str) -> Result<bool, AppError> {
        let url = format!("{}/index/status/{resource_id}", self.base_url);
        let response = self.send(self.client.get(&url), "index status").await?;
        let bytes = response.bytes().await?;
        let body: IndexStatusBody = serde_json::from_slice(&bytes)
            .map_err(|err| AppError::MalformedResponse(format!("index status: {err}")))?;
        Ok(body.is_indexed)
    }
}

fn status_error(status: StatusCode, context: &str) -> Option<AppError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::NotAuthenticated,
        StatusCode::NOT_FOUND => AppError::NotFound(context.to_string()),
        other => AppError::Network(format!("{context}: {other}")),
    })
}

/// Listings come back either as a bare array or wrapped in `{ "data": [...] }`.
fn unwrap_collection(value: serde_json::Value) -> Vec<serde_json::Value> {
    match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("data") {
            Some(serde_json::Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Decodes a listing body, degrading to an empty or partial collection
/// instead of failing.
pub(crate) fn parse_resource_list(body: &[u8], context: &str) -> Vec<Resource> {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => {
            warn!(context, error = %err, "malformed listing body");
            return Vec::new();
        }
    };
    unwrap_collection(value)
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Resource>(item) {
            Ok(resource) => Some(resource.normalize()),
            Err(err) => {
                warn!(context, error = %err, "skipping malformed resource");
                None
            }
        })
        .collect()
}

pub(crate) fn parse_connection_list(body: &[u8]) -> Vec<Connection> {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "malformed connections response");
            return Vec::new();
        }
    };
    unwrap_collection(value)
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Connection>(item) {
            Ok(connection) => Some(connection),
            Err(err) => {
                warn!(error = %err, "skipping malformed connection");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = r#"{
        "resource_id": "r1",
        "inode_type": "file",
        "inode_path": { "path": "docs/a.pdf" },
        "modified_at": "2024-05-01T00:00:00Z"
    }"#;

    #[test]
    fn accepts_wrapped_and_bare_listings() {
        let wrapped = format!(r#"{{ "data": [{ENTRY}] }}"#);
        let bare = format!("[{ENTRY}]");
        for body in [wrapped, bare] {
            let resources = parse_resource_list(body.as_bytes(), "test");
            assert_eq!(resources.len(), 1);
            assert_eq!(resources[0].resource_id, "r1");
            assert_eq!(
                resources[0].modified_time.as_deref(),
                Some("2024-05-01T00:00:00Z")
            );
        }
    }

    #[test]
    fn malformed_bodies_degrade_to_empty() {
        assert!(parse_resource_list(b"<html>oops</html>", "test").is_empty());
        assert!(parse_resource_list(br#"{ "items": [] }"#, "test").is_empty());
        assert!(parse_resource_list(b"42", "test").is_empty());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let body = format!(r#"[{ENTRY}, {{ "resource_id": "broken" }}]"#);
        let resources = parse_resource_list(body.as_bytes(), "test");
        assert_eq!(resources.len(), 1);
    }

    #[test]
    fn decodes_connection_listings() {
        let entry = r#"{ "connection_id": "c1", "name": "Google Drive" }"#;
        let wrapped = format!(r#"{{ "data": [{entry}, {{ "name": "no id" }}] }}"#);
        let bare = format!("[{entry}]");
        for body in [wrapped, bare] {
            let connections = parse_connection_list(body.as_bytes());
            assert_eq!(
                connections,
                vec![Connection {
                    connection_id: "c1".to_string(),
                    name: "Google Drive".to_string(),
                }]
            );
        }
        assert!(parse_connection_list(b"not json").is_empty());
        assert!(parse_connection_list(br#"{ "error": "nope" }"#).is_empty());
    }

    #[test]
    fn maps_statuses_to_error_taxonomy() {
        assert!(status_error(StatusCode::OK, "x").is_none());
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "x"),
            Some(AppError::NotAuthenticated)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "x"),
            Some(AppError::NotFound(_))
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "x"),
            Some(AppError::Network(_))
        ));
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let config = AppConfig {
            access_token: None,
            ..AppConfig::default()
        };
        let mut gateway = HttpGateway::new(&config).unwrap();
        let err = gateway.probe_indexed("r1").await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated));
        let err = gateway.list_connections().await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated));

        gateway.set_access_token(Some(String::new()));
        let err = gateway.list_connections().await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated));
    }
}
