/// Linode API client
pub mod models;
pub mod path;

use reqwest::{header, Client, Method};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use self::models::{ErrorResponse, Page};
pub use self::path::{expand_path, PathContext};
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Main Linode API client
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone)]
pub struct LinodeClient {
    client: Client,
    base_url: String,
    volatile_refresh: Duration,
    page_size: u32,
}

impl std::fmt::Debug for LinodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinodeClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl LinodeClient {
    /// Create a client against the public API with default settings
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        Self::from_config(&ClientConfig {
            token: Some(api_token.into()),
            ..ClientConfig::default()
        })
    }

    /// Create a client against a different API root, e.g. a mock server
    pub fn with_base_url(api_token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::from_config(&ClientConfig {
            token: Some(api_token.into()),
            base_url: base_url.into(),
            ..ClientConfig::default()
        })
    }

    /// Create a client from a loaded configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .or_else(|| std::env::var("LINODE_TOKEN").ok())
            .ok_or_else(|| Error::Config("no API token configured".to_string()))?;

        url::Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {}: {}", config.base_url, e)))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::Config("invalid API token format".to_string()))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            volatile_refresh: config.volatile_refresh(),
            page_size: config.page_size,
        })
    }

    /// Snapshot age after which volatile properties are re-fetched
    pub fn volatile_refresh(&self) -> Duration {
        self.volatile_refresh
    }

    /// Make a GET request to the API
    pub async fn get(&self, template: &str, model: Option<&dyn PathContext>) -> Result<Value> {
        self.request(Method::GET, template, model, None).await
    }

    /// Make a POST request to the API
    pub async fn post(
        &self,
        template: &str,
        model: Option<&dyn PathContext>,
        body: Option<&Value>,
    ) -> Result<Value> {
        self.request(Method::POST, template, model, body).await
    }

    /// Make a PUT request to the API
    pub async fn put(
        &self,
        template: &str,
        model: Option<&dyn PathContext>,
        body: &Value,
    ) -> Result<Value> {
        self.request(Method::PUT, template, model, Some(body)).await
    }

    /// Make a DELETE request to the API; empty bodies come back as `Value::Null`
    pub async fn delete(&self, template: &str, model: Option<&dyn PathContext>) -> Result<Value> {
        self.request(Method::DELETE, template, model, None).await
    }

    /// Read every page of a collection and return the concatenated `data` items
    pub async fn get_all(
        &self,
        template: &str,
        model: Option<&dyn PathContext>,
    ) -> Result<Vec<Value>> {
        let path = expand_path(template, model)?;
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}{}?page={}&page_size={}",
                self.base_url, path, page, self.page_size
            );
            debug!("GET {}", url);
            let response = self.client.get(&url).send().await?;
            let json = self.handle_response(&path, response).await?;
            let parsed: Page = serde_json::from_value(json.clone())
                .map_err(|_| Error::unexpected("collection response without 'data'", &json))?;

            // Some endpoints ignore paging params; stop on our own counter
            let done = parsed.data.is_empty() || page >= parsed.pages;
            items.extend(parsed.data);
            if done {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    async fn request(
        &self,
        method: Method,
        template: &str,
        model: Option<&dyn PathContext>,
        body: Option<&Value>,
    ) -> Result<Value> {
        let path = expand_path(template, model)?;
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        self.handle_response(&path, response).await
    }

    /// Handle API response, checking for errors
    async fn handle_response(&self, path: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                path: path.to_string(),
            });
        }

        if !status.is_success() {
            let reasons = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(error_response) => error_response.errors.iter().map(|e| e.describe()).collect(),
                Err(_) => {
                    warn!("Unstructured error body for {} ({})", path, status);
                    vec![body]
                }
            };
            return Err(Error::Api {
                status: status.as_u16(),
                reasons,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Cluster(u64);

    impl PathContext for Cluster {
        fn identifier(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_client_creation() {
        let result = LinodeClient::new("test-token");
        assert!(result.is_ok());
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let result = LinodeClient::with_base_url("test-token", "not a url");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_get_substitutes_and_authenticates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lke/clusters/18881"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 18881})))
            .expect(1)
            .mount(&server)
            .await;

        let client = LinodeClient::with_base_url("test-token", server.uri()).unwrap();
        let json = client
            .get("/lke/clusters/{id}", Some(&Cluster(18881)))
            .await
            .unwrap();
        assert_eq!(json["id"], 18881);
    }

    #[tokio::test]
    async fn test_404_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lke/clusters/1"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"errors": [{"reason": "Not found"}]})),
            )
            .mount(&server)
            .await;

        let client = LinodeClient::with_base_url("t", server.uri()).unwrap();
        let err = client
            .get("/lke/clusters/{id}", Some(&Cluster(1)))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_api_errors_carry_reasons() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/lke/clusters/1"))
            .and(body_json(json!({"label": ""})))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errors": [{"field": "label", "reason": "Label must be 1-32 characters"}]
            })))
            .mount(&server)
            .await;

        let client = LinodeClient::with_base_url("t", server.uri()).unwrap();
        let err = client
            .put("/lke/clusters/{id}", Some(&Cluster(1)), &json!({"label": ""}))
            .await
            .unwrap_err();
        match err {
            Error::Api { status, reasons } => {
                assert_eq!(status, 400);
                assert_eq!(reasons, vec!["label: Label must be 1-32 characters".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_delete_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/lke/clusters/1/kubeconfig"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = LinodeClient::with_base_url("t", server.uri()).unwrap();
        let json = client
            .delete("/lke/clusters/{id}/kubeconfig", Some(&Cluster(1)))
            .await
            .unwrap();
        assert!(json.is_null());
    }

    #[tokio::test]
    async fn test_get_all_walks_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lke/clusters/1/pools"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": 1}], "page": 1, "pages": 2, "results": 2
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lke/clusters/1/pools"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": 2}], "page": 2, "pages": 2, "results": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LinodeClient::with_base_url("t", server.uri()).unwrap();
        let items = client
            .get_all("/lke/clusters/{id}/pools", Some(&Cluster(1)))
            .await
            .unwrap();
        let ids: Vec<i64> = items.iter().filter_map(|i| i["id"].as_i64()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_get_all_stops_when_server_ignores_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lke/clusters/1/api-endpoints"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": 1}], "page": 1, "pages": 2
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = LinodeClient::with_base_url("t", server.uri()).unwrap();
        let items = tokio::time::timeout(
            Duration::from_secs(3),
            client.get_all("/lke/clusters/{id}/api-endpoints", Some(&Cluster(1))),
        )
        .await
        .expect("collection walk did not terminate")
        .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_get_all_stops_on_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lke/clusters/1/pools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [], "page": 1, "pages": 5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LinodeClient::with_base_url("t", server.uri()).unwrap();
        let items = client
            .get_all("/lke/clusters/{id}/pools", Some(&Cluster(1)))
            .await
            .unwrap();
        assert!(items.is_empty());
    }
}
