//! Control-Plane API Client
//!
//! Thin reqwest wrapper for the CDN vendor's REST API. Every call is a single
//! request/response exchange; the client adds authentication, joins the base
//! URL and decodes the JSON body. Requests are never retried.

use std::fmt;
use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// Production API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.fastly.com";

/// Header carrying the API token (`Fastly-Key`).
pub const AUTH_HEADER: &str = "fastly-key";

/// HTTP verbs the API uses.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    fn as_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A fully rendered request, ready to send.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the API base URL, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    /// URL-encoded form body
    pub form: Vec<(String, String)>,
    /// JSON body (mutually exclusive with `form`)
    pub json: Option<Value>,
}

/// Client for the control-plane API.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a client that authenticates with `token`.
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut key = HeaderValue::from_str(token).map_err(|e| ApiError::Network {
            message: format!("invalid API token: {}", e),
        })?;
        key.set_sensitive(true);
        headers.insert(AUTH_HEADER, key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins a request path onto the base URL.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Sends a request and decodes the JSON response.
    ///
    /// An empty success body decodes to `null`.
    pub async fn send(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let url = self.url_for(&request.path);
        debug!("Sending {} {}", request.method, url);

        let mut builder = self.client.request(request.method.as_reqwest(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(json) = &request.json {
            builder = builder.json(json);
        } else if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(server.uri(), "test-token", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_for() {
        let client = ApiClient::new("https://api.example.com/", "t", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com");
        assert_eq!(client.url_for("/service"), "https://api.example.com/service");
        assert_eq!(client.url_for("service"), "https://api.example.com/service");
    }

    #[test]
    fn test_http_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert_eq!(HttpMethod::default(), HttpMethod::Get);
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result = ApiClient::new("https://api.example.com", "bad\ntoken", Duration::from_secs(1));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_send_form_with_auth_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/service"))
            .and(header(AUTH_HEADER, "test-token"))
            .and(body_string_contains("name=Api+Service"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "svc1"})))
            .mount(&server)
            .await;

        let request = ApiRequest {
            method: HttpMethod::Post,
            path: "/service".to_string(),
            form: vec![("name".to_string(), "Api Service".to_string())],
            ..Default::default()
        };

        let value = client_for(&server).send(&request).await.unwrap();
        assert_eq!(value, json!({"id": "svc1"}));
    }

    #[tokio::test]
    async fn test_send_query_parameters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/stats"))
            .and(query_param("by", "hour"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let request = ApiRequest {
            path: "/stats".to_string(),
            query: vec![("by".to_string(), "hour".to_string())],
            ..Default::default()
        };

        let value = client_for(&server).send(&request).await.unwrap();
        assert_eq!(value, json!({"data": []}));
    }

    #[tokio::test]
    async fn test_send_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/service/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{\"msg\":\"Record not found\"}"))
            .mount(&server)
            .await;

        let request = ApiRequest {
            path: "/service/missing".to_string(),
            ..Default::default()
        };

        match client_for(&server).send(&request).await {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("Record not found"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_empty_body_is_null() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/thing"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let request = ApiRequest {
            method: HttpMethod::Delete,
            path: "/thing".to_string(),
            ..Default::default()
        };

        assert_eq!(client_for(&server).send(&request).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_send_invalid_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let request = ApiRequest {
            path: "/broken".to_string(),
            ..Default::default()
        };

        let err = client_for(&server).send(&request).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_send_network_error() {
        // Nothing listens on port 9 (discard) in the test environment.
        let client = ApiClient::new("http://127.0.0.1:9", "t", Duration::from_secs(2)).unwrap();
        let request = ApiRequest {
            path: "/service".to_string(),
            ..Default::default()
        };

        let err = client.send(&request).await.unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
    }
}
