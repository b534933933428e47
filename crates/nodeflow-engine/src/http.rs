use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use nodeflow_core::config::ProviderCredentials;
use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::types::{ApiProvider, ApiRouteConfig, HttpMethod};

/// Executes the HTTP request configured on an API node.
pub struct ApiExecutor {
    http: Client,
    credentials: ProviderCredentials,
}

impl ApiExecutor {
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self::with_client(Client::new(), credentials)
    }

    pub fn with_client(http: Client, credentials: ProviderCredentials) -> Self {
        Self { http, credentials }
    }

    /// Send the request and decode the JSON response.
    ///
    /// Credential problems are reported before any network traffic.
    pub async fn execute(&self, route: &ApiRouteConfig) -> Result<Value> {
        let headers = self.build_headers(route)?;
        let method = route.method();

        let mut req = self
            .http
            .request(to_reqwest_method(method), &route.url)
            .headers(headers);

        if method.allows_body() {
            if let Some(body) = &route.body {
                req = req.body(serde_json::to_vec(body)?);
            }
        }

        debug!(method = %method, url = %route.url, "Sending API node request");

        let response = req
            .send()
            .await
            .map_err(|e| NodeflowError::HttpRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NodeflowError::HttpStatus(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| NodeflowError::HttpRequest(format!("Failed to parse response: {}", e)))
    }

    /// JSON content type, then the route's own headers, then provider auth.
    fn build_headers(&self, route: &ApiRouteConfig) -> Result<HeaderMap> {
        let auth = match route.provider {
            Some(ApiProvider::Stripe) => {
                let key = self.credentials.stripe_secret_key.as_deref().ok_or_else(|| {
                    NodeflowError::MissingCredential {
                        provider: "Stripe".to_string(),
                    }
                })?;
                Some(format!("Bearer {}", key))
            }
            Some(ApiProvider::Custom) | None => None,
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (k, v) in &route.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|_| NodeflowError::HttpRequest(format!("Invalid header name: {}", k)))?;
            let value = HeaderValue::from_str(v)
                .map_err(|_| NodeflowError::HttpRequest(format!("Invalid value for header {}", k)))?;
            headers.insert(name, value);
        }

        if let Some(auth) = auth {
            let value = HeaderValue::from_str(&auth)
                .map_err(|_| NodeflowError::Config("Stripe API key is not a valid header value".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap as AxumHeaders;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use nodeflow_test_utils::spawn_stub_server;
    use serde_json::json;

    fn stripe_credentials() -> ProviderCredentials {
        ProviderCredentials {
            stripe_secret_key: Some("sk_test_abc".into()),
        }
    }

    async fn echo(headers: AxumHeaders, body: String) -> Json<Value> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Json(json!({
            "content_type": header("content-type"),
            "authorization": header("authorization"),
            "x_trace": header("x-trace"),
            "body": body,
        }))
    }

    fn echo_router() -> Router {
        Router::new()
            .route("/echo", get(echo).post(echo).put(echo))
            .route("/missing", get(|| async { (axum::http::StatusCode::NOT_FOUND, "nope") }))
            .route("/text", post(|| async { "plain text" }))
    }

    #[tokio::test]
    async fn test_get_sends_json_content_type_and_no_body() {
        let base = spawn_stub_server(echo_router()).await;
        let exec = ApiExecutor::new(ProviderCredentials::default());
        let route = ApiRouteConfig::new(HttpMethod::Get, format!("{}/echo", base))
            .with_header("X-Trace", "abc")
            .with_body(json!({"ignored": true}));

        let value = exec.execute(&route).await.unwrap();
        assert_eq!(value["content_type"], "application/json");
        assert_eq!(value["x_trace"], "abc");
        assert_eq!(value["body"], "");
        assert!(value["authorization"].is_null());
    }

    #[tokio::test]
    async fn test_put_sends_json_body() {
        let base = spawn_stub_server(echo_router()).await;
        let exec = ApiExecutor::new(ProviderCredentials::default());
        let route = ApiRouteConfig::new(HttpMethod::Put, format!("{}/echo", base))
            .with_body(json!({"name": "widget"}));

        let value = exec.execute(&route).await.unwrap();
        let sent: Value = serde_json::from_str(value["body"].as_str().unwrap()).unwrap();
        assert_eq!(sent, json!({"name": "widget"}));
    }

    #[tokio::test]
    async fn test_stripe_injects_bearer() {
        let base = spawn_stub_server(echo_router()).await;
        let exec = ApiExecutor::new(stripe_credentials());
        let route = ApiRouteConfig::new(HttpMethod::Get, format!("{}/echo", base))
            .with_header("Authorization", "Bearer user-supplied")
            .with_provider(ApiProvider::Stripe);

        let value = exec.execute(&route).await.unwrap();
        assert_eq!(value["authorization"], "Bearer sk_test_abc");
    }

    #[tokio::test]
    async fn test_stripe_without_key_fails_before_request() {
        let exec = ApiExecutor::new(ProviderCredentials::default());
        // Unroutable URL: reaching the network would produce a different error.
        let route = ApiRouteConfig::new(HttpMethod::Get, "http://127.0.0.1:1/never")
            .with_provider(ApiProvider::Stripe);

        let err = exec.execute(&route).await.unwrap_err();
        assert_eq!(err.to_string(), "Stripe API key is not configured");
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let base = spawn_stub_server(echo_router()).await;
        let exec = ApiExecutor::new(ProviderCredentials::default());
        let route = ApiRouteConfig::new(HttpMethod::Get, format!("{}/missing", base));

        let err = exec.execute(&route).await.unwrap_err();
        assert!(matches!(err, NodeflowError::HttpStatus(404)));
        assert_eq!(err.to_string(), "Request failed with status 404");
    }

    #[tokio::test]
    async fn test_non_json_body_is_an_error() {
        let base = spawn_stub_server(echo_router()).await;
        let exec = ApiExecutor::new(ProviderCredentials::default());
        let route = ApiRouteConfig::new(HttpMethod::Post, format!("{}/text", base));

        let err = exec.execute(&route).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse response"));
    }

    #[tokio::test]
    async fn test_invalid_header_name() {
        let exec = ApiExecutor::new(ProviderCredentials::default());
        let route = ApiRouteConfig::new(HttpMethod::Get, "http://127.0.0.1:1/")
            .with_header("bad header", "x");
        let err = exec.execute(&route).await.unwrap_err();
        assert!(err.to_string().contains("Invalid header name"));
    }
}
