//! `reqwest` implementation of [`ResourceClient`].

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::{
    ApiRequest, ApiResponse, ClientError, ClientFuture, Method, RequestBody, ResourceClient,
};
use crate::config::IdchConfig;

const API_KEY_HEADER: &str = "apikey";

/// Authenticated HTTP client for the provider API.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Builds a client sending `api_key` to `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Setup`] when the TLS backend cannot be
    /// initialised.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Setup {
                message: err.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            timeout,
        })
    }

    /// Builds a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Setup`] when the HTTP stack cannot be
    /// initialised.
    pub fn from_config(config: &IdchConfig) -> Result<Self, ClientError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_default(),
            config.timeout(),
        )
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let ApiRequest {
            method,
            path,
            query,
            body,
        } = request;
        debug!(%method, %path, "sending provider request");

        let mut builder = self
            .http
            .request(reqwest_method(method), self.url_for(&path))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.timeout);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Form(pairs) => builder.form(&pairs),
            RequestBody::Json(value) => builder.json(&value),
        };

        let transport = |err: reqwest::Error| ClientError::Transport {
            method,
            path: path.clone(),
            message: err.to_string(),
        };
        let response = builder.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport)?;
        debug!(%method, %path, status, "provider responded");

        Ok(ApiResponse::new(status, decode_body(&text)))
    }
}

impl ResourceClient for HttpClient {
    fn request(&self, request: ApiRequest) -> ClientFuture<'_, ApiResponse> {
        Box::pin(self.send(request))
    }
}

const fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("", Value::Null)]
    #[case("  \n", Value::Null)]
    #[case(r#"{"uuid":"a"}"#, json!({"uuid": "a"}))]
    #[case("Bad Gateway", json!("Bad Gateway"))]
    fn decode_body_handles_empty_and_plain_text(#[case] text: &str, #[case] expected: Value) {
        assert_eq!(decode_body(text), expected);
    }

    #[test]
    fn url_for_joins_without_duplicate_slashes() {
        let client = HttpClient::new("https://api.example.test/v1/", "key", Duration::from_secs(5))
            .expect("client builds");
        assert_eq!(
            client.url_for("/jkt01/network/networks"),
            "https://api.example.test/v1/jkt01/network/networks"
        );
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let client = HttpClient::new(
            "https://api.example.test/v1",
            "secret-key",
            Duration::from_secs(5),
        )
        .expect("client builds");
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("<redacted>"));
    }
}
