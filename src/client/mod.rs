//! Resource client abstraction consumed by every reconciler.
//!
//! The engine never talks HTTP directly. Reconcilers receive a handle
//! implementing [`ResourceClient`] and issue [`ApiRequest`] values through it;
//! the handle returns the status code and decoded body, or a transport
//! failure. Interpreting non-2xx statuses is the engine's job.

mod http;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;

pub use http::HttpClient;

/// HTTP verbs used against the provider API.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Returns the upper-case verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload encodings accepted by the provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// JSON document.
    Json(Value),
}

/// A single provider API call.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    /// HTTP verb.
    pub method: Method,
    /// Path relative to the API base URL, location prefix included.
    pub path: String,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
    /// Request payload.
    pub body: RequestBody,
}

impl ApiRequest {
    /// Starts a request with no query and no body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Starts a `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Starts a `POST` request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Starts a `PATCH` request.
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    /// Starts a `DELETE` request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Appends a query string pair.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Appends a form field, switching the body to form encoding.
    #[must_use]
    pub fn form_field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let pair = (key.into(), value.to_string());
        match &mut self.body {
            RequestBody::Form(pairs) => pairs.push(pair),
            RequestBody::Empty | RequestBody::Json(_) => {
                self.body = RequestBody::Form(vec![pair]);
            }
        }
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json(mut self, value: Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    /// Looks up a query or form value by key.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        let form = match &self.body {
            RequestBody::Form(pairs) => pairs.as_slice(),
            RequestBody::Empty | RequestBody::Json(_) => &[],
        };
        self.query
            .iter()
            .chain(form)
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Status code and decoded body returned by the provider.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded body: `null` when empty, a JSON string when not JSON.
    pub body: Value,
}

impl ApiResponse {
    /// Builds a response.
    #[must_use]
    pub const fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failures raised before a provider response could be obtained.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    /// The HTTP client could not be constructed.
    #[error("failed to initialise HTTP client: {message}")]
    Setup {
        /// Error reported by the HTTP stack.
        message: String,
    },
    /// The request could not be sent or its response could not be read.
    #[error("transport failure on {method} {path}: {message}")]
    Transport {
        /// Verb of the failed request.
        method: Method,
        /// Path of the failed request.
        path: String,
        /// Error reported by the HTTP stack.
        message: String,
    },
}

/// Future returned by [`ResourceClient`] operations.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Authenticated access to the provider API.
///
/// Implementations own credentials and the base URL; callers only pass
/// location-prefixed paths. No retries are performed at this layer.
pub trait ResourceClient: Send + Sync {
    /// Performs one API call.
    fn request(&self, request: ApiRequest) -> ClientFuture<'_, ApiResponse>;
}

impl<T: ResourceClient + ?Sized> ResourceClient for &T {
    fn request(&self, request: ApiRequest) -> ClientFuture<'_, ApiResponse> {
        (**self).request(request)
    }
}
